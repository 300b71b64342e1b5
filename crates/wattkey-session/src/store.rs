//! Remote store seam.
//!
//! The cloud database is a JSON tree addressed by slash-separated paths.
//! [`RemoteStore`] is the collaborator interface; [`StoreHandle`] puts a
//! single lock in front of it so every call from every task is
//! serialized; [`MemoryStore`] is an in-process implementation used by the
//! simulator and the tests.
//!
//! Layout used by the controller:
//!
//! ```text
//! login, logout                 request flags (bool)
//! dev1/Status, dev2/Status      relay status (bool)
//! dev1/{I,U,P,E}, dev2/{...}    live telemetry (number)
//! User/<card>/E1, E2, E         per-card energy counters (number)
//! ```

use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use wattkey_core::{CardId, DeviceSlot, Reading};

/// Remote store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Unexpected value at `{path}`: expected {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("Invalid path: `{0}`")]
    InvalidPath(String),
}

/// Result type alias for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Well-known store paths.
pub mod paths {
    use wattkey_core::{CardId, DeviceSlot};

    pub const LOGIN: &str = "login";
    pub const LOGOUT: &str = "logout";

    /// `devN/Status`
    pub fn relay_status(slot: DeviceSlot) -> String {
        format!("{}/Status", slot.key())
    }

    /// `devN/E`
    pub fn live_energy(slot: DeviceSlot) -> String {
        format!("{}/E", slot.key())
    }

    /// `User/<card>`
    pub fn user(identity: &CardId) -> String {
        format!("User/{identity}")
    }

    /// `User/<card>/E1` or `User/<card>/E2`
    pub fn user_energy(identity: &CardId, slot: DeviceSlot) -> String {
        format!("User/{identity}/E{}", slot.index() + 1)
    }
}

/// Cloud database collaborator.
///
/// Calls take `&mut self`; sharing goes through [`StoreHandle`].
pub trait RemoteStore: Send + 'static {
    /// Read a boolean. An absent value reads as `false`.
    fn get_flag(&mut self, path: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn set_flag(&mut self, path: &str, value: bool)
    -> impl Future<Output = StoreResult<()>> + Send;

    /// Read a number. An absent value reads as `None`.
    fn get_float(&mut self, path: &str) -> impl Future<Output = StoreResult<Option<f64>>> + Send;

    fn set_float(&mut self, path: &str, value: f64)
    -> impl Future<Output = StoreResult<()>> + Send;

    /// Merge the members of `patch` (an object) below `path`. Member names
    /// may themselves be paths.
    fn patch_json(&mut self, path: &str, patch: Value)
    -> impl Future<Output = StoreResult<()>> + Send;
}

// ----------------------------------------------------------------------------
// Composite operations
// ----------------------------------------------------------------------------

/// Live telemetry patch for both slots (`devN/I`, `U`, `P`, `E`).
pub fn telemetry_patch(readings: &[Reading; 2]) -> Value {
    let mut patch = Map::new();
    for slot in DeviceSlot::ALL {
        let reading = &readings[slot.index()];
        let key = slot.key();
        patch.insert(format!("{key}/I"), json!(reading.current));
        patch.insert(format!("{key}/U"), json!(reading.voltage));
        patch.insert(format!("{key}/P"), json!(reading.power));
        patch.insert(format!("{key}/E"), json!(reading.energy));
    }
    Value::Object(patch)
}

/// Push live telemetry.
pub async fn push_telemetry<S: RemoteStore>(
    store: &mut S,
    readings: &[Reading; 2],
) -> StoreResult<()> {
    store.patch_json("", telemetry_patch(readings)).await
}

/// Persist a card's counters as `E1`, `E2` and their total `E`.
pub async fn store_user_energy<S: RemoteStore>(
    store: &mut S,
    identity: &CardId,
    energy: [f64; 2],
) -> StoreResult<()> {
    for slot in DeviceSlot::ALL {
        store
            .set_float(&paths::user_energy(identity, slot), energy[slot.index()])
            .await?;
    }
    store
        .set_float(&format!("{}/E", paths::user(identity)), energy[0] + energy[1])
        .await
}

/// Load a card's counters. Both must be present, otherwise `None`.
pub async fn load_user_energy<S: RemoteStore>(
    store: &mut S,
    identity: &CardId,
) -> StoreResult<Option<[f64; 2]>> {
    let e1 = store.get_float(&paths::user_energy(identity, DeviceSlot::One)).await?;
    let e2 = store.get_float(&paths::user_energy(identity, DeviceSlot::Two)).await?;
    Ok(e1.zip(e2).map(|(e1, e2)| [e1, e2]))
}

// ----------------------------------------------------------------------------
// Shared Handle
// ----------------------------------------------------------------------------

/// Shared, serialized access to a [`RemoteStore`].
///
/// Single calls lock for their own duration. Callers that need several
/// calls to be atomic with respect to other tasks hold [`lock`](Self::lock).
#[derive(Debug)]
pub struct StoreHandle<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RemoteStore> StoreHandle<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Exclusive access for a sequence of calls.
    pub async fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().await
    }

    /// Write a flag, logging a failure instead of returning it.
    pub async fn publish_flag(&self, path: &str, value: bool) {
        let result = self.lock().await.set_flag(path, value).await;
        log_failure(path, result);
    }

    /// Write a number, logging a failure instead of returning it.
    pub async fn publish_float(&self, path: &str, value: f64) {
        let result = self.lock().await.set_float(path, value).await;
        log_failure(path, result);
    }

    /// Push live telemetry, logging a failure instead of returning it.
    pub async fn publish_telemetry(&self, readings: &[Reading; 2]) {
        let result = push_telemetry(&mut *self.lock().await, readings).await;
        log_failure("telemetry", result);
    }

    /// Persist a card's counters, logging a failure instead of returning it.
    pub async fn persist_user_energy(&self, identity: &CardId, energy: [f64; 2]) {
        let result = store_user_energy(&mut *self.lock().await, identity, energy).await;
        log_failure(&paths::user(identity), result);
    }

    /// Restore a card's counters, falling back to zero.
    pub async fn restore_user_energy(&self, identity: &CardId) -> [f64; 2] {
        match load_user_energy(&mut *self.lock().await, identity).await {
            Ok(Some(energy)) => {
                debug!(card = %identity, e1 = energy[0], e2 = energy[1], "energy restored");
                energy
            }
            Ok(None) => {
                debug!(card = %identity, "no stored energy, starting at zero");
                [0.0; 2]
            }
            Err(e) => {
                warn!(card = %identity, error = %e, "energy restore failed, starting at zero");
                [0.0; 2]
            }
        }
    }
}

pub(crate) fn log_failure(what: &str, result: StoreResult<()>) {
    if let Err(e) = result {
        warn!("Store write to {} failed: {}", what, e);
    }
}

// ----------------------------------------------------------------------------
// In-memory Store
// ----------------------------------------------------------------------------

/// [`RemoteStore`] over an in-memory JSON document.
///
/// # Examples
///
/// ```
/// use wattkey_session::store::{MemoryStore, RemoteStore};
///
/// # tokio_test_block_on(async {
/// let mut store = MemoryStore::new();
/// store.set_float("dev1/E", 1.5).await.unwrap();
/// assert_eq!(store.get_float("dev1/E").await.unwrap(), Some(1.5));
/// assert_eq!(store.document()["dev1"]["E"], 1.5);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: Value,
    online: bool,
    calls: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty, reachable store.
    pub fn new() -> Self {
        Self::with_document(Value::Object(Map::new()))
    }

    /// Store seeded with `root`.
    pub fn with_document(root: Value) -> Self {
        Self {
            root,
            online: true,
            calls: 0,
        }
    }

    /// Whole document.
    pub fn document(&self) -> &Value {
        &self.root
    }

    /// Value at `path`, bypassing the call counter and offline mode.
    pub fn value(&self, path: &str) -> Option<&Value> {
        segments(path)
            .iter()
            .try_fold(&self.root, |node, segment| node.get(*segment))
    }

    /// Make every call fail as if the network were down.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Calls made through the [`RemoteStore`] interface.
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn begin_call(&mut self) -> StoreResult<()> {
        self.calls += 1;
        if self.online {
            Ok(())
        } else {
            Err(StoreError::Unreachable("offline".to_string()))
        }
    }

    fn insert(&mut self, path: &str, value: Value) -> StoreResult<()> {
        let segments = segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };

        let mut node = &mut self.root;
        for segment in parents {
            node = child_object(node).entry(segment.to_string()).or_insert(Value::Null);
        }
        child_object(node).insert(last.to_string(), value);
        Ok(())
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Object map of `node`, replacing a scalar with an empty object.
fn child_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made an object"),
    }
}

impl RemoteStore for MemoryStore {
    async fn get_flag(&mut self, path: &str) -> StoreResult<bool> {
        self.begin_call()?;
        match self.value(path) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(_) => Err(StoreError::TypeMismatch {
                path: path.to_string(),
                expected: "bool",
            }),
        }
    }

    async fn set_flag(&mut self, path: &str, value: bool) -> StoreResult<()> {
        self.begin_call()?;
        self.insert(path, Value::Bool(value))
    }

    async fn get_float(&mut self, path: &str) -> StoreResult<Option<f64>> {
        self.begin_call()?;
        match self.value(path) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => Err(StoreError::TypeMismatch {
                path: path.to_string(),
                expected: "number",
            }),
        }
    }

    async fn set_float(&mut self, path: &str, value: f64) -> StoreResult<()> {
        self.begin_call()?;
        self.insert(path, json!(value))
    }

    async fn patch_json(&mut self, path: &str, patch: Value) -> StoreResult<()> {
        self.begin_call()?;
        let Value::Object(members) = patch else {
            return Err(StoreError::TypeMismatch {
                path: path.to_string(),
                expected: "object",
            });
        };
        for (key, value) in members {
            self.insert(&format!("{path}/{key}"), value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> CardId {
        CardId::new("EE:E0:E8:00").unwrap()
    }

    #[tokio::test]
    async fn test_flags_default_to_false() {
        let mut store = MemoryStore::new();
        assert!(!store.get_flag("login").await.unwrap());

        store.set_flag("login", true).await.unwrap();
        assert!(store.get_flag("login").await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_paths() {
        let mut store = MemoryStore::new();
        store.set_flag("dev1/Status", true).await.unwrap();
        store.set_float("dev1/E", 2.0).await.unwrap();

        assert_eq!(store.document(), &json!({"dev1": {"Status": true, "E": 2.0}}));
        assert_eq!(store.get_float("dev2/E").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let mut store = MemoryStore::with_document(json!({"login": "yes"}));
        assert!(matches!(
            store.get_flag("login").await,
            Err(StoreError::TypeMismatch { .. })
        ));
        assert!(store.get_float("login").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_path_rejected() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.set_flag("/", true).await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let mut store = MemoryStore::new();
        store.set_online(false);

        assert!(matches!(
            store.get_flag("login").await,
            Err(StoreError::Unreachable(_))
        ));
        assert!(store.set_float("dev1/E", 1.0).await.is_err());
        assert_eq!(store.calls(), 2);
        assert!(store.value("dev1").is_none());
    }

    #[tokio::test]
    async fn test_telemetry_patch_paths() {
        let mut store = MemoryStore::new();
        let readings = [
            Reading {
                current: 1.0,
                voltage: 230.0,
                power: 230.0,
                energy: 4.0,
            },
            Reading::default(),
        ];
        push_telemetry(&mut store, &readings).await.unwrap();

        assert_eq!(store.value("dev1/U"), Some(&json!(230.0)));
        assert_eq!(store.value("dev1/E"), Some(&json!(4.0)));
        assert_eq!(store.value("dev2/P"), Some(&json!(0.0)));
    }

    #[tokio::test]
    async fn test_user_energy_round_trip() {
        let mut store = MemoryStore::new();
        store_user_energy(&mut store, &card(), [1.25, 2.5]).await.unwrap();

        assert_eq!(store.value("User/EE:E0:E8:00/E"), Some(&json!(3.75)));
        assert_eq!(
            load_user_energy(&mut store, &card()).await.unwrap(),
            Some([1.25, 2.5])
        );
    }

    #[tokio::test]
    async fn test_partial_user_energy_is_none() {
        let mut store = MemoryStore::with_document(json!({
            "User": {"EE:E0:E8:00": {"E1": 7.0}}
        }));
        assert_eq!(load_user_energy(&mut store, &card()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_zero() {
        let mut store = MemoryStore::new();
        store_user_energy(&mut store, &card(), [1.0, 1.0]).await.unwrap();
        store.set_online(false);

        let handle = StoreHandle::new(store);
        assert_eq!(handle.restore_user_energy(&card()).await, [0.0, 0.0]);

        handle.lock().await.set_online(true);
        assert_eq!(handle.restore_user_energy(&card()).await, [1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_publish_swallows_errors() {
        let mut store = MemoryStore::new();
        store.set_online(false);
        let handle = StoreHandle::new(store);

        handle.publish_flag("login", false).await;
        handle.publish_telemetry(&[Reading::default(); 2]).await;
        assert_eq!(handle.lock().await.calls(), 2);
    }
}
