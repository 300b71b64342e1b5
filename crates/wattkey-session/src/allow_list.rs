//! Static list of cards allowed to start a session.

use wattkey_core::{CardId, constants::DEFAULT_ALLOWED_CARDS};

/// Ordered, process-lifetime allow-list.
///
/// Lookups are a linear, case-insensitive scan.
///
/// # Examples
///
/// ```
/// use wattkey_session::AllowList;
///
/// let list = AllowList::default();
/// assert!(list.contains("ee:e0:e8:00"));
/// assert!(!list.contains("DE:AD:BE:EF"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    cards: Vec<CardId>,
}

impl AllowList {
    pub fn new(cards: Vec<CardId>) -> Self {
        Self { cards }
    }

    /// Parse every entry.
    ///
    /// # Errors
    ///
    /// Returns the first entry that is not a valid identifier.
    pub fn parse<I, T>(entries: I) -> wattkey_core::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let cards = entries
            .into_iter()
            .map(|entry| CardId::new(entry.as_ref()))
            .collect::<wattkey_core::Result<Vec<_>>>()?;
        Ok(Self::new(cards))
    }

    /// Whether `raw` names an allowed card, ignoring letter case.
    pub fn contains(&self, raw: &str) -> bool {
        self.cards.iter().any(|card| card.matches(raw))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardId> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        let cards = DEFAULT_ALLOWED_CARDS
            .iter()
            .filter_map(|raw| CardId::new(raw).ok())
            .collect();
        Self { cards }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("EE:E0:E8:00")]
    #[case("ee:e0:e8:00")]
    #[case("Ee:e0:E8:00")]
    #[case("0A:4E:17:05")]
    #[case("0a:4e:17:05")]
    fn test_allowed_any_case(#[case] raw: &str) {
        assert!(AllowList::default().contains(raw));
    }

    #[rstest]
    #[case("DE:AD:BE:EF")]
    #[case("EE:E0:E8:01")]
    #[case("EE:E0:E8")]
    #[case("")]
    #[case("EEE0E800")]
    fn test_not_allowed(#[case] raw: &str) {
        assert!(!AllowList::default().contains(raw));
    }

    #[test]
    fn test_parse_keeps_order() {
        let list = AllowList::parse(["0a:4e:17:05", "EE:E0:E8:00"]).unwrap();
        let ids: Vec<&str> = list.iter().map(CardId::as_str).collect();
        assert_eq!(ids, vec!["0A:4E:17:05", "EE:E0:E8:00"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_parse_rejects_bad_entry() {
        assert!(AllowList::parse(["EE:E0:E8:00", "not-a-card"]).is_err());
    }

    #[test]
    fn test_empty_list_allows_nothing() {
        let list = AllowList::new(Vec::new());
        assert!(list.is_empty());
        assert!(!list.contains("EE:E0:E8:00"));
    }
}
