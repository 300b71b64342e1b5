use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid card identifier: {0}")]
    InvalidCardId(String),

    #[error("Unsupported UID length: {0} bytes")]
    InvalidUidLength(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
