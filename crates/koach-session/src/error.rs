//! Error types for koach-session

use thiserror::Error;

/// Result type alias using koach-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing a conversation turn
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer
    #[error(transparent)]
    Api(#[from] koach_api::Error),
}
