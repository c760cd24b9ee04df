//! Error types shared by the collaborator traits

use thiserror::Error;

/// Result alias used by collaborator traits
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
///
/// Parsers never produce these: a parse miss is `None`. These cover the
/// external collaborators (AI service, datastore) the core talks to.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Text generation error: {0}")]
    Generation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}
