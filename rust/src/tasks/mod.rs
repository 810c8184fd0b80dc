pub mod backend;
pub mod model;
pub mod repository;

pub use backend::{JsonTaskBackend, MemoryTaskBackend, TaskBackend};
pub use model::{GeoLocation, Task, TaskPriority};
pub use repository::SecureTaskRepository;

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::crypto::fields::FieldCipherError;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("no user is signed in")]
    NotAuthenticated,
    #[error("task {0} belongs to another user")]
    NotAuthorized(String),
    #[error("task {0} not found")]
    NotFound(String),
    #[error("task storage failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Cipher(#[from] FieldCipherError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}
