//! Domain layer: models, collaborator ports and error types.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ApiError, DomainError, DomainResult};
