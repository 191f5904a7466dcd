//! # relay-core
//!
//! Core crate for the notification relay. Contains configuration schemas,
//! typed identifiers, the identity model, gateway events, collaborator
//! traits, and the error taxonomy.
//!
//! This crate has **no** internal dependencies on other relay crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AdmissionRejection, AppError, AuthFailure, AuthorizationDenial, ErrorKind};
pub use result::AppResult;
