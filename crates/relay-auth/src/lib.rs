//! # relay-auth
//!
//! Credential validation for the notification relay.
//!
//! ## Modules
//!
//! - `credential`: bearer credential shape detection and cache keys
//! - `jwt`: structured credential encoding and verification
//! - `backend`: HTTP identity backend client and response normalization
//! - `cache`: moka-backed cache of successful validations
//! - `validator`: the end-to-end credential validator
//! - `rbac`: ordered role hierarchy

pub mod backend;
pub mod cache;
pub mod credential;
pub mod jwt;
pub mod rbac;
pub mod validator;

pub use backend::{HttpIdentityBackend, normalize_identity};
pub use cache::{CachedValidation, ValidationCache};
pub use credential::{CacheKey, Credential};
pub use jwt::{Claims, JwtDecoder, JwtEncoder};
pub use rbac::RoleHierarchy;
pub use validator::CredentialValidator;
