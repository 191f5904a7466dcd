//! Identity backend client and response normalization.

pub mod http;
pub mod normalize;

pub use http::HttpIdentityBackend;
pub use normalize::normalize_identity;
