//! The source-hosting client collaborator and the build-URL validator that
//! consumes it.
//!
//! [`HttpSourceHostClient`] answers "does this repo exist and am I
//! authorized?" with an HTTP existence check against a host-shaped API,
//! using `reqwest`'s async client since the rest of this workspace runs on
//! Tokio throughout.

mod client;
mod validator;

pub use client::HttpSourceHostClient;
pub use validator::validate_build_url;
