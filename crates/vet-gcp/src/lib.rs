//! Shared GCP authentication for the REST API clients.
//!
//! Every Google API crate in this workspace authenticates the same way: a
//! service-account token provider behind a cache with single-flight refresh,
//! or a fixed bearer token when talking to an emulator or a mock server.

mod token;

pub use token::{default_provider, AuthError, TokenSource, CLOUD_PLATFORM_SCOPE};
