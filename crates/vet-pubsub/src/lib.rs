//! Pub/Sub REST publisher and push envelope handling.
//!
//! The pipeline's stages are wired together by topics: dispatchers fan out
//! one message per unit of work, and each processor receives its trigger as
//! a push delivery wrapped in the standard Pub/Sub envelope.

pub mod envelope;
pub mod error;
pub mod publisher;

pub use envelope::PushEnvelope;
pub use error::{PubSubError, PubSubResult};
pub use publisher::{Publisher, PublisherConfig};
