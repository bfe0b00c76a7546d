//! Thumbnail resolution and cropout generation.
//!
//! Network I/O goes through the [`ThumbnailFetcher`] trait so probing order
//! and early-exit behavior are unit-testable without real HTTP calls.

pub mod cropout;
pub mod error;
pub mod thumbnails;

pub use cropout::{cropout_file_name, cropout_from_image, encode_jpeg};
pub use error::{MediaError, MediaResult};
pub use thumbnails::{
    HttpThumbnailFetcher, ResolvedThumbnail, ThumbnailFetcher, ThumbnailResolver,
};
