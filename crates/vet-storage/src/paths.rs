//! Canonical object path forms.
//!
//! Every uploaded blob is addressed two ways downstream: the `gs://` URI
//! for API access and the Cloud Storage FUSE mount path for processes that
//! read the bucket as a filesystem.

/// `gs://{bucket}/{object}`
pub fn gs_uri(bucket: &str, object: &str) -> String {
    format!("gs://{bucket}/{object}")
}

/// `/gcs/{bucket}/{object}`
pub fn fuse_path(bucket: &str, object: &str) -> String {
    format!("/gcs/{bucket}/{object}")
}
