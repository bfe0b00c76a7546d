//! Deduplication gate over warehouse tables.
//!
//! Work selection is an anti-join: a video needs processing when it appears
//! in the source table but has no rows yet in the target table. The gate is
//! best-effort only; concurrent workers racing on the same video produce
//! duplicate rows rather than lost work.

use vet_models::VideoId;

use crate::client::{BigQueryClient, TableRef};
use crate::error::BigQueryResult;

/// Escape a value for interpolation into a double-quoted SQL string
/// literal. The inputs are bus-internal (video IDs, date partitions), but
/// they still must not be able to terminate the literal.
fn sql_string_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build the anti-join for one day partition of the source table.
pub fn pending_in_partition_sql(source: &TableRef, target: &TableRef, date_partition: &str) -> String {
    format!(
        "SELECT DISTINCT video_id FROM {src} \
         WHERE TIMESTAMP_TRUNC(datetime_updated, DAY) = TIMESTAMP(\"{partition}\") \
         AND video_id NOT IN (SELECT DISTINCT video_id FROM {dst})",
        src = source.sql_name(),
        dst = target.sql_name(),
        partition = sql_string_literal(date_partition),
    )
}

/// Build the anti-join over the whole source table, capped at `limit` rows.
pub fn pending_limited_sql(source: &TableRef, target: &TableRef, limit: u32) -> String {
    format!(
        "SELECT DISTINCT video_id FROM {src} st \
         WHERE NOT EXISTS (SELECT 1 FROM {dst} tt WHERE tt.video_id = st.video_id) \
         LIMIT {limit}",
        src = source.sql_name(),
        dst = target.sql_name(),
    )
}

/// Build the per-video existence check.
pub fn video_exists_sql(target: &TableRef, video_id: &VideoId) -> String {
    format!(
        "SELECT video_id FROM {dst} WHERE video_id = \"{id}\" LIMIT 1",
        dst = target.sql_name(),
        id = sql_string_literal(video_id.as_str()),
    )
}

/// Read side of the dedup gate.
#[derive(Clone)]
pub struct ProcessingGate {
    client: BigQueryClient,
}

impl ProcessingGate {
    pub fn new(client: BigQueryClient) -> Self {
        Self { client }
    }

    /// Video IDs added to `source` on the given day that have no rows in
    /// `target` yet.
    pub async fn pending_in_partition(
        &self,
        source: &TableRef,
        target: &TableRef,
        date_partition: &str,
    ) -> BigQueryResult<Vec<VideoId>> {
        let sql = pending_in_partition_sql(source, target, date_partition);
        let ids = self.client.query_column(&sql, "video_id").await?;
        Ok(ids.into_iter().map(VideoId::from).collect())
    }

    /// Up to `limit` video IDs from `source` that have no rows in `target`.
    pub async fn pending_limited(
        &self,
        source: &TableRef,
        target: &TableRef,
        limit: u32,
    ) -> BigQueryResult<Vec<VideoId>> {
        let sql = pending_limited_sql(source, target, limit);
        let ids = self.client.query_column(&sql, "video_id").await?;
        Ok(ids.into_iter().map(VideoId::from).collect())
    }

    /// Whether `target` already holds rows for this video.
    pub async fn video_already_processed(
        &self,
        target: &TableRef,
        video_id: &VideoId,
    ) -> BigQueryResult<bool> {
        let sql = video_exists_sql(target, video_id);
        let rows = self.client.query(&sql).await?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> TableRef {
        TableRef::new("proj", "warehouse", "youtube_video")
    }

    fn target() -> TableRef {
        TableRef::new("proj", "warehouse", "thumbnail_annotations")
    }

    #[test]
    fn test_partition_sql_shape() {
        let sql = pending_in_partition_sql(&source(), &target(), "2024-05-01");
        assert!(sql.contains("`proj.warehouse.youtube_video`"));
        assert!(sql.contains("TIMESTAMP_TRUNC(datetime_updated, DAY) = TIMESTAMP(\"2024-05-01\")"));
        assert!(sql.contains("NOT IN (SELECT DISTINCT video_id FROM `proj.warehouse.thumbnail_annotations`)"));
    }

    #[test]
    fn test_limited_sql_caps_rows() {
        let sql = pending_limited_sql(&source(), &target(), 500);
        assert!(sql.ends_with("LIMIT 500"));
        assert!(sql.contains("NOT EXISTS"));
        assert!(!sql.contains("TIMESTAMP_TRUNC"));
    }

    #[test]
    fn test_video_exists_sql() {
        let sql = video_exists_sql(&target(), &VideoId::from("abc123XYZ-_"));
        assert_eq!(
            sql,
            "SELECT video_id FROM `proj.warehouse.thumbnail_annotations` \
             WHERE video_id = \"abc123XYZ-_\" LIMIT 1"
        );
    }

    #[test]
    fn test_string_values_cannot_escape_the_literal() {
        let sql = video_exists_sql(&target(), &VideoId::from("x\" OR \"1\"=\"1"));
        assert!(sql.contains("video_id = \"x\\\" OR \\\"1\\\"=\\\"1\""));

        let sql = pending_in_partition_sql(&source(), &target(), "2024-05-01\")--");
        assert!(sql.contains("TIMESTAMP(\"2024-05-01\\\")--\")"));

        assert_eq!(sql_string_literal("a\\b"), "a\\\\b");
    }
}
