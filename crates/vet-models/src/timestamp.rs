//! Warehouse timestamp formatting.

use chrono::Utc;

/// Current instant formatted the way the warehouse TIMESTAMP columns expect.
pub fn warehouse_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
