//! Key path construction for substrate records.
//!
//! All records live under a common prefix with the shape
//! `/cg/{object_type}/{subtype}/{name}`, reducing naturally when subtype or
//! name are absent. Trailing slashes on the reduced forms keep prefix scans
//! from matching sibling types (`/cg/net/` must not match `/cg/network/...`).

/// Root prefix for all CinderGrid records.
pub const STORE_PREFIX: &str = "/cg";

/// Build the storage path for a record.
pub fn record_path(object_type: &str, subtype: Option<&str>, name: Option<&str>) -> String {
    match (subtype, name) {
        (Some(s), Some(n)) => format!("{STORE_PREFIX}/{object_type}/{s}/{n}"),
        (None, Some(n)) => format!("{STORE_PREFIX}/{object_type}/{n}"),
        (Some(s), None) => format!("{STORE_PREFIX}/{object_type}/{s}/"),
        (None, None) => format!("{STORE_PREFIX}/{object_type}/"),
    }
}
