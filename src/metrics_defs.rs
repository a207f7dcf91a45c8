//! Metric names for the garbage sorter service.

/// Inbound classification requests received.
pub const CLASSIFY_REQUESTS: &str = "classify.requests";

/// Throttled classifier calls that entered the backoff wait.
pub const CLASSIFY_RATE_LIMITED: &str = "classify.rate_limited";

/// Classification calls that ended in an error.
pub const CLASSIFY_FAILURES: &str = "classify.failures";

/// Records written to the classification table.
pub const RECORDS_STORED: &str = "storage.records";

/// Storage writes that ended in an error.
pub const STORAGE_FAILURES: &str = "storage.failures";
