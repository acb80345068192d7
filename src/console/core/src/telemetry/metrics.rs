//! Metric names emitted by the core.
//!
//! The core only records through the `metrics` facade; installing a recorder
//! (Prometheus or otherwise) is left to the host process. Without one the
//! counters are no-ops.

use metrics::{describe_counter, Unit};
use std::sync::Once;

pub const SYNC_COMMANDS_TOTAL: &str = "opsdesk_sync_commands_total";
pub const SYNC_FAILURES_TOTAL: &str = "opsdesk_sync_failures_total";
pub const SYNC_REFRESHES_TOTAL: &str = "opsdesk_sync_refreshes_total";
pub const PERMISSION_LOADS_TOTAL: &str = "opsdesk_permission_loads_total";
pub const ERRORS_TOTAL: &str = "opsdesk_errors_total";

static DESCRIBED: Once = Once::new();

/// Register descriptions for every counter with the installed recorder.
/// Safe to call more than once.
pub fn describe_metrics() {
    DESCRIBED.call_once(|| {
        describe_counter!(SYNC_COMMANDS_TOTAL, Unit::Count, "Commands accepted by resource slices");
        describe_counter!(SYNC_FAILURES_TOTAL, Unit::Count, "Slice commands that ended in an error");
        describe_counter!(SYNC_REFRESHES_TOTAL, Unit::Count, "List refreshes issued after a successful mutation");
        describe_counter!(PERMISSION_LOADS_TOTAL, Unit::Count, "Permission manifest loads by outcome");
        describe_counter!(ERRORS_TOTAL, Unit::Count, "Logged console errors by code");
    });
}
