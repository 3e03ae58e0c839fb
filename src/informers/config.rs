/**
 * Configuration constants for the informer reconciliation loop
 */
/// Delay in seconds before retrying a failed full list
pub const LIST_RETRY_DELAY_SECONDS: u64 = 1;

/// Delay in seconds before re-listing after a watch stream ends
pub const RELIST_DELAY_SECONDS: u64 = 1;

/// Watch stream timeout in seconds (294 vs 300 to allow 6 seconds for graceful shutdown)
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// Poll interval in milliseconds used by `wait_for_cache_sync`
pub const SYNC_POLL_INTERVAL_MILLIS: u64 = 100;

/// Default resync period in seconds recorded for event handlers
pub const DEFAULT_RESYNC_SECONDS: u64 = 60;

/// Validate configuration constants at compile time
const _: () = {
    assert!(
        LIST_RETRY_DELAY_SECONDS > 0,
        "LIST_RETRY_DELAY_SECONDS must be greater than 0"
    );
    assert!(
        RELIST_DELAY_SECONDS > 0,
        "RELIST_DELAY_SECONDS must be greater than 0"
    );
    assert!(
        WATCH_TIMEOUT_SECONDS > 0,
        "WATCH_TIMEOUT_SECONDS must be greater than 0"
    );
    assert!(
        SYNC_POLL_INTERVAL_MILLIS > 0,
        "SYNC_POLL_INTERVAL_MILLIS must be greater than 0"
    );
    assert!(
        DEFAULT_RESYNC_SECONDS > 0,
        "DEFAULT_RESYNC_SECONDS must be greater than 0"
    );
};
