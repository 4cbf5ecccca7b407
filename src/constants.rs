//! Application-wide constants for deputy.
//!
//! Centralizes timeouts, store keys and channel capacities.

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// Default reply timeout for request/response exchanges, in milliseconds.
///
/// Long enough for another tab's listener to wake and answer, short enough
/// that a lone tab claims the root role without a noticeable pause.
pub const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 500;

/// Default retention for case page cache records, in days.
pub const DEFAULT_CACHE_RETENTION_DAYS: u32 = 60;

/// Delay between steps of the `simulate` command.
pub const SIMULATION_STEP_DELAY: Duration = Duration::from_millis(50);

// ============================================================================
// Storage keys
// ============================================================================

/// Key holding the active `SessionInformation`.
pub const SESSION_KEY: &str = "keys.session";

/// Prefix of case page cache record keys (`casePageCache.<page id>`).
pub const CASE_PAGE_CACHE_PREFIX: &str = "casePageCache.";

// ============================================================================
// Channels
// ============================================================================

/// Capacity of the origin broadcast channel.
///
/// Slow subscribers that fall further behind than this lose the oldest
/// messages, which the protocol tolerates (delivery is at most once).
pub const ORIGIN_CHANNEL_CAPACITY: usize = 256;
