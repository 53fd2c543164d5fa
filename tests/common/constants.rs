//! Shared constants for end-to-end tests

// ============================================================================
// Test Content
// ============================================================================

/// Topic used by most workflow tests
pub const TEST_TOPIC: &str = "electric vehicles";

/// Revision request used by most workflow tests
pub const TEST_FEEDBACK: &str = "add more stats";

/// Error message returned by the failing mock LLM
pub const MOCK_LLM_FAILURE: &str = "model overloaded";

// ============================================================================
// Timeouts
// ============================================================================

/// How long to wait for the server to accept requests
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness probes
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Per-request timeout of the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long to poll a session before giving up on a status
pub const SESSION_SETTLE_TIMEOUT_MS: u64 = 5000;

/// Interval between session polls
pub const SESSION_POLL_INTERVAL_MS: u64 = 10;
