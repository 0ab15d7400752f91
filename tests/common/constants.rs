//! Shared constants for end-to-end tests
//!
//! The fixture counts here mirror what the platform stub serves; when the
//! stub's feeds change, update only this file.

// ============================================================================
// Shops and Credentials
// ============================================================================

/// Shop domain used by most tests; doubles as the shop id.
pub const ACME_DOMAIN: &str = "acme-e2e.example.com";

/// Second shop domain for multi-shop tests.
pub const BETA_DOMAIN: &str = "beta-e2e.example.com";

/// Access token the platform stub accepts.
pub const GOOD_TOKEN: &str = "shpat_e2e_good";

/// Any other token is rejected with 401.
pub const BAD_TOKEN: &str = "shpat_e2e_bad";

/// Shop name served by the stub's profile endpoint.
pub const PROFILE_NAME: &str = "Acme Outdoor Supply";

/// Timezone served by the stub's profile endpoint.
pub const PROFILE_TIMEZONE: &str = "Europe/Rome";

// ============================================================================
// Fixture Feed Sizes
// ============================================================================

/// Products in the stub catalog feed.
pub const PRODUCT_COUNT: usize = 3;

/// Orders in the stub orders feed. Both fall in the same calendar month.
pub const ORDER_COUNT: usize = 2;

/// Customers in the stub customers feed.
pub const CUSTOMER_COUNT: usize = 2;

/// Aggregate documents derived from the orders feed: one monthly rollup
/// plus the lifetime summary.
pub const AGGREGATE_COUNT: usize = 2;

/// Documents a full sync writes: profile + products + orders + customers
/// + aggregates. The dialogue partition starts empty.
pub const FULL_SYNC_DOCUMENT_COUNT: usize =
    1 + PRODUCT_COUNT + ORDER_COUNT + CUSTOMER_COUNT + AGGREGATE_COUNT;

// ============================================================================
// Timeouts
// ============================================================================

/// How long to wait for a spawned server to answer its home route.
pub const SERVER_READY_TIMEOUT_MS: u64 = 5_000;

/// Poll interval while waiting for readiness.
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// How long to wait for a submitted job to settle.
pub const JOB_SETTLE_TIMEOUT_MS: u64 = 10_000;

/// Poll interval while waiting for a job to settle.
pub const JOB_SETTLE_POLL_INTERVAL_MS: u64 = 25;

/// Timeout for individual test client requests.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Timeout handed to the platform client talking to the stub.
pub const PLATFORM_TIMEOUT_SECS: u64 = 5;
