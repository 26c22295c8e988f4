//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Environment short name used across fixtures.
pub const ENV: &str = "dev";

/// Location code used across fixtures.
pub const LOCATION_CODE: &str = "weu";

/// Project short name used across fixtures.
pub const PROJECT: &str = "hub";

/// Resource group derived from the constants above.
pub const RESOURCE_GROUP: &str = "dev-weu-rg-hub";
