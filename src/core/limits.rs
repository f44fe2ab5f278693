/*!
 * System Limits and Constants
 *
 * Defaults for leases, boundary teardown and the wire protocol.
 * Every value here can be overridden through `ModuleConfig` unless noted.
 */

use std::time::Duration;

// =============================================================================
// LEASES
// =============================================================================

/// Initial lifetime granted to a freshly created cross-boundary object
pub const DEFAULT_INITIAL_LEASE: Duration = Duration::from_secs(60);

/// Minimum remaining lifetime after a successful call through a proxy
pub const DEFAULT_RENEW_ON_CALL: Duration = Duration::from_secs(12);

/// Grace the boundary allows past a lease deadline before reclaiming
pub const DEFAULT_SPONSORSHIP_TIMEOUT: Duration = Duration::from_secs(12);

/// Lifetime a sponsor grants per renewal checkpoint
pub const DEFAULT_SPONSOR_RENEWAL: Duration = Duration::from_secs(12);

/// Interval between lifetime-manager checkpoints
pub const DEFAULT_LEASE_POLL_INTERVAL: Duration = Duration::from_secs(5);

// =============================================================================
// BOUNDARIES
// =============================================================================

/// File extension identifying module packages in a module directory
pub const DEFAULT_PACKAGE_EXTENSION: &str = "module";

/// Suffix appended to a package path to find its configuration file
pub const PACKAGE_CONFIG_SUFFIX: &str = "config";

/// How long a boundary may take to exit after `Shutdown` before it is killed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Interval at which a boundary checks its own object leases
pub const BOUNDARY_REAP_INTERVAL: Duration = Duration::from_millis(250);

/// Environment variable through which a module process receives its config path
pub const MODULE_CONFIG_ENV: &str = "SNIP_MODULE_CONFIG";

// =============================================================================
// WIRE PROTOCOL (not configurable)
// =============================================================================

/// Largest frame either side will accept (64MB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Length prefix width in bytes
pub const FRAME_HEADER_SIZE: usize = 4;
