//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and provide meaningful
//! status information for scripting and automation. `exec` forwards the
//! child's own exit status instead.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Command-line usage error (bad arguments)
pub const USAGE_ERROR: u8 = 2;

/// No usable secret (empty password)
pub const AUTH_FAILED: u8 = 3;

/// Configuration file unreadable, or a volume/file entry missing or invalid
pub const CONFIG_INVALID: u8 = 4;

/// Permission denied (filesystem or mount command)
pub const PERMISSION_DENIED: u8 = 5;

/// Mount or unmount operation failed
pub const MOUNT_FAILED: u8 = 6;

/// Mount point, drive or remote resource not found
pub const NOT_FOUND: u8 = 7;

/// Operation cancelled or interrupted
pub const CANCELLED: u8 = 8;

/// Volume root already present, or still held by other processes
pub const VOLUME_BUSY: u8 = 9;
