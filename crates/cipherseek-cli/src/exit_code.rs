//! Exit codes for the CLI.
//!
//! Scripts can tell a tampered container apart from a missing file or a bad
//! argument without parsing error messages.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Command-line usage error (bad arguments, missing or malformed key)
pub const USAGE_ERROR: u8 = 2;

/// Ciphertext failed authentication, or the container is malformed
pub const INTEGRITY_FAILED: u8 = 3;

/// Input file not found
pub const NOT_FOUND: u8 = 4;

/// Requested offset lies past the end of the decrypted data
pub const OUT_OF_RANGE: u8 = 5;
