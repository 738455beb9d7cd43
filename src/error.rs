//! Error types and fsck-style exit codes.

use std::fmt;
use std::io;

/// Exit code: no errors.
pub const FSCK_OK: i32 = 0;
/// Exit code: filesystem errors corrected. Unused by this tool (read-only).
pub const FSCK_NONDESTRUCT: i32 = 1;
/// Exit code: system should be rebooted. Unused by this tool.
pub const FSCK_REBOOT: i32 = 2;
/// Exit code: filesystem errors left uncorrected.
pub const FSCK_UNCORRECTED: i32 = 4;
/// Exit code: operational error (I/O, permission, memory).
pub const FSCK_ERROR: i32 = 8;
/// Exit code: usage or syntax error.
pub const FSCK_USAGE: i32 = 16;
/// Exit code: shared library error. Unused by this tool.
pub const FSCK_LIBRARY: i32 = 128;

/// The single typed failure propagated up to `main`.
///
/// Every fatal condition this tool can report is one of these three
/// variants; `main` is the only place that turns a variant into an exit
/// code and a diagnostic line.
#[derive(Debug)]
pub enum PolyfsError {
    /// The image is structurally corrupt, fails a checksum, or violates a
    /// layout invariant. Maps to `FSCK_UNCORRECTED`.
    Uncorrected(String),
    /// A syscall, allocation, or other host-side operation failed. Maps to
    /// `FSCK_ERROR`.
    Operational(String),
    /// Bad or missing command-line arguments. Maps to `FSCK_USAGE`.
    Usage(String),
}

impl PolyfsError {
    /// Builds an `Uncorrected` error from a message.
    pub fn uncorrected<M: Into<String>>(msg: M) -> Self {
        Self::Uncorrected(msg.into())
    }

    /// Builds an `Operational` error from a message.
    pub fn operational<M: Into<String>>(msg: M) -> Self {
        Self::Operational(msg.into())
    }

    /// Builds a `Usage` error from a message.
    pub fn usage<M: Into<String>>(msg: M) -> Self {
        Self::Usage(msg.into())
    }

    /// Returns the fsck-family exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Uncorrected(_) => FSCK_UNCORRECTED,
            Self::Operational(_) => FSCK_ERROR,
            Self::Usage(_) => FSCK_USAGE,
        }
    }
}

impl fmt::Display for PolyfsError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncorrected(msg) => write!(fmt, "{msg}"),
            Self::Operational(msg) => write!(fmt, "{msg}"),
            Self::Usage(msg) => write!(fmt, "{msg}"),
        }
    }
}

impl From<io::Error> for PolyfsError {
    fn from(e: io::Error) -> Self {
        Self::Operational(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PolyfsError>;
