//! Error types for the spdrw crate.

use std::path::PathBuf;

use crate::profile::{HeaderRevision, Pin, SettingRole};

/// The error type for profile and driver operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error from the filesystem or the device handle.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid argument(s) were provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A settings header could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number of the offending line.
        line: usize,
        /// What went wrong on that line.
        message: String,
    },

    /// A required setting is missing from a settings header.
    #[error("missing setting: `{0}` is not defined")]
    MissingSetting(&'static str),

    /// A pin identifier could not be parsed.
    #[error("invalid pin identifier: {0:?}")]
    InvalidPin(String),

    /// A RAM-support expression could not be parsed.
    #[error("invalid RAM support expression: {0:?}")]
    InvalidRamSupport(String),

    /// The same pin is assigned to two roles.
    #[error("pin {pin} is assigned to both {first} and {second}")]
    PinConflict {
        /// The doubly-assigned pin.
        pin: Pin,
        /// The role that claimed the pin first.
        first: SettingRole,
        /// The role that claimed it again.
        second: SettingRole,
    },

    /// A profile failed validation.
    #[error("invalid profile: {0}")]
    InvalidProfile(&'static str),

    /// A profile field cannot be spelled under the requested header revision.
    #[error("{revision} headers have no name for the {role}")]
    RenderUnsupported {
        /// The role the profile defines.
        role: SettingRole,
        /// The revision that cannot express it.
        revision: HeaderRevision,
    },

    /// The driver binary was not found next to the executable.
    #[error("driver binary not found: {}", path.display())]
    DriverNotFound {
        /// Where the binary was expected.
        path: PathBuf,
    },

    /// The driver binary sits on a network path and will not be loaded.
    #[error("driver binary on a network path: {}", path.display())]
    DriverNotLoadedOnNetwork {
        /// The refused path.
        path: PathBuf,
    },

    /// The driver service could not be loaded or opened.
    #[error("driver not loaded")]
    DriverNotLoaded,

    /// The driver was unloaded behind our back (version reads zero).
    #[error("driver unloaded")]
    DriverUnloaded,

    /// This platform has no matching driver binary.
    #[error("unsupported platform")]
    UnsupportedPlatform,

    /// A service control operation failed.
    #[error("service control error: {0}")]
    Service(String),

    /// A control exchange returned fewer bytes than the operation requires.
    #[error("short transfer on control code {code:#010x}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        /// The control code of the exchange.
        code: u32,
        /// Bytes the operation requires.
        expected: usize,
        /// Bytes the driver returned.
        actual: usize,
    },

    /// The operation needs a CPU feature this host does not report.
    #[error("CPU feature not available: {0}")]
    CpuFeature(&'static str),

    /// A PCI configuration access does not meet the alignment rules.
    #[error("misaligned PCI access: offset {offset:#x} with width {width}")]
    MisalignedPciAccess {
        /// The register offset requested.
        offset: u32,
        /// The access width in bytes.
        width: usize,
    },
}

/// A specialized `Result` type for spdrw operations.
pub type Result<T> = std::result::Result<T, Error>;
