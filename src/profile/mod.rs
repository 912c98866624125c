//! Firmware settings-header support: parsing, validation, and rendering.
//!
//! The programmer firmware is configured through a C header of `#define`
//! constants: which serial port object to use, the baud rate, and which GPIO
//! pins drive the high-voltage circuit and the address-select lines. The
//! constant names were respelled over three hardware revisions. This module
//! provides:
//!
//! - [`HardwareProfile`] - The decoded configuration.
//! - [`parse`] - Decode a header into the structure, detecting its revision.
//! - [`render`] - Emit the structure as a header in a chosen revision.

pub mod parse;
pub mod render;
mod types;

pub use parse::{parse_settings, SettingsFile};
pub use render::render_settings;
pub use types::{HardwareProfile, HeaderRevision, Pin, RamSupport, SettingRole};
