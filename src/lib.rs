//! Host-side toolkit for Arduino based SPD EEPROM programmers.
//!
//! This crate covers the two pieces of host plumbing such a programmer
//! needs: the hardware profile embedded in the firmware's settings header
//! (`SpdReaderWriterSettings.h`), and a client for the `WinRing0_1_2_0`
//! kernel driver used to reach MSRs, I/O ports, PCI configuration space,
//! and physical memory directly. All device traffic goes through narrow
//! seams ([`DriverPort`], [`driver::ServiceControl`]), so the logic runs
//! and tests anywhere.
//!
//! # Quick Start
//!
//! ```
//! use spdrw::{HardwareProfile, HeaderRevision};
//! use spdrw::profile::{parse_settings, render_settings};
//!
//! // Render a settings header for modern firmware and read it back.
//! let profile = HardwareProfile::modern();
//! let text = render_settings(&profile, HeaderRevision::R3)?;
//! let parsed = parse_settings(&text)?;
//! assert_eq!(parsed.profile, profile);
//! assert_eq!(parsed.revision, HeaderRevision::R3);
//! # Ok::<(), spdrw::Error>(())
//! ```
//!
//! # Features
//!
//! - **Settings profiles**: Parse and render the firmware settings header
//!   across all supported revisions, with pin conflict checking and
//!   byte-stable round trips ([`profile`]).
//! - **Driver client**: Typed MSR, performance counter, I/O port, PCI
//!   configuration, and physical memory operations
//!   ([`driver::DriverClient`]).
//! - **PCI scanning**: Find devices by vendor/device id or by class code,
//!   honoring multifunction headers.
//! - **Driver setup**: Locate the `.sys` image, register and start the
//!   service, open with retries, and tear down when the last client
//!   leaves ([`driver::Setup`]).
//! - **SMBIOS access**: Read the legacy DMI window from physical memory
//!   (feature `physical-memory`, on by default).

pub mod constants;
pub mod driver;
pub mod error;
pub mod profile;
pub mod types;

// ---- Convenience re-exports ----

pub use driver::{DriverClient, DriverPort, Setup};
pub use error::{Error, Result};
pub use profile::{HardwareProfile, HeaderRevision};
pub use types::*;
