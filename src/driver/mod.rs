//! Kernel driver client: hardware access through `WinRing0_1_2_0`.
//!
//! Everything here is sans-IO. The one seam to the operating system is
//! [`DriverPort`], a single `DeviceIoControl`-shaped call; service
//! registration goes through [`ServiceControl`]. This module provides:
//!
//! - [`DriverClient`] - Typed MSR, I/O port, PCI, and memory operations.
//! - [`Setup`] - Locate the `.sys` file, install the service, open with
//!   retries, and tear down again.
//! - [`manage_service`] - The install/remove/system-install flows.
//! - [`ioctl`] - Request and response wire layouts.

pub mod client;
pub mod ioctl;
pub mod port;
pub mod service;
pub mod setup;

pub use client::DriverClient;
pub use port::DriverPort;
pub use service::{is_system_install, manage_service, ServiceControl, ServiceRequest, StartKind};
pub use setup::{is_network_path, Setup};
