//! Locating, loading, and unloading the kernel driver.
//!
//! [`Setup`] owns the dance around the raw device open: find the `.sys`
//! file next to the executable, refuse network shares the kernel cannot
//! load from, and when the device does not open, (re)install the service
//! and retry with a growing pause. It never talks to the device itself;
//! the caller supplies an opener so the transport stays pluggable.

use std::env;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::constants::{self, setup};
use crate::driver::client::DriverClient;
use crate::driver::port::DriverPort;
use crate::driver::service::{manage_service, ServiceControl, ServiceRequest};
use crate::error::{Error, Result};
use crate::types::{CpuFeatures, DriverKind, Status};

/// Returns `true` for UNC share paths like `\\server\share\...`.
///
/// Device (`\\.\`) and verbatim (`\\?\`) prefixes are local despite the
/// leading backslashes. The kernel refuses to load a driver image from a
/// network share, so [`Setup`] rejects such paths up front by default.
pub fn is_network_path(path: &Path) -> bool {
    let text = path.to_string_lossy();
    text.starts_with(r"\\") && !text.starts_with(r"\\.\") && !text.starts_with(r"\\?\")
}

/// Driver installation and teardown around a pluggable device opener.
pub struct Setup<S> {
    scm: S,
    kind: DriverKind,
    base_dir: Option<PathBuf>,
    retry_pause: Duration,
    network_check: fn(&Path) -> bool,
    status: Status,
}

impl<S: ServiceControl> Setup<S> {
    pub fn new(scm: S, kind: DriverKind) -> Self {
        Setup {
            scm,
            kind,
            base_dir: None,
            retry_pause: setup::RETRY_STEP,
            network_check: is_network_path,
            status: Status::NoError,
        }
    }

    /// Looks for the driver file here instead of next to the executable.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Base pause between open attempts; attempt `n` waits `n` times this.
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Replaces the network share detection used on the driver path.
    pub fn with_network_check(mut self, check: fn(&Path) -> bool) -> Self {
        self.network_check = check;
        self
    }

    /// The full path the driver file is expected at.
    pub fn driver_path(&self) -> Result<PathBuf> {
        let file = self
            .kind
            .driver_file_name()
            .ok_or(Error::UnsupportedPlatform)?;
        let dir = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => env::current_exe()?
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf(),
        };
        Ok(dir.join(file))
    }

    /// Opens the device, installing the driver service when needed.
    ///
    /// `opener` is called to open the raw device and returns `None` while
    /// it cannot be opened. On failure the service is reinstalled and the
    /// open retried, up to four attempts with a growing pause. An install
    /// failure rides the same retries; the last one is returned once the
    /// attempts run out.
    pub fn initialize<P, O>(&mut self, mut opener: O) -> Result<P>
    where
        P: DriverPort,
        O: FnMut() -> Option<P>,
    {
        if !self.kind.is_supported() {
            self.status = Status::UnsupportedPlatform;
            return Err(Error::UnsupportedPlatform);
        }
        let path = match self.driver_path() {
            Ok(path) => path,
            Err(err) => {
                self.status = Status::UnknownError;
                return Err(err);
            }
        };
        if !path.is_file() {
            self.status = Status::DriverNotFound;
            return Err(Error::DriverNotFound { path });
        }
        if (self.network_check)(&path) {
            self.status = Status::DriverNotLoadedOnNetwork;
            return Err(Error::DriverNotLoadedOnNetwork { path });
        }

        let mut last_err = None;
        for attempt in 0..setup::OPEN_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(self.retry_pause * attempt);
            }
            if let Some(port) = opener() {
                self.status = Status::NoError;
                return Ok(port);
            }
            log::debug!("device open failed, reinstalling service (attempt {attempt})");
            // A stale registration left by a crashed client blocks the open.
            if let Err(err) = self.manage(ServiceRequest::Remove, || false) {
                log::debug!("cleanup before install failed: {err}");
            }
            // The SCM can refuse transiently, say while the service is
            // still marked for delete; the next attempt starts clean.
            if let Err(err) = self.manage(ServiceRequest::Install, || false) {
                log::debug!("service install failed: {err}");
                let _ = self.manage(ServiceRequest::Remove, || false);
                last_err = Some(err);
                continue;
            }
            if let Some(port) = opener() {
                self.status = Status::NoError;
                return Ok(port);
            }
        }
        self.status = Status::DriverNotLoaded;
        Err(last_err.unwrap_or(Error::DriverNotLoaded))
    }

    /// Closes the device and removes the service once the last client left.
    ///
    /// The driver counts open handles; the service is only torn down when
    /// ours is the sole remaining one.
    pub fn deinitialize<P: DriverPort>(&mut self, port: P) -> Result<()> {
        let refcount = DriverClient::with_features(&port, CpuFeatures::none())
            .refcount()
            .unwrap_or(0);
        drop(port);
        if refcount == 1 {
            self.manage(ServiceRequest::Remove, || false)?;
        }
        Ok(())
    }

    /// Applies a service lifecycle request at the resolved driver path.
    pub fn manage<F: FnMut() -> bool>(&self, request: ServiceRequest, probe_open: F) -> Result<()> {
        let path = self.driver_path()?;
        manage_service(&self.scm, constants::DRIVER_ID, &path, request, probe_open)
    }

    /// The outcome of the last [`initialize`](Setup::initialize) call.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Like [`status`](Setup::status), but verifies a live port still
    /// answers. A port that stopped responding reports
    /// [`Status::DriverUnloaded`].
    pub fn probe_status<P: DriverPort + ?Sized>(&self, port: &P) -> Status {
        if self.status != Status::NoError {
            return self.status;
        }
        match DriverClient::with_features(port, CpuFeatures::none()).driver_version() {
            Ok(_) => Status::NoError,
            Err(_) => Status::DriverUnloaded,
        }
    }
}
