//! Driver service lifecycle.
//!
//! The driver ships as a `.sys` file registered as a kernel service. The
//! flows here mirror what a careful installer has to do around stale
//! registrations, concurrent clients, and machine-wide installs.

use std::path::Path;

use crate::error::Result;

/// How the service control manager starts the driver service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// Started on demand. The per-process install uses this.
    Demand,
    /// Started by the system at boot. The machine-wide install uses this.
    Auto,
}

/// The service control manager surface the lifecycle flows need.
///
/// On Windows these map onto the `OpenSCManager`/`CreateService` family;
/// tests use an in-memory fake.
pub trait ServiceControl {
    /// Registers the service. Returns `false` when it already existed.
    fn create(&self, name: &str, driver_path: &Path, start: StartKind) -> Result<bool>;
    /// Deletes the service. Deleting a missing service is not an error.
    fn delete(&self, name: &str) -> Result<()>;
    /// Starts the service. Returns `false` when it was already running.
    fn start(&self, name: &str) -> Result<bool>;
    /// Stops the service.
    fn stop(&self, name: &str) -> Result<()>;
    /// The configured start kind, or `None` when the service is missing.
    fn start_kind(&self, name: &str) -> Result<Option<StartKind>>;
    /// Reconfigures an existing service's start kind and binary path.
    fn set_start_kind(&self, name: &str, driver_path: &Path, start: StartKind) -> Result<()>;
}

impl<S: ServiceControl + ?Sized> ServiceControl for &S {
    fn create(&self, name: &str, driver_path: &Path, start: StartKind) -> Result<bool> {
        (**self).create(name, driver_path, start)
    }
    fn delete(&self, name: &str) -> Result<()> {
        (**self).delete(name)
    }
    fn start(&self, name: &str) -> Result<bool> {
        (**self).start(name)
    }
    fn stop(&self, name: &str) -> Result<()> {
        (**self).stop(name)
    }
    fn start_kind(&self, name: &str) -> Result<Option<StartKind>> {
        (**self).start_kind(name)
    }
    fn set_start_kind(&self, name: &str, driver_path: &Path, start: StartKind) -> Result<()> {
        (**self).set_start_kind(name, driver_path, start)
    }
}

/// Lifecycle operations on the driver service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRequest {
    /// Register the service (demand start) and start it.
    Install,
    /// Stop and delete the service, unless it is system-installed.
    Remove,
    /// Convert the service to start automatically at boot.
    SystemInstall,
    /// Stop and delete an automatically starting service.
    SystemUninstall,
}

/// Whether the service is configured to start with the system.
pub fn is_system_install<S: ServiceControl + ?Sized>(scm: &S, name: &str) -> Result<bool> {
    Ok(scm.start_kind(name)? == Some(StartKind::Auto))
}

/// Applies a lifecycle request to the driver service.
///
/// `probe_open` reports whether the device can currently be opened; the
/// system-install flow uses it to decide whether the service needs a
/// reinstall before being flipped to auto start.
pub fn manage_service<S, F>(
    scm: &S,
    name: &str,
    driver_path: &Path,
    request: ServiceRequest,
    mut probe_open: F,
) -> Result<()>
where
    S: ServiceControl + ?Sized,
    F: FnMut() -> bool,
{
    match request {
        ServiceRequest::Install => {
            if !scm.create(name, driver_path, StartKind::Demand)? {
                log::debug!("service {name} already registered");
            }
            if !scm.start(name)? {
                log::debug!("service {name} already running");
            }
            Ok(())
        }
        ServiceRequest::Remove => {
            if is_system_install(scm, name)? {
                // A machine-wide install outlives individual clients.
                return Ok(());
            }
            // The service may already be stopped; only the delete matters.
            let _ = scm.stop(name);
            scm.delete(name)
        }
        ServiceRequest::SystemInstall => {
            if is_system_install(scm, name)? {
                return Ok(());
            }
            if !probe_open() {
                log::info!("service {name} not openable, reinstalling before system install");
                let _ = scm.stop(name);
                scm.delete(name)?;
                scm.create(name, driver_path, StartKind::Demand)?;
                scm.start(name)?;
                if !probe_open() {
                    log::warn!("service {name} reinstalled but the device did not open");
                }
            }
            scm.set_start_kind(name, driver_path, StartKind::Auto)
        }
        ServiceRequest::SystemUninstall => {
            if !is_system_install(scm, name)? {
                return Ok(());
            }
            scm.stop(name)?;
            scm.delete(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct FakeScm {
        services: RefCell<HashMap<String, (StartKind, bool)>>,
        events: RefCell<Vec<String>>,
        fail_stop: bool,
    }

    impl FakeScm {
        fn with_service(kind: StartKind, running: bool) -> Self {
            let scm = FakeScm::default();
            scm.services
                .borrow_mut()
                .insert("drv".to_string(), (kind, running));
            scm
        }

        fn log(&self, event: &str) {
            self.events.borrow_mut().push(event.to_string());
        }

        fn events(&self) -> Vec<String> {
            self.events.borrow().clone()
        }
    }

    impl ServiceControl for FakeScm {
        fn create(&self, name: &str, _path: &Path, start: StartKind) -> Result<bool> {
            self.log("create");
            let mut services = self.services.borrow_mut();
            if services.contains_key(name) {
                return Ok(false);
            }
            services.insert(name.to_string(), (start, false));
            Ok(true)
        }
        fn delete(&self, name: &str) -> Result<()> {
            self.log("delete");
            self.services.borrow_mut().remove(name);
            Ok(())
        }
        fn start(&self, name: &str) -> Result<bool> {
            self.log("start");
            let mut services = self.services.borrow_mut();
            match services.get_mut(name) {
                Some((_, running)) if *running => Ok(false),
                Some((_, running)) => {
                    *running = true;
                    Ok(true)
                }
                None => Err(Error::Service("no such service".to_string())),
            }
        }
        fn stop(&self, name: &str) -> Result<()> {
            self.log("stop");
            if self.fail_stop {
                return Err(Error::Service("stop refused".to_string()));
            }
            if let Some((_, running)) = self.services.borrow_mut().get_mut(name) {
                *running = false;
            }
            Ok(())
        }
        fn start_kind(&self, name: &str) -> Result<Option<StartKind>> {
            Ok(self.services.borrow().get(name).map(|(kind, _)| *kind))
        }
        fn set_start_kind(&self, name: &str, _path: &Path, start: StartKind) -> Result<()> {
            self.log("set_start_kind");
            if let Some((kind, _)) = self.services.borrow_mut().get_mut(name) {
                *kind = start;
            }
            Ok(())
        }
    }

    fn path() -> PathBuf {
        PathBuf::from("WinRing0x64.sys")
    }

    #[test]
    fn install_creates_and_starts() {
        let scm = FakeScm::default();
        manage_service(&scm, "drv", &path(), ServiceRequest::Install, || false).unwrap();
        assert_eq!(scm.events(), ["create", "start"]);
        assert_eq!(scm.start_kind("drv").unwrap(), Some(StartKind::Demand));
    }

    #[test]
    fn install_tolerates_existing_running_service() {
        let scm = FakeScm::with_service(StartKind::Demand, true);
        manage_service(&scm, "drv", &path(), ServiceRequest::Install, || false).unwrap();
        assert_eq!(scm.events(), ["create", "start"]);
    }

    #[test]
    fn remove_stops_and_deletes() {
        let scm = FakeScm::with_service(StartKind::Demand, true);
        manage_service(&scm, "drv", &path(), ServiceRequest::Remove, || false).unwrap();
        assert_eq!(scm.events(), ["stop", "delete"]);
        assert_eq!(scm.start_kind("drv").unwrap(), None);
    }

    #[test]
    fn remove_ignores_stop_failure() {
        let mut scm = FakeScm::with_service(StartKind::Demand, true);
        scm.fail_stop = true;
        manage_service(&scm, "drv", &path(), ServiceRequest::Remove, || false).unwrap();
        assert_eq!(scm.events(), ["stop", "delete"]);
    }

    #[test]
    fn remove_skips_system_installed_service() {
        let scm = FakeScm::with_service(StartKind::Auto, true);
        manage_service(&scm, "drv", &path(), ServiceRequest::Remove, || false).unwrap();
        assert!(scm.events().is_empty());
        assert_eq!(scm.start_kind("drv").unwrap(), Some(StartKind::Auto));
    }

    #[test]
    fn remove_of_missing_service_is_ok() {
        let scm = FakeScm::default();
        manage_service(&scm, "drv", &path(), ServiceRequest::Remove, || false).unwrap();
    }

    #[test]
    fn system_install_when_already_auto() {
        let scm = FakeScm::with_service(StartKind::Auto, true);
        manage_service(&scm, "drv", &path(), ServiceRequest::SystemInstall, || true).unwrap();
        assert!(scm.events().is_empty());
    }

    #[test]
    fn system_install_flips_openable_service() {
        let scm = FakeScm::with_service(StartKind::Demand, true);
        manage_service(&scm, "drv", &path(), ServiceRequest::SystemInstall, || true).unwrap();
        assert_eq!(scm.events(), ["set_start_kind"]);
        assert_eq!(scm.start_kind("drv").unwrap(), Some(StartKind::Auto));
    }

    #[test]
    fn system_install_reinstalls_unopenable_service() {
        let scm = FakeScm::with_service(StartKind::Demand, false);
        manage_service(&scm, "drv", &path(), ServiceRequest::SystemInstall, || {
            false
        })
        .unwrap();
        assert_eq!(
            scm.events(),
            ["stop", "delete", "create", "start", "set_start_kind"]
        );
        assert_eq!(scm.start_kind("drv").unwrap(), Some(StartKind::Auto));
    }

    #[test]
    fn system_uninstall_when_not_auto() {
        let scm = FakeScm::with_service(StartKind::Demand, true);
        manage_service(&scm, "drv", &path(), ServiceRequest::SystemUninstall, || {
            false
        })
        .unwrap();
        assert!(scm.events().is_empty());
    }

    #[test]
    fn system_uninstall_stops_and_deletes() {
        let scm = FakeScm::with_service(StartKind::Auto, true);
        manage_service(&scm, "drv", &path(), ServiceRequest::SystemUninstall, || {
            false
        })
        .unwrap();
        assert_eq!(scm.events(), ["stop", "delete"]);
    }

    #[test]
    fn system_uninstall_propagates_stop_failure() {
        let mut scm = FakeScm::with_service(StartKind::Auto, true);
        scm.fail_stop = true;
        let err = manage_service(&scm, "drv", &path(), ServiceRequest::SystemUninstall, || {
            false
        })
        .unwrap_err();
        assert!(matches!(err, Error::Service(_)));
        assert_eq!(scm.events(), ["stop"]);
    }

    #[test]
    fn system_install_means_auto_start() {
        let scm = FakeScm::with_service(StartKind::Auto, false);
        assert!(is_system_install(&scm, "drv").unwrap());
        assert!(!is_system_install(&scm, "other").unwrap());
    }
}
