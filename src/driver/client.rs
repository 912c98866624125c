//! Typed operations over an open driver handle.

use crate::constants::{dmi, ioctl, pci};
use crate::driver::ioctl as wire;
use crate::driver::ioctl::PortWidth;
use crate::driver::port::{control_exact, DriverPort};
use crate::error::{Error, Result};
use crate::types::{CpuFeatures, CpuidRegs, DriverVersion, PciAddress, UnitSize};

/// A typed client over an open driver handle.
///
/// The client is sans-IO: `P` supplies the actual device exchanges. CPU
/// feature gates are captured at construction; MSR and TSC operations are
/// refused on hosts whose CPUID does not advertise them, without touching
/// the driver.
#[derive(Debug)]
pub struct DriverClient<P> {
    port: P,
    features: CpuFeatures,
    max_bus: u8,
}

impl<P: DriverPort> DriverClient<P> {
    /// Wraps an open handle, probing the host CPU for feature gates.
    pub fn new(port: P) -> Self {
        DriverClient::with_features(port, CpuFeatures::detect())
    }

    /// Wraps an open handle with explicit feature gates.
    pub fn with_features(port: P, features: CpuFeatures) -> Self {
        DriverClient {
            port,
            features,
            max_bus: pci::DEFAULT_MAX_BUS,
        }
    }

    /// The feature gates this client was built with.
    pub fn features(&self) -> CpuFeatures {
        self.features
    }

    /// Limits PCI scans to buses `0..=max_bus`.
    pub fn set_pci_max_bus(&mut self, max_bus: u8) {
        self.max_bus = max_bus;
    }

    /// Releases the underlying handle.
    pub fn into_inner(self) -> P {
        self.port
    }

    // ---- Driver identity ----

    /// Reads the driver's version word.
    ///
    /// A version of zero means the driver was unloaded behind the handle;
    /// that reads as [`Error::DriverUnloaded`].
    pub fn driver_version(&self) -> Result<DriverVersion> {
        let mut out = [0u8; 4];
        control_exact(&self.port, ioctl::GET_DRIVER_VERSION, &[], &mut out)?;
        let packed = u32::from_le_bytes(out);
        if packed == 0 {
            return Err(Error::DriverUnloaded);
        }
        Ok(DriverVersion::from_packed(packed))
    }

    /// Number of open handles the driver currently serves.
    pub fn refcount(&self) -> Result<u32> {
        let mut out = [0u8; 4];
        control_exact(&self.port, ioctl::GET_REFCOUNT, &[], &mut out)?;
        Ok(u32::from_le_bytes(out))
    }

    // ---- MSRs and performance counters ----

    /// Reads a model-specific register.
    pub fn read_msr(&self, index: u32) -> Result<u64> {
        self.require_msr()?;
        let mut out = [0u8; 8];
        control_exact(&self.port, ioctl::READ_MSR, &index.to_le_bytes(), &mut out)?;
        Ok(u64::from_le_bytes(out))
    }

    /// Writes a model-specific register.
    pub fn write_msr(&self, index: u32, value: u64) -> Result<()> {
        self.require_msr()?;
        let input = wire::encode_write_msr(index, value);
        // The driver reports a dummy status word here; its length is not
        // part of the contract.
        let mut out = [0u8; 4];
        self.port.control(ioctl::WRITE_MSR, &input, &mut out)?;
        Ok(())
    }

    /// Reads a performance monitoring counter. PMC access has no CPUID gate.
    pub fn read_pmc(&self, index: u32) -> Result<u64> {
        let mut out = [0u8; 8];
        control_exact(&self.port, ioctl::READ_PMC, &index.to_le_bytes(), &mut out)?;
        Ok(u64::from_le_bytes(out))
    }

    /// Executes HLT in ring 0.
    pub fn halt(&self) -> Result<()> {
        self.port.control(ioctl::HALT, &[], &mut [])?;
        Ok(())
    }

    fn require_msr(&self) -> Result<()> {
        if !self.features.msr {
            return Err(Error::CpuFeature("MSR"));
        }
        Ok(())
    }

    // ---- Local CPU queries ----

    /// Runs CPUID on the calling thread's CPU. No driver exchange.
    pub fn cpuid(&self, leaf: u32, subleaf: u32) -> Result<CpuidRegs> {
        if !self.features.cpuid {
            return Err(Error::CpuFeature("CPUID"));
        }
        cpuid_local(leaf, subleaf)
    }

    /// Reads the calling thread's time-stamp counter. No driver exchange.
    pub fn rdtsc(&self) -> Result<u64> {
        if !self.features.tsc {
            return Err(Error::CpuFeature("TSC"));
        }
        rdtsc_local()
    }

    // ---- I/O ports ----

    /// Reads a byte from an I/O port.
    pub fn read_io_port_byte(&self, port: u16) -> Result<u8> {
        let input = wire::encode_port_read(port, PortWidth::Byte);
        let mut out = [0u8; 2];
        self.port.control(ioctl::READ_IO_PORT_BYTE, &input, &mut out)?;
        Ok(out[0])
    }

    /// Reads a word from an I/O port.
    pub fn read_io_port_word(&self, port: u16) -> Result<u16> {
        let input = wire::encode_port_read(port, PortWidth::Word);
        let mut out = [0u8; 2];
        self.port.control(ioctl::READ_IO_PORT_WORD, &input, &mut out)?;
        Ok(u16::from_le_bytes(out))
    }

    /// Reads a dword from an I/O port.
    pub fn read_io_port_dword(&self, port: u16) -> Result<u32> {
        let input = wire::encode_port_read(port, PortWidth::Dword);
        let mut out = [0u8; 4];
        self.port
            .control(ioctl::READ_IO_PORT_DWORD, &input, &mut out)?;
        Ok(u32::from_le_bytes(out))
    }

    /// Writes a byte to an I/O port.
    pub fn write_io_port_byte(&self, port: u16, value: u8) -> Result<()> {
        let input = wire::encode_port_write(port, value as u32, PortWidth::Byte);
        self.port.control(ioctl::WRITE_IO_PORT_BYTE, &input, &mut [])?;
        Ok(())
    }

    /// Writes a word to an I/O port.
    pub fn write_io_port_word(&self, port: u16, value: u16) -> Result<()> {
        let input = wire::encode_port_write(port, value as u32, PortWidth::Word);
        self.port.control(ioctl::WRITE_IO_PORT_WORD, &input, &mut [])?;
        Ok(())
    }

    /// Writes a dword to an I/O port.
    pub fn write_io_port_dword(&self, port: u16, value: u32) -> Result<()> {
        let input = wire::encode_port_write(port, value, PortWidth::Dword);
        self.port
            .control(ioctl::WRITE_IO_PORT_DWORD, &input, &mut [])?;
        Ok(())
    }

    // ---- PCI configuration space ----

    /// Reads `out.len()` bytes of configuration space at `offset`.
    ///
    /// Two-byte accesses must be two-byte aligned and four-byte accesses
    /// four-byte aligned; other lengths are unrestricted.
    pub fn read_pci_config(&self, address: PciAddress, offset: u32, out: &mut [u8]) -> Result<()> {
        check_pci_alignment(offset, out.len())?;
        let input = wire::encode_pci_access(address.packed(), offset);
        control_exact(&self.port, ioctl::READ_PCI_CONFIG, &input, out)
    }

    /// Writes `data` to configuration space at `offset`. Same alignment
    /// rules as [`read_pci_config`](Self::read_pci_config).
    pub fn write_pci_config(&self, address: PciAddress, offset: u32, data: &[u8]) -> Result<()> {
        check_pci_alignment(offset, data.len())?;
        let input = wire::encode_pci_write(address.packed(), offset, data);
        self.port.control(ioctl::WRITE_PCI_CONFIG, &input, &mut [])?;
        Ok(())
    }

    /// Reads one configuration byte.
    pub fn read_pci_config_u8(&self, address: PciAddress, offset: u32) -> Result<u8> {
        let mut out = [0u8; 1];
        self.read_pci_config(address, offset, &mut out)?;
        Ok(out[0])
    }

    /// Reads one configuration word.
    pub fn read_pci_config_u16(&self, address: PciAddress, offset: u32) -> Result<u16> {
        let mut out = [0u8; 2];
        self.read_pci_config(address, offset, &mut out)?;
        Ok(u16::from_le_bytes(out))
    }

    /// Reads one configuration dword.
    pub fn read_pci_config_u32(&self, address: PciAddress, offset: u32) -> Result<u32> {
        let mut out = [0u8; 4];
        self.read_pci_config(address, offset, &mut out)?;
        Ok(u32::from_le_bytes(out))
    }

    /// Writes one configuration byte.
    pub fn write_pci_config_u8(&self, address: PciAddress, offset: u32, value: u8) -> Result<()> {
        self.write_pci_config(address, offset, &[value])
    }

    /// Writes one configuration word.
    pub fn write_pci_config_u16(&self, address: PciAddress, offset: u32, value: u16) -> Result<()> {
        self.write_pci_config(address, offset, &value.to_le_bytes())
    }

    /// Writes one configuration dword.
    pub fn write_pci_config_u32(&self, address: PciAddress, offset: u32, value: u32) -> Result<()> {
        self.write_pci_config(address, offset, &value.to_le_bytes())
    }

    // ---- PCI scanning ----

    /// Finds the `index`-th device carrying a vendor/device ID pair.
    ///
    /// Walks buses `0..=max_bus`, 32 devices each, honoring the header
    /// multifunction bit before probing functions past 0. Slots that fail
    /// to read are skipped. `vendor` must not be `0xFFFF`.
    pub fn find_pci_device_by_id(
        &self,
        vendor: u16,
        device: u16,
        index: u8,
    ) -> Result<Option<PciAddress>> {
        if vendor == pci::INVALID_VENDOR {
            return Err(Error::InvalidArgument("vendor 0xFFFF never matches"));
        }
        let target = (vendor as u32) | ((device as u32) << 16);
        let mut count = 0u32;
        for bus in 0..=self.max_bus {
            for dev in 0..pci::DEVICES_PER_BUS {
                let mut multifunction = false;
                for func in 0..pci::FUNCTIONS_PER_DEVICE {
                    if func > 0 && !multifunction {
                        break;
                    }
                    let addr = PciAddress::new(bus, dev, func);
                    let Ok(id) = self.read_pci_config_u32(addr, 0) else {
                        continue;
                    };
                    if func == 0 {
                        multifunction = self.is_multifunction(addr);
                    }
                    if id == target {
                        log::trace!("pci id match {addr} (match {count})");
                        if count == u32::from(index) {
                            return Ok(Some(addr));
                        }
                        count += 1;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Finds the `index`-th device of a class, matched on the base class,
    /// subclass, and programming interface bytes.
    pub fn find_pci_device_by_class(
        &self,
        base: u8,
        sub: u8,
        prog_if: u8,
        index: u8,
    ) -> Result<Option<PciAddress>> {
        let target =
            ((base as u32) << 24) | ((sub as u32) << 16) | ((prog_if as u32) << 8);
        let mut count = 0u32;
        for bus in 0..=self.max_bus {
            for dev in 0..pci::DEVICES_PER_BUS {
                let mut multifunction = false;
                for func in 0..pci::FUNCTIONS_PER_DEVICE {
                    if func > 0 && !multifunction {
                        break;
                    }
                    let addr = PciAddress::new(bus, dev, func);
                    let mut conf = [0u8; 12];
                    if self.read_pci_config(addr, 0, &mut conf).is_err() {
                        continue;
                    }
                    if func == 0 {
                        multifunction = self.is_multifunction(addr);
                    }
                    let id = u32::from_le_bytes([conf[0], conf[1], conf[2], conf[3]]);
                    if id == 0xFFFF_FFFF {
                        // Empty slot.
                        continue;
                    }
                    let class = u32::from_le_bytes([conf[8], conf[9], conf[10], conf[11]]);
                    if class & 0xFFFF_FF00 == target {
                        log::trace!("pci class match {addr} (match {count})");
                        if count == u32::from(index) {
                            return Ok(Some(addr));
                        }
                        count += 1;
                    }
                }
            }
        }
        Ok(None)
    }

    fn is_multifunction(&self, addr: PciAddress) -> bool {
        // A header that cannot be read scans as single-function; only the
        // 0xFF an empty slot floats to opens up functions past 0.
        self.read_pci_config_u8(addr, pci::HEADER_TYPE_OFFSET)
            .map(|header| header & pci::MULTIFUNCTION_BIT != 0)
            .unwrap_or(false)
    }
}

#[cfg(feature = "physical-memory")]
impl<P: DriverPort> DriverClient<P> {
    // ---- Physical memory ----

    /// Reads the DMI/SMBIOS window from conventional memory.
    ///
    /// Reads start at physical `0xF0000` and are capped at the 64 KiB the
    /// window spans.
    pub fn read_dmi_memory(&self, count: u32, unit: UnitSize) -> Result<Vec<u8>> {
        if memory_span(count, unit)? > dmi::WINDOW {
            return Err(Error::InvalidArgument("DMI reads are capped at 64 KiB"));
        }
        self.read_physical_memory(dmi::BASE, count, unit)
    }

    /// Reads `count` units of physical memory at `address`.
    pub fn read_physical_memory(
        &self,
        address: u64,
        count: u32,
        unit: UnitSize,
    ) -> Result<Vec<u8>> {
        let span = memory_span(count, unit)?;
        let input = wire::encode_memory_request(address, unit, count);
        let mut out = vec![0u8; span];
        control_exact(&self.port, ioctl::READ_MEMORY, &input, &mut out)?;
        Ok(out)
    }

    /// Writes `data` to physical memory at `address`, in `unit` strides.
    /// `data` must be a whole number of units.
    pub fn write_physical_memory(&self, address: u64, data: &[u8], unit: UnitSize) -> Result<()> {
        if data.len() % unit.bytes() != 0 {
            return Err(Error::InvalidArgument(
                "payload is not a whole number of units",
            ));
        }
        let input = wire::encode_memory_write(address, unit, data);
        self.port.control(ioctl::WRITE_MEMORY, &input, &mut [])?;
        Ok(())
    }
}

#[cfg(feature = "physical-memory")]
fn memory_span(count: u32, unit: UnitSize) -> Result<usize> {
    usize::try_from(count as u64 * unit.bytes() as u64)
        .map_err(|_| Error::InvalidArgument("memory span too large"))
}

fn check_pci_alignment(offset: u32, width: usize) -> Result<()> {
    let aligned = match width {
        2 => offset & 1 == 0,
        4 => offset & 3 == 0,
        _ => true,
    };
    if !aligned {
        return Err(Error::MisalignedPciAccess { offset, width });
    }
    Ok(())
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cpuid_local(leaf: u32, subleaf: u32) -> Result<CpuidRegs> {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::__cpuid_count;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::__cpuid_count;

    // The caller holds the cpuid feature gate.
    let r = unsafe { __cpuid_count(leaf, subleaf) };
    Ok(CpuidRegs {
        eax: r.eax,
        ebx: r.ebx,
        ecx: r.ecx,
        edx: r.edx,
    })
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn cpuid_local(_leaf: u32, _subleaf: u32) -> Result<CpuidRegs> {
    Err(Error::CpuFeature("CPUID"))
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn rdtsc_local() -> Result<u64> {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::_rdtsc;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::_rdtsc;

    // The caller holds the tsc feature gate.
    Ok(unsafe { _rdtsc() })
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn rdtsc_local() -> Result<u64> {
    Err(Error::CpuFeature("TSC"))
}
