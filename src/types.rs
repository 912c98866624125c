//! Shared plain types: PCI addressing, driver identity, CPU capabilities.

use std::fmt;

use crate::constants;

/// A PCI bus/device/function triple.
///
/// The driver addresses configuration space through a packed 32-bit form:
/// `(bus & 0xFF) << 8 | (device & 0x1F) << 3 | (function & 7)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciAddress {
    /// Bus number (0..=255).
    pub bus: u8,
    /// Device number on the bus (0..=31).
    pub device: u8,
    /// Function number on the device (0..=7).
    pub function: u8,
}

impl PciAddress {
    /// Creates an address, masking `device` and `function` to their
    /// architectural widths.
    pub fn new(bus: u8, device: u8, function: u8) -> Self {
        PciAddress {
            bus,
            device: device & 0x1F,
            function: function & 7,
        }
    }

    /// The packed form the driver consumes.
    pub fn packed(self) -> u32 {
        ((self.bus as u32) << 8) | ((self.device as u32 & 0x1F) << 3) | (self.function as u32 & 7)
    }

    /// Rebuilds an address from its packed form.
    pub fn from_packed(value: u32) -> Self {
        PciAddress {
            bus: ((value >> 8) & 0xFF) as u8,
            device: ((value >> 3) & 0x1F) as u8,
            function: (value & 7) as u8,
        }
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

/// A driver version word, packed as `major.minor.revision.release` in one
/// byte each, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
    pub release: u8,
}

impl DriverVersion {
    /// Decodes the packed version word.
    pub fn from_packed(value: u32) -> Self {
        DriverVersion {
            major: ((value >> 24) & 0xFF) as u8,
            minor: ((value >> 16) & 0xFF) as u8,
            revision: ((value >> 8) & 0xFF) as u8,
            release: (value & 0xFF) as u8,
        }
    }

    /// Re-packs the version into its wire form.
    pub fn packed(self) -> u32 {
        ((self.major as u32) << 24)
            | ((self.minor as u32) << 16)
            | ((self.revision as u32) << 8)
            | self.release as u32
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.revision, self.release
        )
    }
}

/// Access widths for physical memory reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum UnitSize {
    Byte = 1,
    Word = 2,
    Dword = 4,
    Qword = 8,
}

impl UnitSize {
    /// Width in bytes.
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Decodes a wire unit value.
    pub fn from_raw(value: u32) -> Option<UnitSize> {
        match value {
            1 => Some(UnitSize::Byte),
            2 => Some(UnitSize::Word),
            4 => Some(UnitSize::Dword),
            8 => Some(UnitSize::Qword),
            _ => None,
        }
    }
}

/// CPU capabilities the client gates operations on.
///
/// `msr` and `tsc` come from CPUID leaf 1 EDX bits 5 and 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuFeatures {
    /// CPUID itself is executable.
    pub cpuid: bool,
    /// RDMSR/WRMSR are supported.
    pub msr: bool,
    /// RDTSC is supported.
    pub tsc: bool,
}

impl CpuFeatures {
    /// Probes the running CPU. On non-x86 hosts every gate is off.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86")]
        use core::arch::x86::__cpuid;
        #[cfg(target_arch = "x86_64")]
        use core::arch::x86_64::__cpuid;

        // CPUID exists on every target Rust compiles this arm for.
        let leaf1 = unsafe { __cpuid(1) };
        CpuFeatures {
            cpuid: true,
            msr: (leaf1.edx >> 5) & 1 != 0,
            tsc: (leaf1.edx >> 4) & 1 != 0,
        }
    }

    /// Probes the running CPU. On non-x86 hosts every gate is off.
    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    pub fn detect() -> Self {
        Self::none()
    }

    /// All gates off.
    pub fn none() -> Self {
        CpuFeatures {
            cpuid: false,
            msr: false,
            tsc: false,
        }
    }

    /// All gates on. Useful against mock transports.
    pub fn all() -> Self {
        CpuFeatures {
            cpuid: true,
            msr: true,
            tsc: true,
        }
    }
}

/// The registers CPUID returns for one leaf/subleaf query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuidRegs {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Which driver binary a host needs.
///
/// A 32-bit process on 64-bit Windows must load the x64 driver; compile-time
/// detection cannot see through WOW64, so such embedders pass `WinNtX64`
/// explicitly instead of using [`DriverKind::host`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// 32-bit NT kernels.
    WinNt,
    /// 64-bit NT kernels.
    WinNtX64,
    /// No driver exists for this platform.
    Unknown,
}

impl DriverKind {
    /// Picks the kind matching the compile target.
    pub fn host() -> Self {
        if cfg!(all(target_os = "windows", target_arch = "x86_64")) {
            DriverKind::WinNtX64
        } else if cfg!(all(target_os = "windows", target_arch = "x86")) {
            DriverKind::WinNt
        } else {
            DriverKind::Unknown
        }
    }

    /// File name of the matching driver binary.
    pub fn driver_file_name(self) -> Option<&'static str> {
        match self {
            DriverKind::WinNt => Some(constants::DRIVER_FILE_NT),
            DriverKind::WinNtX64 => Some(constants::DRIVER_FILE_NT_X64),
            DriverKind::Unknown => None,
        }
    }

    /// Whether a driver binary exists for this kind.
    pub fn is_supported(self) -> bool {
        !matches!(self, DriverKind::Unknown)
    }
}

/// Coarse driver load state, as reported to embedding applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NoError,
    UnsupportedPlatform,
    DriverNotLoaded,
    DriverNotFound,
    DriverUnloaded,
    DriverNotLoadedOnNetwork,
    UnknownError,
}

impl Status {
    /// Numeric status word for embedders that report a plain code.
    pub fn code(self) -> u32 {
        match self {
            Status::NoError => 0,
            Status::UnsupportedPlatform => 1,
            Status::DriverNotLoaded => 2,
            Status::DriverNotFound => 3,
            Status::DriverUnloaded => 4,
            Status::DriverNotLoadedOnNetwork => 5,
            Status::UnknownError => 9,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::NoError => "no error",
            Status::UnsupportedPlatform => "unsupported platform",
            Status::DriverNotLoaded => "driver not loaded",
            Status::DriverNotFound => "driver binary not found",
            Status::DriverUnloaded => "driver unloaded",
            Status::DriverNotLoadedOnNetwork => "driver not loaded from a network path",
            Status::UnknownError => "unknown error",
        };
        f.write_str(text)
    }
}
