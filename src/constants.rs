//! Driver identity strings and I/O control plumbing.

use std::time::Duration;

/// Service and device identity of the bundled kernel driver.
pub const DRIVER_ID: &str = "WinRing0_1_2_0";

/// Win32 path user code opens.
pub const DEVICE_PATH: &str = r"\\.\WinRing0_1_2_0";

/// Kernel-side device object name.
pub const NT_DEVICE_NAME: &str = r"\Device\WinRing0_1_2_0";

/// DOS symbolic link the driver publishes.
pub const DOS_DEVICE_NAME: &str = r"\DosDevices\WinRing0_1_2_0";

/// Driver binary for 32-bit NT kernels.
pub const DRIVER_FILE_NT: &str = "WinRing0.sys";

/// Driver binary for 64-bit NT kernels.
pub const DRIVER_FILE_NT_X64: &str = "WinRing0x64.sys";

/// Builds an NT I/O control code from its four fields.
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Control codes understood by the driver.
pub mod ioctl {
    use super::ctl_code;

    /// Device type the driver registers under.
    pub const DEVICE_TYPE: u32 = 40000;

    pub const METHOD_BUFFERED: u32 = 0;
    pub const FILE_ANY_ACCESS: u32 = 0;
    pub const FILE_READ_ACCESS: u32 = 1;
    pub const FILE_WRITE_ACCESS: u32 = 2;

    pub const GET_DRIVER_VERSION: u32 =
        ctl_code(DEVICE_TYPE, 0x800, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const GET_REFCOUNT: u32 = ctl_code(DEVICE_TYPE, 0x801, METHOD_BUFFERED, FILE_ANY_ACCESS);

    pub const READ_MSR: u32 = ctl_code(DEVICE_TYPE, 0x821, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const WRITE_MSR: u32 = ctl_code(DEVICE_TYPE, 0x822, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const READ_PMC: u32 = ctl_code(DEVICE_TYPE, 0x823, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const HALT: u32 = ctl_code(DEVICE_TYPE, 0x824, METHOD_BUFFERED, FILE_ANY_ACCESS);

    pub const READ_IO_PORT_BYTE: u32 =
        ctl_code(DEVICE_TYPE, 0x833, METHOD_BUFFERED, FILE_READ_ACCESS);
    pub const READ_IO_PORT_WORD: u32 =
        ctl_code(DEVICE_TYPE, 0x834, METHOD_BUFFERED, FILE_READ_ACCESS);
    pub const READ_IO_PORT_DWORD: u32 =
        ctl_code(DEVICE_TYPE, 0x835, METHOD_BUFFERED, FILE_READ_ACCESS);

    pub const WRITE_IO_PORT_BYTE: u32 =
        ctl_code(DEVICE_TYPE, 0x836, METHOD_BUFFERED, FILE_WRITE_ACCESS);
    pub const WRITE_IO_PORT_WORD: u32 =
        ctl_code(DEVICE_TYPE, 0x837, METHOD_BUFFERED, FILE_WRITE_ACCESS);
    pub const WRITE_IO_PORT_DWORD: u32 =
        ctl_code(DEVICE_TYPE, 0x838, METHOD_BUFFERED, FILE_WRITE_ACCESS);

    pub const READ_MEMORY: u32 = ctl_code(DEVICE_TYPE, 0x841, METHOD_BUFFERED, FILE_READ_ACCESS);
    pub const WRITE_MEMORY: u32 = ctl_code(DEVICE_TYPE, 0x842, METHOD_BUFFERED, FILE_WRITE_ACCESS);

    pub const READ_PCI_CONFIG: u32 =
        ctl_code(DEVICE_TYPE, 0x851, METHOD_BUFFERED, FILE_READ_ACCESS);
    pub const WRITE_PCI_CONFIG: u32 =
        ctl_code(DEVICE_TYPE, 0x852, METHOD_BUFFERED, FILE_WRITE_ACCESS);
}

/// PCI topology limits and configuration-space landmarks.
pub mod pci {
    pub const DEVICES_PER_BUS: u8 = 32;
    pub const FUNCTIONS_PER_DEVICE: u8 = 8;

    /// Highest bus number a device scan visits by default.
    pub const DEFAULT_MAX_BUS: u8 = 255;

    /// Offset of the header type byte in configuration space.
    pub const HEADER_TYPE_OFFSET: u32 = 0x0E;

    /// Header type bit marking a multifunction device.
    pub const MULTIFUNCTION_BIT: u8 = 0x80;

    /// Vendor ID read back from an empty slot.
    pub const INVALID_VENDOR: u16 = 0xFFFF;
}

/// The legacy BIOS window that holds the DMI/SMBIOS tables.
pub mod dmi {
    pub const BASE: u64 = 0x000F_0000;
    pub const WINDOW: usize = 65536;
}

/// Device open retry policy used during initialization.
pub mod setup {
    use super::Duration;

    pub const OPEN_ATTEMPTS: u32 = 4;

    /// The pause grows linearly: `RETRY_STEP * attempt`.
    pub const RETRY_STEP: Duration = Duration::from_millis(100);
}
