//! The transport seam between the typed client and an open device handle.

use crate::error::{Error, Result};

/// One buffered device-I/O-control exchange.
///
/// Implementors hand `input` to the driver under `code` and fill `output`,
/// returning the number of bytes the driver produced. On Windows this maps
/// to `DeviceIoControl` on the opened device; tests drive the client with an
/// in-memory machine instead.
pub trait DriverPort {
    fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize>;
}

impl<P: DriverPort + ?Sized> DriverPort for &P {
    fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        (**self).control(code, input, output)
    }
}

impl<P: DriverPort + ?Sized> DriverPort for Box<P> {
    fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        (**self).control(code, input, output)
    }
}

/// Runs an exchange that must fill `output` exactly.
pub(crate) fn control_exact<P: DriverPort + ?Sized>(
    port: &P,
    code: u32,
    input: &[u8],
    output: &mut [u8],
) -> Result<()> {
    let actual = port.control(code, input, output)?;
    if actual != output.len() {
        return Err(Error::ShortTransfer {
            code,
            expected: output.len(),
            actual,
        });
    }
    Ok(())
}
