//! Wire marshalling for the driver's buffered control exchanges.
//!
//! Every request and response travels as a little-endian byte buffer whose
//! layout the driver fixes. The encoders here build request buffers; the
//! decoders take them apart again, which the typed client uses for a few
//! responses and test doubles use to play the driver's side.

use crate::error::{Error, Result};
use crate::types::UnitSize;

/// Access widths for I/O port operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortWidth {
    Byte,
    Word,
    Dword,
}

impl PortWidth {
    /// Width of the value in bytes.
    pub fn bytes(self) -> usize {
        match self {
            PortWidth::Byte => 1,
            PortWidth::Word => 2,
            PortWidth::Dword => 4,
        }
    }

    /// Buffer length of a port read. Byte reads travel as words.
    pub fn read_len(self) -> usize {
        match self {
            PortWidth::Byte | PortWidth::Word => 2,
            PortWidth::Dword => 4,
        }
    }
}

// ---- Request encoders ----

/// `u32 register` followed by the `u64` value to store.
pub fn encode_write_msr(register: u32, value: u64) -> [u8; 12] {
    let mut buf = [0u8; 12];
    buf[..4].copy_from_slice(&register.to_le_bytes());
    buf[4..].copy_from_slice(&value.to_le_bytes());
    buf
}

/// Port number, as a word for byte/word reads and a dword for dword reads.
pub fn encode_port_read(port: u16, width: PortWidth) -> Vec<u8> {
    match width {
        PortWidth::Byte | PortWidth::Word => port.to_le_bytes().to_vec(),
        PortWidth::Dword => (port as u32).to_le_bytes().to_vec(),
    }
}

/// `u32 port` followed by the value in its natural width.
pub fn encode_port_write(port: u16, value: u32, width: PortWidth) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + width.bytes());
    buf.extend_from_slice(&(port as u32).to_le_bytes());
    buf.extend_from_slice(&value.to_le_bytes()[..width.bytes()]);
    buf
}

/// `u32 packed-address` followed by `u32 register offset`.
pub fn encode_pci_access(address: u32, offset: u32) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&address.to_le_bytes());
    buf[4..].copy_from_slice(&offset.to_le_bytes());
    buf
}

/// The PCI access header followed by the bytes to store.
pub fn encode_pci_write(address: u32, offset: u32, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + data.len());
    buf.extend_from_slice(&encode_pci_access(address, offset));
    buf.extend_from_slice(data);
    buf
}

/// `u64 physical address`, `u32 unit size`, `u32 unit count`.
pub fn encode_memory_request(address: u64, unit: UnitSize, count: u32) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&address.to_le_bytes());
    buf[8..12].copy_from_slice(&(unit as u32).to_le_bytes());
    buf[12..].copy_from_slice(&count.to_le_bytes());
    buf
}

/// The memory request header followed by the payload to store.
pub fn encode_memory_write(address: u64, unit: UnitSize, payload: &[u8]) -> Vec<u8> {
    let count = (payload.len() / unit.bytes()) as u32;
    let mut buf = Vec::with_capacity(16 + payload.len());
    buf.extend_from_slice(&encode_memory_request(address, unit, count));
    buf.extend_from_slice(payload);
    buf
}

// ---- Request and response decoders ----

/// Reads a port value out of a response buffer.
pub fn decode_port_value(width: PortWidth, output: &[u8]) -> Result<u32> {
    if output.len() < width.read_len() {
        return Err(Error::InvalidArgument("port read response too short"));
    }
    Ok(match width {
        PortWidth::Byte => output[0] as u32,
        PortWidth::Word => u16_at(output, 0) as u32,
        PortWidth::Dword => u32_at(output, 0),
    })
}

pub fn decode_write_msr(input: &[u8]) -> Result<(u32, u64)> {
    if input.len() != 12 {
        return Err(Error::InvalidArgument("malformed write-msr request"));
    }
    Ok((u32_at(input, 0), u64_at(input, 4)))
}

pub fn decode_port_read(input: &[u8]) -> Result<u16> {
    match input.len() {
        2 => Ok(u16_at(input, 0)),
        4 => Ok(u32_at(input, 0) as u16),
        _ => Err(Error::InvalidArgument("malformed port read request")),
    }
}

pub fn decode_port_write(input: &[u8]) -> Result<(u16, u32, PortWidth)> {
    let width = match input.len() {
        5 => PortWidth::Byte,
        6 => PortWidth::Word,
        8 => PortWidth::Dword,
        _ => return Err(Error::InvalidArgument("malformed port write request")),
    };
    let port = u32_at(input, 0) as u16;
    let value = match width {
        PortWidth::Byte => input[4] as u32,
        PortWidth::Word => u16_at(input, 4) as u32,
        PortWidth::Dword => u32_at(input, 4),
    };
    Ok((port, value, width))
}

/// Splits a PCI request into its packed address and register offset. Write
/// requests carry their payload after this 8-byte header.
pub fn decode_pci_access(input: &[u8]) -> Result<(u32, u32)> {
    if input.len() < 8 {
        return Err(Error::InvalidArgument("malformed pci request"));
    }
    Ok((u32_at(input, 0), u32_at(input, 4)))
}

/// Splits a memory request into address, unit size, and unit count. Write
/// requests carry their payload after this 16-byte header.
pub fn decode_memory_request(input: &[u8]) -> Result<(u64, UnitSize, u32)> {
    if input.len() < 16 {
        return Err(Error::InvalidArgument("malformed memory request"));
    }
    let unit = UnitSize::from_raw(u32_at(input, 8))
        .ok_or(Error::InvalidArgument("bad memory unit size"))?;
    Ok((u64_at(input, 0), unit, u32_at(input, 12)))
}

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn u64_at(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
