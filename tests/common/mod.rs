#![allow(dead_code)]

//! An in-memory machine behind the driver's control interface.
//!
//! Answers every control code the driver supports from plain maps, so
//! client and setup logic can be exercised without a kernel driver.

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::io;

use spdrw::constants::ioctl;
use spdrw::driver::ioctl as wire;
use spdrw::driver::DriverPort;
use spdrw::{DriverVersion, Error, PciAddress, Result};

#[derive(Debug)]
pub struct MachineState {
    pub version: u32,
    pub refcount: u32,
    pub msrs: HashMap<u32, u64>,
    pub ports: HashMap<u16, u32>,
    pub pci: HashMap<u32, [u8; 256]>,
    pub memory_base: u64,
    pub memory: Vec<u8>,
    pub halted: bool,
    /// Every exchange fails with an I/O error.
    pub fail_all: bool,
    /// Every exchange reports one byte less than it produced.
    pub short_reads: bool,
    /// Reads of the PCI header type byte fail.
    pub unreadable_headers: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState {
            version: DriverVersion {
                major: 1,
                minor: 3,
                revision: 1,
                release: 19,
            }
            .packed(),
            refcount: 1,
            msrs: HashMap::new(),
            ports: HashMap::new(),
            pci: HashMap::new(),
            memory_base: 0x000F_0000,
            memory: vec![0; 65536],
            halted: false,
            fail_all: false,
            short_reads: false,
            unreadable_headers: false,
        }
    }
}

#[derive(Debug)]
pub struct MockMachine {
    state: RefCell<MachineState>,
}

impl MockMachine {
    pub fn new() -> Self {
        MockMachine {
            state: RefCell::new(MachineState::default()),
        }
    }

    pub fn with_state(configure: impl FnOnce(&mut MachineState)) -> Self {
        let machine = MockMachine::new();
        configure(&mut machine.state.borrow_mut());
        machine
    }

    pub fn state(&self) -> RefMut<'_, MachineState> {
        self.state.borrow_mut()
    }

    /// Plants a device in configuration space. `class` is the base class,
    /// subclass, and programming interface triple.
    pub fn add_pci_device(
        &self,
        addr: PciAddress,
        vendor: u16,
        device: u16,
        class: (u8, u8, u8),
        multifunction: bool,
    ) {
        let mut conf = [0u8; 256];
        conf[0..2].copy_from_slice(&vendor.to_le_bytes());
        conf[2..4].copy_from_slice(&device.to_le_bytes());
        let (base, sub, prog_if) = class;
        conf[0x09] = prog_if;
        conf[0x0A] = sub;
        conf[0x0B] = base;
        if multifunction {
            conf[0x0E] |= 0x80;
        }
        self.state.borrow_mut().pci.insert(addr.packed(), conf);
    }

    fn handle(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        match code {
            ioctl::GET_DRIVER_VERSION => {
                output[..4].copy_from_slice(&self.state.borrow().version.to_le_bytes());
                Ok(4)
            }
            ioctl::GET_REFCOUNT => {
                output[..4].copy_from_slice(&self.state.borrow().refcount.to_le_bytes());
                Ok(4)
            }
            ioctl::READ_MSR => {
                let index = u32::from_le_bytes(input.try_into().expect("4-byte msr index"));
                let value = *self
                    .state
                    .borrow()
                    .msrs
                    .get(&index)
                    .ok_or(Error::InvalidArgument("unknown msr"))?;
                output[..8].copy_from_slice(&value.to_le_bytes());
                Ok(8)
            }
            ioctl::WRITE_MSR => {
                let (index, value) = wire::decode_write_msr(input)?;
                self.state.borrow_mut().msrs.insert(index, value);
                Ok(output.len())
            }
            ioctl::READ_PMC => {
                let index = u32::from_le_bytes(input.try_into().expect("4-byte pmc index"));
                let value = self
                    .state
                    .borrow()
                    .msrs
                    .get(&index)
                    .copied()
                    .unwrap_or(0);
                output[..8].copy_from_slice(&value.to_le_bytes());
                Ok(8)
            }
            ioctl::HALT => {
                self.state.borrow_mut().halted = true;
                Ok(0)
            }
            ioctl::READ_IO_PORT_BYTE | ioctl::READ_IO_PORT_WORD | ioctl::READ_IO_PORT_DWORD => {
                let port = wire::decode_port_read(input)?;
                let mask = match code {
                    ioctl::READ_IO_PORT_BYTE => 0xFF,
                    ioctl::READ_IO_PORT_WORD => 0xFFFF,
                    _ => u32::MAX,
                };
                let value = self.state.borrow().ports.get(&port).copied().unwrap_or(0) & mask;
                let bytes = value.to_le_bytes();
                let len = output.len().min(4);
                output[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            }
            ioctl::WRITE_IO_PORT_BYTE | ioctl::WRITE_IO_PORT_WORD | ioctl::WRITE_IO_PORT_DWORD => {
                let (port, value, _width) = wire::decode_port_write(input)?;
                self.state.borrow_mut().ports.insert(port, value);
                Ok(0)
            }
            ioctl::READ_PCI_CONFIG => {
                let (address, offset) = wire::decode_pci_access(input)?;
                let offset = offset as usize;
                if offset + output.len() > 256 {
                    return Err(Error::InvalidArgument("pci access out of range"));
                }
                let state = self.state.borrow();
                if state.unreadable_headers && offset == 0x0E {
                    return Err(Error::InvalidArgument("header type unreadable"));
                }
                match state.pci.get(&address) {
                    Some(conf) => output.copy_from_slice(&conf[offset..offset + output.len()]),
                    // Empty slots float high, as on a real bus.
                    None => output.fill(0xFF),
                }
                Ok(output.len())
            }
            ioctl::WRITE_PCI_CONFIG => {
                let (address, offset) = wire::decode_pci_access(input)?;
                let data = &input[8..];
                let offset = offset as usize;
                if offset + data.len() > 256 {
                    return Err(Error::InvalidArgument("pci access out of range"));
                }
                let mut state = self.state.borrow_mut();
                let conf = state.pci.entry(address).or_insert([0xFF; 256]);
                conf[offset..offset + data.len()].copy_from_slice(data);
                Ok(0)
            }
            ioctl::READ_MEMORY => {
                let (address, _unit, _count) = wire::decode_memory_request(input)?;
                let state = self.state.borrow();
                let start = address
                    .checked_sub(state.memory_base)
                    .ok_or(Error::InvalidArgument("read below mock memory"))?
                    as usize;
                let end = start + output.len();
                if end > state.memory.len() {
                    return Err(Error::InvalidArgument("read past mock memory"));
                }
                output.copy_from_slice(&state.memory[start..end]);
                Ok(output.len())
            }
            ioctl::WRITE_MEMORY => {
                let (address, _unit, _count) = wire::decode_memory_request(input)?;
                let payload = &input[16..];
                let mut state = self.state.borrow_mut();
                let start = address
                    .checked_sub(state.memory_base)
                    .ok_or(Error::InvalidArgument("write below mock memory"))?
                    as usize;
                let end = start + payload.len();
                if end > state.memory.len() {
                    return Err(Error::InvalidArgument("write past mock memory"));
                }
                state.memory[start..end].copy_from_slice(payload);
                Ok(0)
            }
            _ => Err(Error::InvalidArgument("unsupported control code")),
        }
    }
}

impl DriverPort for MockMachine {
    fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if self.state.borrow().fail_all {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "forced device failure",
            )));
        }
        let len = self.handle(code, input, output)?;
        if self.state.borrow().short_reads {
            return Ok(len.saturating_sub(1));
        }
        Ok(len)
    }
}
