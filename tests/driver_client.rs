//! Driver client behavior against the in-memory machine.

mod common;

use common::MockMachine;
use spdrw::constants::ioctl;
use spdrw::{CpuFeatures, DriverClient, Error, PciAddress};

#[test]
fn driver_version_and_refcount() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    let version = client.driver_version().unwrap();
    assert_eq!(version.to_string(), "1.3.1.19");
    assert_eq!(version.packed(), 0x0103_0113);
    assert_eq!(client.refcount().unwrap(), 1);
}

#[test]
fn zero_version_reads_as_unloaded() {
    let machine = MockMachine::with_state(|state| state.version = 0);
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    assert!(matches!(
        client.driver_version().unwrap_err(),
        Error::DriverUnloaded
    ));
}

#[test]
fn msr_round_trip() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::all());

    client.write_msr(0x1B, 0xFEE0_0800_0000_0123).unwrap();
    assert_eq!(client.read_msr(0x1B).unwrap(), 0xFEE0_0800_0000_0123);
    assert_eq!(machine.state().msrs[&0x1B], 0xFEE0_0800_0000_0123);
}

#[test]
fn msr_refused_without_cpu_feature() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    assert!(matches!(
        client.read_msr(0x1B).unwrap_err(),
        Error::CpuFeature("MSR")
    ));
    assert!(matches!(
        client.write_msr(0x1B, 1).unwrap_err(),
        Error::CpuFeature("MSR")
    ));
    assert!(machine.state().msrs.is_empty());
}

#[test]
fn pmc_reads_without_msr_gate() {
    let machine = MockMachine::with_state(|state| {
        state.msrs.insert(0xC1, 42);
    });
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    assert_eq!(client.read_pmc(0xC1).unwrap(), 42);
}

#[test]
fn halt_reaches_device() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    client.halt().unwrap();
    assert!(machine.state().halted);
}

#[test]
fn io_port_round_trip() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    client.write_io_port_dword(0x0CF8, 0xA1B2_C3D4).unwrap();
    assert_eq!(client.read_io_port_dword(0x0CF8).unwrap(), 0xA1B2_C3D4);
    assert_eq!(client.read_io_port_word(0x0CF8).unwrap(), 0xC3D4);
    assert_eq!(client.read_io_port_byte(0x0CF8).unwrap(), 0xD4);

    client.write_io_port_byte(0x80, 0x55).unwrap();
    assert_eq!(client.read_io_port_byte(0x80).unwrap(), 0x55);

    // An untouched port floats at zero in the mock.
    assert_eq!(client.read_io_port_word(0x0EC0).unwrap(), 0);
}

#[test]
fn pci_config_round_trip() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::none());
    let addr = PciAddress::new(0, 2, 0);

    client.write_pci_config_u32(addr, 0x10, 0xFEDC_0000).unwrap();
    client.write_pci_config_u16(addr, 0x04, 0x0107).unwrap();
    client.write_pci_config_u8(addr, 0x3C, 0x0B).unwrap();

    assert_eq!(client.read_pci_config_u32(addr, 0x10).unwrap(), 0xFEDC_0000);
    assert_eq!(client.read_pci_config_u16(addr, 0x04).unwrap(), 0x0107);
    assert_eq!(client.read_pci_config_u8(addr, 0x3C).unwrap(), 0x0B);
}

#[test]
fn absent_pci_device_reads_all_ones() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    let id = client
        .read_pci_config_u32(PciAddress::new(0, 31, 7), 0)
        .unwrap();
    assert_eq!(id, 0xFFFF_FFFF);
}

#[test]
fn pci_alignment_rules() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::none());
    let addr = PciAddress::new(0, 2, 0);

    assert!(matches!(
        client.read_pci_config_u16(addr, 0x03).unwrap_err(),
        Error::MisalignedPciAccess { offset: 0x03, width: 2 }
    ));
    assert!(matches!(
        client.read_pci_config_u32(addr, 0x06).unwrap_err(),
        Error::MisalignedPciAccess { offset: 0x06, width: 4 }
    ));
    assert!(matches!(
        client.write_pci_config_u32(addr, 0x0A, 0).unwrap_err(),
        Error::MisalignedPciAccess { .. }
    ));

    // Odd lengths carry no alignment requirement.
    let mut three = [0u8; 3];
    client.read_pci_config(addr, 0x01, &mut three).unwrap();
}

#[test]
fn find_pci_device_by_id() {
    let machine = MockMachine::new();
    machine.add_pci_device(PciAddress::new(0, 3, 0), 0x8086, 0x7AA3, (0x0C, 0x05, 0), false);
    machine.add_pci_device(PciAddress::new(2, 0, 0), 0x8086, 0x7AA3, (0x0C, 0x05, 0), false);
    let mut client = DriverClient::with_features(&machine, CpuFeatures::none());
    client.set_pci_max_bus(3);

    assert_eq!(
        client.find_pci_device_by_id(0x8086, 0x7AA3, 0).unwrap(),
        Some(PciAddress::new(0, 3, 0))
    );
    assert_eq!(
        client.find_pci_device_by_id(0x8086, 0x7AA3, 1).unwrap(),
        Some(PciAddress::new(2, 0, 0))
    );
    assert_eq!(client.find_pci_device_by_id(0x8086, 0x7AA3, 2).unwrap(), None);
    assert_eq!(client.find_pci_device_by_id(0x1022, 0x790B, 0).unwrap(), None);
}

#[test]
fn find_by_id_rejects_invalid_vendor() {
    let machine = MockMachine::new();
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    assert!(matches!(
        client.find_pci_device_by_id(0xFFFF, 0x0001, 0).unwrap_err(),
        Error::InvalidArgument(_)
    ));
}

#[test]
fn scan_honors_multifunction_bit() {
    // Function 3 exists but function 0 does not advertise multifunction.
    let machine = MockMachine::new();
    machine.add_pci_device(PciAddress::new(0, 4, 0), 0x8086, 0x0001, (6, 0, 0), false);
    machine.add_pci_device(PciAddress::new(0, 4, 3), 0x8086, 0x0002, (6, 0, 0), false);
    let mut client = DriverClient::with_features(&machine, CpuFeatures::none());
    client.set_pci_max_bus(0);
    assert_eq!(client.find_pci_device_by_id(0x8086, 0x0002, 0).unwrap(), None);

    let machine = MockMachine::new();
    machine.add_pci_device(PciAddress::new(0, 4, 0), 0x8086, 0x0001, (6, 0, 0), true);
    machine.add_pci_device(PciAddress::new(0, 4, 3), 0x8086, 0x0002, (6, 0, 0), false);
    let mut client = DriverClient::with_features(&machine, CpuFeatures::none());
    client.set_pci_max_bus(0);
    assert_eq!(
        client.find_pci_device_by_id(0x8086, 0x0002, 0).unwrap(),
        Some(PciAddress::new(0, 4, 3))
    );
}

#[test]
fn unreadable_header_scans_single_function() {
    // Function 0 advertises multifunction, but its header type byte cannot
    // be read; the scan stays on function 0.
    let machine = MockMachine::new();
    machine.add_pci_device(PciAddress::new(0, 4, 0), 0x8086, 0x0001, (6, 0, 0), true);
    machine.add_pci_device(PciAddress::new(0, 4, 3), 0x8086, 0x0002, (6, 0, 0), false);
    machine.state().unreadable_headers = true;
    let mut client = DriverClient::with_features(&machine, CpuFeatures::none());
    client.set_pci_max_bus(0);
    assert_eq!(client.find_pci_device_by_id(0x8086, 0x0002, 0).unwrap(), None);
}

#[test]
fn find_pci_device_by_class() {
    let machine = MockMachine::new();
    machine.add_pci_device(PciAddress::new(0, 2, 0), 0x8086, 0x4C8A, (3, 0, 0), false);
    machine.add_pci_device(PciAddress::new(0, 5, 0), 0x8086, 0x7AA3, (0x0C, 0x05, 0), false);
    machine.add_pci_device(PciAddress::new(1, 0, 0), 0x1022, 0x790B, (0x0C, 0x05, 0), false);
    let mut client = DriverClient::with_features(&machine, CpuFeatures::none());
    client.set_pci_max_bus(1);

    // SMBus controllers, in scan order.
    assert_eq!(
        client.find_pci_device_by_class(0x0C, 0x05, 0, 0).unwrap(),
        Some(PciAddress::new(0, 5, 0))
    );
    assert_eq!(
        client.find_pci_device_by_class(0x0C, 0x05, 0, 1).unwrap(),
        Some(PciAddress::new(1, 0, 0))
    );
    assert_eq!(client.find_pci_device_by_class(0x01, 0x06, 1, 0).unwrap(), None);
}

#[test]
fn scan_respects_max_bus() {
    let machine = MockMachine::new();
    machine.add_pci_device(PciAddress::new(5, 0, 0), 0x8086, 0x7AA3, (0x0C, 0x05, 0), false);
    let mut client = DriverClient::with_features(&machine, CpuFeatures::none());

    client.set_pci_max_bus(3);
    assert_eq!(client.find_pci_device_by_id(0x8086, 0x7AA3, 0).unwrap(), None);

    client.set_pci_max_bus(5);
    assert_eq!(
        client.find_pci_device_by_id(0x8086, 0x7AA3, 0).unwrap(),
        Some(PciAddress::new(5, 0, 0))
    );
}

#[cfg(feature = "physical-memory")]
mod physical_memory {
    use super::*;
    use spdrw::UnitSize;

    #[test]
    fn dmi_read_starts_at_window_base() {
        let machine = MockMachine::with_state(|state| {
            state.memory[..4].copy_from_slice(b"_SM_");
        });
        let client = DriverClient::with_features(&machine, CpuFeatures::none());

        let bytes = client.read_dmi_memory(4, UnitSize::Byte).unwrap();
        assert_eq!(&bytes, b"_SM_");
    }

    #[test]
    fn dmi_read_is_capped_at_window_size() {
        let machine = MockMachine::new();
        let client = DriverClient::with_features(&machine, CpuFeatures::none());

        assert!(matches!(
            client.read_dmi_memory(65_537, UnitSize::Byte).unwrap_err(),
            Error::InvalidArgument(_)
        ));
        // Exactly the window, in qword units.
        let bytes = client.read_dmi_memory(8_192, UnitSize::Qword).unwrap();
        assert_eq!(bytes.len(), 65_536);
    }

    #[test]
    fn physical_memory_round_trip() {
        let machine = MockMachine::new();
        let client = DriverClient::with_features(&machine, CpuFeatures::none());

        let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
        client
            .write_physical_memory(0x000F_0100, &payload, UnitSize::Dword)
            .unwrap();
        let bytes = client
            .read_physical_memory(0x000F_0100, 2, UnitSize::Dword)
            .unwrap();
        assert_eq!(bytes, payload);
    }

    #[test]
    fn memory_write_requires_whole_units() {
        let machine = MockMachine::new();
        let client = DriverClient::with_features(&machine, CpuFeatures::none());

        assert!(matches!(
            client
                .write_physical_memory(0x000F_0000, &[0u8; 6], UnitSize::Dword)
                .unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }
}

#[test]
fn short_transfer_is_reported() {
    let machine = MockMachine::with_state(|state| state.short_reads = true);
    let client = DriverClient::with_features(&machine, CpuFeatures::none());

    match client.driver_version().unwrap_err() {
        Error::ShortTransfer {
            code,
            expected,
            actual,
        } => {
            assert_eq!(code, ioctl::GET_DRIVER_VERSION);
            assert_eq!(expected, 4);
            assert_eq!(actual, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}
