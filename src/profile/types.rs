//! The typed model behind the settings headers.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::{Error, Result};

/// One GPIO assignment, spelled the way the headers spell it: a bare digital
/// pin number or an `A0`..`A7` analog alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    /// A digital pin, by number.
    Digital(u8),
    /// An analog pin alias (`A0`..`A7`).
    Analog(u8),
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pin::Digital(n) => write!(f, "{n}"),
            Pin::Analog(n) => write!(f, "A{n}"),
        }
    }
}

impl FromStr for Pin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(index) = s.strip_prefix('A') {
            let index: u8 = index.parse().map_err(|_| Error::InvalidPin(s.to_string()))?;
            if index > 7 {
                return Err(Error::InvalidPin(s.to_string()));
            }
            return Ok(Pin::Analog(index));
        }
        let number: u8 = s.parse().map_err(|_| Error::InvalidPin(s.to_string()))?;
        if number > 127 {
            return Err(Error::InvalidPin(s.to_string()));
        }
        Ok(Pin::Digital(number))
    }
}

bitflags! {
    /// Memory generations a firmware build supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RamSupport: u8 {
        const DDR2 = 1 << 0;
        const DDR3 = 1 << 1;
        const DDR4 = 1 << 2;
        const DDR5 = 1 << 3;
    }
}

impl fmt::Display for RamSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("0");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for RamSupport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut text = s.trim();
        // Headers may parenthesize the OR expression.
        if let Some(inner) = text.strip_prefix('(') {
            text = inner
                .strip_suffix(')')
                .ok_or_else(|| Error::InvalidRamSupport(s.to_string()))?
                .trim();
        }
        let mut mask = RamSupport::empty();
        for part in text.split('|') {
            let tag = part.trim();
            let flag = RamSupport::from_name(tag)
                .ok_or_else(|| Error::InvalidRamSupport(s.to_string()))?;
            mask |= flag;
        }
        Ok(mask)
    }
}

/// The role a named constant plays in a settings header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingRole {
    /// Serial port object the firmware talks through.
    Port,
    /// Serial baud rate.
    BaudRate,
    /// I2C bus clock.
    I2cClock,
    /// High-voltage source switch pin.
    HvSwitch,
    /// High-voltage feedback pin.
    HvFeedback,
    /// Select 0 / offline-mode pin.
    Select0,
    /// Select 1 pin.
    Select1,
    /// Select 2 pin.
    Select2,
    /// Supported-generations mask.
    RamSupport,
}

impl SettingRole {
    /// Whether this role carries a [`Pin`] value.
    pub fn is_pin(self) -> bool {
        matches!(
            self,
            SettingRole::HvSwitch
                | SettingRole::HvFeedback
                | SettingRole::Select0
                | SettingRole::Select1
                | SettingRole::Select2
        )
    }
}

impl fmt::Display for SettingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SettingRole::Port => "communications port",
            SettingRole::BaudRate => "baud rate",
            SettingRole::I2cClock => "I2C clock",
            SettingRole::HvSwitch => "high-voltage switch pin",
            SettingRole::HvFeedback => "high-voltage feedback pin",
            SettingRole::Select0 => "select 0 pin",
            SettingRole::Select1 => "select 1 pin",
            SettingRole::Select2 => "select 2 pin",
            SettingRole::RamSupport => "RAM support mask",
        };
        f.write_str(text)
    }
}

/// A spelling generation of the settings header.
///
/// The same hardware roles were renamed across firmware revisions (`HVSW`
/// became `HV_SW` and then `HV_EN`); a header is written entirely in one
/// generation's names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderRevision {
    R1,
    R2,
    R3,
}

impl HeaderRevision {
    /// All revisions, oldest first.
    pub const ALL: [HeaderRevision; 3] =
        [HeaderRevision::R1, HeaderRevision::R2, HeaderRevision::R3];

    /// The spelling this revision uses for `role`, if it has one.
    pub fn name_for(self, role: SettingRole) -> Option<&'static str> {
        SPELLINGS
            .iter()
            .find(|(_, r, revisions)| *r == role && revisions.contains(&self))
            .map(|(name, _, _)| *name)
    }
}

impl fmt::Display for HeaderRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HeaderRevision::R1 => "R1",
            HeaderRevision::R2 => "R2",
            HeaderRevision::R3 => "R3",
        };
        f.write_str(text)
    }
}

const R1_ONLY: &[HeaderRevision] = &[HeaderRevision::R1];
const R2_ONLY: &[HeaderRevision] = &[HeaderRevision::R2];
const R3_ONLY: &[HeaderRevision] = &[HeaderRevision::R3];
const R2_UP: &[HeaderRevision] = &[HeaderRevision::R2, HeaderRevision::R3];
const EVERY: &[HeaderRevision] = &[HeaderRevision::R1, HeaderRevision::R2, HeaderRevision::R3];

/// Every constant name any revision uses, the role it sets, and the
/// revisions that spell it that way.
const SPELLINGS: &[(&str, SettingRole, &[HeaderRevision])] = &[
    ("PORT", SettingRole::Port, EVERY),
    ("BAUD_RATE", SettingRole::BaudRate, EVERY),
    ("I2CCLOCK", SettingRole::I2cClock, R1_ONLY),
    ("I2C_CLOCK", SettingRole::I2cClock, R2_UP),
    ("HVSW", SettingRole::HvSwitch, R1_ONLY),
    ("HV_SW", SettingRole::HvSwitch, R2_ONLY),
    ("HV_EN", SettingRole::HvSwitch, R3_ONLY),
    ("HVDET", SettingRole::HvFeedback, R1_ONLY),
    ("HV_FB", SettingRole::HvFeedback, R2_UP),
    ("SA0SW", SettingRole::Select0, R1_ONLY),
    ("OFF_SW", SettingRole::Select0, R2_ONLY),
    ("OFF_EN", SettingRole::Select0, R3_ONLY),
    ("SA1SW", SettingRole::Select1, R1_ONLY),
    ("SA1_SW", SettingRole::Select1, R2_ONLY),
    ("SA1_EN", SettingRole::Select1, R3_ONLY),
    ("SA2SW", SettingRole::Select2, R1_ONLY),
    ("RAM_SUPPORT", SettingRole::RamSupport, R2_UP),
];

/// Resolves a constant name to its role and the revisions that use it.
pub(crate) fn lookup(name: &str) -> Option<(SettingRole, &'static [HeaderRevision])> {
    SPELLINGS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, role, revisions)| (*role, *revisions))
}

/// A decoded hardware configuration: everything a settings header defines.
///
/// Only the port and baud rate are mandatory; the pin set varies with the
/// hardware revision the header targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareProfile {
    /// Serial port object name (`Serial`, `SerialUSB`, ...).
    pub port: String,
    /// Serial baud rate in bits per second.
    pub baud_rate: u32,
    /// I2C bus clock in Hz, when the header sets one.
    pub i2c_clock: Option<u32>,
    /// High-voltage (9V) source switch pin.
    pub hv_switch: Option<Pin>,
    /// High-voltage feedback pin.
    pub hv_feedback: Option<Pin>,
    /// Select 0 / offline-mode control pin.
    pub select0: Option<Pin>,
    /// Select 1 pin.
    pub select1: Option<Pin>,
    /// Select 2 pin.
    pub select2: Option<Pin>,
    /// Memory generations the build supports.
    pub ram_support: Option<RamSupport>,
}

impl Default for HardwareProfile {
    fn default() -> Self {
        HardwareProfile::with_feedback()
    }
}

impl HardwareProfile {
    /// Pin-bearing roles in header order.
    pub const PIN_ROLES: [SettingRole; 5] = [
        SettingRole::HvSwitch,
        SettingRole::HvFeedback,
        SettingRole::Select0,
        SettingRole::Select1,
        SettingRole::Select2,
    ];

    pub(crate) fn empty() -> Self {
        HardwareProfile {
            port: String::new(),
            baud_rate: 0,
            i2c_clock: None,
            hv_switch: None,
            hv_feedback: None,
            select0: None,
            select1: None,
            select2: None,
            ram_support: None,
        }
    }

    /// The minimal classic layout: digital pins only, no feedback line.
    pub fn basic() -> Self {
        HardwareProfile {
            port: "Serial".to_string(),
            baud_rate: 115_200,
            i2c_clock: None,
            hv_switch: Some(Pin::Digital(6)),
            hv_feedback: None,
            select0: Some(Pin::Digital(2)),
            select1: Some(Pin::Digital(3)),
            select2: Some(Pin::Digital(4)),
            ram_support: None,
        }
    }

    /// The classic layout with a high-voltage feedback line and analog
    /// select pins.
    pub fn with_feedback() -> Self {
        HardwareProfile {
            port: "Serial".to_string(),
            baud_rate: 115_200,
            i2c_clock: None,
            hv_switch: Some(Pin::Digital(9)),
            hv_feedback: Some(Pin::Digital(6)),
            select0: Some(Pin::Analog(0)),
            select1: Some(Pin::Analog(1)),
            select2: Some(Pin::Analog(2)),
            ram_support: None,
        }
    }

    /// The current layout: offline-mode control, explicit I2C clock, and a
    /// RAM support mask. Has no select 2 line.
    pub fn modern() -> Self {
        HardwareProfile {
            port: "Serial".to_string(),
            baud_rate: 115_200,
            i2c_clock: Some(100_000),
            hv_switch: Some(Pin::Digital(9)),
            hv_feedback: Some(Pin::Digital(6)),
            select0: Some(Pin::Analog(0)),
            select1: Some(Pin::Analog(1)),
            select2: None,
            ram_support: Some(RamSupport::DDR4 | RamSupport::DDR5),
        }
    }

    /// The built-in presets, by name.
    pub fn presets() -> [(&'static str, HardwareProfile); 3] {
        [
            ("basic", HardwareProfile::basic()),
            ("feedback", HardwareProfile::with_feedback()),
            ("modern", HardwareProfile::modern()),
        ]
    }

    /// The pin assigned to `role`, if the role carries a pin and one is set.
    pub fn pin(&self, role: SettingRole) -> Option<Pin> {
        match role {
            SettingRole::HvSwitch => self.hv_switch,
            SettingRole::HvFeedback => self.hv_feedback,
            SettingRole::Select0 => self.select0,
            SettingRole::Select1 => self.select1,
            SettingRole::Select2 => self.select2,
            _ => None,
        }
    }

    /// Assigns `pin` to `role`. Non-pin roles are left untouched.
    pub fn set_pin(&mut self, role: SettingRole, pin: Pin) {
        match role {
            SettingRole::HvSwitch => self.hv_switch = Some(pin),
            SettingRole::HvFeedback => self.hv_feedback = Some(pin),
            SettingRole::Select0 => self.select0 = Some(pin),
            SettingRole::Select1 => self.select1 = Some(pin),
            SettingRole::Select2 => self.select2 = Some(pin),
            _ => {}
        }
    }

    /// Checks the profile for contradictions a firmware build would trip
    /// over.
    pub fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            return Err(Error::InvalidProfile("port name is empty"));
        }
        if self.baud_rate == 0 {
            return Err(Error::InvalidProfile("baud rate is zero"));
        }
        if self.i2c_clock == Some(0) {
            return Err(Error::InvalidProfile("I2C clock is zero"));
        }
        if self.ram_support.is_some_and(|mask| mask.is_empty()) {
            return Err(Error::InvalidProfile("RAM support mask is empty"));
        }
        if self.hv_feedback.is_some() && self.hv_switch.is_none() {
            return Err(Error::InvalidProfile(
                "high-voltage feedback pin without a high-voltage switch pin",
            ));
        }
        for (i, &first) in Self::PIN_ROLES.iter().enumerate() {
            let Some(pin) = self.pin(first) else { continue };
            for &second in &Self::PIN_ROLES[i + 1..] {
                if self.pin(second) == Some(pin) {
                    return Err(Error::PinConflict { pin, first, second });
                }
            }
        }
        Ok(())
    }
}
