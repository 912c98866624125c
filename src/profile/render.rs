//! Rendering of firmware settings headers.

use crate::error::{Error, Result};
use crate::profile::types::{HardwareProfile, HeaderRevision, SettingRole};

const BANNER: &str = "/*
    Arduino based EEPROM SPD reader and writer
   ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
   For overclockers and PC hardware enthusiasts

   You can edit values in this file according to your specific hardware configuration

*/
";

struct Row {
    name: &'static str,
    value: String,
    comment: &'static str,
}

/// Renders a profile as a settings header in the given revision's spellings.
///
/// The profile is validated first. Roles the profile does not set are
/// omitted; a role the revision has no name for is an error. The emitted
/// text parses back to the same profile, and to this revision unless every
/// emitted name is also spelled the same by an earlier one.
pub fn render_settings(profile: &HardwareProfile, revision: HeaderRevision) -> Result<String> {
    profile.validate()?;

    let mut comm = Vec::new();
    comm.push(row(SettingRole::Port, profile.port.clone(), revision)?);
    comm.push(row(
        SettingRole::BaudRate,
        profile.baud_rate.to_string(),
        revision,
    )?);
    if let Some(clock) = profile.i2c_clock {
        comm.push(row(SettingRole::I2cClock, clock.to_string(), revision)?);
    }

    let mut pins = Vec::new();
    for role in HardwareProfile::PIN_ROLES {
        if let Some(pin) = profile.pin(role) {
            pins.push(row(role, pin.to_string(), revision)?);
        }
    }

    let mut ram = Vec::new();
    if let Some(mask) = profile.ram_support {
        ram.push(row(SettingRole::RamSupport, mask.to_string(), revision)?);
    }

    let sections: [(&str, &[Row]); 3] = [
        ("Communication settings", &comm),
        ("Pins config", &pins),
        ("RAM support", &ram),
    ];

    // One set of columns for the whole file keeps the trailing comments
    // aligned across sections.
    let name_width = sections
        .iter()
        .flat_map(|(_, rows)| rows.iter())
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        + 3;
    let value_width = sections
        .iter()
        .flat_map(|(_, rows)| rows.iter())
        .map(|r| r.value.len())
        .max()
        .unwrap_or(0);

    let mut out = String::from(BANNER);
    for (title, rows) in sections {
        if rows.is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(&format!("/* -= {title} =- */\n"));
        for r in rows {
            out.push_str(&format!(
                "#define {:<name_width$}{:>value_width$}   // {}\n",
                r.name, r.value, r.comment
            ));
        }
    }
    Ok(out)
}

fn row(role: SettingRole, value: String, revision: HeaderRevision) -> Result<Row> {
    let name = revision
        .name_for(role)
        .ok_or(Error::RenderUnsupported { role, revision })?;
    Ok(Row {
        name,
        value,
        comment: comment_for(role, revision),
    })
}

fn comment_for(role: SettingRole, revision: HeaderRevision) -> &'static str {
    match role {
        SettingRole::Port => {
            "Communications Port, default is \"Serial\". Change to \"SerialUSB\" for native USB Arduinos (Leonardo, Micro, Due, Yun, etc)"
        }
        SettingRole::BaudRate => "Serial port baud rate, must match program's serial baud rate",
        SettingRole::I2cClock => "I2C bus clock frequency in Hz",
        SettingRole::HvSwitch => "High Voltage (9V) switch pin number",
        SettingRole::HvFeedback => "High Voltage (9V) detector pin number",
        SettingRole::Select0 if revision == HeaderRevision::R1 => "SA0 select pin number",
        SettingRole::Select0 => "Offline mode control pin number",
        SettingRole::Select1 => "SA1 select pin number",
        SettingRole::Select2 => "SA2 select pin number",
        SettingRole::RamSupport => "RAM generations supported by this hardware",
    }
}
