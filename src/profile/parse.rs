//! Parsing of firmware settings headers.

use crate::error::{Error, Result};
use crate::profile::types::{lookup, HardwareProfile, HeaderRevision, SettingRole};

/// A parsed settings header: the decoded profile plus the spelling revision
/// the file is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFile {
    pub profile: HardwareProfile,
    pub revision: HeaderRevision,
}

/// Parses a settings header.
///
/// Accepts `#define NAME VALUE` lines, `//` and `/* ... */` comments, and
/// blank lines. The detected revision is the earliest one consistent with
/// every constant spelling in the file; a file whose spellings no single
/// revision shares is rejected. `PORT` and `BAUD_RATE` must be present.
///
/// Errors carry the 1-based line number of the offending line.
pub fn parse_settings(text: &str) -> Result<SettingsFile> {
    let stripped = strip_comments(text)?;

    let mut profile = HardwareProfile::empty();
    let mut seen: Vec<SettingRole> = Vec::new();
    let mut candidates: Vec<HeaderRevision> = HeaderRevision::ALL.to_vec();

    for (index, raw_line) in stripped.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (name, value) = split_define(trimmed, line)?;
        let Some((role, revisions)) = lookup(name) else {
            return Err(parse_error(line, format!("unknown constant `{name}`")));
        };
        candidates.retain(|r| revisions.contains(r));
        if candidates.is_empty() {
            return Err(parse_error(
                line,
                format!("`{name}` mixes constant spellings from different header revisions"),
            ));
        }
        if seen.contains(&role) {
            return Err(parse_error(
                line,
                format!("duplicate definition of `{name}`"),
            ));
        }
        seen.push(role);
        apply(&mut profile, role, name, value, line)?;
    }

    if !seen.contains(&SettingRole::Port) {
        return Err(Error::MissingSetting("PORT"));
    }
    if !seen.contains(&SettingRole::BaudRate) {
        return Err(Error::MissingSetting("BAUD_RATE"));
    }

    let revision = candidates[0];
    log::debug!("parsed {} settings as a {revision} header", seen.len());
    Ok(SettingsFile { profile, revision })
}

/// Replaces `//` and `/* ... */` comments with nothing, keeping newlines so
/// line numbers survive. An unterminated block comment is an error on its
/// opening line.
fn strip_comments(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut line = 1usize;
    let mut block_open_line = 0usize;
    let mut in_block = false;
    let mut in_line = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
            in_line = false;
            out.push('\n');
            continue;
        }
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
            }
            continue;
        }
        if in_line {
            continue;
        }
        if c == '/' {
            match chars.peek() {
                Some('*') => {
                    chars.next();
                    in_block = true;
                    block_open_line = line;
                    // A comment separates tokens, like whitespace.
                    out.push(' ');
                    continue;
                }
                Some('/') => {
                    chars.next();
                    in_line = true;
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }

    if in_block {
        return Err(parse_error(block_open_line, "unterminated block comment"));
    }
    Ok(out)
}

fn split_define(line: &str, number: usize) -> Result<(&str, &str)> {
    let body = match line.strip_prefix("#define") {
        Some(body) if body.starts_with(char::is_whitespace) => body.trim_start(),
        _ => {
            return Err(parse_error(
                number,
                format!("expected `#define NAME VALUE`, got `{line}`"),
            ))
        }
    };
    let (name, value) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    if name.is_empty() {
        return Err(parse_error(number, "missing constant name"));
    }
    if value.is_empty() {
        return Err(parse_error(number, format!("`{name}` has no value")));
    }
    Ok((name, value))
}

fn apply(
    profile: &mut HardwareProfile,
    role: SettingRole,
    name: &str,
    value: &str,
    line: usize,
) -> Result<()> {
    match role {
        SettingRole::Port => {
            if !is_identifier(value) {
                return Err(parse_error(line, format!("`{value}` is not a port name")));
            }
            profile.port = value.to_string();
        }
        SettingRole::BaudRate => profile.baud_rate = parse_u32(value, name, line)?,
        SettingRole::I2cClock => profile.i2c_clock = Some(parse_u32(value, name, line)?),
        SettingRole::RamSupport => {
            let mask = value
                .parse()
                .map_err(|e: Error| parse_error(line, e.to_string()))?;
            profile.ram_support = Some(mask);
        }
        pin_role => {
            let pin = value
                .parse()
                .map_err(|e: Error| parse_error(line, e.to_string()))?;
            profile.set_pin(pin_role, pin);
        }
    }
    Ok(())
}

fn parse_u32(value: &str, name: &str, line: usize) -> Result<u32> {
    value
        .parse()
        .map_err(|_| parse_error(line, format!("`{value}` is not a valid {name} value")))
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
