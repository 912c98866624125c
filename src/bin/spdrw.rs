//! Command line front end for firmware settings headers.
//!
//! Renders `SpdReaderWriterSettings.h` files from built-in hardware
//! presets, decodes and validates existing ones, and converts headers
//! between firmware revisions.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use spdrw::profile::{parse_settings, render_settings, SettingRole};
use spdrw::{Error, HardwareProfile, HeaderRevision, Result};

#[derive(Debug, Parser)]
#[command(name = "spdrw")]
#[command(about = "Settings header tool for SPD reader/writer hardware", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the built-in hardware presets
    Presets,
    /// Decode a settings header and print the profile
    Show {
        /// Path to a SpdReaderWriterSettings.h file
        file: PathBuf,
    },
    /// Parse and validate a settings header
    Check {
        /// Path to a SpdReaderWriterSettings.h file
        file: PathBuf,
    },
    /// Render a settings header from a built-in preset
    Render {
        /// Preset name: basic, feedback, or modern
        #[arg(long, default_value = "feedback")]
        preset: String,
        /// Header revision to emit (default: newest the preset fits)
        #[arg(long, value_enum)]
        revision: Option<RevisionArg>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-render an existing header at another revision
    Convert {
        /// Path to a SpdReaderWriterSettings.h file
        file: PathBuf,
        /// Target header revision
        #[arg(long, value_enum)]
        revision: RevisionArg,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Drop settings the target revision cannot express
        #[arg(long)]
        lossy: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum RevisionArg {
    R1,
    R2,
    R3,
}

impl From<RevisionArg> for HeaderRevision {
    fn from(arg: RevisionArg) -> HeaderRevision {
        match arg {
            RevisionArg::R1 => HeaderRevision::R1,
            RevisionArg::R2 => HeaderRevision::R2,
            RevisionArg::R3 => HeaderRevision::R3,
        }
    }
}

fn main() {
    env_logger::init();
    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Presets => {
            for (name, profile) in HardwareProfile::presets() {
                println!("{name}");
                print_profile(&profile);
                println!();
            }
            Ok(())
        }
        Command::Show { file } => {
            let settings = parse_settings(&fs::read_to_string(&file)?)?;
            println!("{}: revision {}", file.display(), settings.revision);
            print_profile(&settings.profile);
            Ok(())
        }
        Command::Check { file } => {
            let settings = parse_settings(&fs::read_to_string(&file)?)?;
            settings.profile.validate()?;
            println!("{}: ok (revision {})", file.display(), settings.revision);
            Ok(())
        }
        Command::Render {
            preset,
            revision,
            output,
        } => {
            let profile = find_preset(&preset)?;
            let revision = revision
                .map(HeaderRevision::from)
                .unwrap_or_else(|| default_revision(&profile));
            let text = render_settings(&profile, revision)?;
            emit(output.as_deref(), &text)
        }
        Command::Convert {
            file,
            revision,
            output,
            lossy,
        } => {
            let mut settings = parse_settings(&fs::read_to_string(&file)?)?;
            let revision = HeaderRevision::from(revision);
            if lossy {
                for role in strip_unspellable(&mut settings.profile, revision) {
                    log::warn!("dropping {role}: not expressible in revision {revision}");
                }
            }
            let text = render_settings(&settings.profile, revision)?;
            emit(output.as_deref(), &text)
        }
    }
}

fn find_preset(name: &str) -> Result<HardwareProfile> {
    HardwareProfile::presets()
        .into_iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, profile)| profile)
        .ok_or(Error::InvalidArgument(
            "unknown preset (expected basic, feedback, or modern)",
        ))
}

/// The newest revision that can spell every setting the profile carries.
fn default_revision(profile: &HardwareProfile) -> HeaderRevision {
    for revision in HeaderRevision::ALL.into_iter().rev() {
        if render_settings(profile, revision).is_ok() {
            return revision;
        }
    }
    HeaderRevision::R1
}

/// Clears settings `revision` has no constant for, returning their roles.
fn strip_unspellable(profile: &mut HardwareProfile, revision: HeaderRevision) -> Vec<SettingRole> {
    let mut dropped = Vec::new();
    for role in HardwareProfile::PIN_ROLES {
        if profile.pin(role).is_some() && revision.name_for(role).is_none() {
            match role {
                SettingRole::HvSwitch => profile.hv_switch = None,
                SettingRole::HvFeedback => profile.hv_feedback = None,
                SettingRole::Select0 => profile.select0 = None,
                SettingRole::Select1 => profile.select1 = None,
                SettingRole::Select2 => profile.select2 = None,
                _ => {}
            }
            dropped.push(role);
        }
    }
    if profile.ram_support.is_some() && revision.name_for(SettingRole::RamSupport).is_none() {
        profile.ram_support = None;
        dropped.push(SettingRole::RamSupport);
    }
    dropped
}

fn print_profile(profile: &HardwareProfile) {
    println!("  {:<26} {}", "port", profile.port);
    println!("  {:<26} {}", "baud rate", profile.baud_rate);
    if let Some(clock) = profile.i2c_clock {
        println!("  {:<26} {}", "I2C clock (Hz)", clock);
    }
    for role in HardwareProfile::PIN_ROLES {
        if let Some(pin) = profile.pin(role) {
            println!("  {:<26} {}", role.to_string(), pin);
        }
    }
    if let Some(ram) = profile.ram_support {
        println!("  {:<26} {}", "RAM support", ram);
    }
}

fn emit(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
