/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! The `hpdisc_config` crate parses the hpdisc configuration file and overlays
//! command line arguments on top of it. Command line arguments always take
//! priority over the configuration file.
//!
//! Features:
//! - `use_bpaf`: Enable BPAF support for command line argument parsing.

mod bpaf_config;

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

#[cfg(feature = "use_bpaf")]
use bpaf_config::cli_args;
pub use bpaf_config::CmdLineArgs;

use cfg_if::cfg_if;
use hp_disclib::{
    device_types::{
        chs::DiskChs,
        geometry::DriveModel,
        timing::{DelayProps, TimingMode},
    },
    devices::disclib::{ControllerKind, DiagnosticOverrides, Opcode, OverrideEntry, Status, Syndrome},
};
use serde_derive::Deserialize;
use thiserror::Error;

const fn _default_true() -> bool {
    true
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Drive unit {0} is configured more than once")]
    DuplicateUnit(usize),
    #[error("Drive unit {unit} cannot be connected to a {kind} controller")]
    UnitOutOfRange { unit: usize, kind: ControllerKind },
    #[error("Override {index} targets {address}, which is not on any configured drive")]
    OverrideAddress { index: usize, address: DiskChs },
}

#[derive(Debug, Default, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub kind: ControllerKind,
    #[serde(default)]
    pub timing: TimingMode,
    pub fast_times: Option<DelayProps>,
}

#[derive(Debug, Deserialize)]
pub struct DriveConfig {
    pub unit: usize,
    #[serde(default)]
    pub model: DriveModel,
    pub image: Option<PathBuf>,
    #[serde(default = "_default_true")]
    pub autosize: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub format: bool,
    /// Leave the heads loaded after the image is attached.
    #[serde(default = "_default_true")]
    pub loaded: bool,
}

#[derive(Debug, Deserialize)]
pub struct OverrideConfig {
    pub cylinder: u16,
    #[serde(default)]
    pub head: u8,
    #[serde(default)]
    pub sector: u8,
    pub opcode: Opcode,
    #[serde(default)]
    pub spd: u8,
    pub status: Status,
    pub syndrome: Option<Syndrome>,
}

impl OverrideConfig {
    pub fn address(&self) -> DiskChs {
        DiskChs::new(self.cylinder, self.head, self.sector)
    }

    pub fn to_entry(&self) -> OverrideEntry {
        OverrideEntry {
            address: self.address(),
            opcode: self.opcode,
            spd: self.spd & 0x7,
            status: self.status,
            syndrome: self.syndrome,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Runner {
    #[serde(default)]
    pub trace: bool,
}

/// One step of the host program run by the headless frontend.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProgramOp {
    /// Issue a raw command word.
    Command {
        word: u16,
        #[serde(default)]
        outbound: Vec<u16>,
        #[serde(default)]
        inbound: usize,
    },
    RequestStatus {
        unit: u8,
    },
    RequestSectorAddress {
        unit: u8,
    },
    RequestSyndrome,
    RequestDiscAddress,
    Seek {
        unit: u8,
        cylinder: u16,
        #[serde(default)]
        head: u8,
        #[serde(default)]
        sector: u8,
    },
    Recalibrate {
        unit: u8,
    },
    AddressRecord {
        cylinder: u16,
        #[serde(default)]
        head: u8,
        #[serde(default)]
        sector: u8,
    },
    SetFileMask {
        #[serde(default)]
        cylinder_mode: bool,
        #[serde(default)]
        auto_seek: bool,
        #[serde(default)]
        decrement: bool,
        #[serde(default)]
        retries: u8,
    },
    Read {
        unit: u8,
        words: usize,
        #[serde(default)]
        full_sector: bool,
        #[serde(default)]
        no_verify: bool,
    },
    Write {
        unit: u8,
        #[serde(default)]
        data: Vec<u16>,
        #[serde(default)]
        fill: u16,
        #[serde(default)]
        words: usize,
        #[serde(default)]
        full_sector: bool,
    },
    Initialize {
        unit: u8,
        #[serde(default)]
        spd: u8,
        #[serde(default)]
        fill: u16,
        words: usize,
    },
    Verify {
        unit: u8,
        sectors: u16,
    },
    ColdLoad {
        #[serde(default)]
        head: u8,
        #[serde(default)]
        sector: u8,
        words: usize,
    },
    LoadTio {
        value: u16,
    },
    Clear,
    End,
    Wakeup,
    /// Load the heads of a drive.
    Load {
        unit: usize,
    },
    /// Unload the heads of a drive.
    Unload {
        unit: usize,
    },
    /// Assert CLEARF from the interface.
    Reset,
    Interrupts {
        enabled: bool,
    },
    /// Run every pending event.
    Run,
}

#[derive(Debug, Deserialize)]
pub struct ConfigFileParams {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default, rename = "drive")]
    pub drives: Vec<DriveConfig>,
    #[serde(default, rename = "override")]
    pub overrides: Vec<OverrideConfig>,
    #[serde(default, rename = "program")]
    pub program: Vec<ProgramOp>,
    #[serde(default)]
    pub runner: Runner,
}

impl ConfigFileParams {
    pub fn overlay(&mut self, shell_args: CmdLineArgs) {
        if let Some(timing) = shell_args.timing {
            self.controller.timing = timing;
        }
        self.runner.trace |= shell_args.trace;
    }

    /// Check the drive and override tables for entries the controller could never use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for drive in &self.drives {
            if !seen.insert(drive.unit) {
                return Err(ConfigError::DuplicateUnit(drive.unit));
            }
            if drive.unit >= self.controller.kind.max_units() {
                return Err(ConfigError::UnitOutOfRange {
                    unit: drive.unit,
                    kind: self.controller.kind,
                });
            }
        }

        for (index, entry) in self.overrides.iter().enumerate() {
            let address = entry.address();
            if !self.drives.iter().any(|d| d.model.props().contains(address)) {
                return Err(ConfigError::OverrideAddress { index, address });
            }
        }
        Ok(())
    }

    /// Number of unit slots the interface needs: one past the highest configured unit.
    pub fn unit_count(&self) -> usize {
        self.drives.iter().map(|d| d.unit + 1).max().unwrap_or(1)
    }

    pub fn drive(&self, unit: usize) -> Option<&DriveConfig> {
        self.drives.iter().find(|d| d.unit == unit)
    }

    pub fn diagnostic_overrides(&self) -> DiagnosticOverrides {
        DiagnosticOverrides::new(self.overrides.iter().map(|o| o.to_entry()).collect())
    }
}

/// Parse the TOML configuration string and overlay command line arguments.
pub fn read_config(toml_string: impl AsRef<str>, shell_args: CmdLineArgs) -> Result<ConfigFileParams, anyhow::Error> {
    let mut toml_args: ConfigFileParams = toml::from_str(toml_string.as_ref())?;

    // Command line arguments override config file arguments
    cfg_if! {
        if #[cfg(feature = "use_bpaf")] {
            toml_args.overlay(shell_args);
        } else {
            let _ = shell_args;
        }
    }

    toml_args.validate()?;
    log::debug!(
        "Configuration: {} controller, {} drive(s), {} override(s), {} program step(s)",
        toml_args.controller.kind,
        toml_args.drives.len(),
        toml_args.overrides.len(),
        toml_args.program.len()
    );
    Ok(toml_args)
}

/// Read the TOML configuration from a file path, parse and overlay command line arguments.
pub fn read_config_file<P>(default_path: P) -> Result<ConfigFileParams, anyhow::Error>
where
    P: AsRef<Path>,
{
    let shell_args = shell_args();

    // Allow configuration file path to be overridden by command line argument 'config_file'
    let toml_string = if let Some(configfile_path) = shell_args.config_file.as_ref() {
        std::fs::read_to_string(configfile_path)?
    }
    else {
        std::fs::read_to_string(default_path)?
    };

    read_config(toml_string, shell_args)
}

/// Read the TOML configuration from a string, parse and overlay command line arguments.
pub fn read_config_string(toml_string: impl AsRef<str>) -> Result<ConfigFileParams, anyhow::Error> {
    read_config(toml_string, shell_args())
}

fn shell_args() -> CmdLineArgs {
    let shell_args: CmdLineArgs;

    cfg_if! {
        if #[cfg(feature = "use_bpaf")] {
            log::debug!("Reading command line arguments...");
            shell_args = cli_args().run();
        } else {
            log::debug!("Argument reading disabled...");
            shell_args = CmdLineArgs::default();
        }
    }

    shell_args
}
