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

//! hpdisc headless front-end main library component.

#![forbid(unsafe_code)]

pub mod program;

use anyhow::Context;

use hp_disclib::{
    devices::disclib::{Controller, DiscUnit},
    host::DiscInterface,
};
use hpdisc_config::ConfigFileParams;

/// Build a controller, its drives and a host interface from the configuration,
/// attaching every configured image.
pub fn build_interface(config: &ConfigFileParams) -> anyhow::Result<DiscInterface> {
    let mut controller = Controller::new(config.controller.kind);
    controller.set_timing(config.controller.timing);
    if let Some(times) = config.controller.fast_times {
        controller.set_fast_times(times);
    }
    controller.set_overrides(config.diagnostic_overrides());

    let units = (0..config.unit_count())
        .map(|n| {
            let mut unit = DiscUnit::default();
            if let Some(drive) = config.drive(n) {
                unit.set_model(drive.model);
                unit.set_autosize(drive.autosize);
                unit.set_read_only(drive.read_only);
                unit.set_format_enabled(drive.format);
            }
            unit
        })
        .collect();

    let mut iface = DiscInterface::new(controller, units);

    for drive in &config.drives {
        let Some(image) = &drive.image
        else {
            continue;
        };
        iface
            .attach(drive.unit, image)
            .with_context(|| format!("attaching {} to unit {}", image.display(), drive.unit))?;
        if !drive.loaded {
            iface.load_unload(drive.unit, false)?;
        }
        if let Some(unit) = iface.unit(drive.unit) {
            log::info!(
                "Unit {}: {} drive, image {}{}",
                drive.unit,
                unit.model(),
                image.display(),
                if drive.loaded { "" } else { " (unloaded)" }
            );
        }
    }
    Ok(iface)
}

/// Detach every attached image, flushing it to the host.
pub fn shutdown(iface: &mut DiscInterface) {
    for n in 0..iface.units().len() {
        if iface.unit(n).is_some_and(|u| u.is_attached()) {
            if let Err(e) = iface.detach(n) {
                log::error!("Failed to detach unit {}: {}", n, e);
            }
        }
    }
}

pub fn run() {
    env_logger::init();

    let config = match hpdisc_config::read_config_file("./hpdisc.toml") {
        Ok(config) => config,
        Err(e) => match e.downcast_ref::<std::io::Error>() {
            Some(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "Configuration file not found! Please create hpdisc.toml in the current directory \
                               or provide the path to configuration file with --configfile."
                );

                std::process::exit(1);
            }
            Some(e) => {
                eprintln!("Unknown IO error reading configuration file:\n{}", e);
                std::process::exit(1);
            }
            None => {
                eprintln!(
                    "Failed to parse configuration file. There may be a typo or otherwise invalid toml:\n{}",
                    e
                );
                std::process::exit(1);
            }
        },
    };

    let mut iface = build_interface(&config).unwrap_or_else(|e| {
        eprintln!("Failed to build disc subsystem: {:#}", e);
        std::process::exit(1);
    });

    println!(
        "{} controller with {} unit(s), {} timing",
        iface.controller().kind(),
        iface.units().len(),
        iface.controller().timing()
    );

    if config.program.is_empty() {
        println!("No program steps configured.");
    }
    let result = program::run_program(&mut iface, &config.program, config.runner.trace);
    shutdown(&mut iface);

    if let Err(e) = result {
        eprintln!("Program failed: {:#}", e);
        std::process::exit(1);
    }
}
