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

    devices::disclib::seek.rs

    Positioner control for the disc controller.
*/

use crate::{
    device_types::chs::DiskChs,
    devices::disclib::{
        bus::Outcome,
        command::Opcode,
        controller::{Controller, ControllerState},
        status::{DriveStatus, Status},
        unit::{DiscUnit, Phase},
    },
};

impl Controller {
    /// Start moving unit `n` to `target` on behalf of `opcode`.
    ///
    /// The controller address is set to the target and must be verified
    /// against the drive before the next data transfer. A target outside the
    /// drive sets Seek Check and leaves the positioner where it is. A second
    /// positioning command while the unit is already seeking also sets Seek
    /// Check; the seek in progress is unaffected.
    pub(crate) fn start_seek(&mut self, units: &mut [DiscUnit], n: usize, target: DiskChs, opcode: Opcode) {
        let delays = self.delays(units[n].model());
        let timing = self.timing();
        let unit = &mut units[n];
        let props = unit.model().props();

        if unit.state.phase == Phase::Seek {
            if matches!(opcode, Opcode::Seek | Opcode::Recalibrate) {
                log::debug!("Unit {} {} to {} while seeking: seek check", n, opcode, target);
                unit.state.status.insert(DriveStatus::SEEK_CHECK);
            }
            else {
                log::debug!("{} on unit {} deferred until seek completes", opcode, n);
                unit.state.opcode = opcode;
                self.address = target;
                self.eoc = false;
                self.verify = true;
            }
            return;
        }

        self.address = target;
        self.eoc = false;
        self.verify = true;

        let delay = if props.contains(target) {
            unit.state.status.remove(DriveStatus::SEEK_CHECK);
            let delay = delays.seek_time(timing, unit.state.cylinder, target.c, props.cylinders);
            log::debug!(
                "Unit {} {} from cylinder {} to {} ({} us)",
                n,
                opcode,
                unit.state.cylinder,
                target,
                delay
            );
            unit.state.cylinder = target.c;
            delay
        }
        else {
            log::debug!("Unit {} {} to illegal address {}: seek check", n, opcode, target);
            unit.state.status.insert(DriveStatus::SEEK_CHECK);
            delays.overhead
        };

        unit.state.opcode = opcode;
        unit.state.phase = Phase::Seek;
        unit.schedule(delay);
    }

    /// Handle the end of the Seek phase for unit `n`.
    pub(crate) fn seek_completion(&mut self, units: &mut [DiscUnit], n: usize) -> Outcome {
        let delays = self.delays(units[n].model());
        let unit = &mut units[n];

        match unit.state.opcode {
            Opcode::Seek | Opcode::Recalibrate => {
                unit.idle();
                log::debug!("Unit {} seek complete at cylinder {}", n, unit.state.cylinder);
                if self.kind().is_mac() {
                    unit.state.status.insert(DriveStatus::ATTENTION);
                    Outcome::none()
                }
                else if self.state() == ControllerState::Busy {
                    self.end_command(Status::DriveAttention)
                }
                else {
                    Outcome::none()
                }
            }
            _ if unit.state.status.contains(DriveStatus::SEEK_CHECK) => {
                self.end_unit_command(units, n, Status::Status2Error)
            }
            _ => {
                unit.state.phase = Phase::Rotate;
                unit.schedule(delays.sector_full);
                Outcome::none()
            }
        }
    }
}
