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

    devices::disclib::sector_io.rs

    Sector positioning and data transfer for the disc controller.
*/

use crate::{
    device_types::geometry::{FULL_SECTOR_WORDS, HEADER_WORDS, WORDS_PER_SECTOR},
    devices::disclib::{
        bus::{Flags, Functions, Outcome},
        command::{CommandClass, Opcode},
        controller::{Controller, FileMask},
        status::{DriveStatus, Status},
        unit::{DiscUnit, Phase},
    },
};

/// Full-sector transfers carry a three word header: sync word, cylinder,
/// and head/sector.
pub const MAC_SYNC_WORD: u16 = 0o100_377;
pub const ICD_SYNC_WORD: u16 = 0o177_777;
/// Fill word for a partial sector written through the ICD controller.
pub const ICD_PAD_WORD: u16 = 0o177_777;

pub(crate) enum Position {
    Ready,
    Seeking,
    Failed(Status),
}

impl Controller {
    /// Position unit `n` at the controller address, seeking to the next
    /// cylinder first if the previous sector ended one.
    pub(crate) fn position_sector(&mut self, units: &mut [DiscUnit], n: usize) -> Position {
        let props = units[n].model().props();
        let opcode = units[n].state.opcode;

        if self.eoc {
            if !self.file_mask.contains(FileMask::AUTO_SEEK) {
                return Position::Failed(Status::EndOfCylinder);
            }

            let next = if self.file_mask.contains(FileMask::DECREMENT) {
                self.address.c.checked_sub(1)
            }
            else {
                Some(self.address.c + 1)
            };

            return match next.filter(|c| *c < props.cylinders) {
                Some(cylinder) => {
                    let mut target = self.address;
                    target.set_c(cylinder);
                    self.start_seek(units, n, target, opcode);
                    Position::Seeking
                }
                None if self.kind().is_mac() => {
                    units[n].state.status.insert(DriveStatus::SEEK_CHECK);
                    Position::Failed(Status::Status2Error)
                }
                None => Position::Failed(Status::EndOfCylinder),
            };
        }

        let unit = &mut units[n];
        if !props.contains(self.address) {
            log::debug!("Unit {} {} at illegal address {}", n, opcode, self.address);
            unit.state.status.insert(DriveStatus::SEEK_CHECK);
            return Position::Failed(Status::Status2Error);
        }

        if self.verify {
            if opcode.props().verify_address && unit.state.cylinder != self.address.c {
                log::debug!(
                    "Unit {} cylinder {} does not match address {}",
                    n,
                    unit.state.cylinder,
                    self.address
                );
                return Position::Failed(Status::CylinderMiscompare);
            }
            self.verify = false;
        }

        unit.state.file_offset = props.byte_offset(&self.address);
        unit.state.sector = self.address.s;
        Position::Ready
    }

    /// Advance the controller address to the next sector. End of cylinder is
    /// flagged here but acted on only when the next sector is positioned.
    pub(crate) fn next_sector(&mut self, units: &[DiscUnit], n: usize) {
        let props = units[n].model().props();

        self.address.s += 1;
        if self.address.s < props.sectors {
            return;
        }
        self.address.s = 0;

        if self.file_mask.contains(FileMask::CYLINDER_MODE) {
            let group = props.head_group(self.address.h);
            self.address.h += 1;
            if self.address.h >= group.end {
                self.address.h = group.start;
                self.eoc = true;
            }
        }
        else {
            self.eoc = true;
        }
    }

    pub(crate) fn start_read(&mut self, units: &mut [DiscUnit], n: usize, buffer: &mut [u16]) -> Outcome {
        match self.position_sector(units, n) {
            Position::Ready => {}
            Position::Seeking => return Outcome::none(),
            Position::Failed(status) => return self.end_unit_command(units, n, status),
        }

        let delays = self.delays(units[n].model());
        let unit = &mut units[n];
        let start = if unit.state.opcode == Opcode::ReadFullSector {
            buffer[0] = if self.kind().is_mac() { MAC_SYNC_WORD } else { ICD_SYNC_WORD };
            buffer[1] = self.address.c;
            buffer[2] = self.address.head_sector_word();
            HEADER_WORDS
        }
        else {
            0
        };

        let offset = unit.state.file_offset;
        if let Err(e) = unit.read_sector(offset, &mut buffer[start..start + WORDS_PER_SECTOR]) {
            log::error!("Unit {} read error at {}: {}", n, self.address, e);
            return self.end_unit_command(units, n, Status::UncorrectableDataError);
        }

        self.index = 0;
        self.length = start + WORDS_PER_SECTOR;
        unit.state.phase = Phase::Data;
        unit.schedule(delays.data_xfer);
        Outcome::none()
    }

    pub(crate) fn start_write(&mut self, units: &mut [DiscUnit], n: usize) -> Outcome {
        let unit = &units[n];
        if unit.is_read_only() {
            log::debug!("Unit {} write rejected: drive is protected", n);
            return self.end_unit_command(units, n, Status::Status2Error);
        }
        if unit.state.opcode == Opcode::Initialize && !unit.is_format_enabled() {
            log::debug!("Unit {} initialize rejected: format switch is off", n);
            return self.end_unit_command(units, n, Status::ProtectedTrack);
        }

        match self.position_sector(units, n) {
            Position::Ready => {}
            Position::Seeking => return Outcome::none(),
            Position::Failed(status) => return self.end_unit_command(units, n, status),
        }

        let delays = self.delays(units[n].model());
        let unit = &mut units[n];
        self.index = 0;
        self.length = if unit.state.opcode == Opcode::WriteFullSector {
            FULL_SECTOR_WORDS
        }
        else {
            WORDS_PER_SECTOR
        };
        unit.state.phase = Phase::Data;
        unit.schedule(delays.data_xfer);
        Outcome::none()
    }

    pub(crate) fn start_verify(&mut self, units: &mut [DiscUnit], n: usize) -> Outcome {
        match self.position_sector(units, n) {
            Position::Ready => {}
            Position::Seeking => return Outcome::none(),
            Position::Failed(status) => return self.end_unit_command(units, n, status),
        }

        let delays = self.delays(units[n].model());
        let unit = &mut units[n];
        unit.state.phase = Phase::Intersector;
        unit.schedule(delays.sector_full);
        Outcome::none()
    }

    /// Move one word between the sector buffer and the interface.
    pub(crate) fn transfer_word(
        &mut self,
        units: &mut [DiscUnit],
        n: usize,
        buffer: &mut [u16],
        flags: Flags,
        data: u16,
    ) -> Outcome {
        if flags.contains(Flags::EOD) {
            self.eod = true;
            return self.leave_data_phase(units, n);
        }
        if !flags.contains(Flags::DTRDY) {
            log::debug!("Unit {} data overrun at word {}", n, self.index);
            return self.end_unit_command(units, n, Status::DataOverrun);
        }

        let outcome = if units[n].state.opcode.class() == CommandClass::Write {
            buffer[self.index] = data;
            Outcome::functions(Functions::IFOUT)
        }
        else {
            Outcome::with_data(Functions::IFIN, buffer[self.index])
        };
        self.index += 1;
        self.words += 1;

        if self.index >= self.length {
            self.leave_data_phase(units, n);
        }
        else {
            let delays = self.delays(units[n].model());
            units[n].schedule(delays.data_xfer);
        }
        outcome
    }

    fn leave_data_phase(&mut self, units: &mut [DiscUnit], n: usize) -> Outcome {
        let delays = self.delays(units[n].model());
        let remaining = self.length.saturating_sub(self.index);
        let unit = &mut units[n];
        unit.state.phase = Phase::Intersector;
        unit.schedule(delays.intersector_time(self.timing(), remaining));
        Outcome::none()
    }

    /// Decide whether the sector just transferred ends the command.
    fn continue_or_end(&mut self, units: &mut [DiscUnit], n: usize) -> Outcome {
        if self.eod {
            return self.end_unit_command(units, n, Status::Normal);
        }
        if self.status != Status::Normal {
            // Status forced by a diagnostic override.
            let status = self.status;
            return self.end_unit_command(units, n, status);
        }

        let delays = self.delays(units[n].model());
        let unit = &mut units[n];
        unit.state.phase = Phase::Rotate;
        unit.schedule(delays.overhead);
        Outcome::none()
    }

    pub(crate) fn end_read(&mut self, units: &mut [DiscUnit], n: usize) -> Outcome {
        if self.index > 0 {
            self.next_sector(units, n);
        }
        self.continue_or_end(units, n)
    }

    pub(crate) fn end_write(&mut self, units: &mut [DiscUnit], n: usize, buffer: &mut [u16]) -> Outcome {
        if self.index > 0 {
            if self.index < self.length {
                let pad = if self.kind().is_mac() {
                    buffer[self.index - 1]
                }
                else {
                    ICD_PAD_WORD
                };
                buffer[self.index..self.length].fill(pad);
            }

            let start = self.length - WORDS_PER_SECTOR;
            let unit = &mut units[n];
            let offset = unit.state.file_offset;
            if let Err(e) = unit.write_sector(offset, &buffer[start..self.length]) {
                log::error!("Unit {} write error at {}: {}", n, self.address, e);
                return self.end_unit_command(units, n, Status::UncorrectableDataError);
            }
            self.next_sector(units, n);
        }
        self.continue_or_end(units, n)
    }

    pub(crate) fn end_verify(&mut self, units: &mut [DiscUnit], n: usize) -> Outcome {
        let offset = units[n].state.file_offset;
        let mut scratch = [0u16; WORDS_PER_SECTOR];
        if let Err(e) = units[n].read_sector(offset, &mut scratch) {
            log::error!("Unit {} verify error at {}: {}", n, self.address, e);
            return self.end_unit_command(units, n, Status::UncorrectableDataError);
        }

        self.next_sector(units, n);
        self.count = self.count.saturating_sub(1);
        if self.count == 0 {
            return self.end_unit_command(units, n, Status::Normal);
        }
        // Verify ignores EOD and runs for its sector count.
        self.eod = false;
        self.continue_or_end(units, n)
    }
}
