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

    devices::disclib::controller.rs

    Implements the HP 13037 (MAC) and 13365 (ICD) disc controller.
*/

//! The controller is a passive state machine. The owning interface calls
//! [Controller::step] whenever its flag bus changes or a scheduled event for
//! one of the controller's targets expires. Each call returns the functions
//! the interface must perform, an optional data word, and the event
//! activations the caller must apply to its scheduler.

use arraydeque::{ArrayDeque, Wrapping};
use bitflags::bitflags;
use serde_derive::Deserialize;
use strum_macros::{Display, EnumString};

use crate::{
    device_types::{
        chs::DiskChs,
        geometry::{DriveModel, SECTOR_BUFFER_WORDS},
        timing::{DelayProps, DelayUs, TimingMode, COMMAND_WAIT_TIME},
    },
    devices::disclib::{
        bus::{Activation, Flags, Functions, Outcome, StepResult, Target},
        command::{CommandClass, CommandProperties, CommandWord, Opcode},
        overrides::{DiagnosticOverrides, Syndrome},
        status::{status_1_word, DriveStatus, Status},
        unit::{DiscUnit, Phase},
    },
};

/// Units 0-7 may be attached to a MAC controller.
pub const MAC_MAX_UNITS: usize = 8;
/// Units 8-10 are legal unit numbers that never respond.
pub const MAC_LAST_LEGAL_UNIT: u8 = 10;
pub const CMD_LOG_LEN: usize = 64;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ControllerKind {
    /// 13037 multiple-access controller: up to eight drives, polled for attention.
    #[default]
    Mac,
    /// 13365 integrated controller: a single drive.
    Icd,
    /// CS/80 integrated controller: a single drive, ICD command set.
    Cs80,
}

impl ControllerKind {
    pub fn max_units(&self) -> usize {
        match self {
            ControllerKind::Mac => MAC_MAX_UNITS,
            ControllerKind::Icd | ControllerKind::Cs80 => 1,
        }
    }

    pub fn is_mac(&self) -> bool {
        matches!(self, ControllerKind::Mac)
    }
}

bitflags! {
    /// File mask loaded by Set File Mask.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct FileMask: u8 {
        const SPARE         = 0b1000;
        const CYLINDER_MODE = 0b0100;
        const DECREMENT     = 0b0010;
        const AUTO_SEEK     = 0b0001;
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display)]
pub enum ControllerState {
    #[default]
    Idle,
    Wait,
    Busy,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ClearKind {
    /// CLEARF from the interface: resets the drives' latched status as well.
    Hard,
    /// Expiry of the command wait or parameter timer.
    Timeout,
}

/// Result of a command handler.
pub enum Continuation {
    CommandComplete(Status),
    ContinueAsOperation(Functions),
}

#[derive(Clone, Debug, Default)]
pub struct ControllerDebugState {
    pub kind: ControllerKind,
    pub state: ControllerState,
    pub opcode: Opcode,
    pub status: Status,
    pub unit: u8,
    pub spd: u8,
    pub file_mask: FileMask,
    pub retries: u8,
    pub address: DiskChs,
    pub eoc: bool,
    pub verify: bool,
    pub phase: Phase,
    pub index: usize,
    pub length: usize,
    pub words: u32,
    pub count: u32,
    pub poll_unit: Option<usize>,
    pub cmd_log: Vec<String>,
}

pub struct Controller {
    kind: ControllerKind,
    state: ControllerState,
    opcode: Opcode,
    pub(crate) status: Status,
    spd: u8,
    unit: u8,
    pub(crate) file_mask: FileMask,
    retry_limit: u8,
    retries: u8,
    pub(crate) address: DiskChs,
    pub(crate) eoc: bool,
    pub(crate) verify: bool,
    pub(crate) eod: bool,
    /// Phase of the controller's own parameter exchange.
    phase: Phase,
    pub(crate) index: usize,
    pub(crate) length: usize,
    /// Words transferred by the current command.
    pub(crate) words: u32,
    /// Sectors remaining for Verify.
    pub(crate) count: u32,
    poll_unit: Option<usize>,
    syndrome: Option<Syndrome>,
    overrides: DiagnosticOverrides,
    timing: TimingMode,
    fast_times: DelayProps,
    activations: Vec<Activation>,
    cmd_log: ArrayDeque<String, CMD_LOG_LEN, Wrapping>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControllerKind::default())
    }
}

impl Controller {
    pub fn new(kind: ControllerKind) -> Self {
        Self {
            kind,
            state: ControllerState::Idle,
            opcode: Opcode::default(),
            status: Status::Normal,
            spd: 0,
            unit: 0,
            file_mask: FileMask::empty(),
            retry_limit: 0,
            retries: 0,
            address: DiskChs::default(),
            eoc: false,
            verify: false,
            eod: false,
            phase: Phase::Idle,
            index: 0,
            length: 0,
            words: 0,
            count: 0,
            poll_unit: None,
            syndrome: None,
            overrides: DiagnosticOverrides::default(),
            timing: TimingMode::default(),
            fast_times: DelayProps::default(),
            activations: Vec::new(),
            cmd_log: ArrayDeque::new(),
        }
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn unit(&self) -> u8 {
        self.unit
    }

    pub fn address(&self) -> DiskChs {
        self.address
    }

    pub fn file_mask(&self) -> FileMask {
        self.file_mask
    }

    pub fn timing(&self) -> TimingMode {
        self.timing
    }

    pub fn set_timing(&mut self, timing: TimingMode) {
        self.timing = timing;
    }

    pub fn fast_times(&self) -> &DelayProps {
        &self.fast_times
    }

    pub fn set_fast_times(&mut self, times: DelayProps) {
        self.fast_times = times;
    }

    pub fn overrides(&self) -> &DiagnosticOverrides {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut DiagnosticOverrides {
        &mut self.overrides
    }

    pub fn set_overrides(&mut self, overrides: DiagnosticOverrides) {
        self.overrides = overrides;
    }

    /// Return the delays in effect for a drive model.
    pub fn delays(&self, model: DriveModel) -> DelayProps {
        match self.timing {
            TimingMode::Fast => self.fast_times,
            TimingMode::Real => DelayProps::real(model),
        }
    }

    /// Return the Status-1 word for the current status.
    pub fn status_1(&self) -> u16 {
        status_1_word(self.spd, self.status, self.unit)
    }

    /// Perform one controller step.
    ///
    /// `wakeup` names the target whose event expired, or is `None` when the
    /// interface calls because its flags changed. `buffer` is the interface's
    /// sector buffer and must hold at least [SECTOR_BUFFER_WORDS] words.
    pub fn step(
        &mut self,
        units: &mut [DiscUnit],
        buffer: &mut [u16],
        wakeup: Option<Target>,
        flags: Flags,
        data: u16,
    ) -> StepResult {
        debug_assert!(buffer.len() >= SECTOR_BUFFER_WORDS);
        log::trace!(
            "step(): state:{} wakeup:{:?} flags:{:?} data:{:06o}",
            self.state,
            wakeup,
            flags,
            data
        );

        let mut outcome = Outcome::none();

        if flags.contains(Flags::CLEARF) {
            self.clear(units, ClearKind::Hard);
            return self.finish(units, outcome);
        }

        if flags.intersects(Flags::XFRNG | Flags::OVRUN) && self.state == ControllerState::Busy {
            let status = if flags.contains(Flags::XFRNG) {
                Status::IoProgramError
            }
            else {
                Status::DataOverrun
            };
            outcome = self.abort_command(units, status);
        }
        else if self.state == ControllerState::Busy || wakeup.is_some() {
            outcome = self.continue_command(units, buffer, wakeup, flags, data);

            // A command latched while the previous one was finishing starts now.
            if self.state != ControllerState::Busy
                && flags.contains(Flags::CMRDY)
                && !outcome.functions.contains(Functions::IFGTC)
            {
                outcome.merge(self.start_command(units, buffer, data));
            }
        }
        else if flags.contains(Flags::CMRDY) {
            outcome = self.start_command(units, buffer, data);
        }

        if self.state == ControllerState::Idle && self.kind.is_mac() && flags.contains(Flags::INTOK) {
            outcome.merge(self.poll_drives(units));
        }

        self.finish(units, outcome)
    }

    fn finish(&mut self, units: &mut [DiscUnit], outcome: Outcome) -> StepResult {
        for (n, unit) in units.iter_mut().enumerate() {
            if let Some(delay) = unit.state.pending_delay.take() {
                self.activations.push(Activation::Schedule {
                    target: Target::Unit(n),
                    delay,
                });
            }
        }
        if !outcome.functions.is_empty() {
            log::trace!("step(): functions:{:?} data:{:06o}", outcome.functions, outcome.data);
        }
        StepResult {
            functions: outcome.functions,
            data: outcome.data,
            activations: std::mem::take(&mut self.activations),
        }
    }

    pub(crate) fn schedule(&mut self, target: Target, delay: DelayUs) {
        self.activations.push(Activation::Schedule { target, delay });
    }

    pub(crate) fn cancel(&mut self, target: Target) {
        self.activations.push(Activation::Cancel { target });
    }

    fn start_command(&mut self, units: &mut [DiscUnit], buffer: &mut [u16], word: u16) -> Outcome {
        let command = CommandWord::from_word(word);
        let mut opcode = Opcode::decode(command.opcode());
        if !opcode.is_valid_for(self.kind) {
            opcode = Opcode::InvalidOpcode;
        }
        let props = opcode.props();

        self.opcode = opcode;
        self.state = ControllerState::Busy;
        self.phase = Phase::Idle;
        self.cancel(Target::Controller);

        if props.unit_field {
            self.unit = if self.kind.is_mac() { command.unit() } else { 0 };
        }
        else if opcode == Opcode::ColdLoadRead {
            self.unit = 0;
        }

        if props.clear_status {
            self.status = Status::Normal;
            self.spd = 0;
            self.syndrome = None;
            self.apply_override();
        }

        self.log_cmd(format!("{} unit:{} word:{:06o}", opcode, self.unit, word));

        let continuation = if opcode == Opcode::InvalidOpcode {
            Continuation::CommandComplete(Status::IllegalOpcode)
        }
        else {
            match self.check_unit(units, props) {
                Ok(()) => self.dispatch(units, buffer, command),
                Err(status) => Continuation::CommandComplete(status),
            }
        };

        let mut outcome = Outcome::functions(Functions::BUSY | Functions::IFGTC);
        outcome.merge(self.resolve(continuation));
        outcome
    }

    fn resolve(&mut self, continuation: Continuation) -> Outcome {
        match continuation {
            Continuation::CommandComplete(status) => self.end_command(status),
            Continuation::ContinueAsOperation(functions) => Outcome::functions(functions),
        }
    }

    /// Consume the diagnostic override under the cursor if it matches the command.
    fn apply_override(&mut self) {
        if let Some(entry) = self.overrides.take_match(&self.address, self.opcode) {
            log::debug!(
                "Diagnostic override at {} for {}: status {} spd {:03b}",
                self.address,
                self.opcode,
                entry.status,
                entry.spd
            );
            self.status = entry.status;
            self.spd = entry.spd;
            self.syndrome = entry.syndrome;
        }
    }

    /// Validate the unit addressed by the command.
    fn check_unit(&self, units: &[DiscUnit], props: &CommandProperties) -> Result<(), Status> {
        if !(props.unit_field || props.unit_check || props.unit_access) {
            return Ok(());
        }

        let n = self.unit as usize;
        if self.kind.is_mac() && self.unit > MAC_LAST_LEGAL_UNIT {
            log::warn!("Command addressed illegal unit {}", self.unit);
            return Err(Status::UnitUnavailable);
        }
        if n >= units.len() || n >= self.kind.max_units() {
            return Err(Status::UnitUnavailable);
        }
        if props.unit_check && units[n].drive_status().intersects(DriveStatus::ERRORS) {
            return Err(Status::Status2Error);
        }
        Ok(())
    }

    fn dispatch(&mut self, units: &mut [DiscUnit], buffer: &mut [u16], command: CommandWord) -> Continuation {
        let n = self.unit as usize;

        match self.opcode {
            Opcode::ColdLoadRead => {
                let target = DiskChs::new(0, command.cold_load_head(), command.cold_load_sector());
                self.file_mask = FileMask::AUTO_SEEK;
                self.begin_transfer();
                self.start_seek(units, 0, target, Opcode::ColdLoadRead);
                Continuation::ContinueAsOperation(Functions::empty())
            }
            Opcode::Recalibrate => {
                if !units[n].is_ready() {
                    return Continuation::CommandComplete(Status::Status2Error);
                }
                let target = DiskChs::new(0, self.address.h, self.address.s);
                self.start_seek(units, n, target, Opcode::Recalibrate);
                self.seek_started()
            }
            Opcode::Seek
            | Opcode::AddressRecord
            | Opcode::Verify
            | Opcode::ReadWithOffset
            | Opcode::LoadTioRegister => self.await_parameters(),
            Opcode::RequestStatus => {
                let unit = &mut units[n];
                buffer[0] = self.status_1();
                buffer[1] = unit.status_2();
                unit.state.status.remove(DriveStatus::FIRST_STATUS);
                self.await_parameters()
            }
            Opcode::RequestSectorAddress => {
                buffer[0] = units[n].state.sector as u16;
                self.await_parameters()
            }
            Opcode::RequestSyndrome => {
                let syndrome = self.syndrome.unwrap_or_default();
                buffer[0] = self.status_1();
                buffer[1] = self.address.c;
                buffer[2] = self.address.head_sector_word();
                buffer[3] = syndrome.displacement;
                buffer[4..7].copy_from_slice(&syndrome.patterns);
                self.await_parameters()
            }
            Opcode::RequestDiscAddress => {
                buffer[0] = self.address.c;
                buffer[1] = self.address.head_sector_word();
                self.await_parameters()
            }
            Opcode::Read
            | Opcode::ReadFullSector
            | Opcode::ReadWithoutVerify
            | Opcode::Write
            | Opcode::WriteFullSector => {
                self.begin_transfer();
                self.start_unit(units, n)
            }
            Opcode::Initialize => {
                self.spd = command.spd();
                self.begin_transfer();
                self.start_unit(units, n)
            }
            Opcode::Clear => {
                self.soft_clear();
                Continuation::CommandComplete(Status::Normal)
            }
            Opcode::SetFileMask => {
                self.file_mask = FileMask::from_bits_truncate(command.file_mask());
                self.retry_limit = command.retries();
                self.retries = self.retry_limit;
                log::debug!(
                    "File mask set to {:?} with {} retries",
                    self.file_mask,
                    self.retry_limit
                );
                Continuation::CommandComplete(Status::Normal)
            }
            Opcode::End | Opcode::Wakeup => Continuation::CommandComplete(Status::Normal),
            Opcode::InvalidOpcode => unreachable!("invalid opcode dispatched"),
        }
    }

    /// Enter the parameter phase. Words move on successive interface calls
    /// while DTRDY is asserted; the parameter timer restarts on every word.
    fn await_parameters(&mut self) -> Continuation {
        let props = self.opcode.props();
        self.phase = Phase::Parameter;
        self.index = 0;
        self.length = props.params_in.max(props.params_out);
        self.schedule(Target::Controller, COMMAND_WAIT_TIME);
        Continuation::ContinueAsOperation(Functions::RQSRV)
    }

    fn parameter_phase(&mut self, units: &mut [DiscUnit], buffer: &mut [u16], flags: Flags, data: u16) -> Outcome {
        if !flags.contains(Flags::DTRDY) {
            return Outcome::none();
        }

        let mut outcome = if self.opcode.props().params_in > 0 {
            buffer[self.index] = data;
            Outcome::functions(Functions::IFOUT)
        }
        else {
            Outcome::with_data(Functions::IFIN, buffer[self.index])
        };
        self.index += 1;

        if self.index < self.length {
            self.schedule(Target::Controller, COMMAND_WAIT_TIME);
        }
        else {
            self.phase = Phase::Idle;
            self.cancel(Target::Controller);
            let continuation = self.parameters_complete(units, buffer);
            outcome.merge(self.resolve(continuation));
            if self.opcode == Opcode::LoadTioRegister {
                outcome.merge(Outcome::with_data(Functions::WRTIO, buffer[0]));
            }
        }
        outcome
    }

    fn parameters_complete(&mut self, units: &mut [DiscUnit], buffer: &mut [u16]) -> Continuation {
        let n = self.unit as usize;

        match self.opcode {
            Opcode::Seek => {
                if !units[n].is_ready() {
                    return Continuation::CommandComplete(Status::Status2Error);
                }
                let target = DiskChs::from_words(buffer[0], buffer[1]);
                self.start_seek(units, n, target, Opcode::Seek);
                self.seek_started()
            }
            Opcode::AddressRecord => {
                self.address = DiskChs::from_words(buffer[0], buffer[1]);
                self.eoc = false;
                self.verify = false;
                log::debug!("Address record set to {}", self.address);
                Continuation::CommandComplete(Status::Normal)
            }
            Opcode::Verify => {
                self.begin_transfer();
                self.count = if buffer[0] == 0 { 0x10000 } else { buffer[0] as u32 };
                self.start_unit(units, n)
            }
            Opcode::ReadWithOffset => {
                log::debug!("Read with offset {:06o}", buffer[0]);
                self.begin_transfer();
                self.start_unit(units, n)
            }
            Opcode::LoadTioRegister
            | Opcode::RequestStatus
            | Opcode::RequestSectorAddress
            | Opcode::RequestSyndrome
            | Opcode::RequestDiscAddress => Continuation::CommandComplete(Status::Normal),
            _ => unreachable!("{} has no parameters", self.opcode),
        }
    }

    /// MAC seeks finish as soon as the positioner starts; the drive raises
    /// Attention when it arrives. ICD seeks hold the controller until then.
    fn seek_started(&mut self) -> Continuation {
        if self.kind.is_mac() {
            Continuation::CommandComplete(Status::Normal)
        }
        else {
            Continuation::ContinueAsOperation(Functions::empty())
        }
    }

    pub(crate) fn begin_transfer(&mut self) {
        self.eod = false;
        self.index = 0;
        self.length = 0;
        self.words = 0;
    }

    /// Hand the current read, write or verify to the unit.
    fn start_unit(&mut self, units: &mut [DiscUnit], n: usize) -> Continuation {
        let delays = self.delays(units[n].model());
        let opcode = self.opcode;
        let unit = &mut units[n];

        unit.state.opcode = opcode;
        if unit.state.phase == Phase::Seek && opcode.props().seek_wait {
            log::debug!("{} on unit {} deferred until seek completes", opcode, n);
        }
        else {
            unit.state.phase = Phase::Rotate;
            unit.schedule(delays.sector_full);
        }
        Continuation::ContinueAsOperation(Functions::empty())
    }

    fn continue_command(
        &mut self,
        units: &mut [DiscUnit],
        buffer: &mut [u16],
        wakeup: Option<Target>,
        flags: Flags,
        data: u16,
    ) -> Outcome {
        match wakeup {
            Some(Target::Controller) => {
                self.timer_expired(units);
                Outcome::none()
            }
            Some(Target::Unit(n)) if n < units.len() => self.continue_unit(units, n, buffer, flags, data),
            Some(Target::Unit(n)) => {
                log::warn!("Wakeup for unit {} which is not connected", n);
                Outcome::none()
            }
            None if self.phase == Phase::Parameter => self.parameter_phase(units, buffer, flags, data),
            None => Outcome::none(),
        }
    }

    fn timer_expired(&mut self, units: &mut [DiscUnit]) {
        match (self.state, self.phase) {
            (ControllerState::Busy, Phase::Parameter) => {
                log::warn!("{} timed out waiting for parameters", self.opcode);
                self.clear(units, ClearKind::Timeout);
            }
            (ControllerState::Wait, _) => {
                log::debug!("Command wait timer expired");
                self.clear(units, ClearKind::Timeout);
            }
            _ => {
                log::warn!("Stale controller timer in state {}", self.state);
            }
        }
    }

    fn continue_unit(&mut self, units: &mut [DiscUnit], n: usize, buffer: &mut [u16], flags: Flags, data: u16) -> Outcome {
        let opcode = units[n].state.opcode;

        match units[n].state.phase {
            Phase::Idle => {
                log::warn!("Unit {} woke with no operation in progress", n);
                Outcome::none()
            }
            Phase::Parameter => unreachable!("unit {} in parameter phase", n),
            Phase::Seek => self.seek_completion(units, n),
            Phase::Rotate => match opcode.class() {
                _ if opcode == Opcode::Verify => self.start_verify(units, n),
                CommandClass::Read => self.start_read(units, n, buffer),
                CommandClass::Write => self.start_write(units, n),
                _ => unreachable!("{} in rotate phase", opcode),
            },
            Phase::Data => self.transfer_word(units, n, buffer, flags, data),
            Phase::Intersector => {
                if flags.contains(Flags::EOD) {
                    self.eod = true;
                }
                match opcode.class() {
                    _ if opcode == Opcode::Verify => self.end_verify(units, n),
                    CommandClass::Read => self.end_read(units, n),
                    CommandClass::Write => self.end_write(units, n, buffer),
                    _ => unreachable!("{} in intersector phase", opcode),
                }
            }
            Phase::End => {
                let status = units[n].state.end_status;
                units[n].idle();
                if self.state == ControllerState::Busy && self.unit as usize == n {
                    self.end_command(status)
                }
                else {
                    Outcome::none()
                }
            }
        }
    }

    /// Idle unit `n` and end the current command.
    pub(crate) fn end_unit_command(&mut self, units: &mut [DiscUnit], n: usize, status: Status) -> Outcome {
        units[n].idle();
        self.end_command(status)
    }

    /// Complete the current command. A normal completion reports any status
    /// forced by a diagnostic override instead.
    pub(crate) fn end_command(&mut self, status: Status) -> Outcome {
        let props = self.opcode.props();
        let status = if status == Status::Normal && props.clear_status {
            self.status
        }
        else {
            status
        };
        if props.clear_status || status != Status::Normal {
            self.status = status;
        }

        self.phase = Phase::Idle;
        if status == Status::Normal && matches!(props.class, CommandClass::Read | CommandClass::Write) {
            self.retries = self.retry_limit;
        }

        if status == Status::Normal && props.idle_at_end && self.kind.is_mac() {
            self.state = ControllerState::Idle;
            self.cancel(Target::Controller);
        }
        else {
            self.state = ControllerState::Wait;
            self.schedule(Target::Controller, COMMAND_WAIT_TIME);
        }

        self.log_cmd(format!(
            "{} complete: {} ({} words) at {}",
            self.opcode, status, self.words, self.address
        ));

        let functions = self.status_functions(status);
        Outcome::with_data(functions, status_1_word(self.spd, status, self.unit))
    }

    fn status_functions(&mut self, status: Status) -> Functions {
        match status {
            Status::Normal => Functions::FREE,
            Status::DriveAttention => Functions::STINT | Functions::FREE,
            Status::EndOfCylinder => Functions::DVEND | Functions::STINT | Functions::WRTIO | Functions::FREE,
            _ if status.is_retryable() && self.retries > 0 => {
                self.retries -= 1;
                Functions::DVEND | Functions::RQSRV | Functions::SRTRY | Functions::FREE
            }
            _ if status.is_retryable() => Functions::DVEND | Functions::STINT | Functions::WRTIO | Functions::FREE,
            _ => Functions::STINT | Functions::WRTIO | Functions::FREE,
        }
    }

    /// Abort the current command on an interface error.
    fn abort_command(&mut self, units: &mut [DiscUnit], status: Status) -> Outcome {
        let n = self.unit as usize;
        log::debug!("{} aborted: {}", self.opcode, status);

        self.phase = Phase::Idle;
        if let Some(unit) = units.get_mut(n) {
            if unit.state.phase != Phase::Idle && !is_positioning(unit) {
                unit.idle();
                self.cancel(Target::Unit(n));
            }
        }
        self.end_command(status)
    }

    /// Poll the drives for Attention, starting after the last unit serviced.
    fn poll_drives(&mut self, units: &mut [DiscUnit]) -> Outcome {
        let count = units.len().min(self.kind.max_units());
        if count == 0 {
            return Outcome::none();
        }

        let start = self.poll_unit.map_or(0, |last| last + 1);
        for offset in 0..count {
            let n = (start + offset) % count;
            if units[n].state.status.contains(DriveStatus::ATTENTION) {
                units[n].state.status.remove(DriveStatus::ATTENTION);
                self.poll_unit = Some(n);
                self.unit = n as u8;
                self.spd = 0;
                self.status = Status::DriveAttention;
                self.state = ControllerState::Wait;
                self.schedule(Target::Controller, COMMAND_WAIT_TIME);
                self.log_cmd(format!("Attention from unit {}", n));
                return Outcome::with_data(Functions::STINT, self.status_1());
            }
        }
        Outcome::none()
    }

    pub(crate) fn clear(&mut self, units: &mut [DiscUnit], kind: ClearKind) {
        log::debug!("Controller {:?} clear", kind);

        self.state = ControllerState::Idle;
        self.phase = Phase::Idle;
        self.status = Status::Normal;
        self.file_mask = FileMask::empty();
        self.eoc = false;
        self.eod = false;
        self.poll_unit = None;
        self.cancel(Target::Controller);

        if kind == ClearKind::Hard {
            self.spd = 0;
            self.retry_limit = 0;
            self.retries = 0;
        }

        for (n, unit) in units.iter_mut().enumerate() {
            if unit.state.phase != Phase::Idle && !is_positioning(unit) {
                unit.idle();
                self.activations.push(Activation::Cancel {
                    target: Target::Unit(n),
                });
            }
            if kind == ClearKind::Hard {
                unit.state.status = DriveStatus::empty();
            }
        }
    }

    /// The Clear command resets controller status only.
    fn soft_clear(&mut self) {
        self.status = Status::Normal;
        self.spd = 0;
        self.file_mask = FileMask::empty();
        self.retry_limit = 0;
        self.retries = 0;
        self.eoc = false;
    }

    pub fn log_cmd(&mut self, s: String) {
        log::trace!("{}", s);
        self.cmd_log.push_back(s);
    }

    pub fn get_debug_state(&self) -> ControllerDebugState {
        ControllerDebugState {
            kind: self.kind,
            state: self.state,
            opcode: self.opcode,
            status: self.status,
            unit: self.unit,
            spd: self.spd,
            file_mask: self.file_mask,
            retries: self.retries,
            address: self.address,
            eoc: self.eoc,
            verify: self.verify,
            phase: self.phase,
            index: self.index,
            length: self.length,
            words: self.words,
            count: self.count,
            poll_unit: self.poll_unit,
            cmd_log: self.cmd_log.iter().cloned().collect(),
        }
    }
}

/// A unit executing a Seek or Recalibrate in the background. Clears leave these running.
fn is_positioning(unit: &DiscUnit) -> bool {
    unit.state.phase == Phase::Seek && matches!(unit.state.opcode, Opcode::Seek | Opcode::Recalibrate)
}
