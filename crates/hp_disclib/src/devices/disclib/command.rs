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

    devices::disclib::command.rs

    Defines the controller opcodes and the per-opcode properties table.
*/

use modular_bitfield::prelude::*;
use serde_derive::Deserialize;
use strum_macros::{Display, EnumIter};

use crate::devices::disclib::ControllerKind;

/// Command word layout. Bits 7-4 are interpreted per opcode: Set File Mask
/// carries the retry count there, Initialize carries the SPD bits in 7-5 and
/// Cold Load Read overlays its own head/sector fields on the low byte.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct CommandWord {
    pub unit: B4,
    pub modifier: B4,
    pub opcode: B5,
    #[skip]
    unused: B3,
}

impl CommandWord {
    pub fn from_word(word: u16) -> Self {
        CommandWord::from_bytes(word.to_le_bytes())
    }

    pub fn to_word(self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }

    /// Set File Mask: the mask bits.
    pub fn file_mask(&self) -> u8 {
        self.unit()
    }

    /// Set File Mask: the retry count.
    pub fn retries(&self) -> u8 {
        self.modifier()
    }

    /// Initialize: the spare, protected and defective flags.
    pub fn spd(&self) -> u8 {
        self.modifier() >> 1
    }

    /// Cold Load Read: the starting head.
    pub fn cold_load_head(&self) -> u8 {
        ((self.to_word() >> 6) & 0x3) as u8
    }

    /// Cold Load Read: the starting sector.
    pub fn cold_load_sector(&self) -> u8 {
        (self.to_word() & 0x3F) as u8
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Display, EnumIter)]
#[repr(u8)]
pub enum Opcode {
    #[strum(to_string = "Cold Load Read")]
    ColdLoadRead = 0o00,
    Recalibrate = 0o01,
    Seek = 0o02,
    #[strum(to_string = "Request Status")]
    RequestStatus = 0o03,
    #[strum(to_string = "Request Sector Address")]
    RequestSectorAddress = 0o04,
    Read = 0o05,
    #[strum(to_string = "Read Full Sector")]
    ReadFullSector = 0o06,
    Verify = 0o07,
    Write = 0o10,
    #[strum(to_string = "Write Full Sector")]
    WriteFullSector = 0o11,
    Clear = 0o12,
    Initialize = 0o13,
    #[strum(to_string = "Address Record")]
    AddressRecord = 0o14,
    #[strum(to_string = "Request Syndrome")]
    RequestSyndrome = 0o15,
    #[strum(to_string = "Read With Offset")]
    ReadWithOffset = 0o16,
    #[strum(to_string = "Set File Mask")]
    SetFileMask = 0o17,
    #[default]
    #[strum(to_string = "Invalid Opcode")]
    InvalidOpcode = 0o20,
    #[strum(to_string = "Read Without Verify")]
    ReadWithoutVerify = 0o22,
    #[strum(to_string = "Load TIO Register")]
    LoadTioRegister = 0o23,
    #[strum(to_string = "Request Disc Address")]
    RequestDiscAddress = 0o24,
    End = 0o25,
    Wakeup = 0o26,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandClass {
    Read,
    Write,
    Control,
    Status,
    Invalid,
}

#[derive(Copy, Clone, Debug)]
pub struct CommandProperties {
    /// Parameter words supplied by the interface after the command.
    pub params_in: usize,
    /// Parameter words returned to the interface.
    pub params_out: usize,
    pub class: CommandClass,
    pub valid_mac: bool,
    pub valid_icd: bool,
    /// The command clears the controller status when it starts.
    pub clear_status: bool,
    /// The command word carries a unit number.
    pub unit_field: bool,
    /// The command fails with Status-2 Error if the drive reports an error.
    pub unit_check: bool,
    /// The command schedules drive events.
    pub unit_access: bool,
    /// The command waits for an in-progress seek to complete.
    pub seek_wait: bool,
    /// The command compares the drive's cylinder against the controller address.
    pub verify_address: bool,
    /// On the MAC controller, a normal completion returns to Idle rather than Wait.
    pub idle_at_end: bool,
}

macro_rules! props {
    ($in:expr, $out:expr, $class:ident, $mac:expr, $icd:expr, $clr:expr, $uf:expr, $uc:expr, $ua:expr, $sw:expr, $va:expr, $ie:expr) => {
        CommandProperties {
            params_in: $in,
            params_out: $out,
            class: CommandClass::$class,
            valid_mac: $mac,
            valid_icd: $icd,
            clear_status: $clr,
            unit_field: $uf,
            unit_check: $uc,
            unit_access: $ua,
            seek_wait: $sw,
            verify_address: $va,
            idle_at_end: $ie,
        }
    };
}

const T: bool = true;
const F: bool = false;

#[rustfmt::skip]
static COMMAND_PROPERTIES: [CommandProperties; 0o27] = [
    //     in out class    mac  icd  clr  unit chk  acc  swt  vfy  idle
    props!(0, 0, Read,     T,   T,   T,   F,   T,   T,   F,   T,   F), // 00 Cold Load Read
    props!(0, 0, Control,  T,   T,   T,   T,   F,   T,   F,   F,   T), // 01 Recalibrate
    props!(2, 0, Control,  T,   T,   T,   T,   F,   T,   F,   F,   T), // 02 Seek
    props!(0, 2, Status,   T,   T,   F,   T,   F,   F,   F,   F,   F), // 03 Request Status
    props!(0, 1, Status,   T,   T,   T,   T,   T,   F,   F,   F,   F), // 04 Request Sector Address
    props!(0, 0, Read,     T,   T,   T,   T,   T,   T,   T,   T,   F), // 05 Read
    props!(0, 0, Read,     T,   T,   T,   T,   T,   T,   T,   T,   F), // 06 Read Full Sector
    props!(1, 0, Read,     T,   T,   T,   T,   T,   T,   T,   T,   F), // 07 Verify
    props!(0, 0, Write,    T,   T,   T,   T,   T,   T,   T,   T,   F), // 10 Write
    props!(0, 0, Write,    T,   T,   T,   T,   T,   T,   T,   T,   F), // 11 Write Full Sector
    props!(0, 0, Control,  T,   T,   T,   F,   F,   F,   F,   F,   F), // 12 Clear
    props!(0, 0, Write,    T,   T,   T,   T,   T,   T,   T,   T,   F), // 13 Initialize
    props!(2, 0, Control,  T,   T,   T,   F,   F,   F,   F,   F,   F), // 14 Address Record
    props!(0, 7, Status,   T,   T,   F,   F,   F,   F,   F,   F,   F), // 15 Request Syndrome
    props!(1, 0, Read,     T,   F,   T,   T,   T,   T,   T,   T,   F), // 16 Read With Offset
    props!(0, 0, Control,  T,   T,   T,   F,   F,   F,   F,   F,   F), // 17 Set File Mask
    props!(0, 0, Invalid,  F,   F,   T,   F,   F,   F,   F,   F,   F), // 20 Invalid Opcode
    props!(0, 0, Invalid,  F,   F,   T,   F,   F,   F,   F,   F,   F), // 21 (undefined)
    props!(0, 0, Read,     T,   T,   T,   T,   T,   T,   T,   F,   F), // 22 Read Without Verify
    props!(1, 0, Control,  T,   F,   T,   F,   F,   F,   F,   F,   F), // 23 Load TIO Register
    props!(0, 2, Status,   T,   T,   F,   F,   F,   F,   F,   F,   F), // 24 Request Disc Address
    props!(0, 0, Control,  T,   T,   T,   F,   F,   F,   F,   F,   T), // 25 End
    props!(0, 0, Control,  F,   T,   T,   F,   F,   F,   F,   F,   F), // 26 Wakeup
];

impl Opcode {
    /// Decode the opcode field of a command word. Undefined codes decode to
    /// [Opcode::InvalidOpcode].
    pub fn decode(code: u8) -> Opcode {
        match code {
            0o00 => Opcode::ColdLoadRead,
            0o01 => Opcode::Recalibrate,
            0o02 => Opcode::Seek,
            0o03 => Opcode::RequestStatus,
            0o04 => Opcode::RequestSectorAddress,
            0o05 => Opcode::Read,
            0o06 => Opcode::ReadFullSector,
            0o07 => Opcode::Verify,
            0o10 => Opcode::Write,
            0o11 => Opcode::WriteFullSector,
            0o12 => Opcode::Clear,
            0o13 => Opcode::Initialize,
            0o14 => Opcode::AddressRecord,
            0o15 => Opcode::RequestSyndrome,
            0o16 => Opcode::ReadWithOffset,
            0o17 => Opcode::SetFileMask,
            0o22 => Opcode::ReadWithoutVerify,
            0o23 => Opcode::LoadTioRegister,
            0o24 => Opcode::RequestDiscAddress,
            0o25 => Opcode::End,
            0o26 => Opcode::Wakeup,
            _ => Opcode::InvalidOpcode,
        }
    }

    #[inline]
    pub fn props(&self) -> &'static CommandProperties {
        &COMMAND_PROPERTIES[*self as usize]
    }

    #[inline]
    pub fn class(&self) -> CommandClass {
        self.props().class
    }

    pub fn is_valid_for(&self, kind: ControllerKind) -> bool {
        match kind {
            ControllerKind::Mac => self.props().valid_mac,
            ControllerKind::Icd | ControllerKind::Cs80 => self.props().valid_icd,
        }
    }

    /// Build a command word addressing `unit`.
    pub fn word(&self, unit: u8) -> u16 {
        CommandWord::new()
            .with_opcode(*self as u8)
            .with_unit(unit & 0xF)
            .to_word()
    }

    /// Build a Set File Mask command word.
    pub fn file_mask_word(mask: u8, retries: u8) -> u16 {
        CommandWord::new()
            .with_opcode(Opcode::SetFileMask as u8)
            .with_modifier(retries & 0xF)
            .with_unit(mask & 0xF)
            .to_word()
    }

    /// Build an Initialize command word carrying the SPD flags.
    pub fn initialize_word(spd: u8, unit: u8) -> u16 {
        CommandWord::new()
            .with_opcode(Opcode::Initialize as u8)
            .with_modifier((spd & 0x7) << 1)
            .with_unit(unit & 0xF)
            .to_word()
    }

    /// Build a Cold Load Read command word.
    pub fn cold_load_word(head: u8, sector: u8) -> u16 {
        ((Opcode::ColdLoadRead as u16) << 8) | (((head & 0x3) as u16) << 6) | (sector & 0x3F) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn table_is_indexed_by_opcode() {
        for opcode in Opcode::iter() {
            assert_eq!(Opcode::decode(opcode as u8), opcode);
        }
        assert_eq!(Opcode::decode(0o21), Opcode::InvalidOpcode);
        assert_eq!(Opcode::decode(0o27), Opcode::InvalidOpcode);
        assert_eq!(Opcode::decode(0o37), Opcode::InvalidOpcode);
    }

    #[test]
    fn parameter_counts() {
        assert_eq!(Opcode::Seek.props().params_in, 2);
        assert_eq!(Opcode::AddressRecord.props().params_in, 2);
        assert_eq!(Opcode::Verify.props().params_in, 1);
        assert_eq!(Opcode::ReadWithOffset.props().params_in, 1);
        assert_eq!(Opcode::LoadTioRegister.props().params_in, 1);
        assert_eq!(Opcode::RequestStatus.props().params_out, 2);
        assert_eq!(Opcode::RequestSectorAddress.props().params_out, 1);
        assert_eq!(Opcode::RequestSyndrome.props().params_out, 7);
        assert_eq!(Opcode::RequestDiscAddress.props().params_out, 2);
    }

    #[test]
    fn validity_by_controller() {
        assert!(!Opcode::Wakeup.is_valid_for(ControllerKind::Mac));
        assert!(Opcode::Wakeup.is_valid_for(ControllerKind::Icd));
        assert!(!Opcode::LoadTioRegister.is_valid_for(ControllerKind::Icd));
        assert!(!Opcode::LoadTioRegister.is_valid_for(ControllerKind::Cs80));
        assert!(Opcode::LoadTioRegister.is_valid_for(ControllerKind::Mac));
        assert!(!Opcode::InvalidOpcode.is_valid_for(ControllerKind::Mac));
        assert!(!Opcode::InvalidOpcode.is_valid_for(ControllerKind::Icd));
    }

    #[test]
    fn status_commands_preserve_status() {
        assert!(!Opcode::RequestStatus.props().clear_status);
        assert!(!Opcode::RequestSyndrome.props().clear_status);
        assert!(Opcode::Read.props().clear_status);
    }

    #[test]
    fn command_word_fields() {
        let word = Opcode::Read.word(5);
        assert_eq!(word, 0o2405);
        let cmd = CommandWord::from_word(word);
        assert_eq!(Opcode::decode(cmd.opcode()), Opcode::Read);
        assert_eq!(cmd.unit(), 5);

        let cmd = CommandWord::from_word(Opcode::file_mask_word(0b0101, 3));
        assert_eq!(cmd.file_mask(), 0b0101);
        assert_eq!(cmd.retries(), 3);

        let cmd = CommandWord::from_word(Opcode::initialize_word(0b101, 2));
        assert_eq!(cmd.spd(), 0b101);
        assert_eq!(cmd.unit(), 2);

        let cmd = CommandWord::from_word(Opcode::cold_load_word(2, 17));
        assert_eq!(Opcode::decode(cmd.opcode()), Opcode::ColdLoadRead);
        assert_eq!(cmd.cold_load_head(), 2);
        assert_eq!(cmd.cold_load_sector(), 17);
    }
}
