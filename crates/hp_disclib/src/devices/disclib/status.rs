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

    devices::disclib::status.rs

    Defines the controller status codes and the drive status word.
*/

use bitflags::bitflags;
use serde_derive::Deserialize;
use strum_macros::Display;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Display)]
#[repr(u8)]
pub enum Status {
    #[default]
    Normal = 0o00,
    #[strum(to_string = "Illegal opcode")]
    IllegalOpcode = 0o01,
    #[strum(to_string = "Unit available")]
    UnitAvailable = 0o02,
    #[strum(to_string = "Illegal drive type")]
    IllegalDriveType = 0o03,
    #[strum(to_string = "Cylinder miscompare")]
    CylinderMiscompare = 0o07,
    #[strum(to_string = "Uncorrectable data error")]
    UncorrectableDataError = 0o10,
    #[strum(to_string = "Head-sector miscompare")]
    HeadSectorMiscompare = 0o11,
    #[strum(to_string = "I/O program error")]
    IoProgramError = 0o12,
    #[strum(to_string = "Sync timeout")]
    SyncTimeout = 0o13,
    #[strum(to_string = "End of cylinder")]
    EndOfCylinder = 0o14,
    #[strum(to_string = "Data overrun")]
    DataOverrun = 0o16,
    #[strum(to_string = "Correctable data error")]
    CorrectableDataError = 0o17,
    #[strum(to_string = "Illegal spare access")]
    IllegalSpareAccess = 0o20,
    #[strum(to_string = "Defective track")]
    DefectiveTrack = 0o21,
    #[strum(to_string = "Access not ready")]
    AccessNotReady = 0o22,
    #[strum(to_string = "Status-2 error")]
    Status2Error = 0o23,
    #[strum(to_string = "Protected track")]
    ProtectedTrack = 0o26,
    #[strum(to_string = "Unit unavailable")]
    UnitUnavailable = 0o27,
    #[strum(to_string = "Drive attention")]
    DriveAttention = 0o37,
}

impl Status {
    #[inline]
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Errors the interface may retry under the retry count loaded by Set File Mask.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Status::UncorrectableDataError | Status::DataOverrun | Status::SyncTimeout
        )
    }
}

bitflags! {
    /// Drive status bits reported in the low byte of Status-2. The drive type
    /// occupies bits 12-9 and the error summary bit 15; both are computed
    /// when the word is built.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct DriveStatus: u16 {
        const ATTENTION    = 0o200;
        const READ_ONLY    = 0o100;
        const FORMAT_EN    = 0o040;
        const FAULT        = 0o020;
        const FIRST_STATUS = 0o010;
        const SEEK_CHECK   = 0o004;
        const NOT_READY    = 0o002;
        const BUSY         = 0o001;

        /// Conditions that set the error summary bit and fail unit-checked commands.
        const ERRORS = Self::FAULT.bits() | Self::FIRST_STATUS.bits() | Self::SEEK_CHECK.bits() | Self::NOT_READY.bits();
    }
}

pub const STATUS_2_ERROR_BIT: u16 = 0x8000;
pub const STATUS_2_TYPE_SHIFT: u16 = 9;

/// Pack the Status-1 word: SPD flags, status code and unit number.
pub fn status_1_word(spd: u8, status: Status, unit: u8) -> u16 {
    ((spd as u16 & 0x7) << 13) | ((status.code() as u16) << 8) | (unit as u16 & 0xF)
}

/// Pack the Status-2 word from the drive type and status bits.
pub fn status_2_word(type_code: u8, status: DriveStatus) -> u16 {
    let mut word = ((type_code as u16 & 0xF) << STATUS_2_TYPE_SHIFT) | status.bits();
    if status.intersects(DriveStatus::ERRORS) {
        word |= STATUS_2_ERROR_BIT;
    }
    word
}
