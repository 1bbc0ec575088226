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

    device_types::geometry.rs

    Defines the drive models supported by the disc controller and their geometry.
*/

//! Each supported drive has a fixed geometry. The 7905 and 7906 carry a
//! removable cartridge platter plus a fixed platter; the 7920 and 7925 are
//! removable disc packs only. Image files store every removable-platter track
//! first, followed by every fixed-platter track.

use std::{
    fmt::{Display, Formatter},
    ops::Range,
};

use lazy_static::lazy_static;
use serde_derive::Deserialize;
use strum::IntoEnumIterator;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

use crate::device_types::chs::DiskChs;

/// Words in the data field of a sector.
pub const WORDS_PER_SECTOR: usize = 128;
/// Words in a sector header as transferred by the full-sector commands.
pub const HEADER_WORDS: usize = 3;
/// Words transferred by a full-sector command.
pub const FULL_SECTOR_WORDS: usize = HEADER_WORDS + WORDS_PER_SECTOR;
/// Size of the sector buffer shared between an interface and its controller.
pub const SECTOR_BUFFER_WORDS: usize = 138;
pub const BYTES_PER_SECTOR: u64 = (WORDS_PER_SECTOR * 2) as u64;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, StrumDisplay, EnumIter, EnumString)]
pub enum DriveModel {
    #[serde(rename = "7905", alias = "HP7905")]
    #[strum(to_string = "7905", serialize = "HP7905")]
    Hp7905,
    #[serde(rename = "7906", alias = "HP7906")]
    #[strum(to_string = "7906", serialize = "HP7906")]
    Hp7906,
    #[default]
    #[serde(rename = "7920", alias = "HP7920")]
    #[strum(to_string = "7920", serialize = "HP7920")]
    Hp7920,
    #[serde(rename = "7925", alias = "HP7925")]
    #[strum(to_string = "7925", serialize = "HP7925")]
    Hp7925,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DriveProperties {
    pub sectors: u8,
    pub heads: u8,
    pub cylinders: u16,
    pub remov_heads: u8,
    pub fixed_heads: u8,
    /// Drive type reported in bits 12-9 of Status-2.
    pub type_code: u8,
    pub desc: String,
}

lazy_static! {
    // Ordered by capacity so the first model large enough for an image is the smallest.
    static ref DRIVE_PROPERTIES: [DriveProperties; 4] = [
        // HP 7905
        DriveProperties {
            sectors: 48,
            heads: 3,
            cylinders: 411,
            remov_heads: 2,
            fixed_heads: 1,
            type_code: 2,
            desc: "15 MB (cartridge + fixed platter)".to_string(),
        },
        // HP 7906
        DriveProperties {
            sectors: 48,
            heads: 4,
            cylinders: 411,
            remov_heads: 2,
            fixed_heads: 2,
            type_code: 0,
            desc: "20 MB (cartridge + fixed platter)".to_string(),
        },
        // HP 7920
        DriveProperties {
            sectors: 48,
            heads: 5,
            cylinders: 823,
            remov_heads: 5,
            fixed_heads: 0,
            type_code: 1,
            desc: "50 MB (removable pack)".to_string(),
        },
        // HP 7925
        DriveProperties {
            sectors: 64,
            heads: 9,
            cylinders: 823,
            remov_heads: 9,
            fixed_heads: 0,
            type_code: 3,
            desc: "120 MB (removable pack)".to_string(),
        },
    ];
}

impl DriveModel {
    pub fn props(&self) -> &'static DriveProperties {
        &DRIVE_PROPERTIES[*self as usize]
    }

    /// Return the size of a full image for this model in bytes.
    pub fn capacity(&self) -> u64 {
        self.props().sector_count() * BYTES_PER_SECTOR
    }

    /// Return the smallest model whose capacity can hold an image of `len` bytes.
    pub fn from_image_len(len: u64) -> Option<DriveModel> {
        DriveModel::iter().find(|model| model.capacity() >= len)
    }
}

impl Display for DriveProperties {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "c:{} h:{} s:{} ({})",
            self.cylinders, self.heads, self.sectors, self.desc
        )
    }
}

impl DriveProperties {
    pub fn sector_count(&self) -> u64 {
        self.cylinders as u64 * self.heads as u64 * self.sectors as u64
    }

    /// Return a boolean indicating whether the address lies within the drive.
    pub fn contains(&self, chs: impl Into<DiskChs>) -> bool {
        let chs = chs.into();
        chs.c < self.cylinders && chs.h < self.heads && chs.s < self.sectors
    }

    /// Return the range of heads on the platter group that `head` belongs to.
    /// In cylinder mode the controller steps heads only within this range.
    pub fn head_group(&self, head: u8) -> Range<u8> {
        if head < self.remov_heads {
            0..self.remov_heads
        }
        else {
            self.remov_heads..self.heads
        }
    }

    /// Return the linear track index of an address within the image file.
    pub fn track(&self, chs: &DiskChs) -> u64 {
        if chs.h < self.remov_heads {
            chs.c as u64 * self.remov_heads as u64 + chs.h as u64
        }
        else {
            self.cylinders as u64 * self.remov_heads as u64
                + chs.c as u64 * self.fixed_heads as u64
                + (chs.h - self.remov_heads) as u64
        }
    }

    /// Return the byte offset of a sector within the image file.
    pub fn byte_offset(&self, chs: &DiskChs) -> u64 {
        (self.track(chs) * self.sectors as u64 + chs.s as u64) * BYTES_PER_SECTOR
    }
}
