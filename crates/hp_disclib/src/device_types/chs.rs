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

    device_types::chs.rs
*/

//! Define a [DiskChs] that represents the cylinder, head, sector address
//! maintained by the disc controller. HP drives number sectors from zero,
//! so unlike a PC hard disk address the default sector is 0.

use std::fmt::Display;

use modular_bitfield::prelude::*;

/// The second word of a disc address as it travels over the interface.
/// The cylinder occupies a whole word of its own.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct HeadSectorWord {
    pub sector: B8,
    pub head: B5,
    #[skip]
    unused: B3,
}

impl HeadSectorWord {
    pub fn from_word(word: u16) -> Self {
        HeadSectorWord::from_bytes(word.to_le_bytes())
    }

    pub fn to_word(self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }
}

/// A structure representing a cylinder, head, sector address
///  - Cylinder (c)
///  - Head (h)
///  - Sector (s)
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct DiskChs {
    pub(crate) c: u16,
    pub(crate) h: u8,
    pub(crate) s: u8,
}

impl From<(u16, u8, u8)> for DiskChs {
    fn from((c, h, s): (u16, u8, u8)) -> Self {
        Self { c, h, s }
    }
}

impl From<DiskChs> for (u16, u8, u8) {
    fn from(chs: DiskChs) -> Self {
        (chs.c, chs.h, chs.s)
    }
}

impl Display for DiskChs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{:3} h:{} s:{:2}]", self.c, self.h, self.s)
    }
}

impl DiskChs {
    /// Create a new `DiskChs` structure from cylinder, head and sector components.
    pub fn new(c: u16, h: u8, s: u8) -> Self {
        Self { c, h, s }
    }
    /// Build a `DiskChs` from the two address words supplied with a Seek or Address Record command.
    pub fn from_words(cylinder: u16, head_sector: u16) -> Self {
        let hs = HeadSectorWord::from_word(head_sector);
        Self {
            c: cylinder,
            h: hs.head(),
            s: hs.sector(),
        }
    }
    /// Return the cylinder, head and sector components in a tuple.
    #[inline]
    pub fn get(&self) -> (u16, u8, u8) {
        (self.c, self.h, self.s)
    }
    #[inline]
    pub fn c(&self) -> u16 {
        self.c
    }
    #[inline]
    pub fn h(&self) -> u8 {
        self.h
    }
    #[inline]
    pub fn s(&self) -> u8 {
        self.s
    }
    pub fn set(&mut self, c: u16, h: u8, s: u8) {
        self.c = c;
        self.h = h;
        self.s = s;
    }
    #[inline]
    pub fn set_c(&mut self, c: u16) {
        self.c = c;
    }
    #[inline]
    pub fn set_h(&mut self, h: u8) {
        self.h = h;
    }
    #[inline]
    pub fn set_s(&mut self, s: u8) {
        self.s = s;
    }
    /// Return the head/sector half of the address packed into an interface word.
    pub fn head_sector_word(&self) -> u16 {
        HeadSectorWord::new()
            .with_head(self.h & 0x1F)
            .with_sector(self.s)
            .to_word()
    }
}
