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

    devices::disclib::overrides.rs

    Diagnostic status overrides used to exercise error handling in host software.
*/

//! A diagnostic override forces the outcome of a command issued at a
//! particular address. Entries are consumed strictly in order: only the entry
//! under the cursor is compared, and the cursor advances when it matches.

use serde_derive::Deserialize;

use crate::{
    device_types::chs::DiskChs,
    devices::disclib::{command::Opcode, status::Status},
};

/// Words returned by Request Syndrome after a correctable data error.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Syndrome {
    pub displacement: u16,
    pub patterns: [u16; 3],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OverrideEntry {
    pub address: DiskChs,
    pub opcode: Opcode,
    pub spd: u8,
    pub status: Status,
    pub syndrome: Option<Syndrome>,
}

impl OverrideEntry {
    pub fn matches(&self, address: &DiskChs, opcode: Opcode) -> bool {
        self.address == *address && self.opcode == opcode
    }
}

#[derive(Clone, Debug, Default)]
pub struct DiagnosticOverrides {
    entries: Vec<OverrideEntry>,
    cursor: usize,
}

impl DiagnosticOverrides {
    pub fn new(entries: Vec<OverrideEntry>) -> Self {
        Self { entries, cursor: 0 }
    }

    pub fn push(&mut self, entry: OverrideEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries not yet consumed.
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.cursor
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    /// Consume the entry under the cursor if it matches the command being started.
    pub fn take_match(&mut self, address: &DiskChs, opcode: Opcode) -> Option<OverrideEntry> {
        let entry = self.entries.get(self.cursor)?;
        if entry.matches(address, opcode) {
            self.cursor += 1;
            Some(*entry)
        }
        else {
            None
        }
    }
}
