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

    devices::disclib::mod.rs

    HP 13037/13365 disc controller library.
*/

pub mod bus;
pub mod command;
pub mod controller;
pub mod lifecycle;
pub mod overrides;
mod sector_io;
mod seek;
pub mod status;
pub mod unit;

#[cfg(test)]
mod tests;

pub use bus::{Activation, Flags, Functions, StepResult, Target};
pub use command::{CommandClass, Opcode};
pub use controller::{Controller, ControllerDebugState, ControllerKind, ControllerState, FileMask};
pub use lifecycle::Lifecycle;
pub use overrides::{DiagnosticOverrides, OverrideEntry, Syndrome};
pub use sector_io::{ICD_PAD_WORD, ICD_SYNC_WORD, MAC_SYNC_WORD};
pub use status::{DriveStatus, Status};
pub use unit::{DiscUnit, DriveState, ImageStore, Phase};
