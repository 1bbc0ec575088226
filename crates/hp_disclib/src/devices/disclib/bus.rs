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

    devices::disclib::bus.rs

    Defines the flag and function buses exchanged between an interface and the controller.
*/

use std::fmt::{Display, Formatter};

use bitflags::bitflags;

use crate::device_types::timing::DelayUs;

bitflags! {
    /// Signals from the interface to the controller.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Flags: u16 {
        /// Clear the controller.
        const CLEARF = 0x0001;
        /// A command word is available.
        const CMRDY  = 0x0002;
        /// The interface can supply or accept a data word.
        const DTRDY  = 0x0004;
        /// The host has ended the data transfer.
        const EOD    = 0x0008;
        /// Interrupts are enabled; the MAC controller may poll for attention.
        const INTOK  = 0x0010;
        /// The interface overran the transfer.
        const OVRUN  = 0x0020;
        /// The channel program aborted the transfer.
        const XFRNG  = 0x0040;
    }
}

bitflags! {
    /// Requests from the controller to the interface.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Functions: u16 {
        /// The controller is executing a command.
        const BUSY  = 0x0001;
        /// The controller has finished a command.
        const FREE  = 0x0002;
        /// The command word has been consumed.
        const IFGTC = 0x0004;
        /// The data word on the bus is delivered to the interface.
        const IFIN  = 0x0008;
        /// The data word from the interface has been consumed.
        const IFOUT = 0x0010;
        /// Request service from the channel.
        const RQSRV = 0x0020;
        /// Device end.
        const DVEND = 0x0040;
        /// Retry the transfer.
        const SRTRY = 0x0080;
        /// Set the interrupt.
        const STINT = 0x0100;
        /// Write the data word into the TIO register.
        const WRTIO = 0x0200;
    }
}

impl Functions {
    /// Functions that place a word on the data bus.
    pub const DATA_OUT: Functions = Functions::IFIN.union(Functions::WRTIO);
}

/// Event targets owned by a controller: its drives, and the controller
/// itself for the command wait and parameter timers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Unit(usize),
    Controller,
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Unit(n) => write!(f, "unit {}", n),
            Target::Controller => write!(f, "controller"),
        }
    }
}

/// Scheduling request returned by the controller. Scheduling a target
/// replaces any activation already pending for it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Activation {
    Schedule { target: Target, delay: DelayUs },
    Cancel { target: Target },
}

impl Activation {
    pub fn target(&self) -> Target {
        match self {
            Activation::Schedule { target, .. } | Activation::Cancel { target } => *target,
        }
    }
}

/// The result of a controller step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepResult {
    pub functions: Functions,
    pub data: u16,
    pub activations: Vec<Activation>,
}

/// Functions and bus data produced while handling one step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub(crate) functions: Functions,
    pub(crate) data: u16,
}

impl Outcome {
    pub(crate) fn none() -> Self {
        Self::default()
    }

    pub(crate) fn functions(functions: Functions) -> Self {
        Self { functions, data: 0 }
    }

    pub(crate) fn with_data(functions: Functions, data: u16) -> Self {
        Self { functions, data }
    }

    /// Combine two outcomes. The later outcome's data wins if it drives the bus.
    pub(crate) fn merge(&mut self, other: Outcome) {
        if other.functions.intersects(Functions::DATA_OUT) || !self.functions.intersects(Functions::DATA_OUT) {
            self.data = other.data;
        }
        self.functions |= other.functions;
    }
}
