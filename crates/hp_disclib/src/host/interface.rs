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

    host::interface.rs

    A channel interface that hosts a disc controller and its drives.
*/

//! [DiscInterface] plays the part of the 12821 or 13175 interface card: it
//! owns the sector buffer, latches command words, queues data words in each
//! direction and translates the controller's function requests. Time is
//! simulated by a [Scheduler]; nothing here sleeps.

use std::{collections::VecDeque, mem, path::Path};

use crate::{
    device_types::geometry::SECTOR_BUFFER_WORDS,
    devices::disclib::{
        bus::{Flags, Functions, Target},
        controller::{Controller, ControllerState},
        lifecycle::Lifecycle,
        status::Status,
        unit::{DiscUnit, ImageStore},
    },
    error::DiscError,
    host::scheduler::Scheduler,
};

/// The result of a command run to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transfer {
    /// Words delivered by the controller, parameters and data alike.
    pub words: Vec<u16>,
    pub status: Status,
    /// Every function requested while the command ran.
    pub functions: Functions,
    pub tio: u16,
}

#[derive(Clone, Debug)]
struct PendingCommand {
    word: u16,
    outbound: Vec<u16>,
    inbound_limit: usize,
}

pub struct DiscInterface {
    controller: Controller,
    units: Vec<DiscUnit>,
    buffer: Vec<u16>,
    scheduler: Scheduler,
    latched: Option<PendingCommand>,
    outbound: VecDeque<u16>,
    inbound: Vec<u16>,
    inbound_limit: usize,
    transfer_active: bool,
    signal: Flags,
    interrupts_enabled: bool,
    interrupt: bool,
    busy: bool,
    tio: u16,
    functions: Functions,
}

impl DiscInterface {
    pub fn new(controller: Controller, units: Vec<DiscUnit>) -> Self {
        if units.len() > controller.kind().max_units() {
            log::warn!(
                "{} units connected to a {} controller; only {} are addressable",
                units.len(),
                controller.kind(),
                controller.kind().max_units()
            );
        }
        Self {
            controller,
            units,
            buffer: vec![0; SECTOR_BUFFER_WORDS],
            scheduler: Scheduler::new(),
            latched: None,
            outbound: VecDeque::new(),
            inbound: Vec::new(),
            inbound_limit: 0,
            transfer_active: false,
            signal: Flags::empty(),
            interrupts_enabled: false,
            interrupt: false,
            busy: false,
            tio: 0,
            functions: Functions::empty(),
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn units(&self) -> &[DiscUnit] {
        &self.units
    }

    pub fn unit(&self, n: usize) -> Option<&DiscUnit> {
        self.units.get(n)
    }

    pub fn unit_mut(&mut self, n: usize) -> Option<&mut DiscUnit> {
        self.units.get_mut(n)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn buffer(&self) -> &[u16] {
        &self.buffer
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Functions requested since the current command was accepted.
    pub fn functions(&self) -> Functions {
        self.functions
    }

    pub fn tio(&self) -> u16 {
        self.tio
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt
    }

    /// Return and clear the interrupt request.
    pub fn take_interrupt(&mut self) -> bool {
        mem::take(&mut self.interrupt)
    }

    /// Enable or disable interrupts. Enabling lets an idle MAC controller poll for attention.
    pub fn set_interrupts(&mut self, enabled: bool) {
        self.interrupts_enabled = enabled;
        if enabled {
            self.service(None);
        }
    }

    pub fn attach(&mut self, n: usize, path: impl AsRef<Path>) -> Result<(), DiscError> {
        let unit = self.units.get_mut(n).ok_or(DiscError::InvalidUnit(n))?;
        let lifecycle = self.controller.attach(unit, path)?;
        self.settle(lifecycle);
        Ok(())
    }

    pub fn attach_image<S: ImageStore + 'static>(&mut self, n: usize, image: S) -> Result<(), DiscError> {
        let unit = self.units.get_mut(n).ok_or(DiscError::InvalidUnit(n))?;
        let lifecycle = self.controller.attach_image(unit, image)?;
        self.settle(lifecycle);
        Ok(())
    }

    pub fn detach(&mut self, n: usize) -> Result<(), DiscError> {
        let unit = self.units.get_mut(n).ok_or(DiscError::InvalidUnit(n))?;
        let lifecycle = self.controller.detach(unit)?;
        self.settle(lifecycle);
        Ok(())
    }

    pub fn load_unload(&mut self, n: usize, load: bool) -> Result<(), DiscError> {
        let unit = self.units.get_mut(n).ok_or(DiscError::InvalidUnit(n))?;
        let lifecycle = self.controller.load_unload(unit, load)?;
        self.settle(lifecycle);
        Ok(())
    }

    fn settle(&mut self, lifecycle: Lifecycle) {
        if lifecycle == Lifecycle::Incomplete {
            self.service(None);
        }
    }

    /// Assert CLEARF.
    pub fn clear(&mut self) {
        self.signal = Flags::CLEARF;
        self.service(None);
        self.signal = Flags::empty();

        self.latched = None;
        self.outbound.clear();
        self.transfer_active = false;
        self.busy = false;
    }

    /// Abort the transfer in progress: `overrun` signals OVRUN, otherwise XFRNG.
    pub fn abort_transfer(&mut self, overrun: bool) {
        self.signal = if overrun { Flags::OVRUN } else { Flags::XFRNG };
        self.service(None);
        self.signal = Flags::empty();
    }

    /// Latch a command word. `outbound` holds the parameter or data words the
    /// host will supply; the transfer ends with EOD once `inbound_limit` words
    /// have been received and every outbound word consumed.
    pub fn issue(&mut self, command: u16, outbound: &[u16], inbound_limit: usize) {
        if self.latched.is_some() {
            log::warn!("Command {:06o} replaces a command that was never accepted", command);
        }
        self.latched = Some(PendingCommand {
            word: command,
            outbound: outbound.to_vec(),
            inbound_limit,
        });
        self.service(None);
    }

    /// Issue a command and run events until the controller has finished it.
    pub fn execute(&mut self, command: u16, outbound: &[u16], inbound_limit: usize) -> Transfer {
        self.issue(command, outbound, inbound_limit);
        self.run_command();
        Transfer {
            words: mem::take(&mut self.inbound),
            status: self.controller.status(),
            functions: self.functions,
            tio: self.tio,
        }
    }

    /// Run events until no command is latched or executing.
    pub fn run_command(&mut self) {
        while self.latched.is_some() || self.controller.state() == ControllerState::Busy {
            if !self.advance() {
                log::warn!("Controller is busy with no events pending");
                break;
            }
        }
    }

    /// Run every pending event.
    pub fn run_until_idle(&mut self) {
        while self.advance() {}
    }

    /// Fire the next scheduled event. Returns false if none was pending.
    pub fn advance(&mut self) -> bool {
        match self.scheduler.pop() {
            Some(target) => {
                self.service(Some(target));
                true
            }
            None => false,
        }
    }

    fn flags(&self) -> Flags {
        let mut flags = self.signal;
        if self.latched.is_some() {
            flags |= Flags::CMRDY;
        }
        if self.interrupts_enabled {
            flags |= Flags::INTOK;
        }
        if self.transfer_active {
            let inbound_open = self.inbound.len() < self.inbound_limit;
            if !self.outbound.is_empty() || inbound_open {
                flags |= Flags::DTRDY;
            }
            if self.outbound.is_empty() && !inbound_open {
                flags |= Flags::EOD;
            }
        }
        flags
    }

    fn data(&self) -> u16 {
        match (self.outbound.front(), &self.latched) {
            (Some(word), _) if self.transfer_active => *word,
            (_, Some(command)) => command.word,
            _ => 0,
        }
    }

    /// Call the controller until it stops requesting functions.
    fn service(&mut self, mut wakeup: Option<Target>) {
        loop {
            let flags = self.flags();
            let data = self.data();
            let result = self
                .controller
                .step(&mut self.units, &mut self.buffer, wakeup.take(), flags, data);

            self.scheduler.apply(&result.activations);
            if result.functions.is_empty() {
                break;
            }
            self.respond(result.functions, result.data);

            // CLEARF and abort signals are single-shot.
            if !self.signal.is_empty() {
                break;
            }
        }
    }

    fn respond(&mut self, functions: Functions, data: u16) {
        if functions.contains(Functions::IFGTC) {
            if let Some(command) = self.latched.take() {
                self.outbound = command.outbound.into();
                self.inbound.clear();
                self.inbound_limit = command.inbound_limit;
                self.transfer_active = true;
                self.functions = Functions::empty();
            }
        }
        if functions.contains(Functions::IFOUT) {
            self.outbound.pop_front();
        }
        if functions.contains(Functions::IFIN) {
            self.inbound.push(data);
        }
        if functions.contains(Functions::BUSY) {
            self.busy = true;
        }
        if functions.contains(Functions::FREE) {
            self.busy = false;
            self.transfer_active = false;
        }
        if functions.contains(Functions::STINT) {
            self.interrupt = true;
        }
        if functions.contains(Functions::WRTIO) {
            self.tio = data;
        }
        self.functions |= functions;
    }
}
