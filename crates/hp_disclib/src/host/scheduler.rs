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

    host::scheduler.rs

    A simple event scheduler for hosting disc controllers.
*/

use crate::{
    device_types::timing::DelayUs,
    devices::disclib::bus::{Activation, Target},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Event {
    time: u64,
    seq: u64,
    target: Target,
}

/// Keeps at most one pending event per target. Events at the same time fire
/// in the order they were scheduled.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: u64,
    seq: u64,
    events: Vec<Event>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time in microseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn apply(&mut self, activations: &[Activation]) {
        for activation in activations {
            match *activation {
                Activation::Schedule { target, delay } => self.activate(target, delay),
                Activation::Cancel { target } => self.cancel(target),
            }
        }
    }

    /// Schedule `target`, replacing any event already pending for it.
    pub fn activate(&mut self, target: Target, delay: DelayUs) {
        self.cancel(target);
        self.seq += 1;
        self.events.push(Event {
            time: self.now + delay as u64,
            seq: self.seq,
            target,
        });
    }

    pub fn cancel(&mut self, target: Target) {
        self.events.retain(|e| e.target != target);
    }

    pub fn is_scheduled(&self, target: Target) -> bool {
        self.events.iter().any(|e| e.target == target)
    }

    /// Time until `target` fires, if it is scheduled.
    pub fn time_remaining(&self, target: Target) -> Option<u64> {
        self.events
            .iter()
            .find(|e| e.target == target)
            .map(|e| e.time - self.now)
    }

    /// Remove the earliest event and advance time to it.
    pub fn pop(&mut self) -> Option<Target> {
        let (idx, _) = self
            .events
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| (e.time, e.seq))?;
        let event = self.events.swap_remove(idx);
        self.now = event.time;
        Some(event.target)
    }
}
