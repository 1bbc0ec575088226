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

    devices::disclib::unit.rs

    Implements a disc drive unit and its backing image.
*/

use core::fmt;
use std::{
    fmt::Debug,
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use strum_macros::Display;

use crate::{
    device_types::{
        geometry::{DriveModel, BYTES_PER_SECTOR, WORDS_PER_SECTOR},
        timing::DelayUs,
    },
    devices::disclib::{
        command::Opcode,
        status::{status_2_word, DriveStatus, Status},
    },
};

/// Backing store for a disc image. Files are the usual store; tests and
/// embedders may supply anything seekable, such as an in-memory cursor.
pub trait ImageStore: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> ImageStore for T {}

/// The phase of the command a unit (or the controller's parameter exchange)
/// is executing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display)]
pub enum Phase {
    #[default]
    Idle,
    Parameter,
    Seek,
    Rotate,
    Data,
    Intersector,
    End,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriveState {
    /// Cylinder the positioner is over, or moving to.
    pub cylinder: u16,
    /// Latched status bits. Ready, busy and the protect switches are derived.
    pub status: DriveStatus,
    pub opcode: Opcode,
    pub phase: Phase,
    pub file_offset: u64,
    /// Status reported when the End phase runs.
    pub end_status: Status,
    /// Sector currently passing under the heads.
    pub sector: u8,
    pub(crate) pending_delay: Option<DelayUs>,
}

pub struct DiscUnit {
    model: DriveModel,
    autosize: bool,
    read_only: bool,
    format_enabled: bool,
    image: Option<Box<dyn ImageStore>>,
    path: Option<PathBuf>,
    heads_loaded: bool,
    pub(crate) state: DriveState,
}

impl Debug for DiscUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscUnit")
            .field("model", &self.model)
            .field("path", &self.path)
            .field("heads_loaded", &self.heads_loaded)
            .field("state", &self.state)
            .finish()
    }
}

impl Default for DiscUnit {
    fn default() -> Self {
        Self::new(DriveModel::default())
    }
}

impl DiscUnit {
    pub fn new(model: DriveModel) -> Self {
        Self {
            model,
            autosize: true,
            read_only: false,
            format_enabled: false,
            image: None,
            path: None,
            heads_loaded: false,
            state: DriveState::default(),
        }
    }

    pub fn model(&self) -> DriveModel {
        self.model
    }

    pub fn set_model(&mut self, model: DriveModel) {
        self.model = model;
    }

    pub(crate) fn set_model_from_image(&mut self, model: DriveModel) {
        if model != self.model {
            log::debug!("Autosized drive from {} to {}", self.model, model);
        }
        self.model = model;
    }

    pub fn autosize(&self) -> bool {
        self.autosize
    }

    pub fn set_autosize(&mut self, autosize: bool) {
        self.autosize = autosize;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_format_enabled(&self) -> bool {
        self.format_enabled
    }

    pub fn set_format_enabled(&mut self, enabled: bool) {
        self.format_enabled = enabled;
    }

    pub fn is_attached(&self) -> bool {
        self.image.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.heads_loaded
    }

    /// The drive is ready when an image is attached and the heads are loaded.
    pub fn is_ready(&self) -> bool {
        self.is_attached() && self.heads_loaded
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> &DriveState {
        &self.state
    }

    /// Return the drive status bits including those derived from the drive's
    /// switches and activity.
    pub fn drive_status(&self) -> DriveStatus {
        let mut status = self.state.status;
        status.set(DriveStatus::NOT_READY, !self.is_ready());
        status.set(DriveStatus::BUSY, self.state.phase != Phase::Idle);
        status.set(DriveStatus::READ_ONLY, self.read_only);
        status.set(DriveStatus::FORMAT_EN, self.format_enabled);
        status
    }

    pub fn status_2(&self) -> u16 {
        status_2_word(self.model.props().type_code, self.drive_status())
    }

    pub(crate) fn set_image(&mut self, image: Box<dyn ImageStore>, path: Option<PathBuf>) {
        self.image = Some(image);
        self.path = path;
    }

    pub(crate) fn take_image(&mut self) -> Option<Box<dyn ImageStore>> {
        self.path = None;
        self.image.take()
    }

    pub(crate) fn set_heads_loaded(&mut self, loaded: bool) {
        self.heads_loaded = loaded;
    }

    /// Request an activation of this unit when the current step completes.
    pub(crate) fn schedule(&mut self, delay: DelayUs) {
        self.state.pending_delay = Some(delay);
    }

    pub(crate) fn idle(&mut self) {
        self.state.phase = Phase::Idle;
        self.state.pending_delay = None;
    }

    /// Read one sector's data field. Bytes past the end of the image read as zero.
    pub(crate) fn read_sector(&mut self, offset: u64, words: &mut [u16]) -> io::Result<()> {
        let image = self.image.as_mut().ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let mut bytes = [0u8; BYTES_PER_SECTOR as usize];

        image.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < bytes.len() {
            match image.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        for (word, pair) in words.iter_mut().zip(bytes.chunks_exact(2)).take(WORDS_PER_SECTOR) {
            *word = u16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(())
    }

    /// Write one sector's data field.
    pub(crate) fn write_sector(&mut self, offset: u64, words: &[u16]) -> io::Result<()> {
        let image = self.image.as_mut().ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let mut bytes = [0u8; BYTES_PER_SECTOR as usize];
        for (pair, word) in bytes.chunks_exact_mut(2).zip(words.iter()) {
            pair.copy_from_slice(&word.to_le_bytes());
        }

        image.seek(SeekFrom::Start(offset))?;
        image.write_all(&bytes)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.image.as_mut() {
            Some(image) => image.flush(),
            None => Ok(()),
        }
    }
}
