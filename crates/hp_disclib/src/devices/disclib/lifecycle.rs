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

    devices::disclib::lifecycle.rs

    Attaching, detaching, loading and unloading drive units.
*/

use std::{
    fs::OpenOptions,
    io::{Seek, SeekFrom},
    path::Path,
};

use crate::{
    device_types::geometry::DriveModel,
    devices::disclib::{
        controller::{Controller, ControllerState},
        status::{DriveStatus, Status},
        unit::{DiscUnit, ImageStore, Phase},
    },
    error::DiscError,
};

/// Whether a lifecycle change finished, or needs a controller step to be
/// noticed. The MAC controller learns of a load or unload only by polling
/// for Attention, and an unload during a command ends that command through
/// a unit event.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Complete,
    Incomplete,
}

impl Controller {
    /// Attach an image file to `unit`, creating it if it does not exist, and load the heads.
    pub fn attach(&self, unit: &mut DiscUnit, path: impl AsRef<Path>) -> Result<Lifecycle, DiscError> {
        if unit.is_attached() {
            return Err(DiscError::AlreadyAttached);
        }
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        log::debug!("Attaching image {}", path.display());
        self.attach_store(unit, Box::new(file), Some(path.to_path_buf()))
    }

    /// Attach any seekable store to `unit` and load the heads.
    pub fn attach_image<S: ImageStore + 'static>(&self, unit: &mut DiscUnit, image: S) -> Result<Lifecycle, DiscError> {
        if unit.is_attached() {
            return Err(DiscError::AlreadyAttached);
        }
        self.attach_store(unit, Box::new(image), None)
    }

    fn attach_store(
        &self,
        unit: &mut DiscUnit,
        mut image: Box<dyn ImageStore>,
        path: Option<std::path::PathBuf>,
    ) -> Result<Lifecycle, DiscError> {
        let len = image.seek(SeekFrom::End(0))?;

        // An empty image keeps the configured model.
        if unit.autosize() && len > 0 {
            let model = DriveModel::from_image_len(len).ok_or(DiscError::ImageTooLarge { len })?;
            unit.set_model_from_image(model);
        }
        else if len > unit.model().capacity() {
            log::warn!(
                "Image of {} bytes exceeds the capacity of a {}; excess is ignored",
                len,
                unit.model()
            );
        }

        unit.set_image(image, path);
        self.load_unload(unit, true)
    }

    /// Unload the heads and detach the image.
    pub fn detach(&self, unit: &mut DiscUnit) -> Result<Lifecycle, DiscError> {
        if !unit.is_attached() {
            return Err(DiscError::NotAttached);
        }
        let result = self.load_unload(unit, false)?;
        unit.flush()?;
        unit.take_image();
        Ok(result)
    }

    /// Load or unload the heads of `unit`. Repeating the current state has no effect.
    pub fn load_unload(&self, unit: &mut DiscUnit, load: bool) -> Result<Lifecycle, DiscError> {
        if !unit.is_attached() {
            return Err(DiscError::NotAttached);
        }
        if unit.is_loaded() == load {
            return Ok(Lifecycle::Complete);
        }

        unit.set_heads_loaded(load);
        if load {
            log::debug!("Heads loaded on {} drive", unit.model());
            unit.state.cylinder = 0;
            unit.state.status.insert(DriveStatus::FIRST_STATUS);
        }
        else {
            log::debug!("Heads unloaded on {} drive", unit.model());
            if unit.state.phase != Phase::Idle {
                unit.state.end_status = Status::AccessNotReady;
                unit.state.phase = Phase::End;
                unit.schedule(0);
            }
        }

        if self.kind().is_mac() {
            unit.state.status.insert(DriveStatus::ATTENTION);
        }

        if unit.state.pending_delay.is_some() || (self.kind().is_mac() && self.state() == ControllerState::Idle) {
            Ok(Lifecycle::Incomplete)
        }
        else {
            Ok(Lifecycle::Complete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::disclib::controller::ControllerKind;
    use std::io::{Cursor, Write};

    #[test]
    fn load_is_idempotent() {
        let controller = Controller::new(ControllerKind::Icd);
        let mut unit = DiscUnit::new(DriveModel::Hp7920);
        assert_eq!(
            controller.attach_image(&mut unit, Cursor::new(Vec::new())).unwrap(),
            Lifecycle::Complete
        );
        let status = unit.drive_status();
        assert!(status.contains(DriveStatus::FIRST_STATUS));

        assert_eq!(controller.load_unload(&mut unit, true).unwrap(), Lifecycle::Complete);
        assert_eq!(unit.drive_status(), status);
        assert!(unit.is_ready());
    }

    #[test]
    fn mac_load_needs_poll() {
        let controller = Controller::new(ControllerKind::Mac);
        let mut unit = DiscUnit::new(DriveModel::Hp7920);
        assert_eq!(
            controller.attach_image(&mut unit, Cursor::new(Vec::new())).unwrap(),
            Lifecycle::Incomplete
        );
        assert!(unit.drive_status().contains(DriveStatus::ATTENTION));
    }

    #[test]
    fn empty_image_keeps_model() {
        let controller = Controller::new(ControllerKind::Icd);
        let mut unit = DiscUnit::new(DriveModel::Hp7925);
        controller.attach_image(&mut unit, Cursor::new(Vec::new())).unwrap();
        assert_eq!(unit.model(), DriveModel::Hp7925);
    }

    #[test]
    fn autosize_from_image_length() {
        let controller = Controller::new(ControllerKind::Icd);
        let mut unit = DiscUnit::new(DriveModel::Hp7925);
        let len = DriveModel::Hp7905.capacity() + 256;
        controller.attach_image(&mut unit, Cursor::new(vec![0u8; len as usize])).unwrap();
        assert_eq!(unit.model(), DriveModel::Hp7906);
    }

    #[test]
    fn oversize_image_is_rejected() {
        let controller = Controller::new(ControllerKind::Icd);
        let mut unit = DiscUnit::new(DriveModel::Hp7905);
        let len = DriveModel::Hp7925.capacity() + 2;

        // Reports a length without backing storage.
        struct FakeLen(u64);
        impl std::io::Read for FakeLen {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Ok(0)
            }
        }
        impl Write for FakeLen {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        impl Seek for FakeLen {
            fn seek(&mut self, _: SeekFrom) -> std::io::Result<u64> {
                Ok(self.0)
            }
        }

        match controller.attach_image(&mut unit, FakeLen(len)) {
            Err(DiscError::ImageTooLarge { len: reported }) => assert_eq!(reported, len),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!unit.is_attached());
    }

    #[test]
    fn detach_requires_image() {
        let controller = Controller::new(ControllerKind::Mac);
        let mut unit = DiscUnit::new(DriveModel::Hp7920);
        assert!(matches!(controller.detach(&mut unit), Err(DiscError::NotAttached)));
        assert!(matches!(
            controller.load_unload(&mut unit, true),
            Err(DiscError::NotAttached)
        ));
    }

    #[test]
    fn attach_file_creates_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disc.img");
        let controller = Controller::new(ControllerKind::Icd);
        let mut unit = DiscUnit::new(DriveModel::Hp7905);

        controller.attach(&mut unit, &path).unwrap();
        assert!(path.exists());
        assert_eq!(unit.path(), Some(path.as_path()));
        assert!(matches!(
            controller.attach(&mut unit, &path),
            Err(DiscError::AlreadyAttached)
        ));

        assert_eq!(controller.detach(&mut unit).unwrap(), Lifecycle::Complete);
        assert!(!unit.is_attached());
        assert!(unit.drive_status().contains(DriveStatus::NOT_READY));
    }
}
