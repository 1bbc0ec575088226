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

    devices::disclib::tests.rs

    Command-level tests for the disc controller, run through a host interface.
*/

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::{
    device_types::{
        chs::DiskChs,
        geometry::{DriveModel, HEADER_WORDS, WORDS_PER_SECTOR},
        timing::{DelayProps, TimingMode},
    },
    devices::disclib::{
        bus::{Functions, Target},
        command::Opcode,
        controller::{Controller, ControllerKind, ControllerState, FileMask},
        overrides::{DiagnosticOverrides, OverrideEntry, Syndrome},
        sector_io::{ICD_PAD_WORD, ICD_SYNC_WORD},
        status::{DriveStatus, Status, STATUS_2_ERROR_BIT, STATUS_2_TYPE_SHIFT},
        unit::{DiscUnit, Phase},
    },
    host::{DiscInterface, Transfer},
};

fn interface(kind: ControllerKind, model: DriveModel, count: usize) -> DiscInterface {
    let units = (0..count)
        .map(|_| {
            let mut unit = DiscUnit::new(model);
            unit.set_autosize(false);
            unit
        })
        .collect();
    let mut iface = DiscInterface::new(Controller::new(kind), units);
    for n in 0..count {
        iface.attach_image(n, Cursor::new(Vec::new())).unwrap();
    }

    if kind.is_mac() {
        // Service the Attention raised by each load.
        iface.set_interrupts(true);
        iface.run_until_idle();
        iface.set_interrupts(false);
        iface.take_interrupt();
    }
    // Clear First Status.
    for n in 0..count {
        iface.execute(Opcode::RequestStatus.word(n as u8), &[], 2);
    }
    iface
}

fn seek(iface: &mut DiscInterface, unit: u8, c: u16, h: u8, s: u8) -> Transfer {
    let hs = DiskChs::new(c, h, s).head_sector_word();
    let transfer = iface.execute(Opcode::Seek.word(unit), &[c, hs], 0);
    while iface.unit(unit as usize).unwrap().state().phase != Phase::Idle {
        if !iface.advance() {
            break;
        }
    }
    transfer
}

fn set_file_mask(iface: &mut DiscInterface, mask: FileMask, retries: u8) {
    let transfer = iface.execute(Opcode::file_mask_word(mask.bits(), retries), &[], 0);
    assert_eq!(transfer.status, Status::Normal);
}

fn request_status(iface: &mut DiscInterface, unit: u8) -> (u16, u16) {
    let transfer = iface.execute(Opcode::RequestStatus.word(unit), &[], 2);
    assert_eq!(transfer.words.len(), 2);
    (transfer.words[0], transfer.words[1])
}

fn pattern(seed: u16, len: usize) -> Vec<u16> {
    (0..len)
        .map(|i| (i as u16).wrapping_mul(0o1021).wrapping_add(seed))
        .collect()
}

#[test]
fn starting_a_command_makes_controller_busy() {
    for kind in [ControllerKind::Mac, ControllerKind::Icd] {
        let mut iface = interface(kind, DriveModel::Hp7920, 1);

        for opcode in [
            Opcode::Read,
            Opcode::ReadFullSector,
            Opcode::ReadWithoutVerify,
            Opcode::Write,
            Opcode::WriteFullSector,
            Opcode::Initialize,
        ] {
            iface.issue(opcode.word(0), &[], 0);
            assert_eq!(iface.controller().state(), ControllerState::Busy, "{}", opcode);
            assert_eq!(iface.unit(0).unwrap().state().opcode, opcode);
            assert!(iface.is_busy());
            iface.clear();
            assert_eq!(iface.controller().state(), ControllerState::Idle);
            assert_eq!(iface.unit(0).unwrap().state().phase, Phase::Idle);
        }

        for opcode in [Opcode::Seek, Opcode::Verify, Opcode::AddressRecord] {
            iface.issue(opcode.word(0), &[], 0);
            assert_eq!(iface.controller().state(), ControllerState::Busy, "{}", opcode);
            assert_eq!(iface.controller().get_debug_state().phase, Phase::Parameter);
            iface.clear();
        }
    }
}

#[test]
fn invalid_opcodes_report_illegal_opcode() {
    let mac_invalid = [Opcode::Wakeup.word(0), 0o20 << 8, 0o21 << 8, 0o27 << 8, 0o37 << 8];
    let icd_invalid = [
        Opcode::ReadWithOffset.word(0),
        Opcode::LoadTioRegister.word(0),
        0o20 << 8,
        0o21 << 8,
        0o30 << 8,
    ];

    for (kind, words) in [(ControllerKind::Mac, &mac_invalid), (ControllerKind::Icd, &icd_invalid)] {
        let mut iface = interface(kind, DriveModel::Hp7906, 1);
        for word in words.iter() {
            let transfer = iface.execute(*word, &[], 0);
            assert_eq!(transfer.status, Status::IllegalOpcode, "{:06o}", word);
            assert_eq!(iface.controller().state(), ControllerState::Wait);
            assert!(transfer.functions.contains(Functions::STINT | Functions::WRTIO | Functions::FREE));
            assert_eq!((transfer.tio >> 8) & 0x1F, Status::IllegalOpcode.code() as u16);
        }
    }
}

#[test]
fn write_then_read_a_full_cylinder() {
    for model in [
        DriveModel::Hp7905,
        DriveModel::Hp7906,
        DriveModel::Hp7920,
        DriveModel::Hp7925,
    ] {
        let mut iface = interface(ControllerKind::Icd, model, 1);
        let props = model.props();
        let sectors = props.head_group(0).len() * props.sectors as usize;
        let data = pattern(model as u16, sectors * WORDS_PER_SECTOR);

        assert_eq!(seek(&mut iface, 0, 5, 0, 0).status, Status::DriveAttention);
        set_file_mask(&mut iface, FileMask::CYLINDER_MODE, 0);

        let transfer = iface.execute(Opcode::Write.word(0), &data, 0);
        assert_eq!(transfer.status, Status::Normal, "{}", model);

        seek(&mut iface, 0, 5, 0, 0);
        let transfer = iface.execute(Opcode::Read.word(0), &[], data.len());
        assert_eq!(transfer.status, Status::Normal, "{}", model);
        assert!(transfer.words == data, "{} data mismatch", model);
    }
}

#[test]
fn partial_transfers_stop_at_eod() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    let data = pattern(3, WORDS_PER_SECTOR * 2);
    iface.execute(Opcode::Write.word(0), &data, 0);

    iface.execute(Opcode::AddressRecord.word(0), &[0, 0], 0);
    let transfer = iface.execute(Opcode::Read.word(0), &[], 10);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(transfer.words, data[..10]);
    // The partial sector still counts as transferred.
    assert_eq!(iface.controller().address(), DiskChs::new(0, 0, 1));
}

#[test]
fn write_with_no_data_writes_nothing() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    let transfer = iface.execute(Opcode::Write.word(0), &[], 0);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(iface.controller().address(), DiskChs::new(0, 0, 0));
}

#[test]
fn partial_sector_padding() {
    for (kind, pad) in [(ControllerKind::Mac, 3u16), (ControllerKind::Icd, ICD_PAD_WORD)] {
        let mut iface = interface(kind, DriveModel::Hp7905, 1);
        iface.execute(Opcode::Write.word(0), &[1, 2, 3], 0);
        iface.execute(Opcode::AddressRecord.word(0), &[0, 0], 0);

        let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
        assert_eq!(&transfer.words[..3], &[1, 2, 3]);
        assert!(transfer.words[3..].iter().all(|w| *w == pad), "{} padding", kind);
    }
}

#[test]
fn surface_mode_stops_at_end_of_track() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    seek(&mut iface, 0, 10, 2, 47);

    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR * 2);
    assert_eq!(transfer.status, Status::EndOfCylinder);
    assert_eq!(transfer.words.len(), WORDS_PER_SECTOR);
    assert!(transfer.functions.contains(Functions::DVEND | Functions::STINT));
}

#[test]
fn cylinder_mode_without_auto_seek_stops_at_end_of_cylinder() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7906, 1);
    seek(&mut iface, 0, 10, 1, 47);
    set_file_mask(&mut iface, FileMask::CYLINDER_MODE, 0);

    // Head 1 is the last head of the removable platter.
    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR * 2);
    assert_eq!(transfer.status, Status::EndOfCylinder);
    assert_eq!(transfer.words.len(), WORDS_PER_SECTOR);
    assert_eq!(iface.controller().address(), DiskChs::new(10, 0, 0));
}

#[test]
fn auto_seek_crosses_cylinders() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    let data = pattern(0o4000, WORDS_PER_SECTOR * 2);

    seek(&mut iface, 0, 10, 4, 47);
    set_file_mask(&mut iface, FileMask::CYLINDER_MODE | FileMask::AUTO_SEEK, 0);
    let transfer = iface.execute(Opcode::Write.word(0), &data, 0);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(iface.unit(0).unwrap().state().cylinder, 11);

    // Read the second sector back from where auto-seek put it.
    seek(&mut iface, 0, 11, 0, 0);
    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    assert_eq!(transfer.words, data[WORDS_PER_SECTOR..]);

    seek(&mut iface, 0, 10, 4, 47);
    set_file_mask(&mut iface, FileMask::CYLINDER_MODE | FileMask::AUTO_SEEK, 0);
    let transfer = iface.execute(Opcode::Read.word(0), &[], data.len());
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(transfer.words, data);
}

#[test]
fn auto_seek_past_first_cylinder() {
    let mask = FileMask::AUTO_SEEK | FileMask::DECREMENT;

    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    seek(&mut iface, 0, 0, 4, 47);
    set_file_mask(&mut iface, mask, 0);
    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR * 2);
    assert_eq!(transfer.status, Status::EndOfCylinder);

    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7920, 1);
    seek(&mut iface, 0, 0, 4, 47);
    set_file_mask(&mut iface, mask, 0);
    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR * 2);
    assert_eq!(transfer.status, Status::Status2Error);
    assert!(iface.unit(0).unwrap().drive_status().contains(DriveStatus::SEEK_CHECK));
}

#[test]
fn cylinder_miscompare_after_seeking_another_unit() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7920, 2);
    seek(&mut iface, 0, 20, 0, 0);
    seek(&mut iface, 1, 30, 0, 0);

    // The controller address now refers to unit 1's cylinder.
    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    assert_eq!(transfer.status, Status::CylinderMiscompare);
    assert!(transfer.words.is_empty());

    // Address Record skips verification.
    iface.execute(Opcode::AddressRecord.word(0), &[20, 0], 0);
    let transfer = iface.execute(Opcode::Read.word(0), &[], 1);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(transfer.words.len(), 1);
}

#[test]
fn seek_delay_follows_distance() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7920, 1);
    iface.controller_mut().set_timing(TimingMode::Real);

    let hs = DiskChs::new(100, 0, 0).head_sector_word();
    let transfer = iface.execute(Opcode::Seek.word(0), &[100, hs], 0);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(iface.controller().state(), ControllerState::Idle);

    let expected = DelayProps::real(DriveModel::Hp7920).seek_time(TimingMode::Real, 0, 100, 823);
    assert_eq!(expected, 5_000 + 100 * 40_000 / 823);
    assert_eq!(iface.scheduler().time_remaining(Target::Unit(0)), Some(expected as u64));
}

#[test]
fn first_status_after_attaching_empty_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.img");
    std::fs::File::create(&path).unwrap();

    let mut iface = DiscInterface::new(
        Controller::new(ControllerKind::Icd),
        vec![DiscUnit::new(DriveModel::Hp7905)],
    );
    iface.attach(0, &path).unwrap();
    assert_eq!(iface.unit(0).unwrap().model(), DriveModel::Hp7905);

    let (status_1, status_2) = request_status(&mut iface, 0);
    assert_eq!((status_1 >> 8) & 0x1F, Status::Normal.code() as u16);
    assert_ne!(status_2 & DriveStatus::FIRST_STATUS.bits(), 0);
    assert_eq!(status_2 & DriveStatus::NOT_READY.bits(), 0);
    assert_ne!(status_2 & STATUS_2_ERROR_BIT, 0);
    assert_eq!((status_2 >> STATUS_2_TYPE_SHIFT) & 0xF, 2);

    // Request Status clears First Status.
    let (_, status_2) = request_status(&mut iface, 0);
    assert_eq!(status_2 & DriveStatus::FIRST_STATUS.bits(), 0);
    assert_eq!(status_2 & STATUS_2_ERROR_BIT, 0);
}

#[test]
fn first_status_blocks_unit_checked_commands() {
    let mut iface = DiscInterface::new(
        Controller::new(ControllerKind::Icd),
        vec![DiscUnit::new(DriveModel::Hp7920)],
    );
    iface.attach_image(0, Cursor::new(Vec::new())).unwrap();

    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    assert_eq!(transfer.status, Status::Status2Error);
    assert!(transfer.words.is_empty());

    request_status(&mut iface, 0);
    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    assert_eq!(transfer.status, Status::Normal);
}

#[test]
fn concurrent_seek_sets_seek_check() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7920, 1);
    iface.controller_mut().set_timing(TimingMode::Real);

    let hs = DiskChs::new(100, 0, 0).head_sector_word();
    iface.execute(Opcode::Seek.word(0), &[100, hs], 0);
    let first = iface.scheduler().time_remaining(Target::Unit(0));

    let hs = DiskChs::new(200, 0, 0).head_sector_word();
    let transfer = iface.execute(Opcode::Seek.word(0), &[200, hs], 0);
    assert_eq!(transfer.status, Status::Normal);
    assert!(iface.unit(0).unwrap().drive_status().contains(DriveStatus::SEEK_CHECK));
    assert_eq!(iface.scheduler().time_remaining(Target::Unit(0)), first);

    // The original seek still completes and raises Attention.
    iface.set_interrupts(true);
    while iface.unit(0).unwrap().state().phase != Phase::Idle {
        assert!(iface.advance());
    }
    assert!(iface.take_interrupt());
    assert_eq!(iface.controller().status(), Status::DriveAttention);
    assert_eq!(iface.controller().unit(), 0);
    assert_eq!(iface.unit(0).unwrap().state().cylinder, 100);

    let (status_1, status_2) = request_status(&mut iface, 0);
    assert_eq!((status_1 >> 8) & 0x1F, Status::DriveAttention.code() as u16);
    assert_ne!(status_2 & DriveStatus::SEEK_CHECK.bits(), 0);
    assert_ne!(status_2 & STATUS_2_ERROR_BIT, 0);
}

#[test]
fn mac_polls_each_unit_for_attention() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7906, 3);
    seek(&mut iface, 2, 5, 0, 0);
    seek(&mut iface, 0, 6, 0, 0);

    iface.set_interrupts(true);
    assert!(iface.take_interrupt());
    assert_eq!(iface.controller().unit(), 0);
    assert_eq!(iface.controller().state(), ControllerState::Wait);

    // The wait timer returns the controller to Idle, where it polls again.
    iface.run_until_idle();
    assert!(iface.take_interrupt());
    assert_eq!(iface.controller().unit(), 2);
    assert_eq!(iface.controller().state(), ControllerState::Idle);
    assert!(iface
        .units()
        .iter()
        .all(|u| !u.drive_status().contains(DriveStatus::ATTENTION)));
}

#[test]
fn icd_seek_waits_for_completion() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7925, 1);
    let transfer = seek(&mut iface, 0, 500, 8, 63);
    assert_eq!(transfer.status, Status::DriveAttention);
    assert!(transfer.functions.contains(Functions::STINT | Functions::FREE));
    assert!(!transfer.functions.contains(Functions::WRTIO));
    assert_eq!(iface.unit(0).unwrap().state().cylinder, 500);

    let transfer = iface.execute(Opcode::RequestDiscAddress.word(0), &[], 2);
    assert_eq!(transfer.words, vec![500, (8 << 8) | 63]);
}

#[test]
fn unavailable_units() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7920, 2);
    for unit in [2u8, 7, 8, 10, 11, 15] {
        let transfer = iface.execute(Opcode::Read.word(unit), &[], WORDS_PER_SECTOR);
        assert_eq!(transfer.status, Status::UnitUnavailable, "unit {}", unit);
        assert_eq!(transfer.tio & 0xF, unit as u16);
    }
}

#[test]
fn diagnostic_override_consumed_once() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    let syndrome = Syndrome {
        displacement: 5,
        patterns: [0o1, 0o2, 0o3],
    };
    iface
        .controller_mut()
        .set_overrides(DiagnosticOverrides::new(vec![OverrideEntry {
            address: DiskChs::new(0, 0, 0),
            opcode: Opcode::Read,
            spd: 0b010,
            status: Status::CorrectableDataError,
            syndrome: Some(syndrome),
        }]));

    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR * 2);
    assert_eq!(transfer.status, Status::CorrectableDataError);
    // The forced status ends the command after the first sector.
    assert_eq!(transfer.words.len(), WORDS_PER_SECTOR);
    assert_eq!(transfer.tio >> 13, 0b010);

    let transfer = iface.execute(Opcode::RequestSyndrome.word(0), &[], 7);
    assert_eq!(transfer.words.len(), 7);
    assert_eq!((transfer.words[0] >> 8) & 0x1F, Status::CorrectableDataError.code() as u16);
    assert_eq!(transfer.words[1], 0);
    assert_eq!(transfer.words[2], 1);
    assert_eq!(&transfer.words[3..], &[5, 0o1, 0o2, 0o3]);

    iface.execute(Opcode::AddressRecord.word(0), &[0, 0], 0);
    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR * 2);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(transfer.words.len(), WORDS_PER_SECTOR * 2);
    assert_eq!(iface.controller().overrides().remaining(), 0);
}

#[test]
fn parameter_timeout_clears_controller() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7920, 1);
    set_file_mask(&mut iface, FileMask::AUTO_SEEK, 0);

    let transfer = iface.execute(Opcode::Seek.word(0), &[100], 0);
    assert_eq!(iface.controller().state(), ControllerState::Idle);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(iface.controller().file_mask(), FileMask::empty());
    assert!(iface.scheduler().is_empty());
}

#[test]
fn command_wait_expires_to_idle() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    set_file_mask(&mut iface, FileMask::CYLINDER_MODE, 3);
    assert_eq!(iface.controller().state(), ControllerState::Wait);

    iface.run_until_idle();
    assert_eq!(iface.controller().state(), ControllerState::Idle);
    assert_eq!(iface.controller().file_mask(), FileMask::empty());
}

#[test]
fn clear_leaves_background_seeks_running() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7920, 2);
    iface.controller_mut().set_timing(TimingMode::Real);

    let hs = DiskChs::new(300, 0, 0).head_sector_word();
    iface.execute(Opcode::Seek.word(1), &[300, hs], 0);
    iface.issue(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    assert!(iface.scheduler().is_scheduled(Target::Unit(0)));

    iface.clear();
    assert_eq!(iface.controller().state(), ControllerState::Idle);
    assert!(!iface.scheduler().is_scheduled(Target::Unit(0)));
    assert!(iface.scheduler().is_scheduled(Target::Unit(1)));
    assert_eq!(iface.unit(1).unwrap().state().phase, Phase::Seek);

    iface.run_until_idle();
    assert_eq!(iface.unit(1).unwrap().state().cylinder, 300);
    assert!(iface.unit(1).unwrap().drive_status().contains(DriveStatus::ATTENTION));
}

#[test]
fn protected_drives_reject_writes() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    iface.unit_mut(0).unwrap().set_read_only(true);
    let transfer = iface.execute(Opcode::Write.word(0), &pattern(0, 4), 0);
    assert_eq!(transfer.status, Status::Status2Error);
    iface.unit_mut(0).unwrap().set_read_only(false);

    let transfer = iface.execute(Opcode::initialize_word(0, 0), &pattern(0, 4), 0);
    assert_eq!(transfer.status, Status::ProtectedTrack);

    iface.unit_mut(0).unwrap().set_format_enabled(true);
    let transfer = iface.execute(Opcode::initialize_word(0b100, 0), &pattern(0, 4), 0);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(iface.controller().get_debug_state().spd, 0b100);
}

#[test]
fn unload_during_read_ends_command() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    iface.issue(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    iface.load_unload(0, false).unwrap();
    iface.run_command();

    assert_eq!(iface.controller().status(), Status::AccessNotReady);
    assert_eq!(iface.unit(0).unwrap().state().phase, Phase::Idle);
    assert!(iface.unit(0).unwrap().drive_status().contains(DriveStatus::NOT_READY));
}

struct FailingStore;

impl Read for FailingStore {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "media failure"))
    }
}

impl Write for FailingStore {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "media failure"))
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FailingStore {
    fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
        Ok(0)
    }
}

#[test]
fn host_io_errors_are_uncorrectable() {
    let mut iface = DiscInterface::new(
        Controller::new(ControllerKind::Icd),
        vec![DiscUnit::new(DriveModel::Hp7920)],
    );
    iface.attach_image(0, FailingStore).unwrap();
    request_status(&mut iface, 0);

    let transfer = iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    assert_eq!(transfer.status, Status::UncorrectableDataError);
    assert!(transfer.words.is_empty());

    let transfer = iface.execute(Opcode::Write.word(0), &pattern(1, WORDS_PER_SECTOR), 0);
    assert_eq!(transfer.status, Status::UncorrectableDataError);
}

#[test]
fn retries_are_offered_before_interrupting() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    set_file_mask(&mut iface, FileMask::empty(), 1);

    iface.issue(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    iface.abort_transfer(true);
    assert_eq!(iface.controller().status(), Status::DataOverrun);
    assert!(iface.functions().contains(Functions::SRTRY | Functions::DVEND));
    assert!(!iface.take_interrupt());

    iface.issue(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    iface.abort_transfer(false);
    assert_eq!(iface.controller().status(), Status::IoProgramError);
    assert!(iface.take_interrupt());

    iface.issue(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    iface.abort_transfer(true);
    assert!(!iface.functions().contains(Functions::SRTRY));
    assert!(iface.take_interrupt());
}

#[test]
fn full_sector_transfers_carry_header() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    let data = pattern(7, WORDS_PER_SECTOR);

    seek(&mut iface, 0, 3, 1, 7);
    let mut full = vec![0o177777, 3, (1 << 8) | 7];
    full.extend_from_slice(&data);
    let transfer = iface.execute(Opcode::WriteFullSector.word(0), &full, 0);
    assert_eq!(transfer.status, Status::Normal);

    seek(&mut iface, 0, 3, 1, 7);
    let transfer = iface.execute(Opcode::ReadFullSector.word(0), &[], HEADER_WORDS + WORDS_PER_SECTOR);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(&transfer.words[..HEADER_WORDS], &[ICD_SYNC_WORD, 3, (1 << 8) | 7]);
    assert_eq!(transfer.words[HEADER_WORDS..], data[..]);

    let transfer = iface.execute(Opcode::RequestSectorAddress.word(0), &[], 1);
    assert_eq!(transfer.words, vec![7]);
}

#[test]
fn verify_advances_address() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7905, 1);
    seek(&mut iface, 0, 2, 0, 0);
    let transfer = iface.execute(Opcode::Verify.word(0), &[3], 0);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(iface.controller().address(), DiskChs::new(2, 0, 3));
}

#[test]
fn cold_load_reads_from_cylinder_zero() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7906, 1);
    let data = pattern(0o777, WORDS_PER_SECTOR);

    seek(&mut iface, 0, 0, 1, 5);
    iface.execute(Opcode::Write.word(0), &data, 0);
    seek(&mut iface, 0, 40, 0, 0);

    let transfer = iface.execute(Opcode::cold_load_word(1, 5), &[], WORDS_PER_SECTOR);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(transfer.words, data);
    assert_eq!(iface.unit(0).unwrap().state().cylinder, 0);
}

#[test]
fn load_tio_register_and_end() {
    let mut iface = interface(ControllerKind::Mac, DriveModel::Hp7920, 1);
    let transfer = iface.execute(Opcode::LoadTioRegister.word(0), &[0o123456], 0);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(transfer.tio, 0o123456);
    assert_eq!(iface.controller().state(), ControllerState::Wait);

    let transfer = iface.execute(Opcode::End.word(0), &[], 0);
    assert_eq!(transfer.status, Status::Normal);
    assert_eq!(iface.controller().state(), ControllerState::Idle);
}

#[test]
fn request_status_preserves_status() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    iface.execute(Opcode::AddressRecord.word(0), &[12, 0], 0);
    iface.execute(0o20 << 8, &[], 0);

    let (status_1, _) = request_status(&mut iface, 0);
    assert_eq!((status_1 >> 8) & 0x1F, Status::IllegalOpcode.code() as u16);
    assert_eq!(iface.controller().status(), Status::IllegalOpcode);

    // Clear resets controller status but not the address.
    iface.execute(Opcode::Clear.word(0), &[], 0);
    let (status_1, _) = request_status(&mut iface, 0);
    assert_eq!((status_1 >> 8) & 0x1F, Status::Normal.code() as u16);
    assert_eq!(iface.controller().address().c(), 12);
}

#[test]
fn debug_state_records_commands() {
    let mut iface = interface(ControllerKind::Icd, DriveModel::Hp7920, 1);
    iface.execute(Opcode::Read.word(0), &[], WORDS_PER_SECTOR);
    let state = iface.controller().get_debug_state();
    assert_eq!(state.opcode, Opcode::Read);
    assert_eq!(state.words, WORDS_PER_SECTOR as u32);
    assert!(state.cmd_log.iter().any(|s| s.starts_with("Read complete")));
}
