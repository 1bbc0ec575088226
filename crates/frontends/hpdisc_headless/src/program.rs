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

    program.rs

    Runs a host program from the configuration file against a disc interface.
*/

use anyhow::{Context, Result};
use colored::Colorize;

use hp_disclib::{
    device_types::chs::DiskChs,
    devices::disclib::{FileMask, Opcode, Status},
    host::{DiscInterface, Transfer},
};
use hpdisc_config::ProgramOp;

/// Words of each transfer echoed to the console.
const ECHO_WORDS: usize = 8;

/// Build the outbound data for a write: `data` first, then `fill` up to `words` in total.
pub fn outbound_words(data: &[u16], fill: u16, words: usize) -> Vec<u16> {
    let mut out = data.to_vec();
    if out.len() < words {
        out.resize(words, fill);
    }
    out
}

fn address_words(cylinder: u16, head: u8, sector: u8) -> [u16; 2] {
    [cylinder, DiskChs::new(cylinder, head, sector).head_sector_word()]
}

/// Execute one program step. Steps that issue a controller command return the
/// completed transfer.
pub fn run_op(iface: &mut DiscInterface, op: &ProgramOp) -> Result<Option<Transfer>> {
    let transfer = match op {
        ProgramOp::Command { word, outbound, inbound } => iface.execute(*word, outbound, *inbound),
        ProgramOp::RequestStatus { unit } => iface.execute(Opcode::RequestStatus.word(*unit), &[], 2),
        ProgramOp::RequestSectorAddress { unit } => iface.execute(Opcode::RequestSectorAddress.word(*unit), &[], 1),
        ProgramOp::RequestSyndrome => iface.execute(Opcode::RequestSyndrome.word(0), &[], 7),
        ProgramOp::RequestDiscAddress => iface.execute(Opcode::RequestDiscAddress.word(0), &[], 2),
        ProgramOp::Seek {
            unit,
            cylinder,
            head,
            sector,
        } => iface.execute(Opcode::Seek.word(*unit), &address_words(*cylinder, *head, *sector), 0),
        ProgramOp::Recalibrate { unit } => iface.execute(Opcode::Recalibrate.word(*unit), &[], 0),
        ProgramOp::AddressRecord { cylinder, head, sector } => {
            iface.execute(Opcode::AddressRecord.word(0), &address_words(*cylinder, *head, *sector), 0)
        }
        ProgramOp::SetFileMask {
            cylinder_mode,
            auto_seek,
            decrement,
            retries,
        } => {
            let mut mask = FileMask::empty();
            mask.set(FileMask::CYLINDER_MODE, *cylinder_mode);
            mask.set(FileMask::AUTO_SEEK, *auto_seek);
            mask.set(FileMask::DECREMENT, *decrement);
            iface.execute(Opcode::file_mask_word(mask.bits(), *retries), &[], 0)
        }
        ProgramOp::Read {
            unit,
            words,
            full_sector,
            no_verify,
        } => {
            let opcode = match (*full_sector, *no_verify) {
                (true, _) => Opcode::ReadFullSector,
                (false, true) => Opcode::ReadWithoutVerify,
                (false, false) => Opcode::Read,
            };
            iface.execute(opcode.word(*unit), &[], *words)
        }
        ProgramOp::Write {
            unit,
            data,
            fill,
            words,
            full_sector,
        } => {
            let opcode = if *full_sector {
                Opcode::WriteFullSector
            }
            else {
                Opcode::Write
            };
            iface.execute(opcode.word(*unit), &outbound_words(data, *fill, *words), 0)
        }
        ProgramOp::Initialize { unit, spd, fill, words } => iface.execute(
            Opcode::initialize_word(*spd, *unit),
            &outbound_words(&[], *fill, *words),
            0,
        ),
        ProgramOp::Verify { unit, sectors } => iface.execute(Opcode::Verify.word(*unit), &[*sectors], 0),
        ProgramOp::ColdLoad { head, sector, words } => {
            iface.execute(Opcode::cold_load_word(*head, *sector), &[], *words)
        }
        ProgramOp::LoadTio { value } => iface.execute(Opcode::LoadTioRegister.word(0), &[*value], 0),
        ProgramOp::Clear => iface.execute(Opcode::Clear.word(0), &[], 0),
        ProgramOp::End => iface.execute(Opcode::End.word(0), &[], 0),
        ProgramOp::Wakeup => iface.execute(Opcode::Wakeup.word(0), &[], 0),
        ProgramOp::Load { unit } => {
            iface
                .load_unload(*unit, true)
                .with_context(|| format!("loading heads on unit {}", unit))?;
            return Ok(None);
        }
        ProgramOp::Unload { unit } => {
            iface
                .load_unload(*unit, false)
                .with_context(|| format!("unloading heads on unit {}", unit))?;
            return Ok(None);
        }
        ProgramOp::Reset => {
            iface.clear();
            return Ok(None);
        }
        ProgramOp::Interrupts { enabled } => {
            iface.set_interrupts(*enabled);
            return Ok(None);
        }
        ProgramOp::Run => {
            iface.run_until_idle();
            return Ok(None);
        }
    };
    Ok(Some(transfer))
}

fn status_text(status: Status) -> colored::ColoredString {
    match status {
        Status::Normal => status.to_string().green(),
        Status::DriveAttention | Status::EndOfCylinder => status.to_string().yellow(),
        _ => status.to_string().red(),
    }
}

fn report(step: usize, op: &ProgramOp, transfer: &Transfer) {
    println!("{:>3}: {:?}", step, op);
    println!(
        "     status: {} tio: {:06o} functions: {:?}",
        status_text(transfer.status),
        transfer.tio,
        transfer.functions
    );
    if !transfer.words.is_empty() {
        let shown: Vec<String> = transfer
            .words
            .iter()
            .take(ECHO_WORDS)
            .map(|w| format!("{:06o}", w))
            .collect();
        let more = if transfer.words.len() > ECHO_WORDS { " ..." } else { "" };
        println!("     {} word(s): {}{}", transfer.words.len(), shown.join(" "), more);
    }
}

/// Run every step of `program`, echoing results to the console.
pub fn run_program(iface: &mut DiscInterface, program: &[ProgramOp], trace: bool) -> Result<()> {
    for (step, op) in program.iter().enumerate() {
        log::debug!("Program step {}: {:?}", step, op);

        match run_op(iface, op).with_context(|| format!("program step {}", step))? {
            Some(transfer) => report(step, op, &transfer),
            None => println!("{:>3}: {:?}", step, op),
        }
        if iface.take_interrupt() {
            println!("     {}", "interrupt".cyan());
        }

        if trace {
            let state = iface.controller().get_debug_state();
            println!(
                "     {}",
                format!(
                    "state: {} unit: {} address: {} mask: {:?} retries: {} t={}us",
                    state.state,
                    state.unit,
                    state.address,
                    state.file_mask,
                    state.retries,
                    iface.scheduler().now()
                )
                .dimmed()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_words_fill() {
        assert_eq!(outbound_words(&[1, 2], 7, 4), vec![1, 2, 7, 7]);
        assert_eq!(outbound_words(&[1, 2, 3], 7, 2), vec![1, 2, 3]);
        assert!(outbound_words(&[], 0, 0).is_empty());
    }

    #[test]
    fn address_words_pack_head_and_sector() {
        assert_eq!(address_words(100, 2, 17), [100, (2 << 8) | 17]);
    }
}
