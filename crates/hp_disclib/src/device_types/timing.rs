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

    device_types::timing.rs

    Defines the delays used when scheduling drive and controller events.
*/

use serde_derive::Deserialize;
use strum_macros::{Display, EnumString};

use crate::device_types::geometry::DriveModel;

/// Delays are expressed in microseconds of simulated time.
pub type DelayUs = u32;

/// How long the controller waits in the Wait state for the next command,
/// and in the parameter phase for the next word, before timing out.
pub const COMMAND_WAIT_TIME: DelayUs = 1_740_000;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimingMode {
    #[default]
    Fast,
    Real,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DelayProps {
    /// Seek across a single cylinder.
    pub seek_one: DelayUs,
    /// Seek across the full stroke of the positioner.
    pub seek_full: DelayUs,
    /// Time for one sector to pass under the heads.
    pub sector_full: DelayUs,
    /// Time to transfer one word.
    pub data_xfer: DelayUs,
    pub intersector_gap: DelayUs,
    /// Controller processing overhead between phases.
    pub overhead: DelayUs,
}

impl Default for DelayProps {
    fn default() -> Self {
        Self {
            seek_one: 20,
            seek_full: 200,
            sector_full: 40,
            data_xfer: 1,
            intersector_gap: 4,
            overhead: 5,
        }
    }
}

// 48 sectors per track at 3600 RPM
const REAL_TIMES_48: DelayProps = DelayProps {
    seek_one: 5_000,
    seek_full: 45_000,
    sector_full: 347,
    data_xfer: 2,
    intersector_gap: 71,
    overhead: 25,
};

// 64 sectors per track at 3600 RPM
const REAL_TIMES_64: DelayProps = DelayProps {
    seek_one: 5_000,
    seek_full: 40_000,
    sector_full: 260,
    data_xfer: 1,
    intersector_gap: 122,
    overhead: 25,
};

impl DelayProps {
    /// Return the real-time delays for a drive model.
    pub fn real(model: DriveModel) -> DelayProps {
        match model {
            DriveModel::Hp7925 => REAL_TIMES_64,
            _ => REAL_TIMES_48,
        }
    }

    /// Return the time taken to seek from cylinder `from` to cylinder `to`.
    /// Real timing scales linearly with the distance travelled; fast timing
    /// uses a single fixed delay.
    pub fn seek_time(&self, mode: TimingMode, from: u16, to: u16, cylinders: u16) -> DelayUs {
        match mode {
            TimingMode::Fast => self.seek_one,
            TimingMode::Real => {
                let distance = from.abs_diff(to) as u64;
                let span = self.seek_full.saturating_sub(self.seek_one) as u64;
                self.seek_one + (distance * span / cylinders.max(1) as u64) as DelayUs
            }
        }
    }

    /// Return the delay before the next sector after a data phase ended with
    /// `remaining` words still untransferred.
    pub fn intersector_time(&self, mode: TimingMode, remaining: usize) -> DelayUs {
        match mode {
            TimingMode::Fast => self.intersector_gap,
            TimingMode::Real => self.intersector_gap + remaining as DelayUs * self.data_xfer,
        }
    }
}
