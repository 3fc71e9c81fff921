// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The conversion loop connecting input, decoder, formatter and output

use log::{info, warn};
use std::time::Duration;

use crate::error::Error;
use crate::formatter::format_record;
use crate::input::{InputSource, ReadOutcome};
use crate::record::{Decoded, RecordDecoder};
use crate::signal::RotationSignal;
use crate::writer::OutputSink;

/// Counters collected during a conversion run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConversionStats {
    /// Lines received from the input
    pub lines_read: u64,
    /// Lines written to the output
    pub converted: u64,
    /// Lines that weren't JSON objects
    pub skipped: u64,
    /// JSON objects lacking required fields
    pub malformed: u64,
    /// Number of times the output has been reopened
    pub rotations: u64,
    /// Number of times the input had no data
    pub idle_polls: u64,
}

/// Converts log lines until the input ends
#[derive(Debug)]
pub struct Converter {
    decoder: RecordDecoder,
    rotation: RotationSignal,
    poll_interval: Duration,
}

impl Converter {
    /// Creates a converter. Rotation requests on `rotation` are honored before the next line is
    /// written, an idle input is checked again after `poll_interval`.
    pub fn new(decoder: RecordDecoder, rotation: RotationSignal, poll_interval: Duration) -> Self {
        Self {
            decoder,
            rotation,
            poll_interval,
        }
    }

    fn check_rotation(
        &self,
        output: &mut (impl OutputSink + ?Sized),
        stats: &mut ConversionStats,
    ) -> Result<(), Error> {
        if self.rotation.take() {
            info!("Rotation requested, reopening output");
            output.rotate()?;
            stats.rotations += 1;
        }
        Ok(())
    }

    /// Runs the conversion loop. Returns once the input reaches its end, the output is closed
    /// then. Any error returned is fatal.
    pub async fn run(
        &self,
        input: &mut (impl InputSource + ?Sized),
        output: &mut (impl OutputSink + ?Sized),
    ) -> Result<ConversionStats, Error> {
        let mut stats = ConversionStats::default();

        loop {
            let line = match input.poll_line().await? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Pending => {
                    stats.idle_polls += 1;
                    self.check_rotation(&mut *output, &mut stats)?;
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                ReadOutcome::EndOfStream => break,
            };
            stats.lines_read += 1;

            let record = match self.decoder.decode(&line) {
                Ok(Decoded::Record(record)) => record,
                Ok(Decoded::Skip) => {
                    stats.skipped += 1;
                    continue;
                }
                Err(err) => {
                    warn!("Skipping line: {err}");
                    stats.malformed += 1;
                    continue;
                }
            };

            self.check_rotation(&mut *output, &mut stats)?;
            output.write_line(&format_record(&record))?;
            stats.converted += 1;
        }

        output.close()?;
        Ok(stats)
    }
}
