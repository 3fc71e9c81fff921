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

//! Error types of the conversion pipeline

use std::io;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Fatal errors, any of these terminates the conversion
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration file could not be opened or parsed
    #[error("failed loading configuration file {}: {source}", .path.display())]
    Config {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying parsing or I/O error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Input command could not be started
    #[error("failed spawning input command `{command}`: {source}")]
    Spawn {
        /// The command line as given
        command: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
    /// Reading from the input failed
    #[error("failed reading from {input}: {source}")]
    Read {
        /// Description of the input, e.g. `standard input`
        input: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
    /// Output file could not be opened
    #[error("failed opening output file {}: {source}", .path.display())]
    Open {
        /// Path of the output file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
    /// Writing a converted line failed
    #[error("failed writing to {destination}: {source}")]
    Write {
        /// Description of the destination, e.g. `standard output`
        destination: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// A line parsed as a JSON object but lacks fields required for conversion
#[derive(Debug, ThisError)]
#[error("malformed log record: {0}")]
pub struct MalformedRecord(#[from] pub serde_json::Error);

impl MalformedRecord {
    pub(crate) fn non_finite_timestamp() -> Self {
        use serde::de::Error as _;
        Self(serde_json::Error::custom("field `ts` is not a finite number"))
    }
}
