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

//! # Common Log Module
//!
//! This crate converts the JSON access logs written by [Caddy](https://caddyserver.com/) into the
//! [Common Log Format](https://en.wikipedia.org/wiki/Common_Log_Format) that can be processed
//! further by a variety of tools. A log entry like this one:
//!
//! ```json
//! {"level":"info","ts":1713985562.6151454,"request":{"client_ip":"120.77.35.242","proto":"HTTP/1.1","method":"GET","uri":"/wp-login.php"},"user_id":"","size":0,"status":308}
//! ```
//!
//! becomes:
//!
//! ```text
//! 120.77.35.242 - - 24/Apr/2024:19:06:02 +0000 "GET /wp-login.php HTTP/1.1" 308 0
//! ```
//!
//! The time is given in the local time zone. Lines that aren't JSON objects are ignored, JSON
//! objects missing some of the fields above are skipped with a warning.
//!
//! Input is read either from standard input or from the output of a command such as
//! `tail -F access.json`. An idle input is checked once per poll interval (one second by
//! default), so the process never spins while waiting for data.
//!
//! Output goes to standard output or is appended to a file. On Unix-based systems, the process
//! can be sent a `HUP` or `USR1` signal to make it re-open the output file. This is useful after
//! the logs have been rotated for example.
//!
//! The configuration can be loaded from a YAML file:
//!
//! ```yaml
//! output_file: /var/log/caddy/access.log
//! input_pipe: tail -F /var/log/caddy/access.json
//! client_address: client_ip
//! poll_interval_ms: 1000
//! ```
//!
//! The `output_file` and `input_pipe` fields are also available as `--output-file` and
//! `--input-pipe` command line options.
//!
//! ## Code example
//!
//! ```rust,no_run
//! use common_log_module::{open_output, stdin_input, Converter, RecordDecoder, RotationSignal};
//! use std::time::Duration;
//!
//! # async fn convert() -> Result<(), common_log_module::Error> {
//! let rotation = RotationSignal::new();
//! rotation.listen();
//!
//! let converter = Converter::new(RecordDecoder::default(), rotation, Duration::from_secs(1));
//! let mut output = open_output(Some("access.log".as_ref()));
//! let stats = converter.run(&mut stdin_input(), &mut *output).await?;
//! println!("Converted {} lines", stats.converted);
//! # Ok(())
//! # }
//! ```

pub mod configuration;
mod error;
pub mod formatter;
pub mod input;
pub mod record;
mod signal;
mod stream;
pub mod writer;

pub use configuration::{ClientAddressField, ConverterConf, ConverterOpt};
pub use error::{Error, MalformedRecord};
pub use formatter::{format_record, format_record_in};
pub use input::{stdin_input, InputSource, LineInput, ProcessInput, QueuedInput, ReadOutcome};
pub use record::{Decoded, LogRecord, RecordDecoder};
pub use signal::RotationSignal;
pub use stream::{ConversionStats, Converter};
pub use writer::{open_output, ConsoleOutput, FileOutput, OutputSink};
