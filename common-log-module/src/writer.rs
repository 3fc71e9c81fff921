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

//! Destinations for converted log lines

use log::debug;
use std::fs::File;
use std::io::{stdout, Stdout, Write};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// A destination that converted lines are appended to
pub trait OutputSink {
    /// Appends a line, a newline is added automatically.
    fn write_line(&mut self, line: &str) -> Result<(), Error>;

    /// Releases the current destination, the next write will open it again.
    fn rotate(&mut self) -> Result<(), Error>;

    /// Flushes and releases the destination at the end of the input.
    fn close(&mut self) -> Result<(), Error> {
        self.rotate()
    }
}

/// Writes lines to standard output or another stream that can't be reopened
#[derive(Debug)]
pub struct ConsoleOutput<W: Write = Stdout> {
    writer: W,
}

impl ConsoleOutput {
    /// Creates a sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(stdout())
    }
}

impl<W: Write> ConsoleOutput<W> {
    /// Creates a sink writing to the given stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_error(err: std::io::Error) -> Error {
        Error::Write {
            destination: "standard output".to_owned(),
            source: err,
        }
    }
}

impl<W: Write> OutputSink for ConsoleOutput<W> {
    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        writeln!(self.writer, "{line}").map_err(Self::write_error)?;
        self.writer.flush().map_err(Self::write_error)
    }

    fn rotate(&mut self) -> Result<(), Error> {
        // Nothing to reopen
        self.writer.flush().map_err(Self::write_error)
    }
}

/// Appends lines to a file that is reopened after rotation
#[derive(Debug)]
pub struct FileOutput {
    path: PathBuf,
    file: Option<File>,
}

impl FileOutput {
    /// Creates a sink for the given path. The file is only opened on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// The path lines are appended to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks whether a file handle is currently held.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn open_file(path: &Path) -> Result<File, Error> {
        debug!("Opening output file {}", path.display());
        File::options()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|err| Error::Open {
                path: path.to_owned(),
                source: err,
            })
    }
}

impl OutputSink for FileOutput {
    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        let file = match &mut self.file {
            Some(file) => file,
            file @ None => file.insert(Self::open_file(&self.path)?),
        };

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf).map_err(|err| Error::Write {
            destination: self.path.display().to_string(),
            source: err,
        })
    }

    fn rotate(&mut self) -> Result<(), Error> {
        if let Some(mut file) = self.file.take() {
            debug!("Closing output file {}", self.path.display());
            file.flush().map_err(|err| Error::Write {
                destination: self.path.display().to_string(),
                source: err,
            })?;
        }
        Ok(())
    }
}

/// Creates a file sink if a path is given, a standard output sink otherwise.
pub fn open_output(path: Option<&Path>) -> Box<dyn OutputSink + Send> {
    match path {
        Some(path) => Box::new(FileOutput::new(path)),
        None => Box::new(ConsoleOutput::stdout()),
    }
}
