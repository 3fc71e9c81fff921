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

//! Line sources with a non-blocking readiness check

use async_trait::async_trait;
use log::{debug, warn};
use std::io::{self, BufRead};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::timeout;

use crate::error::Error;

/// Result of checking the input for data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line, without the line terminator
    Line(String),
    /// No complete line available right now
    Pending,
    /// The input has been closed
    EndOfStream,
}

/// A stream of lines that can be checked for data without waiting
#[async_trait]
pub trait InputSource {
    /// Returns the next line if one is available immediately.
    async fn poll_line(&mut self) -> Result<ReadOutcome, Error>;
}

/// Splits any asynchronous reader into lines
///
/// Incomplete lines are kept until the rest of the line arrives, the last line of the stream
/// doesn't need a line terminator.
#[derive(Debug)]
pub struct LineInput<R> {
    name: String,
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineInput<R> {
    /// Wraps a reader, the name is used in error messages.
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

}

fn take_line(buf: &mut Vec<u8>) -> String {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    line
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> InputSource for LineInput<R> {
    async fn poll_line(&mut self) -> Result<ReadOutcome, Error> {
        // Data read before the timeout stays in `buf`, nothing gets lost
        let read = timeout(
            Duration::ZERO,
            self.reader.read_until(b'\n', &mut self.buf),
        )
        .await;

        match read {
            Err(_) => Ok(ReadOutcome::Pending),
            Ok(Err(err)) => Err(Error::Read {
                input: self.name.clone(),
                source: err,
            }),
            Ok(Ok(0)) if self.buf.is_empty() => Ok(ReadOutcome::EndOfStream),
            Ok(Ok(_)) => Ok(ReadOutcome::Line(take_line(&mut self.buf))),
        }
    }
}

/// Number of lines a [`QueuedInput`] reader can be ahead of the conversion
const QUEUE_CAPACITY: usize = 1024;

/// Reads lines from a blocking reader on a separate thread
///
/// Lines are queued as soon as they arrive, so checking for data only needs to look at the queue.
/// Tokio's own standard input reads on a blocking thread as well but only when polled, data
/// already waiting in a pipe would often appear unavailable.
#[derive(Debug)]
pub struct QueuedInput {
    name: String,
    lines: mpsc::Receiver<io::Result<String>>,
}

impl QueuedInput {
    /// Starts reading in the background, the name is used in error messages. Has to be called
    /// within a Tokio runtime.
    pub fn spawn<R: io::Read + Send + 'static>(name: impl Into<String>, reader: R) -> Self {
        let (sender, lines) = mpsc::channel(QUEUE_CAPACITY);
        tokio::task::spawn_blocking(move || read_lines(io::BufReader::new(reader), &sender));

        Self {
            name: name.into(),
            lines,
        }
    }
}

fn read_lines(mut reader: impl BufRead, sender: &mpsc::Sender<io::Result<String>>) {
    let mut buf = Vec::new();
    loop {
        let result = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => Ok(take_line(&mut buf)),
            Err(err) => Err(err),
        };

        let failed = result.is_err();
        if sender.blocking_send(result).is_err() || failed {
            // Receiver is gone or the error has been reported
            break;
        }
    }
}

/// Reads lines from the process's standard input.
pub fn stdin_input() -> QueuedInput {
    QueuedInput::spawn("standard input", io::stdin())
}

#[async_trait]
impl InputSource for QueuedInput {
    async fn poll_line(&mut self) -> Result<ReadOutcome, Error> {
        match self.lines.try_recv() {
            Ok(Ok(line)) => Ok(ReadOutcome::Line(line)),
            Ok(Err(err)) => Err(Error::Read {
                input: self.name.clone(),
                source: err,
            }),
            Err(TryRecvError::Empty) => Ok(ReadOutcome::Pending),
            Err(TryRecvError::Disconnected) => Ok(ReadOutcome::EndOfStream),
        }
    }
}

/// How long to wait for an input command to exit once its output is closed
const REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Reads lines from the standard output of a child process
#[derive(Debug)]
pub struct ProcessInput {
    child: Child,
    lines: Option<LineInput<ChildStdout>>,
}

impl ProcessInput {
    /// Starts a command via `sh -c`, so that quoting and pipes work as in a shell.
    pub fn spawn(command: &str) -> Result<Self, Error> {
        let spawn_error = |source| Error::Spawn {
            command: command.to_owned(),
            source,
        };

        debug!("Starting input command: {command}");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let stdout = child.stdout.take().ok_or_else(|| {
            spawn_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "standard output not captured",
            ))
        })?;

        Ok(Self {
            child,
            lines: Some(LineInput::new(format!("`{command}`"), stdout)),
        })
    }

    async fn reap(&mut self) {
        match timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) if status.success() => debug!("Input command exited"),
            Ok(Ok(status)) => warn!("Input command exited with {status}"),
            Ok(Err(err)) => warn!("Failed waiting for input command: {err}"),
            Err(_) => warn!("Input command closed its output but keeps running, leaving it be"),
        }
    }
}

#[async_trait]
impl InputSource for ProcessInput {
    async fn poll_line(&mut self) -> Result<ReadOutcome, Error> {
        let Some(lines) = &mut self.lines else {
            return Ok(ReadOutcome::EndOfStream);
        };

        let outcome = lines.poll_line().await?;
        if outcome == ReadOutcome::EndOfStream {
            // Closing the pipe before waiting, the child might not exit otherwise
            self.lines = None;
            self.reap().await;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;
    use tokio::io::AsyncWriteExt;

    struct BrokenReader;

    impl io::Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }
    }

    async fn next_ready(input: &mut impl InputSource) -> ReadOutcome {
        loop {
            match input.poll_line().await.unwrap() {
                ReadOutcome::Pending => tokio::time::sleep(Duration::from_millis(10)).await,
                outcome => return outcome,
            }
        }
    }

    #[test(tokio::test)]
    async fn in_memory_lines() {
        let data: &[u8] = b"first\r\nsecond\n\nlast";
        let mut input = LineInput::new("memory", data);

        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::Line("first".into()));
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::Line("second".into()));
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::Line("".into()));
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::Line("last".into()));
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::EndOfStream);
    }

    #[test(tokio::test)]
    async fn invalid_utf8() {
        let data: &[u8] = b"{\"a\xff\"}\n";
        let mut input = LineInput::new("memory", data);
        assert_eq!(
            input.poll_line().await.unwrap(),
            ReadOutcome::Line("{\"a\u{fffd}\"}".into())
        );
    }

    #[test(tokio::test)]
    async fn partial_lines_wait() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut input = LineInput::new("duplex", reader);

        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::Pending);

        writer.write_all(b"{\"partial\":").await.unwrap();
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::Pending);

        writer.write_all(b"true}\nnext").await.unwrap();
        assert_eq!(
            input.poll_line().await.unwrap(),
            ReadOutcome::Line("{\"partial\":true}".into())
        );
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::Pending);

        drop(writer);
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::Line("next".into()));
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::EndOfStream);
    }

    #[test(tokio::test)]
    async fn queued_lines() {
        let data = io::Cursor::new(b"first\r\nsecond\n\n{\"a\xff\"}\nlast".to_vec());
        let mut input = QueuedInput::spawn("memory", data);

        assert_eq!(next_ready(&mut input).await, ReadOutcome::Line("first".into()));
        assert_eq!(next_ready(&mut input).await, ReadOutcome::Line("second".into()));
        assert_eq!(next_ready(&mut input).await, ReadOutcome::Line("".into()));
        assert_eq!(
            next_ready(&mut input).await,
            ReadOutcome::Line("{\"a\u{fffd}\"}".into())
        );
        assert_eq!(next_ready(&mut input).await, ReadOutcome::Line("last".into()));
        assert_eq!(next_ready(&mut input).await, ReadOutcome::EndOfStream);
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::EndOfStream);
    }

    #[test(tokio::test)]
    async fn queued_lines_are_ready() {
        let data: Vec<u8> = (0..100).flat_map(|i| format!("line {i}\n").into_bytes()).collect();
        let mut input = QueuedInput::spawn("memory", io::Cursor::new(data));

        assert_eq!(next_ready(&mut input).await, ReadOutcome::Line("line 0".into()));

        // The reader thread had time to catch up, every remaining line is available at once
        tokio::time::sleep(Duration::from_millis(200)).await;
        for i in 1..100 {
            assert_eq!(
                input.poll_line().await.unwrap(),
                ReadOutcome::Line(format!("line {i}"))
            );
        }
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::EndOfStream);
    }

    #[test(tokio::test)]
    async fn queued_read_error() {
        let mut input = QueuedInput::spawn("broken device", BrokenReader);

        let result = loop {
            match input.poll_line().await {
                Ok(ReadOutcome::Pending) => tokio::time::sleep(Duration::from_millis(10)).await,
                result => break result,
            }
        };
        assert!(matches!(
            result,
            Err(Error::Read { input, .. }) if input == "broken device"
        ));
        assert_eq!(next_ready(&mut input).await, ReadOutcome::EndOfStream);
    }

    #[cfg(unix)]
    #[test(tokio::test)]
    async fn process_output() {
        let mut input = ProcessInput::spawn("printf 'one\\ntwo\\n'").unwrap();
        assert_eq!(next_ready(&mut input).await, ReadOutcome::Line("one".into()));
        assert_eq!(next_ready(&mut input).await, ReadOutcome::Line("two".into()));
        assert_eq!(next_ready(&mut input).await, ReadOutcome::EndOfStream);
        assert_eq!(input.poll_line().await.unwrap(), ReadOutcome::EndOfStream);
    }

    #[cfg(unix)]
    #[test(tokio::test)]
    async fn failing_process() {
        let mut input = ProcessInput::spawn("exit 3").unwrap();
        assert_eq!(next_ready(&mut input).await, ReadOutcome::EndOfStream);
    }

    #[cfg(unix)]
    #[test(tokio::test)]
    async fn process_outliving_its_output() {
        let mut input = ProcessInput::spawn("exec >&-; sleep 30").unwrap();
        let outcome = timeout(Duration::from_secs(10), next_ready(&mut input))
            .await
            .unwrap();
        assert_eq!(outcome, ReadOutcome::EndOfStream);
    }
}
