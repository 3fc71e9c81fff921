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

//! Rotation requests, delivered as Unix signals

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag requesting the output to be reopened
///
/// Clones share the same flag. Any number of requests arriving before the flag is checked result
/// in a single rotation.
#[derive(Debug, Clone, Default)]
pub struct RotationSignal {
    requested: Arc<AtomicBool>,
}

impl RotationSignal {
    /// Creates a new flag, no rotation requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests rotation.
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Checks whether rotation has been requested and clears the request.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }

    /// Sets the flag whenever the process receives a `HUP` or `USR1` signal. Has to be called
    /// within a Tokio runtime.
    #[cfg(unix)]
    pub fn listen(&self) {
        use tokio::signal::unix::SignalKind;

        listen_to_signal(SignalKind::hangup(), self.clone());
        listen_to_signal(SignalKind::user_defined1(), self.clone());
    }

    /// Signals aren't supported here, rotation can only be triggered programmatically.
    #[cfg(not(unix))]
    pub fn listen(&self) {}
}

#[cfg(unix)]
fn listen_to_signal(kind: tokio::signal::unix::SignalKind, rotation: RotationSignal) {
    use log::{debug, warn};
    use tokio::signal::unix::signal;

    let mut sig = match signal(kind) {
        Ok(sig) => sig,
        Err(err) => {
            warn!(
                "Failed registering for signal {}: {err}",
                kind.as_raw_value()
            );
            return;
        }
    };

    tokio::spawn(async move {
        while sig.recv().await.is_some() {
            debug!("Received signal {}", kind.as_raw_value());
            rotation.trigger();
        }
    });
}
