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

//! Decoding of Caddy JSON access log lines

use serde::Deserialize;
use serde_json::Value;

use crate::configuration::ClientAddressField;
use crate::error::MalformedRecord;

/// A single access log entry, as much of it as the Common Log Format needs
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Request time in seconds since the Unix epoch
    pub timestamp: f64,
    /// Client IP address
    pub client_address: String,
    /// Authenticated user, empty if none
    pub user_id: String,
    /// HTTP method, e.g. `GET`
    pub method: String,
    /// Request URI including query string
    pub uri: String,
    /// Protocol version, e.g. `HTTP/1.1`
    pub protocol: String,
    /// Response status code
    pub status: u16,
    /// Response body size in bytes
    pub size: u64,
}

/// Outcome of decoding a single line
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Line contains a usable access log entry
    Record(LogRecord),
    /// Line isn't a JSON object, nothing to convert
    Skip,
}

#[derive(Debug, Deserialize)]
struct CaddyRequest {
    client_ip: Option<String>,
    remote_ip: Option<String>,
    method: String,
    uri: String,
    proto: String,
}

#[derive(Debug, Deserialize)]
struct CaddyEntry {
    ts: f64,
    user_id: String,
    status: u16,
    size: u64,
    request: CaddyRequest,
}

/// Turns lines of Caddy's JSON access log into [`LogRecord`] values
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordDecoder {
    client_address: ClientAddressField,
}

impl RecordDecoder {
    /// Creates a decoder taking the client address from the given key.
    pub fn new(client_address: ClientAddressField) -> Self {
        Self { client_address }
    }

    /// Decodes a line without its trailing newline.
    ///
    /// Anything that isn't a JSON object is skipped. A JSON object without the expected fields
    /// results in an error.
    pub fn decode(&self, line: &str) -> Result<Decoded, MalformedRecord> {
        // Cheap rejection of other log streams and partial lines
        if !line.trim_start().starts_with('{') {
            return Ok(Decoded::Skip);
        }

        let value = match serde_json::from_str::<Value>(line) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) | Err(_) => return Ok(Decoded::Skip),
        };

        let entry = CaddyEntry::deserialize(value)?;
        if !entry.ts.is_finite() {
            return Err(MalformedRecord::non_finite_timestamp());
        }

        let client_address = match self.client_address {
            ClientAddressField::ClientIp => entry.request.client_ip,
            ClientAddressField::RemoteIp => entry.request.remote_ip,
        };
        let client_address = client_address.ok_or_else(|| {
            use serde::de::Error as _;
            serde_json::Error::missing_field(self.client_address.key())
        })?;

        Ok(Decoded::Record(LogRecord {
            timestamp: entry.ts,
            client_address,
            user_id: entry.user_id,
            method: entry.request.method,
            uri: entry.request.uri,
            protocol: entry.request.proto,
            status: entry.status,
            size: entry.size,
        }))
    }
}
