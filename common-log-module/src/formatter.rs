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

//! Rendering of log records as Common Log Format lines

use chrono::{DateTime, Local, TimeZone};
use std::fmt::{Display, Write};

use crate::record::LogRecord;

const TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

fn write_field(buf: &mut String, value: impl Display) {
    if !buf.is_empty() {
        buf.push(' ');
    }

    let start = buf.len();
    let _ = write!(buf, "{value}");
    if buf.len() == start {
        buf.push('-');
    }
}

fn record_time<Tz: TimeZone>(timestamp: f64, tz: &Tz) -> Option<DateTime<Tz>> {
    // Fractional seconds are truncated, out of range values produce None
    tz.timestamp_opt(timestamp.trunc() as i64, 0).single()
}

fn stringify_record<Tz>(buf: &mut String, record: &LogRecord, tz: &Tz)
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    buf.truncate(0);

    write_field(buf, &record.client_address);
    write_field(buf, "-");
    write_field(buf, &record.user_id);
    match record_time(record.timestamp, tz) {
        Some(time) => write_field(buf, time.format(TIME_FORMAT)),
        None => write_field(buf, ""),
    }
    write_field(
        buf,
        format_args!(
            "\"{} {} {}\"",
            record.method, record.uri, record.protocol
        ),
    );
    write_field(buf, record.status);
    write_field(buf, record.size);
}

/// Formats a record as a Common Log Format line (without newline) using the local time zone.
pub fn format_record(record: &LogRecord) -> String {
    format_record_in(record, &Local)
}

/// Formats a record as a Common Log Format line (without newline) using the given time zone.
///
/// The fields are client address, `-` for the unsupported identity, user, time, request line,
/// status code and response size. Empty fields are replaced by `-`.
pub fn format_record_in<Tz>(record: &LogRecord, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut buf = String::with_capacity(128);
    stringify_record(&mut buf, record, tz);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, Utc};
    use test_log::test;

    fn record() -> LogRecord {
        LogRecord {
            timestamp: 1713985562.5,
            client_address: "120.77.35.242".to_owned(),
            user_id: String::new(),
            method: "GET".to_owned(),
            uri: "/wp-login.php".to_owned(),
            protocol: "HTTP/1.1".to_owned(),
            status: 308,
            size: 0,
        }
    }

    #[test]
    fn caddy_example() {
        assert_eq!(
            format_record_in(&record(), &Utc),
            "120.77.35.242 - - 24/Apr/2024:19:06:02 +0000 \"GET /wp-login.php HTTP/1.1\" 308 0"
        );
    }

    #[test]
    fn time_zones() {
        let record = record();

        let east = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        assert!(format_record_in(&record, &east).contains(" 25/Apr/2024:00:36:02 +0530 "));

        let summer = FixedOffset::east_opt(3600).unwrap();
        assert!(format_record_in(&record, &summer).contains(" 24/Apr/2024:20:06:02 +0100 "));

        let west = FixedOffset::west_opt(7 * 3600).unwrap();
        assert!(format_record_in(&record, &west).contains(" 24/Apr/2024:12:06:02 -0700 "));
    }

    #[test]
    fn local_time() {
        std::env::set_var("TZ", "UTC");

        let mut record = record();
        record.timestamp = 1716979999.75; // 2024-05-29 10:53:19 UTC
        assert_eq!(
            format_record(&record),
            "120.77.35.242 - - 29/May/2024:10:53:19 +0000 \"GET /wp-login.php HTTP/1.1\" 308 0"
        );
    }

    #[test]
    fn placeholders() {
        let mut record = record();
        record.client_address = String::new();
        record.user_id = "alice".to_owned();
        record.timestamp = f64::MAX;
        record.status = 200;
        record.size = 1234567;
        assert_eq!(
            format_record_in(&record, &Utc),
            "- - alice - \"GET /wp-login.php HTTP/1.1\" 200 1234567"
        );
    }

    #[test]
    fn verbatim_fields() {
        let mut record = record();
        record.user_id = "o'brien".to_owned();
        record.uri = "/search?q=caf%C3%A9&x=\"y\"".to_owned();
        record.method = String::new();
        assert_eq!(
            format_record_in(&record, &Utc),
            "120.77.35.242 - o'brien 24/Apr/2024:19:06:02 +0000 \" /search?q=caf%C3%A9&x=\"y\" HTTP/1.1\" 308 0"
        );
    }

    #[test]
    fn deterministic() {
        let record = record();
        assert_eq!(
            format_record_in(&record, &Utc),
            format_record_in(&record, &Utc)
        );
    }
}
