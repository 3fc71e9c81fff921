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

//! Structures handling command line options and YAML deserialization for the converter

use clap::Args;
use log::trace;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

/// Command line options of the converter
#[derive(Debug, Default, Args)]
pub struct ConverterOpt {
    /// Append converted lines to this file instead of writing them to standard output
    #[arg(short, long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,

    /// Run this command and read its standard output instead of standard input, e.g.
    /// "tail -F /var/log/caddy/access.json"
    #[arg(short, long, value_name = "COMMAND")]
    pub input_pipe: Option<String>,
}

/// JSON key under `request` holding the client address
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAddressField {
    /// `request.client_ip`, the address after trusted proxies have been resolved
    #[default]
    ClientIp,
    /// `request.remote_ip`, the address of the immediate peer
    RemoteIp,
}

impl ClientAddressField {
    /// Name of the JSON key
    pub fn key(self) -> &'static str {
        match self {
            Self::ClientIp => "client_ip",
            Self::RemoteIp => "remote_ip",
        }
    }
}

/// Configuration settings of the converter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConf {
    /// Output file path, standard output if missing
    pub output_file: Option<PathBuf>,
    /// Command producing the input, standard input if missing
    pub input_pipe: Option<String>,
    /// JSON key to take the client address from
    pub client_address: ClientAddressField,
    /// Time to wait between polls of an idle input, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ConverterConf {
    fn default() -> Self {
        Self {
            output_file: None,
            input_pipe: None,
            client_address: ClientAddressField::default(),
            poll_interval_ms: 1000,
        }
    }
}

impl ConverterConf {
    /// Parses configuration from a YAML string.
    pub fn from_yaml(yaml: impl AsRef<str>) -> Result<Self, serde_yaml::Error> {
        let conf: Self = serde_yaml::from_str(yaml.as_ref())?;
        trace!("Parsed configuration: {conf:#?}");
        Ok(conf)
    }

    /// Loads configuration from a YAML file.
    pub fn load_from_yaml(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let config_error = |source: Box<dyn std::error::Error + Send + Sync>| Error::Config {
            path: path.to_owned(),
            source,
        };

        let file = File::open(path).map_err(|err| config_error(err.into()))?;
        let conf: Self = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| config_error(err.into()))?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }

    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: ConverterOpt) {
        if let Some(output_file) = opt.output_file {
            self.output_file = Some(output_file);
        }

        if let Some(input_pipe) = opt.input_pipe {
            self.input_pipe = Some(input_pipe);
        }
    }

    /// Idle poll interval, never shorter than a millisecond
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
