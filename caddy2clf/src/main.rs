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

#![doc = include_str!("../README.md")]

use clap::Parser;
use common_log_module::{
    open_output, stdin_input, Converter, ConverterConf, ConverterOpt, Error, InputSource,
    ProcessInput, RecordDecoder, RotationSignal,
};
use log::{debug, error, info};
use std::process::ExitCode;

/// Environment variable pointing to an optional YAML configuration file
const CONF_VARIABLE: &str = "CADDY2CLF_CONF";

/// Convert Caddy JSON access logs to the Common Log Format
///
/// Send a HUP or USR1 signal to reopen the output file after it has been rotated.
#[derive(Debug, Parser)]
#[command(version)]
struct Opt {
    #[command(flatten)]
    converter: ConverterOpt,
}

fn load_conf() -> Result<ConverterConf, Error> {
    match std::env::var_os(CONF_VARIABLE) {
        Some(path) => ConverterConf::load_from_yaml(path),
        None => Ok(ConverterConf::default()),
    }
}

async fn convert(conf: ConverterConf) -> Result<(), Error> {
    let rotation = RotationSignal::new();
    rotation.listen();

    let mut input: Box<dyn InputSource + Send> = match &conf.input_pipe {
        Some(command) => Box::new(ProcessInput::spawn(command)?),
        None => Box::new(stdin_input()),
    };
    let mut output = open_output(conf.output_file.as_deref());

    let converter = Converter::new(
        RecordDecoder::new(conf.client_address),
        rotation,
        conf.poll_interval(),
    );
    let stats = converter.run(&mut *input, &mut *output).await?;

    info!(
        "Input closed, converted {} of {} lines ({} skipped, {} malformed), {} rotations",
        stats.converted, stats.lines_read, stats.skipped, stats.malformed, stats.rotations
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let opt = Opt::parse();

    let mut conf = match load_conf() {
        Ok(conf) => conf,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    conf.merge_with_opt(opt.converter);
    debug!("Effective configuration: {conf:?}");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed starting runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(convert(conf));

    // A blocking read of standard input might still be pending, don't wait for it
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
