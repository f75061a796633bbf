#[macro_use]
extern crate tracing;

mod client;
mod config;
mod hexdump;

use anyhow::Context as _;
use ironmms_session::LabelMap;
use proc_exit::Code;

use crate::client::ClientError;
use crate::config::Config;

const EXIT_ARGUMENT_ERROR: i32 = 1;
const EXIT_CONNECT_FAILURE: i32 = 2;
const EXIT_INITIATE_FAILURE: i32 = 3;

fn main() {
    let config = match Config::parse_args() {
        Ok(config) => config,
        Err(error) => {
            // clap renders its own help/usage output
            eprint!("{error}");
            Code::new(EXIT_ARGUMENT_ERROR).process_exit();
        }
    };

    if let Err(error) = setup_logging(&config) {
        eprintln!("unable to initialize logging: {error:#}");
        Code::new(EXIT_ARGUMENT_ERROR).process_exit();
    }

    let labels = match load_labels(&config) {
        Ok(labels) => labels,
        Err(error) => {
            error!("{error:#}");
            Code::new(EXIT_ARGUMENT_ERROR).process_exit();
        }
    };

    match client::run(config, labels) {
        Ok(()) => Code::SUCCESS.process_exit(),
        Err(error) => {
            error!("{:#}", error.error());

            let code = match error {
                ClientError::Connect(_) => EXIT_CONNECT_FAILURE,
                ClientError::Initiate(_) => EXIT_INITIATE_FAILURE,
                // Losing an established session reads as a connection
                // failure for supervising process managers.
                ClientError::Runtime(_) => EXIT_CONNECT_FAILURE,
            };

            Code::new(code).process_exit();
        }
    }
}

fn load_labels(config: &Config) -> anyhow::Result<LabelMap> {
    let Some(path) = &config.scl else {
        return Ok(LabelMap::new());
    };

    let datasets = ironmms_scl::parse(path).with_context(|| format!("parse SCL file {}", path.display()))?;

    info!(datasets = datasets.len(), "SCL loaded");

    Ok(LabelMap::from(datasets))
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    use tracing::metadata::LevelFilter;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_level = if config.verbose {
        LevelFilter::TRACE
    } else if config.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var("IRONMMS_LOG")
        .from_env_lossy();

    if let Some(log_file) = &config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("couldn't open {log_file}"))?;

        let fmt_layer = tracing_subscriber::fmt::layer().compact().with_ansi(false).with_writer(file);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(env_filter)
            .try_init()
            .context("failed to set tracing global subscriber")?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(env_filter)
            .try_init()
            .context("failed to set tracing global subscriber")?;
    }

    Ok(())
}
