use std::path::PathBuf;

use clap::Parser;
use ironmms_pdu::rcb::RcbReference;

pub const DEFAULT_PORT: u16 = 102;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub domain: String,
    pub rcbs: Vec<RcbReference>,
    pub scl: Option<PathBuf>,
    pub debug: bool,
    pub verbose: bool,
    pub sink_url: Option<String>,
    pub sink_batch_ms: u64,
    pub sink_no_batch: bool,
    pub keep_alive: bool,
    pub log_file: Option<String>,
}

/// IEC 61850 MMS reporting client
#[derive(Parser, Debug)]
#[clap(author = "Devolutions", about = "IronMMS reporting client")]
#[clap(version, long_about = None)]
struct Args {
    /// IED host name or address
    host: String,

    /// IED port
    port: Option<u16>,

    /// MMS domain (logical device) hosting the report control blocks
    #[clap(long, default_value = "VMC7_1LD0")]
    domain: String,

    /// Report control block to subscribe to; repeatable. Either an item
    /// ID inside the default domain (`LLN0$BR$brcbST01`) or a full
    /// `DOMAIN/ITEM` reference.
    #[clap(long = "rcb")]
    rcbs: Vec<String>,

    /// SCL/ICD file used to label dataset members
    #[clap(long, value_parser)]
    scl: Option<PathBuf>,

    /// Hex-dump sent and received PDUs
    #[clap(long)]
    debug: bool,

    /// Dump raw report PDUs and raw entry values
    #[clap(long)]
    verbose: bool,

    /// Push decoded samples to this time-series ingestion endpoint
    #[clap(long)]
    sink_url: Option<String>,

    /// Sink batching interval in milliseconds
    #[clap(long, default_value_t = 200)]
    sink_batch_ms: u64,

    /// One HTTP POST per report instead of batching
    #[clap(long)]
    sink_no_batch: bool,

    /// Send an MMS identify as keep-alive on idle
    #[clap(long)]
    keep_alive: bool,

    /// A file to write logs to, instead of stderr
    #[clap(short, long, value_parser)]
    log_file: Option<String>,
}

impl Config {
    pub fn parse_args() -> anyhow::Result<Self> {
        let args = match Args::try_parse() {
            Ok(args) => args,
            Err(error)
                if matches!(
                    error.kind(),
                    clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
                ) =>
            {
                // --help and --version are a normal shutdown
                error.exit()
            }
            Err(error) => return Err(error.into()),
        };

        if args.rcbs.is_empty() {
            anyhow::bail!("at least one --rcb is required");
        }

        let rcbs = args
            .rcbs
            .iter()
            .map(|raw| parse_rcb(raw, &args.domain))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            host: args.host,
            port: args.port.unwrap_or(DEFAULT_PORT),
            domain: args.domain,
            rcbs,
            scl: args.scl,
            debug: args.debug,
            verbose: args.verbose,
            sink_url: args.sink_url,
            sink_batch_ms: args.sink_batch_ms,
            sink_no_batch: args.sink_no_batch,
            keep_alive: args.keep_alive,
            log_file: args.log_file,
        })
    }
}

fn parse_rcb(raw: &str, default_domain: &str) -> anyhow::Result<RcbReference> {
    let reference = match raw.split_once('/') {
        Some((domain, item)) => {
            anyhow::ensure!(!domain.is_empty() && !item.is_empty(), "empty RCB reference part");
            RcbReference::new(domain, item)
        }
        None => RcbReference::new(default_domain, raw),
    };

    anyhow::ensure!(!reference.item_id.is_empty(), "empty RCB item");

    Ok(reference)
}
