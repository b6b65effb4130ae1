use anyhow::{anyhow, Context};
use clap::Parser;
use kafka_destination::step::{Connector, StepConfig, StepKind};
use kafka_destination::{config, logging, Record};
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{error, info, warn};

const HANDLE: u32 = 1;

#[derive(Parser, Debug)]
#[command(name = "kafka-destination")]
#[command(about = "Publishes stdin lines to Kafka through the destination connector", long_about = None)]
struct Args {
    #[arg(short, long, help = "Topic every line is published to")]
    topic: String,

    #[arg(short, long, help = "Message key")]
    key: Option<String>,

    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_pair)]
    headers: Vec<(String, String)>,

    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_pair)]
    params: Vec<(String, String)>,

    #[arg(long, value_name = "FILE", help = "JSON object of step parameters")]
    params_file: Option<PathBuf>,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init(args.json_logs, args.verbose);

    info!("Starting kafka-destination");

    let connector = Connector::default();
    connector
        .configure(
            StepConfig::new(StepKind::Destination, HANDLE)
                .with_termination_handler(|h| info!(handle = h, "Step terminated")),
        )
        .map_err(|e| anyhow!("Failed to configure step: {}", e))?;

    if let Some(path) = &args.params_file {
        info!("Loading parameters from {:?}", path);
        let params = config::load_params_file(path)
            .with_context(|| format!("Failed to load parameters from {:?}", path))?;
        for (k, v) in params {
            connector.set_param(HANDLE, k, v);
        }
    }
    for (k, v) in &args.params {
        connector.set_param(HANDLE, k.as_str(), v.as_str());
    }

    connector.start(HANDLE).context("Failed to start step")?;

    info!(topic = %args.topic, key = ?args.key, "Publishing stdin lines");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Error on reading a line: {}", e);
                break;
            }
        };

        let mut record = Record::new(line).with_metadata("kafka.topic", args.topic.as_str());
        if let Some(key) = &args.key {
            record = record.with_metadata("kafka.key", key.as_str());
        }
        for (name, value) in &args.headers {
            record = record.with_metadata(format!("kafka.headers.{}", name), value.as_str());
        }

        if let Err(e) = connector.process_record(&record, HANDLE) {
            warn!("Record failed: {}", e);
        }
    }

    let stats = connector.shutdown(HANDLE).unwrap_or_default();

    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}
