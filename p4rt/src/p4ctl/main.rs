/*
Copyright (c) 2021 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/


//! `p4ctl` drives one P4Runtime target from the command line: push a pipeline, list its tables,
//! read or write entries, send packets, and watch for packet-ins.

use anyhow::{anyhow, Context, Result};

use clap::{Parser, Subcommand};

use p4rt::config::{Inventory, RuntimeConfig};
use p4rt::intent::UpdateIntent;
use p4rt::value::{hex, parse_hex};
use p4rt::{DeviceRegistry, EndpointPool, NotificationSink, P4Service};

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// JSON runtime configuration
    #[clap(long)]
    config: Option<PathBuf>,

    /// Target address as IP:PORT
    #[clap(long, default_value = "127.0.0.1:50051")]
    target: String,

    #[clap(long, default_value_t = 0)]
    device_id: u64,

    /// Name to register the device under
    #[clap(long, default_value = "node0")]
    node_id: String,

    /// Binary P4Info for the pipeline
    #[clap(long)]
    p4info: Option<PathBuf>,

    /// Target-specific device config, e.g. BMv2 JSON
    #[clap(long)]
    device_config: Option<PathBuf>,

    /// Overrides the configured election id
    #[clap(long)]
    election_id: Option<u64>,

    /// Overrides the configured connect timeout
    #[clap(long)]
    connect_timeout_ms: Option<u64>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push the pipeline given by --p4info and --device-config
    Push,

    /// List the tables and actions of the pipeline the target is running
    Tables,

    /// Push the pipeline, then print the entries of TABLE (all tables if omitted)
    ReadTable { table: Option<String> },

    /// Push the pipeline, then write the JSON list of updates in FILE as one batch
    Apply { file: PathBuf },

    /// Send a packet-out with the given hex payload
    PacketOut { payload: String },

    /// Print packet-ins until the stream closes
    Watch,

    /// Add every device in a JSON inventory and describe them
    Inventory { file: PathBuf },
}

struct PrintSink;

impl NotificationSink for PrintSink {
    fn notify(&self, node_id: &str, payload: &[u8]) {
        println!("{}: packet-in {}", node_id, hex(payload));
    }
}

fn parse_target(target: &str) -> Result<(String, u16)> {
    let (ip, port) = target
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("{}: expected IP:PORT", target))?;
    let port = port
        .parse::<u16>()
        .with_context(|| format!("{}: invalid port", target))?;
    Ok((ip.to_string(), port))
}

fn load_config(args: &Args) -> Result<RuntimeConfig> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(election_id) = args.election_id {
        config.election_id = election_id;
    }
    if let Some(connect_timeout_ms) = args.connect_timeout_ms {
        config.connect_timeout_ms = connect_timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        event!(Level::ERROR, "{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let pool = Arc::new(EndpointPool::new(&config));
    let registry = DeviceRegistry::new(pool, Arc::new(PrintSink), config);
    let service = P4Service::new(registry.clone());
    let (ip, port) = parse_target(&args.target)?;
    let node = args.node_id.as_str();
    let p4info = args.p4info.as_deref();
    let device_config = args.device_config.as_deref();

    let configure = || -> Result<()> {
        if !service.configure_device(node, &ip, port, args.device_id, p4info, device_config) {
            return Err(anyhow!("{}: could not configure {}", node, args.target));
        }
        Ok(())
    };
    let add = || -> Result<()> {
        if !service.add_node(node, &ip, port, args.device_id, None, None) {
            return Err(anyhow!("{}: could not connect to {}", node, args.target));
        }
        Ok(())
    };

    match &args.command {
        Command::Push => {
            configure()?;
            println!("{}: pipeline pushed", node);
        }
        Command::Tables => {
            add()?;
            let listing = service
                .get_pipeline_config(node)
                .ok_or_else(|| anyhow!("{}: target did not return a pipeline", node))?;
            print!("{}", listing);
        }
        Command::ReadTable { table } => {
            configure()?;
            let entries = service
                .read_table_entry(node, table.as_deref().unwrap_or(""))
                .ok_or_else(|| anyhow!("{}: read failed", node))?;
            for entry in entries {
                println!("{}", entry);
            }
        }
        Command::Apply { file } => {
            let s = fs::read_to_string(file)
                .with_context(|| format!("could not read {}", file.display()))?;
            let updates: Vec<UpdateIntent> = serde_json::from_str(&s)
                .with_context(|| format!("{}: invalid update list", file.display()))?;
            configure()?;
            if !service.write_batch(node, &updates) {
                return Err(anyhow!("{}: write failed", node));
            }
            println!("{}: {} update(s) written", node, updates.len());
        }
        Command::PacketOut { payload } => {
            let bytes = parse_hex(payload).ok_or_else(|| anyhow!("{}: invalid hex payload", payload))?;
            add()?;
            if !service.transmit_packet(node, &bytes) {
                return Err(anyhow!("{}: packet-out failed", node));
            }
            // The packet is only queued; give the stream a moment to send it.
            sleep(registry.config().stream_grace());
        }
        Command::Watch => {
            add()?;
            while registry.contains_node(node) {
                sleep(Duration::from_millis(500));
            }
            return Err(anyhow!("{}: stream closed", node));
        }
        Command::Inventory { file } => {
            let inventory = Inventory::from_file(file)?;
            for d in &inventory.devices {
                let added = service.add_node(
                    &d.node_id,
                    &d.ip,
                    d.port,
                    d.device_id,
                    d.p4info.as_deref(),
                    d.device_config.as_deref(),
                );
                if !added {
                    event!(Level::WARN, "{}: not added", d.node_id);
                }
            }
            for line in service.query_nodes() {
                println!("{}", line);
            }
        }
    }

    for node in registry.node_ids() {
        registry.remove_device(&node);
    }
    Ok(())
}
