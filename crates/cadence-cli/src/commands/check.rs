//! Chain file validation command.

use std::path::PathBuf;

use cadence_config::{ChainFile, StageRegistry};
use cadence_core::{Persistence, ProcessingChain, SignalDescriptor};
use clap::Args;
use serde_json::{Value, json};

#[derive(Args)]
pub struct CheckArgs {
    /// Chain file (TOML)
    #[arg(value_name = "CHAIN")]
    chain: PathBuf,

    /// Override the channel count from the file
    #[arg(long)]
    channels: Option<usize>,

    /// Override the sample rate from the file
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let mut file = ChainFile::load(&args.chain)?;
    if let Some(channels) = args.channels {
        file.channels = channels;
    }
    if let Some(sample_rate) = args.sample_rate {
        file.sample_rate = sample_rate;
    }

    let registry = StageRegistry::new();
    let mut chain = match file.prepare(&registry) {
        Ok(chain) => chain,
        Err(err) => {
            if args.json {
                let report = json!({ "ok": false, "error": err.to_string() });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            return Err(err.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report(&file, &chain))?);
    } else {
        print_layout(&file, &chain);
    }

    chain.release();
    Ok(())
}

fn descriptor_json(d: &SignalDescriptor) -> Value {
    json!({
        "domain": d.domain.to_string(),
        "channels": d.channels,
        "fragment_size": d.fragment_size,
        "sample_rate": d.sample_rate,
        "window_length": d.window_length,
        "transform_length": d.transform_length,
    })
}

fn persistence_name(persistence: Persistence) -> &'static str {
    match persistence {
        Persistence::Transient => "transient",
        Persistence::Persistent => "persistent",
    }
}

fn report(file: &ChainFile, chain: &ProcessingChain) -> Value {
    let stages: Vec<Value> = chain
        .layout()
        .iter()
        .map(|l| {
            json!({
                "name": l.name,
                "injected": l.injected,
                "input": descriptor_json(&l.input),
                "output": descriptor_json(&l.output),
                "latency": l.latency,
            })
        })
        .collect();

    let variables: Vec<Value> = chain
        .ac()
        .names()
        .filter_map(|name| chain.ac().info(name))
        .map(|info| {
            json!({
                "name": info.name,
                "type": info.ac_type.to_string(),
                "rows": info.rows,
                "cols": info.cols,
                "owner": info.owner,
                "persistence": persistence_name(info.persistence),
            })
        })
        .collect();

    json!({
        "ok": true,
        "name": file.name,
        "state": chain.state().to_string(),
        "input": chain.input_descriptor().as_ref().map(descriptor_json),
        "output": chain.output_descriptor().as_ref().map(descriptor_json),
        "latency": chain.latency(),
        "stages": stages,
        "variables": variables,
    })
}

fn print_layout(file: &ChainFile, chain: &ProcessingChain) {
    let title = file.name.as_deref().unwrap_or("chain");
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!();

    if let Some(input) = chain.input_descriptor() {
        println!("  Input:   {input}");
    }
    for layout in chain.layout() {
        let marker = if layout.injected { "+" } else { " " };
        println!(
            "  {marker} {:20}  {} -> {}  (latency {})",
            layout.name, layout.input, layout.output, layout.latency
        );
    }
    if let Some(output) = chain.output_descriptor() {
        println!("  Output:  {output}");
    }
    println!();
    println!("  Total latency: {} frames", chain.latency());

    let mut names: Vec<&str> = chain.ac().names().collect();
    if !names.is_empty() {
        names.sort_unstable();
        println!();
        println!("  AC variables:");
        for name in names {
            if let Some(info) = chain.ac().info(name) {
                println!(
                    "    {:24}  {} {}x{}  owner {}  {}",
                    info.name,
                    info.ac_type,
                    info.rows,
                    info.cols,
                    info.owner,
                    persistence_name(info.persistence)
                );
            }
        }
    }
    println!();
    println!("  (+ inserted by the chain)");
}
