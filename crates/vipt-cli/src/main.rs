mod config;
mod render;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vipt_core::{ImportReport, Importer, tokenize};
use vipt_flow::{FlowSimulator, PacketOrigin};

use config::{OutputFormat, ViptConfig};
use render::{DotRenderer, render_json};

#[derive(Parser)]
#[command(name = "vipt")]
#[command(version, about = "Visualize packet flow through an iptables-save dump", long_about = None)]
struct Cli {
    /// Config file (defaults to ./vipt.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log import details (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a packet and render its traversal graph
    Flow {
        /// iptables-save dump ("-" for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Packet origin: outside, forward or inside
        #[arg(long)]
        origin: Option<PacketOrigin>,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Write the graph here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show tables, chains and rule counts of a dump
    Tables {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show the base chains a packet visits
    Hooks {
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(long)]
        origin: Option<PacketOrigin>,
    },
    /// Split a single rule line into flag/value pairs
    Tokenize {
        line: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ViptConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Flow {
            file,
            origin,
            format,
            output,
        } => {
            let report = import_dump(file.as_deref().or(config.dump.as_deref()))?;
            let origin = origin.unwrap_or(config.origin);
            let format = format.unwrap_or(config.format);
            let rendered = render_flow(&report, origin, format)?;

            match output.or(config.output) {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write graph to {:?}", path))?;
                    println!("✅ Wrote {} graph to {}", origin, path.display());
                }
                None => print!("{}", rendered),
            }
        }
        Commands::Tables { file } => {
            let report = import_dump(file.as_deref().or(config.dump.as_deref()))?;
            display_tables(&report);
        }
        Commands::Hooks { file, origin } => {
            let report = import_dump(file.as_deref().or(config.dump.as_deref()))?;
            let origin = origin.unwrap_or(config.origin);
            display_hooks(&report, origin);
        }
        Commands::Tokenize { line } => {
            for (i, arg) in tokenize(&line).iter().enumerate() {
                println!("  {}. {}", i + 1, arg);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn import_dump(path: Option<&Path>) -> anyhow::Result<ImportReport> {
    debug!(?path, "reading dump");
    let text = match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dump from {:?}", path))?,
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read dump from stdin")?;
            text
        }
    };

    Ok(Importer::import_str(&text))
}

fn render_flow(
    report: &ImportReport,
    origin: PacketOrigin,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let simulator = FlowSimulator::new(&report.ruleset);
    let graph = simulator.simulate(origin);

    match format {
        OutputFormat::Dot => Ok(DotRenderer::new(&report.ruleset).render(&graph, origin)),
        OutputFormat::Json => {
            let default_flow = simulator
                .default_flow(origin)
                .into_iter()
                .map(|chain| report.ruleset.chain_label(chain))
                .collect();
            render_json(&graph, origin, default_flow)
        }
    }
}

fn display_tables(report: &ImportReport) {
    let summary = report.ruleset.summary();
    println!("Tables ({}):", summary.len());

    for table in &summary {
        println!("\n  {} ({} rules)", table.name, table.rule_count());
        for chain in &table.chains {
            println!(
                "    {:<32} {:<8} {} rules",
                chain.name, chain.default_action, chain.rules
            );
        }
    }

    if report.has_warnings() {
        println!("\n⚠️  {} import warning(s):", report.warnings.len());
        for warning in &report.warnings {
            println!("   {}", warning);
        }
    }
}

fn display_hooks(report: &ImportReport, origin: PacketOrigin) {
    let flow = FlowSimulator::new(&report.ruleset).default_flow(origin);
    println!("Default flow for {} packets ({} chains):", origin, flow.len());

    for (i, chain) in flow.iter().enumerate() {
        let rules = report.ruleset.chain(*chain).rules().len();
        println!("  {}. {} [{} rules]", i + 1, report.ruleset.chain_label(*chain), rules);
    }
}
