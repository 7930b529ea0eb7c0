//! Layered network diagnostics CLI.
//!
//! Analyzes pre-collected measurement bundles, grades single latencies, and
//! parses raw tool output into measurement records.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use netdiag::analysis::{self, DistanceClass};
use netdiag::bundle::analyze_bundle;
use netdiag::config_loader;
use netdiag::ingest;
use netdiag::report::{self, DiagnosticReport};

#[derive(Parser)]
#[command(name = "netdiag")]
#[command(about = "Layered L3/L4/L7 network diagnostics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, default_value = "netdiag_output")]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a bundle of {host, target, measurements} entries
    Analyze {
        /// JSON or YAML bundle file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Grade a single latency (and optionally loss and jitter)
    Grade {
        /// Average latency in milliseconds
        #[arg(long)]
        latency: f64,

        /// same-region, regional or cross-country (derived from latency when omitted)
        #[arg(long)]
        distance: Option<DistanceClass>,

        /// Packet loss percentage
        #[arg(long)]
        loss: Option<f64>,

        /// Latency standard deviation in milliseconds
        #[arg(long)]
        jitter: Option<f64>,
    },

    /// Parse raw tool output and print the measurement record as JSON
    Parse {
        #[arg(value_enum)]
        format: ToolFormat,

        /// File containing the tool output
        #[arg(short, long)]
        file: PathBuf,

        /// Target name recorded in ping results
        #[arg(long, default_value = "unknown")]
        target: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ToolFormat {
    Ping,
    Mtr,
    MtrJson,
    Curl,
    Tcpdump,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let config = config_loader::load_config_or_default(cli.config.as_deref())?;

    // Set thread pool size; the CLI flag wins over the config file
    let threads = if cli.threads > 0 { cli.threads } else { config.orchestration.threads };
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Analyze { input } => {
            let entries = config_loader::load_bundle(&input)?;
            let analyses = analyze_bundle(&entries, &config.analysis);
            let report = DiagnosticReport::new(analyses, &input.display().to_string());

            fs::create_dir_all(&cli.output).with_context(|| {
                format!("Failed to create output directory: {}", cli.output.display())
            })?;
            report::generate_json_report(&report, &cli.output.join("layered_analysis.json"))?;
            report::generate_text_report(&report, &cli.output.join("layered_analysis.txt"))?;
            report::print_summary(&report);
        }

        Commands::Grade {
            latency,
            distance,
            loss,
            jitter,
        } => {
            let distance = distance.unwrap_or_else(|| DistanceClass::from_avg_latency(latency));
            let (grade, severity) = analysis::grade_latency(latency, distance);
            println!("Latency {:.2}ms ({}): grade {} [{}]", latency, distance, grade, severity);
            if let Some(loss) = loss {
                println!("Packet loss {:.2}%: {}", loss, analysis::grade_packet_loss(loss));
            }
            if let Some(jitter) = jitter {
                println!("Jitter {:.2}ms: {}", jitter, analysis::grade_jitter(jitter));
            }
        }

        Commands::Parse { format, file, target } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            parse_and_print(format, &text, &target, &file)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

fn parse_and_print(format: ToolFormat, text: &str, target: &str, file: &Path) -> Result<()> {
    let context = || format!("Failed to parse {}", file.display());
    match format {
        ToolFormat::Ping => print_json(&ingest::parse_ping_output(target, text).with_context(context)?),
        ToolFormat::Mtr => print_json(&ingest::parse_mtr_report(text).with_context(context)?),
        ToolFormat::MtrJson => print_json(&ingest::parse_mtr_json(text).with_context(context)?),
        ToolFormat::Curl => print_json(&ingest::parse_curl_timing(text).with_context(context)?),
        ToolFormat::Tcpdump => {
            let capture = ingest::parse_tcpdump_capture(text);
            log::info!(
                "{} TCP events, connection quality {}",
                capture.events.len(),
                capture.summary.quality_score
            );
            print_json(&serde_json::json!({
                "events": capture.events,
                "summary": capture.summary,
            }))
        }
    }
}
