//! arsrecon CLI - reconcile bank exports against switch / provider reports
//!
//! ```bash
//! arsrecon serve                               # Start HTTP server (port 8000)
//! arsrecon reconcile bank.xlsx switch.xlsx     # JSON summary to stdout
//! arsrecon reconcile bank.xlsx switch.xlsx -o report.xlsx
//! arsrecon detect switch.xlsx --side provider  # Show header row and column mapping
//! arsrecon modes                               # List mode profiles
//! ```

use arsrecon::api::types::{mode_catalog, ReconcileResponse};
use arsrecon::recon::pipeline::{load_side, process_paths};
use arsrecon::{report_filename, HeaderDetection, JoinKind, ReconMode, ReconOptions, ServiceConfig, Side};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "arsrecon")]
#[command(about = "Reconcile bank transactions against switch and provider reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: $PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Reconcile a bank file against a provider file
    Reconcile {
        /// Bank (core banking) export
        bank: PathBuf,

        /// Switch / provider report
        provider: PathBuf,

        /// Reconciliation mode: atm, tele, mpesa, tele-incoming
        #[arg(short, long, default_value = "atm")]
        mode: ReconMode,

        /// Also report provider rows missing at the bank
        #[arg(long)]
        full_outer: bool,

        /// Write the xlsx report here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the JSON summary here
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Show the detected header row and column mapping of a file
    Detect {
        /// Input file
        file: PathBuf,

        /// Reconciliation mode
        #[arg(short, long, default_value = "atm")]
        mode: ReconMode,

        /// Which side the file is: bank or provider
        #[arg(short, long, default_value = "bank")]
        side: Side,
    },

    /// List reconciliation modes and their column rules
    Modes,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = ServiceConfig::from_env();

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(config, port).await,

        Commands::Reconcile {
            bank,
            provider,
            mode,
            full_outer,
            output,
            json,
        } => {
            let join = if full_outer { JoinKind::Full } else { JoinKind::Left };
            let options = ReconOptions::from_config(&config, mode, join);
            cmd_reconcile(&bank, &provider, &options, output.as_deref(), json.as_deref())
        }

        Commands::Detect { file, mode, side } => cmd_detect(&file, mode, side),

        Commands::Modes => cmd_modes(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(mut config: ServiceConfig, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        config.port = port;
    }
    arsrecon::server::start_server(config).await
}

fn cmd_reconcile(
    bank: &Path,
    provider: &Path,
    options: &ReconOptions,
    output: Option<&Path>,
    json: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Bank:     {}", bank.display());
    eprintln!("📄 Provider: {}", provider.display());

    let outcome = process_paths(bank, provider, options)?;
    let summary = outcome.summary(options.preview_rows);

    eprintln!("\n📊 {} ({} join)", options.mode.label(), options.join);
    for (label, count) in &summary.summary {
        eprintln!("   {:<22} {}", label, count);
    }
    eprintln!("   {:<22} {}", "TOTAL", summary.total_rows);

    if let Some(path) = output {
        let bytes = outcome.report(&options.bank)?;
        fs::write(path, &bytes)?;
        eprintln!("💾 Report written to: {}", path.display());
    }

    let response = ReconcileResponse::new(&outcome, summary);
    let rendered = serde_json::to_string_pretty(&response)?;
    match json {
        Some(path) => {
            fs::write(path, rendered)?;
            eprintln!("💾 Summary written to: {}", path.display());
        }
        None if output.is_none() => println!("{}", rendered),
        None => eprintln!("   (suggested name: {})", report_filename(options.mode)),
    }

    Ok(())
}

fn cmd_detect(file: &Path, mode: ReconMode, side: Side) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔍 {} ({} mode, {} side)", file.display(), mode, side);

    let bytes = fs::read(file)?;
    let prepared = load_side(&bytes, mode, side, &Default::default())?;

    match prepared.header {
        HeaderDetection::Detected { row, matches } => {
            println!("Header row: {} ({} expected tokens found)", row, matches)
        }
        HeaderDetection::Defaulted { row } => {
            println!("Header row: {} (default, no expected token found)", row)
        }
    }

    println!("Columns:");
    for (i, column) in prepared.table().columns.iter().enumerate() {
        let note = prepared
            .mapping
            .renamed
            .iter()
            .find(|r| &r.to == column)
            .map(|r| format!("  (from '{}')", r.from))
            .or_else(|| {
                prepared
                    .mapping
                    .synthesized
                    .contains(column)
                    .then(|| format!("  (constant '{}')", mode.default_description()))
            })
            .unwrap_or_default();
        println!("  [{:2}] {}{}", i + 1, column, note);
    }
    println!("Data rows: {}", prepared.table().len());

    Ok(())
}

fn cmd_modes() -> Result<(), Box<dyn std::error::Error>> {
    for info in mode_catalog() {
        println!("{} - {}{}", info.mode, info.label, if info.role_split { " (issuer/acquirer split)" } else { "" });
        for (side, profile) in [("bank", info.bank), ("provider", info.provider)] {
            println!(
                "  {:<8} header tokens: {} (default row {})",
                side,
                profile.header_tokens.join(", "),
                profile.default_header_row
            );
            for rule in profile.rules {
                println!("           {} → {}", rule.fragments.join(" / "), rule.canonical);
            }
        }
    }
    Ok(())
}
