//! quadsheet - four-up PDF layout from the command line
//!
//! Commands:
//! - `convert`: lay out one PDF (or several, merged) four pages to a sheet
//! - `geometry`: print the layout constants
//! - `inspect`: validate a PDF and print its basics

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quadsheet_core::geometry::pt_to_mm;
use quadsheet_core::{ConversionReport, DocumentOutcome, LayoutEngine, LayoutGeometry};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::EngineArgs;

/// Exit code for a degraded result under `--strict`
const EXIT_DEGRADED: u8 = 2;

const DEFAULT_LOG_FILTER: &str = "quadsheet=info,quadsheet_core=info";

#[derive(Parser, Debug)]
#[command(name = "quadsheet")]
#[command(version, about = "Tile PDF pages four to a sheet for printing")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out PDF pages in a 2x2 grid; several inputs are merged first
    Convert {
        /// Output PDF
        #[arg(short, long)]
        output: PathBuf,

        /// Source PDFs, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Exit with an error when the result is degraded
        #[arg(long)]
        strict: bool,
    },

    /// Print the computed layout constants
    Geometry {
        #[arg(long)]
        json: bool,
    },

    /// Validate a PDF and print its page count and size
    Inspect {
        input: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Convert {
            output,
            inputs,
            json,
            strict,
        } => {
            let config = cli.engine.resolve()?;
            let engine = LayoutEngine::new(config).context("Invalid engine configuration")?;

            info!("Converting {} input(s) into {}", inputs.len(), output.display());
            let report = engine
                .convert(&inputs, &output)
                .with_context(|| format!("Failed to create {}", output.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary(&report, &output);
            }

            if report.is_degraded() {
                warn!("Output is degraded: {}", describe_degradation(&report));
                if strict {
                    return Ok(ExitCode::from(EXIT_DEGRADED));
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Geometry { json } => {
            let config = cli.engine.resolve()?;
            config.validate().context("Invalid engine configuration")?;
            let geometry = LayoutGeometry::new(&config.layout);

            if json {
                println!("{}", serde_json::to_string_pretty(&GeometryView::from(&geometry))?);
            } else {
                print_geometry(&geometry);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Inspect { input, json } => {
            let bytes =
                std::fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            let info = quadsheet_core::inspect(&bytes)
                .with_context(|| format!("{} is not a usable PDF", input.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("File:      {}", input.display());
                println!("Version:   PDF {}", info.version);
                println!("Pages:     {}", info.page_count);
                println!("Encrypted: {}", info.encrypted);
                println!("Size:      {} bytes", info.size_bytes);
                if let Some((w, h)) = info.first_page_size {
                    println!(
                        "Page 1:    {:.1} x {:.1} mm ({:.1} x {:.1} pt)",
                        pt_to_mm(w),
                        pt_to_mm(h),
                        w,
                        h
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_summary(report: &ConversionReport, output: &std::path::Path) {
    let outcome = match report.outcome {
        DocumentOutcome::FullLayout => "four-up layout",
        DocumentOutcome::FallbackLayout => "fallback layout (half-scale pages)",
        DocumentOutcome::Blank => "blank page",
    };
    println!("Wrote {} ({}, {} pages)", output.display(), outcome, report.output_pages);

    if let Some(pages) = report.source_pages {
        println!("Source pages: {}", pages);
    }
    if report.outcome == DocumentOutcome::FullLayout {
        let counts = report.cell_counts();
        println!(
            "Cells: {} rendered, {} placeholders, {} errors",
            counts.rendered, counts.placeholder, counts.error
        );
    }
    if let Some(reason) = &report.fallback_reason {
        println!("Reason: {}", reason);
    }
}

fn describe_degradation(report: &ConversionReport) -> String {
    match report.outcome {
        DocumentOutcome::FullLayout => {
            let counts = report.cell_counts();
            if counts.error > 0 {
                format!("{} page(s) could not be rendered", counts.error)
            } else {
                format!("{} page(s) drawn as placeholders", counts.placeholder)
            }
        }
        DocumentOutcome::FallbackLayout => "grid layout failed, wrote half-scale pages".into(),
        DocumentOutcome::Blank => "source unreadable, wrote a blank page".into(),
    }
}

/// Layout constants in both units
#[derive(Serialize)]
struct GeometryView {
    page_mm: (f32, f32),
    cell_mm: (f32, f32),
    grid_mm: (f32, f32),
    start_mm: (f32, f32),
    scale: f32,
    points: LayoutGeometry,
}

impl From<&LayoutGeometry> for GeometryView {
    fn from(g: &LayoutGeometry) -> Self {
        let mm = |a: f32, b: f32| (pt_to_mm(a), pt_to_mm(b));
        Self {
            page_mm: mm(g.page_width, g.page_height),
            cell_mm: mm(g.cell_width, g.cell_height),
            grid_mm: mm(g.total_width, g.total_height),
            start_mm: mm(g.start_x, g.start_y),
            scale: g.scale,
            points: *g,
        }
    }
}

fn print_geometry(g: &LayoutGeometry) {
    let rows = [
        ("Page", g.page_width, g.page_height),
        ("Source page", g.source_width, g.source_height),
        ("Cell", g.cell_width, g.cell_height),
        ("Grid", g.total_width, g.total_height),
    ];
    for (name, w, h) in rows {
        println!(
            "{:<12} {:>6.1} x {:>6.1} mm  ({:.2} x {:.2} pt)",
            name,
            pt_to_mm(w),
            pt_to_mm(h),
            w,
            h
        );
    }
    println!(
        "{:<12} ({:.1}, {:.1}) mm  ({:.2}, {:.2} pt)",
        "Start",
        pt_to_mm(g.start_x),
        pt_to_mm(g.start_y),
        g.start_x,
        g.start_y
    );
    println!("{:<12} {:.3}", "Scale", g.scale);
}
