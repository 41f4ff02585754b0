//! # Placard CLI
//!
//! Command-line interface for template card rendering.
//!
//! ## Usage
//!
//! ```bash
//! # Render one card
//! placard render template.json -d recipient="Ada Lovelace" -o card.png
//!
//! # Render at explicit size and quality
//! placard render template.json --width 1600 --quality high
//!
//! # Batch render a job file into a directory
//! placard batch job.json --out-dir ./cards
//!
//! # Geometry only, as JSON
//! placard layout template.json --width 800
//!
//! # Start the HTTP server
//! placard serve --listen 0.0.0.0:8080 --fonts-dir ./fonts
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use placard::{
    PlacardError,
    assets::AssetStore,
    compose::font::FontLibrary,
    export::QualityTier,
    render::{RenderRequest, Renderer, batch, batch::BatchJob},
    server::{self, ServerConfig},
    template::{FormData, Template},
};

/// Placard - template overlay rendering engine
#[derive(Parser, Debug)]
#[command(name = "placard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one card from a template file and form values
    Render {
        /// Template JSON file
        template: PathBuf,

        /// Form values as name=value pairs
        #[arg(short = 'd', long = "data", value_name = "NAME=VALUE")]
        data: Vec<String>,

        /// Output file
        #[arg(short, long, default_value = "card.png")]
        output: PathBuf,

        /// Output width in pixels
        #[arg(long, default_value = "1000")]
        width: u32,

        /// Output height in pixels (background aspect ratio when omitted)
        #[arg(long)]
        height: Option<u32>,

        /// Quality tier: preview, medium or high
        #[arg(long, default_value = "high")]
        quality: String,

        /// Directory with TTF/OTF font files
        #[arg(long)]
        fonts_dir: Option<PathBuf>,

        /// Write SVG markup instead of PNG
        #[arg(long)]
        svg: bool,
    },

    /// Render many rows from a JSON job file
    Batch {
        /// Job JSON file: template, rows, size, quality, concurrency
        job: PathBuf,

        /// Output directory for row_NNNN.png files
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,

        /// Directory with TTF/OTF font files
        #[arg(long)]
        fonts_dir: Option<PathBuf>,
    },

    /// Resolve geometry without painting, as JSON
    Layout {
        /// Template JSON file
        template: PathBuf,

        /// Form values as name=value pairs
        #[arg(short = 'd', long = "data", value_name = "NAME=VALUE")]
        data: Vec<String>,

        /// Target width in pixels
        #[arg(long, default_value = "1000")]
        width: u32,

        /// Target height in pixels (background aspect ratio when omitted)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Start the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,

        /// Directory with TTF/OTF font files
        #[arg(long)]
        fonts_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PlacardError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            template,
            data,
            output,
            width,
            height,
            quality,
            fonts_dir,
            svg,
        } => {
            let template = Template::from_json(&std::fs::read_to_string(&template)?)?;
            let mut request = RenderRequest::new(template, parse_data(&data)?, width);
            request.target_height = height;
            request.quality = parse_quality(&quality)?;

            let renderer = build_renderer(fonts_dir.as_deref())?;
            if svg {
                let markup = renderer.render_svg(&request).await?;
                std::fs::write(&output, markup)?;
            } else {
                let bytes = renderer.render(&request).await?;
                std::fs::write(&output, bytes)?;
            }
            println!("Saved to {}", output.display());
        }

        Commands::Batch {
            job,
            out_dir,
            fonts_dir,
        } => {
            let job: BatchJob = serde_json::from_str(&std::fs::read_to_string(&job)?)
                .map_err(|e| PlacardError::InvalidRequest(format!("job file: {}", e)))?;

            let renderer = build_renderer(fonts_dir.as_deref())?;
            let report = batch::run(&renderer, &job, Some(&out_dir)).await?;

            println!(
                "Batch {}: {} succeeded, {} failed",
                report.job_id, report.succeeded, report.failed
            );
            for row in report.rows.iter().filter(|r| !r.success) {
                println!(
                    "  row {}: {}",
                    row.row,
                    row.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        Commands::Layout {
            template,
            data,
            width,
            height,
        } => {
            let template = Template::from_json(&std::fs::read_to_string(&template)?)?;
            let mut request = RenderRequest::new(template, parse_data(&data)?, width);
            request.target_height = height;

            let renderer = build_renderer(None)?;
            let resolution = renderer.resolve_layout(&request).await?;
            let json = serde_json::to_string_pretty(&resolution)
                .map_err(|e| PlacardError::InvalidRequest(e.to_string()))?;
            println!("{}", json);
        }

        Commands::Serve { listen, fonts_dir } => {
            server::serve(ServerConfig {
                listen_addr: listen,
                fonts_dir,
            })
            .await?;
        }
    }

    Ok(())
}

/// Parse repeated `name=value` arguments into form data.
fn parse_data(pairs: &[String]) -> Result<FormData, PlacardError> {
    let mut data = FormData::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(PlacardError::InvalidRequest(format!(
                "expected name=value, got {:?}",
                pair
            )));
        };
        data.set(name, value);
    }
    Ok(data)
}

fn parse_quality(s: &str) -> Result<QualityTier, PlacardError> {
    match s {
        "preview" => Ok(QualityTier::Preview),
        "medium" => Ok(QualityTier::Medium),
        "high" => Ok(QualityTier::High),
        other => Err(PlacardError::InvalidRequest(format!(
            "unknown quality tier {:?} (expected preview, medium or high)",
            other
        ))),
    }
}

fn build_renderer(fonts_dir: Option<&Path>) -> Result<Renderer, PlacardError> {
    let mut fonts = FontLibrary::new();
    if let Some(dir) = fonts_dir {
        let count = fonts.load_dir(dir)?;
        println!("Loaded {} font families from {}", count, dir.display());
    }
    Ok(Renderer::new(AssetStore::over_http()?, Arc::new(fonts)))
}
