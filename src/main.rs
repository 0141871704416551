//! The `carvekit` command-line entry point.
//!
//! Thin glue only: reads a job description, loads the height-map image,
//! hands both to the carving core, and writes the G-code file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

use carvekit::{do_machining, MachiningConfig, ProgramStats};

/// A machining job as stored on disk: the full machining configuration plus
/// the path of the height-map image it applies to.
#[derive(Debug, Serialize, Deserialize)]
struct MachiningJob {
    #[serde(default)]
    image: PathBuf,
    #[serde(flatten)]
    config: MachiningConfig,
}

#[derive(Debug, Parser)]
#[command(name = "carvekit", version = carvekit::VERSION)]
#[command(about = "Carve grayscale height maps into 3-axis CNC G-code.")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate G-code for a machining job.
    Carve {
        /// Job description (JSON).
        job: PathBuf,
        /// Height-map image; overrides the one named in the job file.
        #[arg(long)]
        image: Option<PathBuf>,
        /// Output G-code file. Defaults to the job file name with a `.nc`
        /// extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    carvekit::init_logging()?;

    let cli = Cli::parse();
    match cli.cmd {
        Command::Carve { job, image, output } => carve(&job, image.as_deref(), output.as_deref()),
    }
}

fn carve(job_path: &Path, image: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let job_text = std::fs::read_to_string(job_path)
        .with_context(|| format!("read job file: {}", job_path.display()))?;
    let job: MachiningJob = serde_json::from_str(&job_text)
        .with_context(|| format!("parse job file: {}", job_path.display()))?;

    let image_path = image.unwrap_or(&job.image);
    if image_path.as_os_str().is_empty() {
        bail!("no height-map image given in the job file or on the command line");
    }

    let height_map = image::open(image_path)
        .with_context(|| format!("load height map: {}", image_path.display()))?
        .to_luma16();

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| job_path.with_extension("nc"));
    let file = File::create(&output_path)
        .with_context(|| format!("create output file: {}", output_path.display()))?;

    info!(
        job = %job_path.display(),
        image = %image_path.display(),
        output = %output_path.display(),
        "generating G-code"
    );

    let mut writer = BufWriter::new(file);
    do_machining(&job.config, &height_map, &mut writer)
        .with_context(|| format!("machining failed, partial output in {}", output_path.display()))?;
    writer.flush().context("flush output file")?;

    let gcode = std::fs::read_to_string(&output_path).context("re-read generated G-code")?;
    let stats = ProgramStats::from_gcode(&gcode);
    info!(
        lines = stats.lines,
        cutting_mm = stats.cutting_distance,
        deepest_z = stats.min_z,
        estimated_min = stats.estimated_seconds / 60.0,
        "G-code written"
    );

    Ok(())
}
