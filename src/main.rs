//! keywell: generate a printable ergonomic keyboard case.
//!
//! ```text
//! keywell generate --config case.toml --out build/   # case.stl + bottom_plate.stl
//! keywell params > case.toml                         # default parameters
//! keywell layout --config case.toml                  # key placements
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use keywell::case::{CaseParams, Generate, PlaceKeys};
use keywell::export::{write_stl, StlFormat};

#[derive(Parser)]
#[command(name = "keywell")]
#[command(about = "Parametric ergonomic keyboard case generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the case and bottom plate as STL files
    Generate {
        /// TOML parameter file (defaults apply to anything missing)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        /// Write ASCII STL instead of binary
        #[arg(long)]
        ascii: bool,
    },
    /// Print the default parameters as TOML
    Params,
    /// Print the placement of every key
    Layout {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Default: WARN for everything, INFO for keywell. RUST_LOG adds to it.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        .add_directive("keywell=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate { config, out, ascii } => {
            let format = if ascii { StlFormat::Ascii } else { StlFormat::Binary };
            generate(config.as_deref(), &out, format)?;
        }
        Commands::Params => {
            print!("{}", CaseParams::default().to_toml_string()?);
        }
        Commands::Layout { config } => {
            show_layout(config.as_deref())?;
        }
    }
    Ok(())
}

fn load_params(config: Option<&Path>) -> Result<CaseParams> {
    match config {
        Some(path) => CaseParams::from_path(path)
            .with_context(|| format!("loading parameters from {}", path.display())),
        None => Ok(CaseParams::default()),
    }
}

fn generate(config: Option<&Path>, out: &Path, format: StlFormat) -> Result<()> {
    let params = load_params(config)?;
    let generated = Generate::new(&params).execute().context("generating case")?;

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let case_path = out.join("case.stl");
    write_stl(&generated.case, &case_path, format)?;
    println!("wrote {}", case_path.display());
    if let Some(plate) = &generated.bottom_plate {
        let plate_path = out.join("bottom_plate.stl");
        write_stl(plate, &plate_path, format)?;
        println!("wrote {}", plate_path.display());
    }
    info!(steps = generated.summary.completed.len(), "done");
    Ok(())
}

fn show_layout(config: Option<&Path>) -> Result<()> {
    let params = load_params(config)?;
    let layout = PlaceKeys::new(&params).execute()?;
    println!("{:<12} {:>9} {:>9} {:>9}   {:>7} {:>7} {:>7}", "key", "x", "y", "z", "nx", "ny", "nz");
    for key in layout.iter() {
        let o = key.origin();
        let n = key.normal();
        println!(
            "{:<12} {:>9.3} {:>9.3} {:>9.3}   {:>7.3} {:>7.3} {:>7.3}",
            key.id.to_string(),
            o.x,
            o.y,
            o.z,
            n.x,
            n.y,
            n.z
        );
    }
    println!("{} keys", layout.len());
    Ok(())
}
