use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use gerber_merge::board::LayerSummary;
use gerber_merge::geometry::BBox;
use gerber_merge::{Board, MergeError, ReconcileReport};
use log::{error, info};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "gerber-merge",
    about = "Normalize Gerber/Excellon board outputs to one origin and extent"
)]
struct Cli {
    /// Prefix for output files; each layer is written to <prefix><extension>
    output_prefix: PathBuf,

    /// Directories holding one board's fabrication files each
    #[arg(required = true)]
    board_dirs: Vec<PathBuf>,

    /// Quarter turn applied after normalization
    #[arg(long, value_enum, default_value_t = Rotation::Ccw)]
    rotate: Rotation,

    /// Print a JSON summary of each board to stdout
    #[arg(long)]
    report: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Rotation {
    Ccw,
    Cw,
    None,
}

#[derive(Serialize)]
struct BoardReport {
    source: PathBuf,
    outputs: Vec<PathBuf>,
    bbox: Option<BBox>,
    reconcile: Option<ReconcileReport>,
    layers: Vec<LayerSummary>,
}

/// Output prefix for one board; the directory name keeps boards apart.
fn board_prefix(prefix: &Path, dir: &Path, several: bool) -> PathBuf {
    if !several {
        return prefix.to_path_buf();
    }
    let mut name = prefix.as_os_str().to_owned();
    if let Some(dir_name) = dir.file_name() {
        name.push("-");
        name.push(dir_name);
    }
    PathBuf::from(name)
}

fn process(dir: &Path, prefix: &Path, rotation: Rotation) -> Result<BoardReport, MergeError> {
    info!("Board {}", dir.display());
    let mut board = Board::load(dir)?;
    let reconcile = board.reconcile();
    match rotation {
        Rotation::Ccw => board.rotate90ccw(),
        Rotation::Cw => board.rotate90cw(),
        Rotation::None => {}
    }
    let outputs = board.save(prefix)?;
    Ok(BoardReport {
        source: dir.to_path_buf(),
        outputs,
        bbox: board.bbox,
        reconcile,
        layers: board.summary(),
    })
}

fn print_report(reports: &[BoardReport], pretty: bool) -> Result<(), MergeError> {
    let json = if pretty {
        serde_json::to_string_pretty(reports)?
    } else {
        serde_json::to_string(reports)?
    };
    println!("{json}");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let several = cli.board_dirs.len() > 1;
    let mut reports = Vec::new();
    let mut failed = false;
    for dir in &cli.board_dirs {
        let prefix = board_prefix(&cli.output_prefix, dir, several);
        match process(dir, &prefix, cli.rotate) {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("{}: {e}", dir.display());
                failed = true;
            }
        }
    }

    if cli.report {
        if let Err(e) = print_report(&reports, cli.pretty) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    if failed {
        std::process::exit(1);
    }
}
