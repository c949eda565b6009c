// CLI entry point for the tunesmith level synthesizer.
//
// Reads a JSON build request (or a MIDI file), runs one of the two core
// pipelines, and writes the JSON result. Diagnostics ride inside the result;
// the exit status is 0 when the build succeeded, 2 when it finished with
// error diagnostics, and 1 when it could not run at all. Logging goes to
// stderr through `tracing-subscriber`, filtered by `RUST_LOG` (default
// `warn`).
//
// Usage:
//   tunesmith [--catalog <game-data.json>] [--out <result.json>] [--preview] <COMMAND>
//     looping <request.json>        Build a looping contraption
//     traditional <request.json>    Build a traditional note-block level
//     import-midi <file.mid>        Print a traditional request built from MIDI
//       --tempo-override <BPM>
//       --level-width <N> --level-height <N> --lowest-row <N>

mod error;
mod midi_import;

use clap::{Parser, Subcommand};
use error::{CliError, Result, read_file};
use midi_import::ImportOptions;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tunesmith_core::{
    GameData, LevelBounds, LoopingOptimizer, LoopingRequest, OptimizationResult, TraditionalOptimizer,
    TraditionalRequest,
};

#[derive(Debug, Parser)]
#[command(name = "tunesmith", version, about = "Turn notes into playable levels")]
struct Cli {
    /// Game data override (JSON). Missing fields keep their defaults.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Write output here instead of stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Draw the built level on stderr.
    #[arg(long, global = true)]
    preview: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a looping contraption from a request file.
    Looping { request: PathBuf },
    /// Build a traditional note-block level from a request file.
    Traditional { request: PathBuf },
    /// Convert a MIDI file into a traditional request.
    ImportMidi {
        file: PathBuf,
        #[arg(long)]
        tempo_override: Option<f64>,
        #[arg(long, default_value_t = 240)]
        level_width: i32,
        #[arg(long, default_value_t = 27)]
        level_height: i32,
        /// Row of the lowest key in the file.
        #[arg(long, default_value_t = 2)]
        lowest_row: i32,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{e}");
            eprintln!("tunesmith: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the build succeeded.
fn run(cli: &Cli) -> Result<bool> {
    let data = load_game_data(cli.catalog.as_deref())?;
    match &cli.command {
        Command::Looping { request } => {
            let request: LoopingRequest = read_json(request)?;
            let result = LoopingOptimizer::new(&data).build(&request)?;
            finish(cli, &result)
        }
        Command::Traditional { request } => {
            let request: TraditionalRequest = read_json(request)?;
            let result = TraditionalOptimizer::new(&data).build(&request)?;
            finish(cli, &result)
        }
        Command::ImportMidi {
            file,
            tempo_override,
            level_width,
            level_height,
            lowest_row,
        } => {
            let options = ImportOptions {
                tempo_override: *tempo_override,
                level: LevelBounds::new(*level_width, *level_height),
                lowest_row: *lowest_row,
            };
            let request = midi_import::import(&read_file(file)?, &options)?;
            write_json(cli.out.as_deref(), &request)?;
            Ok(true)
        }
    }
}

fn load_game_data(path: Option<&Path>) -> Result<GameData> {
    match path {
        Some(path) => {
            let text = String::from_utf8_lossy(&read_file(path)?).into_owned();
            let data = GameData::from_json(&text)?;
            info!(path = %path.display(), "loaded game data override");
            Ok(data)
        }
        None => Ok(GameData::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_file(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn finish(cli: &Cli, result: &OptimizationResult) -> Result<bool> {
    info!(
        succeeded = result.succeeded,
        diagnostics = result.diagnostics.len(),
        errors = result.errors().count(),
        width = result.summary.width,
        "build finished"
    );
    if cli.preview {
        eprint!("{}", result.tiles.ascii());
    }
    write_json(cli.out.as_deref(), result)?;
    Ok(result.succeeded)
}

fn write_json<T: Serialize>(out: Option<&Path>, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, text + "\n").map_err(CliError::Write),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}")?;
            Ok(())
        }
    }
}
