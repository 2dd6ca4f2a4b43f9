use clap::{Parser, Subcommand, ValueEnum};
use pgn_tree::reader::{CompressionMode, PgnReader, expand_paths, open_input};
use pgn_tree::subgame::{self, SubGameOptions};
use pgn_tree::{Color, ExportOptions, Game, ParseOptions, export, repertoire, scan_headers};
use serde_json::{Map, Value};
use std::error::Error;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Parse, slice and export PGN game trees", long_about = None)]
struct Cli {
    /// Input compression; inferred from a `.zst` extension when omitted
    #[arg(long, global = true)]
    compression: Option<CompressionMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tags of every game as JSON, one object per line
    Headers {
        /// PGN file or glob pattern
        pattern: String,
    },
    /// Re-export a game as PGN
    Export {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        game: usize,
        #[arg(long)]
        no_headers: bool,
        #[arg(long)]
        no_comments: bool,
        #[arg(long)]
        no_variations: bool,
        /// Wrap width; 0 writes the movetext on one line
        #[arg(long, default_value_t = 80)]
        columns: usize,
        /// Fail on the first illegal move instead of truncating
        #[arg(long)]
        strict: bool,
    },
    /// Export main-line plies START..=END as a game of their own
    Subgame {
        file: PathBuf,
        #[arg(long)]
        start: usize,
        #[arg(long)]
        end: usize,
        #[arg(long, default_value_t = 1)]
        game: usize,
        #[arg(long)]
        variations: bool,
        #[arg(long)]
        renumber: bool,
    },
    /// List study positions for one side's repertoire
    Repertoire {
        file: PathBuf,
        #[arg(long, value_enum)]
        side: Side,
        #[arg(long, default_value_t = 1)]
        game: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("PGN_TREE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let compression = cli.compression;
    match cli.command {
        Command::Headers { pattern } => print_headers(&pattern, compression),
        Command::Export {
            file,
            game,
            no_headers,
            no_comments,
            no_variations,
            columns,
            strict,
        } => {
            let options = if strict {
                ParseOptions::strict()
            } else {
                ParseOptions::lenient()
            };
            let game = load_game(&file, compression, game, options)?;
            let export_options = ExportOptions {
                headers: !no_headers,
                comments: !no_comments,
                variations: !no_variations,
                columns: (columns > 0).then_some(columns),
            };
            println!("{}", export(&game, &export_options));
            Ok(())
        }
        Command::Subgame {
            file,
            start,
            end,
            game,
            variations,
            renumber,
        } => {
            let game = load_game(&file, compression, game, ParseOptions::default())?;
            let sub = subgame::extract_with(&game, start, end, SubGameOptions { variations, renumber })?;
            println!("{}", sub.to_pgn());
            Ok(())
        }
        Command::Repertoire { file, side, game } => {
            let game = load_game(&file, compression, game, ParseOptions::default())?;
            for entry in repertoire::extract(&game, side.into()) {
                println!("[FEN \"{}\"]\n{}\n", entry.fen, entry.move_text);
            }
            Ok(())
        }
    }
}

fn print_headers(pattern: &str, compression: Option<CompressionMode>) -> Result<(), Box<dyn Error>> {
    let paths = expand_paths(pattern)?;
    if paths.is_empty() {
        return Err(format!("no files match '{pattern}'").into());
    }

    for path in &paths {
        let mode = compression.unwrap_or_else(|| CompressionMode::for_path(path));
        let input = match open_input(path, mode) {
            Ok(input) => input,
            // A single explicit file must exist; glob matches are best effort.
            Err(e) if paths.len() == 1 => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "skipping file");
                continue;
            }
        };

        for headers in scan_headers(input) {
            let object: Map<String, Value> = headers?
                .iter()
                .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
                .collect();
            println!("{}", Value::Object(object));
        }
    }
    Ok(())
}

fn load_game(
    path: &Path,
    compression: Option<CompressionMode>,
    index: usize,
    options: ParseOptions,
) -> Result<Game, Box<dyn Error>> {
    if index == 0 {
        return Err("game numbers start at 1".into());
    }
    let mode = compression.unwrap_or_else(|| CompressionMode::for_path(path));
    let input = open_input(path, mode)?;
    let mut reader = PgnReader::with_options(BufReader::new(input), options);

    let mut games = reader.games();
    for _ in 1..index {
        if games.next().is_none() {
            break;
        }
    }
    match games.next() {
        Some(game) => Ok(game?),
        None => Err(format!("{} has no game #{index}", path.display()).into()),
    }
}
