use std::path::PathBuf;

use clap::Parser as ClapParser;

/// Command-line surface for the smpl compiler front end.
#[derive(Debug, ClapParser)]
#[command(name = "smplc", about = "Parses smpl source into SSA form")]
pub struct Cli {
    /// Source file to compile.
    pub input: PathBuf,

    /// Increase log verbosity; repeat for more detail (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write a Graphviz DOT rendering of the resulting CFG to this path
    /// instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
