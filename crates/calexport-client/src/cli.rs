//! Command-line interface definition.

use std::path::PathBuf;

use calexport_core::{ChannelPosition, DescriptionSource};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// calexport - export TV programs to your calendar
#[derive(Debug, Parser)]
#[command(name = "calexport")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALEXPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Path to the daemon socket
    #[arg(long, env = "CALEXPORT_SOCKET")]
    pub socket_path: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the plugin daemon in the foreground
    Serve,

    /// Show the calendar event a program would become
    Draft(ProgramArg),

    /// Show the context menu entries for a program
    Menu(ProgramArg),

    /// Export a program to the calendar and mark it
    Export(ProgramArg),

    /// Remove the calendar marking of a program
    Unmark(ProgramArg),

    /// List marked program ids
    Marked,

    /// Forget markings below the lowest program id still known (-1 forgets all)
    Prune {
        #[arg(allow_negative_numbers = true)]
        first_known_id: i64,

        /// Write the pruned set to the store immediately
        #[arg(long)]
        persist: bool,
    },

    /// Show plugin metadata
    Info,

    /// Check that the daemon is running
    Ping,

    /// Stop the daemon
    Stop,

    /// Export preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// A program read from a JSON file.
#[derive(Debug, Args)]
pub struct ProgramArg {
    /// JSON file describing the program (`-` for stdin)
    #[arg(long, short)]
    pub program: PathBuf,
}

/// Preference actions.
#[derive(Debug, Subcommand)]
pub enum PrefsAction {
    /// Print the stored preferences
    Show,

    /// Change stored preferences
    Set(PrefsUpdate),
}

/// Preference changes; omitted flags keep their stored value.
#[derive(Debug, Default, Args)]
pub struct PrefsUpdate {
    /// Which program description goes into the event
    #[arg(long, value_enum)]
    pub description: Option<DescriptionArg>,

    /// Put the channel name into the title
    #[arg(long, value_enum)]
    pub channel_in_title: Option<TitleChannelArg>,

    /// Put the channel name into the location
    #[arg(long)]
    pub channel_in_location: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DescriptionArg {
    Short,
    Full,
}

impl From<DescriptionArg> for DescriptionSource {
    fn from(arg: DescriptionArg) -> Self {
        match arg {
            DescriptionArg::Short => Self::Short,
            DescriptionArg::Full => Self::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TitleChannelArg {
    Off,
    Prefix,
    Suffix,
}

impl TitleChannelArg {
    /// Position of the channel name, `None` when it stays out of the title.
    pub fn position(self) -> Option<ChannelPosition> {
        match self {
            Self::Off => None,
            Self::Prefix => Some(ChannelPosition::Prefix),
            Self::Suffix => Some(ChannelPosition::Suffix),
        }
    }
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
