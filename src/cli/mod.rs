use clap::{Parser, Subcommand};

/// Progressive caching and streaming pipeline for long seismic waveform windows.
#[derive(Parser)]
#[command(name = "seismic-stream-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default).
    Serve,

    /// Print the day index for a station/date, for debugging cache state.
    ShowDayIndex {
        #[arg(long)]
        network: String,
        #[arg(long)]
        station: String,
        #[arg(long, default_value = "--")]
        location: String,
        #[arg(long)]
        channel: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        #[arg(long)]
        grouping: Option<String>,
    },
}
