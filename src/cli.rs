use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ganttline", version, about = "Terminal Gantt timeline for scheduled content")]
pub struct Cli {
    /// Log more (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a features file in the current directory
    Init {
        /// Optional name for the feature set
        #[arg(long)]
        name: Option<String>,
    },
    /// List features with their timeline offsets
    List {
        /// Only show features in this group
        #[arg(long)]
        group: Option<String>,
    },
    /// Add a new feature
    Add {
        /// Display name
        name: String,
        /// Start date in YYYY-MM-DD format
        #[arg(long)]
        start: String,
        /// Optional end date in YYYY-MM-DD format
        #[arg(long)]
        end: Option<String>,
        /// Group label
        #[arg(long)]
        group: Option<String>,
        /// Weight used for colour coding
        #[arg(long)]
        weight: Option<f64>,
        /// Extra metadata as key=value (repeatable)
        #[arg(long = "meta", short = 'm')]
        meta: Vec<String>,
    },
    /// Move a feature to new dates
    Move {
        /// Feature id to move
        feature_id: String,
        /// New start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// New end date (YYYY-MM-DD); keeps the length when omitted
        #[arg(long)]
        end: Option<String>,
    },
    /// Print the timeline offset of a date
    Offset {
        /// Date in YYYY-MM-DD format
        date: String,
        /// daily, weekly, monthly, quarterly or yearly
        #[arg(long)]
        range: Option<String>,
        /// Zoom percentage
        #[arg(long)]
        zoom: Option<u32>,
        /// Timeline origin; defaults to six months before today
        #[arg(long)]
        origin: Option<String>,
    },
    /// Print the weight quartiles and each feature's bucket
    Buckets,
    /// Launch the interactive timeline
    Tui {
        /// daily, weekly, monthly, quarterly or yearly
        #[arg(long)]
        range: Option<String>,
        /// Zoom percentage
        #[arg(long)]
        zoom: Option<u32>,
    },
}
