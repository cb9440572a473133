mod buckets;
mod cli;
mod commands;
mod config;
mod context;
mod events;
mod grid;
mod item;
mod layout;
mod model;
mod offset;
mod section;
mod storage;
mod today;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let (config, config_source) = config::Config::load()?;
    let command = args.command.unwrap_or(cli::Command::Tui {
        range: None,
        zoom: None,
    });
    let level = match args.verbose {
        0 => config.level_filter(),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    init_logging(level, matches!(command, cli::Command::Tui { .. }))?;
    info!("{}", config_source);

    match command {
        cli::Command::Init { name } => commands::init(name),
        cli::Command::List { group } => commands::list(&config, group),
        cli::Command::Add {
            name,
            start,
            end,
            group,
            weight,
            meta,
        } => commands::add(name, start, end, group, weight, meta),
        cli::Command::Move {
            feature_id,
            start,
            end,
        } => commands::move_feature(feature_id, start, end),
        cli::Command::Offset {
            date,
            range,
            zoom,
            origin,
        } => commands::offset(&config, date, range, zoom, origin),
        cli::Command::Buckets => commands::buckets(&config),
        cli::Command::Tui { range, zoom } => commands::tui(&config, range, zoom),
    }
}

/// The TUI owns the terminal, so it logs to a file in the data directory.
fn init_logging(level: LevelFilter, to_file: bool) -> Result<()> {
    let log_config = ConfigBuilder::new()
        .add_filter_allow_str("ganttline")
        .build();
    if to_file {
        let dir = storage::project_dirs()?.data_dir().to_path_buf();
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("ganttline.log"))
            .context("opening log file")?;
        WriteLogger::init(level, log_config, file).context("initialising logger")?;
    } else {
        TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto)
            .context("initialising logger")?;
    }
    Ok(())
}
