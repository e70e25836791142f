pub mod history;
pub mod report;
pub mod session;
pub mod watch;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{builder::TypedValueParser, Parser, Subcommand};
use history::{process_history_command, HistoryCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    session::SessionTracker,
    stats::DEFAULT_WEEKS,
    storage::{file_store::FileKeyValueStore, StorageKeys},
    store::RecordStore,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, create_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "ticklog", version, long_about = None)]
#[command(about = "Timer that records timed events and shows statistics about them", long_about = None)]
pub(crate) struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs into the console")]
    log: bool,
    #[arg(long = "log-filter", global = true, help = "Log level, e.g. debug or trace")]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start the timer")]
    Start {
        #[arg(short, long, help = "Notes attached to the session")]
        notes: Option<String>,
    },
    #[command(about = "Pause the running timer")]
    Pause,
    #[command(about = "Resume the paused timer")]
    Resume,
    #[command(about = "Stop the timer and save the session as a record")]
    Stop,
    #[command(about = "Replace notes of the active session")]
    Note { text: String },
    #[command(about = "Show the state of the timer")]
    Status,
    #[command(
        about = "Show a live timer and statistics. Type p to pause or resume, s to start or stop, n <text> to set notes, q to quit"
    )]
    Watch {
        #[command(flatten)]
        display: DisplayOptions,
    },
    #[command(about = "Show statistics and a heatmap of recent weeks")]
    Stats {
        #[command(flatten)]
        display: DisplayOptions,
    },
    #[command(about = "List records, newest first")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
    #[command(about = "Delete a record by its id")]
    Delete { id: String },
    #[command(about = "Delete all records")]
    Clear {
        #[arg(short, long, help = "Don't ask for confirmation")]
        yes: bool,
    },
    #[command(about = "Export all records as json")]
    Export {
        #[arg(
            short,
            long,
            default_value = history::DEFAULT_EXPORT_FILE,
            help = "Output file. Use - for stdout"
        )]
        output: PathBuf,
    },
    #[command(about = "Replace all records with records from a json file")]
    Import { file: PathBuf },
}

#[derive(Debug, Clone, Copy, clap::Args)]
pub struct DisplayOptions {
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_WEEKS,
        value_parser = clap::value_parser!(u16).range(1..=52).map(usize::from),
        help = "Number of weeks shown in the heatmap"
    )]
    pub weeks: usize,
    #[arg(long, help = "Disable colors")]
    pub plain: bool,
}

pub type SharedStore = Arc<FileKeyValueStore>;

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => create_dir(dir)?,
        None => create_application_default_path()?,
    };
    let logging_level = match (args.log_filter, args.log) {
        (Some(level), _) => Some(level),
        (None, true) => Some(LevelFilter::DEBUG),
        (None, false) => None,
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    let mut tracker = open_tracker(app_dir.join("data")).await?;

    match args.commands {
        Commands::Start { notes } => session::start(&mut tracker, notes).await,
        Commands::Pause => session::pause(&mut tracker).await,
        Commands::Resume => session::resume(&mut tracker).await,
        Commands::Stop => session::stop(&mut tracker).await,
        Commands::Note { text } => session::note(&mut tracker, text).await,
        Commands::Status => session::status(&tracker),
        Commands::Watch { display } => watch::process_watch_command(tracker, display).await,
        Commands::Stats { display } => {
            report::print_report(tracker.records(), display, &mut std::io::stdout()).await
        }
        Commands::History { command } => {
            process_history_command(tracker.records(), command).await
        }
        Commands::Delete { id } => history::delete(tracker.records(), &id).await,
        Commands::Clear { yes } => history::clear(tracker.records(), yes).await,
        Commands::Export { output } => history::export(tracker.records(), &output).await,
        Commands::Import { file } => history::import(tracker.records(), &file).await,
    }
}

/// Wires the storage, record store and session tracker together for a data directory.
pub async fn open_tracker(data_dir: PathBuf) -> Result<SessionTracker<SharedStore>> {
    let storage = Arc::new(FileKeyValueStore::new(data_dir)?);
    let keys = StorageKeys::default();
    let records = RecordStore::new(storage.clone(), keys.records);
    SessionTracker::restore(records, storage, keys.active_session, Box::new(DefaultClock)).await
}
