//! Command-line front end for Seen's local storage
//!
//! Stands in for the app's settings screen and startup gate:
//! - Turning encryption on and off
//! - Changing the PIN
//! - Writing and reading notes and PHQ-9 check-ins

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use seen_core::{Note, Phq9Assessment};
use seen_storage_sqlite::{
    Database, EncryptionSettingsManager, EncryptionState, FileKeystore, JsonPreferences,
    MigrationReport, Repository, StorageConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "seen")]
#[command(about = "Seen journal storage tool", long_about = None)]
struct Cli {
    /// Data directory (defaults to $SEEN_DATA_DIR, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// PIN for the encrypted store
    #[arg(long, global = true)]
    pin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show encryption state and where records live
    Status,

    /// Encrypt existing records under a new PIN
    Setup {
        /// New 4-6 digit PIN
        new_pin: String,
    },

    /// Move records back to the plaintext store
    Disable,

    /// Replace the PIN
    ChangePin {
        /// New 4-6 digit PIN
        new_pin: String,
    },

    /// Check the PIN without opening anything
    Unlock,

    /// Write a note
    AddNote {
        /// Note text
        content: String,

        /// Optional mood tag
        #[arg(short, long)]
        mood: Option<String>,
    },

    /// List notes, newest first
    ListNotes {
        /// Show at most this many
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete a note by id
    DeleteNote {
        /// Note id
        id: i64,
    },

    /// Record a PHQ-9 check-in
    Phq9 {
        /// Nine answers, each 0-3, comma separated
        #[arg(value_delimiter = ',', num_args = 9)]
        answers: Vec<u8>,
    },

    /// Show PHQ-9 history, newest first
    History,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = StorageConfig::load(cli.data_dir).context("Failed to load storage config")?;
    let keystore = Arc::new(FileKeystore::new(config.keystore_path()));
    let prefs = Arc::new(
        JsonPreferences::open(config.preferences_path()).context("Failed to open preferences")?,
    );
    let settings = EncryptionSettingsManager::from_config(&config, keystore, prefs)
        .context("Invalid storage config")?;

    let state = settings.startup()?;
    let pin = cli.pin.as_deref();

    match cli.command {
        Commands::Status => show_status(&settings, &config, state),
        Commands::Setup { new_pin } => {
            let report = settings.setup_encryption(&new_pin)?;
            print_report("Encryption enabled", &report);
            Ok(())
        }
        Commands::Disable => {
            let report = settings.disable_encryption(require_pin(pin)?)?;
            print_report("Encryption disabled", &report);
            Ok(())
        }
        Commands::ChangePin { new_pin } => {
            settings.change_pin(require_pin(pin)?, &new_pin)?;
            println!("PIN changed");
            Ok(())
        }
        Commands::Unlock => {
            if !settings.requires_pin_on_startup()? {
                println!("Encryption is {}; no PIN needed", state);
                return Ok(());
            }
            settings.unlock(require_pin(pin)?)?;
            println!("Unlocked");
            Ok(())
        }
        Commands::AddNote { content, mood } => {
            let db = open_records(&settings, pin)?;
            let note = Note::new(content, mood)?;
            let id = Repository::new(&db).insert_note(&note)?;
            println!("Saved note {}", id);
            Ok(())
        }
        Commands::ListNotes { limit } => {
            let db = open_records(&settings, pin)?;
            for note in Repository::new(&db).list_notes()?.into_iter().take(limit) {
                let mood = note.mood.as_deref().unwrap_or("-");
                println!(
                    "[{}] {} ({}) {}",
                    note.id.unwrap_or_default(),
                    format_timestamp(note.timestamp),
                    mood,
                    note.content
                );
            }
            Ok(())
        }
        Commands::DeleteNote { id } => {
            let db = open_records(&settings, pin)?;
            if !Repository::new(&db).delete_note(id)? {
                bail!("No note with id {}", id);
            }
            println!("Deleted note {}", id);
            Ok(())
        }
        Commands::Phq9 { answers } => {
            let assessment = Phq9Assessment::from_answers(&answers)?;
            let db = open_records(&settings, pin)?;
            let timestamp = chrono::Utc::now().timestamp_millis();
            Repository::new(&db).record_assessment(&assessment, timestamp)?;

            let severity = assessment.severity();
            println!("Score {} ({})", assessment.total_score(), severity);
            if severity.needs_follow_up() {
                println!("Consider talking to a clinician about these results.");
            }
            if assessment.self_harm_flag() {
                println!("If you are thinking about harming yourself, please reach out for help now.");
            }
            Ok(())
        }
        Commands::History => {
            let db = open_records(&settings, pin)?;
            for result in Repository::new(&db).list_phq9_results()? {
                println!(
                    "{}  {:>2}  {}",
                    format_timestamp(result.timestamp),
                    result.score,
                    result.level
                );
            }
            Ok(())
        }
    }
}

fn require_pin(pin: Option<&str>) -> Result<&str> {
    pin.context("This command needs --pin")
}

fn open_records(settings: &EncryptionSettingsManager, pin: Option<&str>) -> Result<Database> {
    let db = settings
        .open_active_database(pin)
        .context("Failed to open records (is --pin set?)")?;
    info!(
        "Using {} store at {}",
        if db.is_encrypted() { "encrypted" } else { "plaintext" },
        db.path().display()
    );
    Ok(db)
}

fn show_status(
    settings: &EncryptionSettingsManager,
    config: &StorageConfig,
    state: EncryptionState,
) -> Result<()> {
    println!("Encryption:        {}", state);
    println!("PIN on startup:    {}", settings.requires_pin_on_startup()?);
    println!("Data directory:    {}", config.data_dir.display());
    println!(
        "Plaintext store:   {}",
        if config.plain_db_path().exists() { "present" } else { "absent" }
    );
    println!(
        "Encrypted store:   {}",
        if config.encrypted_db_path().exists() { "present" } else { "absent" }
    );
    println!(
        "Plaintext records: {}",
        settings.migration().has_unencrypted_data()
    );
    Ok(())
}

fn print_report(heading: &str, report: &MigrationReport) {
    println!("{}", heading);
    println!("  notes:          {}", report.notes);
    println!("  phq9 results:   {}", report.phq9_results);
    println!("  phq9 responses: {}", report.phq9_responses);
    if !report.source_removed {
        println!("  warning: some old files could not be removed");
    }
}

fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => millis.to_string(),
    }
}
