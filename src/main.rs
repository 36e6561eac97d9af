use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_stream::StreamExt;

use voice_journal::config::Config;
use voice_journal::database::AppDatabase;
use voice_journal::db::{self, DynError};
use voice_journal::model::{decode_segments, Recording, Transcription, TranscriptionStatus};
use voice_journal::monitor::ingest_wav;
use voice_journal::repository::RecordingRepository;
use voice_journal::storage::StorageManager;

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture, store and search voice recordings and their transcriptions")]
struct Args {
    /// Path to config file (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and the recordings directory tree
    Init,
    /// Register an existing WAV file as a pending recording
    Add {
        /// Path to the WAV file
        file: PathBuf,
    },
    /// List recordings, newest first (or oldest first when filtering by status)
    List {
        /// Only show recordings in this status (pending, processing, completed, failed)
        #[arg(short, long)]
        status: Option<TranscriptionStatus>,
    },
    /// Show a recording and its transcription as JSON
    Show { id: i64 },
    /// Change the transcription status of a recording
    SetStatus {
        id: i64,
        status: TranscriptionStatus,
    },
    /// Store a transcription for a recording and mark it completed
    Transcribe {
        id: i64,
        /// Transcribed text
        #[arg(short, long)]
        text: String,
        /// Language code (e.g. en, zh)
        #[arg(short, long)]
        language: Option<String>,
        /// Segment data as JSON (default: [])
        #[arg(short, long, default_value = "[]")]
        segments: String,
    },
    /// Search transcription text
    Search { keyword: String },
    /// List transcriptions created within a time window (Unix ms, inclusive)
    Range {
        #[arg(long)]
        start: i64,
        #[arg(long)]
        end: i64,
    },
    /// List recordings past their deletion time
    Expired,
    /// Delete a recording, its audio file and its transcription
    Delete { id: i64 },
    /// Remove expired recordings, failed files and orphaned audio
    Cleanup,
    /// Show storage and recording statistics
    Info,
    /// Delete every recording and audio file
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Detect speech in a WAV file and store each detected recording
    Ingest { file: PathBuf },
    /// Print the recording list (or a transcription search) whenever it changes
    Watch {
        /// Watch transcriptions matching this keyword instead of recordings
        #[arg(short, long)]
        keyword: Option<String>,
    },
}

fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn print_recording(recording: &Recording) {
    println!(
        "{:>6}  {:<10}  {:>5}s  {:>9} B  {}  {}",
        recording.id,
        recording.transcription_status,
        recording.duration,
        recording.file_size,
        format_timestamp(recording.created_at),
        recording.file_path
    );
}

fn print_transcription(transcription: &Transcription) {
    println!(
        "{:>6}  rec {:<6}  {}  [{}]  {}",
        transcription.id,
        transcription.recording_id,
        format_timestamp(transcription.created_at),
        transcription.language.as_deref().unwrap_or("-"),
        transcription.text
    );
}

fn load_config(args: &Args) -> Result<Config, DynError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), DynError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let pool = db::open_and_init(&config.data_dir, &config.database_name).await?;
    let database = AppDatabase::new(pool);
    let repository = RecordingRepository::new(&database, config.retention_days)
        .with_sample_rate(config.recorder.sample_rate);
    let storage = StorageManager::new(
        config.recordings_dir(),
        repository.clone(),
        config.min_available_space_mb,
    );
    storage.init()?;

    match args.command {
        Command::Init => {
            println!("Initialized {}", config.data_dir.display());
        }
        Command::Add { file } => {
            let id = repository.save_recording(&file).await?;
            println!("Saved recording {}", id);
        }
        Command::List { status } => {
            let recordings = match status {
                Some(status) => repository.get_recordings_by_status(status).await?,
                None => repository.get_all_recordings().await?,
            };
            for recording in &recordings {
                print_recording(recording);
            }
            println!("{} recordings", recordings.len());
        }
        Command::Show { id } => {
            let recording = repository
                .get_recording_by_id(id)
                .await?
                .ok_or_else(|| format!("Recording {} not found", id))?;
            let transcription = repository.get_transcription_by_recording_id(id).await?;
            let output = serde_json::json!({
                "recording": recording,
                "transcription": transcription,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::SetStatus { id, status } => {
            if repository.get_recording_by_id(id).await?.is_none() {
                return Err(format!("Recording {} not found", id).into());
            }
            let transcribed_at = (status == TranscriptionStatus::Completed)
                .then(voice_journal::repository::now_ms);
            repository
                .update_transcription_status(id, status, transcribed_at)
                .await?;
            println!("Recording {} is now {}", id, status);
        }
        Command::Transcribe {
            id,
            text,
            language,
            segments,
        } => {
            decode_segments(&segments)
                .map_err(|e| format!("Invalid segments JSON: {}", e))?;
            let transcription_id = repository
                .save_transcription(id, &text, language.as_deref(), &segments)
                .await?;
            println!("Saved transcription {} for recording {}", transcription_id, id);
        }
        Command::Search { keyword } => {
            let results = repository.search_transcriptions_once(&keyword).await?;
            for transcription in &results {
                print_transcription(transcription);
            }
            println!("{} matches", results.len());
        }
        Command::Range { start, end } => {
            let results = repository
                .get_transcriptions_by_date_range(start, end)
                .await?;
            for transcription in &results {
                print_transcription(transcription);
            }
            println!("{} transcriptions", results.len());
        }
        Command::Expired => {
            let expired = repository.get_expired_recordings().await?;
            for recording in &expired {
                print_recording(recording);
            }
            println!("{} expired recordings", expired.len());
        }
        Command::Delete { id } => {
            let recording = repository
                .get_recording_by_id(id)
                .await?
                .ok_or_else(|| format!("Recording {} not found", id))?;
            repository.delete_recording(&recording).await?;
            println!("Deleted recording {}", id);
        }
        Command::Cleanup => {
            let result = storage.perform_cleanup().await?;
            println!(
                "Cleaned {} files, freed {} MB",
                result.deleted_files,
                result.freed_space_mb()
            );
        }
        Command::Info => {
            let info = storage.storage_info().await?;
            let stats = repository.get_statistics().await?;
            println!("Recordings directory: {}", storage.recordings_dir().display());
            println!("Available space: {} MB", info.available_space_mb);
            println!("Used space: {} MB", info.used_space_mb);
            println!(
                "Recordings: {} ({} pending), {} min, {} MB",
                stats.total_count,
                stats.pending_count,
                stats.total_duration_minutes(),
                stats.total_size_mb()
            );
            if !info.has_enough_space {
                println!(
                    "Warning: less than {} MB available",
                    config.min_available_space_mb
                );
            }
        }
        Command::Clear { yes } => {
            if !yes {
                return Err("Refusing to clear all data without --yes".into());
            }
            storage.clear_all_data().await?;
            println!("All data cleared");
        }
        Command::Ingest { file } => {
            if !storage.has_enough_space() {
                log::warn!(
                    "Less than {} MB available for recordings",
                    config.min_available_space_mb
                );
            }
            let ids = ingest_wav(&file, &config, repository.clone()).await?;
            println!("Stored {} recordings: {:?}", ids.len(), ids);
        }
        Command::Watch { keyword } => match keyword {
            Some(keyword) => {
                let mut stream = repository.search_transcriptions(&keyword);
                loop {
                    tokio::select! {
                        next = stream.next() => match next {
                            Some(results) => {
                                println!("--- {} matches for '{}'", results.len(), keyword);
                                for transcription in &results {
                                    print_transcription(transcription);
                                }
                            }
                            None => break,
                        },
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
            }
            None => {
                let mut stream = repository.observe_recordings();
                loop {
                    tokio::select! {
                        next = stream.next() => match next {
                            Some(recordings) => {
                                println!("--- {} recordings", recordings.len());
                                for recording in &recordings {
                                    print_recording(recording);
                                }
                            }
                            None => break,
                        },
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
            }
        },
    }

    Ok(())
}
