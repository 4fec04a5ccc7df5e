use std::path::{Path, PathBuf};
use std::time::Duration;

use checkin_core::model::StudentUid;
use clap::{Parser, Subcommand};
use services::SignedInUser;

pub const DEFAULT_DB_URL: &str = "sqlite://attendance.sqlite3";

/// Command-line configuration. Every global flag falls back to an environment
/// variable.
#[derive(Debug, Parser)]
#[command(name = "attend", about = "Classroom check-in and live question client")]
pub struct AppConfig {
    /// `SQLite` database URL or path.
    #[arg(long = "db", env = "ATTEND_DB_URL", default_value = DEFAULT_DB_URL, global = true)]
    pub db_url: String,

    /// Uid of the signed-in student.
    #[arg(long, env = "ATTEND_UID", global = true)]
    pub uid: Option<String>,

    /// Poll interval for session changes, in milliseconds.
    #[arg(
        long = "poll-ms",
        env = "ATTEND_POLL_MS",
        default_value_t = 500,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub poll_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Join a class by id.
    Join { class_id: String },
    /// List the classes you are registered in.
    Classes,
    /// List open check-in sessions of a class.
    Sessions { class_id: String },
    /// Check in to a session.
    Checkin {
        class_id: String,
        checkin_no: String,
        code: String,
        #[arg(long, default_value = "")]
        remark: String,
    },
    /// Answer the question currently shown in a session.
    Answer {
        class_id: String,
        checkin_no: u32,
        question_no: u32,
        text: String,
        /// How long to wait for the question to be shown, in milliseconds.
        #[arg(long = "wait-ms", default_value_t = 2000)]
        wait_ms: u64,
    },
    /// Follow question broadcasts for a class until interrupted.
    Watch { class_id: String },
    /// Write demo data: a class, a profile for `--uid`, and an open session.
    Seed {
        #[arg(long, default_value = "C1")]
        class_id: String,
        #[arg(long, default_value_t = 1)]
        checkin_no: u32,
        #[arg(long, default_value = "ABCD")]
        code: String,
        /// Show this question (as number 1) in the seeded session.
        #[arg(long)]
        question: Option<String>,
        #[arg(long, default_value = "6400000")]
        student_id: String,
        #[arg(long, default_value = "Demo")]
        first_name: String,
        #[arg(long, default_value = "Student")]
        last_name: String,
    },
}

#[derive(Debug)]
pub struct ConfigError(String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    #[must_use]
    pub fn database_url(&self) -> String {
        normalize_sqlite_url(&self.db_url)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    /// The signed-in user, or a signed-out identity when no uid is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the uid is blank.
    pub fn identity(&self) -> Result<SignedInUser, ConfigError> {
        match self.uid.as_deref() {
            None => Ok(SignedInUser::signed_out()),
            Some(raw) => StudentUid::new(raw)
                .map(SignedInUser::signed_in)
                .map_err(|_| ConfigError(format!("invalid --uid value: {raw:?}"))),
        }
    }
}

pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its directory exist before connecting.
///
/// # Errors
///
/// Returns an error for a malformed URL or when the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError(format!("invalid --db value: {db_url}")))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError(format!("invalid --db value: {db_url}")).into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
