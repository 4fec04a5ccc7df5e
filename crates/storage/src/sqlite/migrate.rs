use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Schema mirroring the document hierarchy:
/// `classroom/{id}` → `classrooms`, `classroom/{id}/students/{uid}` → `class_members`,
/// `users/{uid}` → `profiles`, `users/{uid}/classroom/{id}` → `enrollments`,
/// `classroom/{id}/checkin/{no}` → `checkin_sessions`, its `students/{uid}` →
/// `checkins`, its `answers/{q}/students/{uid}` → `answers`, plus the device-local
/// `local_cache`.
const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS classrooms (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS class_members (
            class_id TEXT NOT NULL,
            uid TEXT NOT NULL,
            student_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            PRIMARY KEY (class_id, uid)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS profiles (
            uid TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            uid TEXT NOT NULL,
            class_id TEXT NOT NULL,
            status INTEGER NOT NULL,
            PRIMARY KEY (uid, class_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS checkin_sessions (
            class_id TEXT NOT NULL,
            checkin_no INTEGER NOT NULL CHECK (checkin_no >= 0),
            status INTEGER NOT NULL,
            access_code TEXT NOT NULL,
            opened_at TEXT NOT NULL,
            question_no INTEGER,
            question_text TEXT,
            question_show INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (class_id, checkin_no)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_checkin_sessions_class_status
            ON checkin_sessions (class_id, status, checkin_no);
    ",
    r"
        CREATE TABLE IF NOT EXISTS checkins (
            class_id TEXT NOT NULL,
            checkin_no INTEGER NOT NULL,
            uid TEXT NOT NULL,
            student_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            remark TEXT NOT NULL,
            PRIMARY KEY (class_id, checkin_no, uid)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS answers (
            class_id TEXT NOT NULL,
            checkin_no INTEGER NOT NULL,
            question_no INTEGER NOT NULL,
            uid TEXT NOT NULL,
            student_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            answer_text TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            PRIMARY KEY (class_id, checkin_no, question_no, uid)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS local_cache (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    ",
];

/// Runs the versioned migrations for the current schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(1_i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied sqlite migration");
    }

    Ok(())
}
