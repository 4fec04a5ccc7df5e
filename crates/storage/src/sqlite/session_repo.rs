use std::time::Duration;

use checkin_core::model::{ClassId, ClassSession, SessionKey, SessionStatus};
use tokio::time::MissedTickBehavior;

use super::SqliteRepository;
use super::mapping::{conn, map_session_row};
use crate::feed::{SessionChangeSender, SessionWatch};
use crate::repository::{SessionFeed, SessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    class_id, checkin_no, status, access_code, opened_at,
    question_no, question_text, question_show
";

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<ClassSession>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM checkin_sessions WHERE class_id = ?1 AND checkin_no = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(key.class_id.as_str())
            .bind(i64::from(key.checkin_no.value()))
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn list_sessions(
        &self,
        class_id: &ClassId,
        status: SessionStatus,
    ) -> Result<Vec<ClassSession>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM checkin_sessions
             WHERE class_id = ?1 AND status = ?2
             ORDER BY checkin_no ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(class_id.as_str())
            .bind(status.code())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }

    async fn upsert_session(&self, session: &ClassSession) -> Result<(), StorageError> {
        let question = session.current_question();
        let question_no = question
            .and_then(|q| q.question_no)
            .map(|no| i64::from(no.value()));
        let question_text = question.and_then(|q| q.text.clone());
        let question_show = i64::from(question.is_some_and(|q| q.visible));

        sqlx::query(
            r"
                INSERT INTO checkin_sessions (
                    class_id, checkin_no, status, access_code, opened_at,
                    question_no, question_text, question_show
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(class_id, checkin_no) DO UPDATE SET
                    status = excluded.status,
                    access_code = excluded.access_code,
                    opened_at = excluded.opened_at,
                    question_no = excluded.question_no,
                    question_text = excluded.question_text,
                    question_show = excluded.question_show
            ",
        )
        .bind(session.key().class_id.as_str())
        .bind(i64::from(session.key().checkin_no.value()))
        .bind(session.status().code())
        .bind(session.access_code())
        .bind(session.opened_at())
        .bind(question_no)
        .bind(question_text)
        .bind(question_show)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM checkin_sessions WHERE class_id = ?1 AND checkin_no = ?2")
            .bind(key.class_id.as_str())
            .bind(i64::from(key.checkin_no.value()))
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionFeed for SqliteRepository {
    /// `SQLite` has no change notifications, so each watcher gets its own
    /// polling task. The task stops once the watcher is dropped.
    async fn watch_session(&self, key: &SessionKey) -> Result<SessionWatch, StorageError> {
        let (tx, watch) = SessionWatch::channel(key.clone());
        let repo = self.clone();
        let key = key.clone();
        let period = self.poll_interval;
        tokio::spawn(async move { repo.poll_session(key, tx, period).await });
        Ok(watch)
    }
}

impl SqliteRepository {
    async fn poll_session(self, key: SessionKey, tx: SessionChangeSender, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<Option<ClassSession>> = None;

        loop {
            tokio::select! {
                () = tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let change = match self.get_session(&key).await {
                Ok(snapshot) if last.as_ref() == Some(&snapshot) => continue,
                Ok(snapshot) => {
                    last = Some(snapshot.clone());
                    Ok(snapshot)
                }
                Err(err) => Err(err),
            };
            if tx.send(change).is_err() {
                break;
            }
        }

        tracing::debug!(session = %key, "session poller stopped");
    }
}
