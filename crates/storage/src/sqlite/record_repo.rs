use checkin_core::model::{
    AnswerDraft, AnswerRecord, CheckinDraft, CheckinRecord, QuestionNo, SessionKey, StudentUid,
};

use super::SqliteRepository;
use super::mapping::{conn, map_answer_row, map_checkin_row};
use crate::repository::{AnswerRepository, RosterRepository, StorageError};

#[async_trait::async_trait]
impl RosterRepository for SqliteRepository {
    async fn get_checkin(
        &self,
        key: &SessionKey,
        uid: &StudentUid,
    ) -> Result<Option<CheckinRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT class_id, checkin_no, uid, student_id, display_name, submitted_at, remark
                FROM checkins
                WHERE class_id = ?1 AND checkin_no = ?2 AND uid = ?3
            ",
        )
        .bind(key.class_id.as_str())
        .bind(i64::from(key.checkin_no.value()))
        .bind(uid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_checkin_row).transpose()
    }

    async fn put_checkin(&self, draft: CheckinDraft) -> Result<CheckinRecord, StorageError> {
        let record = draft.stamp(self.clock.now());
        sqlx::query(
            r"
                INSERT INTO checkins (
                    class_id, checkin_no, uid, student_id, display_name, submitted_at, remark
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(class_id, checkin_no, uid) DO UPDATE SET
                    student_id = excluded.student_id,
                    display_name = excluded.display_name,
                    submitted_at = excluded.submitted_at,
                    remark = excluded.remark
            ",
        )
        .bind(record.session.class_id.as_str())
        .bind(i64::from(record.session.checkin_no.value()))
        .bind(record.uid.as_str())
        .bind(&record.student_id)
        .bind(&record.display_name)
        .bind(record.submitted_at)
        .bind(&record.remark)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(record)
    }

    async fn list_checkins(&self, key: &SessionKey) -> Result<Vec<CheckinRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT class_id, checkin_no, uid, student_id, display_name, submitted_at, remark
                FROM checkins
                WHERE class_id = ?1 AND checkin_no = ?2
                ORDER BY submitted_at ASC, uid ASC
            ",
        )
        .bind(key.class_id.as_str())
        .bind(i64::from(key.checkin_no.value()))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_checkin_row).collect()
    }
}

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn put_answer(&self, draft: AnswerDraft) -> Result<AnswerRecord, StorageError> {
        let record = draft.stamp(self.clock.now());
        sqlx::query(
            r"
                INSERT INTO answers (
                    class_id, checkin_no, question_no, uid,
                    student_id, display_name, answer_text, submitted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(class_id, checkin_no, question_no, uid) DO UPDATE SET
                    student_id = excluded.student_id,
                    display_name = excluded.display_name,
                    answer_text = excluded.answer_text,
                    submitted_at = excluded.submitted_at
            ",
        )
        .bind(record.session.class_id.as_str())
        .bind(i64::from(record.session.checkin_no.value()))
        .bind(i64::from(record.question_no.value()))
        .bind(record.uid.as_str())
        .bind(&record.student_id)
        .bind(&record.display_name)
        .bind(&record.answer_text)
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(record)
    }

    async fn get_answer(
        &self,
        key: &SessionKey,
        question_no: QuestionNo,
        uid: &StudentUid,
    ) -> Result<Option<AnswerRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT class_id, checkin_no, question_no, uid,
                       student_id, display_name, answer_text, submitted_at
                FROM answers
                WHERE class_id = ?1 AND checkin_no = ?2 AND question_no = ?3 AND uid = ?4
            ",
        )
        .bind(key.class_id.as_str())
        .bind(i64::from(key.checkin_no.value()))
        .bind(i64::from(question_no.value()))
        .bind(uid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_answer_row).transpose()
    }

    async fn list_answers(
        &self,
        key: &SessionKey,
        question_no: QuestionNo,
    ) -> Result<Vec<AnswerRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT class_id, checkin_no, question_no, uid,
                       student_id, display_name, answer_text, submitted_at
                FROM answers
                WHERE class_id = ?1 AND checkin_no = ?2 AND question_no = ?3
                ORDER BY uid ASC
            ",
        )
        .bind(key.class_id.as_str())
        .bind(i64::from(key.checkin_no.value()))
        .bind(i64::from(question_no.value()))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_answer_row).collect()
    }
}
