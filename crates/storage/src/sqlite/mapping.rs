use checkin_core::model::{
    AnswerRecord, CheckinNo, CheckinRecord, ClassId, ClassSession, Question, QuestionNo,
    SessionKey, SessionStatus, StudentUid,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn class_id_from(raw: String) -> Result<ClassId, StorageError> {
    ClassId::new(raw).map_err(ser)
}

pub(crate) fn uid_from(raw: String) -> Result<StudentUid, StorageError> {
    StudentUid::new(raw).map_err(ser)
}

pub(crate) fn checkin_no_from_i64(v: i64) -> Result<CheckinNo, StorageError> {
    Ok(CheckinNo::new(u32_from_i64("checkin_no", v)?))
}

pub(crate) fn question_no_from_i64(v: i64) -> Result<QuestionNo, StorageError> {
    Ok(QuestionNo::new(u32_from_i64("question_no", v)?))
}

fn session_key(row: &SqliteRow) -> Result<SessionKey, StorageError> {
    let class_id = class_id_from(row.try_get("class_id").map_err(ser)?)?;
    let checkin_no = checkin_no_from_i64(row.try_get("checkin_no").map_err(ser)?)?;
    Ok(SessionKey::new(class_id, checkin_no))
}

/// A row with no question number, no text and `question_show = 0` means the
/// instructor has not set a question.
pub(crate) fn map_session_row(row: &SqliteRow) -> Result<ClassSession, StorageError> {
    let key = session_key(row)?;
    let status = SessionStatus::from_code(row.try_get("status").map_err(ser)?).map_err(ser)?;
    let access_code: String = row.try_get("access_code").map_err(ser)?;
    let opened_at = row.try_get("opened_at").map_err(ser)?;

    let question_no = row
        .try_get::<Option<i64>, _>("question_no")
        .map_err(ser)?
        .map(question_no_from_i64)
        .transpose()?;
    let question_text: Option<String> = row.try_get("question_text").map_err(ser)?;
    let visible = row.try_get::<i64, _>("question_show").map_err(ser)? != 0;

    let question = if question_no.is_none() && question_text.is_none() && !visible {
        None
    } else {
        Some(Question::new(question_no, question_text, visible))
    };

    ClassSession::from_persisted(key, status, access_code, opened_at, question).map_err(ser)
}

pub(crate) fn map_checkin_row(row: &SqliteRow) -> Result<CheckinRecord, StorageError> {
    Ok(CheckinRecord {
        session: session_key(row)?,
        uid: uid_from(row.try_get("uid").map_err(ser)?)?,
        student_id: row.try_get("student_id").map_err(ser)?,
        display_name: row.try_get("display_name").map_err(ser)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        remark: row.try_get("remark").map_err(ser)?,
    })
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<AnswerRecord, StorageError> {
    Ok(AnswerRecord {
        session: session_key(row)?,
        question_no: question_no_from_i64(row.try_get("question_no").map_err(ser)?)?,
        uid: uid_from(row.try_get("uid").map_err(ser)?)?,
        student_id: row.try_get("student_id").map_err(ser)?,
        display_name: row.try_get("display_name").map_err(ser)?,
        answer_text: row.try_get("answer_text").map_err(ser)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_numbers_are_rejected() {
        assert!(checkin_no_from_i64(-1).is_err());
        assert_eq!(checkin_no_from_i64(7).unwrap(), CheckinNo::new(7));
        assert!(question_no_from_i64(i64::MAX).is_err());
    }

    #[test]
    fn blank_ids_are_serialization_errors() {
        assert!(matches!(
            class_id_from(String::new()),
            Err(StorageError::Serialization(_))
        ));
    }
}
