use checkin_core::model::{
    ClassId, ClassMember, Classroom, Enrollment, EnrollmentStatus, StudentProfile, StudentUid,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{class_id_from, conn, ser, uid_from};
use crate::repository::{ClassRepository, ProfileRepository, StorageError};

fn map_enrollment_row(row: &sqlx::sqlite::SqliteRow) -> Result<Enrollment, StorageError> {
    Ok(Enrollment {
        uid: uid_from(row.try_get("uid").map_err(ser)?)?,
        class_id: class_id_from(row.try_get("class_id").map_err(ser)?)?,
        status: EnrollmentStatus::from_code(row.try_get("status").map_err(ser)?),
    })
}

#[async_trait::async_trait]
impl ClassRepository for SqliteRepository {
    async fn upsert_class(&self, class: &Classroom) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO classrooms (id, name, code)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    code = excluded.code
            ",
        )
        .bind(class.id.as_str())
        .bind(&class.name)
        .bind(class.code.as_deref())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_class(&self, id: &ClassId) -> Result<Option<Classroom>, StorageError> {
        let row = sqlx::query("SELECT id, name, code FROM classrooms WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|row| -> Result<Classroom, StorageError> {
            Ok(Classroom {
                id: class_id_from(row.try_get("id").map_err(ser)?)?,
                name: row.try_get("name").map_err(ser)?,
                code: row.try_get("code").map_err(ser)?,
            })
        })
        .transpose()
    }

    async fn put_member(&self, member: &ClassMember) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO class_members (class_id, uid, student_id, display_name)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(class_id, uid) DO UPDATE SET
                    student_id = excluded.student_id,
                    display_name = excluded.display_name
            ",
        )
        .bind(member.class_id.as_str())
        .bind(member.uid.as_str())
        .bind(&member.student_id)
        .bind(&member.display_name)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_enrollment(
        &self,
        uid: &StudentUid,
        class_id: &ClassId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            "SELECT uid, class_id, status FROM enrollments WHERE uid = ?1 AND class_id = ?2",
        )
        .bind(uid.as_str())
        .bind(class_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn put_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO enrollments (uid, class_id, status)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(uid, class_id) DO UPDATE SET status = excluded.status
            ",
        )
        .bind(enrollment.uid.as_str())
        .bind(enrollment.class_id.as_str())
        .bind(enrollment.status.code())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn list_enrollments(&self, uid: &StudentUid) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            "SELECT uid, class_id, status FROM enrollments WHERE uid = ?1 ORDER BY class_id ASC",
        )
        .bind(uid.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_enrollment_row).collect()
    }
}

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, uid: &StudentUid) -> Result<Option<StudentProfile>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT uid, student_id, first_name, last_name, email
                FROM profiles
                WHERE uid = ?1
            ",
        )
        .bind(uid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|row| -> Result<StudentProfile, StorageError> {
            Ok(StudentProfile {
                uid: uid_from(row.try_get("uid").map_err(ser)?)?,
                student_id: row.try_get("student_id").map_err(ser)?,
                first_name: row.try_get("first_name").map_err(ser)?,
                last_name: row.try_get("last_name").map_err(ser)?,
                email: row.try_get("email").map_err(ser)?,
            })
        })
        .transpose()
    }

    async fn upsert_profile(&self, profile: &StudentProfile) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO profiles (uid, student_id, first_name, last_name, email)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(uid) DO UPDATE SET
                    student_id = excluded.student_id,
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    email = excluded.email
            ",
        )
        .bind(profile.uid.as_str())
        .bind(&profile.student_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
