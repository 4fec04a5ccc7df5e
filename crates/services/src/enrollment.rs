use std::sync::Arc;

use checkin_core::model::{ClassId, ClassMember, Classroom, Enrollment, EnrollmentStatus};
use storage::repository::{ClassRepository, ProfileRepository};

use crate::error::EnrollmentError;
use crate::identity::{Caller, IdentityProvider, resolve_caller};

/// Joins classes and lists the classes a student is registered in.
#[derive(Clone)]
pub struct EnrollmentService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    classes: Arc<dyn ClassRepository>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
        classes: Arc<dyn ClassRepository>,
    ) -> Self {
        Self {
            identity,
            profiles,
            classes,
        }
    }

    /// Register the signed-in student in a class.
    ///
    /// Writes the class roster entry first, then the student's own
    /// enrollment. Like check-in, the duplicate check is a plain read.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::Validation` for a blank id, `ProfileMissing`,
    /// `ClassNotFound`, `AlreadyEnrolled`, or `Transport` on store failures.
    pub async fn join_class(&self, class_id: &str) -> Result<Classroom, EnrollmentError> {
        let class_id = ClassId::new(class_id)
            .map_err(|_| EnrollmentError::Validation("please enter a class id".into()))?;

        let Caller::Resolved(uid, identity) =
            resolve_caller(self.identity.as_ref(), self.profiles.as_ref()).await?
        else {
            return Err(EnrollmentError::ProfileMissing);
        };

        let class = self
            .classes
            .get_class(&class_id)
            .await?
            .ok_or(EnrollmentError::ClassNotFound)?;
        if self
            .classes
            .get_enrollment(&uid, &class_id)
            .await?
            .is_some()
        {
            return Err(EnrollmentError::AlreadyEnrolled);
        }

        self.classes
            .put_member(&ClassMember {
                class_id: class_id.clone(),
                uid: uid.clone(),
                student_id: identity.student_id,
                display_name: identity.display_name,
            })
            .await?;
        self.classes
            .put_enrollment(&Enrollment {
                uid: uid.clone(),
                class_id: class_id.clone(),
                status: EnrollmentStatus::Registered,
            })
            .await?;
        tracing::info!(class_id = %class_id, uid = %uid, "joined class");
        Ok(class)
    }

    /// Classes the signed-in student is registered in, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::ProfileMissing` when signed out and
    /// `Transport` on store failures.
    pub async fn list_classes(&self) -> Result<Vec<Classroom>, EnrollmentError> {
        let uid = self
            .identity
            .current_user()
            .ok_or(EnrollmentError::ProfileMissing)?;

        let mut classes = Vec::new();
        for enrollment in self.classes.list_enrollments(&uid).await? {
            if enrollment.status != EnrollmentStatus::Registered {
                continue;
            }
            match self.classes.get_class(&enrollment.class_id).await? {
                Some(class) => classes.push(class),
                None => {
                    tracing::debug!(class_id = %enrollment.class_id, "skipping deleted class");
                }
            }
        }
        Ok(classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SignedInUser;
    use checkin_core::model::{StudentProfile, StudentUid};
    use storage::InMemoryRepository;

    fn uid() -> StudentUid {
        StudentUid::new("S1").unwrap()
    }

    async fn service() -> (InMemoryRepository, EnrollmentService) {
        let repo = InMemoryRepository::new();
        repo.upsert_profile(&StudentProfile {
            uid: uid(),
            student_id: "6401".into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            email: String::new(),
        })
        .await
        .unwrap();
        for (id, name) in [("C1", "Networks"), ("C2", "Compilers")] {
            repo.upsert_class(&Classroom {
                id: ClassId::new(id).unwrap(),
                name: name.into(),
                code: None,
            })
            .await
            .unwrap();
        }
        let service = EnrollmentService::new(
            Arc::new(SignedInUser::signed_in(uid())),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        (repo, service)
    }

    #[tokio::test]
    async fn join_writes_roster_and_enrollment() {
        let (repo, service) = service().await;
        let class = service.join_class(" C1 ").await.unwrap();
        assert_eq!(class.name, "Networks");

        let member = repo.member(&class.id, &uid()).unwrap().unwrap();
        assert_eq!(member.display_name, "Ann Lee");
        let enrollment = repo.get_enrollment(&uid(), &class.id).await.unwrap().unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Registered);

        let err = service.join_class("C1").await.unwrap_err();
        assert!(matches!(err, EnrollmentError::AlreadyEnrolled));
    }

    #[tokio::test]
    async fn join_rejections() {
        let (_repo, service) = service().await;
        assert!(matches!(
            service.join_class("  ").await.unwrap_err(),
            EnrollmentError::Validation(_)
        ));
        assert!(matches!(
            service.join_class("C9").await.unwrap_err(),
            EnrollmentError::ClassNotFound
        ));
    }

    #[tokio::test]
    async fn list_skips_unregistered_and_deleted() {
        let (repo, service) = service().await;
        service.join_class("C1").await.unwrap();
        repo.put_enrollment(&Enrollment {
            uid: uid(),
            class_id: ClassId::new("C2").unwrap(),
            status: EnrollmentStatus::Other(1),
        })
        .await
        .unwrap();
        repo.put_enrollment(&Enrollment {
            uid: uid(),
            class_id: ClassId::new("C3").unwrap(),
            status: EnrollmentStatus::Registered,
        })
        .await
        .unwrap();

        let classes = service.list_classes().await.unwrap();
        let ids: Vec<&str> = classes.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1"]);
    }
}
