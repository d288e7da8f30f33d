//! Teacher assignment: register a person on a course instance as main or assistant teacher.
//!
//! Preconditions, in order: the course instance exists, the person exists, and
//! for a main teacher the instance has none yet. Check, stage and commit run
//! under the course instance's write lock; nothing is written when a check fails.

use crate::domain::{DomainError, ErrorCode, NewTeacherRegistration, PersonSummary, TeacherType};
use crate::ports::EntityStore;
use crate::usecases::instance_locks::InstanceLocks;
use crate::usecases::lookup::{find_instance, find_person, main_registration};
use std::sync::Arc;
use tracing::{info, warn};

/// Assignment service. Share one instance per store so every writer goes through the same locks.
pub struct AssignmentService {
    store: Arc<dyn EntityStore>,
    locks: InstanceLocks,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            locks: InstanceLocks::new(),
        }
    }

    /// Register `ssn` as a `kind` teacher of `course_instance_id` and commit.
    ///
    /// # Errors
    /// - `NotFound(InvalidCourseInstance)` if the course instance does not exist
    /// - `NotFound(TeacherNotFound)` if no person has this SSN
    /// - `Conflict(CourseAlreadyHasMainTeacher)` if a main teacher is requested and one is registered
    /// - `Repo`/`Commit` when the store fails
    pub async fn assign_teacher(
        &self,
        course_instance_id: i64,
        ssn: &str,
        kind: TeacherType,
    ) -> Result<PersonSummary, DomainError> {
        let _guard = self.locks.acquire(course_instance_id).await;

        let instances = self.store.course_instances().await?;
        if find_instance(&instances, course_instance_id).is_none() {
            return Err(DomainError::NotFound(ErrorCode::InvalidCourseInstance));
        }

        let persons = self.store.persons().await?;
        let person = find_person(&persons, ssn)
            .ok_or(DomainError::NotFound(ErrorCode::TeacherNotFound))?;

        if kind == TeacherType::MainTeacher {
            let registrations = self.store.teacher_registrations().await?;
            if let Some(existing) = main_registration(&registrations, course_instance_id) {
                warn!(
                    course_instance_id,
                    ssn,
                    existing_ssn = %existing.ssn,
                    "course instance already has a main teacher"
                );
                return Err(DomainError::Conflict(ErrorCode::CourseAlreadyHasMainTeacher));
            }
        }

        let mut uow = self.store.begin().await?;
        uow.add_teacher_registration(NewTeacherRegistration {
            course_instance_id,
            ssn: person.ssn.clone(),
            kind,
        });
        uow.save().await?;

        info!(course_instance_id, ssn, kind = %kind, "teacher assigned");

        Ok(PersonSummary {
            name: person.name.clone(),
            ssn: person.ssn.clone(),
        })
    }
}
