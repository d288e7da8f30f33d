//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    CourseInstance, CourseTemplate, DomainError, NewTeacherRegistration, Person,
    TeacherRegistration,
};

/// Entity store. Enumerates each collection; the use cases filter in memory.
///
/// An adapter may push filtering down as long as the returned rows are the same.
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    async fn course_instances(&self) -> Result<Vec<CourseInstance>, DomainError>;

    async fn course_templates(&self) -> Result<Vec<CourseTemplate>, DomainError>;

    async fn teacher_registrations(&self) -> Result<Vec<TeacherRegistration>, DomainError>;

    async fn persons(&self) -> Result<Vec<Person>, DomainError>;

    /// Open a unit of work for staging writes.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError>;
}

/// Pending writes against an `EntityStore`.
///
/// Nothing is visible to readers until `save` succeeds. Dropping an unsaved
/// unit of work discards everything staged in it.
#[async_trait::async_trait]
pub trait UnitOfWork: Send {
    /// Stage a registration insert.
    fn add_teacher_registration(&mut self, registration: NewTeacherRegistration);

    /// Commit all staged writes as one unit.
    ///
    /// # Errors
    /// Returns `DomainError::Commit` if nothing could be persisted; no staged
    /// write is visible in that case.
    async fn save(self: Box<Self>) -> Result<(), DomainError>;
}
