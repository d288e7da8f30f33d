//! Core domain layer. No external I/O dependencies.
//!
//! Entities, caller-facing summaries and errors live here. Dependencies flow inward.

pub mod entities;
pub mod errors;

pub use entities::{
    CatalogSnapshot, CourseInstance, CourseInstanceSummary, CourseTemplate, Envelope, Language,
    NewTeacherRegistration, PageInfo, Person, PersonSummary, TeacherRegistration, TeacherType,
};
pub use errors::{DomainError, ErrorCode};
