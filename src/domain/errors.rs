//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into the `Repo`/`Commit` variants.

use std::fmt;
use thiserror::Error;

/// Machine-readable reason attached to a domain failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidCourseInstance,
    TeacherNotFound,
    CourseAlreadyHasMainTeacher,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidCourseInstance => "INVALID_COURSEINSTANCEID",
            ErrorCode::TeacherNotFound => "TEACHER_IS_NOT_FOUND_IN_PERSON",
            ErrorCode::CourseAlreadyHasMainTeacher => "COURSE_ALREADY_HAS_A_MAIN_TEACHER",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(ErrorCode),

    #[error("Conflict: {0}")]
    Conflict(ErrorCode),

    /// Pages are 1-based.
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("UI error: {0}")]
    Ui(String),
}

impl DomainError {
    /// True for caller-recoverable business failures, false for infrastructure failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            DomainError::NotFound(_) | DomainError::Conflict(_) | DomainError::InvalidPage(_)
        )
    }

    /// The error code, if this is a `NotFound` or `Conflict`.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            DomainError::NotFound(code) | DomainError::Conflict(code) => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_and_infrastructure_errors_are_distinguished() {
        assert!(DomainError::NotFound(ErrorCode::TeacherNotFound).is_domain());
        assert!(DomainError::InvalidPage(0).is_domain());
        assert!(!DomainError::Commit("disk full".into()).is_domain());
        assert_eq!(
            DomainError::Conflict(ErrorCode::CourseAlreadyHasMainTeacher).to_string(),
            "Conflict: COURSE_ALREADY_HAS_A_MAIN_TEACHER"
        );
    }
}
