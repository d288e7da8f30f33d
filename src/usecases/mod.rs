//! Application use cases. Orchestrate domain logic via ports.

pub mod assignment_service;
pub mod catalog_service;
pub mod instance_locks;
pub mod lookup;

pub use assignment_service::AssignmentService;
pub use catalog_service::{CatalogService, DEFAULT_SEMESTER, PAGE_SIZE};
pub use instance_locks::InstanceLocks;
