//! Infrastructure adapters. Implement ports.
//!
//! Entity stores and the interactive UI. Map errors to DomainError.

pub mod persistence;
pub mod ui;
