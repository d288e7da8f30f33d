//! Implements InputPort. Inquire-based interactive prompts.
//!
//! Menu loop: list instances, show one instance, assign a teacher. Results are
//! printed as pretty JSON. Domain errors are printed and the loop continues;
//! infrastructure errors end the session.

use crate::domain::{DomainError, Language, TeacherType};
use crate::ports::InputPort;
use crate::usecases::{AssignmentService, CatalogService};
use async_trait::async_trait;
use inquire::{CustomType, InquireError, Select, Text};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    ListInstances,
    ShowInstance,
    AssignTeacher,
    Quit,
}

impl MenuAction {
    const ALL: [MenuAction; 4] = [
        MenuAction::ListInstances,
        MenuAction::ShowInstance,
        MenuAction::AssignTeacher,
        MenuAction::Quit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuAction::ListInstances => "List course instances",
            MenuAction::ShowInstance => "Show course instance",
            MenuAction::AssignTeacher => "Assign teacher",
            MenuAction::Quit => "Quit",
        };
        f.write_str(label)
    }
}

fn ui_err(e: InquireError) -> DomainError {
    DomainError::Ui(e.to_string())
}

/// Parse a language answer; anything starting with "e" means English.
fn parse_language(answer: &str) -> Language {
    if answer.trim().to_ascii_lowercase().starts_with('e') {
        Language::English
    } else {
        Language::Local
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DomainError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| DomainError::Ui(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    catalog: Arc<CatalogService>,
    assignments: Arc<AssignmentService>,
}

impl TuiInputPort {
    pub fn new(catalog: Arc<CatalogService>, assignments: Arc<AssignmentService>) -> Self {
        Self {
            catalog,
            assignments,
        }
    }

    async fn list_instances(&self) -> Result<(), DomainError> {
        let semester = Text::new("Semester:")
            .with_default(self.catalog.default_semester())
            .prompt()
            .map_err(ui_err)?;
        let page = CustomType::<u32>::new("Page:")
            .with_default(1)
            .with_error_message("Enter a page number (1 or more)")
            .prompt()
            .map_err(ui_err)?;
        let language = Text::new("Language (local/english):")
            .with_default("local")
            .prompt()
            .map_err(ui_err)?;
        let envelope = self
            .catalog
            .list_instances(Some(&semester), page, parse_language(&language))
            .await?;
        print_json(&envelope)
    }

    async fn show_instance(&self) -> Result<(), DomainError> {
        let id = CustomType::<i64>::new("Course instance ID:")
            .prompt()
            .map_err(ui_err)?;
        let summary = self.catalog.get_instance(id).await?;
        print_json(&summary)
    }

    async fn assign_teacher(&self) -> Result<(), DomainError> {
        let id = CustomType::<i64>::new("Course instance ID:")
            .prompt()
            .map_err(ui_err)?;
        let ssn = Text::new("Teacher SSN:").prompt().map_err(ui_err)?;
        let kind = Select::new(
            "Role:",
            vec![TeacherType::MainTeacher, TeacherType::AssistantTeacher],
        )
        .prompt()
        .map_err(ui_err)?;
        let person = self
            .assignments
            .assign_teacher(id, ssn.trim(), kind)
            .await?;
        print_json(&person)
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let action = match Select::new("What next?", MenuAction::ALL.to_vec()).prompt() {
                Ok(a) => a,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                    return Ok(());
                }
                Err(e) => return Err(ui_err(e)),
            };
            debug!(?action, "menu action selected");
            let outcome = match action {
                MenuAction::ListInstances => self.list_instances().await,
                MenuAction::ShowInstance => self.show_instance().await,
                MenuAction::AssignTeacher => self.assign_teacher().await,
                MenuAction::Quit => return Ok(()),
            };
            match outcome {
                Ok(()) => {}
                Err(e) if e.is_domain() => println!("{}", e),
                // Esc on a sub-prompt returns to the menu.
                Err(DomainError::Ui(msg)) => debug!(error = %msg, "prompt cancelled"),
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_answers() {
        assert_eq!(parse_language("english"), Language::English);
        assert_eq!(parse_language(" EN"), Language::English);
        assert_eq!(parse_language("local"), Language::Local);
        assert_eq!(parse_language(""), Language::Local);
    }

    #[test]
    fn menu_lists_quit_last() {
        assert_eq!(MenuAction::ALL.last(), Some(&MenuAction::Quit));
        assert_eq!(MenuAction::AssignTeacher.to_string(), "Assign teacher");
    }
}
