//! Catalog query: paginated course instances per semester, and single-instance lookup.
//!
//! - Inner join instances -> templates; instances without a template are skipped
//! - Items ordered by instance id ascending
//! - Total count and page count cover the filtered set only
//! - Main teacher resolved per returned instance

use crate::domain::{CourseInstanceSummary, DomainError, Envelope, ErrorCode, Language, PageInfo};
use crate::ports::EntityStore;
use crate::usecases::lookup::{find_instance, CatalogView};
use std::sync::Arc;
use tracing::{debug, warn};

/// Items per page.
pub const PAGE_SIZE: usize = 10;

/// Semester used when the caller passes none.
pub const DEFAULT_SEMESTER: &str = "20153";

/// Catalog service. Read-only over the entity store.
pub struct CatalogService {
    store: Arc<dyn EntityStore>,
    default_semester: String,
}

impl CatalogService {
    pub fn new(store: Arc<dyn EntityStore>, default_semester: impl Into<String>) -> Self {
        let default_semester = default_semester.into();
        let default_semester = if default_semester.trim().is_empty() {
            DEFAULT_SEMESTER.to_string()
        } else {
            default_semester
        };
        Self {
            store,
            default_semester,
        }
    }

    pub fn default_semester(&self) -> &str {
        &self.default_semester
    }

    /// List one page of the instances taught in `semester` (1-based `page`).
    ///
    /// A page past the end yields no items but the same counts.
    pub async fn list_instances(
        &self,
        semester: Option<&str>,
        page: u32,
        language: Language,
    ) -> Result<Envelope, DomainError> {
        if page == 0 {
            return Err(DomainError::InvalidPage(page));
        }
        let semester = semester
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.default_semester.as_str());

        let view = CatalogView::load(self.store.as_ref()).await?;
        let templates = view.templates_by_id();

        let mut matching: Vec<_> = view
            .instances
            .iter()
            .filter(|i| i.semester_id == semester)
            .filter_map(|i| match templates.get(i.course_id.as_str()) {
                Some(t) => Some((i, *t)),
                None => {
                    warn!(
                        course_instance_id = i.id,
                        course_id = %i.course_id,
                        "course instance has no template; skipped"
                    );
                    None
                }
            })
            .collect();
        matching.sort_by_key(|(i, _)| i.id);

        let total_items = matching.len();
        let skip = (page as usize - 1).saturating_mul(PAGE_SIZE);
        let items: Vec<CourseInstanceSummary> = matching
            .iter()
            .skip(skip)
            .take(PAGE_SIZE)
            .map(|(i, t)| view.summarize(i, t, language))
            .collect();

        debug!(
            semester,
            page,
            total_items,
            returned = items.len(),
            "listed course instances"
        );

        Ok(Envelope {
            items,
            page: PageInfo {
                page_number: page,
                page_size: PAGE_SIZE,
                page_count: total_items.div_ceil(PAGE_SIZE),
                total_items,
            },
        })
    }

    /// Look up one instance by id, with its local name and main teacher.
    ///
    /// An instance whose template is missing is reported as not found, the
    /// same way listing leaves it out.
    pub async fn get_instance(&self, id: i64) -> Result<CourseInstanceSummary, DomainError> {
        let view = CatalogView::load(self.store.as_ref()).await?;
        let instance = find_instance(&view.instances, id)
            .ok_or(DomainError::NotFound(ErrorCode::InvalidCourseInstance))?;
        let templates = view.templates_by_id();
        let Some(template) = templates.get(instance.course_id.as_str()) else {
            warn!(
                course_instance_id = id,
                course_id = %instance.course_id,
                "course instance has no template"
            );
            return Err(DomainError::NotFound(ErrorCode::InvalidCourseInstance));
        };
        Ok(view.summarize(instance, template, Language::Local))
    }
}
