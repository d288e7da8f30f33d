//! Implements EntityStore in memory, optionally backed by a JSON snapshot file.
//!
//! Without a path the store lives only as long as the process (tests, demos).
//! With a path every commit rewrites the snapshot atomically.

use crate::domain::{
    CatalogSnapshot, CourseInstance, CourseTemplate, DomainError, NewTeacherRegistration, Person,
    TeacherRegistration, TeacherType,
};
use crate::ports::{EntityStore, UnitOfWork};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug)]
struct Tables {
    snapshot: CatalogSnapshot,
    next_registration_id: i64,
}

impl Tables {
    fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let next_registration_id = snapshot
            .teacher_registrations
            .iter()
            .map(|r| r.id)
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            snapshot,
            next_registration_id,
        }
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::from_snapshot(CatalogSnapshot::default())
    }
}

/// In-memory entity store. Cheap to clone; clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Empty store with no backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded from a snapshot, with no backing file.
    pub fn with_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::from_snapshot(snapshot))),
            path: None,
        }
    }

    /// Open a JSON-backed store. A missing file starts an empty catalog.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| DomainError::Repo(format!("parse {}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CatalogSnapshot::default(),
            Err(e) => return Err(DomainError::Repo(format!("read {}: {}", path.display(), e))),
        };
        info!(
            path = %path.display(),
            instances = snapshot.course_instances.len(),
            registrations = snapshot.teacher_registrations.len(),
            "JSON catalog store opened"
        );
        Ok(Self {
            tables: Arc::new(RwLock::new(Tables::from_snapshot(snapshot))),
            path: Some(path),
        })
    }

    /// Merge a snapshot into the store.
    ///
    /// Templates, instances and persons with an existing key are replaced.
    /// Registrations are insert-only: existing ids are left untouched, and a
    /// main teacher registration is skipped when its instance already has one.
    pub async fn import(&self, snapshot: &CatalogSnapshot) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        let mut next = tables.snapshot.clone();
        merge_by_key(&mut next.course_templates, &snapshot.course_templates, |t| {
            t.course_id.clone()
        });
        merge_by_key(&mut next.course_instances, &snapshot.course_instances, |i| {
            i.id
        });
        merge_by_key(&mut next.persons, &snapshot.persons, |p| p.ssn.clone());

        let mut skipped = 0usize;
        for r in &snapshot.teacher_registrations {
            let id_taken = next.teacher_registrations.iter().any(|e| e.id == r.id);
            let second_main = r.kind == TeacherType::MainTeacher
                && next.teacher_registrations.iter().any(|e| {
                    e.course_instance_id == r.course_instance_id
                        && e.kind == TeacherType::MainTeacher
                });
            if id_taken || second_main {
                skipped += 1;
                debug!(
                    registration_id = r.id,
                    course_instance_id = r.course_instance_id,
                    "registration not imported (existing id or main teacher)"
                );
                continue;
            }
            next.teacher_registrations.push(r.clone());
        }
        if skipped > 0 {
            info!(skipped, "skipped registrations during import");
        }

        // Persist before swapping so readers never see a state that failed to persist.
        if let Some(path) = &self.path {
            write_atomic(path, &next).await?;
        }
        *tables = Tables::from_snapshot(next);
        Ok(())
    }
}

fn merge_by_key<T: Clone, K: PartialEq>(rows: &mut Vec<T>, incoming: &[T], key: impl Fn(&T) -> K) {
    for row in incoming {
        let k = key(row);
        match rows.iter_mut().find(|existing| key(existing) == k) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
    }
}

/// Write-replace: temp file, sync_all, rename.
async fn write_atomic(path: &Path, snapshot: &CatalogSnapshot) -> Result<(), DomainError> {
    let json =
        serde_json::to_string_pretty(snapshot).map_err(|e| DomainError::Commit(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DomainError::Commit(format!("create dir: {}", e)))?;
    }
    let temp_path = path.with_extension("json.tmp");
    let mut f = fs::File::create(&temp_path)
        .await
        .map_err(|e| DomainError::Commit(format!("create temp file: {}", e)))?;
    f.write_all(json.as_bytes())
        .await
        .map_err(|e| DomainError::Commit(format!("write temp file: {}", e)))?;
    f.sync_all()
        .await
        .map_err(|e| DomainError::Commit(format!("sync temp file: {}", e)))?;
    drop(f);

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| DomainError::Commit(format!("atomic rename failed: {}", e)))?;
    Ok(())
}

#[async_trait::async_trait]
impl EntityStore for MemoryStore {
    async fn course_instances(&self) -> Result<Vec<CourseInstance>, DomainError> {
        Ok(self.tables.read().await.snapshot.course_instances.clone())
    }

    async fn course_templates(&self) -> Result<Vec<CourseTemplate>, DomainError> {
        Ok(self.tables.read().await.snapshot.course_templates.clone())
    }

    async fn teacher_registrations(&self) -> Result<Vec<TeacherRegistration>, DomainError> {
        Ok(self.tables.read().await.snapshot.teacher_registrations.clone())
    }

    async fn persons(&self) -> Result<Vec<Person>, DomainError> {
        Ok(self.tables.read().await.snapshot.persons.clone())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            pending: Vec::new(),
        }))
    }
}

/// Unit of work over a `MemoryStore`. Staged rows are applied on `save`.
pub struct MemoryUnitOfWork {
    store: MemoryStore,
    pending: Vec<NewTeacherRegistration>,
}

#[async_trait::async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn add_teacher_registration(&mut self, registration: NewTeacherRegistration) {
        self.pending.push(registration);
    }

    async fn save(self: Box<Self>) -> Result<(), DomainError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut tables = self.store.tables.write().await;
        let mut next = tables.snapshot.clone();
        let mut next_id = tables.next_registration_id;
        for r in &self.pending {
            next.teacher_registrations.push(TeacherRegistration {
                id: next_id,
                course_instance_id: r.course_instance_id,
                ssn: r.ssn.clone(),
                kind: r.kind,
            });
            next_id += 1;
        }
        if let Some(path) = &self.store.path {
            write_atomic(path, &next).await?;
        }
        tables.snapshot = next;
        tables.next_registration_id = next_id;
        debug!(count = self.pending.len(), "committed registrations");
        Ok(())
    }
}
