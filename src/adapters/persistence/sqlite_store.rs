//! SQLite-backed entity store via libsql.
//!
//! One database file (catalog.db) holds all four collections. The
//! `teacher_registrations` table carries a partial unique index so that two
//! processes sharing the file still cannot commit a second main teacher for
//! the same course instance. Commits from one process are serialized through
//! a store-level mutex; every connection waits on a busy database instead of
//! failing, so other processes on the same file queue up too.

use crate::domain::{
    CatalogSnapshot, CourseInstance, CourseTemplate, DomainError, ErrorCode,
    NewTeacherRegistration, Person, TeacherRegistration, TeacherType,
};
use crate::ports::{EntityStore, UnitOfWork};
use libsql::{params, Connection, Database};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How long a connection waits for a lock held by another writer.
const BUSY_TIMEOUT_MS: u64 = 5_000;

const COURSE_TEMPLATES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS course_templates (
    course_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    name_en TEXT NOT NULL DEFAULT ''
)"#;

const COURSE_INSTANCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS course_instances (
    id INTEGER PRIMARY KEY,
    course_id TEXT NOT NULL,
    semester_id TEXT NOT NULL
)"#;
const COURSE_INSTANCES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_course_instances_semester ON course_instances (semester_id)";

const PERSONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS persons (
    ssn TEXT PRIMARY KEY,
    name TEXT NOT NULL
)"#;

const TEACHER_REGISTRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS teacher_registrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_instance_id INTEGER NOT NULL,
    ssn TEXT NOT NULL,
    type TEXT NOT NULL
)"#;
/// At most one main teacher per course instance.
const ONE_MAIN_TEACHER_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_one_main_teacher
ON teacher_registrations (course_instance_id) WHERE type = 'main'"#;

fn repo_err(e: libsql::Error) -> DomainError {
    DomainError::Repo(e.to_string())
}

fn commit_err(e: libsql::Error) -> DomainError {
    DomainError::Commit(e.to_string())
}

/// True when `e` is the one-main-teacher index rejecting an insert.
fn is_main_teacher_violation(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE constraint failed")
        && msg.contains("teacher_registrations.course_instance_id")
}

/// Open a connection that waits up to BUSY_TIMEOUT_MS on a locked database.
async fn open_conn(db: &Database) -> Result<Connection, libsql::Error> {
    let conn = db.connect()?;
    // PRAGMA busy_timeout returns a row; consume it.
    let mut rows = conn
        .query(&format!("PRAGMA busy_timeout={}", BUSY_TIMEOUT_MS), ())
        .await?;
    while rows.next().await?.is_some() {}
    Ok(conn)
}

/// SQLite entity store. Safe to share via Arc.
pub struct SqliteStore {
    db: Arc<Database>,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
    /// Connect to (or create) `catalog.db` under `base_dir` and ensure the schema exists.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Repo(e.to_string()))?;
        let db_path = base.join("catalog.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;
        let conn = open_conn(&db).await.map_err(repo_err)?;

        // PRAGMA returns a row; execute() refuses statements that return rows.
        let mut wal_rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DomainError::Repo(format!("WAL pragma failed: {}", e)))?;
        while wal_rows.next().await.map_err(repo_err)?.is_some() {}

        for ddl in [
            COURSE_TEMPLATES_TABLE,
            COURSE_INSTANCES_TABLE,
            COURSE_INSTANCES_INDEX,
            PERSONS_TABLE,
            TEACHER_REGISTRATIONS_TABLE,
            ONE_MAIN_TEACHER_INDEX,
        ] {
            conn.execute(ddl, ()).await.map_err(repo_err)?;
        }

        info!(path = %db_path.display(), "SQLite catalog store connected");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn conn(&self) -> Result<Connection, DomainError> {
        open_conn(&self.db).await.map_err(repo_err)
    }

    /// Import `snapshot` in a single transaction.
    ///
    /// Templates, instances and persons are upserted. Registrations are
    /// insert-only: rows whose id already exists are left untouched, and a main
    /// teacher registration is skipped when its instance already has one.
    pub async fn import(&self, snapshot: &CatalogSnapshot) -> Result<(), DomainError> {
        let _write = self.write_lock.lock().await;
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        for t in &snapshot.course_templates {
            tx.execute(
                r#"
                INSERT INTO course_templates (course_id, name, name_en) VALUES (?1, ?2, ?3)
                ON CONFLICT (course_id) DO UPDATE SET name = excluded.name, name_en = excluded.name_en
                "#,
                params![t.course_id.as_str(), t.name.as_str(), t.name_en.as_str()],
            )
            .await
            .map_err(repo_err)?;
        }
        for i in &snapshot.course_instances {
            tx.execute(
                r#"
                INSERT INTO course_instances (id, course_id, semester_id) VALUES (?1, ?2, ?3)
                ON CONFLICT (id) DO UPDATE SET course_id = excluded.course_id, semester_id = excluded.semester_id
                "#,
                params![i.id, i.course_id.as_str(), i.semester_id.as_str()],
            )
            .await
            .map_err(repo_err)?;
        }
        for p in &snapshot.persons {
            tx.execute(
                r#"
                INSERT INTO persons (ssn, name) VALUES (?1, ?2)
                ON CONFLICT (ssn) DO UPDATE SET name = excluded.name
                "#,
                params![p.ssn.as_str(), p.name.as_str()],
            )
            .await
            .map_err(repo_err)?;
        }
        let mut skipped = 0usize;
        for r in &snapshot.teacher_registrations {
            // OR IGNORE covers both the id key and the one-main-teacher index.
            let inserted = tx
                .execute(
                    r#"
                    INSERT OR IGNORE INTO teacher_registrations (id, course_instance_id, ssn, type)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![r.id, r.course_instance_id, r.ssn.as_str(), r.kind.as_str()],
                )
                .await
                .map_err(repo_err)?;
            if inserted == 0 {
                skipped += 1;
                debug!(
                    registration_id = r.id,
                    course_instance_id = r.course_instance_id,
                    "registration not imported (existing id or main teacher)"
                );
            }
        }
        tx.commit().await.map_err(repo_err)?;
        info!(
            templates = snapshot.course_templates.len(),
            instances = snapshot.course_instances.len(),
            persons = snapshot.persons.len(),
            registrations = snapshot.teacher_registrations.len() - skipped,
            skipped_registrations = skipped,
            "imported catalog snapshot"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl EntityStore for SqliteStore {
    async fn course_instances(&self) -> Result<Vec<CourseInstance>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query("SELECT id, course_id, semester_id FROM course_instances", ())
            .await
            .map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(CourseInstance {
                id: row.get(0).map_err(repo_err)?,
                course_id: row.get(1).map_err(repo_err)?,
                semester_id: row.get(2).map_err(repo_err)?,
            });
        }
        Ok(out)
    }

    async fn course_templates(&self) -> Result<Vec<CourseTemplate>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query("SELECT course_id, name, name_en FROM course_templates", ())
            .await
            .map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(CourseTemplate {
                course_id: row.get(0).map_err(repo_err)?,
                name: row.get(1).map_err(repo_err)?,
                name_en: row.get(2).map_err(repo_err)?,
            });
        }
        Ok(out)
    }

    async fn teacher_registrations(&self) -> Result<Vec<TeacherRegistration>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, course_instance_id, ssn, type FROM teacher_registrations ORDER BY id",
                (),
            )
            .await
            .map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            let kind: String = row.get(3).map_err(repo_err)?;
            out.push(TeacherRegistration {
                id: row.get(0).map_err(repo_err)?,
                course_instance_id: row.get(1).map_err(repo_err)?,
                ssn: row.get(2).map_err(repo_err)?,
                kind: kind.parse::<TeacherType>().map_err(DomainError::Repo)?,
            });
        }
        Ok(out)
    }

    async fn persons(&self) -> Result<Vec<Person>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query("SELECT ssn, name FROM persons", ())
            .await
            .map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(Person {
                ssn: row.get(0).map_err(repo_err)?,
                name: row.get(1).map_err(repo_err)?,
            });
        }
        Ok(out)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        Ok(Box::new(SqliteUnitOfWork {
            db: Arc::clone(&self.db),
            write_lock: Arc::clone(&self.write_lock),
            pending: Vec::new(),
        }))
    }
}

/// Unit of work over a `SqliteStore`. Staged rows are inserted in one transaction on `save`.
pub struct SqliteUnitOfWork {
    db: Arc<Database>,
    write_lock: Arc<Mutex<()>>,
    pending: Vec<NewTeacherRegistration>,
}

#[async_trait::async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    fn add_teacher_registration(&mut self, registration: NewTeacherRegistration) {
        self.pending.push(registration);
    }

    async fn save(self: Box<Self>) -> Result<(), DomainError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let _write = self.write_lock.lock().await;
        let conn = open_conn(&self.db).await.map_err(commit_err)?;
        let tx = conn.transaction().await.map_err(commit_err)?;
        for r in &self.pending {
            if let Err(e) = tx
                .execute(
                    "INSERT INTO teacher_registrations (course_instance_id, ssn, type) VALUES (?1, ?2, ?3)",
                    params![r.course_instance_id, r.ssn.as_str(), r.kind.as_str()],
                )
                .await
            {
                if is_main_teacher_violation(&e) {
                    warn!(
                        course_instance_id = r.course_instance_id,
                        "main teacher rejected by unique index"
                    );
                    return Err(DomainError::Conflict(ErrorCode::CourseAlreadyHasMainTeacher));
                }
                return Err(commit_err(e));
            }
        }
        tx.commit().await.map_err(commit_err)?;
        debug!(count = self.pending.len(), "committed registrations");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> CatalogSnapshot {
        CatalogSnapshot {
            course_templates: vec![CourseTemplate {
                course_id: "T-111-PROG".into(),
                name: "Forritun".into(),
                name_en: "Programming".into(),
            }],
            course_instances: vec![CourseInstance {
                id: 1,
                course_id: "T-111-PROG".into(),
                semester_id: "20153".into(),
            }],
            persons: vec![Person {
                ssn: "1234567890".into(),
                name: "Alice".into(),
            }],
            teacher_registrations: Vec::new(),
        }
    }

    fn main_teacher(ssn: &str) -> NewTeacherRegistration {
        NewTeacherRegistration {
            course_instance_id: 1,
            ssn: ssn.into(),
            kind: TeacherType::MainTeacher,
        }
    }

    #[tokio::test]
    async fn import_then_read_all_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::connect(dir.path()).await.unwrap();
        store.import(&seed()).await.unwrap();
        // Importing twice upserts reference data instead of duplicating it.
        store.import(&seed()).await.unwrap();

        assert_eq!(store.course_templates().await.unwrap(), seed().course_templates);
        assert_eq!(store.course_instances().await.unwrap(), seed().course_instances);
        assert_eq!(store.persons().await.unwrap(), seed().persons);
        assert!(store.teacher_registrations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saved_registration_is_readable_with_its_own_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::connect(dir.path()).await.unwrap();
        store.import(&seed()).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.add_teacher_registration(main_teacher("1234567890"));
        uow.save().await.unwrap();

        let regs = store.teacher_registrations().await.unwrap();
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].course_instance_id, 1);
        assert_eq!(regs[0].kind, TeacherType::MainTeacher);
        assert!(regs[0].id > 0);
    }

    #[tokio::test]
    async fn second_main_teacher_is_rejected_by_the_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::connect(dir.path()).await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.add_teacher_registration(main_teacher("1"));
        first.save().await.unwrap();

        let mut second = store.begin().await.unwrap();
        second.add_teacher_registration(main_teacher("2"));
        let err = second.save().await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Conflict(ErrorCode::CourseAlreadyHasMainTeacher)
        ));
        assert!(err.is_domain());
        assert_eq!(store.teacher_registrations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn import_never_overwrites_or_adds_a_second_main_teacher() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::connect(dir.path()).await.unwrap();
        store.import(&seed()).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.add_teacher_registration(main_teacher("1234567890"));
        uow.save().await.unwrap();
        let existing = store.teacher_registrations().await.unwrap();

        let mut snapshot = seed();
        snapshot.teacher_registrations = vec![
            // Same id as the committed row, different content.
            TeacherRegistration {
                id: existing[0].id,
                course_instance_id: 1,
                ssn: "other".into(),
                kind: TeacherType::AssistantTeacher,
            },
            // New id, but instance 1 already has a main teacher.
            TeacherRegistration {
                id: 70,
                course_instance_id: 1,
                ssn: "456".into(),
                kind: TeacherType::MainTeacher,
            },
            TeacherRegistration {
                id: 71,
                course_instance_id: 1,
                ssn: "456".into(),
                kind: TeacherType::AssistantTeacher,
            },
        ];
        // Startup re-imports the seed every time; it must keep succeeding.
        store.import(&snapshot).await.unwrap();
        store.import(&snapshot).await.unwrap();

        let regs = store.teacher_registrations().await.unwrap();
        assert_eq!(regs.len(), 2);
        assert_eq!(regs[0], existing[0]);
        assert_eq!(regs[1].id, 71);
        let mains = regs
            .iter()
            .filter(|r| r.course_instance_id == 1 && r.kind == TeacherType::MainTeacher)
            .count();
        assert_eq!(mains, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assignments_to_distinct_instances_all_commit() {
        use crate::usecases::AssignmentService;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::connect(dir.path()).await.unwrap());
        let mut snapshot = seed();
        snapshot.course_instances = (1..=8)
            .map(|id| CourseInstance {
                id,
                course_id: "T-111-PROG".into(),
                semester_id: "20153".into(),
            })
            .collect();
        store.import(&snapshot).await.unwrap();

        let svc = Arc::new(AssignmentService::new(store.clone()));
        let mut handles = Vec::new();
        for id in 1..=8 {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(async move {
                svc.assign_teacher(id, "1234567890", TeacherType::MainTeacher)
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let regs = store.teacher_registrations().await.unwrap();
        assert_eq!(regs.len(), 8);
        for id in 1..=8 {
            assert!(regs.iter().any(|r| r.course_instance_id == id));
        }
    }
}
