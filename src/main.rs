//! Wiring & DI. Entry point: load config, open the entity store, inject into services, run UI.
//! No business logic here.

use course_catalog::adapters::persistence::{MemoryStore, SqliteStore};
use course_catalog::adapters::ui::TuiInputPort;
use course_catalog::domain::CatalogSnapshot;
use course_catalog::ports::{EntityStore, InputPort};
use course_catalog::shared::config::{AppConfig, StoreKind};
use course_catalog::usecases::{AssignmentService, CatalogService};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = AppConfig::load()?;
    let data_dir = cfg.data_dir_or_default();
    let seed = match cfg.seed_path() {
        Some(path) => Some(read_seed(&path).await?),
        None => None,
    };

    let store: Arc<dyn EntityStore> = match cfg.store_or_default() {
        StoreKind::Sqlite => {
            let store = SqliteStore::connect(&data_dir)
                .await
                .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?;
            if let Some(seed) = &seed {
                store.import(seed).await?;
            }
            Arc::new(store)
        }
        StoreKind::Json => {
            let store = MemoryStore::open(data_dir.join("catalog.json")).await?;
            if let Some(seed) = &seed {
                store.import(seed).await?;
            }
            Arc::new(store)
        }
    };

    let default_semester = cfg.default_semester_or_default();
    info!(
        store = ?cfg.store_or_default(),
        data_dir = %data_dir.display(),
        default_semester = %default_semester,
        "course catalog ready"
    );

    let catalog = Arc::new(CatalogService::new(Arc::clone(&store), default_semester));
    let assignments = Arc::new(AssignmentService::new(Arc::clone(&store)));

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(catalog, assignments));
    input_port.run().await?;

    Ok(())
}

async fn read_seed(path: &Path) -> anyhow::Result<CatalogSnapshot> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("read seed {}: {}", path.display(), e))?;
    let snapshot: CatalogSnapshot = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parse seed {}: {}", path.display(), e))?;
    info!(
        path = %path.display(),
        instances = snapshot.course_instances.len(),
        "loaded seed snapshot"
    );
    Ok(snapshot)
}
