use std::path::{Path, PathBuf};

use crate::config::DashConfig;
use crate::db;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: DashConfig,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn new(config: DashConfig) -> Self {
        AppState {
            config,
            workspace: None,
            db: None,
        }
    }

    /// Opens (creating if needed) the store under `path` and makes it current.
    /// The previous workspace stays selected when opening fails.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        tracing::info!(path = %path.display(), "workspace selected");
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        Ok(())
    }
}
