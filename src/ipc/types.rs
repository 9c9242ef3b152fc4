use crate::context::SeatingContext;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub ctx: Option<SeatingContext>,
}

impl AppState {
    /// Opens (creating if needed) the workspace database and loads its schemes.
    pub fn open_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let store = crate::db::SqliteStore::open(&path)?;
        let ctx = SeatingContext::open(Box::new(store));
        tracing::info!(workspace = %path.display(), "workspace opened");
        self.workspace = Some(path);
        self.ctx = Some(ctx);
        Ok(())
    }
}
