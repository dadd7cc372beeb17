// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::tracking::ArticleFlags;

/// What the store persists between sessions: the flag cache and when it was
/// last reconciled with the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub flags: HashMap<String, ArticleFlags>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Storage for the interaction snapshot. A missing snapshot is not an
/// error; a corrupted one is reported and treated as missing by the store.
pub trait StorePersistence: Send + Sync {
    fn load(&self) -> Result<Option<StoreSnapshot>>;
    fn save(&self, snapshot: &StoreSnapshot) -> Result<()>;
}

/// JSON-file snapshot storage, the desktop analogue of browser local
/// storage.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorePersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<StoreSnapshot>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).context(format!("failed to read {}", self.path.display()));
            }
        };
        let snapshot = serde_json::from_str(&raw)
            .context(format!("corrupted snapshot at {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string(snapshot).context("failed to serialize snapshot")?;
        std::fs::write(&self.path, raw)
            .context(format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
