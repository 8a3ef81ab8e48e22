//! Persistence for the operator's OAuth tokens and the active watch channel.
//!
//! Core logic only sees the two traits; the default implementation is one
//! JSON document at ~/.config/calwatch/store.json. Every read re-parses the
//! file so expiry checks always see the current state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{StoredTokens, WatchChannel};

/// Access to the operator's OAuth credential.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<StoredTokens>>;
    fn put(&self, tokens: StoredTokens) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Access to the active watch channel record.
pub trait WatchChannelStore: Send + Sync {
    fn get(&self) -> Result<Option<WatchChannel>>;
    fn put(&self, channel: WatchChannel) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<StoredTokens>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watch_channel: Option<WatchChannel>,
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("calwatch");
        Ok(Self {
            path: dir.join("store.json"),
        })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<StoreData> {
        if !self.path.exists() {
            return Ok(StoreData::default());
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read store from {}", self.path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse store at {}", self.path.display()))
    }

    fn save(&self, data: &StoreData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory at {}", parent.display())
            })?;
        }

        let contents = serde_json::to_string_pretty(data).context("Failed to serialize store")?;

        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write store to {}", self.path.display()))
    }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Result<Option<StoredTokens>> {
        Ok(self.load()?.tokens)
    }

    fn put(&self, tokens: StoredTokens) -> Result<()> {
        let mut data = self.load()?;
        data.tokens = Some(tokens);
        self.save(&data)
    }

    fn clear(&self) -> Result<()> {
        let mut data = self.load()?;
        data.tokens = None;
        self.save(&data)
    }
}

impl WatchChannelStore for FileStore {
    fn get(&self) -> Result<Option<WatchChannel>> {
        Ok(self.load()?.watch_channel)
    }

    fn put(&self, channel: WatchChannel) -> Result<()> {
        let mut data = self.load()?;
        data.watch_channel = Some(channel);
        self.save(&data)
    }

    fn clear(&self) -> Result<()> {
        let mut data = self.load()?;
        data.watch_channel = None;
        self.save(&data)
    }
}
