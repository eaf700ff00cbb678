//! Secret storage.
//!
//! API tokens and passwords live in a dotenv file owned by miru, never in
//! `config.toml`. The file is read fresh on every lookup so a token
//! cleared in one component is immediately gone for the next.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};

pub mod keys {
    pub const ANILIST_TOKEN: &str = "ANILIST_TOKEN";
    pub const TMDB_API_KEY: &str = "TMDB_API_KEY";
    pub const QBITTORRENT_PASSWORD: &str = "QBITTORRENT_PASSWORD";
    pub const REDDIT_APP_CLIENT_ID: &str = "REDDIT_APP_CLIENT_ID";
    pub const REDDIT_APP_CLIENT_SECRET: &str = "REDDIT_APP_CLIENT_SECRET";
    pub const REDDIT_USERNAME: &str = "REDDIT_USERNAME";
    pub const REDDIT_PASSWORD: &str = "REDDIT_PASSWORD";
    pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
}

pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn unset(&self, key: &str) -> Result<()>;
}

/// Dotenv-file backed store. Writes rewrite the file in place, keeping
/// unrelated keys and comment lines untouched.
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    path: PathBuf,
}

impl EnvFileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.path)
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write credentials file: {}", self.path.display()))
    }
}

/// Key of a `KEY=value` line. Comments and malformed lines have none.
fn entry_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    trimmed.split_once('=').map(|(key, _)| key.trim())
}

impl CredentialStore for EnvFileStore {
    fn get(&self, key: &str) -> Option<String> {
        let iter = dotenvy::from_path_iter(&self.path).ok()?;
        for item in iter {
            let Ok((name, value)) = item else {
                continue;
            };
            if name == key && !value.is_empty() {
                return Some(value);
            }
        }
        None
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut lines = self.read_lines();
        let entry = format!("{key}={value}");
        let mut replaced = false;
        for line in &mut lines {
            if entry_key(line) == Some(key) {
                line.clone_from(&entry);
                replaced = true;
            }
        }
        if !replaced {
            lines.push(entry);
        }
        self.write_lines(&lines)
    }

    fn unset(&self, key: &str) -> Result<()> {
        let lines = self.read_lines();
        let remaining: Vec<String> = lines
            .iter()
            .filter(|line| entry_key(line) != Some(key))
            .cloned()
            .collect();
        if remaining.len() == lines.len() {
            return Ok(());
        }
        self.write_lines(&remaining)
    }
}

/// In-memory store for tests and one-off runs without a dotenv file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        match self.values.lock() {
            Ok(mut values) => {
                values.insert(key.to_string(), value.to_string());
                Ok(())
            }
            Err(_) => anyhow::bail!("credential store lock poisoned"),
        }
    }

    fn unset(&self, key: &str) -> Result<()> {
        match self.values.lock() {
            Ok(mut values) => {
                values.remove(key);
                Ok(())
            }
            Err(_) => anyhow::bail!("credential store lock poisoned"),
        }
    }
}
