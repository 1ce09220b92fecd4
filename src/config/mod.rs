//! Persisted user preferences: selected voice, streaming toggle, optional API
//! credential, and the per-style enabled map.
//!
//! Loading never fails the caller: a missing or corrupt file degrades to
//! defaults and the condition is reported through the activity log. Saving is
//! atomic (write a sibling temp file, then rename) so a crash mid-write cannot
//! truncate an existing config.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::styles::{StyleDef, VOICES};

pub const DEFAULT_CONFIG_FILENAME: &str = "config.json";

/// Durable configuration document. Field names are the wire schema; older
/// files with unknown styles still load (see [`AppConfig::merge_defaults`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub voice: String,
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub styles: BTreeMap<String, bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            voice: VOICES[0].to_string(),
            streaming: false,
            api_key: None,
            styles: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Reconcile a saved document with the current style registry: registry
    /// styles missing from the file are added disabled, styles the registry no
    /// longer knows are dropped. Applying this twice changes nothing.
    pub fn merge_defaults(&mut self, registry: &[StyleDef]) {
        let mut merged = BTreeMap::new();
        for def in registry {
            let enabled = self.styles.get(def.name).copied().unwrap_or(false);
            merged.insert(def.name.to_string(), enabled);
        }
        self.styles = merged;
    }
}

/// Resolve the config path: `SPEAKTERM_CONFIG_PATH` wins, then a dotdir under
/// the home directory, then the temp dir as a last resort.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = env::var_os("SPEAKTERM_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let base = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir);
    base.join(".speakterm").join(DEFAULT_CONFIG_FILENAME)
}

/// Loader/saver for [`AppConfig`]. All writes funnel through the single
/// controller thread, so no locking is needed here.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn at_default_path() -> Self {
        Self::new(default_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config, falling back to defaults when the file is missing or
    /// unparsable. Returns the config plus an optional warning for the log.
    pub fn load(&self) -> (AppConfig, Option<String>) {
        if !self.path.exists() {
            return (AppConfig::default(), None);
        }
        match fs::read_to_string(&self.path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<AppConfig>(&raw).map_err(Into::into))
        {
            Ok(cfg) => (cfg, None),
            Err(err) => (
                AppConfig::default(),
                Some(format!("Config unreadable, using defaults: {err:#}")),
            ),
        }
    }

    /// Write atomically: serialize to `<path>.tmp`, then rename over the
    /// target so readers never observe a partial file.
    pub fn save(&self, cfg: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {parent:?}"))?;
        }
        let payload = serde_json::to_string_pretty(cfg).context("failed to encode config")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).with_context(|| format!("failed to write {tmp:?}"))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move config into place at {:?}", self.path))?;
        Ok(())
    }
}
