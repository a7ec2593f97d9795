//! Token persistence and resolution
//!
//! The only thing stored on disk is the OAuth token, as
//! `~/.config/teleput/config.json`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub const TOKEN_ENV: &str = "PUTIO_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oauth_token: String,
}

/// Where a token came from; logged at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Flag,
    Env,
    File,
}

pub fn config_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".config").join("teleput"),
        None => PathBuf::from(".teleput"),
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Missing file means empty config.
pub fn load_from(path: &Path) -> Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

pub fn load() -> Result<Config> {
    load_from(&config_path())
}

pub fn save_to(path: &Path, cfg: &Config) -> Result<()> {
    let dir = path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700));
    }
    let data = serde_json::to_string_pretty(cfg)?;
    // atomic write
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(data.as_bytes())?;
    tmp.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
    }
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn save(cfg: &Config) -> Result<()> {
    save_to(&config_path(), cfg)
}

/// First non-empty of flag, environment, stored config.
pub fn resolve_token(
    flag: Option<&str>,
    env: Option<&str>,
    stored: &Config,
) -> Option<(String, TokenSource)> {
    let candidates = [
        (flag, TokenSource::Flag),
        (env, TokenSource::Env),
        (Some(stored.oauth_token.as_str()), TokenSource::File),
    ];
    candidates.into_iter().find_map(|(value, source)| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| (v.to_string(), source))
    })
}

/// Flag or environment first; the file at `path` is only read when both are
/// empty, so a broken file cannot shadow them. An unreadable or corrupt file
/// is an error rather than a missing token.
pub fn resolve_token_at(
    path: &Path,
    flag: Option<&str>,
    env: Option<&str>,
) -> Result<Option<(String, TokenSource)>> {
    if let Some(found) = resolve_token(flag, env, &Config::default()) {
        return Ok(Some(found));
    }
    let stored = load_from(path).context("loading config")?;
    Ok(resolve_token(None, None, &stored))
}
