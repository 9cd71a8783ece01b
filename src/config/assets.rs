// src/config/assets.rs
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_TRACKED_ASSETS_PATH: &str = "TRACKED_ASSETS_PATH";

/// Used when no asset file is configured.
pub const DEFAULT_TRACKED_ASSETS: [&str; 10] = [
    "Bitcoin",
    "Ethereum",
    "Solana",
    "BNB",
    "XRP",
    "Cardano",
    "Avalanche",
    "Dogecoin",
    "Polkadot",
    "Polygon",
];

/// Load the asset list from an explicit path. TOML (`assets = [...]`) or a
/// JSON array.
pub fn load_assets_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading tracked assets from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let assets = parse_assets(&content, ext.as_str())?;
    if assets.is_empty() {
        return Err(anyhow!("{} lists no assets", path.display()));
    }
    Ok(assets)
}

/// Env var + fallbacks:
/// 1) $TRACKED_ASSETS_PATH
/// 2) config/tracked_assets.toml
/// 3) config/tracked_assets.json
/// 4) built-in top ten
pub fn load_assets_default() -> Result<Vec<String>> {
    if let Ok(p) = std::env::var(ENV_TRACKED_ASSETS_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_TRACKED_ASSETS_PATH} points to non-existent path"));
        }
        return load_assets_from(&pb);
    }
    for candidate in ["config/tracked_assets.toml", "config/tracked_assets.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_assets_from(&p);
        }
    }
    Ok(DEFAULT_TRACKED_ASSETS.iter().map(|s| s.to_string()).collect())
}

fn parse_assets(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    if hint_ext == "toml" {
        return parse_toml(s);
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    parse_toml(s).map_err(|_| anyhow!("unsupported tracked assets format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlAssets {
        assets: Vec<String>,
    }
    let v: TomlAssets = toml::from_str(s)?;
    Ok(clean_list(v.assets))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop blanks and repeats (case-insensitive), keep first-seen order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|it| it.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}
