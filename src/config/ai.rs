// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4-turbo-preview".to_string()
}
fn default_image_model() -> String {
    "dall-e-3".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// "ENV" means: read from OPENAI_API_KEY
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Where generated visuals are copied to; `None` disables the archive.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;

        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?;
        }
        cfg.base_url = cfg.base_url.trim_end_matches('/').to_string();
        Ok(cfg)
    }

    /// Env-only variant: OPENAI_API_KEY (required), OPENAI_BASE_URL,
    /// OPENAI_MODEL, OPENAI_IMAGE_MODEL, VISUAL_ARCHIVE_DIR.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY must be set"))?;
        Ok(Self {
            api_key,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| default_base_url())
                .trim_end_matches('/')
                .to_string(),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| default_model()),
            image_model: env::var("OPENAI_IMAGE_MODEL").unwrap_or_else(|_| default_image_model()),
            archive_dir: env::var("VISUAL_ARCHIVE_DIR").ok().map(PathBuf::from),
        })
    }

    /// `config/ai.json` when present, otherwise the environment.
    pub fn load_default() -> anyhow::Result<Self> {
        let p = Path::new(DEFAULT_AI_CONFIG_PATH);
        if p.exists() {
            Self::load_from_file(p)
        } else {
            Self::from_env()
        }
    }
}
