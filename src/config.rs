use crate::error::{BoqMatchError, Result};
use boq_matcher_common::{EmbeddingProvider, ScoreWeights};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const V1_API_KEY: &str = "V1_API_KEY";
pub const V2_API_KEY: &str = "V2_API_KEY";

/// 設定キーごとの環境変数（先頭ほど優先）
const ENV_OVERRIDES: &[(&str, &[&str])] = &[
    (V1_API_KEY, &["V1_API_KEY", "OPENAI_API_KEY"]),
    (V2_API_KEY, &["V2_API_KEY", "COHERE_API_KEY"]),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub v1_api_key: Option<String>,
    pub v2_api_key: Option<String>,
    pub v1_model: String,
    pub v2_model: String,
    pub v1_base_url: String,
    pub v2_base_url: String,
    /// 1回の埋め込み呼び出しのタイムアウト
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub embedding_cache_capacity: usize,
    pub embedding_cache_ttl_seconds: u64,
    pub catalog_cache_ttl_seconds: u64,
    pub default_batch_size: usize,
    /// 一括照合で採用する信頼度の下限
    pub acceptance_threshold: f64,
    pub weights: ScoreWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            v1_api_key: None,
            v2_api_key: None,
            v1_model: "text-embedding-3-small".into(),
            v2_model: "embed-english-v3.0".into(),
            v1_base_url: "https://api.openai.com/v1".into(),
            v2_base_url: "https://api.cohere.ai/v1".into(),
            timeout_seconds: 10,
            retry_attempts: 2,
            retry_delay_ms: 1000,
            embedding_cache_capacity: 10_000,
            embedding_cache_ttl_seconds: 2 * 60 * 60,
            catalog_cache_ttl_seconds: 5 * 60,
            default_batch_size: 5,
            acceptance_threshold: 0.7,
            weights: ScoreWeights::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// ファイルがなければ既定値
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Self::read_from(path)?;
        config.validate()?;
        Ok(config)
    }

    /// 値の検証をせずに読む（`config` コマンドで不正な設定を直すため）
    pub fn read() -> Result<Self> {
        Self::read_from(&Self::config_path()?)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str::<Config>(&content)?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| BoqMatchError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("boq-matcher").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_attempts == 0 {
            return Err(BoqMatchError::Config("retryAttempts は1以上にしてください".into()));
        }
        if self.default_batch_size == 0 {
            return Err(BoqMatchError::Config("defaultBatchSize は1以上にしてください".into()));
        }
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(BoqMatchError::Config(
                "acceptanceThreshold は0〜1の範囲で指定してください".into(),
            ));
        }
        self.weights.validate()?;
        Ok(())
    }

    /// 設定値を取得（環境変数を優先）
    pub fn get_setting(&self, name: &str) -> Option<String> {
        self.get_setting_with(name, |var| std::env::var(var).ok())
    }

    /// 環境変数の参照先を差し替えられる版
    pub fn get_setting_with<F>(&self, name: &str, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = ENV_OVERRIDES
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, vars)| *vars)
            .unwrap_or(&[])
            .iter()
            .find_map(|var| env(var).filter(|v| !v.trim().is_empty()));
        if from_env.is_some() {
            return from_env;
        }

        let stored = match name {
            V1_API_KEY => self.v1_api_key.clone(),
            V2_API_KEY => self.v2_api_key.clone(),
            _ => None,
        };
        stored.filter(|v| !v.trim().is_empty())
    }

    pub fn api_key(&self, provider: EmbeddingProvider) -> Result<String> {
        let key = provider.setting_key();
        self.get_setting(key)
            .ok_or_else(|| BoqMatchError::MissingApiKey(key.to_string()))
    }

    pub fn set_api_key(&mut self, provider: EmbeddingProvider, key: String) -> Result<()> {
        match provider {
            EmbeddingProvider::V1 => self.v1_api_key = Some(key),
            EmbeddingProvider::V2 => self.v2_api_key = Some(key),
        }
        self.save()
    }

    pub fn model(&self, provider: EmbeddingProvider) -> &str {
        match provider {
            EmbeddingProvider::V1 => &self.v1_model,
            EmbeddingProvider::V2 => &self.v2_model,
        }
    }

    pub fn base_url(&self, provider: EmbeddingProvider) -> &str {
        match provider {
            EmbeddingProvider::V1 => &self.v1_base_url,
            EmbeddingProvider::V2 => &self.v2_base_url,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn embedding_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.embedding_cache_ttl_seconds)
    }

    pub fn catalog_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_cache_ttl_seconds)
    }
}
