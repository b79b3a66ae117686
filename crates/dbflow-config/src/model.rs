//! 設定ファイルのデータモデル

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// コントローラー全体の設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// クラウドプロバイダーの接続設定
    pub providers: Vec<ProviderConfig>,

    /// リソースストアの設定
    pub store: StoreConfig,

    /// 管理者パスワード生成ポリシー
    pub credentials: CredentialPolicy,

    /// 失敗時の再キュー間隔
    pub requeue: RequeueConfig,
}

impl ControllerConfig {
    /// 名前でプロバイダー設定を探す
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// 設定値の整合性チェック
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "プロバイダー名が空です".to_string(),
                ));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "プロバイダー '{}' が重複しています",
                    provider.name
                )));
            }
        }

        if self.credentials.length == 0 {
            return Err(ConfigError::Invalid(
                "credentials.length は 1 以上である必要があります".to_string(),
            ));
        }

        if self.requeue.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "requeue.multiplier は 1.0 以上である必要があります: {}",
                self.requeue.multiplier
            )));
        }

        Ok(())
    }
}

/// プロバイダーの接続設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// リソースの `provider_ref` から参照される名前
    pub name: String,

    /// 認証情報を格納したシークレットへの参照
    #[serde(default)]
    pub credentials_secret_ref: Option<SecretKeySelector>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credentials_secret_ref: None,
        }
    }

    pub fn with_secret_ref(mut self, selector: SecretKeySelector) -> Self {
        self.credentials_secret_ref = Some(selector);
        self
    }
}

/// シークレット内の特定キーへの参照
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

impl SecretKeySelector {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            key: key.into(),
        }
    }
}

/// ファイルベースのリソースストア設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub state_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".dbflow"),
        }
    }
}

/// パスワード生成ポリシー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialPolicy {
    pub length: usize,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self { length: 27 }
    }
}

/// 再キュー間隔 (指数バックオフ)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequeueConfig {
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    pub multiplier: f64,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 1,
            max_delay_secs: 60,
            multiplier: 2.0,
        }
    }
}

impl RequeueConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}
