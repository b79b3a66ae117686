pub mod error;
pub mod model;

pub use error::*;
pub use model::*;

use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "DBFLOW_CONFIG_PATH";
const CANDIDATES: [&str; 2] = ["dbflow.local.yaml", "dbflow.yaml"];

/// dbflow の設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("dbflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// コントローラー設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 DBFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: dbflow.local.yaml, dbflow.yaml
/// 3. ./.dbflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/dbflow/config.yaml (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    // 3. ./.dbflow/ ディレクトリで検索
    let local_dir = current_dir.join(".dbflow");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("dbflow").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// 指定パスの設定ファイルを読み込んで検証する
pub fn load_config(path: impl AsRef<Path>) -> Result<ControllerConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: ControllerConfig =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;

    tracing::debug!(
        "Loaded controller config from {} ({} providers)",
        path.display(),
        config.providers.len()
    );
    Ok(config)
}

/// 設定ファイルを探索して読み込む
pub fn load() -> Result<ControllerConfig> {
    let path = find_config_file()?;
    load_config(path)
}
