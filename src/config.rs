use std::{env, path::PathBuf};

use anyhow::{Context, Result};

/// 1日あたりの時間の初期値。
const DEFAULT_HOURS_PER_DAY: f64 = 8.0;

/// 実行時の設定。
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// 操作を行うユーザー
    pub user: String,
    /// ストアのファイルパス
    pub store_path: PathBuf,
    /// 単位が日のタイムシートを時間に換算する係数
    pub hours_per_day: f64,
}

impl Config {
    /// 環境変数から設定を読み込む。引数で指定された値は環境変数より優先する。
    ///
    /// - `TIMESHEET_USER`: ユーザー名。未設定の場合は`USER`を使う。どちらもない場合はエラー。
    /// - `TIMESHEET_STORE`: ストアのパス。未設定の場合はデータディレクトリ配下。
    /// - `TIMESHEET_HOURS_PER_DAY`: 1日あたりの時間。未設定の場合は8。
    pub fn load(user: Option<String>, store_path: Option<PathBuf>) -> Result<Self> {
        let store_override = store_path.map(|path| path.to_string_lossy().into_owned());
        Self::from_lookup(|key| match key {
            "TIMESHEET_USER" if user.is_some() => user.clone(),
            "TIMESHEET_STORE" if store_override.is_some() => store_override.clone(),
            _ => env::var(key).ok(),
        })
    }

    /// 任意の取得関数から設定を読み込む。
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = lookup("TIMESHEET_USER")
            .or_else(|| lookup("USER"))
            .filter(|user| !user.is_empty())
            .context("TIMESHEET_USER must be set")?;
        let store_path = match lookup("TIMESHEET_STORE") {
            Some(path) => PathBuf::from(path),
            None => default_store_path()?,
        };
        let hours_per_day = match lookup("TIMESHEET_HOURS_PER_DAY") {
            Some(value) => value
                .parse::<f64>()
                .with_context(|| format!("Invalid TIMESHEET_HOURS_PER_DAY: {}", value))?,
            None => DEFAULT_HOURS_PER_DAY,
        };

        Ok(Self {
            user,
            store_path,
            hours_per_day,
        })
    }
}

fn default_store_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Failed to find the data directory")?;
    Ok(data_dir.join("timesheet-time-control").join("store.json"))
}
