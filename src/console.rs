use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::time_entry::TimeEntry;

/// Consoleにtime entryを表示するためのtrait。
pub trait ConsolePresenter {
    /// タイムエントリーを表示する。
    ///
    /// # Arguments
    ///
    /// * `time_entries` - 表示するタイムエントリー
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()>;
}

/// タイムエントリーをMarkdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
    hours_per_day: f64,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    ///
    /// # Arguments
    /// * `writer` - 出力先
    /// * `hours_per_day` - 単位が日のタイムエントリーの終了時刻を求めるための係数
    pub fn new(writer: &'a mut W, hours_per_day: f64) -> Self {
        Self {
            writer,
            hours_per_day,
        }
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    // time entryをlist形式で表示する。開始時刻がないエントリーは表示しない。
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()> {
        let mut sorted_entries = time_entries
            .iter()
            .filter(|entry| entry.date_time.is_some())
            .collect::<Vec<_>>();
        sorted_entries.sort_by_key(|entry| entry.date_time);

        for entry in sorted_entries {
            let start_str = entry
                .date_time
                .map(|start| start.with_timezone(&Local).format("%H:%M").to_string())
                .unwrap_or_default();
            let end_str = if entry.is_running() {
                "now".to_string()
            } else {
                entry
                    .date_time_end(self.hours_per_day)
                    .map(|end| end.with_timezone(&Local).format("%H:%M").to_string())
                    .unwrap_or_else(|| format!("+{:.2}", entry.unit_amount))
            };
            writeln!(self.writer, "- {} ~ {}: {}", start_str, end_str, entry.name)
                .with_context(|| format!("Failed to write time entry: {:?}", entry))?;
        }

        Ok(())
    }
}

/// 結果をJSONの1行として書き出す。
pub struct ConsoleJson<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleJson<'a, W> {
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }

    pub fn show<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let line = serde_json::to_string(value).context("Failed to serialize result")?;
        writeln!(self.writer, "{}", line).context("Failed to write result")?;
        Ok(())
    }

    /// 対象がない場合は`false`を書き出す。
    pub fn show_optional<T: Serialize>(&mut self, value: Option<&T>) -> Result<()> {
        match value {
            Some(value) => self.show(value),
            None => self.show(&false),
        }
    }
}
