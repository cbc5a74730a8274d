use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;

use crate::datetime;
use crate::repository::TimesheetRepository;
use crate::time_entry::{local_date, TimeEntry};
use crate::timer::Session;

/// 日毎の情報を出力するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct DailyArgs {
    #[clap(
        short = 'd',
        long = "date",
        help = "Sets a custom date in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    date: Option<NaiveDate>,

    #[clap(long = "json", help = "Prints the entries as JSON")]
    pub json: bool,
}

pub struct DailyCommand<'a, R: TimesheetRepository> {
    repository: &'a R,
}

impl<'a, R: TimesheetRepository> DailyCommand<'a, R> {
    /// 新しい`DailyCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - タイムシートを読み込むリポジトリ
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// `daily`サブコマンドの処理を行う。
    ///
    /// 指定された日付のユーザーのタイムエントリーを取得する。
    /// 日付が指定されていない場合は、Localタイムゾーンで現在の日付を利用する。
    ///
    /// # Arguments
    ///
    /// * `session` - 操作を行うユーザー
    /// * `daily` - `daily`サブコマンドの引数
    pub fn run(&self, session: &Session, daily: DailyArgs) -> Result<Vec<TimeEntry>> {
        let date = daily
            .date
            .unwrap_or_else(|| local_date(&datetime::now()));
        info!("Date: {}", date);

        let time_entries = self
            .repository
            .user_entries(&session.user)
            .into_iter()
            .filter(|entry| entry.date == date)
            .collect::<Vec<_>>();

        info!("{} time entries found.", time_entries.len());

        Ok(time_entries)
    }
}

/// 日付をパースする。
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Failed to parse date: {}", s))
}
