use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime;

/// 作業時間の単位。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    #[default]
    Hour,
    Day,
    Other,
}

/// 表示するタイマー操作ボタン。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    Resume,
    Stop,
}

/// タイムシートの1行。
///
/// `unit_amount`が0かつ`date_time`が設定されている間はタイマーが動いているとみなす。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: u64,
    pub user: String,
    pub name: String,
    pub project_id: Option<u64>,
    pub task_id: Option<u64>,
    pub date: NaiveDate,
    pub date_time: Option<DateTime<Utc>>,
    pub unit_amount: f64,
    #[serde(default)]
    pub uom: UnitOfMeasure,
    #[serde(default)]
    pub tag_ids: Vec<u64>,
}

/// 新規作成するタイムシート行の値。
#[derive(Clone, Debug, PartialEq)]
pub struct NewTimeEntry {
    pub user: String,
    pub name: String,
    pub project_id: Option<u64>,
    pub task_id: Option<u64>,
    pub date: Option<NaiveDate>,
    pub date_time: Option<DateTime<Utc>>,
    pub unit_amount: f64,
    pub uom: UnitOfMeasure,
    pub tag_ids: Vec<u64>,
}

impl NewTimeEntry {
    /// IDを割り当てて`TimeEntry`にする。
    ///
    /// 日付が指定されていない場合は開始日時のローカル日付、開始日時もない場合は今日の日付を使う。
    pub fn into_entry(self, id: u64) -> TimeEntry {
        let date = match (self.date, self.date_time) {
            (_, Some(date_time)) => local_date(&date_time),
            (Some(date), None) => date,
            (None, None) => local_date(&datetime::now()),
        };

        TimeEntry {
            id,
            user: self.user,
            name: self.name,
            project_id: self.project_id,
            task_id: self.task_id,
            date,
            date_time: self.date_time,
            unit_amount: self.unit_amount,
            uom: self.uom,
            tag_ids: self.tag_ids,
        }
    }
}

impl TimeEntry {
    /// タイマーが動いているかどうか。
    pub fn is_running(&self) -> bool {
        self.unit_amount == 0.0 && self.date_time.is_some()
    }

    /// 開始日時と作業時間から終了日時を求める。
    ///
    /// 単位が日の場合は`hours_per_day`で時間に換算する。単位が時間でも日でもない場合や、
    /// 作業時間が0の場合は`None`を返す。
    pub fn date_time_end(&self, hours_per_day: f64) -> Option<DateTime<Utc>> {
        let start = self.date_time?;
        if self.unit_amount == 0.0 {
            return None;
        }
        match self.uom {
            UnitOfMeasure::Hour => datetime::add_hours(start, self.unit_amount),
            UnitOfMeasure::Day => datetime::add_hours(start, self.unit_amount * hours_per_day),
            UnitOfMeasure::Other => None,
        }
    }

    /// 終了日時を設定し、作業時間を計算し直す。
    ///
    /// 単位が時間で開始日時がある場合のみ反映する。
    pub fn set_date_time_end(&mut self, end: DateTime<Utc>) {
        if self.uom == UnitOfMeasure::Hour && self.date_time.is_some() {
            self.unit_amount = datetime::duration_hours(self.date_time, Some(end));
        }
    }

    /// `user`に対して表示するタイマー操作ボタンを返す。
    pub fn show_time_control(&self, user: &str) -> Option<TimeControl> {
        if self.user != user {
            None
        } else if self.is_running() {
            Some(TimeControl::Stop)
        } else {
            Some(TimeControl::Resume)
        }
    }
}

/// ローカルタイムゾーンでの日付を返す。
pub fn local_date(date_time: &DateTime<Utc>) -> NaiveDate {
    date_time.with_timezone(&Local).date_naive()
}


#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    use super::fixtures::entry;
    use super::{TimeControl, UnitOfMeasure};

    #[rstest]
    #[case::zero_duration(0.0, true, true)]
    #[case::stopped(0.5, true, false)]
    #[case::no_start(0.0, false, false)]
    fn test_is_running(#[case] hours: f64, #[case] has_start: bool, #[case] expected: bool) {
        let mut line = entry(1, "alice", Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(), hours);
        if !has_start {
            line.date_time = None;
        }

        assert_eq!(line.is_running(), expected);
    }

    #[rstest]
    #[case::hours(UnitOfMeasure::Hour, 1.5, Some((11, 30)))]
    #[case::days(UnitOfMeasure::Day, 0.5, Some((14, 0)))]
    #[case::other_unit(UnitOfMeasure::Other, 2.0, None)]
    #[case::running(UnitOfMeasure::Hour, 0.0, None)]
    fn test_date_time_end(
        #[case] uom: UnitOfMeasure,
        #[case] hours: f64,
        #[case] expected: Option<(u32, u32)>,
    ) {
        let mut line = entry(1, "alice", Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(), hours);
        line.uom = uom;

        let expected = expected.map(|(h, m)| Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap());
        assert_eq!(line.date_time_end(8.0), expected);
    }

    #[test]
    fn test_set_date_time_end_recomputes_duration() {
        let mut line = entry(1, "alice", Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(), 0.0);

        line.set_date_time_end(Utc.with_ymd_and_hms(2024, 3, 2, 10, 45, 0).unwrap());

        assert_eq!(line.unit_amount, 24.75);
    }

    #[test]
    fn test_set_date_time_end_ignores_other_units() {
        let mut line = entry(1, "alice", Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(), 1.0);
        line.uom = UnitOfMeasure::Day;

        line.set_date_time_end(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());

        assert_eq!(line.unit_amount, 1.0);
    }

    #[test]
    fn test_show_time_control() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let running = entry(1, "alice", start, 0.0);
        let stopped = entry(2, "alice", start, 1.0);

        assert_eq!(running.show_time_control("alice"), Some(TimeControl::Stop));
        assert_eq!(stopped.show_time_control("alice"), Some(TimeControl::Resume));
        assert_eq!(running.show_time_control("bob"), None);
    }
}
