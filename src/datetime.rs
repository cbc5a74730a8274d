use chrono::{DateTime, Duration, Utc};

/// 保存・出力で利用する日時のフォーマット。
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// テスト時に利用するモック時間を取得する。
#[cfg(test)]
pub mod mock_datetime {
    use std::cell::RefCell;

    use super::DateTime;
    use super::Utc;

    thread_local! {
        static MOCK_TIME: RefCell<Option<DateTime<Utc>>> = RefCell::new(None);
    }

    /// モック時間を取得する。
    pub fn now() -> DateTime<Utc> {
        MOCK_TIME.with(|cell| cell.borrow().as_ref().cloned().unwrap_or_else(Utc::now))
    }

    /// モック時間を設定する。
    pub fn set_mock_time(time: DateTime<Utc>) {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = Some(time));
    }

    // 設定したモック時間をクリアする。
    pub fn clear_mock_time() {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = None);
    }
}

#[cfg(test)]
pub use mock_datetime::now;

/// 開始と終了の間の時間を時間単位の小数で返す。
///
/// どちらかが欠けている場合や、終了が開始より前の場合は0を返す。
pub fn duration_hours(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> f64 {
    match (start, end) {
        (Some(start), Some(end)) if end > start => {
            (end - start).num_milliseconds() as f64 / 3_600_000.0
        }
        _ => 0.0,
    }
}

/// 日時に小数の時間を加算する。
///
/// ミリ秒未満は切り捨てる。
pub fn add_hours(start: DateTime<Utc>, hours: f64) -> Option<DateTime<Utc>> {
    if !hours.is_finite() {
        return None;
    }
    let millis = (hours * 3_600_000.0) as i64;
    start.checked_add_signed(Duration::milliseconds(millis))
}

/// 出力用の文字列に変換する。
pub fn to_string(datetime: &DateTime<Utc>) -> String {
    datetime.format(DATETIME_FORMAT).to_string()
}
