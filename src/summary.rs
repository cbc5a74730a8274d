use serde::Serialize;

use crate::catalog::{Project, Tag, Task};
use crate::datetime;
use crate::favorite::Favorite;
use crate::repository::TimesheetRepository;
use crate::time_entry::{TimeControl, TimeEntry};

/// タイマーの状態を呼び出し元に返すための要約。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimerSummary {
    pub id: u64,
    pub name: String,
    pub project_id: Option<u64>,
    pub project_name: String,
    pub task_id: Option<u64>,
    pub task_name: String,
    pub date_time: Option<String>,
    pub tag_ids: Vec<u64>,
    pub tag_names: Vec<String>,
}

impl TimerSummary {
    /// プロジェクト名などを引いて要約を作る。
    pub fn build<R: TimesheetRepository + ?Sized>(repository: &R, entry: &TimeEntry) -> Self {
        let (tag_ids, tag_names) = tag_columns(repository, &entry.tag_ids);

        Self {
            id: entry.id,
            name: entry.name.clone(),
            project_id: entry.project_id,
            project_name: project_name(repository, entry.project_id),
            task_id: entry.task_id,
            task_name: task_name(repository, entry.task_id),
            date_time: entry.date_time.as_ref().map(datetime::to_string),
            tag_ids,
            tag_names,
        }
    }
}

/// タイムシート行に終了日時と操作ボタンを加えた表示用の値。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub date_time_end: Option<String>,
    pub show_time_control: Option<TimeControl>,
}

impl EntryView {
    /// `user`から見た表示用の値を作る。
    pub fn build(entry: &TimeEntry, user: &str, hours_per_day: f64) -> Self {
        Self {
            entry: entry.clone(),
            date_time_end: entry
                .date_time_end(hours_per_day)
                .as_ref()
                .map(datetime::to_string),
            show_time_control: entry.show_time_control(user),
        }
    }
}

/// タイマーを止めた結果。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StopSummary {
    pub id: u64,
    pub duration: f64,
}

/// プロジェクトやタスクの一覧の1項目。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamedItem {
    pub id: u64,
    pub name: String,
}

impl From<&Project> for NamedItem {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
        }
    }
}

impl From<&Task> for NamedItem {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
        }
    }
}

/// タグ一覧の1項目。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TagItem {
    pub id: u64,
    pub name: String,
    pub color: i64,
}

impl From<&Tag> for TagItem {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name.clone(),
            color: tag.color,
        }
    }
}

/// お気に入り一覧の1項目。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FavoriteSummary {
    pub id: u64,
    pub name: String,
    pub project_id: u64,
    pub project_name: String,
    pub task_id: Option<u64>,
    pub task_name: String,
    pub tag_ids: Vec<u64>,
    pub tag_names: Vec<String>,
    pub use_count: u64,
}

impl FavoriteSummary {
    pub fn build<R: TimesheetRepository + ?Sized>(repository: &R, favorite: &Favorite) -> Self {
        let (tag_ids, tag_names) = tag_columns(repository, &favorite.tag_ids);

        Self {
            id: favorite.id,
            name: favorite.name.clone(),
            project_id: favorite.project_id,
            project_name: project_name(repository, Some(favorite.project_id)),
            task_id: favorite.task_id,
            task_name: task_name(repository, favorite.task_id),
            tag_ids,
            tag_names,
            use_count: favorite.use_count,
        }
    }
}

fn project_name<R: TimesheetRepository + ?Sized>(repository: &R, id: Option<u64>) -> String {
    id.and_then(|id| repository.project(id))
        .map(|project| project.name)
        .unwrap_or_default()
}

fn task_name<R: TimesheetRepository + ?Sized>(repository: &R, id: Option<u64>) -> String {
    id.and_then(|id| repository.task(id))
        .map(|task| task.name)
        .unwrap_or_default()
}

// 削除されたタグは要約に含めない。
fn tag_columns<R: TimesheetRepository + ?Sized>(
    repository: &R,
    ids: &[u64],
) -> (Vec<u64>, Vec<String>) {
    ids.iter()
        .filter_map(|id| repository.tag(*id))
        .map(|tag| (tag.id, tag.name))
        .unzip()
}
