use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::catalog::sorted_by_name;
use crate::datetime;
use crate::error::TimerError;
use crate::repository::TimesheetRepository;
use crate::summary::{NamedItem, StopSummary, TagItem, TimerSummary};
use crate::time_entry::{NewTimeEntry, TimeEntry, UnitOfMeasure};

/// プロジェクト、タスク一覧の最大件数。
const MAX_LISTED_ITEMS: usize = 100;

/// 開始と同時刻に止めたタイマーに記録する時間(1秒)。
///
/// 0時間のままだと実行中とみなされてしまう。
const MIN_CLOSED_DURATION: f64 = 1.0 / 3600.0;

/// 操作を行うユーザーの情報。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user: String,
}

impl Session {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
        }
    }
}

/// タイマー開始時の入力。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StartTimer {
    pub description: String,
    pub project_id: u64,
    pub task_id: Option<u64>,
    pub tag_ids: Vec<u64>,
}

/// 実行中のタイマーに対する部分的な変更。
///
/// `None`の項目は変更しない。`project_id`と`task_id`の`Some(None)`は解除を表す。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimerUpdate {
    pub name: Option<String>,
    pub project_id: Option<Option<u64>>,
    pub task_id: Option<Option<u64>>,
    pub tag_ids: Option<Vec<u64>>,
}

impl TimerUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.project_id.is_none()
            && self.task_id.is_none()
            && self.tag_ids.is_none()
    }
}

/// タイマーの開始・停止を行う。
///
/// 1ユーザーにつき実行中のタイマーは1つまで。開始時には実行中のタイマーを先に止める。
pub struct TimerService<'a, R: TimesheetRepository> {
    repository: &'a mut R,
}

impl<'a, R: TimesheetRepository> TimerService<'a, R> {
    /// 新しい`TimerService`を返す。
    ///
    /// # Arguments
    /// * `repository` - タイムシートを読み書きするリポジトリ
    pub fn new(repository: &'a mut R) -> Self {
        Self { repository }
    }

    /// 実行中のタイマーを返す。なければ`None`。
    pub fn running_timer(&self, session: &Session) -> Option<TimerSummary> {
        self.running_entry(session)
            .map(|entry| TimerSummary::build(&*self.repository, &entry))
    }

    /// タイマーを開始する。
    ///
    /// 実行中のタイマーがあれば現在時刻で止めてから、新しい行を作成する。
    pub fn start_timer(&mut self, session: &Session, start: StartTimer) -> Result<TimerSummary> {
        self.validate_assignment(Some(start.project_id), start.task_id, &start.tag_ids)?;

        let now = datetime::now();
        if let Some(running) = self.running_entry(session) {
            let stopped = self
                .close_entry(running, now)
                .context("Failed to stop the running timer")?;
            info!(
                "Stopped timer {} after {:.2} hours before starting a new one",
                stopped.id, stopped.duration
            );
        }

        let entry = self
            .repository
            .create_entry(NewTimeEntry {
                user: session.user.clone(),
                name: description_or_slash(start.description),
                project_id: Some(start.project_id),
                task_id: start.task_id,
                date: None,
                date_time: Some(now),
                unit_amount: 0.0,
                uom: UnitOfMeasure::Hour,
                tag_ids: start.tag_ids,
            })
            .context("Failed to create timesheet entry")?;
        info!("Started timer {} for {}", entry.id, session.user);

        Ok(TimerSummary::build(&*self.repository, &entry))
    }

    /// 実行中のタイマーの説明、プロジェクト、タスク、タグを変更する。
    ///
    /// 時間に関する項目は変更しない。プロジェクトを変更してタスクを指定しなかった場合はタスクを外す。
    /// 実行中のタイマーがない場合は何もせず`None`を返す。
    pub fn update_running_timer(
        &mut self,
        session: &Session,
        update: TimerUpdate,
    ) -> Result<Option<TimerSummary>> {
        let mut entry = match self.running_entry(session) {
            Some(entry) => entry,
            None => {
                debug!("No running timer to update for {}", session.user);
                return Ok(None);
            }
        };
        if update.is_empty() {
            return Ok(Some(TimerSummary::build(&*self.repository, &entry)));
        }

        if let Some(name) = update.name {
            entry.name = description_or_slash(name);
        }
        if let Some(project_id) = update.project_id {
            entry.project_id = project_id;
            if update.task_id.flatten().is_none() {
                entry.task_id = None;
            }
        }
        if let Some(task_id) = update.task_id {
            entry.task_id = task_id;
        }
        if let Some(tag_ids) = update.tag_ids {
            entry.tag_ids = tag_ids;
        }
        self.validate_assignment(entry.project_id, entry.task_id, &entry.tag_ids)?;

        self.repository
            .write_entry(&entry)
            .with_context(|| format!("Failed to update timesheet entry {}", entry.id))?;
        info!("Updated running timer {}", entry.id);

        Ok(Some(TimerSummary::build(&*self.repository, &entry)))
    }

    /// 実行中のタイマーを現在時刻で止める。
    ///
    /// 実行中のタイマーがない場合は何もせず`None`を返す。
    pub fn stop_running_timer(&mut self, session: &Session) -> Result<Option<StopSummary>> {
        let entry = match self.running_entry(session) {
            Some(entry) => entry,
            None => {
                debug!("No running timer to stop for {}", session.user);
                return Ok(None);
            }
        };

        let stopped = self.close_entry(entry, datetime::now())?;
        info!("Stopped timer {} after {:.2} hours", stopped.id, stopped.duration);

        Ok(Some(stopped))
    }

    /// 指定した行のタイマーを止める。
    ///
    /// `end`を省略した場合は現在時刻で止める。実行中でない行を指定した場合はエラーを返す。
    pub fn end_work(
        &mut self,
        session: &Session,
        entry_id: u64,
        end: Option<DateTime<Utc>>,
    ) -> Result<StopSummary> {
        let entry = self.own_entry(session, entry_id)?;
        let stopped = self.close_entry(entry, end.unwrap_or_else(datetime::now))?;
        info!("Ended work on {} after {:.2} hours", stopped.id, stopped.duration);

        Ok(stopped)
    }

    /// 止めた行と同じ内容で新しいタイマーを開始する。
    ///
    /// 元の行は変更しない。
    pub fn resume_work(&mut self, session: &Session, entry_id: u64) -> Result<TimerSummary> {
        let entry = self.own_entry(session, entry_id)?;
        if entry.is_running() {
            return Err(TimerError::AlreadyRunning(entry.id).into());
        }
        let project_id = entry.project_id.ok_or(TimerError::NoProject(entry.id))?;

        self.start_timer(
            session,
            StartTimer {
                description: entry.name,
                project_id,
                task_id: entry.task_id,
                tag_ids: entry.tag_ids,
            },
        )
    }

    /// 終了日時を指定して作業時間を計算し直す。
    ///
    /// 終了日時は開始日時より後であること。作業時間が0になると実行中に戻ってしまう。
    pub fn set_entry_end(
        &mut self,
        session: &Session,
        entry_id: u64,
        end: DateTime<Utc>,
    ) -> Result<TimeEntry> {
        let mut entry = self.own_entry(session, entry_id)?;
        if entry.date_time.map_or(false, |start| end <= start) {
            return Err(TimerError::EndNotAfterStart(entry.id).into());
        }
        entry.set_date_time_end(end);
        self.repository
            .write_entry(&entry)
            .with_context(|| format!("Failed to update timesheet entry {}", entry.id))?;

        Ok(entry)
    }

    /// タイマーで選択できるプロジェクトを名前順で返す。
    pub fn timer_projects(&self) -> Vec<NamedItem> {
        let projects = self
            .repository
            .projects()
            .into_iter()
            .filter(|project| project.allow_timesheets)
            .collect();
        sorted_by_name(projects, |p| p.name.as_str(), Some(MAX_LISTED_ITEMS))
            .iter()
            .map(NamedItem::from)
            .collect()
    }

    /// プロジェクトのタスクを名前順で返す。
    pub fn timer_tasks(&self, project_id: u64) -> Vec<NamedItem> {
        let open = self
            .repository
            .project(project_id)
            .map(|project| project.allow_timesheets)
            .unwrap_or(false);
        if !open {
            return vec![];
        }
        let tasks = self.repository.project_tasks(project_id);
        sorted_by_name(tasks, |t| t.name.as_str(), Some(MAX_LISTED_ITEMS))
            .iter()
            .map(NamedItem::from)
            .collect()
    }

    /// 有効なタグを名前順で返す。
    pub fn timer_tags(&self) -> Vec<TagItem> {
        let tags = self
            .repository
            .tags()
            .into_iter()
            .filter(|tag| tag.active)
            .collect();
        sorted_by_name(tags, |t| t.name.as_str(), None)
            .iter()
            .map(TagItem::from)
            .collect()
    }

    fn running_entry(&self, session: &Session) -> Option<TimeEntry> {
        self.repository
            .running_entry_id(&session.user)
            .and_then(|id| self.repository.entry(id))
            .filter(|entry| entry.is_running() && entry.user == session.user)
    }

    fn own_entry(&self, session: &Session, entry_id: u64) -> Result<TimeEntry> {
        self.repository
            .entry(entry_id)
            .filter(|entry| entry.user == session.user)
            .ok_or_else(|| TimerError::EntryNotFound(entry_id).into())
    }

    fn close_entry(&mut self, mut entry: TimeEntry, end: DateTime<Utc>) -> Result<StopSummary> {
        if !entry.is_running() {
            return Err(TimerError::NotRunning(entry.id).into());
        }
        let duration = datetime::duration_hours(entry.date_time, Some(end));
        entry.unit_amount = if duration > 0.0 {
            duration
        } else {
            MIN_CLOSED_DURATION
        };
        self.repository
            .write_entry(&entry)
            .with_context(|| format!("Failed to stop timer {}", entry.id))?;

        Ok(StopSummary {
            id: entry.id,
            duration: entry.unit_amount,
        })
    }

    fn validate_assignment(
        &self,
        project_id: Option<u64>,
        task_id: Option<u64>,
        tag_ids: &[u64],
    ) -> Result<()> {
        if let Some(project_id) = project_id {
            let project = self
                .repository
                .project(project_id)
                .ok_or(TimerError::ProjectNotFound(project_id))?;
            if !project.allow_timesheets {
                return Err(TimerError::TimesheetsNotAllowed(project_id).into());
            }
        }
        if let Some(task_id) = task_id {
            let task = self
                .repository
                .task(task_id)
                .ok_or(TimerError::TaskNotFound(task_id))?;
            if Some(task.project_id) != project_id {
                return Err(TimerError::TaskOutsideProject {
                    task: task_id,
                    project: project_id,
                }
                .into());
            }
        }
        if let Some(missing) = tag_ids.iter().find(|id| self.repository.tag(**id).is_none()) {
            return Err(TimerError::TagNotFound(*missing).into());
        }

        Ok(())
    }
}

fn description_or_slash(description: String) -> String {
    if description.trim().is_empty() {
        "/".to_string()
    } else {
        description
    }
}
