use anyhow::Result;

use crate::catalog::{Project, Tag, Task};
use crate::favorite::{Favorite, NewFavorite};
use crate::knowledge::{Article, NewArticle};
use crate::time_entry::{NewTimeEntry, TimeEntry};

/// タイムシートのデータを読み書きするためのtrait。
///
/// 実行中のタイマーはユーザーごとの索引で引けること。
#[cfg_attr(test, mockall::automock)]
pub trait TimesheetRepository {
    /// ユーザーの実行中タイマーのIDを返す。
    fn running_entry_id(&self, user: &str) -> Option<u64>;

    fn entry(&self, id: u64) -> Option<TimeEntry>;

    /// ユーザーのタイムシート行を全て返す。
    fn user_entries(&self, user: &str) -> Vec<TimeEntry>;

    fn create_entry(&mut self, values: NewTimeEntry) -> Result<TimeEntry>;

    /// 既存のタイムシート行を上書きする。
    fn write_entry(&mut self, entry: &TimeEntry) -> Result<()>;

    fn project(&self, id: u64) -> Option<Project>;

    fn projects(&self) -> Vec<Project>;

    fn create_project(&mut self, name: &str, allow_timesheets: bool) -> Result<Project>;

    fn task(&self, id: u64) -> Option<Task>;

    /// プロジェクトに属するタスクを返す。
    fn project_tasks(&self, project_id: u64) -> Vec<Task>;

    fn create_task(&mut self, project_id: u64, name: &str) -> Result<Task>;

    fn tag(&self, id: u64) -> Option<Tag>;

    fn tags(&self) -> Vec<Tag>;

    /// タグを作成する。名前が重複する場合はエラーを返す。
    fn create_tag(&mut self, name: &str, color: i64) -> Result<Tag>;

    fn favorite(&self, id: u64) -> Option<Favorite>;

    /// ユーザーのお気に入りを返す。
    fn user_favorites(&self, user: &str) -> Vec<Favorite>;

    fn create_favorite(&mut self, values: NewFavorite) -> Result<Favorite>;

    fn write_favorite(&mut self, favorite: &Favorite) -> Result<()>;

    fn article(&self, id: u64) -> Option<Article>;

    fn articles(&self) -> Vec<Article>;

    fn create_article(&mut self, values: NewArticle) -> Result<Article>;

    fn write_article(&mut self, article: &Article) -> Result<()>;
}
