use std::cmp::Ordering;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::TimerError;
use crate::repository::TimesheetRepository;
use crate::summary::FavoriteSummary;
use crate::timer::Session;

/// 一覧に表示するお気に入りの最大数。
pub const MAX_LISTED_FAVORITES: usize = 20;

/// タイマーをすぐに開始するために保存された組み合わせ。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: u64,
    pub user: String,
    pub name: String,
    pub project_id: u64,
    pub task_id: Option<u64>,
    #[serde(default)]
    pub tag_ids: Vec<u64>,
    #[serde(default)]
    pub use_count: u64,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// 新規作成するお気に入りの値。
#[derive(Clone, Debug, PartialEq)]
pub struct NewFavorite {
    pub user: String,
    pub name: String,
    pub project_id: u64,
    pub task_id: Option<u64>,
    pub tag_ids: Vec<u64>,
}

impl NewFavorite {
    /// IDを割り当てて`Favorite`にする。利用回数は0から始まる。
    pub fn into_favorite(self, id: u64) -> Favorite {
        Favorite {
            id,
            user: self.user,
            name: self.name,
            project_id: self.project_id,
            task_id: self.task_id,
            tag_ids: self.tag_ids,
            use_count: 0,
            active: true,
        }
    }
}

impl Favorite {
    /// 同じ組み合わせのお気に入りかどうか。タグは比較しない。
    pub fn matches(&self, user: &str, name: &str, project_id: u64, task_id: Option<u64>) -> bool {
        self.user == user
            && self.name == name
            && self.project_id == project_id
            && self.task_id == task_id
    }
}

fn default_active() -> bool {
    true
}

/// 利用回数の多い順、同数の場合は名前順。
pub fn display_order(a: &Favorite, b: &Favorite) -> Ordering {
    b.use_count
        .cmp(&a.use_count)
        .then_with(|| a.name.cmp(&b.name))
}

/// ユーザーごとのお気に入りを管理する。
pub struct FavoriteBook<'a, R: TimesheetRepository> {
    repository: &'a mut R,
}

impl<'a, R: TimesheetRepository> FavoriteBook<'a, R> {
    pub fn new(repository: &'a mut R) -> Self {
        Self { repository }
    }

    /// ユーザーのお気に入りを利用回数の多い順に最大20件返す。
    pub fn my_favorites(&self, session: &Session) -> Vec<FavoriteSummary> {
        let mut favorites = self
            .repository
            .user_favorites(&session.user)
            .into_iter()
            .filter(|favorite| favorite.active)
            .collect::<Vec<_>>();
        favorites.sort_by(display_order);
        favorites
            .iter()
            .take(MAX_LISTED_FAVORITES)
            .map(|favorite| FavoriteSummary::build(&*self.repository, favorite))
            .collect()
    }

    /// お気に入りを追加する。
    ///
    /// 同じユーザー、説明、プロジェクト、タスクのお気に入りが既にあれば、その利用回数を増やしてIDを返す。
    pub fn add_favorite(&mut self, session: &Session, values: NewFavorite) -> Result<u64> {
        let values = NewFavorite {
            user: session.user.clone(),
            ..values
        };
        let existing = self
            .repository
            .user_favorites(&session.user)
            .into_iter()
            .find(|favorite| {
                favorite.active
                    && favorite.matches(
                        &values.user,
                        &values.name,
                        values.project_id,
                        values.task_id,
                    )
            });
        if let Some(mut favorite) = existing {
            favorite.use_count += 1;
            self.repository
                .write_favorite(&favorite)
                .with_context(|| format!("Failed to update favorite {}", favorite.id))?;
            info!("Favorite {} already exists, used {} times", favorite.id, favorite.use_count);
            return Ok(favorite.id);
        }

        self.validate(&values)?;
        let favorite = self
            .repository
            .create_favorite(values)
            .context("Failed to create favorite")?;
        info!("Created favorite {} for {}", favorite.id, session.user);

        Ok(favorite.id)
    }

    /// お気に入りの利用回数を1増やす。
    ///
    /// `add_favorite`による加算とは独立しているため、呼び出し側でどちらか一方を使うこと。
    /// 存在しないIDが含まれる場合はどれも更新しない。
    pub fn increment_use(&mut self, session: &Session, ids: &[u64]) -> Result<()> {
        let favorites = ids
            .iter()
            .map(|id| self.favorite(session, *id))
            .collect::<Result<Vec<_>>>()?;
        for mut favorite in favorites {
            favorite.use_count += 1;
            self.repository
                .write_favorite(&favorite)
                .with_context(|| format!("Failed to update favorite {}", favorite.id))?;
        }

        Ok(())
    }

    /// ユーザーのお気に入りを1件返す。
    pub fn favorite(&self, session: &Session, id: u64) -> Result<Favorite> {
        self.repository
            .favorite(id)
            .filter(|favorite| favorite.user == session.user)
            .ok_or_else(|| TimerError::FavoriteNotFound(id).into())
    }

    fn validate(&self, values: &NewFavorite) -> Result<()> {
        if self.repository.project(values.project_id).is_none() {
            return Err(TimerError::ProjectNotFound(values.project_id).into());
        }
        if let Some(task_id) = values.task_id {
            let task = self
                .repository
                .task(task_id)
                .ok_or(TimerError::TaskNotFound(task_id))?;
            if task.project_id != values.project_id {
                return Err(TimerError::TaskOutsideProject {
                    task: task_id,
                    project: Some(values.project_id),
                }
                .into());
            }
        }
        if let Some(tag_id) = values
            .tag_ids
            .iter()
            .find(|id| self.repository.tag(**id).is_none())
        {
            return Err(TimerError::TagNotFound(*tag_id).into());
        }

        Ok(())
    }
}
