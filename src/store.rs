use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::{Project, Tag, Task};
use crate::error::TimerError;
use crate::favorite::{Favorite, NewFavorite};
use crate::knowledge::{Article, NewArticle};
use crate::repository::TimesheetRepository;
use crate::time_entry::{NewTimeEntry, TimeEntry};

/// メモリ上に保持するデータ一式。
///
/// 実行中タイマーの索引は保存せず、読み込み時に作り直す。
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    projects: BTreeMap<u64, Project>,
    #[serde(default)]
    tasks: BTreeMap<u64, Task>,
    #[serde(default)]
    tags: BTreeMap<u64, Tag>,
    #[serde(default)]
    entries: BTreeMap<u64, TimeEntry>,
    #[serde(default)]
    favorites: BTreeMap<u64, Favorite>,
    #[serde(default)]
    articles: BTreeMap<u64, Article>,
    #[serde(skip)]
    running: HashMap<String, u64>,
}

impl Dataset {
    /// 空のデータ一式を返す。
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// 実行中タイマーの索引を作り直す。
    ///
    /// 同じユーザーに実行中の行が複数ある場合は、開始が最も新しい行を索引に載せる。
    fn reindex(&mut self) {
        self.running.clear();
        let mut latest: HashMap<String, &TimeEntry> = HashMap::new();
        for entry in self.entries.values().filter(|entry| entry.is_running()) {
            match latest.get(&entry.user) {
                Some(current) if current.date_time >= entry.date_time => {
                    warn!(
                        "User {} has more than one running timer: {} and {}",
                        entry.user, current.id, entry.id
                    );
                }
                _ => {
                    latest.insert(entry.user.clone(), entry);
                }
            }
        }
        self.running = latest
            .into_iter()
            .map(|(user, entry)| (user, entry.id))
            .collect();
    }

    fn track_running(&mut self, entry: &TimeEntry) {
        if entry.is_running() {
            self.running.insert(entry.user.clone(), entry.id);
        } else if self.running.get(&entry.user) == Some(&entry.id) {
            self.running.remove(&entry.user);
        }
    }
}

impl TimesheetRepository for Dataset {
    fn running_entry_id(&self, user: &str) -> Option<u64> {
        self.running.get(user).copied()
    }

    fn entry(&self, id: u64) -> Option<TimeEntry> {
        self.entries.get(&id).cloned()
    }

    fn user_entries(&self, user: &str) -> Vec<TimeEntry> {
        self.entries
            .values()
            .filter(|entry| entry.user == user)
            .cloned()
            .collect()
    }

    fn create_entry(&mut self, values: NewTimeEntry) -> Result<TimeEntry> {
        let id = self.allocate_id();
        let entry = values.into_entry(id);
        self.track_running(&entry);
        self.entries.insert(id, entry.clone());
        Ok(entry)
    }

    fn write_entry(&mut self, entry: &TimeEntry) -> Result<()> {
        let previous = self
            .entries
            .get(&entry.id)
            .ok_or(TimerError::EntryNotFound(entry.id))?;
        if previous.user != entry.user && self.running.get(&previous.user) == Some(&entry.id) {
            let user = previous.user.clone();
            self.running.remove(&user);
        }
        self.track_running(entry);
        self.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn project(&self, id: u64) -> Option<Project> {
        self.projects.get(&id).cloned()
    }

    fn projects(&self) -> Vec<Project> {
        self.projects.values().cloned().collect()
    }

    fn create_project(&mut self, name: &str, allow_timesheets: bool) -> Result<Project> {
        let project = Project {
            id: self.allocate_id(),
            name: name.to_string(),
            allow_timesheets,
        };
        self.projects.insert(project.id, project.clone());
        Ok(project)
    }

    fn task(&self, id: u64) -> Option<Task> {
        self.tasks.get(&id).cloned()
    }

    fn project_tasks(&self, project_id: u64) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|task| task.project_id == project_id)
            .cloned()
            .collect()
    }

    fn create_task(&mut self, project_id: u64, name: &str) -> Result<Task> {
        if !self.projects.contains_key(&project_id) {
            return Err(TimerError::ProjectNotFound(project_id).into());
        }
        let task = Task {
            id: self.allocate_id(),
            name: name.to_string(),
            project_id,
        };
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    fn tag(&self, id: u64) -> Option<Tag> {
        self.tags.get(&id).cloned()
    }

    fn tags(&self) -> Vec<Tag> {
        self.tags.values().cloned().collect()
    }

    fn create_tag(&mut self, name: &str, color: i64) -> Result<Tag> {
        if self.tags.values().any(|tag| tag.name == name) {
            return Err(TimerError::DuplicateTag(name.to_string()).into());
        }
        let tag = Tag {
            id: self.allocate_id(),
            name: name.to_string(),
            color,
            active: true,
        };
        self.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    fn favorite(&self, id: u64) -> Option<Favorite> {
        self.favorites.get(&id).cloned()
    }

    fn user_favorites(&self, user: &str) -> Vec<Favorite> {
        self.favorites
            .values()
            .filter(|favorite| favorite.user == user)
            .cloned()
            .collect()
    }

    fn create_favorite(&mut self, values: NewFavorite) -> Result<Favorite> {
        let favorite = values.into_favorite(self.allocate_id());
        self.favorites.insert(favorite.id, favorite.clone());
        Ok(favorite)
    }

    fn write_favorite(&mut self, favorite: &Favorite) -> Result<()> {
        if !self.favorites.contains_key(&favorite.id) {
            return Err(TimerError::FavoriteNotFound(favorite.id).into());
        }
        self.favorites.insert(favorite.id, favorite.clone());
        Ok(())
    }

    fn article(&self, id: u64) -> Option<Article> {
        self.articles.get(&id).cloned()
    }

    fn articles(&self) -> Vec<Article> {
        self.articles.values().cloned().collect()
    }

    fn create_article(&mut self, values: NewArticle) -> Result<Article> {
        let article = values.into_article(self.allocate_id());
        self.articles.insert(article.id, article.clone());
        Ok(article)
    }

    fn write_article(&mut self, article: &Article) -> Result<()> {
        if !self.articles.contains_key(&article.id) {
            return Err(TimerError::ArticleNotFound(article.id).into());
        }
        self.articles.insert(article.id, article.clone());
        Ok(())
    }
}

/// JSONファイルに保存するストア。
///
/// # Examples
///
/// ```ignore
/// let mut store = FileStore::open(&path)?;
/// TimerService::new(store.dataset_mut()).stop_running_timer(&session)?;
/// store.save()?;
/// ```
pub struct FileStore {
    path: PathBuf,
    dataset: Dataset,
}

impl FileStore {
    /// ファイルを読み込んでストアを開く。
    ///
    /// ファイルが存在しない場合は空のストアとして扱う。
    pub fn open(path: &Path) -> Result<Self> {
        let dataset = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read store file: {}", path.display()))?;
            let mut dataset: Dataset = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store file: {}", path.display()))?;
            dataset.reindex();
            debug!("Loaded {} entries from {}", dataset.entries.len(), path.display());
            dataset
        } else {
            info!("Store file {} does not exist, starting empty", path.display());
            Dataset::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            dataset,
        })
    }

    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    /// ファイルに書き出す。
    ///
    /// 一時ファイルに書いてから置き換えるため、途中で失敗しても元のファイルは壊れない。
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(&self.dataset).context("Failed to serialize store")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write store file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace store file: {}", self.path.display()))?;
        debug!("Saved store to {}", self.path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Dataset, FileStore};
    use crate::error::TimerError;
    use crate::repository::TimesheetRepository;
    use crate::time_entry::{NewTimeEntry, UnitOfMeasure};

    fn new_entry(user: &str, hours: f64, hour: u32) -> NewTimeEntry {
        NewTimeEntry {
            user: user.to_string(),
            name: "work".to_string(),
            project_id: None,
            task_id: None,
            date: None,
            date_time: Some(Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()),
            unit_amount: hours,
            uom: UnitOfMeasure::Hour,
            tag_ids: vec![],
        }
    }

    #[test]
    fn test_running_index_follows_writes() {
        let mut dataset = Dataset::new();
        let mut entry = dataset.create_entry(new_entry("alice", 0.0, 9)).unwrap();
        assert_eq!(dataset.running_entry_id("alice"), Some(entry.id));
        assert_eq!(dataset.running_entry_id("bob"), None);

        entry.unit_amount = 1.0;
        dataset.write_entry(&entry).unwrap();

        assert_eq!(dataset.running_entry_id("alice"), None);
    }

    #[test]
    fn test_write_unknown_entry() {
        let mut dataset = Dataset::new();
        let mut entry = dataset.create_entry(new_entry("alice", 1.0, 9)).unwrap();
        entry.id = 99;

        let err = dataset.write_entry(&entry).unwrap_err();

        assert_eq!(
            err.downcast_ref::<TimerError>(),
            Some(&TimerError::EntryNotFound(99))
        );
    }

    #[test]
    fn test_duplicate_tag_name() {
        let mut dataset = Dataset::new();
        dataset.create_tag("meeting", 1).unwrap();

        let err = dataset.create_tag("meeting", 2).unwrap_err();

        assert_eq!(
            err.downcast_ref::<TimerError>(),
            Some(&TimerError::DuplicateTag("meeting".to_string()))
        );
        assert_eq!(dataset.tags().len(), 1);
    }

    #[test]
    fn test_task_requires_project() {
        let mut dataset = Dataset::new();

        assert!(dataset.create_task(42, "design").is_err());
    }

    #[test]
    fn test_save_and_reopen_rebuilds_running_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = FileStore::open(&path).unwrap();
        let dataset = store.dataset_mut();
        dataset.create_project("Internal", true).unwrap();
        dataset.create_entry(new_entry("alice", 2.0, 8)).unwrap();
        let running = dataset.create_entry(new_entry("alice", 0.0, 11)).unwrap();
        store.save().unwrap();

        let mut reopened = FileStore::open(&path).unwrap();
        let dataset = reopened.dataset_mut();

        assert_eq!(dataset.running_entry_id("alice"), Some(running.id));
        assert_eq!(dataset.user_entries("alice").len(), 2);
        assert_eq!(dataset.projects().len(), 1);
    }

    /// 索引が壊れて実行中の行が複数ある場合は、最も新しい行を採用する。
    #[test]
    fn test_reindex_prefers_latest_running_entry() {
        let mut dataset = Dataset::new();
        dataset.create_entry(new_entry("alice", 0.0, 9)).unwrap();
        let latest = dataset.create_entry(new_entry("alice", 0.0, 10)).unwrap();

        dataset.reindex();

        assert_eq!(dataset.running_entry_id("alice"), Some(latest.id));
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = FileStore::open(&dir.path().join("store.json")).unwrap();

        assert!(store.dataset_mut().projects().is_empty());
    }
}
