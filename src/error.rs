use thiserror::Error;

/// 利用者に提示するエラー。
///
/// いずれのエラーもストアへの変更を伴わない。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimerError {
    #[error("Cannot stop timer {0} because it is not running. Refresh the page and check again.")]
    NotRunning(u64),
    #[error("Timer {0} is still running. Stop it before resuming work.")]
    AlreadyRunning(u64),
    #[error("Timesheet entry {0} does not exist")]
    EntryNotFound(u64),
    #[error("Timesheet entry {0} has no project to resume work on")]
    NoProject(u64),
    #[error("The end of timesheet entry {0} must be after its start")]
    EndNotAfterStart(u64),
    #[error("Project {0} does not exist")]
    ProjectNotFound(u64),
    #[error("Project {0} does not allow timesheets")]
    TimesheetsNotAllowed(u64),
    #[error("Task {0} does not exist")]
    TaskNotFound(u64),
    #[error("Task {task} does not belong to project {project:?}")]
    TaskOutsideProject { task: u64, project: Option<u64> },
    #[error("Tag {0} does not exist")]
    TagNotFound(u64),
    #[error("Tag name already exists: {0}")]
    DuplicateTag(String),
    #[error("Favorite {0} does not exist")]
    FavoriteNotFound(u64),
    #[error("Article {0} does not exist")]
    ArticleNotFound(u64),
}
