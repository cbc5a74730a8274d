use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use log::debug;

mod catalog;
mod config;
mod console;
mod daily_command;
mod datetime;
mod error;
mod favorite;
mod knowledge;
mod logger;
mod repository;
mod store;
mod summary;
mod time_entry;
mod timer;

use config::Config;
use console::{ConsoleJson, ConsoleMarkdownList, ConsolePresenter};
use daily_command::{DailyArgs, DailyCommand};
use favorite::{FavoriteBook, NewFavorite};
use knowledge::{default_format_data, FormatType, KnowledgeBase, NewArticle};
use repository::TimesheetRepository;
use store::{Dataset, FileStore};
use summary::{EntryView, NamedItem, TagItem};
use timer::{Session, StartTimer, TimerService, TimerUpdate};

/// タイムシートのタイマーを操作するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- start -p 1 -d "Write report"
/// $ cargo run -- stop
/// $ cargo run -- daily
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(long = "user", help = "Acts as this user instead of TIMESHEET_USER")]
    user: Option<String>,

    #[clap(long = "store", help = "Uses this store file instead of TIMESHEET_STORE")]
    store: Option<PathBuf>,

    #[clap(short = 'v', long = "verbose", parse(from_occurrences), help = "Shows more logs")]
    verbose: u8,

    #[clap(short = 'q', long = "quiet", help = "Shows warnings and errors only")]
    quiet: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Shows the running timer
    Status,
    /// Starts a timer, stopping the running one first
    Start(StartArgs),
    /// Changes the running timer
    Update(UpdateArgs),
    /// Stops the running timer
    Stop,
    /// Stops the timer of a timesheet entry
    End(EndArgs),
    /// Starts a new timer with the content of a stopped entry
    Resume { entry: u64 },
    /// Sets the end time of an entry and recomputes its duration
    SetEnd {
        entry: u64,
        #[clap(parse(try_from_str = parse_datetime))]
        end: DateTime<Utc>,
    },
    /// Lists projects open to timesheets
    Projects,
    /// Lists tasks of a project
    Tasks { project: u64 },
    /// Lists tags
    Tags,
    /// Lists my favorites
    Favorites,
    /// Manages favorites
    #[clap(subcommand)]
    Favorite(FavoriteCommands),
    /// Lists entries of a day
    Daily(DailyArgs),
    /// Manages projects
    #[clap(subcommand)]
    Project(ProjectCommands),
    /// Manages tasks
    #[clap(subcommand)]
    Task(TaskCommands),
    /// Manages tags
    #[clap(subcommand)]
    Tag(TagCommands),
    /// Manages knowledge articles
    #[clap(subcommand)]
    Article(ArticleCommands),
}

#[derive(Debug, clap::Args)]
struct StartArgs {
    #[clap(short = 'd', long = "description")]
    description: Option<String>,
    #[clap(short = 'p', long = "project", required_unless_present = "favorite")]
    project: Option<u64>,
    #[clap(short = 't', long = "task")]
    task: Option<u64>,
    #[clap(long = "tag")]
    tags: Vec<u64>,
    #[clap(
        short = 'f',
        long = "favorite",
        conflicts_with_all = &["project", "task", "tags", "description"],
        help = "Starts from a favorite and counts its use"
    )]
    favorite: Option<u64>,
}

#[derive(Debug, clap::Args)]
struct UpdateArgs {
    #[clap(short = 'd', long = "description")]
    description: Option<String>,
    #[clap(short = 'p', long = "project")]
    project: Option<u64>,
    #[clap(long = "clear-project")]
    clear_project: bool,
    #[clap(short = 't', long = "task")]
    task: Option<u64>,
    #[clap(long = "clear-task")]
    clear_task: bool,
    #[clap(long = "tag")]
    tags: Vec<u64>,
    #[clap(long = "clear-tags")]
    clear_tags: bool,
}

impl UpdateArgs {
    // 解除の指定は値の指定より優先する。
    fn into_update(self) -> TimerUpdate {
        TimerUpdate {
            name: self.description,
            project_id: optional_change(self.project, self.clear_project),
            task_id: optional_change(self.task, self.clear_task),
            tag_ids: if self.clear_tags {
                Some(vec![])
            } else if self.tags.is_empty() {
                None
            } else {
                Some(self.tags)
            },
        }
    }
}

fn optional_change(value: Option<u64>, clear: bool) -> Option<Option<u64>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

#[derive(Debug, clap::Args)]
struct EndArgs {
    entry: u64,
    #[clap(
        long = "at",
        help = "Stops at this local time (YYYY-MM-DD HH:MM[:SS]) instead of now",
        parse(try_from_str = parse_datetime)
    )]
    at: Option<DateTime<Utc>>,
}

#[derive(Debug, Subcommand)]
enum FavoriteCommands {
    /// Saves a favorite, or counts a use of an identical one
    Add {
        #[clap(short = 'n', long = "name")]
        name: String,
        #[clap(short = 'p', long = "project")]
        project: u64,
        #[clap(short = 't', long = "task")]
        task: Option<u64>,
        #[clap(long = "tag")]
        tags: Vec<u64>,
    },
    /// Counts a use of favorites
    Use {
        #[clap(required = true)]
        ids: Vec<u64>,
    },
}

#[derive(Debug, Subcommand)]
enum ProjectCommands {
    Add {
        name: String,
        #[clap(long = "no-timesheets")]
        no_timesheets: bool,
    },
}

#[derive(Debug, Subcommand)]
enum TaskCommands {
    Add { project: u64, name: String },
}

#[derive(Debug, Subcommand)]
enum TagCommands {
    Add {
        name: String,
        #[clap(long = "color", default_value = "0")]
        color: i64,
    },
}

#[derive(Debug, Subcommand)]
enum ArticleCommands {
    /// Creates an article
    New {
        title: String,
        #[clap(long = "parent")]
        parent: Option<u64>,
        #[clap(long = "format", default_value = "article")]
        format: FormatType,
    },
    /// Changes the format of an article
    Format {
        id: u64,
        format: FormatType,
        #[clap(long = "data", help = "JSON data to store instead of the default")]
        data: Option<String>,
    },
    /// Lists articles with their format
    List,
    /// Prints the default data of a format
    Template { format: FormatType },
}

fn main() -> Result<()> {
    let args = Args::parse();

    logger::init(logger::level(args.verbose, args.quiet))?;

    let config = Config::load(args.user, args.store)?;
    debug!("Config: {:?}", config);

    let mut store = FileStore::open(&config.store_path)
        .with_context(|| format!("Failed to open store {}", config.store_path.display()))?;
    let session = Session::new(&config.user);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(
        args.subcommand,
        store.dataset_mut(),
        &session,
        &config,
        &mut out,
    )?;
    out.flush().context("Failed to flush stdout")?;

    store.save()?;

    Ok(())
}

/// サブコマンドを実行し、結果を`out`に書き出す。
fn run<W: Write>(
    subcommand: SubCommands,
    dataset: &mut Dataset,
    session: &Session,
    config: &Config,
    out: &mut W,
) -> Result<()> {
    match subcommand {
        SubCommands::Status => {
            let timer = TimerService::new(dataset);
            ConsoleJson::new(out).show_optional(timer.running_timer(session).as_ref())?;
        }
        SubCommands::Start(start) => {
            let summary = match start.favorite {
                Some(favorite_id) => {
                    let mut book = FavoriteBook::new(dataset);
                    let favorite = book.favorite(session, favorite_id)?;
                    book.increment_use(session, &[favorite_id])?;
                    TimerService::new(dataset).start_timer(
                        session,
                        StartTimer {
                            description: favorite.name,
                            project_id: favorite.project_id,
                            task_id: favorite.task_id,
                            tag_ids: favorite.tag_ids,
                        },
                    )?
                }
                None => TimerService::new(dataset).start_timer(
                    session,
                    StartTimer {
                        description: start.description.unwrap_or_default(),
                        project_id: start.project.context("--project is required")?,
                        task_id: start.task,
                        tag_ids: start.tags,
                    },
                )?,
            };
            ConsoleJson::new(out).show(&summary)?;
        }
        SubCommands::Update(update) => {
            let summary =
                TimerService::new(dataset).update_running_timer(session, update.into_update())?;
            ConsoleJson::new(out).show_optional(summary.as_ref())?;
        }
        SubCommands::Stop => {
            let stopped = TimerService::new(dataset).stop_running_timer(session)?;
            ConsoleJson::new(out).show_optional(stopped.as_ref())?;
        }
        SubCommands::End(end) => {
            let stopped = TimerService::new(dataset).end_work(session, end.entry, end.at)?;
            ConsoleJson::new(out).show(&stopped)?;
        }
        SubCommands::Resume { entry } => {
            let summary = TimerService::new(dataset).resume_work(session, entry)?;
            ConsoleJson::new(out).show(&summary)?;
        }
        SubCommands::SetEnd { entry, end } => {
            let updated = TimerService::new(dataset).set_entry_end(session, entry, end)?;
            ConsoleJson::new(out).show(&EntryView::build(
                &updated,
                &session.user,
                config.hours_per_day,
            ))?;
        }
        SubCommands::Projects => {
            let projects = TimerService::new(dataset).timer_projects();
            ConsoleJson::new(out).show(&projects)?;
        }
        SubCommands::Tasks { project } => {
            let tasks = TimerService::new(dataset).timer_tasks(project);
            ConsoleJson::new(out).show(&tasks)?;
        }
        SubCommands::Tags => {
            let tags = TimerService::new(dataset).timer_tags();
            ConsoleJson::new(out).show(&tags)?;
        }
        SubCommands::Favorites => {
            let favorites = FavoriteBook::new(dataset).my_favorites(session);
            ConsoleJson::new(out).show(&favorites)?;
        }
        SubCommands::Favorite(FavoriteCommands::Add {
            name,
            project,
            task,
            tags,
        }) => {
            let id = FavoriteBook::new(dataset).add_favorite(
                session,
                NewFavorite {
                    user: session.user.clone(),
                    name,
                    project_id: project,
                    task_id: task,
                    tag_ids: tags,
                },
            )?;
            ConsoleJson::new(out).show(&id)?;
        }
        SubCommands::Favorite(FavoriteCommands::Use { ids }) => {
            FavoriteBook::new(dataset).increment_use(session, &ids)?;
            ConsoleJson::new(out).show(&true)?;
        }
        SubCommands::Daily(daily) => {
            let json = daily.json;
            let entries = DailyCommand::new(&*dataset).run(session, daily)?;
            if json {
                let views = entries
                    .iter()
                    .map(|entry| EntryView::build(entry, &session.user, config.hours_per_day))
                    .collect::<Vec<_>>();
                ConsoleJson::new(out).show(&views)?;
            } else {
                ConsoleMarkdownList::new(out, config.hours_per_day).show_time_entries(&entries)?;
            }
        }
        SubCommands::Project(ProjectCommands::Add {
            name,
            no_timesheets,
        }) => {
            let project = dataset.create_project(&name, !no_timesheets)?;
            ConsoleJson::new(out).show(&NamedItem::from(&project))?;
        }
        SubCommands::Task(TaskCommands::Add { project, name }) => {
            let task = dataset.create_task(project, &name)?;
            ConsoleJson::new(out).show(&NamedItem::from(&task))?;
        }
        SubCommands::Tag(TagCommands::Add { name, color }) => {
            let tag = dataset.create_tag(&name, color)?;
            ConsoleJson::new(out).show(&TagItem::from(&tag))?;
        }
        SubCommands::Article(ArticleCommands::New {
            title,
            parent,
            format,
        }) => {
            let article = KnowledgeBase::new(dataset).create_article(NewArticle {
                title,
                parent_id: parent,
                format_type: format,
                format_data: None,
            })?;
            ConsoleJson::new(out).show(&article)?;
        }
        SubCommands::Article(ArticleCommands::Format { id, format, data }) => {
            let article = KnowledgeBase::new(dataset).change_format(id, format, data)?;
            ConsoleJson::new(out).show(&article)?;
        }
        SubCommands::Article(ArticleCommands::List) => {
            let articles = KnowledgeBase::new(dataset).sidebar_articles();
            ConsoleJson::new(out).show(&articles)?;
        }
        SubCommands::Article(ArticleCommands::Template { format }) => {
            writeln!(out, "{}", default_format_data(format)).context("Failed to write result")?;
        }
    }

    Ok(())
}

/// ローカル時刻の日時をパースする。秒は省略できる。
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let naive_datetime = NaiveDateTime::parse_from_str(s, datetime::DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .with_context(|| format!("Failed to parse datetime: {}", s))?;
    let datetime = Local
        .from_local_datetime(&naive_datetime)
        .single()
        .context("Failed to convert to DateTime<Local>")?
        .to_utc();

    Ok(datetime)
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone, Utc};
    use clap::Parser;

    use super::{parse_datetime, run, Args, SubCommands};
    use crate::config::Config;
    use crate::datetime::mock_datetime;
    use crate::repository::TimesheetRepository;
    use crate::store::Dataset;
    use crate::timer::Session;

    fn config() -> Config {
        Config {
            user: "alice".to_string(),
            store_path: "/tmp/unused.json".into(),
            hours_per_day: 8.0,
        }
    }

    /// コマンドラインを解析して実行し、出力を返す。
    fn exec(dataset: &mut Dataset, line: &[&str]) -> String {
        let args = Args::try_parse_from(
            std::iter::once("tstimer").chain(line.iter().copied()),
        )
        .unwrap();
        let mut out = Vec::new();
        run(
            args.subcommand,
            dataset,
            &Session::new("alice"),
            &config(),
            &mut out,
        )
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_timer_round_trip_through_cli() {
        let mut dataset = Dataset::new();
        exec(&mut dataset, &["project", "add", "Website"]);
        mock_datetime::set_mock_time(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());

        assert_eq!(exec(&mut dataset, &["status"]), "false\n");
        let started = exec(&mut dataset, &["start", "-p", "1", "-d", "Report"]);
        assert!(started.contains("\"name\":\"Report\""));
        assert!(started.contains("\"project_name\":\"Website\""));

        mock_datetime::set_mock_time(Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap());
        assert_eq!(
            exec(&mut dataset, &["stop"]),
            "{\"id\":2,\"duration\":0.5}\n"
        );
        assert_eq!(exec(&mut dataset, &["stop"]), "false\n");
    }

    #[test]
    fn test_start_from_favorite_counts_use() {
        let mut dataset = Dataset::new();
        exec(&mut dataset, &["project", "add", "Website"]);
        exec(&mut dataset, &["favorite", "add", "-n", "Standup", "-p", "1"]);

        let started = exec(&mut dataset, &["start", "-f", "2"]);

        assert!(started.contains("\"name\":\"Standup\""));
        assert_eq!(dataset.favorite(2).unwrap().use_count, 1);
    }

    #[test]
    fn test_update_clears_task_through_cli() {
        let mut dataset = Dataset::new();
        exec(&mut dataset, &["project", "add", "Website"]);
        exec(&mut dataset, &["task", "add", "1", "Landing"]);
        exec(&mut dataset, &["start", "-p", "1", "-t", "2"]);

        let updated = exec(&mut dataset, &["update", "--clear-task"]);

        assert!(updated.contains("\"task_id\":null"));
    }

    #[test]
    fn test_set_end_reports_time_control() {
        let mut dataset = Dataset::new();
        exec(&mut dataset, &["project", "add", "Website"]);
        mock_datetime::set_mock_time(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        exec(&mut dataset, &["start", "-p", "1"]);
        let end = Local
            .from_utc_datetime(
                &Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
                    .unwrap()
                    .naive_utc(),
            )
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let updated = exec(&mut dataset, &["set-end", "2", &end]);

        assert!(updated.contains("\"unit_amount\":1.5"));
        assert!(updated.contains("\"show_time_control\":\"resume\""));
        assert!(updated.contains("\"date_time_end\":\"2024-03-01 09:30:00\""));
    }

    #[test]
    fn test_article_template() {
        let mut dataset = Dataset::new();

        assert_eq!(exec(&mut dataset, &["article", "template", "article"]), "{}\n");
    }

    #[test]
    fn test_start_requires_project_or_favorite() {
        let args = Args::try_parse_from(["tstimer", "start", "-d", "x"]);

        assert!(args.is_err());
    }

    #[test]
    fn test_update_args() {
        let args = Args::try_parse_from(["tstimer", "update", "-p", "3", "--clear-tags"]).unwrap();

        match args.subcommand {
            SubCommands::Update(update) => {
                let update = update.into_update();
                assert_eq!(update.project_id, Some(Some(3)));
                assert_eq!(update.task_id, None);
                assert_eq!(update.tag_ids, Some(vec![]));
            }
            other => panic!("Unexpected subcommand: {:?}", other),
        }
    }

    #[test]
    fn test_parse_datetime() {
        let expected = Local
            .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
            .unwrap()
            .to_utc();

        assert_eq!(parse_datetime("2024-03-01 09:30:00").unwrap(), expected);
        assert_eq!(parse_datetime("2024-03-01 09:30").unwrap(), expected);
        assert!(parse_datetime("09:30").is_err());
    }
}
