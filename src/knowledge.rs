use std::{fmt, str::FromStr};

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::TimerError;
use crate::repository::TimesheetRepository;

/// ナレッジ記事のフォーマット。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    #[default]
    Article,
    Presentation,
    Spreadsheet,
    Whiteboard,
}

impl FromStr for FormatType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "article" => Ok(Self::Article),
            "presentation" => Ok(Self::Presentation),
            "spreadsheet" => Ok(Self::Spreadsheet),
            "whiteboard" => Ok(Self::Whiteboard),
            _ => bail!("Unknown format type: {}", s),
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Article => "article",
            Self::Presentation => "presentation",
            Self::Spreadsheet => "spreadsheet",
            Self::Whiteboard => "whiteboard",
        };
        f.write_str(name)
    }
}

/// フォーマットごとの初期データ(JSON文字列)を返す。
pub fn default_format_data(format_type: FormatType) -> String {
    let data = match format_type {
        FormatType::Presentation => json!({
            "slides": [
                {
                    "id": 1,
                    "content": "<h2>Title Slide</h2><p>Click to edit</p>",
                }
            ],
            "theme": "white",
            "transition": "slide",
        }),
        FormatType::Spreadsheet => json!({
            "name": "Sheet1",
            "rows": {},
            "cols": {},
            "styles": [],
            "merges": [],
        }),
        FormatType::Whiteboard => json!({
            "elements": [],
            "appState": {
                "viewBackgroundColor": "#ffffff",
                "gridSize": null,
            },
            "files": {},
        }),
        FormatType::Article => json!({}),
    };
    data.to_string()
}

/// ナレッジ記事。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub format_type: FormatType,
    pub format_data: Option<String>,
}

/// 新規作成する記事の値。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub parent_id: Option<u64>,
    pub format_type: FormatType,
    pub format_data: Option<String>,
}

impl NewArticle {
    /// IDを割り当てて`Article`にする。
    ///
    /// 記事以外のフォーマットでデータがない場合は初期データを入れる。
    pub fn into_article(self, id: u64) -> Article {
        let format_data = match self.format_data {
            Some(data) if !data.is_empty() => Some(data),
            _ if self.format_type != FormatType::Article => {
                Some(default_format_data(self.format_type))
            }
            _ => None,
        };

        Article {
            id,
            title: self.title,
            parent_id: self.parent_id,
            format_type: self.format_type,
            format_data,
        }
    }
}

impl Article {
    /// フォーマットを変更する。
    ///
    /// 記事以外のフォーマットに変更する際、データが渡されなければ初期データで置き換える。
    pub fn change_format(&mut self, format_type: FormatType, format_data: Option<String>) {
        self.format_type = format_type;
        match format_data {
            Some(data) => self.format_data = Some(data),
            None if format_type != FormatType::Article => {
                self.format_data = Some(default_format_data(format_type));
            }
            None => {}
        }
    }
}

/// サイドバー表示用の記事の要約。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SidebarArticle {
    pub id: u64,
    pub name: String,
    pub parent_id: Option<u64>,
    pub format_type: FormatType,
}

impl From<&Article> for SidebarArticle {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            name: article.title.clone(),
            parent_id: article.parent_id,
            format_type: article.format_type,
        }
    }
}

/// 記事の作成とフォーマット変更を行う。
pub struct KnowledgeBase<'a, R: TimesheetRepository> {
    repository: &'a mut R,
}

impl<'a, R: TimesheetRepository> KnowledgeBase<'a, R> {
    pub fn new(repository: &'a mut R) -> Self {
        Self { repository }
    }

    /// 記事を作成する。親記事を指定する場合は存在すること。
    pub fn create_article(&mut self, values: NewArticle) -> Result<Article> {
        if let Some(parent_id) = values.parent_id {
            if self.repository.article(parent_id).is_none() {
                return Err(TimerError::ArticleNotFound(parent_id).into());
            }
        }
        let article = self
            .repository
            .create_article(values)
            .context("Failed to create article")?;
        info!("Created {} article {}", article.format_type, article.id);

        Ok(article)
    }

    /// 記事のフォーマットを変更する。
    pub fn change_format(
        &mut self,
        id: u64,
        format_type: FormatType,
        format_data: Option<String>,
    ) -> Result<Article> {
        let mut article = self
            .repository
            .article(id)
            .ok_or(TimerError::ArticleNotFound(id))?;
        article.change_format(format_type, format_data);
        self.repository
            .write_article(&article)
            .with_context(|| format!("Failed to update article {}", id))?;

        Ok(article)
    }

    /// サイドバーに表示する記事の一覧をフォーマット付きで返す。
    pub fn sidebar_articles(&self) -> Vec<SidebarArticle> {
        self.repository
            .articles()
            .iter()
            .map(SidebarArticle::from)
            .collect()
    }
}
