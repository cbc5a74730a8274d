use serde::{Deserialize, Serialize};

/// タイムシートを記録する対象のプロジェクト。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default = "default_true")]
    pub allow_timesheets: bool,
}

/// プロジェクトに属するタスク。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub name: String,
    pub project_id: u64,
}

/// タイムシートに付与するタグ。
///
/// プロジェクトやタスクとは独立した名前空間を持ち、名前は一意。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub color: i64,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// 名前順に並べ替えて先頭から`limit`件を返す。
pub fn sorted_by_name<T, F>(mut items: Vec<T>, name: F, limit: Option<usize>) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| name(a).cmp(name(b)));
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::{sorted_by_name, Project, Tag};

    #[test]
    fn test_sorted_by_name_with_limit() {
        let projects = ["Zeta", "Alpha", "Mid"]
            .iter()
            .enumerate()
            .map(|(i, name)| Project {
                id: i as u64 + 1,
                name: name.to_string(),
                allow_timesheets: true,
            })
            .collect::<Vec<_>>();

        let sorted = sorted_by_name(projects, |p| p.name.as_str(), Some(2));

        let names = sorted.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Alpha", "Mid"]);
    }

    /// 古いストアのタグは色と有効フラグを持たないことがある。
    #[test]
    fn test_tag_defaults_when_deserializing() {
        let tag: Tag = serde_json::from_str(r#"{"id": 3, "name": "review"}"#).unwrap();

        assert_eq!(tag.color, 0);
        assert!(tag.active);
    }
}
