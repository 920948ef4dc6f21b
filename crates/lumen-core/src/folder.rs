//! Folder titles derived from hierarchical `YYYY/MM[/DD]` paths.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::defaults::CLIP_TITLE;
use crate::text;

/// Path equal to the root itself.
pub const ROOT_PATH: &str = "/";

/// Category a folder path is relative to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Root {
    Originals,
    Import,
    Other(String),
}

impl Root {
    /// Title used for the root folder itself.
    pub fn default_title(&self) -> String {
        match self {
            Root::Originals => "Originals".to_string(),
            Root::Import => "Import".to_string(),
            Root::Other(name) => text::title_case(name.trim()),
        }
    }
}

/// A folder-like grouping of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub root: Root,
    /// Path without leading or trailing separators.
    pub path: String,
    pub title: String,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl Folder {
    pub fn new(root: Root, path: &str) -> Self {
        let path = path.trim_matches('/').to_string();
        let date = DateSegments::parse(&path);

        let title = if path.is_empty() {
            root.default_title()
        } else {
            date.as_ref()
                .and_then(|d| d.title(&root))
                .unwrap_or_else(|| basename_title(&path))
        };

        Self {
            year: date.as_ref().map(|d| d.year),
            month: date.as_ref().map(|d| d.month),
            day: date.as_ref().and_then(|d| d.day),
            root,
            path,
            title,
        }
    }
}

/// Leading numeric date segments of a path.
struct DateSegments {
    year: i32,
    month: u32,
    day: Option<u32>,
    /// Every segment of the path is part of the date.
    complete: bool,
}

impl DateSegments {
    fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').collect();
        let year = segments.first()?.parse::<i32>().ok()?;
        let month = segments.get(1)?.parse::<u32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)?;

        let day = segments
            .get(2)
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|d| NaiveDate::from_ymd_opt(year, month, *d).is_some());

        let complete = match segments.len() {
            2 => true,
            3 => day.is_some(),
            _ => false,
        };

        Some(Self {
            year,
            month,
            day,
            complete,
        })
    }

    fn title(&self, root: &Root) -> Option<String> {
        if !self.complete {
            return None;
        }

        let day = match (root, self.day) {
            (Root::Import, Some(day)) => day,
            _ => {
                let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
                return Some(first.format("%B %Y").to_string());
            }
        };

        let date = NaiveDate::from_ymd_opt(self.year, self.month, day)?;
        Some(date.format("%B %-d, %Y").to_string())
    }
}

fn basename_title(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    let spaced = base.replace(|c: char| c == '_' || c == '-', " ");
    text::clip(&text::title_case(spaced.trim()), CLIP_TITLE)
}
