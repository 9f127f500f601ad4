//! Shared domain enumerations aligned with persisted database enums.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "difficulty", rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty `{other}`")),
        }
    }
}

/// Lookback window used by the trending query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendingWindow {
    Yesterday,
    Week,
    Year,
}

impl TrendingWindow {
    pub fn lookback(self) -> Duration {
        match self {
            TrendingWindow::Yesterday => Duration::days(1),
            TrendingWindow::Week => Duration::days(7),
            TrendingWindow::Year => Duration::days(365),
        }
    }

    /// Oldest creation time a post may have to count as trending right now.
    pub fn since(self, now: OffsetDateTime) -> OffsetDateTime {
        now - self.lookback()
    }
}

impl FromStr for TrendingWindow {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "yesterday" => Ok(TrendingWindow::Yesterday),
            "week" => Ok(TrendingWindow::Week),
            "year" => Ok(TrendingWindow::Year),
            other => Err(format!("unknown trending window `{other}`")),
        }
    }
}

/// Rendering family of a single post page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageKind {
    Markdown,
    Image,
    #[serde(rename = "PDF")]
    Pdf,
    Quiz,
}
