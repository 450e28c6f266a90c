use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FlagError;

/// Category of a cross-item issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Foreshadowing,
    Continuity,
    Pacing,
    Character,
    Plot,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Foreshadowing => "foreshadowing",
            Self::Continuity => "continuity",
            Self::Pacing => "pacing",
            Self::Character => "character",
            Self::Plot => "plot",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueCategory {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "foreshadowing" => Ok(Self::Foreshadowing),
            "continuity" => Ok(Self::Continuity),
            "pacing" => Ok(Self::Pacing),
            "character" => Ok(Self::Character),
            "plot" => Ok(Self::Plot),
            _ => Err(FlagError::UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(FlagError::UnknownSeverity(s.to_string())),
        }
    }
}

/// Issue payload raised by whatever analyses an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub detail: String,
    pub severity: Severity,
}

impl Issue {
    pub fn new(category: IssueCategory, detail: impl Into<String>, severity: Severity) -> Self {
        Self {
            category,
            detail: detail.into(),
            severity,
        }
    }

    /// Build an issue from loosely typed input, rejecting unknown values.
    pub fn parse(category: &str, detail: &str, severity: &str) -> Result<Self, FlagError> {
        Ok(Self {
            category: category.parse()?,
            detail: detail.to_string(),
            severity: severity.parse()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    Open,
    Resolved,
}

/// A cross-item issue: something found while working on `discovered_in`
/// that has to be fixed in `affects_item`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub id: String,
    pub discovered_in: u32,
    pub affects_item: u32,
    pub issue: Issue,
    pub status: FlagStatus,
    /// Fix task created for this flag.
    pub fix_task_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Flag {
    pub fn is_open(&self) -> bool {
        self.status == FlagStatus::Open
    }
}
