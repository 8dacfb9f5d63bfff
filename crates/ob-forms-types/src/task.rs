//! Task type identity and name normalization.
//!
//! UI-facing names (`kyb`) differ from storage-facing names (`company_kyb`).
//! Both forms parse into the same [`TaskType`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one concrete task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a form template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub i64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The questionnaire families the engine knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Know Your Business
    Kyb,
    /// Know Your Third Party (S&P security assessment)
    Ky3p,
    /// Open Banking survey
    OpenBanking,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::Kyb, TaskType::Ky3p, TaskType::OpenBanking];

    /// Name used by UI routes and task lists.
    pub fn ui_name(&self) -> &'static str {
        match self {
            Self::Kyb => "kyb",
            Self::Ky3p => "ky3p",
            Self::OpenBanking => "open_banking",
        }
    }

    /// Name used by template storage and persistence endpoints.
    pub fn storage_name(&self) -> &'static str {
        match self {
            Self::Kyb => "company_kyb",
            Self::Ky3p => "sp_ky3p_assessment",
            Self::OpenBanking => "open_banking_survey",
        }
    }

    /// Exact match against storage names only.
    pub fn from_storage_name(name: &str) -> Option<Self> {
        let normalized = normalize(name);
        Self::ALL
            .into_iter()
            .find(|t| t.storage_name() == normalized)
    }

    /// Exact match against UI names only.
    pub fn from_ui_name(name: &str) -> Option<Self> {
        let normalized = normalize(name);
        Self::ALL.into_iter().find(|t| t.ui_name() == normalized)
    }

    /// Storage name for any accepted spelling, if one exists.
    pub fn canonical_name(name: &str) -> Option<&'static str> {
        name.parse::<TaskType>().ok().map(|t| t.storage_name())
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ui_name())
    }
}

/// Error returned when a name matches no task type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task type: {0}")]
pub struct ParseTaskTypeError(pub String);

impl FromStr for TaskType {
    type Err = ParseTaskTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_storage_name(s)
            .or_else(|| Self::from_ui_name(s))
            .ok_or_else(|| ParseTaskTypeError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_and_storage_names_resolve_to_same_type() {
        assert_eq!("kyb".parse::<TaskType>().unwrap(), TaskType::Kyb);
        assert_eq!("company_kyb".parse::<TaskType>().unwrap(), TaskType::Kyb);
        assert_eq!("Open-Banking".parse::<TaskType>().unwrap(), TaskType::OpenBanking);
        assert_eq!(
            TaskType::canonical_name("ky3p"),
            Some("sp_ky3p_assessment")
        );
    }

    #[test]
    fn test_storage_lookup_does_not_accept_ui_names() {
        assert_eq!(TaskType::from_storage_name("kyb"), None);
        assert_eq!(TaskType::from_ui_name("company_kyb"), None);
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let err = "card".parse::<TaskType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown task type: card");
    }
}
