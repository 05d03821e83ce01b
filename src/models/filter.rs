//! Exclusion / protection filter rules.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// What a matching rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Suppresses document persistence during a crawl.
    Exclude,
    /// Matched but carries no action.
    Include,
    /// Shields documents from budget-driven deletion.
    Protect,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclude => "exclude",
            Self::Include => "include",
            Self::Protect => "protect",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exclude" => Some(Self::Exclude),
            "include" => Some(Self::Include),
            "protect" => Some(Self::Protect),
            _ => None,
        }
    }
}

/// Document field a rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Title,
    Text,
    Url,
    Tag,
    Category,
}

impl FilterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Text => "text",
            Self::Url => "url",
            Self::Tag => "tag",
            Self::Category => "category",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "title" => Some(Self::Title),
            "text" => Some(Self::Text),
            "url" => Some(Self::Url),
            "tag" => Some(Self::Tag),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

/// How the pattern is compared. All modes are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterMode {
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Regex => "regex",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "contains" => Some(Self::Contains),
            "startsWith" | "starts_with" => Some(Self::StartsWith),
            "endsWith" | "ends_with" => Some(Self::EndsWith),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }
}

/// A configured filter rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub id: String,
    pub rule_type: FilterType,
    pub field: FilterField,
    pub mode: FilterMode,
    pub pattern: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl FilterRule {
    pub fn new(rule_type: FilterType, field: FilterField, mode: FilterMode, pattern: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_type,
            field,
            mode,
            pattern: pattern.to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Prepare the pattern for repeated matching.
    pub fn compile(&self) -> RuleMatcher {
        let pattern = self.pattern.to_lowercase();
        match self.mode {
            FilterMode::Contains => RuleMatcher::Contains(pattern),
            FilterMode::StartsWith => RuleMatcher::StartsWith(pattern),
            FilterMode::EndsWith => RuleMatcher::EndsWith(pattern),
            FilterMode::Regex => match RegexBuilder::new(&self.pattern)
                .case_insensitive(true)
                .build()
            {
                Ok(re) => RuleMatcher::Regex(re),
                Err(e) => {
                    tracing::warn!("Filter rule {} has an invalid regex: {}", self.id, e);
                    RuleMatcher::Never
                }
            },
        }
    }
}

/// A rule pattern compiled once. Text modes hold the lowercased pattern.
#[derive(Debug, Clone)]
pub enum RuleMatcher {
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Regex(Regex),
    /// Invalid regex.
    Never,
}

impl RuleMatcher {
    /// Case-insensitive test of `value`.
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(value),
            Self::Never => false,
            Self::Contains(p) => value.to_lowercase().contains(p.as_str()),
            Self::StartsWith(p) => value.to_lowercase().starts_with(p.as_str()),
            Self::EndsWith(p) => value.to_lowercase().ends_with(p.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(mode: FilterMode, pattern: &str) -> RuleMatcher {
        FilterRule::new(FilterType::Exclude, FilterField::Text, mode, pattern).compile()
    }

    #[test]
    fn test_modes_are_case_insensitive() {
        assert!(rule(FilterMode::Contains, "DÉCRET").is_match("un décret portant"));
        assert!(rule(FilterMode::StartsWith, "portant").is_match("Portant approbation"));
        assert!(rule(FilterMode::EndsWith, "ministres").is_match("Conseil des Ministres"));
        assert!(!rule(FilterMode::EndsWith, "conseil").is_match("Conseil des Ministres"));
    }

    #[test]
    fn test_regex_mode() {
        assert!(rule(FilterMode::Regex, r"^d[ée]cret\s+n").is_match("Décret N° 2024-001"));
        assert!(!rule(FilterMode::Regex, "([unclosed").is_match("anything"));
        assert!(matches!(rule(FilterMode::Regex, "([unclosed"), RuleMatcher::Never));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(FilterMode::from_str("startsWith"), Some(FilterMode::StartsWith));
        assert_eq!(FilterMode::from_str("ends_with"), Some(FilterMode::EndsWith));
        assert_eq!(FilterType::from_str("protect"), Some(FilterType::Protect));
        assert_eq!(FilterField::from_str("category"), Some(FilterField::Category));
    }
}
