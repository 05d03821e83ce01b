//! Content policy applied to freshly extracted decrees.

use tracing::debug;

use crate::models::{FilterField, FilterRule, FilterType, RuleMatcher};
use crate::repository::{DbContext, DbError};

/// Lowercase phrases marking an appointment decree. These are always
/// excluded, before any configured rule is consulted.
pub const NOMINATION_PATTERNS: &[&str] = &[
    "nomination",
    "portant nomination",
    "portant nominations",
    "nommé",
    "nommée",
    "est nommé",
    "sont nommés",
];

/// Why a document was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Nomination,
    Rule(String),
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::Nomination => f.write_str("nomination"),
            Exclusion::Rule(id) => write!(f, "rule {}", id),
        }
    }
}

/// Values a rule can be matched against. Missing fields are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct Candidate<'a> {
    pub title: Option<&'a str>,
    pub text: Option<&'a str>,
    pub url: &'a str,
    pub tag: Option<&'a str>,
    pub category: Option<&'a str>,
}

impl<'a> Candidate<'a> {
    fn field(&self, field: FilterField) -> Option<&'a str> {
        match field {
            FilterField::Title => self.title,
            FilterField::Text => self.text,
            FilterField::Url => Some(self.url),
            FilterField::Tag => self.tag,
            FilterField::Category => self.category,
        }
    }
}

/// An active rule with its pattern compiled.
#[derive(Debug, Clone)]
struct CompiledRule {
    id: String,
    field: FilterField,
    matcher: RuleMatcher,
}

impl From<FilterRule> for CompiledRule {
    fn from(rule: FilterRule) -> Self {
        Self {
            matcher: rule.compile(),
            id: rule.id,
            field: rule.field,
        }
    }
}

pub fn is_nomination(candidate: &Candidate<'_>) -> bool {
    let title = candidate.title.unwrap_or_default().to_lowercase();
    let text = candidate.text.unwrap_or_default().to_lowercase();
    NOMINATION_PATTERNS
        .iter()
        .any(|p| title.contains(p) || text.contains(p))
}

/// Active exclusion rules, loaded once per scan.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    rules: Vec<CompiledRule>,
}

impl ExclusionPolicy {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| r.active && r.rule_type == FilterType::Exclude)
            .map(CompiledRule::from)
            .collect();
        Self { rules }
    }

    pub async fn load(ctx: &DbContext) -> Result<Self, DbError> {
        let rules = ctx.filters().active(FilterType::Exclude).await?;
        debug!("Loaded {} active exclusion rules", rules.len());
        Ok(Self::new(rules))
    }

    /// Decide whether `candidate` must not be stored.
    ///
    /// Include rules are matched nowhere: they carry no action yet.
    pub fn check(&self, candidate: &Candidate<'_>) -> Option<Exclusion> {
        if is_nomination(candidate) {
            return Some(Exclusion::Nomination);
        }
        self.rules
            .iter()
            .find(|rule| {
                candidate
                    .field(rule.field)
                    .filter(|value| !value.is_empty())
                    .is_some_and(|value| rule.matcher.is_match(value))
            })
            .map(|rule| Exclusion::Rule(rule.id.clone()))
    }
}

/// Active protect rules. A document is protected when any rule on `tag` or
/// `category` matches; rules on other fields are ignored.
#[derive(Debug, Clone, Default)]
pub struct ProtectionPolicy {
    rules: Vec<CompiledRule>,
}

impl ProtectionPolicy {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| r.active && r.rule_type == FilterType::Protect)
            .filter(|r| matches!(r.field, FilterField::Tag | FilterField::Category))
            .map(CompiledRule::from)
            .collect();
        Self { rules }
    }

    pub async fn load(ctx: &DbContext) -> Result<Self, DbError> {
        Ok(Self::new(ctx.filters().active(FilterType::Protect).await?))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn protects(&self, tag: Option<&str>, category: Option<&str>) -> bool {
        self.rules.iter().any(|rule| {
            let value = match rule.field {
                FilterField::Tag => tag,
                _ => category,
            };
            rule.matcher.is_match(value.unwrap_or_default())
        })
    }
}
