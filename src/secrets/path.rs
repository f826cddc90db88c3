//! Secret path templates.

use thiserror::Error;

/// Placeholder replaced with the repository slug.
pub const PLACEHOLDER: &str = "%s";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathTemplateError {
    #[error("secret path template {0:?} has no %s placeholder for the repository slug")]
    MissingPlaceholder(String),

    #[error("secret path template {template:?} has {count} %s placeholders, expected exactly one")]
    TooManyPlaceholders { template: String, count: usize },
}

/// A store path with exactly one slot for the repository slug,
/// e.g. `secret/data/drone/%s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    prefix: String,
    suffix: String,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, PathTemplateError> {
        let count = template.matches(PLACEHOLDER).count();
        match count {
            0 => Err(PathTemplateError::MissingPlaceholder(template.to_string())),
            1 => {
                let (prefix, suffix) = template
                    .split_once(PLACEHOLDER)
                    .ok_or_else(|| PathTemplateError::MissingPlaceholder(template.to_string()))?;
                Ok(Self {
                    prefix: prefix.to_string(),
                    suffix: suffix.to_string(),
                })
            }
            count => Err(PathTemplateError::TooManyPlaceholders {
                template: template.to_string(),
                count,
            }),
        }
    }

    /// Substitute the slug. Callers validate the slug first.
    pub fn render(&self, slug: &str) -> String {
        format!("{}{}{}", self.prefix, slug, self.suffix)
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.prefix, PLACEHOLDER, self.suffix)
    }
}
