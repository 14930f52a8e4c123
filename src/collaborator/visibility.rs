use crate::Subject;
use crate::VisibilityConfig;

/// Decides whether a cell shows up in the log at all
pub trait VisibilityPolicy: Send + Sync {
    fn is_visible(
        &self,
        subject: &Subject,
    ) -> bool;
}

impl<F> VisibilityPolicy for F
where F: Fn(&Subject) -> bool + Send + Sync
{
    fn is_visible(
        &self,
        subject: &Subject,
    ) -> bool {
        self(subject)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl VisibilityPolicy for AllowAll {
    fn is_visible(
        &self,
        _subject: &Subject,
    ) -> bool {
        true
    }
}

/// Hides cells whose label starts with one of the configured prefixes.
/// Unlabeled and reclaimed cells are always visible.
#[derive(Debug, Clone, Default)]
pub struct LabelPrefixFilter {
    hidden_prefixes: Vec<String>,
}

impl LabelPrefixFilter {
    pub fn new(hidden_prefixes: Vec<String>) -> Self {
        Self { hidden_prefixes }
    }

    pub fn from_config(config: &VisibilityConfig) -> Self {
        Self::new(config.hidden_prefixes.clone())
    }
}

impl VisibilityPolicy for LabelPrefixFilter {
    fn is_visible(
        &self,
        subject: &Subject,
    ) -> bool {
        match subject.label() {
            Some(label) => !self.hidden_prefixes.iter().any(|p| label.starts_with(p.as_str())),
            None => true,
        }
    }
}
