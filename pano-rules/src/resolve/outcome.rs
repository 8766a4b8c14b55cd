use std::fmt;

/// Reserved wildcard; never looked up.
pub const ANY: &str = "any";

pub const UNKNOWN_PREFIX: &str = "UNKNOWN:";
pub const DYNAMIC_PREFIX: &str = "DAG:";
pub const CYCLE_PREFIX: &str = "CYCLE:";

/// Result of resolving one reference (or one member of an expanded group).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Concrete leaf value, or the `any` wildcard.
    Value(String),
    /// Name not defined in any scope on the lookup path.
    Unknown(String),
    /// Name is a dynamic address group.
    Dynamic(String),
    /// Name was revisited while its own expansion was in progress.
    Cycle(String),
}

impl Outcome {
    pub fn is_marker(&self) -> bool {
        !matches!(self, Self::Value(_))
    }

    /// Classify an already rendered result string.
    pub fn parse(raw: &str) -> Self {
        if let Some(name) = raw.strip_prefix(UNKNOWN_PREFIX) {
            Self::Unknown(name.to_string())
        } else if let Some(name) = raw.strip_prefix(DYNAMIC_PREFIX) {
            Self::Dynamic(name.to_string())
        } else if let Some(name) = raw.strip_prefix(CYCLE_PREFIX) {
            Self::Cycle(name.to_string())
        } else {
            Self::Value(raw.to_string())
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.write_str(value),
            Self::Unknown(name) => write!(f, "{UNKNOWN_PREFIX}{name}"),
            Self::Dynamic(name) => write!(f, "{DYNAMIC_PREFIX}{name}"),
            Self::Cycle(name) => write!(f, "{CYCLE_PREFIX}{name}"),
        }
    }
}

/// Render outcomes, dropping repeats while keeping first-seen order.
pub fn render_unique(outcomes: impl IntoIterator<Item = Outcome>) -> Vec<String> {
    dedup_strings(outcomes.into_iter().map(|o| o.to_string()))
}

/// Drop repeated strings while keeping first-seen order.
pub fn dedup_strings(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{render_unique, Outcome};

    #[test]
    fn markers_render_and_parse_back() {
        for outcome in [
            Outcome::Unknown("x".to_string()),
            Outcome::Dynamic("tagged".to_string()),
            Outcome::Cycle("loop".to_string()),
            Outcome::Value("10.0.0.1".to_string()),
        ] {
            assert_eq!(Outcome::parse(&outcome.to_string()), outcome);
        }
        assert!(!Outcome::parse("tcp/80").is_marker());
    }

    #[test]
    fn render_unique_keeps_first_occurrence() {
        let rendered = render_unique([
            Outcome::Value("b".to_string()),
            Outcome::Value("a".to_string()),
            Outcome::Value("b".to_string()),
        ]);
        assert_eq!(rendered, vec!["b", "a"]);
    }
}
