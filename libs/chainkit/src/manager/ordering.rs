use serde::{Deserialize, Serialize};

/// The three per-phase module orders. Independent permutations of (a subset
/// of) the registered modules; a module missing from one is skipped in that
/// phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseOrderings {
    #[serde(default)]
    pub genesis: Vec<String>,
    #[serde(default)]
    pub begin: Vec<String>,
    #[serde(default)]
    pub end: Vec<String>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}

impl PhaseOrderings {
    /// Same order for every phase.
    pub fn uniform(names: &[&str]) -> Self {
        Self {
            genesis: owned(names),
            begin: owned(names),
            end: owned(names),
        }
    }

    #[must_use]
    pub fn genesis(mut self, names: &[&str]) -> Self {
        self.genesis = owned(names);
        self
    }

    #[must_use]
    pub fn begin(mut self, names: &[&str]) -> Self {
        self.begin = owned(names);
        self
    }

    #[must_use]
    pub fn end(mut self, names: &[&str]) -> Self {
        self.end = owned(names);
        self
    }

    /// Replaces each non-empty order of `other` into `self`.
    #[must_use]
    pub fn overridden_by(mut self, other: &PhaseOrderings) -> Self {
        if !other.genesis.is_empty() {
            self.genesis.clone_from(&other.genesis);
        }
        if !other.begin.is_empty() {
            self.begin.clone_from(&other.begin);
        }
        if !other.end.is_empty() {
            self.end.clone_from(&other.end);
        }
        self
    }
}
