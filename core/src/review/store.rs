use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use ulid::Ulid;

/// One checker decision for a single output: approve or reject, with an
/// optional comment for the researcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub state: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A submitted review of one outputs document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Path of the metadata document the decisions apply to.
    pub path: PathBuf,
    /// Free-text overall comment for the whole release.
    #[serde(default)]
    pub comment: Option<String>,
    /// Decisions keyed by output id.
    pub decisions: BTreeMap<String, ReviewDecision>,
}

impl Review {
    /// Output ids the checker approved.
    pub fn approved_outputs(&self) -> Vec<String> {
        self.decisions
            .iter()
            .filter(|(_, d)| d.state)
            .map(|(uid, _)| uid.clone())
            .collect()
    }
}

/// Holds in-flight reviews between submission and export.
///
/// Injectable so callers choose the lifetime of review state instead of
/// inheriting a process global; the in-memory map below is the single
/// process default.
pub trait ReviewStore {
    fn create(&mut self, review: Review) -> String;
    fn get(&self, id: &str) -> Option<&Review>;
    fn delete(&mut self, id: &str) -> Option<Review>;
}

#[derive(Debug, Default)]
pub struct InMemoryReviewStore {
    reviews: HashMap<String, Review>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReviewStore for InMemoryReviewStore {
    fn create(&mut self, review: Review) -> String {
        let id = Ulid::new().to_string();
        self.reviews.insert(id.clone(), review);
        id
    }

    fn get(&self, id: &str) -> Option<&Review> {
        self.reviews.get(id)
    }

    fn delete(&mut self, id: &str) -> Option<Review> {
        self.reviews.remove(id)
    }
}
