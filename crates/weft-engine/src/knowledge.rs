//! Learned-selector storage.
//!
//! [`KnowledgeBase`] is the in-memory working set a run mutates;
//! [`KnowledgeStore`] reads and writes the whole set as one JSON file.
//! Loading never fails the run: a missing or malformed file just means
//! starting from an empty base.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use weft_common::knowledge::{
    CONTEXT_MATCH_THRESHOLD, EXACT_MATCH_THRESHOLD, Solution, SolutionFate, epoch_ms, solution_id,
};
use weft_common::{PageType, StepAction};

pub const KNOWLEDGE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk shape. Solutions are kept as a sorted list so the file diffs
/// cleanly and an unchanged base saves byte-identically.
#[derive(Debug, Serialize, Deserialize)]
struct KnowledgeFile {
    version: u32,
    last_updated: u64,
    solutions: Vec<Solution>,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    version: u32,
    last_updated: u64,
    solutions: HashMap<String, Solution>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        KnowledgeBase::empty()
    }
}

impl KnowledgeBase {
    pub fn empty() -> Self {
        KnowledgeBase {
            version: KNOWLEDGE_VERSION,
            last_updated: 0,
            solutions: HashMap::new(),
        }
    }

    fn from_file(file: KnowledgeFile) -> Self {
        KnowledgeBase {
            version: file.version,
            last_updated: file.last_updated,
            solutions: file
                .solutions
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect(),
        }
    }

    fn to_file(&self) -> KnowledgeFile {
        let mut solutions: Vec<Solution> = self.solutions.values().cloned().collect();
        solutions.sort_by(|a, b| a.id.cmp(&b.id));
        KnowledgeFile {
            version: self.version,
            last_updated: self.last_updated,
            solutions,
        }
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Solution> {
        self.solutions.get(id)
    }

    pub fn solutions(&self) -> impl Iterator<Item = &Solution> {
        self.solutions.values()
    }

    pub fn insert(&mut self, solution: Solution) {
        self.last_updated = epoch_ms();
        self.solutions.insert(solution.id.clone(), solution);
    }

    pub fn remove(&mut self, id: &str) -> Option<Solution> {
        let removed = self.solutions.remove(id);
        if removed.is_some() {
            self.last_updated = epoch_ms();
        }
        removed
    }

    /// Find a learned replacement for a failed selector.
    ///
    /// An entry recorded for exactly this `(action, selector)` pair wins
    /// when its confidence is above [`EXACT_MATCH_THRESHOLD`], whatever
    /// page it was learned on. Otherwise any entry for the same action
    /// on the same page type qualifies above [`CONTEXT_MATCH_THRESHOLD`];
    /// ties on confidence go to the most recently used entry.
    pub fn lookup(
        &self,
        action: StepAction,
        selector: &str,
        page_type: PageType,
    ) -> Option<&Solution> {
        let id = solution_id(action, selector);
        if let Some(solution) = self.solutions.get(&id)
            && solution.confidence > EXACT_MATCH_THRESHOLD
        {
            return Some(solution);
        }

        self.solutions
            .values()
            .filter(|s| {
                s.step_action == action
                    && s.page_context.page_type == page_type
                    && s.confidence > CONTEXT_MATCH_THRESHOLD
            })
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.last_used.cmp(&b.last_used))
            })
    }

    /// Reinforce an entry that just worked. Returns its new confidence.
    pub fn record_success(&mut self, id: &str) -> Option<f64> {
        let now = epoch_ms();
        let solution = self.solutions.get_mut(id)?;
        solution.record_success(now);
        let confidence = solution.confidence;
        self.last_updated = now;
        Some(confidence)
    }

    /// Penalize an entry that just failed, dropping it entirely once it
    /// falls below the discard threshold.
    pub fn record_failure(&mut self, id: &str) -> Option<SolutionFate> {
        let now = epoch_ms();
        let fate = self.solutions.get_mut(id)?.record_failure(now);
        if fate == SolutionFate::Discard {
            self.solutions.remove(id);
        }
        self.last_updated = now;
        Some(fate)
    }

    /// Drop every entry below `threshold`. Returns how many were removed.
    pub fn prune_below(&mut self, threshold: f64) -> usize {
        let before = self.solutions.len();
        self.solutions.retain(|_, s| s.confidence >= threshold);
        let removed = before - self.solutions.len();
        if removed > 0 {
            self.last_updated = epoch_ms();
        }
        removed
    }
}

/// Whole-file persistence for a [`KnowledgeBase`].
pub struct KnowledgeStore {
    path: PathBuf,
}

impl KnowledgeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        KnowledgeStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the base, treating a missing or unusable file as empty.
    pub async fn load(&self) -> KnowledgeBase {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No knowledge file at {}, starting empty", self.path.display());
                return KnowledgeBase::empty();
            }
            Err(e) => {
                warn!(
                    "Could not read knowledge file {}, starting empty: {}",
                    self.path.display(),
                    e
                );
                return KnowledgeBase::empty();
            }
        };

        match serde_json::from_str::<KnowledgeFile>(&content) {
            Ok(file) => {
                let kb = KnowledgeBase::from_file(file);
                debug!("Loaded {} learned solutions from {}", kb.len(), self.path.display());
                kb
            }
            Err(e) => {
                warn!(
                    "Malformed knowledge file {}, starting empty: {}",
                    self.path.display(),
                    e
                );
                KnowledgeBase::empty()
            }
        }
    }

    /// Overwrite the file with the full current base.
    pub async fn save(&self, kb: &KnowledgeBase) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&kb.to_file())?;
        fs::write(&self.path, json).await?;
        Ok(())
    }
}
