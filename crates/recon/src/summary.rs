use std::collections::BTreeMap;

use serde::Serialize;

use crate::key::ContentKey;
use crate::model::{DeNormSpotCheckMismatch, MismatchState, SpotCheckContentType, SpotCheckMismatchType};

/// Row counts per lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub new: usize,
    pub existing: usize,
    pub resolved: usize,
}

impl StatusSummary {
    pub fn from_rows<K: ContentKey>(rows: &[DeNormSpotCheckMismatch<K>]) -> Self {
        Self::from_states(rows.iter().map(|r| r.state))
    }

    pub fn from_states(states: impl IntoIterator<Item = MismatchState>) -> Self {
        states.into_iter().fold(Self::default(), |mut acc, state| {
            match state {
                MismatchState::New => acc.new += 1,
                MismatchState::Existing => acc.existing += 1,
                MismatchState::Resolved => acc.resolved += 1,
            }
            acc
        })
    }

    pub fn count(&self, state: MismatchState) -> usize {
        match state {
            MismatchState::New => self.new,
            MismatchState::Existing => self.existing,
            MismatchState::Resolved => self.resolved,
        }
    }

    /// NEW + EXISTING.
    pub fn open(&self) -> usize {
        self.new + self.existing
    }
}

/// Row counts per mismatch type within one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    pub content_type: SpotCheckContentType,
    pub counts: BTreeMap<SpotCheckMismatchType, usize>,
    pub total: usize,
}

impl TypeSummary {
    /// Rows of other content types are skipped.
    pub fn from_rows<K: ContentKey>(content_type: SpotCheckContentType, rows: &[DeNormSpotCheckMismatch<K>]) -> Self {
        Self::from_types(
            content_type,
            rows.iter()
                .filter(|r| r.content_type == content_type)
                .map(|r| r.mismatch_type),
        )
    }

    pub fn from_types(
        content_type: SpotCheckContentType,
        types: impl IntoIterator<Item = SpotCheckMismatchType>,
    ) -> Self {
        let counts = types.into_iter().fold(BTreeMap::new(), |mut acc, t| {
            *acc.entry(t).or_insert(0) += 1;
            acc
        });
        let total = counts.values().sum();
        Self { content_type, counts, total }
    }

    pub fn count(&self, mismatch_type: SpotCheckMismatchType) -> usize {
        self.counts.get(&mismatch_type).copied().unwrap_or(0)
    }
}

/// Row counts per content type, across all mismatch types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentTypeSummary {
    pub counts: BTreeMap<SpotCheckContentType, usize>,
}

impl ContentTypeSummary {
    pub fn from_rows<K: ContentKey>(rows: &[DeNormSpotCheckMismatch<K>]) -> Self {
        Self::from_content_types(rows.iter().map(|r| r.content_type))
    }

    pub fn from_content_types(content_types: impl IntoIterator<Item = SpotCheckContentType>) -> Self {
        let counts = content_types.into_iter().fold(BTreeMap::new(), |mut acc, c| {
            *acc.entry(c).or_insert(0) += 1;
            acc
        });
        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, content_type: SpotCheckContentType) -> usize {
        self.counts.get(&content_type).copied().unwrap_or(0)
    }
}
