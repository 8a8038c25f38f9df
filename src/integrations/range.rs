//! Range filter: location-based species allow-list.

use crate::detection::SpeciesScore;
use crate::error::Result;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Source of location- and season-probable species.
///
/// Backed by the classifier's meta model; the pipeline refreshes its
/// allow-list through this contract once per day.
pub trait RangeProvider: Send + Sync {
    /// Species plausible at the deployment location on `for_date`, with
    /// occurrence scores at or above `floor`.
    ///
    /// # Errors
    ///
    /// Returns an error when the prediction fails.
    fn probable_species(&self, for_date: NaiveDate, floor: f32) -> Result<Vec<SpeciesScore>>;
}

/// The current allow-list and when it was last refreshed.
///
/// An empty list accepts every species; a populated list is matched
/// case-insensitively against the full `Scientific_Common` tag.
#[derive(Debug, Default)]
pub struct RangeFilterState {
    species: HashSet<String>,
    last_updated: Option<NaiveDate>,
}

impl RangeFilterState {
    /// Create a state with an initial species list.
    #[must_use]
    pub fn new(labels: impl IntoIterator<Item = String>, updated: Option<NaiveDate>) -> Self {
        Self {
            species: labels.into_iter().map(|l| l.to_lowercase()).collect(),
            last_updated: updated,
        }
    }

    /// Whether a species tag passes the allow-list.
    #[must_use]
    pub fn is_included(&self, species_tag: &str) -> bool {
        self.species.is_empty() || self.species.contains(&species_tag.to_lowercase())
    }

    /// Replace the list wholesale after a refresh.
    pub fn replace(&mut self, labels: impl IntoIterator<Item = String>, updated: NaiveDate) {
        self.species = labels.into_iter().map(|l| l.to_lowercase()).collect();
        self.last_updated = Some(updated);
    }

    /// Date of the last refresh.
    #[must_use]
    pub fn last_updated(&self) -> Option<NaiveDate> {
        self.last_updated
    }

    /// Number of species on the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// Whether the list is empty (accept-all).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_accepts_all() {
        let state = RangeFilterState::default();
        assert!(state.is_included("Turdus merula_Common Blackbird"));
    }

    #[test]
    fn test_populated_list_filters() {
        let state = RangeFilterState::new(
            vec!["Turdus merula_Common Blackbird".to_string()],
            None,
        );
        assert!(state.is_included("Turdus merula_Common Blackbird"));
        assert!(state.is_included("TURDUS MERULA_COMMON BLACKBIRD"));
        assert!(!state.is_included("Erithacus rubecula_European Robin"));
    }

    #[test]
    fn test_replace_updates_list_and_date() {
        let mut state = RangeFilterState::new(
            vec!["Turdus merula_Common Blackbird".to_string()],
            None,
        );
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        state.replace(vec!["Erithacus rubecula_European Robin".to_string()], today);

        assert!(!state.is_included("Turdus merula_Common Blackbird"));
        assert!(state.is_included("Erithacus rubecula_European Robin"));
        assert_eq!(state.last_updated(), Some(today));
    }
}
