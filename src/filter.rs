// 🔍 Facet Filter Engine - Multi-facet predicate composition
//
// AND across facets, OR within a multi-select facet.
// An empty selection set never constrains its facet.

use crate::catalog::CatalogEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// WEIGHT BUCKETS
// ============================================================================

/// Fixed, contiguous weight ranges with inclusive upper bounds
///
/// On a boundary the lower bucket wins (20 is `UpTo20`, never `From20To40`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeightBucket {
    /// [0, 20]
    #[serde(rename = "0 à 20")]
    UpTo20,

    /// (20, 40]
    #[serde(rename = "20 à 40")]
    From20To40,

    /// (40, 60]
    #[serde(rename = "40 à 60")]
    From40To60,

    /// (60, ∞)
    #[serde(rename = "60+")]
    Over60,
}

impl WeightBucket {
    pub const ALL: [WeightBucket; 4] = [
        WeightBucket::UpTo20,
        WeightBucket::From20To40,
        WeightBucket::From40To60,
        WeightBucket::Over60,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WeightBucket::UpTo20 => "0 à 20",
            WeightBucket::From20To40 => "20 à 40",
            WeightBucket::From40To60 => "40 à 60",
            WeightBucket::Over60 => "60+",
        }
    }

    /// The single bucket a weight falls into
    pub fn for_weight(weight: f64) -> WeightBucket {
        if weight <= 20.0 {
            WeightBucket::UpTo20
        } else if weight <= 40.0 {
            WeightBucket::From20To40
        } else if weight <= 60.0 {
            WeightBucket::From40To60
        } else {
            WeightBucket::Over60
        }
    }

    pub fn contains(&self, weight: f64) -> bool {
        WeightBucket::for_weight(weight) == *self
    }
}

impl fmt::Display for WeightBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WeightBucket {
    type Err = String;

    /// Accepts display labels and short codes (`0-20`, `20-40`, `40-60`, `60+`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0 à 20" | "0-20" => Ok(WeightBucket::UpTo20),
            "20 à 40" | "20-40" => Ok(WeightBucket::From20To40),
            "40 à 60" | "40-60" => Ok(WeightBucket::From40To60),
            "60+" => Ok(WeightBucket::Over60),
            other => Err(format!("Unknown weight bucket: {}", other)),
        }
    }
}

// ============================================================================
// OWNERSHIP STATE FACET
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OwnershipState {
    #[serde(rename = "Possédée")]
    Owned,

    #[serde(rename = "Non possédée")]
    NotOwned,
}

impl OwnershipState {
    pub const ALL: [OwnershipState; 2] = [OwnershipState::Owned, OwnershipState::NotOwned];

    pub fn label(&self) -> &'static str {
        match self {
            OwnershipState::Owned => "Possédée",
            OwnershipState::NotOwned => "Non possédée",
        }
    }
}

impl fmt::Display for OwnershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OwnershipState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Possédée" | "owned" => Ok(OwnershipState::Owned),
            "Non possédée" | "not-owned" => Ok(OwnershipState::NotOwned),
            other => Err(format!("Unknown ownership state: {}", other)),
        }
    }
}

// ============================================================================
// GROUP SELECTION
// ============================================================================

/// Label shown for the "every group" choice
pub const ALL_GROUPS_LABEL: &str = "Toutes";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupSelection {
    #[default]
    All,
    Only(String),
}

impl GroupSelection {
    pub fn label(&self) -> &str {
        match self {
            GroupSelection::All => ALL_GROUPS_LABEL,
            GroupSelection::Only(group) => group,
        }
    }
}

impl From<&str> for GroupSelection {
    fn from(s: &str) -> Self {
        if s == ALL_GROUPS_LABEL || s.eq_ignore_ascii_case("all") {
            GroupSelection::All
        } else {
            GroupSelection::Only(s.to_string())
        }
    }
}

// ============================================================================
// FILTER STATE
// ============================================================================

/// FilterState - the current query, held for the session only
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterState {
    pub group: GroupSelection,
    pub search: String,
    pub types: BTreeSet<String>,
    pub rotations: BTreeSet<String>,
    pub weights: BTreeSet<WeightBucket>,
    pub ownership: BTreeSet<OwnershipState>,
}

/// Add the value if absent, remove it if present. Returns whether it is now selected.
fn toggle_in<T: Ord>(set: &mut BTreeSet<T>, value: T) -> bool {
    if set.remove(&value) {
        false
    } else {
        set.insert(value);
        true
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_group(&mut self, group: GroupSelection) {
        self.group = group;
    }

    pub fn set_search(&mut self, search: &str) {
        self.search = search.to_string();
    }

    pub fn toggle_type(&mut self, kind: &str) -> bool {
        toggle_in(&mut self.types, kind.to_string())
    }

    pub fn toggle_rotation(&mut self, rotation: &str) -> bool {
        toggle_in(&mut self.rotations, rotation.to_string())
    }

    pub fn toggle_weight(&mut self, bucket: WeightBucket) -> bool {
        toggle_in(&mut self.weights, bucket)
    }

    pub fn toggle_ownership(&mut self, state: OwnershipState) -> bool {
        toggle_in(&mut self.ownership, state)
    }

    /// Reset every facet, the group and the search
    pub fn clear(&mut self) {
        *self = FilterState::default();
    }

    /// True when the state matches the whole catalog
    pub fn is_unconstrained(&self) -> bool {
        self.group == GroupSelection::All
            && self.search.is_empty()
            && self.types.is_empty()
            && self.rotations.is_empty()
            && self.weights.is_empty()
            && self.ownership.is_empty()
    }
}

// ============================================================================
// PER-FACET PREDICATES
// ============================================================================

pub fn matches_group(entry: &CatalogEntry, group: &GroupSelection) -> bool {
    match group {
        GroupSelection::All => true,
        GroupSelection::Only(g) => entry.group == *g,
    }
}

/// Case-insensitive substring match on the name; `needle` must already be lowercase
pub fn matches_search(entry: &CatalogEntry, needle: &str) -> bool {
    needle.is_empty() || entry.name.to_lowercase().contains(needle)
}

pub fn matches_type(entry: &CatalogEntry, types: &BTreeSet<String>) -> bool {
    types.is_empty() || types.contains(&entry.kind)
}

pub fn matches_rotation(entry: &CatalogEntry, rotations: &BTreeSet<String>) -> bool {
    rotations.is_empty() || rotations.contains(&entry.rotation)
}

pub fn matches_weight(entry: &CatalogEntry, weights: &BTreeSet<WeightBucket>) -> bool {
    weights.is_empty() || weights.iter().any(|bucket| bucket.contains(entry.weight))
}

pub fn matches_ownership(owned: bool, selection: &BTreeSet<OwnershipState>) -> bool {
    selection.is_empty()
        || (selection.contains(&OwnershipState::Owned) && owned)
        || (selection.contains(&OwnershipState::NotOwned) && !owned)
}

// ============================================================================
// FACET FILTER ENGINE
// ============================================================================

/// FacetFilterEngine - a FilterState prepared for repeated matching
///
/// Pure: ownership is only seen through the `is_owned` capability passed
/// to `matches`, so the engine never touches persistence.
pub struct FacetFilterEngine<'a> {
    state: &'a FilterState,
    needle: String,
}

impl<'a> FacetFilterEngine<'a> {
    pub fn new(state: &'a FilterState) -> Self {
        FacetFilterEngine {
            state,
            needle: state.search.to_lowercase(),
        }
    }

    pub fn matches<F>(&self, entry: &CatalogEntry, is_owned: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        matches_group(entry, &self.state.group)
            && matches_search(entry, &self.needle)
            && matches_type(entry, &self.state.types)
            && matches_rotation(entry, &self.state.rotations)
            && matches_weight(entry, &self.state.weights)
            // Only consult ownership when the facet is constrained
            && (self.state.ownership.is_empty()
                || matches_ownership(is_owned(&entry.name), &self.state.ownership))
    }
}

/// One-shot convenience over `FacetFilterEngine`
pub fn matches<F>(entry: &CatalogEntry, state: &FilterState, is_owned: F) -> bool
where
    F: Fn(&str) -> bool,
{
    FacetFilterEngine::new(state).matches(entry, is_owned)
}

// ============================================================================
// TESTS
// ============================================================================
