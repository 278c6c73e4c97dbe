// 🧭 Selection Navigator - Cyclic next/previous over the latest result list
//
// The cursor is a name, not an index, so it survives re-filtering. A cursor
// that is not in the current list counts as index -1: "next" lands on the
// first visible entry and "previous" on the last.

use crate::catalog::CatalogEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionNavigator {
    cursor: Option<String>,
}

impl SelectionNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected name, which may be filtered out of view
    pub fn selected(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Direct set; not checked against any result list
    pub fn select(&mut self, name: &str) {
        self.cursor = Some(name.to_string());
    }

    pub fn clear(&mut self) {
        self.cursor = None;
    }

    /// Index of the cursor in `results`, or -1 when absent
    fn position(&self, results: &[&CatalogEntry]) -> isize {
        self.cursor
            .as_deref()
            .and_then(|name| results.iter().position(|e| e.name == name))
            .map(|i| i as isize)
            .unwrap_or(-1)
    }

    /// Move forward with wraparound. No-op on an empty list.
    pub fn select_next(&mut self, results: &[&CatalogEntry]) -> Option<&str> {
        if !results.is_empty() {
            let len = results.len() as isize;
            let next = (self.position(results) + 1).rem_euclid(len);
            self.cursor = Some(results[next as usize].name.clone());
        }
        self.selected()
    }

    /// Move backward with wraparound. No-op on an empty list.
    pub fn select_previous(&mut self, results: &[&CatalogEntry]) -> Option<&str> {
        if !results.is_empty() {
            let len = results.len() as isize;
            let previous = (self.position(results) - 1 + len).rem_euclid(len);
            self.cursor = Some(results[previous as usize].name.clone());
        }
        self.selected()
    }

    /// The selected entry if it is part of `results`
    pub fn selected_entry<'c>(&self, results: &[&'c CatalogEntry]) -> Option<&'c CatalogEntry> {
        let name = self.cursor.as_deref()?;
        results.iter().find(|e| e.name == name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<CatalogEntry> {
        ["A", "B", "C"]
            .iter()
            .map(|n| CatalogEntry::new(n, "X", "Attaque", "Droite", 30.0))
            .collect()
    }

    #[test]
    fn test_next_wraps_around() {
        let owned = entries();
        let results: Vec<&CatalogEntry> = owned.iter().collect();
        let mut nav = SelectionNavigator::new();
        nav.select("B");

        assert_eq!(nav.select_next(&results), Some("C"));
        assert_eq!(nav.select_next(&results), Some("A"));
    }

    #[test]
    fn test_next_from_nothing_lands_on_first() {
        let owned = entries();
        let results: Vec<&CatalogEntry> = owned.iter().collect();
        let mut nav = SelectionNavigator::new();

        assert_eq!(nav.select_next(&results), Some("A"));
    }

    #[test]
    fn test_previous_wraps_around() {
        let owned = entries();
        let results: Vec<&CatalogEntry> = owned.iter().collect();
        let mut nav = SelectionNavigator::new();
        nav.select("A");

        assert_eq!(nav.select_previous(&results), Some("C"));
        assert_eq!(nav.select_previous(&results), Some("B"));
    }

    #[test]
    fn test_previous_from_nothing_lands_on_last() {
        let owned = entries();
        let results: Vec<&CatalogEntry> = owned.iter().collect();
        let mut nav = SelectionNavigator::new();

        assert_eq!(nav.select_previous(&results), Some("C"));
    }

    #[test]
    fn test_empty_list_is_noop() {
        let mut nav = SelectionNavigator::new();
        nav.select("B");
        assert_eq!(nav.select_next(&[]), Some("B"));
        assert_eq!(nav.select_previous(&[]), Some("B"));

        nav.clear();
        assert_eq!(nav.select_next(&[]), None);
    }

    #[test]
    fn test_filtered_out_selection_restarts_at_first() {
        let owned = entries();
        let visible: Vec<&CatalogEntry> = owned.iter().filter(|e| e.name != "B").collect();
        let mut nav = SelectionNavigator::new();
        nav.select("B");

        assert!(nav.selected_entry(&visible).is_none());
        assert_eq!(nav.select_next(&visible), Some("A"));
    }

    #[test]
    fn test_select_outside_results_is_allowed() {
        let owned = entries();
        let results: Vec<&CatalogEntry> = owned.iter().collect();
        let mut nav = SelectionNavigator::new();

        nav.select("Z");
        assert_eq!(nav.selected(), Some("Z"));
        assert!(nav.selected_entry(&results).is_none());

        nav.select("C");
        assert_eq!(nav.selected_entry(&results).map(|e| e.name.as_str()), Some("C"));
    }

    #[test]
    fn test_single_item_list() {
        let owned = entries();
        let results: Vec<&CatalogEntry> = owned.iter().take(1).collect();
        let mut nav = SelectionNavigator::new();

        assert_eq!(nav.select_next(&results), Some("A"));
        assert_eq!(nav.select_next(&results), Some("A"));
        assert_eq!(nav.select_previous(&results), Some("A"));
    }
}
