//! Way merging edit mode.
//!
//! While the mode is active only the candidate ways are clickable. Clicking
//! one merges it into the original way through the editor's [`EditLogic`];
//! the geometry and tag merge itself is the editor's business.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId {
    pub kind: ElementKind,
    pub id: i64,
}

impl ElementId {
    pub fn way(id: i64) -> Self {
        Self {
            kind: ElementKind::Way,
            id,
        }
    }

    pub fn node(id: i64) -> Self {
        Self {
            kind: ElementKind::Node,
            id,
        }
    }

    pub fn is_way(&self) -> bool {
        self.kind == ElementKind::Way
    }
}

/// One element produced by a merge, with any tag conflicts it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub element: ElementId,
    pub issues: Vec<String>,
}

impl MergeResult {
    pub fn has_issue(&self) -> bool {
        !self.issues.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Editor operations the mode relies on.
pub trait EditLogic {
    fn set_clickable_elements(&mut self, elements: Option<HashSet<ElementId>>);
    fn set_return_relations(&mut self, enabled: bool);
    fn find_mergeable_ways(&self, way: ElementId) -> HashSet<ElementId>;
    fn perform_merge(&mut self, way: ElementId, other: ElementId) -> Result<Vec<MergeResult>, MergeError>;
}

/// What the mode asks of the UI.
pub trait MergeUi {
    fn select_way(&mut self, way: ElementId);
    fn show_tag_conflict(&mut self, results: &[MergeResult]);
    fn error(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Handled,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct WayMergeMode {
    way: ElementId,
    candidates: HashSet<ElementId>,
}

impl WayMergeMode {
    pub fn new(way: ElementId, candidates: HashSet<ElementId>) -> Self {
        Self { way, candidates }
    }

    pub fn way(&self) -> ElementId {
        self.way
    }

    pub fn on_create(&self, logic: &mut dyn EditLogic) {
        logic.set_clickable_elements(Some(self.candidates.clone()));
        logic.set_return_relations(false);
    }

    pub fn handle_element_click(
        &self,
        logic: &mut dyn EditLogic,
        ui: &mut dyn MergeUi,
        element: ElementId,
    ) -> ClickOutcome {
        // touch events can race the clickable set
        if !element.is_way() {
            return ClickOutcome::Ignored;
        }
        if !logic.find_mergeable_ways(self.way).contains(&element) {
            return ClickOutcome::Ignored;
        }

        match logic.perform_merge(self.way, element) {
            Ok(results) => {
                let Some(first) = results.first() else {
                    tracing::warn!(way = self.way.id, other = element.id, "merge produced nothing");
                    return ClickOutcome::Handled;
                };
                ui.select_way(first.element);
                if results.len() > 1 || first.has_issue() {
                    ui.show_tag_conflict(&results);
                }
            }
            Err(MergeError::IllegalOperation(message)) => ui.error(&message),
            Err(err @ MergeError::NotFound(_)) => {
                tracing::debug!(%err, "merge target vanished");
            }
        }
        ClickOutcome::Handled
    }

    pub fn on_destroy(&self, logic: &mut dyn EditLogic) {
        logic.set_clickable_elements(None);
        logic.set_return_relations(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Logic {
        clickable: Option<HashSet<ElementId>>,
        return_relations: bool,
        mergeable: HashSet<ElementId>,
        merge_result: Option<Result<Vec<MergeResult>, MergeError>>,
        merges: usize,
    }

    impl EditLogic for Logic {
        fn set_clickable_elements(&mut self, elements: Option<HashSet<ElementId>>) {
            self.clickable = elements;
        }

        fn set_return_relations(&mut self, enabled: bool) {
            self.return_relations = enabled;
        }

        fn find_mergeable_ways(&self, _way: ElementId) -> HashSet<ElementId> {
            self.mergeable.clone()
        }

        fn perform_merge(&mut self, _way: ElementId, _other: ElementId) -> Result<Vec<MergeResult>, MergeError> {
            self.merges += 1;
            self.merge_result.take().unwrap_or(Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct Ui {
        selected: Vec<ElementId>,
        conflicts: usize,
        errors: Vec<String>,
    }

    impl MergeUi for Ui {
        fn select_way(&mut self, way: ElementId) {
            self.selected.push(way);
        }

        fn show_tag_conflict(&mut self, _results: &[MergeResult]) {
            self.conflicts += 1;
        }

        fn error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    fn setup() -> (WayMergeMode, Logic, Ui) {
        let candidates: HashSet<_> = [ElementId::way(2)].into_iter().collect();
        let mode = WayMergeMode::new(ElementId::way(1), candidates.clone());
        let logic = Logic {
            mergeable: candidates,
            return_relations: true,
            ..Default::default()
        };
        (mode, logic, Ui::default())
    }

    #[test]
    fn test_create_and_destroy_toggle_logic() {
        let (mode, mut logic, _) = setup();
        mode.on_create(&mut logic);
        assert_eq!(logic.clickable.as_ref().map(|c| c.len()), Some(1));
        assert!(!logic.return_relations);

        mode.on_destroy(&mut logic);
        assert!(logic.clickable.is_none());
        assert!(logic.return_relations);
    }

    #[test]
    fn test_non_way_and_unmergeable_ignored() {
        let (mode, mut logic, mut ui) = setup();
        assert_eq!(
            mode.handle_element_click(&mut logic, &mut ui, ElementId::node(2)),
            ClickOutcome::Ignored
        );
        assert_eq!(
            mode.handle_element_click(&mut logic, &mut ui, ElementId::way(99)),
            ClickOutcome::Ignored
        );
        assert_eq!(logic.merges, 0);
    }

    #[test]
    fn test_clean_merge_selects_result() {
        let (mode, mut logic, mut ui) = setup();
        logic.merge_result = Some(Ok(vec![MergeResult {
            element: ElementId::way(1),
            issues: vec![],
        }]));

        let outcome = mode.handle_element_click(&mut logic, &mut ui, ElementId::way(2));
        assert_eq!(outcome, ClickOutcome::Handled);
        assert_eq!(ui.selected, vec![ElementId::way(1)]);
        assert_eq!(ui.conflicts, 0);
    }

    #[test]
    fn test_conflicting_merge_shows_conflict() {
        let (mode, mut logic, mut ui) = setup();
        logic.merge_result = Some(Ok(vec![MergeResult {
            element: ElementId::way(1),
            issues: vec!["name".to_string()],
        }]));

        mode.handle_element_click(&mut logic, &mut ui, ElementId::way(2));
        assert_eq!(ui.conflicts, 1);
    }

    #[test]
    fn test_illegal_operation_reports_error() {
        let (mode, mut logic, mut ui) = setup();
        logic.merge_result = Some(Err(MergeError::IllegalOperation("ways not connected".to_string())));

        mode.handle_element_click(&mut logic, &mut ui, ElementId::way(2));
        assert_eq!(ui.errors, vec!["ways not connected".to_string()]);
        assert!(ui.selected.is_empty());
    }

    #[test]
    fn test_not_found_is_silent() {
        let (mode, mut logic, mut ui) = setup();
        logic.merge_result = Some(Err(MergeError::NotFound("way 2".to_string())));

        assert_eq!(
            mode.handle_element_click(&mut logic, &mut ui, ElementId::way(2)),
            ClickOutcome::Handled
        );
        assert!(ui.errors.is_empty());
    }
}
