use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::model::project::{Project, ProjectId};

/// Error type for collection operations.
///
/// Every variant indicates a client-side bug or a malformed authority
/// response, never a condition the user can fix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    #[error("duplicate project id: {0}")]
    DuplicateId(ProjectId),
    #[error("new order is not a permutation of the collection ({expected} ids held, {got} given)")]
    NotAPermutation { expected: usize, got: usize },
}

/// The signed-in user's projects in canonical order.
///
/// Keyed by id so each project appears at most once; the map's insertion
/// order is the portfolio order.
#[derive(Debug, Clone, Default)]
pub struct ProjectCollection {
    projects: IndexMap<ProjectId, Project>,
    stale: bool,
}

impl ProjectCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection, taking `projects` as the canonical order.
    /// A duplicate id rejects the load and leaves the collection untouched.
    pub fn load(&mut self, projects: Vec<Project>) -> Result<(), CollectionError> {
        let mut next = IndexMap::with_capacity(projects.len());
        for project in projects {
            if next.contains_key(&project.id) {
                return Err(CollectionError::DuplicateId(project.id));
            }
            next.insert(project.id.clone(), project);
        }
        self.projects = next;
        self.stale = false;
        Ok(())
    }

    /// Append to the end.
    pub fn insert(&mut self, project: Project) -> Result<(), CollectionError> {
        if self.projects.contains_key(&project.id) {
            return Err(CollectionError::DuplicateId(project.id));
        }
        self.projects.insert(project.id.clone(), project);
        Ok(())
    }

    /// Swap in a new record for `id`, keeping its position.
    /// Returns false (and does nothing) when `id` is absent.
    pub fn replace(&mut self, id: &ProjectId, project: Project) -> bool {
        match self.projects.get_mut(id) {
            Some(slot) => {
                *slot = Project {
                    id: id.clone(),
                    ..project
                };
                true
            }
            None => false,
        }
    }

    /// Remove `id`, shifting later projects up. No-op when absent.
    pub fn remove(&mut self, id: &ProjectId) -> Option<Project> {
        self.projects.shift_remove(id)
    }

    /// Replace the order wholesale. `new_order` must name every held id exactly once.
    pub fn reorder(&mut self, new_order: &[ProjectId]) -> Result<(), CollectionError> {
        let rank = self.rank_of(new_order)?;
        self.projects.sort_by(|a, _, b, _| rank[a].cmp(&rank[b]));
        Ok(())
    }

    /// Re-apply a captured order to the current membership.
    ///
    /// Ids in `snapshot` take their snapshot relative order; ids added since
    /// the capture follow them in their current relative order; ids removed
    /// since are skipped. The result is always a permutation of what is held.
    pub fn restore_order(&mut self, snapshot: &[ProjectId]) {
        let mut seen = HashSet::with_capacity(self.projects.len());
        let mut full: Vec<ProjectId> = snapshot
            .iter()
            .filter(|id| self.projects.contains_key(*id) && seen.insert((*id).clone()))
            .cloned()
            .collect();
        full.extend(self.projects.keys().filter(|id| !seen.contains(*id)).cloned());

        let restored = self.reorder(&full);
        debug_assert!(restored.is_ok(), "restore_order built a non-permutation");
    }

    pub fn clear(&mut self) {
        self.projects.clear();
        self.stale = false;
    }

    pub fn get(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.projects.contains_key(id)
    }

    pub fn index_of(&self, id: &ProjectId) -> Option<usize> {
        self.projects.get_index_of(id)
    }

    /// Current order as ids
    pub fn order(&self) -> Vec<ProjectId> {
        self.projects.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Set after a consistency failure; the next full load clears it.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn rank_of<'a>(
        &self,
        new_order: &'a [ProjectId],
    ) -> Result<HashMap<&'a ProjectId, usize>, CollectionError> {
        let mismatch = || CollectionError::NotAPermutation {
            expected: self.projects.len(),
            got: new_order.len(),
        };
        if new_order.len() != self.projects.len() {
            return Err(mismatch());
        }
        let mut rank = HashMap::with_capacity(new_order.len());
        for (i, id) in new_order.iter().enumerate() {
            if !self.projects.contains_key(id) || rank.insert(id, i).is_some() {
                return Err(mismatch());
            }
        }
        Ok(rank)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::project::Category;
    use pretty_assertions::assert_eq;

    pub(crate) fn project(id: &str, category: Category) -> Project {
        Project {
            id: ProjectId::new(id),
            name: format!("Project {}", id),
            description: format!("About {}", id),
            category,
            tech_stack: vec!["Rust".into()],
        }
    }

    pub(crate) fn ids(list: &[&str]) -> Vec<ProjectId> {
        list.iter().map(|s| ProjectId::new(*s)).collect()
    }

    fn sample() -> ProjectCollection {
        let mut c = ProjectCollection::new();
        c.load(vec![
            project("A", Category::WebApps),
            project("B", Category::Apis),
            project("C", Category::WebApps),
        ])
        .unwrap();
        c
    }

    #[test]
    fn test_load_keeps_given_order() {
        let c = sample();
        assert_eq!(c.order(), ids(&["A", "B", "C"]));
        assert_eq!(c.index_of(&ProjectId::new("C")), Some(2));
    }

    #[test]
    fn test_load_rejects_duplicates_without_mutating() {
        let mut c = sample();
        let err = c
            .load(vec![project("X", Category::Apis), project("X", Category::Apis)])
            .unwrap_err();
        assert_eq!(err, CollectionError::DuplicateId(ProjectId::new("X")));
        assert_eq!(c.order(), ids(&["A", "B", "C"]));
    }

    #[test]
    fn test_insert_appends_and_rejects_existing_id() {
        let mut c = sample();
        c.insert(project("D", Category::MobileApps)).unwrap();
        assert_eq!(c.order(), ids(&["A", "B", "C", "D"]));
        assert!(c.insert(project("A", Category::Apis)).is_err());
        assert_eq!(c.len(), 4);
    }

    #[test]
    fn test_replace_in_place_or_noop() {
        let mut c = sample();
        let mut renamed = project("B", Category::MobileApps);
        renamed.name = "Renamed".into();
        assert!(c.replace(&ProjectId::new("B"), renamed));
        assert_eq!(c.order(), ids(&["A", "B", "C"]));
        assert_eq!(c.get(&ProjectId::new("B")).unwrap().name, "Renamed");

        assert!(!c.replace(&ProjectId::new("Z"), project("Z", Category::Apis)));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_replace_pins_record_id() {
        let mut c = sample();
        assert!(c.replace(&ProjectId::new("A"), project("Q", Category::Apis)));
        assert_eq!(c.order(), ids(&["A", "B", "C"]));
        assert_eq!(c.get(&ProjectId::new("A")).unwrap().id, ProjectId::new("A"));
    }

    #[test]
    fn test_remove_shifts_remainder() {
        let mut c = sample();
        assert!(c.remove(&ProjectId::new("A")).is_some());
        assert_eq!(c.order(), ids(&["B", "C"]));
        assert!(c.remove(&ProjectId::new("A")).is_none());
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let mut c = sample();
        c.reorder(&ids(&["C", "A", "B"])).unwrap();
        assert_eq!(c.order(), ids(&["C", "A", "B"]));

        assert!(c.reorder(&ids(&["C", "A"])).is_err());
        assert!(c.reorder(&ids(&["C", "A", "A"])).is_err());
        assert!(c.reorder(&ids(&["C", "A", "Z"])).is_err());
        assert_eq!(c.order(), ids(&["C", "A", "B"]));
    }

    #[test]
    fn test_reorder_twice_is_idempotent() {
        let mut c = sample();
        let order = ids(&["B", "C", "A"]);
        c.reorder(&order).unwrap();
        c.reorder(&order).unwrap();
        assert_eq!(c.order(), order);
    }

    #[test]
    fn test_restore_order_tracks_live_membership() {
        let mut c = sample();
        let snapshot = c.order();
        c.reorder(&ids(&["C", "B", "A"])).unwrap();
        c.remove(&ProjectId::new("B"));
        c.insert(project("D", Category::Apis)).unwrap();

        c.restore_order(&snapshot);
        assert_eq!(c.order(), ids(&["A", "C", "D"]));
    }

    #[test]
    fn test_id_set_is_preserved_except_insert_remove() {
        let mut c = sample();
        let mut expected: Vec<ProjectId> = c.order();
        expected.sort();

        let steps: Vec<Vec<ProjectId>> = vec![
            ids(&["B", "A", "C"]),
            ids(&["C", "B", "A"]),
            ids(&["A", "C", "B"]),
        ];
        for step in steps {
            c.reorder(&step).unwrap();
            let mut now = c.order();
            now.sort();
            assert_eq!(now, expected);
        }

        c.insert(project("D", Category::Apis)).unwrap();
        assert_eq!(c.len(), 4);
        c.remove(&ProjectId::new("B"));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_stale_flag_cleared_by_load() {
        let mut c = sample();
        c.mark_stale();
        assert!(c.is_stale());
        c.load(vec![project("A", Category::Apis)]).unwrap();
        assert!(!c.is_stale());
    }
}
