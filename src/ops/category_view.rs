use crate::model::project::{CategoryFilter, Project, ProjectId};
use crate::ops::collection::ProjectCollection;

/// Projects visible under `filter`, in collection order.
pub fn view<'a>(collection: &'a ProjectCollection, filter: CategoryFilter) -> Vec<&'a Project> {
    collection.iter().filter(|p| filter.matches(p)).collect()
}

/// Ids visible under `filter`, in collection order.
pub fn view_ids(collection: &ProjectCollection, filter: CategoryFilter) -> Vec<ProjectId> {
    collection
        .iter()
        .filter(|p| filter.matches(p))
        .map(|p| p.id.clone())
        .collect()
}

/// Project count per selector, `All Projects` first
pub fn counts(collection: &ProjectCollection) -> Vec<(CategoryFilter, usize)> {
    CategoryFilter::choices()
        .map(|f| (f, collection.iter().filter(|p| f.matches(p)).count()))
        .collect()
}
