//! Drag-to-reorder: move planning and the remote reorder state machine.
//!
//! The coordinator never performs I/O. Starting a move hands back a
//! [`ReorderRequest`]; whoever runs the event loop sends it through the
//! gateway and feeds the outcome to [`ReorderCoordinator::settle`]. At most
//! one request is in flight at a time. Gestures that land while one is
//! pending are applied locally at once and coalesced into a single follow-up
//! request carrying the latest full order.

use tracing::{debug, error, warn};

use crate::gateway::GatewayError;
use crate::model::project::{CategoryFilter, ProjectId};
use crate::ops::category_view;
use crate::ops::collection::{CollectionError, ProjectCollection};

/// Outcome of a finished drag: `source` was dropped onto `destination`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragGesture {
    pub source: ProjectId,
    pub destination: ProjectId,
}

impl DragGesture {
    pub fn new(source: impl Into<ProjectId>, destination: impl Into<ProjectId>) -> Self {
        DragGesture {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Error type for reorder operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorderError {
    #[error("project not found: {0}")]
    Unknown(ProjectId),
    #[error("project {0} is not shown under the current category")]
    NotInView(ProjectId),
    #[error("reorder left the collection inconsistent: {0}")]
    Consistency(#[from] CollectionError),
    #[error("moving {0} would not produce the displayed order")]
    ViewMismatch(ProjectId),
}

/// New orders for one gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// The displayed (possibly filtered) order after the move
    pub view_order: Vec<ProjectId>,
    /// The whole collection's order after the move
    pub full_order: Vec<ProjectId>,
}

/// Remove the item at `from` and insert it at `to`.
pub fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) {
    let item = items.remove(from);
    items.insert(to, item);
}

/// Work out the orders a gesture produces.
///
/// `full` is the live collection order and `view` the live displayed order.
/// In the view the source takes the destination's index. In the full order
/// the source lands right before the destination when it moved up the view
/// and right after it when it moved down, so every project outside the
/// gesture keeps its relative place. Returns `None` for a drop onto itself.
pub fn plan_move(
    full: &[ProjectId],
    view: &[ProjectId],
    gesture: &DragGesture,
) -> Result<Option<MovePlan>, ReorderError> {
    let DragGesture {
        source,
        destination,
    } = gesture;
    if source == destination {
        return Ok(None);
    }
    for id in [source, destination] {
        if !full.contains(id) {
            return Err(ReorderError::Unknown(id.clone()));
        }
    }
    let position = |list: &[ProjectId], id: &ProjectId| list.iter().position(|x| x == id);
    let from = position(view, source).ok_or_else(|| ReorderError::NotInView(source.clone()))?;
    let to =
        position(view, destination).ok_or_else(|| ReorderError::NotInView(destination.clone()))?;

    let mut view_order = view.to_vec();
    array_move(&mut view_order, from, to);

    let mut full_order: Vec<ProjectId> = full.iter().filter(|id| *id != source).cloned().collect();
    let anchor = position(&full_order, destination)
        .ok_or_else(|| ReorderError::Unknown(destination.clone()))?;
    let insert_at = if from < to { anchor + 1 } else { anchor };
    full_order.insert(insert_at, source.clone());

    Ok(Some(MovePlan {
        view_order,
        full_order,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderState {
    Idle,
    /// One reorder call is in flight
    Pending,
}

/// A full order to send to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderRequest {
    pub ticket: u64,
    pub order: Vec<ProjectId>,
}

/// What happened when a reorder call came back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The authority holds the collection's current order
    Committed,
    /// The call succeeded but newer gestures landed meanwhile; send this next
    Resend(ReorderRequest),
    /// Not the in-flight ticket; nothing changed
    Discarded,
    /// The call failed and the collection is back at the last confirmed order
    RolledBack(GatewayError),
}

#[derive(Debug, Default)]
pub struct ReorderCoordinator {
    /// Last order the authority acknowledged
    confirmed: Vec<ProjectId>,
    in_flight: Option<ReorderRequest>,
    /// Local order changed while a call was in flight
    queued: bool,
    next_ticket: u64,
}

impl ReorderCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReorderState {
        if self.in_flight.is_some() {
            ReorderState::Pending
        } else {
            ReorderState::Idle
        }
    }

    pub fn confirmed(&self) -> &[ProjectId] {
        &self.confirmed
    }

    /// Take the collection's order as confirmed and forget anything pending.
    /// Called after every full load.
    pub fn reset(&mut self, collection: &ProjectCollection) {
        self.confirmed = collection.order();
        self.in_flight = None;
        self.queued = false;
    }

    /// The authority appended a new project.
    pub fn confirm_insert(&mut self, id: ProjectId) {
        if !self.confirmed.contains(&id) {
            self.confirmed.push(id);
        }
    }

    /// The authority deleted a project.
    pub fn confirm_remove(&mut self, id: &ProjectId) {
        self.confirmed.retain(|x| x != id);
    }

    /// Apply a drag gesture to the collection and start (or queue) the remote call.
    ///
    /// Ids are resolved against the live collection and the live view under
    /// `filter`; nothing cached from an earlier render is trusted.
    pub fn begin_move(
        &mut self,
        collection: &mut ProjectCollection,
        filter: CategoryFilter,
        gesture: &DragGesture,
    ) -> Result<Option<ReorderRequest>, ReorderError> {
        let before = collection.order();
        let view = category_view::view_ids(collection, filter);
        let Some(plan) = plan_move(&before, &view, gesture)? else {
            return Ok(None);
        };

        if let Err(e) = collection.reorder(&plan.full_order) {
            return Err(self.consistency_failure(collection, e.into()));
        }
        if category_view::view_ids(collection, filter) != plan.view_order {
            return Err(
                self.consistency_failure(collection, ReorderError::ViewMismatch(gesture.source.clone()))
            );
        }
        debug!(source = %gesture.source, destination = %gesture.destination, "applied move locally");
        Ok(self.dispatch(collection))
    }

    /// Replace the whole order and start (or queue) the remote call.
    /// Resubmitting the current order while idle does nothing.
    pub fn begin_reorder(
        &mut self,
        collection: &mut ProjectCollection,
        order: &[ProjectId],
    ) -> Result<Option<ReorderRequest>, ReorderError> {
        if self.in_flight.is_none() && collection.order() == order && self.confirmed == order {
            return Ok(None);
        }
        if let Err(e) = collection.reorder(order) {
            return Err(self.consistency_failure(collection, e.into()));
        }
        Ok(self.dispatch(collection))
    }

    /// Feed back the outcome of the call for `ticket`.
    pub fn settle(
        &mut self,
        collection: &mut ProjectCollection,
        ticket: u64,
        outcome: Result<(), GatewayError>,
    ) -> Settlement {
        let Some(request) = self.in_flight.take_if(|r| r.ticket == ticket) else {
            debug!(ticket, "discarding settlement for a ticket that is not in flight");
            return Settlement::Discarded;
        };
        let queued = std::mem::take(&mut self.queued);

        match outcome {
            Ok(()) => {
                self.confirmed = request
                    .order
                    .into_iter()
                    .filter(|id| collection.contains(id))
                    .collect();
                if queued && collection.order() != self.confirmed {
                    match self.dispatch(collection) {
                        Some(next) => Settlement::Resend(next),
                        None => Settlement::Committed,
                    }
                } else {
                    Settlement::Committed
                }
            }
            Err(e) => {
                warn!(ticket, error = %e, "reorder failed, restoring last confirmed order");
                collection.restore_order(&self.confirmed);
                Settlement::RolledBack(e)
            }
        }
    }

    fn dispatch(&mut self, collection: &ProjectCollection) -> Option<ReorderRequest> {
        if self.in_flight.is_some() {
            self.queued = true;
            return None;
        }
        let request = ReorderRequest {
            ticket: self.next_ticket,
            order: collection.order(),
        };
        self.next_ticket += 1;
        self.in_flight = Some(request.clone());
        Some(request)
    }

    fn consistency_failure(
        &mut self,
        collection: &mut ProjectCollection,
        err: ReorderError,
    ) -> ReorderError {
        error!(error = %err, "reorder consistency failure; collection marked stale");
        collection.restore_order(&self.confirmed);
        collection.mark_stale();
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::Category;
    use crate::ops::collection::tests::{ids, project};
    use pretty_assertions::assert_eq;

    fn collection(spec: &[(&str, Category)]) -> ProjectCollection {
        let mut c = ProjectCollection::new();
        c.load(spec.iter().map(|(id, cat)| project(id, *cat)).collect()).unwrap();
        c
    }

    fn abc() -> ProjectCollection {
        collection(&[
            ("A", Category::WebApps),
            ("B", Category::WebApps),
            ("C", Category::WebApps),
        ])
    }

    fn mixed() -> ProjectCollection {
        collection(&[
            ("A", Category::WebApps),
            ("B", Category::Apis),
            ("C", Category::WebApps),
            ("D", Category::MobileApps),
        ])
    }

    fn ready(c: &ProjectCollection) -> ReorderCoordinator {
        let mut coord = ReorderCoordinator::new();
        coord.reset(c);
        coord
    }

    // --- planning ---

    #[test]
    fn test_array_move_down_and_up() {
        let mut v = vec!['a', 'b', 'c', 'd'];
        array_move(&mut v, 0, 2);
        assert_eq!(v, vec!['b', 'c', 'a', 'd']);
        array_move(&mut v, 3, 0);
        assert_eq!(v, vec!['d', 'b', 'c', 'a']);
    }

    #[test]
    fn test_unfiltered_move_matches_array_move() {
        let full = ids(&["A", "B", "C"]);
        let plan = plan_move(&full, &full, &DragGesture::new("A", "C")).unwrap().unwrap();
        assert_eq!(plan.full_order, ids(&["B", "C", "A"]));
        assert_eq!(plan.view_order, plan.full_order);
    }

    #[test]
    fn test_cross_filter_move_keeps_outsiders_in_place() {
        let full = ids(&["A", "B", "C", "D"]);
        let web = ids(&["A", "C"]);
        let plan = plan_move(&full, &web, &DragGesture::new("C", "A")).unwrap().unwrap();
        assert_eq!(plan.view_order, ids(&["C", "A"]));
        assert_eq!(plan.full_order, ids(&["C", "A", "B", "D"]));
    }

    #[test]
    fn test_drop_on_self_is_noop() {
        let full = ids(&["A", "B"]);
        assert_eq!(plan_move(&full, &full, &DragGesture::new("A", "A")).unwrap(), None);
    }

    #[test]
    fn test_gesture_with_vanished_or_hidden_ids_rejected() {
        let full = ids(&["A", "B", "C"]);
        let view = ids(&["A", "C"]);
        assert_eq!(
            plan_move(&full, &view, &DragGesture::new("Z", "A")),
            Err(ReorderError::Unknown(ProjectId::new("Z")))
        );
        assert_eq!(
            plan_move(&full, &view, &DragGesture::new("A", "B")),
            Err(ReorderError::NotInView(ProjectId::new("B")))
        );
    }

    #[test]
    fn test_every_move_projects_back_onto_its_view() {
        let base = mixed();
        for filter in CategoryFilter::choices() {
            let view = category_view::view_ids(&base, filter);
            for s in &view {
                for d in &view {
                    let mut c = base.clone();
                    let mut coord = ready(&c);
                    let gesture = DragGesture::new(s.clone(), d.clone());
                    coord.begin_move(&mut c, filter, &gesture).unwrap();

                    let mut expected = view.clone();
                    let from = view.iter().position(|x| x == s).unwrap();
                    let to = view.iter().position(|x| x == d).unwrap();
                    array_move(&mut expected, from, to);
                    assert_eq!(category_view::view_ids(&c, filter), expected);
                    assert_eq!(c.len(), base.len());
                }
            }
        }
    }

    // --- coordinator ---

    #[test]
    fn test_successful_move_commits() {
        let mut c = abc();
        let mut coord = ready(&c);
        let req = coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("A", "C"))
            .unwrap()
            .unwrap();
        assert_eq!(req.order, ids(&["B", "C", "A"]));
        assert_eq!(c.order(), ids(&["B", "C", "A"]));
        assert_eq!(coord.state(), ReorderState::Pending);

        assert_eq!(coord.settle(&mut c, req.ticket, Ok(())), Settlement::Committed);
        assert_eq!(coord.state(), ReorderState::Idle);
        assert_eq!(coord.confirmed(), ids(&["B", "C", "A"]).as_slice());
    }

    #[test]
    fn test_failed_move_rolls_back_exactly() {
        let mut c = abc();
        let mut coord = ready(&c);
        let req = coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("A", "C"))
            .unwrap()
            .unwrap();
        assert_eq!(c.order(), ids(&["B", "C", "A"]));

        let failure = GatewayError::Server("boom".into());
        assert_eq!(
            coord.settle(&mut c, req.ticket, Err(failure.clone())),
            Settlement::RolledBack(failure)
        );
        assert_eq!(c.order(), ids(&["A", "B", "C"]));
        assert_eq!(coord.state(), ReorderState::Idle);
    }

    #[test]
    fn test_noop_gesture_issues_no_request() {
        let mut c = abc();
        let mut coord = ready(&c);
        let got = coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("B", "B"))
            .unwrap();
        assert_eq!(got, None);
        assert_eq!(coord.state(), ReorderState::Idle);
    }

    #[test]
    fn test_gesture_during_pending_is_queued_then_resent() {
        let mut c = abc();
        let mut coord = ready(&c);
        let first = coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("A", "C"))
            .unwrap()
            .unwrap();
        // [B, C, A]; second drag lands before the first call returns
        let second = coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("C", "B"))
            .unwrap();
        assert_eq!(second, None);
        assert_eq!(c.order(), ids(&["C", "B", "A"]));

        let Settlement::Resend(next) = coord.settle(&mut c, first.ticket, Ok(())) else {
            panic!("expected a follow-up request");
        };
        assert_eq!(next.order, ids(&["C", "B", "A"]));
        assert_eq!(coord.confirmed(), ids(&["B", "C", "A"]).as_slice());

        assert_eq!(coord.settle(&mut c, next.ticket, Ok(())), Settlement::Committed);
        assert_eq!(c.order(), ids(&["C", "B", "A"]));
    }

    #[test]
    fn test_queued_gestures_roll_back_to_confirmed_on_failure() {
        let mut c = abc();
        let mut coord = ready(&c);
        let first = coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("A", "C"))
            .unwrap()
            .unwrap();
        coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("C", "B"))
            .unwrap();

        let settled = coord.settle(&mut c, first.ticket, Err(GatewayError::Transport("offline".into())));
        assert!(matches!(settled, Settlement::RolledBack(GatewayError::Transport(_))));
        assert_eq!(c.order(), ids(&["A", "B", "C"]));
        assert_eq!(coord.state(), ReorderState::Idle);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut c = abc();
        let mut coord = ready(&c);
        let req = coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("A", "B"))
            .unwrap()
            .unwrap();
        assert_eq!(
            coord.settle(&mut c, req.ticket + 7, Err(GatewayError::Server("late".into()))),
            Settlement::Discarded
        );
        assert_eq!(c.order(), ids(&["B", "A", "C"]));
        assert_eq!(coord.state(), ReorderState::Pending);
    }

    #[test]
    fn test_rollback_respects_deletes_and_creates_made_meanwhile() {
        let mut c = abc();
        let mut coord = ready(&c);
        let req = coord
            .begin_move(&mut c, CategoryFilter::All, &DragGesture::new("C", "A"))
            .unwrap()
            .unwrap();
        c.remove(&ProjectId::new("B"));
        coord.confirm_remove(&ProjectId::new("B"));
        c.insert(project("D", Category::Apis)).unwrap();
        coord.confirm_insert(ProjectId::new("D"));

        coord.settle(&mut c, req.ticket, Err(GatewayError::Server("nope".into())));
        assert_eq!(c.order(), ids(&["A", "C", "D"]));
    }

    #[test]
    fn test_resubmitting_same_order_is_idempotent() {
        let mut c = abc();
        let mut coord = ready(&c);
        let order = ids(&["C", "A", "B"]);
        let req = coord.begin_reorder(&mut c, &order).unwrap().unwrap();
        coord.settle(&mut c, req.ticket, Ok(()));

        assert_eq!(coord.begin_reorder(&mut c, &order).unwrap(), None);
        assert_eq!(c.order(), order);
    }

    #[test]
    fn test_non_permutation_is_a_consistency_failure() {
        let mut c = abc();
        let mut coord = ready(&c);
        let err = coord.begin_reorder(&mut c, &ids(&["C", "A"])).unwrap_err();
        assert!(matches!(err, ReorderError::Consistency(_)));
        assert!(c.is_stale());
        assert_eq!(c.order(), ids(&["A", "B", "C"]));
        assert_eq!(coord.state(), ReorderState::Idle);
    }

    #[test]
    fn test_move_in_filtered_view_resolves_against_live_collection() {
        let mut c = mixed();
        let mut coord = ready(&c);
        let web = CategoryFilter::Only(Category::WebApps);
        let req = coord
            .begin_move(&mut c, web, &DragGesture::new("C", "A"))
            .unwrap()
            .unwrap();
        assert_eq!(req.order, ids(&["C", "A", "B", "D"]));

        // B is an API project: not draggable in the web view
        let err = coord
            .begin_move(&mut c, web, &DragGesture::new("B", "A"))
            .unwrap_err();
        assert_eq!(err, ReorderError::NotInView(ProjectId::new("B")));
        assert_eq!(c.order(), ids(&["C", "A", "B", "D"]));
    }
}
