//! The client's main flow: session, collection, filter and notices in one place.
//!
//! Every user action is one method here. Mutations follow the same shape:
//! validate, require a credential, apply optimistically, call the gateway,
//! then commit or roll back and raise a notice.

use tracing::{error, info, warn};

use crate::gateway::{GatewayError, ProjectGateway};
use crate::io::session_store::{SessionError, SessionStore};
use crate::model::project::{CategoryFilter, Project, ProjectId};
use crate::model::user::{Credential, User};
use crate::ops::category_view;
use crate::ops::collection::{CollectionError, ProjectCollection};
use crate::ops::editor::{FormErrors, LoginForm, ProjectDraft, RegisterForm};
use crate::ops::reorder::{DragGesture, ReorderCoordinator, ReorderError, ReorderRequest, Settlement};
use crate::ops::transaction::optimistic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A transient, user-visible message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PortfolioError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Form(#[from] FormErrors),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error("server data is inconsistent: {0}")]
    Consistency(#[from] CollectionError),
    #[error("project not found: {0}")]
    UnknownProject(ProjectId),
    #[error(transparent)]
    Storage(#[from] SessionError),
}

impl PortfolioError {
    /// Short machine-readable class, used in JSON error output
    pub fn kind(&self) -> &'static str {
        match self {
            PortfolioError::Gateway(GatewayError::Transport(_)) => "transport",
            PortfolioError::Gateway(GatewayError::Auth(_)) => "auth",
            PortfolioError::Gateway(GatewayError::Validation(_)) => "validation",
            PortfolioError::Gateway(GatewayError::Server(_)) => "server",
            PortfolioError::Form(_) => "validation",
            PortfolioError::Reorder(ReorderError::Unknown(_)) => "not_found",
            PortfolioError::Reorder(ReorderError::NotInView(_)) => "validation",
            PortfolioError::Reorder(_) | PortfolioError::Consistency(_) => "consistency",
            PortfolioError::UnknownProject(_) => "not_found",
            PortfolioError::Storage(_) => "storage",
        }
    }
}

pub struct Portfolio<G> {
    gateway: G,
    session: SessionStore,
    collection: ProjectCollection,
    coordinator: ReorderCoordinator,
    filter: CategoryFilter,
    notices: Vec<Notice>,
}

impl<G: ProjectGateway> Portfolio<G> {
    pub fn new(gateway: G, session: SessionStore) -> Self {
        Portfolio {
            gateway,
            session,
            collection: ProjectCollection::new(),
            coordinator: ReorderCoordinator::new(),
            filter: CategoryFilter::All,
            notices: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn user(&self) -> Option<&User> {
        self.session.user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_active()
    }

    pub fn login(&mut self, form: &LoginForm) -> Result<User, PortfolioError> {
        form.validate()?;
        let grant = match self.gateway.login(form.email.trim(), &form.password) {
            Ok(grant) => grant,
            Err(e) => {
                self.notices.push(Notice::error(e.to_string()));
                return Err(e.into());
            }
        };
        self.start_session(grant.credential, grant.user.clone())?;
        self.notices
            .push(Notice::success(format!("Welcome back, {}", grant.user.username)));
        Ok(grant.user)
    }

    pub fn register(&mut self, form: &RegisterForm) -> Result<User, PortfolioError> {
        form.validate()?;
        let grant = match self.gateway.register(
            form.username.trim(),
            form.email.trim(),
            &form.password,
        ) {
            Ok(grant) => grant,
            Err(e) => {
                self.notices.push(Notice::error(e.to_string()));
                return Err(e.into());
            }
        };
        self.start_session(grant.credential, grant.user.clone())?;
        self.notices
            .push(Notice::success(format!("Account created for {}", grant.user.username)));
        Ok(grant.user)
    }

    pub fn logout(&mut self) -> Result<(), PortfolioError> {
        let was_active = self.session.is_active();
        self.session.clear()?;
        self.collection.clear();
        self.coordinator.reset(&self.collection);
        if was_active {
            info!("signed out");
            self.notices.push(Notice::success("Signed out"));
        }
        Ok(())
    }

    /// Pick up a persisted session and load its projects.
    /// Returns `false` when there is no session to resume.
    pub fn resume(&mut self) -> Result<bool, PortfolioError> {
        if !self.session.is_active() {
            return Ok(false);
        }
        self.load()?;
        Ok(true)
    }

    fn start_session(&mut self, credential: Credential, user: User) -> Result<(), PortfolioError> {
        self.session.set(credential, user)?;
        self.collection.clear();
        self.coordinator.reset(&self.collection);
        info!(user = self.session.user().map(|u| u.username.as_str()), "signed in");
        Ok(())
    }

    /// The authority rejected the credential: drop everything tied to it.
    fn end_session(&mut self) {
        warn!("credential rejected; signing out");
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "could not remove the stored session");
        }
        self.collection.clear();
        self.coordinator.reset(&self.collection);
    }

    fn credential(&self) -> Result<Credential, PortfolioError> {
        self.session
            .credential()
            .cloned()
            .ok_or_else(|| GatewayError::not_logged_in().into())
    }

    /// Record a gateway failure: notice it, and end the session on auth errors.
    fn gateway_failed(&mut self, err: GatewayError) -> PortfolioError {
        self.notices.push(Notice::error(err.to_string()));
        if err.is_auth() {
            self.end_session();
        }
        err.into()
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Fetch the whole collection from the authority. On failure the
    /// previous collection is discarded and marked stale.
    pub fn load(&mut self) -> Result<(), PortfolioError> {
        let credential = self.credential()?;
        let projects = match self.gateway.list(&credential) {
            Ok(projects) => projects,
            Err(e) => {
                self.collection.clear();
                self.collection.mark_stale();
                self.coordinator.reset(&self.collection);
                return Err(self.gateway_failed(e));
            }
        };
        if let Err(e) = self.collection.load(projects) {
            error!(error = %e, "authority sent an inconsistent project list");
            self.collection.mark_stale();
            self.notices.push(Notice::error(e.to_string()));
            return Err(e.into());
        }
        self.coordinator.reset(&self.collection);
        Ok(())
    }

    pub fn filter(&self) -> CategoryFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: CategoryFilter) {
        self.filter = filter;
    }

    /// Projects under the current filter, in portfolio order
    pub fn view(&self) -> Vec<&Project> {
        category_view::view(&self.collection, self.filter)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.collection.iter()
    }

    pub fn counts(&self) -> Vec<(CategoryFilter, usize)> {
        category_view::counts(&self.collection)
    }

    pub fn get(&self, id: &ProjectId) -> Result<&Project, PortfolioError> {
        self.collection
            .get(id)
            .ok_or_else(|| PortfolioError::UnknownProject(id.clone()))
    }

    pub fn is_stale(&self) -> bool {
        self.collection.is_stale()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn create(&mut self, draft: &ProjectDraft) -> Result<Project, PortfolioError> {
        let payload = draft.validate()?;
        let credential = self.credential()?;

        let gateway = &self.gateway;
        let coordinator = &mut self.coordinator;
        let mut conflict = None;
        let created = optimistic(
            &mut self.collection,
            |_| {},
            || gateway.create(&credential, &payload),
            |collection, project| match collection.insert(project.clone()) {
                Ok(()) => coordinator.confirm_insert(project.id.clone()),
                Err(e) => conflict = Some(e),
            },
        )
        .map_err(|e| self.gateway_failed(e))?;

        if let Some(e) = conflict {
            error!(error = %e, "authority returned an id already held");
            self.collection.mark_stale();
            self.notices.push(Notice::error(e.to_string()));
            return Err(e.into());
        }
        self.notices
            .push(Notice::success(format!("Created \"{}\"", created.name)));
        Ok(created)
    }

    pub fn update(&mut self, id: &ProjectId, draft: &ProjectDraft) -> Result<Project, PortfolioError> {
        let payload = draft.validate()?;
        let credential = self.credential()?;
        if !self.collection.contains(id) {
            return Err(PortfolioError::UnknownProject(id.clone()));
        }

        let gateway = &self.gateway;
        let updated = optimistic(
            &mut self.collection,
            |collection| {
                collection.replace(id, payload.to_project(id.clone()));
            },
            || gateway.update(&credential, id, &payload),
            |collection, project| {
                collection.replace(id, project.clone());
            },
        )
        .map_err(|e| self.gateway_failed(e))?;

        self.notices
            .push(Notice::success(format!("Updated \"{}\"", updated.name)));
        Ok(updated)
    }

    pub fn delete(&mut self, id: &ProjectId) -> Result<Project, PortfolioError> {
        let credential = self.credential()?;
        let removed = self.get(id)?.clone();

        let gateway = &self.gateway;
        let coordinator = &mut self.coordinator;
        optimistic(
            &mut self.collection,
            |collection| {
                collection.remove(id);
            },
            || gateway.delete(&credential, id),
            |_, _| coordinator.confirm_remove(id),
        )
        .map_err(|e| self.gateway_failed(e))?;

        self.notices
            .push(Notice::success(format!("Deleted \"{}\"", removed.name)));
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    /// Apply a drag gesture within the current view and persist the new order.
    pub fn move_project(&mut self, gesture: &DragGesture) -> Result<(), PortfolioError> {
        let credential = self.credential()?;
        let started = self
            .coordinator
            .begin_move(&mut self.collection, self.filter, gesture);
        self.run_reorder(&credential, started)
    }

    /// Move the listed ids to the front, in the given order. Ids not listed
    /// keep their relative order behind them, so a full order is taken as is.
    pub fn reorder(&mut self, ids: &[ProjectId]) -> Result<(), PortfolioError> {
        let credential = self.credential()?;
        let mut order: Vec<ProjectId> = Vec::with_capacity(self.collection.len());
        for id in ids {
            if !self.collection.contains(id) {
                return Err(PortfolioError::UnknownProject(id.clone()));
            }
            if !order.contains(id) {
                order.push(id.clone());
            }
        }
        let rest: Vec<ProjectId> = self
            .collection
            .order()
            .into_iter()
            .filter(|id| !order.contains(id))
            .collect();
        order.extend(rest);

        let started = self.coordinator.begin_reorder(&mut self.collection, &order);
        self.run_reorder(&credential, started)
    }

    /// Drive the coordinator until the authority has the latest order or a
    /// call fails.
    fn run_reorder(
        &mut self,
        credential: &Credential,
        started: Result<Option<ReorderRequest>, ReorderError>,
    ) -> Result<(), PortfolioError> {
        let mut request = match started {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.notices.push(Notice::error(e.to_string()));
                return Err(e.into());
            }
        };
        loop {
            let outcome = self.gateway.reorder(credential, &request.order);
            match self
                .coordinator
                .settle(&mut self.collection, request.ticket, outcome)
            {
                Settlement::Committed | Settlement::Discarded => {
                    self.notices.push(Notice::success("Project order saved"));
                    return Ok(());
                }
                Settlement::Resend(next) => request = next,
                Settlement::RolledBack(e) => return Err(self.gateway_failed(e)),
            }
        }
    }

    /// Take every notice raised since the last drain
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::{GatewayOp, MemoryGateway};
    use crate::model::project::Category;
    use pretty_assertions::assert_eq;

    const EMAIL: &str = "dev@example.com";
    const PASSWORD: &str = "hunter22";

    fn authority() -> MemoryGateway {
        MemoryGateway::new().with_account("dev", EMAIL, PASSWORD)
    }

    fn login_form() -> LoginForm {
        LoginForm {
            email: EMAIL.into(),
            password: PASSWORD.into(),
        }
    }

    fn draft(name: &str, category: Category) -> ProjectDraft {
        let mut d = ProjectDraft::new();
        d.name = name.into();
        d.description = format!("{} description", name);
        d.category = Some(category);
        d.add_tech("Rust");
        d
    }

    fn signed_in(gw: &MemoryGateway) -> Portfolio<&MemoryGateway> {
        let mut p = Portfolio::new(gw, SessionStore::in_memory());
        p.login(&login_form()).unwrap();
        p.load().unwrap();
        p.drain_notices();
        p
    }

    /// Creates A(web), B(api), C(web), D(mobile); returns their ids
    fn seed(p: &mut Portfolio<&MemoryGateway>) -> Vec<ProjectId> {
        let ids = [
            ("A", Category::WebApps),
            ("B", Category::Apis),
            ("C", Category::WebApps),
            ("D", Category::MobileApps),
        ]
        .into_iter()
        .map(|(name, cat)| p.create(&draft(name, cat)).unwrap().id)
        .collect();
        p.drain_notices();
        ids
    }

    fn names(p: &Portfolio<&MemoryGateway>) -> Vec<String> {
        p.view().into_iter().map(|x| x.name.clone()).collect()
    }

    #[test]
    fn test_login_list_drag_reload_scenario() {
        let gw = authority();
        let mut p = signed_in(&gw);
        let ids = seed(&mut p);

        p.move_project(&DragGesture::new(ids[0].clone(), ids[2].clone()))
            .unwrap();
        assert_eq!(names(&p), vec!["B", "C", "A", "D"]);
        assert_eq!(gw.persisted_order(EMAIL), p.projects().map(|x| x.id.clone()).collect::<Vec<_>>());

        // a fresh client sees the same order
        let mut other = Portfolio::new(&gw, SessionStore::in_memory());
        other.login(&login_form()).unwrap();
        other.load().unwrap();
        assert_eq!(names(&other), vec!["B", "C", "A", "D"]);
    }

    #[test]
    fn test_load_without_credential_never_reaches_gateway() {
        let gw = authority();
        let mut p = Portfolio::new(&gw, SessionStore::in_memory());
        let err = p.load().unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert_eq!(gw.calls(GatewayOp::List), 0);
        assert!(p.view().is_empty());
    }

    #[test]
    fn test_empty_tech_stack_never_reaches_gateway() {
        let gw = authority();
        let mut p = signed_in(&gw);
        let mut d = draft("A", Category::Apis);
        d.clear_tech();
        let err = p.create(&d).unwrap_err();
        assert!(matches!(err, PortfolioError::Form(_)));
        assert_eq!(gw.calls(GatewayOp::Create), 0);
    }

    #[test]
    fn test_form_is_checked_before_credential() {
        let gw = authority();
        let mut p = Portfolio::new(&gw, SessionStore::in_memory());
        let err = p.create(&ProjectDraft::new()).unwrap_err();
        assert!(matches!(err, PortfolioError::Form(_)));
    }

    #[test]
    fn test_signed_out_mutations_never_reach_gateway() {
        let gw = authority();
        let mut p = Portfolio::new(&gw, SessionStore::in_memory());
        let a = ProjectId::new("1");
        let b = ProjectId::new("2");

        let errors = [
            p.create(&draft("A", Category::WebApps)).unwrap_err(),
            p.update(&a, &draft("A", Category::WebApps)).unwrap_err(),
            p.delete(&a).unwrap_err(),
            p.move_project(&DragGesture::new(a.clone(), b.clone())).unwrap_err(),
            p.reorder(&[b, a]).unwrap_err(),
        ];
        for err in &errors {
            assert_eq!(err.kind(), "auth", "{:?}", err);
        }
        for op in [
            GatewayOp::List,
            GatewayOp::Create,
            GatewayOp::Update,
            GatewayOp::Delete,
            GatewayOp::Reorder,
        ] {
            assert_eq!(gw.calls(op), 0, "{:?}", op);
        }
    }

    #[test]
    fn test_create_after_delete_survives_reload() {
        let gw = authority();
        let mut p = signed_in(&gw);
        let ids = seed(&mut p);

        p.delete(&ids[0]).unwrap();
        p.delete(&ids[1]).unwrap();
        p.create(&draft("E", Category::Apis)).unwrap();
        assert_eq!(names(&p), vec!["C", "D", "E"]);

        p.load().unwrap();
        assert_eq!(names(&p), vec!["C", "D", "E"]);
    }

    #[test]
    fn test_failed_load_discards_collection() {
        let gw = authority();
        let mut p = signed_in(&gw);
        seed(&mut p);

        gw.fail_next(GatewayOp::List, GatewayError::Server("database offline".into()));
        let err = p.load().unwrap_err();
        assert_eq!(err.kind(), "server");
        assert!(p.view().is_empty());
        assert!(p.is_stale());
        assert!(p.is_authenticated());

        p.load().unwrap();
        assert_eq!(names(&p), vec!["A", "B", "C", "D"]);
        assert!(!p.is_stale());
    }

    #[test]
    fn test_failed_move_rolls_back_and_raises_notice() {
        let gw = authority();
        let mut p = signed_in(&gw);
        let ids = seed(&mut p);

        gw.fail_next(GatewayOp::Reorder, GatewayError::Server("database offline".into()));
        let err = p
            .move_project(&DragGesture::new(ids[0].clone(), ids[2].clone()))
            .unwrap_err();
        assert_eq!(err.kind(), "server");
        assert_eq!(names(&p), vec!["A", "B", "C", "D"]);
        assert_eq!(
            p.drain_notices(),
            vec![Notice::error("database offline")]
        );
        assert!(p.is_authenticated());
    }

    #[test]
    fn test_cross_filter_move_keeps_hidden_projects_in_place() {
        let gw = authority();
        let mut p = signed_in(&gw);
        let ids = seed(&mut p);

        p.set_filter(CategoryFilter::Only(Category::WebApps));
        assert_eq!(names(&p), vec!["A", "C"]);
        p.move_project(&DragGesture::new(ids[2].clone(), ids[0].clone()))
            .unwrap();
        assert_eq!(names(&p), vec!["C", "A"]);

        p.set_filter(CategoryFilter::All);
        assert_eq!(names(&p), vec!["C", "A", "B", "D"]);
    }

    #[test]
    fn test_expired_token_forces_logout() {
        let gw = authority();
        let mut p = signed_in(&gw);
        seed(&mut p);

        gw.revoke_tokens();
        let err = p.load().unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert!(!p.is_authenticated());
        assert!(p.view().is_empty());
        assert_eq!(p.drain_notices()[0].kind, NoticeKind::Error);
    }

    #[test]
    fn test_failed_update_restores_record() {
        let gw = authority();
        let mut p = signed_in(&gw);
        let ids = seed(&mut p);

        let mut d = ProjectDraft::from_project(p.get(&ids[1]).unwrap());
        d.name = "Renamed".into();
        gw.fail_next(GatewayOp::Update, GatewayError::Transport("timed out".into()));
        assert!(p.update(&ids[1], &d).is_err());
        assert_eq!(p.get(&ids[1]).unwrap().name, "B");

        let updated = p.update(&ids[1], &d).unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(p.get(&ids[1]).unwrap().name, "Renamed");
        assert_eq!(names(&p), vec!["A", "Renamed", "C", "D"]);
    }

    #[test]
    fn test_failed_delete_puts_project_back_in_place() {
        let gw = authority();
        let mut p = signed_in(&gw);
        let ids = seed(&mut p);

        gw.fail_next(GatewayOp::Delete, GatewayError::Validation("Project not found".into()));
        assert!(p.delete(&ids[1]).is_err());
        assert_eq!(names(&p), vec!["A", "B", "C", "D"]);

        p.delete(&ids[1]).unwrap();
        assert_eq!(names(&p), vec!["A", "C", "D"]);
        assert_eq!(gw.persisted_order(EMAIL).len(), 3);
    }

    #[test]
    fn test_partial_reorder_moves_listed_ids_to_front() {
        let gw = authority();
        let mut p = signed_in(&gw);
        let ids = seed(&mut p);

        p.reorder(&[ids[3].clone(), ids[1].clone(), ids[3].clone()])
            .unwrap();
        assert_eq!(names(&p), vec!["D", "B", "A", "C"]);
        assert_eq!(gw.calls(GatewayOp::Reorder), 1);

        // same order again: nothing to send
        p.reorder(&[ids[3].clone()]).unwrap();
        assert_eq!(gw.calls(GatewayOp::Reorder), 1);

        let err = p.reorder(&[ProjectId::new("nope")]).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_bad_login_leaves_session_empty() {
        let gw = authority();
        let mut p = Portfolio::new(&gw, SessionStore::in_memory());
        let err = p
            .login(&LoginForm {
                email: EMAIL.into(),
                password: "wrong-password".into(),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(!p.is_authenticated());
    }

    #[test]
    fn test_padded_email_signs_in() {
        let gw = authority();
        let mut p = Portfolio::new(&gw, SessionStore::in_memory());
        let user = p
            .login(&LoginForm {
                email: format!("  {} ", EMAIL),
                password: PASSWORD.into(),
            })
            .unwrap();
        assert_eq!(user.email, EMAIL);
        assert!(p.is_authenticated());
    }

    #[test]
    fn test_register_then_resume() {
        let gw = authority();
        let mut p = Portfolio::new(&gw, SessionStore::in_memory());
        let user = p
            .register(&RegisterForm {
                username: "newbie".into(),
                email: "new@example.com".into(),
                password: "secret1".into(),
            })
            .unwrap();
        assert_eq!(user.username, "newbie");
        assert!(p.resume().unwrap());

        p.logout().unwrap();
        assert!(!p.resume().unwrap());
    }
}
