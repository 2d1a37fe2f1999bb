//! In-process authority with the backend's rules.
//!
//! Used to drive [`crate::portfolio::Portfolio`] without a network, and to
//! script failures: [`MemoryGateway::fail_next`] makes the next call of an
//! operation fail with a chosen error.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use super::{AuthGrant, GatewayError, ProjectGateway};
use crate::model::project::{Project, ProjectId};
use crate::model::user::{Credential, User};
use crate::ops::editor::ProjectPayload;

/// Gateway operations, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    Login,
    Register,
    List,
    Create,
    Update,
    Delete,
    Reorder,
}

struct Account {
    user: User,
    password: String,
}

struct StoredProject {
    owner: String,
    position: i64,
    project: Project,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    /// token -> user id
    tokens: HashMap<String, String>,
    projects: Vec<StoredProject>,
    next_project: u64,
    next_user: u64,
    next_token: u64,
    failures: HashMap<GatewayOp, VecDeque<GatewayError>>,
    calls: HashMap<GatewayOp, usize>,
}

impl State {
    /// Count the call and pop an injected failure, if one is queued
    fn enter(&mut self, op: GatewayOp) -> Result<(), GatewayError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn owner_of(&self, credential: &Credential) -> Result<String, GatewayError> {
        self.tokens
            .get(credential.expose())
            .cloned()
            .ok_or_else(|| GatewayError::Auth("Invalid or expired token".to_string()))
    }

    fn issue(&mut self, user: &User) -> Credential {
        self.next_token += 1;
        let token = format!("tok-{}-{}", user.id, self.next_token);
        self.tokens.insert(token.clone(), user.id.clone());
        Credential::new(token)
    }

    fn find_mut(&mut self, owner: &str, id: &ProjectId) -> Result<&mut StoredProject, GatewayError> {
        self.projects
            .iter_mut()
            .find(|p| p.owner == owner && &p.project.id == id)
            .ok_or_else(|| GatewayError::Validation("Project not found".to_string()))
    }
}

#[derive(Default)]
pub struct MemoryGateway {
    state: RefCell<State>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly, bypassing call counting
    pub fn with_account(self, username: &str, email: &str, password: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            add_account(&mut state, username, email, password);
        }
        self
    }

    /// Queue a failure for the next call of `op`
    pub fn fail_next(&self, op: GatewayOp, err: GatewayError) {
        self.state
            .borrow_mut()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// How many times `op` has been called
    pub fn calls(&self, op: GatewayOp) -> usize {
        self.state.borrow().calls.get(&op).copied().unwrap_or(0)
    }

    /// Invalidate every issued token, as a server-side expiry would
    pub fn revoke_tokens(&self) {
        self.state.borrow_mut().tokens.clear();
    }

    /// Persisted order of one account's projects
    pub fn persisted_order(&self, email: &str) -> Vec<ProjectId> {
        let state = self.state.borrow();
        let Some(account) = state.accounts.iter().find(|a| a.user.email == email) else {
            return Vec::new();
        };
        let mut owned: Vec<&StoredProject> = state
            .projects
            .iter()
            .filter(|p| p.owner == account.user.id)
            .collect();
        owned.sort_by_key(|p| p.position);
        owned.into_iter().map(|p| p.project.id.clone()).collect()
    }
}

fn add_account(state: &mut State, username: &str, email: &str, password: &str) -> User {
    state.next_user += 1;
    let user = User {
        id: format!("u{}", state.next_user),
        username: username.to_string(),
        email: email.to_string(),
    };
    state.accounts.push(Account {
        user: user.clone(),
        password: password.to_string(),
    });
    user
}

impl ProjectGateway for MemoryGateway {
    fn login(&self, email: &str, password: &str) -> Result<AuthGrant, GatewayError> {
        let mut state = self.state.borrow_mut();
        state.enter(GatewayOp::Login)?;
        let user = state
            .accounts
            .iter()
            .find(|a| a.user.email.eq_ignore_ascii_case(email) && a.password == password)
            .map(|a| a.user.clone())
            .ok_or_else(|| GatewayError::Auth("Invalid email or password".to_string()))?;
        let credential = state.issue(&user);
        Ok(AuthGrant { credential, user })
    }

    fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, GatewayError> {
        let mut state = self.state.borrow_mut();
        state.enter(GatewayOp::Register)?;
        if state.accounts.iter().any(|a| a.user.email.eq_ignore_ascii_case(email)) {
            return Err(GatewayError::Validation("Email already exists".to_string()));
        }
        if state.accounts.iter().any(|a| a.user.username == username) {
            return Err(GatewayError::Validation("Username already taken".to_string()));
        }
        let user = add_account(&mut state, username, email, password);
        let credential = state.issue(&user);
        Ok(AuthGrant { credential, user })
    }

    fn list(&self, credential: &Credential) -> Result<Vec<Project>, GatewayError> {
        let mut state = self.state.borrow_mut();
        state.enter(GatewayOp::List)?;
        let owner = state.owner_of(credential)?;
        let mut owned: Vec<&StoredProject> =
            state.projects.iter().filter(|p| p.owner == owner).collect();
        owned.sort_by_key(|p| p.position);
        Ok(owned.into_iter().map(|p| p.project.clone()).collect())
    }

    fn create(
        &self,
        credential: &Credential,
        payload: &ProjectPayload,
    ) -> Result<Project, GatewayError> {
        let mut state = self.state.borrow_mut();
        state.enter(GatewayOp::Create)?;
        let owner = state.owner_of(credential)?;
        let position = state
            .projects
            .iter()
            .filter(|p| p.owner == owner)
            .map(|p| p.position + 1)
            .max()
            .unwrap_or(0);
        state.next_project += 1;
        let project = payload.to_project(ProjectId::new(state.next_project.to_string()));
        state.projects.push(StoredProject {
            owner,
            position,
            project: project.clone(),
        });
        Ok(project)
    }

    fn update(
        &self,
        credential: &Credential,
        id: &ProjectId,
        payload: &ProjectPayload,
    ) -> Result<Project, GatewayError> {
        let mut state = self.state.borrow_mut();
        state.enter(GatewayOp::Update)?;
        let owner = state.owner_of(credential)?;
        let stored = state.find_mut(&owner, id)?;
        stored.project = payload.to_project(id.clone());
        Ok(stored.project.clone())
    }

    fn delete(&self, credential: &Credential, id: &ProjectId) -> Result<(), GatewayError> {
        let mut state = self.state.borrow_mut();
        state.enter(GatewayOp::Delete)?;
        let owner = state.owner_of(credential)?;
        state.find_mut(&owner, id)?;
        state.projects.retain(|p| !(p.owner == owner && &p.project.id == id));
        Ok(())
    }

    fn reorder(&self, credential: &Credential, order: &[ProjectId]) -> Result<(), GatewayError> {
        let mut state = self.state.borrow_mut();
        state.enter(GatewayOp::Reorder)?;
        let owner = state.owner_of(credential)?;
        for id in order {
            state.find_mut(&owner, id)?;
        }
        let owned = state.projects.iter().filter(|p| p.owner == owner).count();
        let distinct: HashSet<&ProjectId> = order.iter().collect();
        if distinct.len() != order.len() || order.len() != owned {
            return Err(GatewayError::Validation(
                "Reorder must list every project exactly once".to_string(),
            ));
        }
        for (position, id) in order.iter().enumerate() {
            state.find_mut(&owner, id)?.position = position as i64;
        }
        Ok(())
    }
}
