//! The remote authority, seen from the client.
//!
//! [`ProjectGateway`] is the only way the rest of the crate talks to the
//! backend. Implementations classify every failure into [`GatewayError`];
//! HTTP status codes stop here.

pub mod http;
pub mod memory;
pub mod wire;

use crate::model::project::{Project, ProjectId};
use crate::model::user::{Credential, User};
use crate::ops::editor::ProjectPayload;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

/// Failure classes callers branch on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No response reached the client
    #[error("could not reach the server: {0}")]
    Transport(String),
    /// Credential missing, invalid or expired; the session must end
    #[error("{0}")]
    Auth(String),
    /// The authority rejected the request
    #[error("{0}")]
    Validation(String),
    /// The authority failed, or answered with something unusable
    #[error("{0}")]
    Server(String),
}

impl GatewayError {
    /// Error for an operation attempted with no credential held
    pub fn not_logged_in() -> Self {
        GatewayError::Auth("not logged in (run `pf login`)".to_string())
    }

    /// Classify a non-2xx status. `message` is the body's `message` field, if any.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());
        match status {
            401 => GatewayError::Auth(
                message.unwrap_or_else(|| "session expired, please log in again".to_string()),
            ),
            400..=499 => GatewayError::Validation(
                message.unwrap_or_else(|| format!("request rejected (HTTP {})", status)),
            ),
            _ => GatewayError::Server(
                message.unwrap_or_else(|| format!("server error (HTTP {})", status)),
            ),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, GatewayError::Auth(_))
    }
}

/// Token and identity returned by login/register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub credential: Credential,
    pub user: User,
}

/// Operations the remote authority offers.
///
/// Methods take `&self`: the client is single-threaded and implementations
/// that keep state use interior mutability.
pub trait ProjectGateway {
    fn login(&self, email: &str, password: &str) -> Result<AuthGrant, GatewayError>;

    fn register(&self, username: &str, email: &str, password: &str)
    -> Result<AuthGrant, GatewayError>;

    /// All projects, sorted by persisted position
    fn list(&self, credential: &Credential) -> Result<Vec<Project>, GatewayError>;

    fn create(&self, credential: &Credential, payload: &ProjectPayload)
    -> Result<Project, GatewayError>;

    fn update(
        &self,
        credential: &Credential,
        id: &ProjectId,
        payload: &ProjectPayload,
    ) -> Result<Project, GatewayError>;

    fn delete(&self, credential: &Credential, id: &ProjectId) -> Result<(), GatewayError>;

    /// Persist `position = index` for every id in `order`. Idempotent.
    fn reorder(&self, credential: &Credential, order: &[ProjectId]) -> Result<(), GatewayError>;
}

impl<G: ProjectGateway + ?Sized> ProjectGateway for &G {
    fn login(&self, email: &str, password: &str) -> Result<AuthGrant, GatewayError> {
        (**self).login(email, password)
    }

    fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, GatewayError> {
        (**self).register(username, email, password)
    }

    fn list(&self, credential: &Credential) -> Result<Vec<Project>, GatewayError> {
        (**self).list(credential)
    }

    fn create(
        &self,
        credential: &Credential,
        payload: &ProjectPayload,
    ) -> Result<Project, GatewayError> {
        (**self).create(credential, payload)
    }

    fn update(
        &self,
        credential: &Credential,
        id: &ProjectId,
        payload: &ProjectPayload,
    ) -> Result<Project, GatewayError> {
        (**self).update(credential, id, payload)
    }

    fn delete(&self, credential: &Credential, id: &ProjectId) -> Result<(), GatewayError> {
        (**self).delete(credential, id)
    }

    fn reorder(&self, credential: &Credential, order: &[ProjectId]) -> Result<(), GatewayError> {
        (**self).reorder(credential, order)
    }
}
