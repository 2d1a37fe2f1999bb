use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::wire::{
    Ack, AuthData, BackendProject, Envelope, ErrorBody, LoginRequest, RegisterRequest,
    ReorderBody, into_ordered_projects,
};
use super::{AuthGrant, GatewayError, ProjectGateway};
use crate::model::config::ApiConfig;
use crate::model::project::{Project, ProjectId};
use crate::model::user::Credential;
use crate::ops::editor::ProjectPayload;

/// Blocking JSON-over-HTTP client for the portfolio backend
pub struct HttpGateway {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpGateway {
    pub fn new(api: &ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(api.timeout_secs))
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build();
        HttpGateway {
            agent,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: &str, path: &str, credential: Option<&Credential>) -> ureq::Request {
        let url = format!("{}{}", self.base_url, path);
        debug!(method, url = %url, "gateway request");
        let request = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        match credential {
            Some(c) => request.set("Authorization", &format!("Bearer {}", c.expose())),
            None => request,
        }
    }

    fn call(&self, request: ureq::Request) -> Result<ureq::Response, GatewayError> {
        classify(request.call())
    }

    fn call_json(
        &self,
        request: ureq::Request,
        body: impl Serialize,
    ) -> Result<ureq::Response, GatewayError> {
        classify(request.send_json(body))
    }
}

/// Map ureq's outcome onto the gateway taxonomy. Status codes end here.
fn classify(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<ureq::Response, GatewayError> {
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(status, response)) => {
            let body: ErrorBody = response
                .into_string()
                .ok()
                .and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or_default();
            debug!(status, "gateway request rejected");
            Err(GatewayError::from_status(status, body.message))
        }
        Err(ureq::Error::Transport(transport)) => Err(GatewayError::Transport(transport.to_string())),
    }
}

/// Unwrap `data` from a success envelope.
fn unwrap_data<T: DeserializeOwned>(response: ureq::Response) -> Result<T, GatewayError> {
    let envelope: Envelope<T> = response
        .into_json()
        .map_err(|e| GatewayError::Server(format!("malformed response from server: {}", e)))?;
    if !envelope.success {
        return Err(GatewayError::Validation(
            envelope
                .message
                .unwrap_or_else(|| "request rejected".to_string()),
        ));
    }
    Ok(envelope.data)
}

/// Accept a status-only response unless its body says otherwise.
fn acknowledge(response: ureq::Response) -> Result<(), GatewayError> {
    let text = response.into_string().unwrap_or_default();
    match serde_json::from_str::<Ack>(&text) {
        Ok(Ack {
            success: false,
            message,
        }) => Err(GatewayError::Validation(
            message.unwrap_or_else(|| "request rejected".to_string()),
        )),
        _ => Ok(()),
    }
}

fn grant(data: AuthData) -> AuthGrant {
    AuthGrant {
        credential: Credential::new(data.token),
        user: data.user,
    }
}

impl ProjectGateway for HttpGateway {
    fn login(&self, email: &str, password: &str) -> Result<AuthGrant, GatewayError> {
        let request = self.request("POST", "/api/auth/login", None);
        let response = self.call_json(request, LoginRequest { email, password })?;
        unwrap_data(response).map(grant)
    }

    fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, GatewayError> {
        let request = self.request("POST", "/api/auth/register", None);
        let response = self.call_json(
            request,
            RegisterRequest {
                username,
                email,
                password,
            },
        )?;
        unwrap_data(response).map(grant)
    }

    fn list(&self, credential: &Credential) -> Result<Vec<Project>, GatewayError> {
        let response = self.call(self.request("GET", "/api/projects", Some(credential)))?;
        let projects: Vec<BackendProject> = unwrap_data(response)?;
        Ok(into_ordered_projects(projects))
    }

    fn create(
        &self,
        credential: &Credential,
        payload: &ProjectPayload,
    ) -> Result<Project, GatewayError> {
        let request = self.request("POST", "/api/projects", Some(credential));
        let response = self.call_json(request, payload)?;
        unwrap_data::<BackendProject>(response).map(Project::from)
    }

    fn update(
        &self,
        credential: &Credential,
        id: &ProjectId,
        payload: &ProjectPayload,
    ) -> Result<Project, GatewayError> {
        let path = format!("/api/projects/{}", id);
        let response = self.call_json(self.request("PUT", &path, Some(credential)), payload)?;
        unwrap_data::<BackendProject>(response).map(Project::from)
    }

    fn delete(&self, credential: &Credential, id: &ProjectId) -> Result<(), GatewayError> {
        let path = format!("/api/projects/{}", id);
        acknowledge(self.call(self.request("DELETE", &path, Some(credential)))?)
    }

    fn reorder(&self, credential: &Credential, order: &[ProjectId]) -> Result<(), GatewayError> {
        let request = self.request("PATCH", "/api/projects/reorder", Some(credential));
        acknowledge(self.call_json(request, ReorderBody::from_order(order))?)
    }
}
