//! JSON bodies exchanged with the backend.
//!
//! Explicit `position` integers exist only here; the rest of the crate
//! carries order as a sequence of ids.

use serde::{Deserialize, Serialize};

use crate::model::project::{Category, Project, ProjectId};
use crate::model::user::User;

/// Success wrapper around every response body
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

fn default_success() -> bool {
    true
}

/// Failure body; `message` is shown to the user verbatim
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a status-only response. Usually empty; may still carry a
/// `success: false` rejection.
#[derive(Debug, Deserialize)]
pub struct Ack {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AuthData {
    pub token: String,
    pub user: User,
}

/// A project as the backend stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProject {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub position: i64,
}

impl From<BackendProject> for Project {
    fn from(p: BackendProject) -> Self {
        Project {
            id: p.id,
            name: p.name,
            description: p.description,
            category: p.category,
            tech_stack: p.tech_stack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub id: ProjectId,
    pub position: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReorderBody {
    pub projects: Vec<PositionEntry>,
}

impl ReorderBody {
    /// Pair each id with its index
    pub fn from_order(order: &[ProjectId]) -> Self {
        ReorderBody {
            projects: order
                .iter()
                .enumerate()
                .map(|(position, id)| PositionEntry {
                    id: id.clone(),
                    position,
                })
                .collect(),
        }
    }
}

/// Backend projects in persisted order. The sort is stable, so ties keep
/// the order the backend sent them in.
pub fn into_ordered_projects(mut projects: Vec<BackendProject>) -> Vec<Project> {
    projects.sort_by_key(|p| p.position);
    projects.into_iter().map(Project::from).collect()
}
