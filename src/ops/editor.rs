//! Form staging and validation.
//!
//! Nothing reaches the gateway without passing through here: project
//! payloads only exist as the output of [`ProjectDraft::validate`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::project::{Category, Project, ProjectId};

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 6;

/// One rejected form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found in one form submission
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct FormErrors(pub Vec<FieldError>);

impl FormErrors {
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    fn check(errors: Vec<FieldError>) -> Result<(), FormErrors> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FormErrors(errors))
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&parts.join("; "))
    }
}

fn field_error(field: &'static str, message: &str) -> FieldError {
    FieldError {
        field,
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Project drafts
// ---------------------------------------------------------------------------

/// Validated create/update body. Only [`ProjectDraft::validate`] builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    name: String,
    description: String,
    category: Category,
    tech_stack: Vec<String>,
}

impl ProjectPayload {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Never empty
    pub fn tech_stack(&self) -> &[String] {
        &self.tech_stack
    }

    /// The record this payload describes, under an existing id
    pub fn to_project(&self, id: ProjectId) -> Project {
        Project {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category,
            tech_stack: self.tech_stack.clone(),
        }
    }
}

/// A project form being filled in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub category: Option<Category>,
    tech_stack: Vec<String>,
}

impl ProjectDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an edit from the current record
    pub fn from_project(project: &Project) -> Self {
        ProjectDraft {
            name: project.name.clone(),
            description: project.description.clone(),
            category: Some(project.category),
            tech_stack: project.tech_stack.clone(),
        }
    }

    pub fn tech_stack(&self) -> &[String] {
        &self.tech_stack
    }

    /// Append a tech label. Blank and already-present labels are refused.
    pub fn add_tech(&mut self, tech: &str) -> bool {
        let tech = tech.trim();
        if tech.is_empty() || self.tech_stack.iter().any(|t| t == tech) {
            return false;
        }
        self.tech_stack.push(tech.to_string());
        true
    }

    pub fn remove_tech(&mut self, tech: &str) -> bool {
        let tech = tech.trim();
        let before = self.tech_stack.len();
        self.tech_stack.retain(|t| t != tech);
        self.tech_stack.len() != before
    }

    pub fn clear_tech(&mut self) {
        self.tech_stack.clear();
    }

    pub fn validate(&self) -> Result<ProjectPayload, FormErrors> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(field_error("name", "Name is required"));
        }
        if self.description.trim().is_empty() {
            errors.push(field_error("description", "Description is required"));
        }
        if self.category.is_none() {
            errors.push(field_error("category", "Category is required"));
        }
        if self.tech_stack.is_empty() {
            errors.push(field_error("techStack", "Add at least one technology"));
        }
        match self.category {
            Some(category) if errors.is_empty() => Ok(ProjectPayload {
                name: self.name.trim().to_string(),
                description: self.description.trim().to_string(),
                category,
                tech_stack: self.tech_stack.clone(),
            }),
            _ => Err(FormErrors(errors)),
        }
    }
}

// ---------------------------------------------------------------------------
// Auth forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        FormErrors::check(errors)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push(field_error("username", "Username is required"));
        } else if self.username.trim().chars().count() < MIN_USERNAME_CHARS {
            errors.push(field_error("username", "Username must be at least 3 characters"));
        }
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        FormErrors::check(errors)
    }
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    let email = email.trim();
    if email.is_empty() {
        errors.push(field_error("email", "Email is required"));
    } else if !EMAIL_SHAPE.is_match(email) {
        errors.push(field_error("email", "Invalid email format"));
    }
}

fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    if password.is_empty() {
        errors.push(field_error("password", "Password is required"));
    } else if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(field_error("password", "Password must be at least 6 characters"));
    }
}
