use serde::Serialize;

use crate::model::config::ApiConfig;
use crate::model::project::{CategoryFilter, Project, ProjectId};
use crate::model::user::User;
use crate::ops::editor::FormErrors;
use crate::portfolio::PortfolioError;
use crate::util::unicode::{display_width, fit_to_width, truncate_to_width};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct WhoamiJson<'a> {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<&'a User>,
}

#[derive(Serialize)]
pub struct CategoryJson {
    pub category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Serialize)]
pub struct DeletedJson {
    pub deleted: ProjectId,
}

#[derive(Serialize)]
pub struct ConfigJson<'a> {
    pub path: String,
    pub api: &'a ApiConfig,
}

#[derive(Serialize)]
pub struct FieldErrorJson {
    pub field: &'static str,
    pub message: String,
}

#[derive(Serialize)]
pub struct ErrorJson {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldErrorJson>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn error_to_json(err: &PortfolioError) -> ErrorJson {
    let fields = match err {
        PortfolioError::Form(FormErrors(errors)) => errors
            .iter()
            .map(|e| FieldErrorJson {
                field: e.field,
                message: e.message.clone(),
            })
            .collect(),
        _ => Vec::new(),
    };
    ErrorJson {
        error: err.to_string(),
        kind: err.kind(),
        fields,
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

const NAME_CELLS: usize = 24;
const CATEGORY_CELLS: usize = 11;
const ID_MAX_CELLS: usize = 12;
const TECH_CELLS: usize = 40;

/// Format projects as a table, numbered by their place in the listing
pub fn format_project_table(projects: &[&Project]) -> Vec<String> {
    if projects.is_empty() {
        return vec!["no projects".to_string()];
    }
    let num_cells = projects.len().to_string().len();
    let id_cells = projects
        .iter()
        .map(|p| display_width(p.id.as_str()))
        .max()
        .unwrap_or(0)
        .clamp(2, ID_MAX_CELLS);

    let row = |num: &str, id: &str, name: &str, category: &str, tech: &str| {
        format!(
            "{}  {}  {}  {}  {}",
            fit_to_width(num, num_cells),
            fit_to_width(id, id_cells),
            fit_to_width(name, NAME_CELLS),
            fit_to_width(category, CATEGORY_CELLS),
            truncate_to_width(tech, TECH_CELLS)
        )
        .trim_end()
        .to_string()
    };

    let mut lines = vec![row("#", "ID", "NAME", "CATEGORY", "TECH")];
    for (i, p) in projects.iter().enumerate() {
        lines.push(row(
            &(i + 1).to_string(),
            p.id.as_str(),
            &p.name,
            p.category.label(),
            &p.tech_stack.join(", "),
        ));
    }
    lines
}

/// Format a project's details
pub fn format_project_detail(project: &Project) -> Vec<String> {
    let mut lines = vec![
        format!("{} ({})", project.name, project.id),
        format!("category: {}", project.category),
        format!("tech: {}", project.tech_stack.join(", ")),
        "description:".to_string(),
    ];
    for line in project.description.lines() {
        lines.push(format!("  {}", line));
    }
    lines
}

/// Format the category picker; counts are shown when known
pub fn format_categories(entries: &[(CategoryFilter, Option<usize>)]) -> Vec<String> {
    let width = entries
        .iter()
        .map(|(f, _)| display_width(f.label()))
        .max()
        .unwrap_or(0);
    entries
        .iter()
        .map(|(filter, count)| match count {
            Some(n) => format!("{}  {}", fit_to_width(filter.label(), width), n),
            None => filter.label().to_string(),
        })
        .collect()
}

pub fn format_user(user: &User) -> String {
    format!("{} <{}>", user.username, user.email)
}

pub fn format_config(path: &str, api: &ApiConfig) -> Vec<String> {
    vec![
        format!("# {}", path),
        format!("api.base_url = {}", api.base_url),
        format!("api.timeout_secs = {}", api.timeout_secs),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::Category;
    use insta::assert_snapshot;

    fn project(id: &str, name: &str, category: Category, tech: &[&str]) -> Project {
        Project {
            id: ProjectId::new(id),
            name: name.into(),
            description: format!("About {}", name),
            category,
            tech_stack: tech.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_project_table() {
        let a = project("1", "Folio", Category::WebApps, &["Rust", "React"]);
        let b = project(
            "12",
            "A rather long project name that overflows",
            Category::MobileApps,
            &["Kotlin"],
        );
        let output = format_project_table(&[&a, &b]).join("\n");
        assert_snapshot!(output, @r"
        #  ID  NAME                      CATEGORY     TECH
        1  1   Folio                     Web Apps     Rust, React
        2  12  A rather long project n…  Mobile Apps  Kotlin
        ");
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(format_project_table(&[]), vec!["no projects"]);
    }

    #[test]
    fn test_project_detail() {
        let mut p = project("7", "Folio", Category::Apis, &["Go"]);
        p.description = "Line one\nLine two".into();
        assert_snapshot!(format_project_detail(&p).join("\n"), @r"
        Folio (7)
        category: APIs
        tech: Go
        description:
          Line one
          Line two
        ");
    }

    #[test]
    fn test_categories_with_counts() {
        let entries: Vec<_> = CategoryFilter::choices()
            .zip([4usize, 2, 1, 1])
            .map(|(f, n)| (f, Some(n)))
            .collect();
        assert_snapshot!(format_categories(&entries).join("\n"), @r"
        All Projects  4
        Web Apps      2
        Mobile Apps   1
        APIs          1
        ");
    }

    #[test]
    fn test_form_errors_carry_fields() {
        let err = PortfolioError::Form(FormErrors(vec![crate::ops::editor::FieldError {
            field: "techStack",
            message: "Add at least one technology".into(),
        }]));
        let json = serde_json::to_value(error_to_json(&err)).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["fields"][0]["field"], "techStack");
    }
}
