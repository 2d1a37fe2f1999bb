use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Authority-assigned project identifier.
///
/// Opaque to the client. The backend may send it as a JSON string or a JSON
/// integer; both are held as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        ProjectId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        ProjectId(s.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        ProjectId(s)
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
            Uint(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => ProjectId(s),
            RawId::Int(n) => ProjectId(n.to_string()),
            RawId::Uint(n) => ProjectId(n.to_string()),
        })
    }
}

/// A project's category. `All Projects` is not a category; see [`CategoryFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Web Apps")]
    WebApps,
    #[serde(rename = "Mobile Apps")]
    MobileApps,
    #[serde(rename = "APIs")]
    Apis,
}

impl Category {
    /// Every real category, in picker order
    pub const ALL: [Category; 3] = [Category::WebApps, Category::MobileApps, Category::Apis];

    /// Display label, identical to the wire value
    pub fn label(self) -> &'static str {
        match self {
            Category::WebApps => "Web Apps",
            Category::MobileApps => "Mobile Apps",
            Category::Apis => "APIs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0} (expected one of: Web Apps, Mobile Apps, APIs)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "web apps" | "web" | "webapps" => Ok(Category::WebApps),
            "mobile apps" | "mobile" | "mobileapps" => Ok(Category::MobileApps),
            "apis" | "api" => Ok(Category::Apis),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Category selector for the project list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    /// "All Projects": no filtering
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub const ALL_LABEL: &'static str = "All Projects";

    /// Every selector in picker order, `All Projects` first
    pub fn choices() -> impl Iterator<Item = CategoryFilter> {
        std::iter::once(CategoryFilter::All).chain(Category::ALL.into_iter().map(CategoryFilter::Only))
    }

    pub fn label(self) -> &'static str {
        match self {
            CategoryFilter::All => Self::ALL_LABEL,
            CategoryFilter::Only(c) => c.label(),
        }
    }

    pub fn matches(self, project: &Project) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => project.category == c,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CategoryFilter {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all projects" | "all" => Ok(CategoryFilter::All),
            _ => s.parse().map(CategoryFilter::Only),
        }
    }
}

/// A portfolio project as held by the client.
///
/// There is no position field: a project's place in the portfolio is its
/// index in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub category: Category,
    /// Display order is insertion order
    pub tech_stack: Vec<String>,
}
