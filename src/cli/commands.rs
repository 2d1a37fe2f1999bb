use clap::{Args, Parser, Subcommand};

use crate::model::project::{Category, CategoryFilter};

#[derive(Parser)]
#[command(name = "pf", about = concat!("folio v", env!("CARGO_PKG_VERSION"), " - your projects, in your order"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Backend origin (overrides FOLIO_API_URL and config.toml)
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login(LoginArgs),
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List projects in portfolio order
    List(ListArgs),
    /// Show one project
    Show(ShowArgs),
    /// Add a project (appended at the end)
    Add(AddArgs),
    /// Change a project's fields
    Edit(EditArgs),
    /// Delete a project
    Rm(RmArgs),
    /// Drop a project onto another one's place
    Mv(MvArgs),
    /// Put projects first, in the given order
    Reorder(ReorderArgs),
    /// List categories
    Categories,
    /// Show or change configuration
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Session args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    /// Password (read from stdin when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    /// Password (read from stdin when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Only show one category (web, mobile, api; default: all)
    #[arg(long, short)]
    pub category: Option<CategoryFilter>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Project ID
    pub id: String,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Project name
    pub name: String,
    #[arg(long, short)]
    pub description: String,
    /// Web Apps, Mobile Apps or APIs (short forms: web, mobile, api)
    #[arg(long, short)]
    pub category: Category,
    /// Technology used (repeatable, or comma-separated)
    #[arg(long, short, value_delimiter = ',')]
    pub tech: Vec<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Project ID
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, short)]
    pub description: Option<String>,
    #[arg(long, short)]
    pub category: Option<Category>,
    /// Replace the whole tech stack (repeatable, or comma-separated)
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["add_tech", "rm_tech"])]
    pub tech: Vec<String>,
    /// Add a technology
    #[arg(long = "add-tech", value_delimiter = ',')]
    pub add_tech: Vec<String>,
    /// Remove a technology
    #[arg(long = "rm-tech", value_delimiter = ',')]
    pub rm_tech: Vec<String>,
}

#[derive(Args)]
pub struct RmArgs {
    /// Project ID
    pub id: String,
}

#[derive(Args)]
pub struct MvArgs {
    /// Project to move
    pub id: String,
    /// Project whose place it takes
    pub dest: String,
    /// Move within this category's view (default: all projects)
    #[arg(long, short)]
    pub category: Option<CategoryFilter>,
}

#[derive(Args)]
pub struct ReorderArgs {
    /// Project IDs, first to last; unlisted projects follow in their current order
    #[arg(required = true)]
    pub ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set a value in config.toml
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// api.base_url or api.timeout_secs
    pub key: String,
    pub value: String,
}
