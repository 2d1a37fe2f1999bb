use std::error::Error;
use std::io::BufRead;

use tracing::debug;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::gateway::{HttpGateway, ProjectGateway};
use crate::io::config_io::{self, API_URL_ENV};
use crate::io::session_store::{self, SessionStore};
use crate::model::project::{CategoryFilter, ProjectId};
use crate::ops::editor::{LoginForm, ProjectDraft, RegisterForm};
use crate::ops::reorder::DragGesture;
use crate::portfolio::{NoticeKind, Portfolio, PortfolioError};

type CmdResult = Result<(), Box<dyn Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let api_url = cli.api_url.as_deref();

    let result = match cli.command {
        // Session
        Commands::Login(args) => cmd_login(args, api_url, json),
        Commands::Register(args) => cmd_register(args, api_url, json),
        Commands::Logout => cmd_logout(api_url, json),
        Commands::Whoami => cmd_whoami(api_url, json),

        // Read commands
        Commands::List(args) => cmd_list(args, api_url, json),
        Commands::Show(args) => cmd_show(args, api_url, json),
        Commands::Categories => cmd_categories(api_url, json),

        // Write commands
        Commands::Add(args) => cmd_add(args, api_url, json),
        Commands::Edit(args) => cmd_edit(args, api_url, json),
        Commands::Rm(args) => cmd_rm(args, api_url, json),
        Commands::Mv(args) => cmd_mv(args, api_url, json),
        Commands::Reorder(args) => cmd_reorder(args, api_url, json),

        // Config
        Commands::Config(cmd) => cmd_config(cmd, api_url, json),
    };

    if json
        && let Err(e) = &result
        && let Some(err) = e.downcast_ref::<PortfolioError>()
    {
        println!("{}", serde_json::to_string_pretty(&error_to_json(err))?);
    }
    result
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_portfolio(api_url: Option<&str>) -> Result<Portfolio<HttpGateway>, Box<dyn Error>> {
    let config = config_io::resolve_config(
        &config_io::config_path(),
        std::env::var(API_URL_ENV).ok(),
        api_url,
    )?;
    debug!(base_url = %config.api.base_url, "using backend");
    let gateway = HttpGateway::new(&config.api);
    let session = SessionStore::open(session_store::session_path());
    Ok(Portfolio::new(gateway, session))
}

fn loaded(api_url: Option<&str>) -> Result<Portfolio<HttpGateway>, Box<dyn Error>> {
    let mut portfolio = open_portfolio(api_url)?;
    portfolio.load()?;
    Ok(portfolio)
}

/// Print success notices; failures reach the user as the command's error.
fn print_notices<G: ProjectGateway>(portfolio: &mut Portfolio<G>) {
    for notice in portfolio.drain_notices() {
        if notice.kind == NoticeKind::Success {
            println!("{}", notice.message);
        }
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_view<G: ProjectGateway>(portfolio: &Portfolio<G>, json: bool) -> CmdResult {
    let view = portfolio.view();
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_lines(&format_project_table(&view));
    }
    Ok(())
}

fn read_password(given: Option<String>) -> Result<String, Box<dyn Error>> {
    if let Some(password) = given {
        return Ok(password);
    }
    eprint!("password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ---------------------------------------------------------------------------
// Session commands
// ---------------------------------------------------------------------------

fn cmd_login(args: LoginArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let form = LoginForm {
        email: args.email,
        password: read_password(args.password)?,
    };
    let mut portfolio = open_portfolio(api_url)?;
    let user = portfolio.login(&form)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        print_notices(&mut portfolio);
    }
    Ok(())
}

fn cmd_register(args: RegisterArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let form = RegisterForm {
        username: args.username,
        email: args.email,
        password: read_password(args.password)?,
    };
    let mut portfolio = open_portfolio(api_url)?;
    let user = portfolio.register(&form)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        print_notices(&mut portfolio);
    }
    Ok(())
}

fn cmd_logout(api_url: Option<&str>, json: bool) -> CmdResult {
    let mut portfolio = open_portfolio(api_url)?;
    let was_active = portfolio.is_authenticated();
    portfolio.logout()?;
    if json {
        println!("{}", serde_json::json!({ "logged_out": was_active }));
    } else if was_active {
        print_notices(&mut portfolio);
    } else {
        println!("not logged in");
    }
    Ok(())
}

fn cmd_whoami(api_url: Option<&str>, json: bool) -> CmdResult {
    let portfolio = open_portfolio(api_url)?;
    let user = portfolio.user();
    if json {
        let out = WhoamiJson {
            logged_in: user.is_some(),
            user,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        match user {
            Some(user) => println!("{}", format_user(user)),
            None => println!("not logged in"),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let mut portfolio = loaded(api_url)?;
    portfolio.set_filter(args.category.unwrap_or_default());
    print_view(&portfolio, json)
}

fn cmd_show(args: ShowArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let portfolio = loaded(api_url)?;
    let project = portfolio.get(&ProjectId::new(args.id))?;
    if json {
        println!("{}", serde_json::to_string_pretty(project)?);
    } else {
        print_lines(&format_project_detail(project));
    }
    Ok(())
}

fn cmd_categories(api_url: Option<&str>, json: bool) -> CmdResult {
    let mut portfolio = open_portfolio(api_url)?;
    let entries: Vec<(CategoryFilter, Option<usize>)> = if portfolio.is_authenticated() {
        portfolio.load()?;
        portfolio
            .counts()
            .into_iter()
            .map(|(filter, n)| (filter, Some(n)))
            .collect()
    } else {
        CategoryFilter::choices().map(|filter| (filter, None)).collect()
    };

    if json {
        let out: Vec<CategoryJson> = entries
            .iter()
            .map(|(filter, count)| CategoryJson {
                category: filter.label(),
                count: *count,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_lines(&format_categories(&entries));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let mut draft = ProjectDraft::new();
    draft.name = args.name;
    draft.description = args.description;
    draft.category = Some(args.category);
    for tech in &args.tech {
        draft.add_tech(tech);
    }

    let mut portfolio = open_portfolio(api_url)?;
    let project = portfolio.create(&draft)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&project)?);
    } else {
        print_notices(&mut portfolio);
        println!("id: {}", project.id);
    }
    Ok(())
}

fn cmd_edit(args: EditArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let mut portfolio = loaded(api_url)?;
    let id = ProjectId::new(args.id);
    let mut draft = ProjectDraft::from_project(portfolio.get(&id)?);

    if let Some(name) = args.name {
        draft.name = name;
    }
    if let Some(description) = args.description {
        draft.description = description;
    }
    if let Some(category) = args.category {
        draft.category = Some(category);
    }
    if !args.tech.is_empty() {
        draft.clear_tech();
        for tech in &args.tech {
            draft.add_tech(tech);
        }
    }
    for tech in &args.add_tech {
        draft.add_tech(tech);
    }
    for tech in &args.rm_tech {
        if !draft.remove_tech(tech) {
            return Err(format!("{} has no technology '{}'", id, tech.trim()).into());
        }
    }

    let project = portfolio.update(&id, &draft)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&project)?);
    } else {
        print_notices(&mut portfolio);
    }
    Ok(())
}

fn cmd_rm(args: RmArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let mut portfolio = loaded(api_url)?;
    let removed = portfolio.delete(&ProjectId::new(args.id))?;
    if json {
        let out = DeletedJson {
            deleted: removed.id,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_notices(&mut portfolio);
    }
    Ok(())
}

fn cmd_mv(args: MvArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let mut portfolio = loaded(api_url)?;
    portfolio.set_filter(args.category.unwrap_or_default());
    portfolio.move_project(&DragGesture::new(args.id, args.dest))?;
    if !json {
        print_notices(&mut portfolio);
    }
    print_view(&portfolio, json)
}

fn cmd_reorder(args: ReorderArgs, api_url: Option<&str>, json: bool) -> CmdResult {
    let mut portfolio = loaded(api_url)?;
    let ids: Vec<ProjectId> = args.ids.into_iter().map(ProjectId::from).collect();
    portfolio.reorder(&ids)?;
    if !json {
        print_notices(&mut portfolio);
    }
    print_view(&portfolio, json)
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config(cmd: ConfigCmd, api_url: Option<&str>, json: bool) -> CmdResult {
    let path = config_io::config_path();
    match cmd.action {
        ConfigAction::Show => {
            let config =
                config_io::resolve_config(&path, std::env::var(API_URL_ENV).ok(), api_url)?;
            let path = path.display().to_string();
            if json {
                let out = ConfigJson {
                    path,
                    api: &config.api,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_lines(&format_config(&path, &config.api));
            }
        }
        ConfigAction::Set(args) => {
            config_io::set_config_value(&path, &args.key, &args.value)?;
            if json {
                println!("{}", serde_json::json!({ "key": args.key, "value": args.value }));
            } else {
                println!("{} = {}", args.key, args.value.trim());
            }
        }
    }
    Ok(())
}
