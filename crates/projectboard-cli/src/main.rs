//! Projectboard CLI - manage client projects and their cover images

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use projectboard_core::Error;
use projectboard_core::backend::Backend;
use projectboard_core::config::Config;
use projectboard_core::project::{
    CoverImage, Project, ProjectData, ProjectPatch, ProjectRepository, SortBy,
};
use tracing::warn;

#[derive(Parser)]
#[command(name = "projectboard")]
#[command(author, version, about = "Client project board backed by a document store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List projects
    List {
        /// Only show projects whose name or client contains this (3+ characters)
        #[arg(short, long)]
        search: Option<String>,
        /// Only show favorites
        #[arg(long)]
        favorites: bool,
        /// Sort mode (alphabetical, recent, endingSoon)
        #[arg(long)]
        sort: Option<SortBy>,
    },

    /// Show project details
    Show { id: String },

    /// Create a project
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        client: String,
        /// Start date (e.g. 2024-01-31)
        #[arg(long)]
        start: String,
        /// End date (e.g. 2024-06-30)
        #[arg(long)]
        end: String,
        /// Mark as favorite
        #[arg(long)]
        favorite: bool,
        /// Cover image file to upload
        #[arg(long)]
        cover: Option<PathBuf>,
    },

    /// Update fields of a project
    Update {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        client: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Set the favorite flag (true or false)
        #[arg(long)]
        favorite: Option<bool>,
        /// Replace the cover image with this file
        #[arg(long, conflicts_with = "remove_cover")]
        cover: Option<PathBuf>,
        /// Remove the cover image
        #[arg(long)]
        remove_cover: bool,
    },

    /// Delete a project and its cover image
    Delete { id: String },

    /// Toggle the favorite flag of a project
    Favorite { id: String },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("projectboard=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::List {
            search,
            favorites,
            sort,
        } => {
            let repo = open_repository()?;
            cmd_list(&repo, search.as_deref(), favorites, sort, out).await
        }

        Commands::Show { id } => {
            let repo = open_repository()?;
            cmd_show(&repo, &id, out).await
        }

        Commands::Add {
            name,
            client,
            start,
            end,
            favorite,
            cover,
        } => {
            let mut data = ProjectData::new(name, client, start, end).favorite(favorite);
            if let Some(path) = cover {
                data = data.with_cover(CoverImage::from_path(&path).await?);
            }
            let repo = open_repository()?;
            cmd_add(&repo, data, out).await
        }

        Commands::Update {
            id,
            name,
            client,
            start,
            end,
            favorite,
            cover,
            remove_cover,
        } => {
            let patch = ProjectPatch {
                name,
                client,
                start_date: start.map(Into::into),
                end_date: end.map(Into::into),
                is_favorite: favorite,
                ..ProjectPatch::default()
            };
            let patch = match cover {
                Some(path) => patch.cover_file(CoverImage::from_path(&path).await?),
                None if remove_cover => patch.remove_cover(),
                None => patch,
            };
            let repo = open_repository()?;
            cmd_update(&repo, &id, patch, out).await
        }

        Commands::Delete { id } => {
            let repo = open_repository()?;
            cmd_delete(&repo, &id, out).await
        }

        Commands::Favorite { id } => {
            let repo = open_repository()?;
            cmd_favorite(&repo, &id, out).await
        }

        Commands::Config { action } => cmd_config(action, out.quiet),
    }
}

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

fn open_repository() -> anyhow::Result<ProjectRepository> {
    let config = Config::load()?;
    config.validate()?;
    let backend = Backend::from_config(&config)?;
    Ok(backend.into_repository(&config.view))
}

/// Turn the repository's error slot into a command failure
fn operation_error(repo: &ProjectRepository, operation: &str) -> anyhow::Error {
    match repo.error() {
        Some(e) => {
            let mut message = format!("{} failed: [{}] {}", operation, e.code(), e);
            if let Some(hint) = e.suggestion() {
                message.push_str(&format!("\n  hint: {}", hint));
            }
            anyhow::anyhow!(message)
        }
        None => anyhow::anyhow!("{} failed", operation),
    }
}

fn print_project(project: &Project) {
    println!("Project: {}", project.name);
    println!("  ID: {}", project.id);
    println!("  Client: {}", project.client);
    if let Some(start) = &project.start_date {
        println!("  Start: {}", start);
    }
    if let Some(end) = &project.end_date {
        println!("  End: {}", end);
    }
    println!("  Favorite: {}", if project.is_favorite { "yes" } else { "no" });
    if let Some(url) = &project.cover_image_url {
        println!("  Cover: {}", url);
    }
}

fn print_json(value: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn cmd_list(
    repo: &ProjectRepository,
    search: Option<&str>,
    favorites: bool,
    sort: Option<SortBy>,
    out: Output,
) -> anyhow::Result<()> {
    repo.fetch_projects().await;
    if repo.error().is_some() {
        return Err(operation_error(repo, "Listing projects"));
    }

    if let Some(term) = search {
        repo.set_search_term(term);
    }
    if favorites {
        repo.set_show_favorites_only(true);
    }
    if let Some(sort) = sort {
        repo.set_sort_by(sort);
    }

    let view = repo.filtered_and_sorted_projects();
    if out.json() {
        return print_json(serde_json::to_value(&view)?);
    }

    if view.is_empty() {
        if !out.quiet {
            println!("No projects found.");
            println!("\nCreate one with: projectboard add --name <name> --client <client> --start <date> --end <date>");
        }
        return Ok(());
    }

    for p in &view {
        let star = if p.is_favorite { "*" } else { " " };
        let dates = match (&p.start_date, &p.end_date) {
            (Some(s), Some(e)) => format!(" [{} - {}]", s, e),
            _ => String::new(),
        };
        println!("{} {} - {} ({}){}", star, p.id, p.name, p.client, dates);
    }
    if !out.quiet {
        let summary = repo.snapshot().summary();
        println!(
            "\n{} of {} projects shown ({} favorites)",
            view.len(),
            summary.total,
            summary.favorites
        );
    }
    Ok(())
}

async fn cmd_show(repo: &ProjectRepository, id: &str, out: Output) -> anyhow::Result<()> {
    let Some(project) = repo.fetch_project_by_id(id).await else {
        if repo.error().is_some() {
            return Err(operation_error(repo, "Reading project"));
        }
        return Err(Error::ProjectNotFound(id.to_string()).into());
    };

    if out.json() {
        print_json(serde_json::to_value(&project)?)
    } else {
        print_project(&project);
        Ok(())
    }
}

async fn cmd_add(repo: &ProjectRepository, data: ProjectData, out: Output) -> anyhow::Result<()> {
    let Some(project) = repo.add_project(data).await else {
        return Err(operation_error(repo, "Creating project"));
    };
    if let Some(e) = repo.error() {
        warn!(error = %e, "Project created but the project list could not be refreshed");
    }

    if out.json() {
        return print_json(serde_json::to_value(&project)?);
    }
    if out.quiet {
        println!("{}", project.id);
    } else {
        println!("Project created successfully!");
        println!("  ID: {}", project.id);
        println!("  Name: {}", project.name);
        println!("  Client: {}", project.client);
        if let Some(url) = &project.cover_image_url {
            println!("  Cover: {}", url);
        }
    }
    Ok(())
}

async fn cmd_update(
    repo: &ProjectRepository,
    id: &str,
    patch: ProjectPatch,
    out: Output,
) -> anyhow::Result<()> {
    if patch.is_empty() {
        if !out.quiet {
            println!("Nothing to update.");
        }
        return Ok(());
    }

    // Load the cache so the entry is refreshed after the write
    repo.fetch_projects().await;
    if repo.error().is_some() {
        return Err(operation_error(repo, "Loading projects"));
    }
    if repo.snapshot().find(id).is_none() {
        return Err(Error::ProjectNotFound(id.to_string()).into());
    }

    if !repo.update_project(id, patch).await {
        return Err(operation_error(repo, "Updating project"));
    }

    let updated = repo.snapshot().find(id).cloned();
    match updated {
        Some(project) if out.json() => print_json(serde_json::to_value(&project)?),
        Some(project) => {
            if !out.quiet {
                println!("Project updated.");
                print_project(&project);
            }
            Ok(())
        }
        None => {
            if !out.quiet {
                println!("Project '{}' no longer exists.", id);
            }
            Ok(())
        }
    }
}

async fn cmd_delete(repo: &ProjectRepository, id: &str, out: Output) -> anyhow::Result<()> {
    if repo.fetch_project_by_id(id).await.is_none() {
        if repo.error().is_some() {
            return Err(operation_error(repo, "Reading project"));
        }
        return Err(Error::ProjectNotFound(id.to_string()).into());
    }

    if !repo.delete_project(id).await {
        return Err(operation_error(repo, "Deleting project"));
    }

    if out.json() {
        print_json(serde_json::json!({ "deleted": id }))
    } else {
        if !out.quiet {
            println!("Project '{}' deleted.", id);
        }
        Ok(())
    }
}

async fn cmd_favorite(repo: &ProjectRepository, id: &str, out: Output) -> anyhow::Result<()> {
    repo.fetch_projects().await;
    if repo.error().is_some() {
        return Err(operation_error(repo, "Loading projects"));
    }
    if repo.snapshot().find(id).is_none() {
        return Err(Error::ProjectNotFound(id.to_string()).into());
    }

    if !repo.toggle_favorite(id).await {
        return Err(operation_error(repo, "Toggling favorite"));
    }

    let is_favorite = repo
        .snapshot()
        .find(id)
        .map(|p| p.is_favorite)
        .unwrap_or_default();
    if out.json() {
        return print_json(serde_json::json!({ "id": id, "isFavorite": is_favorite }));
    }
    if !out.quiet {
        if is_favorite {
            println!("Project '{}' marked as favorite.", id);
        } else {
            println!("Project '{}' removed from favorites.", id);
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
