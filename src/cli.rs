use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Backend API base URL, including the `/api` prefix (overrides `UXSCOPE_API_URL`).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Where the signed-in session is kept (overrides `UXSCOPE_SESSION_FILE`).
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Register(RegisterArgs),
    Login(LoginArgs),
    Logout,
    /// Show the signed-in user.
    Whoami,
    Projects {
        #[command(subcommand)]
        command: ProjectsCommand,
    },
    Pages {
        #[command(subcommand)]
        command: PagesCommand,
    },
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub password: String,

    /// Password confirmation (default: same as `--password`).
    #[arg(long)]
    pub password2: Option<String>,

    #[arg(long, default_value = "")]
    pub organisation: String,

    #[arg(long, default_value_t = 1)]
    pub plan: u32,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,
}

#[derive(Debug, Subcommand)]
pub enum ProjectsCommand {
    List,
    Create(CreateProjectArgs),
    /// Show one project with its page statistics.
    Show(ProjectArgs),
}

#[derive(Debug, Args)]
pub struct CreateProjectArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub website_url: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// website, mobile_app, web_app, api or other.
    #[arg(long = "type", default_value = "website")]
    pub project_type: String,

    /// planning, in_progress, completed, on_hold or cancelled.
    #[arg(long, default_value = "planning")]
    pub status: String,

    #[arg(long, default_value = "")]
    pub goal: String,
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    pub project: u64,
}

#[derive(Debug, Subcommand)]
pub enum PagesCommand {
    List(PagesListArgs),
    /// Discover the pages of the project's website. Replaces the known pages.
    Find(ProjectArgs),
    /// Queue pages for UX analysis, then reload their statuses.
    Analyze(AnalyzeArgs),
    Report(ReportArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Name,
    Status,
}

#[derive(Debug, Args)]
pub struct PagesListArgs {
    pub project: u64,

    /// Page status to show, or `all`.
    #[arg(long, default_value = "all")]
    pub status: String,

    /// Case-insensitive match on page name or URL.
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    pub project: u64,

    /// Page id to analyze (repeatable).
    #[arg(long = "page", required_unless_present = "all")]
    pub pages: Vec<u64>,

    /// Analyze every known page.
    #[arg(long, conflicts_with = "pages")]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    pub project: u64,
    pub page: u64,
}
