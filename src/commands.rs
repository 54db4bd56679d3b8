use std::fmt::{self, Write as _};
use std::sync::Arc;

use anyhow::Context as _;

use crate::app::report::{average_score, render_report};
use crate::app::view::{EmptyState, PageQuery, ProjectDetailView, QuickStats, SortKey};
use crate::cli::{
    AnalyzeArgs, CreateProjectArgs, LoginArgs, PagesListArgs, ProjectArgs, RegisterArgs,
    ReportArgs, SortArg,
};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::formats::{
    CreateProjectRequest, PageRoute, Project, ProjectGoal, ProjectStatus, ProjectType,
    ProjectsPage, RegisterRequest,
};
use crate::gateway::GatewayClient;
use crate::session::{LocalFsSessionStore, SessionContext, SessionStore};
use crate::status::StatusFilter;

pub async fn connect(config: ClientConfig) -> anyhow::Result<GatewayClient> {
    let store: Arc<dyn SessionStore> = Arc::new(LocalFsSessionStore::new(&config.session_file));
    let session = SessionContext::restore(store)
        .await
        .with_context(|| format!("restore session: {}", config.session_file.display()))?;
    GatewayClient::new(config, Arc::new(session))
}

pub async fn register(client: &GatewayClient, args: RegisterArgs) -> anyhow::Result<()> {
    let request = RegisterRequest {
        email: args.email,
        name: args.name,
        password2: args.password2.unwrap_or_else(|| args.password.clone()),
        password: args.password,
        organisation: args.organisation,
        plan: args.plan,
    };
    let auth = client.register(request).await.map_err(with_fields)?;
    match auth.user {
        Some(user) => println!("Registered and signed in as {}", user.email),
        None => println!("Registered and signed in"),
    }
    Ok(())
}

pub async fn login(client: &GatewayClient, args: LoginArgs) -> anyhow::Result<()> {
    let auth = client.login(&args.email, &args.password).await?;
    let email = auth.user.map(|u| u.email).unwrap_or(args.email);
    println!("Signed in as {email}");
    Ok(())
}

pub async fn logout(client: &GatewayClient) -> anyhow::Result<()> {
    client.logout().await.context("end session")?;
    println!("Signed out");
    Ok(())
}

pub async fn whoami(client: &GatewayClient) -> anyhow::Result<()> {
    let user = client.current_user().await?;
    if user.organisation.is_empty() {
        println!("{} <{}>", user.name, user.email);
    } else {
        println!("{} <{}> ({})", user.name, user.email, user.organisation);
    }
    Ok(())
}

pub async fn list_projects(client: &GatewayClient) -> anyhow::Result<()> {
    let page = client.list_projects().await?;
    print!("{}", render_projects(&page)?);
    Ok(())
}

pub async fn create_project(client: &GatewayClient, args: CreateProjectArgs) -> anyhow::Result<()> {
    let project_type = ProjectType::parse(&args.project_type)
        .with_context(|| format!("unknown project type: {}", args.project_type))?;
    let status = ProjectStatus::parse(&args.status)
        .with_context(|| format!("unknown project status: {}", args.status))?;
    let request = CreateProjectRequest {
        project_name: args.name,
        description: args.description,
        project_type,
        status,
        project_goal: ProjectGoal { goal: args.goal },
        website_url: args.website_url,
    };
    let project = client.create_project(&request).await.map_err(with_fields)?;
    println!("Created project {}: {}", project.id, project.project_name);
    Ok(())
}

pub async fn show_project(client: &GatewayClient, args: ProjectArgs) -> anyhow::Result<()> {
    let project = client.get_project(args.project).await?;
    let view = ProjectDetailView::new(Arc::new(client.clone()), args.project);
    view.load().await?;
    print!("{}", render_project(&project, &view.quick_stats())?);
    Ok(())
}

pub async fn list_pages(client: &GatewayClient, args: PagesListArgs) -> anyhow::Result<()> {
    let view = ProjectDetailView::new(Arc::new(client.clone()), args.project);
    view.load().await?;
    let query = PageQuery {
        status: StatusFilter::parse(&args.status),
        search: args.search,
        sort: args.sort.map(|sort| match sort {
            SortArg::Name => SortKey::Name,
            SortArg::Status => SortKey::Status,
        }),
    };
    let routes = view.query(&query);
    if let Some(empty) = view.empty_state() {
        print!("{}", render_empty(empty));
    } else if routes.is_empty() {
        println!("No pages match the current filter.");
    } else {
        print!("{}", render_pages(&routes)?);
    }
    Ok(())
}

pub async fn find_pages(client: &GatewayClient, args: ProjectArgs) -> anyhow::Result<()> {
    let view = ProjectDetailView::new(Arc::new(client.clone()), args.project);
    let mut progress = view.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = progress.borrow_and_update().rounded();
            if percent > 0 {
                tracing::info!(percent, "finding pages");
            }
        }
    });

    let result = view.find_pages().await;
    reporter.abort();
    let found = result?;

    println!("Found {found} pages successfully!");
    match view.empty_state() {
        Some(empty) => print!("{}", render_empty(empty)),
        None => print!("{}", render_pages(&view.routes())?),
    }
    Ok(())
}

pub async fn analyze_pages(client: &GatewayClient, args: AnalyzeArgs) -> anyhow::Result<()> {
    let view = ProjectDetailView::new(Arc::new(client.clone()), args.project);
    view.load().await?;
    if args.all {
        view.select_all();
    } else {
        for id in &args.pages {
            if !view.select(*id) {
                anyhow::bail!("page {id} is not part of project {}", args.project);
            }
        }
    }

    let analyzed = view.analyze_and_refresh().await?;
    let submitted = &analyzed.submitted;
    println!(
        "Queued {} of {} pages for analysis",
        submitted.ack.accepted,
        submitted.submitted.len()
    );
    if !submitted.ack.rejected_ids.is_empty() {
        let rejected: Vec<String> = submitted
            .ack
            .rejected_ids
            .iter()
            .map(u64::to_string)
            .collect();
        println!("Rejected: {}", rejected.join(", "));
    }
    if let Some(message) = &submitted.ack.message {
        println!("{message}");
    }
    match &analyzed.reload_error {
        Some(err) => println!("Could not reload page statuses: {err}"),
        None => print!("{}", render_pages(&view.routes())?),
    }
    Ok(())
}

pub async fn page_report(client: &GatewayClient, args: ReportArgs) -> anyhow::Result<()> {
    let view = ProjectDetailView::new(Arc::new(client.clone()), args.project);
    view.load().await?;
    let page = view
        .page(args.page)
        .with_context(|| format!("page {} is not part of project {}", args.page, args.project))?;
    print!("{}", render_report(&page)?);
    Ok(())
}

/// Folds field-level validation messages into the error text.
fn with_fields(err: ApiError) -> anyhow::Error {
    let fields = err.field_errors();
    if fields.is_empty() {
        return err.into();
    }
    let lines: String = fields
        .iter()
        .map(|field| format!("\n  {}: {}", field.label, field.message))
        .collect();
    anyhow::anyhow!("{}{lines}", err.message)
}

pub fn render_projects(page: &ProjectsPage) -> Result<String, fmt::Error> {
    if page.results.is_empty() {
        return Ok("No projects yet.\n".to_owned());
    }
    let mut out = String::new();
    for project in &page.results {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            project.id,
            project.project_name,
            project.project_type.label(),
            project.status.label(),
            project.website_url
        )?;
    }
    Ok(out)
}

pub fn render_project(project: &Project, stats: &QuickStats) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{} (#{})", project.project_name, project.id)?;
    writeln!(out, "Website: {}", project.website_url)?;
    writeln!(out, "Type: {}", project.project_type.label())?;
    writeln!(out, "Status: {}", project.status.label())?;
    if !project.project_goal.goal.is_empty() {
        writeln!(out, "Goal: {}", project.project_goal.goal)?;
    }
    if !project.description.is_empty() {
        writeln!(out, "Description: {}", project.description)?;
    }
    writeln!(out, "Created: {}", project.created_on_display())?;
    writeln!(out, "Available Pages: {}", stats.pages)?;
    writeln!(
        out,
        "Pages Discovered: {}",
        if stats.has_discovered { "Yes" } else { "No" }
    )?;
    writeln!(out, "Average UX Score: {}", stats.average_score)?;
    Ok(out)
}

pub fn render_pages(routes: &[PageRoute]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for route in routes {
        let score = route
            .usable_score()
            .map(|score| format!("{score}"))
            .unwrap_or_else(|| "-".to_owned());
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            route.id,
            route.status.label(),
            score,
            route.page_name,
            route.page_url
        )?;
    }
    writeln!(out, "Average UX Score: {}", average_score(routes))?;
    Ok(out)
}

fn render_empty(empty: EmptyState) -> String {
    format!("{}\n{}\n", empty.title(), empty.detail())
}
