use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use uxscope::cli::{Cli, Command, PagesCommand, ProjectsCommand};
use uxscope::commands;
use uxscope::config::ClientConfig;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    uxscope::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let mut config = ClientConfig::from_env().context("load config")?;
    if let Some(api_url) = &cli.api_url {
        config = config.with_api_url(api_url)?;
    }
    if let Some(session_file) = cli.session_file {
        config.session_file = session_file;
    }
    let client = commands::connect(config).await?;

    match cli.command {
        Command::Register(args) => commands::register(&client, args).await.context("register")?,
        Command::Login(args) => commands::login(&client, args).await.context("login")?,
        Command::Logout => commands::logout(&client).await.context("logout")?,
        Command::Whoami => commands::whoami(&client).await.context("whoami")?,
        Command::Projects {
            command: ProjectsCommand::List,
        } => {
            commands::list_projects(&client)
                .await
                .context("projects list")?;
        }
        Command::Projects {
            command: ProjectsCommand::Create(args),
        } => {
            commands::create_project(&client, args)
                .await
                .context("projects create")?;
        }
        Command::Projects {
            command: ProjectsCommand::Show(args),
        } => {
            commands::show_project(&client, args)
                .await
                .context("projects show")?;
        }
        Command::Pages {
            command: PagesCommand::List(args),
        } => {
            commands::list_pages(&client, args)
                .await
                .context("pages list")?;
        }
        Command::Pages {
            command: PagesCommand::Find(args),
        } => {
            commands::find_pages(&client, args)
                .await
                .context("pages find")?;
        }
        Command::Pages {
            command: PagesCommand::Analyze(args),
        } => {
            commands::analyze_pages(&client, args)
                .await
                .context("pages analyze")?;
        }
        Command::Pages {
            command: PagesCommand::Report(args),
        } => {
            commands::page_report(&client, args)
                .await
                .context("pages report")?;
        }
    }

    Ok(())
}
