//! `portal` entry-point: loads settings, wires the hosted adapters, and runs
//! one command.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use zeroize::Zeroizing;

use portal::domain::SessionStoreRuntime;
use portal::inbound::cli::{Cli, Command, PortalAdapters, PortalApp, write_error};
use portal::outbound::completion::HttpCompletionSource;
use portal::outbound::hosted::{
    HostedClient, HostedCommentRepository, HostedGuestbookRepository, HostedManuscriptRepository,
    HostedProfileRepository, HostedSessionSource,
};
use portal::settings::PortalSettings;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = PortalSettings::from_environment()
        .map_err(|error| eyre!("failed to load portal settings: {error}"))?;
    let timeout = settings.request_timeout();

    let client = HostedClient::new(
        settings.backend_url()?,
        settings.backend_anon_key()?.as_str(),
        timeout,
    )
    .wrap_err("failed to build hosted backend client")?;
    let completion_key = match &cli.command {
        Command::Ask { .. } => settings.completion_api_key()?,
        _ => Zeroizing::new(String::new()),
    };
    let completion = HttpCompletionSource::new(
        settings.completion_url()?,
        completion_key.as_str(),
        settings.completion_model(),
        timeout,
    )
    .wrap_err("failed to build completion client")?;

    let adapters = PortalAdapters {
        source: Arc::new(HostedSessionSource::new(
            client.clone(),
            Arc::new(DefaultClock),
        )),
        profiles: Arc::new(HostedProfileRepository::new(client.clone())),
        manuscripts: Arc::new(HostedManuscriptRepository::new(client.clone())),
        comments: Arc::new(HostedCommentRepository::new(client.clone())),
        guestbook: Arc::new(HostedGuestbookRepository::new(client)),
        completion: Arc::new(completion),
    };
    let app = PortalApp::new(
        adapters,
        Arc::new(settings.admin_policy()),
        SessionStoreRuntime::default(),
        settings.session_store_config(),
        settings.apology(),
    );

    let mut stdout = io::stdout();
    match app.run(cli.command, &mut stdout).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) => {
            write_error(&mut io::stderr(), &error).wrap_err("failed to report command error")?;
            Ok(ExitCode::FAILURE)
        }
    }
}
