//! Tally API Client - Command line entry point
//!
//! Loads configuration, wires the adapters into an `ApiClient` and issues
//! one request.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tally_application::{ApiClient, AuthEvent, ClientError, MemorySessionStore, SessionProvider};
use tally_domain::{ApiRequest, ApiResponse};
use tally_infrastructure::{
    HttpSessionStore, HttpTokenRefresher, RedirectSignOut, ReqwestTransport, Settings, SystemClock,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let settings =
        Settings::from_lookup(|name| cli.override_for(name).or_else(|| std::env::var(name).ok()))?;

    let sessions: Arc<dyn SessionProvider> = match settings.seeded_session() {
        Some(session) => Arc::new(MemorySessionStore::with_session(session)),
        None => Arc::new(
            HttpSessionStore::new(settings.session_url.clone())
                .with_timeout(settings.request_timeout),
        ),
    };
    let sign_out = Arc::new(RedirectSignOut::new(sessions.clone()));
    let redirects = sign_out.redirects();

    let client = ApiClient::new(
        Arc::new(
            ReqwestTransport::new(settings.base_url.clone())?
                .with_timeout(settings.request_timeout),
        ),
        sessions,
        Arc::new(
            HttpTokenRefresher::new(&settings.base_url)?.with_timeout(settings.request_timeout),
        ),
        sign_out,
        Arc::new(SystemClock::new()),
        settings.client_config(),
    );

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let AuthEvent::TokenRefreshed { token_preview, .. } = &event {
                tracing::debug!(token = %token_preview, "Session renewed");
            }
        }
    });

    tracing::debug!(base_url = %settings.base_url, "Client ready");

    let result = match cli.command {
        Command::Status => {
            let status = client.session_status().await?;
            if status.needs_attention() {
                tracing::warn!("Access token is expiring or expired");
            }
            println!("{}", status.display_message());
            return Ok(());
        }
        Command::Get { path, query } => {
            let mut request = ApiRequest::get(path);
            for (key, value) in query {
                request = request.with_query(key, value);
            }
            client.request(request).await
        }
        Command::Post { path, data } => client.post(&path, parse_body(data)?).await,
        Command::Put { path, data } => client.put(&path, parse_body(data)?).await,
        Command::Patch { path, data } => client.patch(&path, parse_body(data)?).await,
        Command::Delete { path } => client.delete(&path).await,
    };

    if let Some(target) = redirects.borrow().as_deref() {
        eprintln!("Session ended, sign in again at {target}");
    }

    match result {
        Ok(response) => {
            print_response(&response);
            Ok(())
        }
        Err(ClientError::Status { status, response }) => {
            print_response(&response);
            Err(format!("request failed with status {status}").into())
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_body(data: Option<String>) -> Result<Option<serde_json::Value>, BoxError> {
    data.map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| format!("--data is not valid JSON: {e}").into())
}

fn print_response(response: &ApiResponse) {
    eprintln!("{} ({} ms)", response.status, response.duration.as_millis());
    match response.json_body::<serde_json::Value>() {
        Ok(serde_json::Value::Null) => {}
        Ok(json) => println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| response.text())
        ),
        Err(_) => println!("{}", response.text()),
    }
}
