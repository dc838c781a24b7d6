//! worksync - command line driver for the worksync session lifecycle.
//!
//! Logs in against the backend, keeps the session token fresh and reports
//! the persisted session state.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use worksync_core::auth::{FileStore, KeyValueStore, KeyringStore};
use worksync_core::{
    ApiClient, AuthInterceptor, AuthState, Config, CredentialStore, LoginRedirect,
    RefreshManager, RefreshSettings, SessionService,
};

/// Log file prefix inside the data directory
const LOG_FILE_PREFIX: &str = "worksync.log";

#[derive(Parser)]
#[command(name = "worksync", version, about = "Session manager for the worksync backend")]
struct Cli {
    /// Keep credentials in the OS keychain instead of the data directory
    #[arg(long, global = true)]
    keyring: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Show the stored session
    Status,
    /// Fetch the current user from the backend
    Whoami,
    /// Validate the stored token, renewing it if the server rejects it
    Check,
    /// Renew the stored token now
    Refresh,
    /// Sign out and clear the stored session
    Logout,
    /// Mark onboarding as completed on this device
    Onboard,
    /// Keep the session fresh until interrupted
    Daemon,
}

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(default_level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Everything a command needs, wired once per process.
struct App {
    config: Config,
    api: ApiClient,
    store: CredentialStore,
    state: AuthState,
    interceptor: Arc<AuthInterceptor>,
    manager: Arc<RefreshManager>,
    sessions: SessionService,
}

impl App {
    fn new(config: Config, use_keyring: bool) -> Result<Self> {
        let backend: Arc<dyn KeyValueStore> = if use_keyring {
            Arc::new(KeyringStore::new())
        } else {
            Arc::new(FileStore::new(config.data_dir()?))
        };
        let store = CredentialStore::new(backend);
        let state = AuthState::new();
        let redirect: Arc<dyn LoginRedirect> = Arc::new(|| {
            eprintln!("Session ended. Run `worksync login` to sign in again.");
        });

        let api = ApiClient::new(&config.api_base_url, config.request_timeout())?;
        let interceptor = Arc::new(AuthInterceptor::new(
            store.clone(),
            state.clone(),
            Arc::clone(&redirect),
        ));
        let manager = Arc::new(RefreshManager::new(
            Arc::new(api.clone()),
            store.clone(),
            state.clone(),
            redirect,
            RefreshSettings::from(&config),
        ));
        let sessions = SessionService::new(Arc::new(api.clone()), store.clone(), state.clone());

        Ok(Self {
            config,
            api,
            store,
            state,
            interceptor,
            manager,
            sessions,
        })
    }

    async fn login(&self, email: Option<String>) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        let password = rpassword::prompt_password("Password: ")
            .context("Failed to read password")?;

        self.sessions.login(&email, &password).await?;
        println!("Logged in as {}", email);
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        let authenticated = self.store.is_authenticated().await?;
        println!("API:         {}", self.config.api_base_url);
        println!("Signed in:   {}", yes_no(authenticated));
        println!("Login done:  {}", yes_no(self.store.has_completed_login().await?));
        println!("Onboarded:   {}", yes_no(self.store.has_completed_onboarding().await?));
        if let Some(profile) = self.store.get_user_profile().await? {
            println!("Profile:\n{}", serde_json::to_string_pretty(&profile)?);
        }
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        if !self.sessions.restore().await? {
            println!("Not signed in");
            return Ok(());
        }
        let token = self
            .state
            .current_token()
            .ok_or_else(|| anyhow::anyhow!("Session state missing token"))?;
        let api = self
            .api
            .with_token(token)
            .with_interceptor(Arc::clone(&self.interceptor));

        let me: Value = api.get_json("/auth/me").await?;
        println!("{}", serde_json::to_string_pretty(&me)?);
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        self.sessions.restore().await?;
        if self.manager.check_and_refresh_if_needed().await {
            println!("Session is valid");
        } else {
            println!("Session could not be validated");
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.sessions.restore().await?;
        if self.manager.refresh_token().await {
            if let Some(at) = self.manager.last_refreshed_at() {
                let local = at.with_timezone(&chrono::Local);
                println!("Token refreshed at {}", local.format("%Y-%m-%d %H:%M:%S"));
            }
        } else {
            println!("Token was not refreshed");
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.sessions.logout().await?;
        println!("Logged out");
        Ok(())
    }

    async fn onboard(&self) -> Result<()> {
        self.store.set_onboarding_completed(true).await?;
        println!("Onboarding marked as completed");
        Ok(())
    }

    async fn daemon(&self) -> Result<()> {
        if !self.sessions.restore().await? {
            println!("Not signed in");
            return Ok(());
        }
        self.manager.check_and_refresh_if_needed().await;

        self.manager.start_auto_refresh();
        let settings = self.manager.settings();
        info!(
            interval_secs = settings.interval.as_secs(),
            timeout_secs = settings.request_timeout.as_secs(),
            "Keeping session fresh, press Ctrl-C to stop"
        );

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        self.manager.stop_auto_refresh();
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load()?;

    let _log_guard = match cli.command {
        Command::Daemon => {
            let log_dir = config.data_dir()?.join("logs");
            std::fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
            init_tracing("info", Some(&log_dir))
        }
        _ => init_tracing("warn", None),
    };
    info!("worksync starting");

    let app = App::new(config, cli.keyring)?;
    match cli.command {
        Command::Login { email } => app.login(email).await,
        Command::Status => app.status().await,
        Command::Whoami => app.whoami().await,
        Command::Check => app.check().await,
        Command::Refresh => app.refresh().await,
        Command::Logout => app.logout().await,
        Command::Onboard => app.onboard().await,
        Command::Daemon => app.daemon().await,
    }
}
