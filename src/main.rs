mod logging;

use anyhow::{Context as _, Result, anyhow, bail};
use arc_swap::ArcSwap;
use clap::{Parser, Subcommand};
use partnergate_auth::{ServiceLogin, TokenManager};
use partnergate_config::{Config, ConfigWatcher};
use partnergate_gateway::{
    Attachment, Method, MultipartBody, Query, RequestContext, RequestGateway,
};
use partnergate_proxy::AppState;
use partnergate_store::FileTokenStore;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Parser, Debug)]
#[command(
    name = "partnergate",
    version,
    about = "partnergate: partner dashboard gateway to the restaurant-management API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server.
    Serve {
        /// Path to the YAML configuration file (hot-reloaded on change).
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Override the listening port (default: 8030).
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the listening address (default: 127.0.0.1).
        #[arg(long)]
        host: Option<String>,
    },
    /// Show the cached service token status.
    Token {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Discard the cached token and log in again.
        #[arg(long)]
        renew: bool,
    },
    /// Remove the cached service token.
    Logout {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Perform one call against the upstream partner API and print the JSON result.
    Call {
        /// GET, POST, PUT or DELETE.
        method: String,
        /// Endpoint relative to the partner API prefix, e.g. `organizations/12`.
        path: String,
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Query parameter, repeatable.
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
        /// JSON request body.
        #[arg(long, value_name = "BODY", conflicts_with = "file")]
        json: Option<String>,
        /// File sent as a multipart attachment, repeatable.
        #[arg(long = "file", value_name = "FIELD=PATH")]
        file: Vec<String>,
        /// Act as an end user instead of the service identity.
        #[arg(long, value_name = "TOKEN")]
        user_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port, host } => cmd_serve(config, port, host).await,
        Commands::Token { config, renew } => cmd_token(config, renew).await,
        Commands::Logout { config } => cmd_logout(config).await,
        Commands::Call {
            method,
            path,
            config,
            query,
            json,
            file,
            user_token,
        } => {
            let request = CallArgs {
                method,
                path,
                query,
                json,
                file,
                user_token,
            };
            cmd_call(config, request).await
        }
    }
}

/// Wired-up service-token manager and gateway sharing one HTTP client.
struct Services {
    tokens: Arc<TokenManager>,
    gateway: Arc<RequestGateway>,
}

impl Services {
    fn new(config: &Arc<ArcSwap<Config>>) -> Result<Self> {
        let snapshot = config.load();
        let http = reqwest::Client::builder()
            .user_agent(concat!("partnergate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        let store = Arc::new(FileTokenStore::new(
            snapshot.service.token_path(),
            snapshot.service.token_ttl(),
        ));
        let tokens = Arc::new(TokenManager::new(
            store,
            ServiceLogin::new(http.clone(), Arc::clone(config)),
        ));
        let gateway = Arc::new(RequestGateway::new(
            http,
            Arc::clone(config),
            Arc::clone(&tokens),
        ));
        Ok(Self { tokens, gateway })
    }
}

fn load_config(path: Option<&Path>) -> Result<Arc<ArcSwap<Config>>> {
    let config = Config::load(path).map_err(|e| anyhow!("config error: {e}"))?;
    Ok(Arc::new(ArcSwap::from_pointee(config)))
}

async fn cmd_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    host: Option<String>,
) -> Result<()> {
    let (config, watcher) = match config_path {
        Some(path) => {
            let watcher =
                Arc::new(ConfigWatcher::new(path).map_err(|e| anyhow!("config error: {e}"))?);
            (watcher.arc(), Some(watcher))
        }
        None => (load_config(None)?, None),
    };
    let _log_guard = logging::init(&config.load().log)?;

    if let Some(watcher) = watcher {
        watcher.watch().context("failed to watch configuration file")?;
    }

    let addr = {
        let snapshot = config.load();
        format!(
            "{}:{}",
            host.unwrap_or_else(|| snapshot.host.clone()),
            port.unwrap_or(snapshot.port)
        )
    };

    let services = Services::new(&config)?;
    let app = partnergate_proxy::make_router(AppState::new(config, services.gateway));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "partnergate listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn cmd_token(config_path: Option<PathBuf>, renew: bool) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let _log_guard = logging::init(&config.load().log)?;
    let services = Services::new(&config)?;

    if renew {
        services
            .tokens
            .force_renew()
            .await
            .context("service token renewal failed")?;
        eprintln!("service token renewed");
    }

    match services.tokens.credential().await? {
        Some(cred) if cred.is_valid() => println!(
            "service token: valid (expires_at {}, {}s remaining)",
            cred.expires_at,
            cred.remaining_secs()
        ),
        Some(cred) => println!("service token: expired (expires_at {})", cred.expires_at),
        None => println!("service token: none cached"),
    }
    Ok(())
}

async fn cmd_logout(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let _log_guard = logging::init(&config.load().log)?;
    let services = Services::new(&config)?;

    services
        .tokens
        .clear_token()
        .await
        .context("failed to clear service token")?;
    eprintln!("service token cleared");
    Ok(())
}

struct CallArgs {
    method: String,
    path: String,
    query: Vec<String>,
    json: Option<String>,
    file: Vec<String>,
    user_token: Option<String>,
}

async fn cmd_call(config_path: Option<PathBuf>, args: CallArgs) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let _log_guard = logging::init(&config.load().log)?;
    let services = Services::new(&config)?;

    let method: Method = args.method.parse().map_err(|e: String| anyhow!(e))?;
    let mut query = Query::new();
    for pair in &args.query {
        let (key, value) = split_pair(pair, "--query")?;
        query.insert(key.to_string(), value.to_string());
    }

    let mut ctx = RequestContext::new(method, services.gateway.endpoint(&args.path))
        .with_query(query)
        .with_user_token(args.user_token);

    if let Some(json) = &args.json {
        let body: serde_json::Value =
            serde_json::from_str(json).context("--json is not valid JSON")?;
        ctx = ctx.with_body(body);
    } else if !args.file.is_empty() {
        let mut form = MultipartBody::new();
        for entry in &args.file {
            let (field, path) = split_pair(entry, "--file")?;
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {path}"))?;
            let file_name = Path::new(path)
                .file_name()
                .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());
            form = form.file(field, Attachment::new(file_name, bytes));
        }
        ctx = ctx.with_body(form);
    }

    match services.gateway.execute(ctx).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => bail!("{} [{}]", e.message, e.kind),
    }
}

fn split_pair<'a>(pair: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    pair.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| anyhow!("{flag} expects KEY=VALUE, got '{pair}'"))
}
