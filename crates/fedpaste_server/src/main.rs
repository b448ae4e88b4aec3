//! fedpaste server entrypoint.

use fedpaste_core::config::env_flag_enabled;
use fedpaste_core::constants::{EXPIRY_SWEEP_INTERVAL, SESSION_PRUNE_INTERVAL};
use fedpaste_core::credentials::hash_slow;
use fedpaste_core::tasks::{spawn_expiry_sweeper, spawn_session_pruner, IntervalTicker};
use fedpaste_server::{resolve_bind_address, serve_router, AppState, Config, Database, DEFAULT_PORT};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliFlags {
    help: bool,
    hash_password: Option<String>,
}

fn parse_cli_flags(args: &[String]) -> anyhow::Result<CliFlags> {
    let mut flags = CliFlags::default();
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--help" => flags.help = true,
            "--hash-password" => match rest.next() {
                Some(value) => flags.hash_password = Some(value.clone()),
                None => anyhow::bail!("--hash-password needs a value"),
            },
            value if value.starts_with('-') => {
                anyhow::bail!(
                    "Unknown option: '{}'. Use --help to see supported options.",
                    value
                );
            }
            value => {
                anyhow::bail!(
                    "Unexpected positional argument: '{}'. Use --help to see supported options.",
                    value
                );
            }
        }
    }
    Ok(flags)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fedpaste=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli_flags = parse_cli_flags(&args)?;

    if cli_flags.help {
        print_help();
        return Ok(());
    }
    if let Some(password) = cli_flags.hash_password {
        println!("{}", hash_slow(&password)?);
        return Ok(());
    }

    let config = Config::from_env();
    let database = Database::open(&config).await?;
    if database
        .pastes
        .bootstrap_version(&config.server_version)
        .await?
    {
        tracing::info!("Server version is now {}", config.server_version);
    }
    database
        .logs
        .startup_maintenance(config.purge_bot_sessions)
        .await?;

    let sweeper = spawn_expiry_sweeper(
        database.pastes.clone(),
        IntervalTicker::new(EXPIRY_SWEEP_INTERVAL),
    );
    let pruner = spawn_session_pruner(
        database.logs.clone(),
        IntervalTicker::new(SESSION_PRUNE_INTERVAL),
    );

    let state = AppState::new(config.clone(), database);

    let allow_public = env_flag_enabled("ALLOW_PUBLIC_ACCESS");
    if allow_public {
        tracing::warn!("Public access enabled - server will accept requests from any origin");
    }

    let bind_addr = resolve_bind_address(&config, allow_public);
    if !bind_addr.ip().is_loopback() {
        tracing::warn!(
            "Binding to non-localhost address: {} - ensure proper security measures are in place",
            bind_addr
        );
    }

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("fedpaste running at http://{}", actual_addr);

    let db = state.db.clone();
    let serve_result = serve_router(listener, state, allow_public, shutdown_signal()).await;

    sweeper.stop().await;
    pruner.stop().await;
    db.close().await;
    tracing::info!("Database closed");

    serve_result?;

    Ok(())
}

fn print_help() {
    println!("fedpaste server\n");
    println!("Usage: fedpaste [OPTIONS]\n");
    println!("Options:");
    println!("  --hash-password <value>  Print an argon2 hash usable as ADMIN_PASSWORD");
    println!("  --help                   Show this help message");
    println!("\nEnvironment variables:");
    println!("  DATA_DIR                 Data directory (default: ~/.cache/fedpaste)");
    println!("  DATABASE_URL             sqlite:// or postgres:// URL (default: <DATA_DIR>/pastes.db)");
    println!("  EXPIRY_PATH              Expiry index file (default: <DATA_DIR>/expiry.txt)");
    println!(
        "  PORT                     Server port (default: {})",
        DEFAULT_PORT
    );
    println!("  ADMIN_PASSWORD           Admin secret, plaintext or argon2 hash");
    println!("  GENERATE_EDIT_PASSWORDS  Generate edit passwords when none is given");
    println!("  LOG_EVENTS               Paste events written to the event log");
    println!("  PURGE_BOT_SESSIONS       Drop bot sessions at startup");
    println!("  FEDERATION_SCHEME        http or https for peer requests (default: https)");
    println!("  LIST_LIMIT               Upper bound for list scans (default: 500)");
    println!("  ALLOW_PUBLIC_ACCESS      Allow CORS from any origin and non-loopback binds");
    println!(
        "  BIND                     Override bind address (e.g. 0.0.0.0:{})",
        DEFAULT_PORT
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::{parse_cli_flags, CliFlags};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parse_cli_flags_rejects_unknown_and_positional_arguments() {
        let cases = [
            (args(&["fedpaste", "--hash-pasword"]), "Unknown option"),
            (args(&["fedpaste", "serve"]), "Unexpected positional argument"),
            (args(&["fedpaste", "--hash-password"]), "needs a value"),
        ];

        for (args, expected_fragment) in cases {
            let err = parse_cli_flags(&args).expect_err("invalid args should be rejected");
            assert!(err.to_string().contains(expected_fragment));
        }
    }

    #[test]
    fn parse_cli_flags_accepts_supported_options() {
        let flags = parse_cli_flags(&args(&["fedpaste", "--hash-password", "s3cret", "--help"]))
            .expect("known options should parse");
        assert_eq!(
            flags,
            CliFlags {
                help: true,
                hash_password: Some("s3cret".to_string()),
            }
        );
        assert_eq!(parse_cli_flags(&args(&["fedpaste"])).expect("no args"), CliFlags::default());
    }
}
