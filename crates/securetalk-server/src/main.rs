mod handlers;

use std::sync::Arc;

use clap::Parser;
use securetalk::auth::CredentialStore;
use securetalk::net::Server;
use securetalk::utils;
use securetalk::utils::config::ServerConfig;
use tracing::{error, info};

/// SecureTalk chat server.
#[derive(Parser, Debug)]
struct Args {
    /// Path to a TOML config file. Missing file falls back to defaults.
    #[arg(long, default_value = "securetalk.toml")]
    config: std::path::PathBuf,

    /// Overrides the configured port.
    #[arg(long)]
    port: Option<u16>,

    /// Overrides the configured data directory (credential store location).
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,
}

fn main() {
    let args = Args::parse();

    let mut config = match ServerConfig::load_from(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config from {}: {err}", args.config.display());
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    utils::logging::init(&config.log_level);

    let data_dir = config
        .data_dir
        .clone()
        .unwrap_or_else(|| utils::directories::data_dir("securetalk"));
    if let Err(err) = std::fs::create_dir_all(&data_dir) {
        error!(?err, ?data_dir, "failed to create data directory");
        std::process::exit(1);
    }

    let credentials_path = CredentialStore::default_path(&data_dir);
    let store = match CredentialStore::load_from(&credentials_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(?err, "failed to load credential store");
            std::process::exit(1);
        }
    };

    let mut server = Server::new();
    if let Err(err) = server.set_port(u32::from(config.port)) {
        error!(?err, "invalid configured port");
        std::process::exit(1);
    }
    if let Some(max_worker_threads) = config.max_worker_threads {
        server.set_max_worker_threads(max_worker_threads);
    }
    server.set_max_frame_body_size(config.max_frame_body_size);

    server.register(handlers::ECHO, handlers::echo());
    server.register(handlers::DELAYED_ECHO, handlers::delayed_echo());
    server.register(handlers::LOGIN_REQUEST, handlers::login(store.clone()));
    server.register(handlers::SIGNUP_REQUEST, handlers::signup(store.clone()));

    let shutdown_handle = server.shutdown_handle();
    register_shutdown_signal(signal_hook::consts::SIGINT, shutdown_handle.clone());
    register_shutdown_signal(signal_hook::consts::SIGTERM, shutdown_handle.clone());

    info!(port = config.port, data_dir = ?data_dir, "starting securetalk-server");
    if let Err(err) = server.start(u32::from(config.port)) {
        error!(?err, "server exited with error");
        std::process::exit(1);
    }

    if let Err(err) = store.persist_to(&credentials_path) {
        error!(?err, "failed to persist credential store on shutdown");
    }
}

fn register_shutdown_signal(signal: std::ffi::c_int, handle: securetalk::net::ShutdownHandle) {
    let registered = unsafe {
        signal_hook::low_level::register(signal, move || {
            handle.shutdown();
        })
    };
    if let Err(err) = registered {
        error!(?err, signal, "failed to register signal handler");
        std::process::exit(1);
    }
}
