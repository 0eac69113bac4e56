//! LETHE - In-Memory Key-Value Store with TTLs
//!
//! Usage:
//!   lethe                  interactive prompt on a private store
//!   lethe server [addr]    serve a shared store over TCP
//!   lethe client [addr]    connect to a running server

use std::io;

use lethe::config::Config;
use lethe::engine::Lethe;
use lethe::error::Result;
use lethe::{client, repl, server};

fn main() {
    let mut args = std::env::args().skip(1);
    let mode = args.next();
    let addr_override = args.next();

    let default_level = if mode.is_some() { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("[ERROR] {}", err);
            std::process::exit(1);
        }
    };
    if let Some(addr) = addr_override {
        config = config.with_listen_addr(addr);
    }

    let result = match mode.as_deref() {
        None => run_prompt(config),
        Some("server") => run_server(config),
        Some("client") => run_client(&config.listen_addr),
        Some(other) => {
            eprintln!("Unknown mode '{}'. Use `lethe`, `lethe server [addr]` or `lethe client [addr]`.", other);
            std::process::exit(2);
        }
    };

    if let Err(err) = result {
        eprintln!("[ERROR] {}", err);
        std::process::exit(1);
    }
}

fn run_prompt(config: Config) -> Result<()> {
    let store = Lethe::open(config)?;
    let mut stdout = io::stdout();

    repl::print_banner(&mut stdout)?;
    let outcome = repl::run(&store, io::stdin().lock(), &mut stdout);
    store.shutdown();
    outcome?;
    Ok(())
}

fn run_server(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let store = Lethe::open(config.clone())?;

    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
        server::run(listener, store.clone(), shutdown_signal()).await;
        Ok::<_, io::Error>(())
    })?;

    store.shutdown();
    // Open connections are abandoned rather than drained.
    runtime.shutdown_background();
    Ok(())
}

fn run_client(addr: &str) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(client::run(addr))
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                log::error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
