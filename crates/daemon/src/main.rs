// SPDX-License-Identifier: MIT

//! `swd` - the Siteward site orchestration daemon.
//!
//! Exit codes: 0 on clean shutdown, 1 on fatal startup misconfiguration.

use sw_daemon::{AgentConfig, Daemon};
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("swd: configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Keep the appender guard alive for the life of the process.
    let _guard = init_tracing(&config);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("swd: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(async {
        match Daemon::start(config).await {
            Ok(daemon) => daemon.run_until_shutdown().await,
            Err(e) => {
                error!(error = %e, "startup failed");
                eprintln!("swd: startup failed: {}", e);
                1
            }
        }
    });
    std::process::exit(code);
}

fn init_tracing(config: &AgentConfig) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "swd.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}
