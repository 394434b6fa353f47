//! # aria-pool
//!
//! Task state synchronization for aria2 front-ends.
//!
//! A [`Pool`] keeps a local, persistent record of downloads submitted to an
//! aria2 engine over JSON-RPC, polls the engine for their status and files
//! every task into one of three kinds of groupings:
//! - the **queue**, listing unfinished tasks
//! - one **category** per download directory, listing finished tasks
//! - the **dustbin**, listing removed tasks
//!
//! User interfaces observe the pool through synchronous handlers or an async
//! event stream; they never talk to the engine directly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use aria_pool::{Config, EventKind, NewTask, Pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.engine.secret = Some("s3cret".to_string());
//!
//!     let pool = Pool::new(config).await?;
//!
//!     pool.subscribe(EventKind::Notification, |event| {
//!         println!("{:?}", event);
//!     });
//!
//!     let task = pool
//!         .create_task(NewTask::uri(["https://example.com/file.iso"]))
//!         .await?;
//!     pool.start(task).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Event bus
pub mod events;
/// Queue, category and dustbin groupings
pub mod groups;
/// Task pool (decomposed into focused submodules)
pub mod pool;
/// Engine access over JSON-RPC
pub mod rpc;
/// Tasks and their per-kind behaviour
pub mod task;
/// Core identifiers and status types
pub mod types;

// Re-export commonly used types
pub use config::{CategoryConfig, Config, EngineConfig, PersistenceConfig, PollingConfig};
pub use db::Database;
pub use error::{DatabaseError, Error, Result, RpcError, TaskError};
pub use events::{Event, EventKind, SubscriptionId};
pub use groups::{Group, Groups};
pub use pool::{NETWORK_ERROR_TITLE, Pool};
pub use rpc::{Aria2Client, EngineClient};
pub use task::{NewTask, Task};
pub use types::{CategoryKey, GroupKey, Status, TaskKey, TaskKind};

/// Keep a pool running until the process is asked to stop, then shut it down
///
/// Stops on Ctrl+C everywhere and on SIGTERM on Unix. Polling schedules run
/// in the background meanwhile; [`Pool::shutdown`] ends them and leaves the
/// engine's downloads in place for the next start.
///
/// # Example
///
/// ```no_run
/// use aria_pool::{Config, Pool, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = Pool::new(Config::default()).await?;
///     run_with_shutdown(pool).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(pool: Pool) -> Result<()> {
    let signal = stop_requested().await;
    tracing::info!(signal, "stopping pool");
    pool.shutdown().await
}

/// Name of the signal that asked the process to stop
#[cfg(unix)]
async fn stop_requested() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = ctrl_c() => "SIGINT",
        },
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for SIGTERM; stopping on Ctrl+C only");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn stop_requested() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Only SIGTERM, where available, can stop the pool now
        tracing::error!(error = %e, "cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
