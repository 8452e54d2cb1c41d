//! # Runtime
//!
//! Tokio runtime profiles for the larp binaries.
//!
//! * `high_performance` - the HTTP server: every core, larger stacks, long keep-alive.
//! * `memory_efficient` - tools and tests: half the cores, small stacks.
//! * `default` - in between.
//!
//! `LARP_WORKER_THREADS` overrides the detected worker count for every profile.
//!
//! ```rust,ignore
//! #[larp_runtime::main(high_performance)]
//! async fn main() -> anyhow::Result<()> {
//!     Ok(())
//! }
//! ```

pub use anyhow::Result;
pub use larp_derive::main;

use anyhow::Context;
use std::sync::OnceLock;
use std::thread::available_parallelism;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

const WORKER_THREADS_ENV: &str = "LARP_WORKER_THREADS";
const FALLBACK_WORKERS: usize = 4;
const MAX_WORKERS: usize = 512;
const MIB: usize = 1024 * 1024;
const STACK_RANGE: (usize, usize) = (MIB, 16 * MIB);
const DEFAULT_THREAD_NAME: &str = "larp-worker";

fn detected_workers() -> usize {
    static WORKERS: OnceLock<usize> = OnceLock::new();
    *WORKERS.get_or_init(|| {
        std::env::var(WORKER_THREADS_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|n| (1..=MAX_WORKERS).contains(n))
            .unwrap_or_else(|| {
                available_parallelism().map_or(FALLBACK_WORKERS, std::num::NonZero::get)
            })
    })
}

/// Settings for [`build_runtime_with_config`]. Out-of-range values are
/// clamped when the runtime is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: detected_workers(),
            stack_size: 3 * MIB,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: Duration::from_secs(60),
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn high_performance() -> Self {
        Self {
            stack_size: 4 * MIB,
            thread_name: "larp-server".to_owned(),
            thread_keep_alive: Duration::from_secs(300),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn memory_efficient() -> Self {
        Self {
            worker_threads: (detected_workers() / 2).max(1),
            stack_size: 2 * MIB,
            thread_name: "larp-lite".to_owned(),
            thread_keep_alive: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    #[must_use]
    pub const fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Copy with every field forced into its accepted range.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let thread_name = match self.thread_name.trim() {
            "" => DEFAULT_THREAD_NAME.to_owned(),
            name => name.to_owned(),
        };
        Self {
            worker_threads: self.worker_threads.clamp(1, MAX_WORKERS),
            stack_size: self.stack_size.clamp(STACK_RANGE.0, STACK_RANGE.1),
            thread_name,
            thread_keep_alive: self.thread_keep_alive,
        }
    }
}

/// Builds a multi-threaded runtime with I/O and timers enabled.
///
/// # Errors
/// Fails when the OS refuses to spawn the worker threads.
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime> {
    let config = config.normalized();
    tracing::debug!(
        workers = config.worker_threads,
        stack = config.stack_size,
        name = %config.thread_name,
        "building tokio runtime"
    );

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_clamps_every_field() {
        let config = RuntimeConfig::default()
            .with_worker_threads(0)
            .with_stack_size(10)
            .with_thread_name("   ")
            .normalized();
        assert_eq!(config.worker_threads, 1);
        assert_eq!(config.stack_size, STACK_RANGE.0);
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);

        let config = RuntimeConfig::default()
            .with_worker_threads(10_000)
            .with_stack_size(512 * MIB)
            .normalized();
        assert_eq!(config.worker_threads, MAX_WORKERS);
        assert_eq!(config.stack_size, STACK_RANGE.1);
    }

    #[test]
    fn presets_differ_where_expected() {
        let server = RuntimeConfig::high_performance();
        let lite = RuntimeConfig::memory_efficient();
        assert!(server.stack_size > lite.stack_size);
        assert!(server.worker_threads >= lite.worker_threads);
        assert_eq!(server.thread_name, "larp-server");
    }

    #[test]
    fn built_runtime_executes_futures() -> Result<()> {
        let runtime = build_runtime_with_config(&RuntimeConfig::memory_efficient().with_worker_threads(1))?;
        let answer = runtime.block_on(async { 6 * 7 });
        assert_eq!(answer, 42);
        Ok(())
    }
}
