// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! SDK Bootstrap
//!
//! Process-scoped "loaded" and "initialized" state for the external
//! cryptographic engine.
//!
//! ## Lifetime
//!
//! - `SdkBootstrap::global()` is created on first use and lives for the
//!   process lifetime. Install a loader with `install_global` before first use.
//! - Standalone bootstraps (`SdkBootstrap::new`) are torn down when the last
//!   `Arc` is dropped; tests use these for isolation.
//!
//! ## Concurrency
//!
//! Both steps run behind a `tokio::sync::OnceCell`: concurrent callers await
//! the single in-flight attempt instead of starting another. A failed attempt
//! leaves the cell empty so a later caller may retry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::engine::{CryptoEngine, EngineLoader, InitOptions};
use crate::error::{SessionError, SessionResult};

static GLOBAL_BOOTSTRAP: OnceLock<Arc<SdkBootstrap>> = OnceLock::new();

pub struct SdkBootstrap {
    loader: Option<Arc<dyn EngineLoader>>,
    engine: OnceCell<Arc<dyn CryptoEngine>>,
    initialized: OnceCell<()>,
    load_attempts: AtomicUsize,
    init_attempts: AtomicUsize,
}

impl SdkBootstrap {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader: Some(loader),
            engine: OnceCell::new(),
            initialized: OnceCell::new(),
            load_attempts: AtomicUsize::new(0),
            init_attempts: AtomicUsize::new(0),
        }
    }

    /// Bootstrap for an environment that cannot load engine code
    pub fn unavailable() -> Self {
        Self {
            loader: None,
            engine: OnceCell::new(),
            initialized: OnceCell::new(),
            load_attempts: AtomicUsize::new(0),
            init_attempts: AtomicUsize::new(0),
        }
    }

    /// Bootstrap whose engine is already present in the process
    pub fn preloaded(engine: Arc<dyn CryptoEngine>) -> Self {
        let bootstrap = Self::unavailable();
        // Freshly created cell, cannot already be set
        let _ = bootstrap.engine.set(engine);
        bootstrap
    }

    /// Install the process-wide bootstrap. Returns `false` if one is already installed.
    pub fn install_global(bootstrap: SdkBootstrap) -> bool {
        GLOBAL_BOOTSTRAP.set(Arc::new(bootstrap)).is_ok()
    }

    /// Process-wide bootstrap (an `unavailable` one if nothing was installed)
    pub fn global() -> Arc<SdkBootstrap> {
        GLOBAL_BOOTSTRAP
            .get_or_init(|| Arc::new(SdkBootstrap::unavailable()))
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Number of times the loader has actually been invoked
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub fn init_attempts(&self) -> usize {
        self.init_attempts.load(Ordering::SeqCst)
    }

    /// Load the engine once, deduplicating concurrent callers
    pub async fn ensure_loaded(&self) -> SessionResult<Arc<dyn CryptoEngine>> {
        if let Some(engine) = self.engine.get() {
            debug!("FHE engine already loaded");
            return Ok(engine.clone());
        }

        let loader = self.loader.clone().ok_or_else(|| {
            SessionError::engine_load("no engine loader available in this environment")
        })?;

        let engine = self
            .engine
            .get_or_try_init(|| async {
                self.load_attempts.fetch_add(1, Ordering::SeqCst);
                info!("📦 Loading FHE engine");
                loader.load().await.map_err(|e| {
                    warn!("FHE engine load failed: {}", e);
                    SessionError::engine_load(e.to_string())
                })
            })
            .await?;

        Ok(engine.clone())
    }

    /// Run the engine's one-time setup if it has not succeeded yet
    pub async fn ensure_initialized(&self, options: &InitOptions) -> SessionResult<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let engine = self
            .engine
            .get()
            .cloned()
            .ok_or_else(|| SessionError::engine_init("engine must be loaded before initialization"))?;

        self.initialized
            .get_or_try_init(|| async {
                self.init_attempts.fetch_add(1, Ordering::SeqCst);
                info!("⚙️  Initializing FHE engine");
                match engine.init(options).await {
                    Ok(true) => {
                        info!("✅ FHE engine initialized");
                        Ok(())
                    }
                    Ok(false) => Err(SessionError::engine_init("engine setup reported failure")),
                    Err(e) => Err(SessionError::engine_init(e.to_string())),
                }
            })
            .await?;

        Ok(())
    }
}
