//! Session lifecycle management.
//!
//! Tracks session health with rate-limited probes and rebuilds the handle on
//! detected failure: ALIVE → (probe fails) → DEAD → RECREATING → ALIVE.
//! Replacing the handle invalidates every outstanding reference, so callers
//! always go through [`SessionManager::run`] instead of caching a handle
//! across suspension points.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::engine::errors::{ScrapeError, ScrapeResult};
use crate::session::handle::NavigationSession;

/// Boxed future produced by a session factory
pub type SessionFuture<S> = Pin<Box<dyn Future<Output = ScrapeResult<S>> + Send>>;

/// Factory constructing a replacement session handle
pub type SessionFactory<S> = Arc<dyn Fn() -> SessionFuture<S> + Send + Sync>;

/// Health bookkeeping for the current handle
#[derive(Debug, Clone, Copy)]
pub struct SessionState {
    pub alive: bool,
    pub created_at: Instant,
    pub last_checked_at: Instant,
}

struct Inner<S> {
    session: Option<S>,
    state: Option<SessionState>,
}

/// Exclusive owner of the live [`NavigationSession`]
pub struct SessionManager<S: NavigationSession, C: Clock> {
    factory: SessionFactory<S>,
    inner: Mutex<Inner<S>>,
    clock: Arc<C>,
    /// Minimum interval between expensive liveness probes
    check_interval: Duration,
}

impl<S: NavigationSession, C: Clock> SessionManager<S, C> {
    pub fn new(factory: SessionFactory<S>, clock: Arc<C>, check_interval: Duration) -> Self {
        Self {
            factory,
            inner: Mutex::new(Inner {
                session: None,
                state: None,
            }),
            clock,
            check_interval,
        }
    }

    /// Ensure a live session exists, probing at most once per check interval.
    ///
    /// Within the interval the current believed state is returned without
    /// probing. On probe failure the handle is discarded and rebuilt; a
    /// factory failure propagates as `Fatal` (session construction is
    /// expensive and retried only by the caller's own bounded loop).
    pub async fn ensure_alive(&self) -> ScrapeResult<()> {
        let mut inner = self.inner.lock().await;
        let now = self.clock.now();

        if let Some(state) = inner.state {
            if now.duration_since(state.last_checked_at) < self.check_interval {
                debug!("Health check rate-limited, believed alive={}", state.alive);
                if state.alive {
                    return Ok(());
                }
            } else if let Some(session) = &inner.session {
                let alive = session.is_alive().await;
                if let Some(state) = inner.state.as_mut() {
                    state.last_checked_at = now;
                    state.alive = alive;
                }
                if alive {
                    return Ok(());
                }
                warn!("Session health probe failed, recreating");
            }
        }

        self.recreate_locked(&mut inner).await
    }

    /// Discard the current handle and build a fresh one unconditionally.
    ///
    /// Used by the executor when an operation fails with `SessionLost`
    /// mid-flight, before the next health probe would notice.
    pub async fn force_recreate(&self) -> ScrapeResult<()> {
        let mut inner = self.inner.lock().await;
        warn!("Forcing session recreation");
        self.recreate_locked(&mut inner).await
    }

    async fn recreate_locked(&self, inner: &mut Inner<S>) -> ScrapeResult<()> {
        // DEAD → RECREATING: drop the old handle first so its resources are
        // released before the replacement launches
        if let Some(mut old) = inner.session.take() {
            old.close().await;
        }
        inner.state = None;

        let session = (self.factory)().await.map_err(|e| {
            ScrapeError::Fatal(format!("session construction failed: {e}"))
        })?;

        let now = self.clock.now();
        inner.session = Some(session);
        inner.state = Some(SessionState {
            alive: true,
            created_at: now,
            last_checked_at: now,
        });
        info!("Session recreated");
        Ok(())
    }

    /// Run one operation against the current handle.
    ///
    /// The handle never escapes the closure, so no caller can hold a stale
    /// reference across a recreation.
    pub async fn run<T, F>(&self, op: F) -> ScrapeResult<T>
    where
        F: for<'a> FnOnce(&'a S) -> Pin<Box<dyn Future<Output = ScrapeResult<T>> + Send + 'a>>,
    {
        let inner = self.inner.lock().await;
        let session = inner
            .session
            .as_ref()
            .ok_or_else(|| ScrapeError::SessionLost("no live session".to_string()))?;
        op(session).await
    }

    /// Age of the current handle, for diagnostics
    pub async fn session_state(&self) -> Option<SessionState> {
        self.inner.lock().await.state
    }

    /// Close the session gracefully; safe to call multiple times
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut session) = inner.session.take() {
            info!("Shutting down session");
            session.close().await;
        }
        inner.state = None;
    }
}
