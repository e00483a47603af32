//! Process wide registry of the route computations which are currently in
//! flight. A single registry is created on startup and shared with every
//! worker, it is used to admit new requests, to signal cancellation to running
//! ones and to cap the number of requests which run at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::time::{Instant, sleep};

use crate::common::error::{Result, RouteError};

/// Delay between checks for the removal of a cancelled predecessor
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Number of checks before admission is refused
pub const MAX_POLLS: u32 = 15;

/// Entries older than this are swept, and their computation is told to cancel
pub const STALE_AFTER: Duration = Duration::from_secs(180);

/// Cooperative cancellation flag, shared between the registry and the
/// computation it belongs to
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token which isn't attached to any registry, it can still be
    /// cancelled by hand
    pub fn detached() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Checkpoint, returns Cancelled once cancellation has been requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RouteError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    created_at: Instant,
    generation: u64,
    cancel: CancelToken,
}

/// Registry of active sessions, keyed by the session id provided by the
/// client
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<FxHashMap<String, SessionEntry>>,
    next_generation: AtomicU64,
    max_active: usize,
}

impl SessionRegistry {
    /// One worker is always kept free, so the cap is one less than the pool
    pub fn new(worker_pool_size: usize) -> Self {
        SessionRegistry {
            sessions: Mutex::new(FxHashMap::default()),
            next_generation: AtomicU64::new(0),
            max_active: worker_pool_size.saturating_sub(1).max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Try to register a session with the provided id, and return it if
    /// successful. Any entry which already exists with the same id is asked
    /// to cancel, and admission waits for it to go away.
    fn try_insert(&self, session_id: &str) -> Result<Option<(u64, CancelToken)>> {
        let mut sessions = self.lock();

        let now = Instant::now();
        sessions.retain(|id, entry| {
            let stale = now.duration_since(entry.created_at) > STALE_AFTER;
            if stale {
                log::warn!("Dropping stale session {id}");
                entry.cancel.cancel();
            }
            !stale
        });

        if let Some(existing) = sessions.get(session_id) {
            existing.cancel.cancel();
            return Ok(None);
        }

        if sessions.len() >= self.max_active {
            return Err(RouteError::ServerBusy(sessions.len()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let cancel = CancelToken::default();
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                created_at: now,
                generation: generation,
                cancel: cancel.clone(),
            },
        );

        Ok(Some((generation, cancel)))
    }

    /// Admit a new computation for the provided session. If a computation is
    /// already running for the same session it is asked to cancel, and this
    /// waits up to MAX_POLLS * POLL_INTERVAL for it to unwind.
    pub async fn admit(self: &Arc<Self>, session_id: &str) -> Result<SessionGuard> {
        let mut polls = 0;
        loop {
            if let Some((generation, cancel)) = self.try_insert(session_id)? {
                log::info!("Admitted session {session_id}");
                return Ok(SessionGuard {
                    registry: Arc::clone(self),
                    session_id: session_id.to_string(),
                    generation: generation,
                    cancel: cancel,
                });
            }

            if polls >= MAX_POLLS {
                return Err(RouteError::PriorRequestStillRunning(session_id.to_string()));
            }

            log::debug!("Waiting for prior request of session {session_id}");
            sleep(POLL_INTERVAL).await;
            polls += 1;
        }
    }

    /// Remove a session, regardless of which computation it belongs to
    pub fn confirm(&self, session_id: &str) {
        self.lock().remove(session_id);
    }

    fn remove_generation(&self, session_id: &str, generation: u64) {
        let mut sessions = self.lock();
        if sessions
            .get(session_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            sessions.remove(session_id);
        }
    }

    /// Flag a running session for cancellation without waiting for it.
    /// Returns false if there was nothing to cancel
    pub fn request_cancel(&self, session_id: &str) -> bool {
        match self.lock().get(session_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_cancel_requested(&self, session_id: &str) -> bool {
        self.lock()
            .get(session_id)
            .is_some_and(|entry| entry.cancel.is_cancelled())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.lock().len()
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }
}

/// Keeps a session registered for as long as it is held. Dropping the guard
/// removes the entry it created, but never a newer entry with the same id
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    session_id: String,
    generation: u64,
    cancel: CancelToken,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Distinguishes this admission from earlier and later ones under the
    /// same session id
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove_generation(&self.session_id, self.generation);
        log::debug!("Released session {}", self.session_id);
    }
}
