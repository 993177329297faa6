//! Session registry: one live `ChatSession` per resume, loaded on first use.
//!
//! Idle sessions are evicted after `SESSION_IDLE_TTL`, and the least recently
//! used ones once more than `MAX_CACHED_SESSIONS` are cached. A session still
//! referenced by a request or an in-flight send is never evicted. Everything a
//! session holds is persisted after each mutation, so eviction only drops cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::persistence::{load_history, save_history};
use crate::chat::session::{ChatSession, SendOutcome, SessionContext};
use crate::kv::{KvError, KvStore};
use crate::llm_client::CompletionClient;
use crate::models::resume::ResumeRow;

pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
pub const MAX_CACHED_SESSIONS: usize = 500;

struct CachedSession {
    session: Arc<ChatSession>,
    last_used: Instant,
}

impl CachedSession {
    fn is_evictable(&self) -> bool {
        Arc::strong_count(&self.session) == 1 && !self.session.is_loading()
    }
}

/// A session checked out for mutation. Holds the session's edit lock until dropped.
pub struct SessionLease {
    pub session: Arc<ChatSession>,
    _edit: OwnedMutexGuard<()>,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, CachedSession>>,
    store: Arc<dyn KvStore>,
    completion: Arc<dyn CompletionClient>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn KvStore>, completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store,
            completion,
            idle_ttl: SESSION_IDLE_TTL,
            max_sessions: MAX_CACHED_SESSIONS,
        }
    }

    pub fn with_limits(mut self, idle_ttl: Duration, max_sessions: usize) -> Self {
        self.idle_ttl = idle_ttl;
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Returns the session for a resume, building it from the stored row and
    /// persisted history the first time. Title and job context are refreshed
    /// on every call; the document is only synced through `checkout`.
    pub async fn get_or_load(&self, resume: &ResumeRow) -> Result<Arc<ChatSession>, KvError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions, now);

        if let Some(cached) = sessions.get_mut(&resume.id) {
            cached.last_used = now;
            cached.session.set_title(&resume.title);
            cached.session.set_job_context(resume.job_context());
            return Ok(cached.session.clone());
        }

        let (messages, versions) = load_history(self.store.as_ref(), resume.id).await?;
        info!(
            "Loaded chat session for resume {} ({} messages, {} versions)",
            resume.id,
            messages.len(),
            versions.len()
        );
        let session = Arc::new(
            ChatSession::new(SessionContext {
                title: resume.title.clone(),
                document: resume.latex_source.clone(),
                job: resume.job_context(),
                synced_at: resume.updated_at,
                completion: self.completion.clone(),
            })
            .with_history(messages, versions),
        );
        sessions.insert(
            resume.id,
            CachedSession {
                session: session.clone(),
                last_used: now,
            },
        );
        self.evict_over_capacity(&mut sessions, resume.id);
        Ok(session)
    }

    /// Loads the session, takes its edit lock and adopts the row's document if
    /// it was written after the session last synced.
    pub async fn checkout(&self, resume: &ResumeRow) -> Result<SessionLease, KvError> {
        let session = self.get_or_load(resume).await?;
        let edit = session.lock_edits().await;

        if let Some(snapshot) = session.sync_document(&resume.latex_source, resume.updated_at) {
            info!(
                "Adopted externally edited document for resume {} (snapshot {snapshot})",
                resume.id
            );
            self.persist(resume.id, &session).await?;
        }

        Ok(SessionLease {
            session,
            _edit: edit,
        })
    }

    /// Writes the session's history and versions to the key-value store.
    pub async fn persist(&self, resume_id: Uuid, session: &ChatSession) -> Result<(), KvError> {
        let messages = session.messages();
        let versions = session.version_store();
        save_history(self.store.as_ref(), resume_id, &messages, &versions).await
    }

    /// Sends a message and persists the result on a detached task. Dropping the
    /// returned handle (e.g. the client went away) does not cancel either step.
    pub fn spawn_send(
        self: Arc<Self>,
        resume_id: Uuid,
        session: Arc<ChatSession>,
        text: String,
    ) -> JoinHandle<Result<SendOutcome, KvError>> {
        tokio::spawn(async move {
            let outcome = session.send_message(&text).await;
            if outcome != SendOutcome::Ignored {
                self.persist(resume_id, &session).await?;
            }
            Ok(outcome)
        })
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, CachedSession>, now: Instant) {
        let ttl = self.idle_ttl;
        sessions.retain(|resume_id, cached| {
            let keep = now.duration_since(cached.last_used) < ttl || !cached.is_evictable();
            if !keep {
                debug!("Evicting idle chat session for resume {resume_id}");
            }
            keep
        });
    }

    fn evict_over_capacity(&self, sessions: &mut HashMap<Uuid, CachedSession>, keep: Uuid) {
        while sessions.len() > self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(id, cached)| **id != keep && cached.is_evictable())
                .min_by_key(|(_, cached)| cached.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(resume_id) => {
                    sessions.remove(&resume_id);
                    debug!("Evicting least recently used chat session for resume {resume_id}");
                }
                None => break,
            }
        }
    }

    #[cfg(test)]
    async fn cached(&self, resume_id: Uuid) -> bool {
        self.sessions.lock().await.contains_key(&resume_id)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Notify;

    use super::*;
    use crate::kv::MemoryStore;
    use crate::llm_client::CompletionError;
    use crate::versions::store::LABEL_EXTERNAL_EDIT;

    struct EchoCompletion;

    #[async_trait]
    impl CompletionClient for EchoCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Ok("---MESSAGE---\nNoted\n---END---".to_string())
        }
    }

    /// Blocks inside `complete` until released.
    struct GatedCompletion {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CompletionClient for GatedCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok("---MESSAGE---\nLate but here\n---END---".to_string())
        }
    }

    fn resume(job_title: Option<&str>) -> ResumeRow {
        ResumeRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Backend Resume".to_string(),
            latex_source: "\\begin{document}x\\end{document}".to_string(),
            job_title: job_title.map(str::to_string),
            company: None,
            job_description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemoryStore::default()), Arc::new(EchoCompletion))
    }

    #[tokio::test]
    async fn test_same_session_returned_for_same_resume() {
        let registry = registry();
        let row = resume(None);

        let a = registry.get_or_load(&row).await.unwrap();
        let b = registry.get_or_load(&row).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.document(), row.latex_source);
    }

    #[tokio::test]
    async fn test_job_context_and_title_refreshed_on_lookup() {
        let registry = registry();
        let mut row = resume(None);
        let session = registry.get_or_load(&row).await.unwrap();
        assert!(session.job_context().is_empty());

        row.job_title = Some("Staff Engineer".to_string());
        row.title = "Platform Resume".to_string();
        registry.get_or_load(&row).await.unwrap();
        assert_eq!(session.job_context().job_title(), Some("Staff Engineer"));
        assert_eq!(session.snapshot().title, "Platform Resume");
    }

    #[tokio::test]
    async fn test_checkout_adopts_newer_row_document() {
        let registry = registry();
        let mut row = resume(None);
        let session = registry.get_or_load(&row).await.unwrap();

        row.latex_source = "\\begin{document}edited in editor\\end{document}".to_string();
        row.updated_at = row.updated_at + chrono::Duration::seconds(1);
        let lease = registry.checkout(&row).await.unwrap();

        assert!(Arc::ptr_eq(&lease.session, &session));
        assert_eq!(session.document(), row.latex_source);
        let versions = session.version_store().list();
        assert_eq!(versions[0].label, LABEL_EXTERNAL_EDIT);
        assert_eq!(versions[0].latex_snapshot, "\\begin{document}x\\end{document}");
    }

    #[tokio::test]
    async fn test_checkout_ignores_stale_row() {
        let registry = registry();
        let mut row = resume(None);
        let session = registry.get_or_load(&row).await.unwrap();
        session.replace_document("\\begin{document}new\\end{document}".to_string(), "Pre-optimization");
        session.mark_synced(row.updated_at + chrono::Duration::seconds(5));

        // a row read before our own write landed
        row.updated_at = row.updated_at + chrono::Duration::seconds(1);
        drop(registry.checkout(&row).await.unwrap());

        assert_eq!(session.document(), "\\begin{document}new\\end{document}");
        assert_eq!(session.version_store().len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_holds_edit_lock_until_dropped() {
        let registry = registry();
        let row = resume(None);

        let lease = registry.checkout(&row).await.unwrap();
        let waiting = tokio::time::timeout(Duration::from_millis(20), registry.checkout(&row)).await;
        assert!(waiting.is_err());

        drop(lease);
        assert!(registry.checkout(&row).await.is_ok());
    }

    #[tokio::test]
    async fn test_persisted_history_survives_new_registry() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
        let row = resume(Some("Rust Engineer"));

        let first = SessionRegistry::new(store.clone(), Arc::new(EchoCompletion));
        let session = first.get_or_load(&row).await.unwrap();
        session.send_message("hello").await;
        session.save_version("Manual save");
        first.persist(row.id, &session).await.unwrap();

        let second = SessionRegistry::new(store, Arc::new(EchoCompletion));
        let reloaded = second.get_or_load(&row).await.unwrap();
        assert_eq!(reloaded.messages().len(), 2);
        assert_eq!(reloaded.version_store().len(), 1);
    }

    #[tokio::test]
    async fn test_send_completes_after_caller_is_dropped() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
        let client = Arc::new(GatedCompletion {
            started: Notify::new(),
            release: Notify::new(),
        });
        let registry = Arc::new(SessionRegistry::new(store.clone(), client.clone()));
        let row = resume(None);
        let resume_id = row.id;
        let session = registry.get_or_load(&row).await.unwrap();

        let caller = {
            let registry = registry.clone();
            let session = session.clone();
            tokio::spawn(async move { registry.spawn_send(resume_id, session, "hello".to_string()).await })
        };
        client.started.notified().await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        client.release.notify_one();
        let mut stored = Vec::new();
        for _ in 0..100 {
            stored = load_history(store.as_ref(), resume_id).await.unwrap().0;
            if stored.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].content, "Late but here");
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_evicted() {
        let registry = registry().with_limits(Duration::from_secs(60), 10);
        let idle = resume(None);
        let active = resume(None);

        drop(registry.get_or_load(&idle).await.unwrap());
        tokio::time::advance(Duration::from_secs(61)).await;
        drop(registry.get_or_load(&active).await.unwrap());

        assert!(!registry.cached(idle.id).await);
        assert!(registry.cached(active.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_in_use_is_not_evicted() {
        let registry = registry().with_limits(Duration::from_secs(60), 10);
        let row = resume(None);

        let held = registry.get_or_load(&row).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        drop(registry.get_or_load(&resume(None)).await.unwrap());

        assert!(registry.cached(row.id).await);
        drop(held);
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_recently_used_evicted_over_capacity() {
        let registry = registry().with_limits(Duration::from_secs(3600), 2);
        let (a, b, c) = (resume(None), resume(None), resume(None));

        drop(registry.get_or_load(&a).await.unwrap());
        tokio::time::advance(Duration::from_secs(1)).await;
        drop(registry.get_or_load(&b).await.unwrap());
        tokio::time::advance(Duration::from_secs(1)).await;
        drop(registry.get_or_load(&a).await.unwrap());
        tokio::time::advance(Duration::from_secs(1)).await;
        drop(registry.get_or_load(&c).await.unwrap());

        assert!(registry.cached(a.id).await);
        assert!(!registry.cached(b.id).await);
        assert!(registry.cached(c.id).await);
    }
}
