use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::core::constants::{ANONYMOUS_IDENTITY, LOGIN_ROUTE, SESSION_STORAGE_KEY};
use crate::core::events::{EventBus, PersonaChanged};
use crate::core::persona::{Persona, PersonaRegistry, UnknownPersonaError};

/// The active identity: a persona plus the moment it was selected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub persona: Persona,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn persona_id(&self) -> &str {
        &self.persona.id
    }
}

/// Key/value storage for the persisted session record.
pub trait SessionStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// External navigation effect (e.g. sending the user to the login page).
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Stores each key as `<key>.json` in one directory.
///
/// The default location is the per-user runtime directory, which is cleared
/// on logout/reboot, so the record behaves like tab-scoped storage rather than
/// durable settings.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store for a named scope (one per terminal "tab").
    pub fn for_scope(scope: &str) -> Option<Self> {
        let dirs = ProjectDirs::from("dev", "jarvis", "jarvis-client")?;
        let base = dirs
            .runtime_dir()
            .map(PathBuf::from)
            .unwrap_or_else(|| dirs.cache_dir().join("sessions"));
        Some(Self::new(base.join(scope)))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn load(&self, key: &str) -> Option<String> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        (**self).remove(key)
    }
}

/// Owns the active [`Session`].
///
/// Constructed once per process; the persisted record is restored during
/// construction and never re-read afterwards.
pub struct SessionManager {
    registry: Arc<PersonaRegistry>,
    store: Box<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    events: Arc<EventBus>,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(
        registry: Arc<PersonaRegistry>,
        store: Box<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        events: Arc<EventBus>,
    ) -> Self {
        let restored = restore_session(store.as_ref(), &registry);
        if let Some(session) = &restored {
            info!(persona = %session.persona_id(), "restored persisted session");
        }

        Self {
            registry,
            store,
            navigator,
            events,
            current: RwLock::new(restored),
        }
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    /// Select persona `id`, replacing any existing session.
    ///
    /// On an unknown id the current session is left untouched.
    pub fn set_persona(&self, id: &str) -> Result<Session, UnknownPersonaError> {
        let persona = self.registry.resolve(id)?.clone();
        let session = Session {
            persona,
            created_at: Utc::now(),
        };

        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Some(session.clone());
        self.persist(&session);

        self.events.persona_changed.publish(&PersonaChanged {
            persona_id: session.persona.id.clone(),
            route: session.persona.route.clone(),
        });
        Ok(session)
    }

    pub fn persona(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Identity sent upstream: the persona id, or the anonymous sentinel.
    pub fn identity(&self) -> String {
        self.persona()
            .map(|session| session.persona.id)
            .unwrap_or_else(|| ANONYMOUS_IDENTITY.to_string())
    }

    /// Guard for pages that need a persona. Redirects to login when absent.
    pub fn require_auth(&self) -> bool {
        if self.persona().is_some() {
            return true;
        }
        self.navigator.navigate(LOGIN_ROUTE);
        false
    }

    pub fn logout(&self) {
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = None;
        if let Err(err) = self.store.remove(SESSION_STORAGE_KEY) {
            warn!(error = %err, "failed to clear persisted session");
        }
        self.navigator.navigate(LOGIN_ROUTE);
    }

    fn persist(&self, session: &Session) {
        let serialized = match serde_json::to_string(session) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(error = %err, "failed to serialize session");
                return;
            }
        };
        // The in-memory session stays authoritative when storage is unavailable.
        if let Err(err) = self.store.save(SESSION_STORAGE_KEY, &serialized) {
            warn!(error = %err, "failed to persist session");
        }
    }
}

/// Load the stored record, re-binding its persona to the registry entry.
fn restore_session(store: &dyn SessionStore, registry: &PersonaRegistry) -> Option<Session> {
    let raw = store.load(SESSION_STORAGE_KEY)?;
    let stored = match serde_json::from_str::<Session>(&raw) {
        Ok(session) => session,
        Err(err) => {
            debug!(error = %err, "ignoring unreadable session record");
            return None;
        }
    };
    match registry.find(stored.persona_id()) {
        Some(persona) => Some(Session {
            persona: persona.clone(),
            created_at: stored.created_at,
        }),
        None => {
            debug!(persona = ?stored.persona_id(), "ignoring session for unknown persona");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::RecordingNavigator;
    use tempfile::TempDir;

    struct Harness {
        store: Arc<MemorySessionStore>,
        navigator: Arc<RecordingNavigator>,
        events: Arc<EventBus>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemorySessionStore::new()),
                navigator: Arc::new(RecordingNavigator::default()),
                events: Arc::new(EventBus::new()),
            }
        }

        fn manager(&self) -> SessionManager {
            SessionManager::new(
                Arc::new(PersonaRegistry::builtin()),
                Box::new(Arc::clone(&self.store)),
                self.navigator.clone(),
                Arc::clone(&self.events),
            )
        }
    }

    #[test]
    fn set_persona_activates_and_notifies() {
        let harness = Harness::new();
        let manager = harness.manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        harness
            .events
            .persona_changed
            .subscribe(move |event| sink.lock().unwrap().push(event.persona_id.clone()));

        let session = manager.set_persona("migration").expect("known persona");

        assert_eq!(session.persona_id(), "migration");
        assert_eq!(manager.persona().unwrap().persona_id(), "migration");
        assert_eq!(manager.identity(), "migration");
        assert_eq!(*seen.lock().unwrap(), vec!["migration"]);
        assert!(harness.store.load(SESSION_STORAGE_KEY).is_some());
    }

    #[test]
    fn unknown_persona_leaves_session_unchanged() {
        let harness = Harness::new();
        let manager = harness.manager();
        manager.set_persona("pmo").unwrap();
        let before = manager.persona();

        for id in ["", "PMO", "admin", "assessment "] {
            let err = manager.set_persona(id).unwrap_err();
            assert_eq!(err.id, id);
            assert_eq!(manager.persona(), before);
        }
    }

    #[test]
    fn persisted_session_is_restored_on_construction() {
        let harness = Harness::new();
        harness.manager().set_persona("testing").unwrap();

        let restored = harness.manager();
        assert_eq!(restored.persona().unwrap().persona_id(), "testing");
    }

    #[test]
    fn corrupt_record_is_treated_as_no_session() {
        let harness = Harness::new();
        harness
            .store
            .save(SESSION_STORAGE_KEY, "{not json")
            .unwrap();

        let manager = harness.manager();
        assert!(manager.persona().is_none());
        assert_eq!(manager.identity(), ANONYMOUS_IDENTITY);
    }

    #[test]
    fn record_for_unknown_persona_is_treated_as_no_session() {
        let harness = Harness::new();
        harness
            .store
            .save(
                SESSION_STORAGE_KEY,
                r#"{"persona":{"id":"root\nadmin","label":"Root","capabilities":["everything"],"route":"/admin"},"created_at":"2026-01-05T10:00:00Z"}"#,
            )
            .unwrap();

        let manager = harness.manager();
        assert!(manager.persona().is_none());
        assert_eq!(manager.identity(), ANONYMOUS_IDENTITY);
    }

    #[test]
    fn restored_persona_comes_from_the_registry() {
        let harness = Harness::new();
        harness
            .store
            .save(
                SESSION_STORAGE_KEY,
                r#"{"persona":{"id":"pmo","label":"Tampered","capabilities":["everything"],"route":"/admin"},"created_at":"2026-01-05T10:00:00Z"}"#,
            )
            .unwrap();

        let session = harness.manager().persona().expect("known persona restored");
        let registry = PersonaRegistry::builtin();
        assert_eq!(&session.persona, registry.find("pmo").unwrap());
        assert!(!session.persona.has_capability("everything"));
        assert_eq!(
            session.created_at,
            DateTime::parse_from_rfc3339("2026-01-05T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn require_auth_redirects_only_without_session() {
        let harness = Harness::new();
        let manager = harness.manager();

        assert!(!manager.require_auth());
        assert_eq!(*harness.navigator.routes.lock().unwrap(), vec![LOGIN_ROUTE]);

        manager.set_persona("assessment").unwrap();
        assert!(manager.require_auth());
        assert_eq!(harness.navigator.routes.lock().unwrap().len(), 1);
    }

    #[test]
    fn logout_clears_memory_and_storage() {
        let harness = Harness::new();
        let manager = harness.manager();
        manager.set_persona("integration").unwrap();

        manager.logout();

        assert!(manager.persona().is_none());
        assert!(harness.store.load(SESSION_STORAGE_KEY).is_none());
        assert_eq!(*harness.navigator.routes.lock().unwrap(), vec![LOGIN_ROUTE]);
        assert!(harness.manager().persona().is_none());
    }

    #[test]
    fn file_store_round_trips_and_tolerates_missing_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileSessionStore::new(temp_dir.path().join("scope-a"));

        assert!(store.load(SESSION_STORAGE_KEY).is_none());
        store.remove(SESSION_STORAGE_KEY).expect("removing absent key is ok");

        store.save(SESSION_STORAGE_KEY, "{\"x\":1}").unwrap();
        assert_eq!(store.load(SESSION_STORAGE_KEY).as_deref(), Some("{\"x\":1}"));

        let other_scope = FileSessionStore::new(temp_dir.path().join("scope-b"));
        assert!(other_scope.load(SESSION_STORAGE_KEY).is_none());

        store.remove(SESSION_STORAGE_KEY).unwrap();
        assert!(store.load(SESSION_STORAGE_KEY).is_none());
    }
}
