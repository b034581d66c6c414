// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod idle;
mod model;

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures_util::lock::Mutex;
use log::{debug, info, warn};
use secrecy::SecretString;
use tokio::sync::watch;

use crate::{error::Result, storage};

pub(crate) use model::{display_optional, Role, Session, User};

/// The durable slots a session is spread across. The token and the user are
/// separate entries so that a half-written session can be detected.
pub(crate) struct SessionStorage {
    pub(crate) token: Box<dyn storage::Storage<String>>,
    pub(crate) user: Box<dyn storage::Storage<User>>,
    pub(crate) activity: Box<dyn storage::Storage<DateTime<Utc>>>,
}

impl SessionStorage {
    fn is_persistent(&self) -> bool {
        use storage::IsPersistent as _;

        self.token.is_persistent() && self.user.is_persistent()
    }

    async fn read(&mut self, idle_timeout: Option<Duration>) -> Result<Option<Session>> {
        let token = self.token.get().await?;
        let user = self.user.get().await?;

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (token, user),
            (None, None) => return Ok(None),
            (Some(_), None) | (None, Some(_)) => {
                warn!("Found an incomplete stored session; discarding it");
                return Ok(None);
            }
        };

        if let Some(timeout) = idle_timeout {
            if let Some(last_activity) = self.activity.get().await? {
                let idle = (Utc::now() - last_activity).to_std().unwrap_or_default();
                if idle > timeout {
                    info!(
                        "Stored session for {} has been idle since {}; discarding it",
                        user.username, last_activity
                    );
                    return Ok(None);
                }
            }
        }

        Session::new(token, user).map(Some)
    }

    async fn write(&mut self, session: &Session) -> Result<()> {
        self.token.update(&session.expose_token()).await?;
        self.user.update(session.user()).await?;
        self.activity.update(&Utc::now()).await
    }

    async fn clear(&mut self) -> Result<()> {
        // Try every slot even if one fails so nothing is left behind.
        let token = self.token.clear().await;
        let user = self.user.clear().await;
        let activity = self.activity.clear().await;
        token.and(user).and(activity)
    }
}

struct Inner {
    state: watch::Sender<Option<Session>>,
    storage: Mutex<SessionStorage>,
    generations: AtomicU64,
}

/// Single source of truth for who is logged in.
///
/// All mutation goes through [`SessionStore::login`], [`SessionStore::logout`]
/// and [`SessionStore::reject`]. Everything else is derived from the current
/// state on every read.
#[derive(Clone)]
pub(crate) struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Hydrate from durable storage. Anything short of a complete, valid
    /// session leaves the store anonymous and wipes the leftovers.
    pub(crate) async fn restore(mut storage: SessionStorage, idle_timeout: Option<Duration>) -> Self {
        let restored = match storage.read(idle_timeout).await {
            Ok(session) => session,
            Err(e) => {
                debug!("Could not read the stored session; starting anonymous: {}", e);
                None
            }
        };

        if restored.is_none() {
            if let Err(e) = storage.clear().await {
                debug!("Could not clear stale session data: {}", e);
            }
        } else if !storage.is_persistent() {
            debug!("Session storage is not persistent; the session ends with this process");
        }

        let store = Self::anonymous(storage);
        if let Some(session) = restored {
            let generation = store.next_generation();
            let _ = store
                .inner
                .state
                .send_replace(Some(session.with_generation(generation)));
        }
        store
    }

    fn anonymous(storage: SessionStorage) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                state,
                storage: Mutex::new(storage),
                generations: AtomicU64::new(0),
            }),
        }
    }

    fn next_generation(&self) -> u64 {
        self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) async fn login(&self, session: Session) {
        let session = session.with_generation(self.next_generation());
        info!(
            "Logged in as {} ({})",
            session.user().username,
            session.user().role
        );

        let mut storage = self.inner.storage.lock().await;
        let _ = self.inner.state.send_replace(Some(session.clone()));
        if let Err(e) = storage.write(&session).await {
            warn!("Could not persist the session; it will not survive a restart: {}", e);
        }
    }

    /// End the session. Returns whether there was a session to end.
    pub(crate) async fn logout(&self) -> bool {
        self.end(|_| true).await
    }

    /// End the session that issued a request the server refused. A rejection
    /// that arrives after the session it belongs to has already ended is
    /// ignored, so concurrent rejections collapse into one transition.
    pub(crate) async fn reject(&self, generation: u64) -> bool {
        let ended = self
            .end(|session| session.generation() == generation)
            .await;
        if ended {
            warn!("The server rejected the access token; session ended");
        }
        ended
    }

    async fn end<F: Fn(&Session) -> bool>(&self, predicate: F) -> bool {
        let mut storage = self.inner.storage.lock().await;
        let ended = self.inner.state.send_if_modified(|state| {
            if state.as_ref().is_some_and(&predicate) {
                *state = None;
                true
            } else {
                false
            }
        });
        if ended {
            if let Err(e) = storage.clear().await {
                warn!("Could not remove the stored session: {}", e);
            }
            info!("Logged out");
        }
        ended
    }

    /// Persist the time of the latest user activity.
    pub(crate) async fn touch(&self) {
        if !self.is_authenticated() {
            return;
        }
        let mut storage = self.inner.storage.lock().await;
        if let Err(e) = storage.activity.update(&Utc::now()).await {
            debug!("Could not record activity: {}", e);
        }
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_some()
    }

    pub(crate) fn user(&self) -> Option<User> {
        self.inner
            .state
            .borrow()
            .as_ref()
            .map(|session| session.user().clone())
    }

    pub(crate) fn role(&self) -> Option<Role> {
        self.inner
            .state
            .borrow()
            .as_ref()
            .map(|session| session.user().role)
    }

    pub(crate) fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub(crate) fn is_manager(&self) -> bool {
        matches!(self.role(), Some(Role::Admin | Role::Manager))
    }

    /// The bearer credential along with the generation of the session that
    /// owns it.
    pub(crate) fn credentials(&self) -> Option<(SecretString, u64)> {
        self.inner
            .state
            .borrow()
            .as_ref()
            .map(|session| (session.token().clone(), session.generation()))
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.state.subscribe()
    }
}


#[cfg(test)]
mod tests {
    use std::fs;

    use secrecy::ExposeSecret as _;

    use super::{testing::*, *};

    fn file_storage(dir: &std::path::Path) -> SessionStorage {
        SessionStorage {
            token: Box::new(storage::File::at(dir.join("token.json"))),
            user: Box::new(storage::File::at(dir.join("user.json"))),
            activity: Box::new(storage::File::at(dir.join("activity.json"))),
        }
    }

    #[tokio::test]
    async fn login_exposes_derived_flags_on_every_read() -> Result<()> {
        let store = logged_in("abc123", user(1, "root", Role::Admin)).await?;

        for _ in 0..3 {
            assert!(store.is_authenticated());
            assert!(store.is_admin());
            assert!(store.is_manager());
            assert_eq!(store.role(), Some(Role::Admin));
        }
        Ok(())
    }

    #[tokio::test]
    async fn member_is_neither_admin_nor_manager() -> Result<()> {
        let store = logged_in("abc123", user(7, "alice", Role::Member)).await?;
        assert!(store.is_authenticated());
        assert!(!store.is_admin());
        assert!(!store.is_manager());
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_credentials_and_is_idempotent() -> Result<()> {
        let store = logged_in("abc123", user(7, "alice", Role::Member)).await?;

        assert!(store.logout().await);
        assert!(!store.is_authenticated());
        assert!(store.credentials().is_none());
        assert!(store.user().is_none());

        assert!(!store.logout().await);
        assert!(!store.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn subscribers_see_login_and_logout() -> Result<()> {
        let store = anonymous().await;
        let mut rx = store.subscribe();

        store
            .login(Session::new("abc123", user(7, "alice", Role::Member))?)
            .await;
        rx.changed().await.map_err(|_| crate::error::Internal::ChannelClosed)?;
        assert!(rx.borrow_and_update().is_some());

        let _ = store.logout().await;
        rx.changed().await.map_err(|_| crate::error::Internal::ChannelClosed)?;
        assert!(rx.borrow_and_update().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn stale_rejection_does_not_end_a_newer_session() -> Result<()> {
        let store = logged_in("old", user(7, "alice", Role::Member)).await?;
        let (_, old_generation) = store.credentials().ok_or(crate::error::Error::Command)?;

        store
            .login(Session::new("new", user(7, "alice", Role::Member))?)
            .await;
        assert!(!store.reject(old_generation).await);
        assert!(store.is_authenticated());

        let (token, generation) = store.credentials().ok_or(crate::error::Error::Command)?;
        assert_eq!(token.expose_secret(), "new");
        assert!(store.reject(generation).await);
        assert!(!store.reject(generation).await);
        assert!(!store.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn session_survives_a_restart() -> Result<()> {
        let dir = tempfile::tempdir()?;

        let store = SessionStore::restore(file_storage(dir.path()), None).await;
        store
            .login(Session::new("abc123", user(7, "alice", Role::Member))?)
            .await;
        drop(store);

        let restored = SessionStore::restore(file_storage(dir.path()), None).await;
        assert!(restored.is_authenticated());
        assert_eq!(restored.user().map(|u| u.username), Some("alice".to_owned()));
        let (token, _) = restored.credentials().ok_or(crate::error::Error::Command)?;
        assert_eq!(token.expose_secret(), "abc123");
        Ok(())
    }

    #[tokio::test]
    async fn token_without_user_restores_anonymous() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("token.json"), br#""abc123""#)?;

        let store = SessionStore::restore(file_storage(dir.path()), None).await;
        assert!(!store.is_authenticated());
        assert!(store.credentials().is_none());
        assert!(!dir.path().join("token.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_user_restores_anonymous() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("token.json"), br#""abc123""#)?;
        fs::write(dir.path().join("user.json"), br#"{"id": "seven""#)?;

        let store = SessionStore::restore(file_storage(dir.path()), None).await;
        assert!(!store.is_authenticated());
        assert!(store.role().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn empty_stored_token_restores_anonymous() -> Result<()> {
        let mut storage = memory_storage();
        storage.token = Box::new(storage::Memory::with(String::new()));
        storage.user = Box::new(storage::Memory::with(user(7, "alice", Role::Member)));

        let store = SessionStore::restore(storage, None).await;
        assert!(!store.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn idle_stored_session_restores_anonymous() -> Result<()> {
        let mut storage = memory_storage();
        storage.token = Box::new(storage::Memory::with("abc123".to_owned()));
        storage.user = Box::new(storage::Memory::with(user(1, "boss", Role::Manager)));
        storage.activity = Box::new(storage::Memory::with(
            Utc::now() - chrono::Duration::hours(3),
        ));

        let store = SessionStore::restore(storage, Some(Duration::from_secs(2 * 60 * 60))).await;
        assert!(!store.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn recently_active_stored_session_restores() -> Result<()> {
        let mut storage = memory_storage();
        storage.token = Box::new(storage::Memory::with("abc123".to_owned()));
        storage.user = Box::new(storage::Memory::with(user(1, "boss", Role::Manager)));
        storage.activity = Box::new(storage::Memory::with(
            Utc::now() - chrono::Duration::minutes(5),
        ));

        let store = SessionStore::restore(storage, Some(Duration::from_secs(2 * 60 * 60))).await;
        assert!(store.is_manager());
        Ok(())
    }
}
