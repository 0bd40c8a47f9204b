//! Session store: owns the in-memory session and the persisted record.
//!
//! Every transition is published as a whole [`Session`] value through a
//! `watch` channel, so observers never see a half-applied change. Each
//! transition that talks to the backend is tagged with an epoch; a result
//! that comes back after a newer transition started is dropped on the floor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use tokio::sync::watch;

use catequesis_auth::{Identity, IdentityUpdate, PermissionEvaluator, PermissionMatrix};

use crate::api::{AuthApi, Credentials};
use crate::config::DEFAULT_LOGIN_PATH;
use crate::error::SessionError;
use crate::navigation::Navigation;
use crate::record::{PersistedSession, RecordRead};
use crate::state::{LoadingState, Session};
use crate::storage::SessionStorage;

static STANDARD_MATRIX: LazyLock<Arc<PermissionMatrix>> =
    LazyLock::new(|| Arc::new(PermissionMatrix::standard().clone()));

/// Single owner of session state.
///
/// Construct one per client and hand references to consumers; tests build
/// their own isolated instances.
pub struct SessionStore {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    matrix: Arc<PermissionMatrix>,
    login_path: String,
    state: watch::Sender<Session>,
    epoch: AtomicU64,
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore")
            .field("login_path", &self.login_path)
            .field("session", &*self.state.borrow())
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn SessionStorage>) -> Self {
        let (state, _) = watch::channel(Session::initializing());
        Self {
            api,
            storage,
            matrix: Arc::clone(&STANDARD_MATRIX),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            state,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    pub fn with_matrix(mut self, matrix: Arc<PermissionMatrix>) -> Self {
        self.matrix = matrix;
        self
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn loading_state(&self) -> LoadingState {
        self.state.borrow().loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().user().cloned()
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    /// Receiver that observes every published session.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Wait until the session leaves `Initializing` and return it.
    pub async fn settled(&self) -> Session {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| s.loading().is_settled()).await {
            Ok(session) => session.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.snapshot(),
        }
    }

    /// Run capability queries against the current session.
    ///
    /// The session is borrowed for the duration of `f`; keep it short.
    pub fn with_evaluator<R>(&self, f: impl FnOnce(&PermissionEvaluator<'_>) -> R) -> R {
        let session = self.state.borrow();
        let evaluator = session.evaluator(&self.matrix);
        f(&evaluator)
    }

    pub fn has_permission(&self, key: impl AsRef<str>) -> bool {
        self.with_evaluator(|eval| eval.has_permission(key))
    }

    pub fn can_manage(&self, resource: &str) -> bool {
        self.with_evaluator(|eval| eval.can_manage(resource))
    }

    pub fn can_view(&self, resource: &str) -> bool {
        self.with_evaluator(|eval| eval.can_view(resource))
    }

    /// Attach the current bearer token (if any) to an outgoing request.
    ///
    /// Consumers call the backend through this instead of holding a copy of
    /// the token.
    pub fn authorize_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.state.borrow().token() {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Restore and revalidate the persisted session.
    ///
    /// Returns the state the store settled in (or the current one, if a newer
    /// transition took over while the check was pending).
    pub async fn initialize(&self) -> LoadingState {
        let epoch = self.begin();
        let pending = PendingTransition::new(self, epoch);
        self.publish(Session::initializing());

        let record = match PersistedSession::load(&*self.storage).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted session; starting signed out");
                RecordRead::Absent
            }
        };

        if !self.is_current(epoch) {
            pending.complete();
            return self.loading_state();
        }

        match record {
            RecordRead::Absent => {
                tracing::info!("no persisted session");
                self.publish(Session::unauthenticated());
            }
            RecordRead::Corrupted(reason) => {
                tracing::warn!(%reason, "persisted session is corrupted; erasing it");
                self.erase_record().await;
                self.publish_if_current(epoch, Session::unauthenticated());
            }
            RecordRead::Present(record) => {
                // Optimistic adoption: observers may see the stored identity
                // while `loading` is still `Initializing`.
                self.publish(Session::adopted(record.user.clone(), record.token.clone()));

                let checked = self.api.profile(&record.token).await;
                if !self.is_current(epoch) {
                    tracing::debug!("discarding stale profile check");
                    pending.complete();
                    return self.loading_state();
                }

                match checked {
                    Ok(fresh) => {
                        let user = self.refresh_identity(&record, fresh).await;
                        tracing::info!(user_id = %user.id, role = %user.role, "persisted session confirmed");
                        self.publish_if_current(epoch, Session::authenticated(user, record.token));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "persisted session rejected; signing out");
                        self.erase_record().await;
                        self.publish_if_current(epoch, Session::unauthenticated());
                    }
                }
            }
        }

        if !self.is_current(epoch) {
            self.reconcile_record().await;
        }

        pending.complete();
        self.loading_state()
    }

    /// Authenticate with the backend and persist the new session.
    ///
    /// Failures leave the store signed out and are returned to the caller.
    pub async fn login(&self, credentials: Credentials) -> Result<Identity, SessionError> {
        let epoch = self.begin();
        let pending = PendingTransition::new(self, epoch);
        self.publish(self.snapshot().with_loading(LoadingState::Initializing));

        tracing::info!(username = %credentials.username, "login started");
        let result = self.api.login(&credentials).await;

        if !self.is_current(epoch) {
            tracing::debug!(username = %credentials.username, "discarding stale login result");
            pending.complete();
            return Err(SessionError::Superseded);
        }

        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!(username = %credentials.username, error = %e, "login failed");
                self.erase_record().await;
                self.publish_if_current(epoch, Session::unauthenticated());
                pending.complete();
                return Err(e.into());
            }
        };

        let record = PersistedSession::new(grant.token, grant.user);
        if let Err(e) = record.save(&*self.storage).await {
            tracing::error!(error = %e, "failed to persist session; login rolled back");
            self.erase_record().await;
            self.publish_if_current(epoch, Session::unauthenticated());
            pending.complete();
            return Err(e.into());
        }

        if !self.is_current(epoch) {
            // Something newer ran while the record was being written; make
            // storage agree with whatever it published.
            self.reconcile_record().await;
            pending.complete();
            return Err(SessionError::Superseded);
        }

        let user = record.user.clone();
        tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
        self.publish(Session::authenticated(record.user, record.token));
        pending.complete();
        Ok(user)
    }

    /// Sign out.
    ///
    /// The in-memory session is cleared before anything else happens, then
    /// the record is erased. Returns the hard navigation to the login entry
    /// point, or `None` when there was nothing to sign out of.
    pub async fn logout(&self) -> Option<Navigation> {
        let current = self.snapshot();
        if current.is_empty() && current.loading() == LoadingState::SettledUnauthenticated {
            tracing::debug!("logout on a signed-out session is a no-op");
            return None;
        }

        self.begin();
        self.publish(Session::unauthenticated());
        self.erase_record().await;

        tracing::info!("logged out");
        Some(Navigation::hard(&self.login_path))
    }

    /// Merge `update` into the current identity and persist it.
    ///
    /// No-op (`Ok(None)`) when there is no session. The token never changes.
    /// While a restore or login holding a session is still pending, the update
    /// waits for it to settle and applies to the identity it settles on.
    pub async fn update_identity(&self, update: IdentityUpdate) -> Result<Option<Identity>, SessionError> {
        let mut current = self.snapshot();
        if current.is_empty() {
            tracing::debug!("identity update ignored: no session");
            return Ok(None);
        }
        if !current.loading().is_settled() {
            tracing::debug!("identity update waiting for pending transition");
            current = self.settled().await;
        }

        let (Some(user), Some(token)) = (current.user(), current.token()) else {
            tracing::debug!("identity update ignored: no session");
            return Ok(None);
        };

        let epoch = self.epoch.load(Ordering::SeqCst);
        let merged = user.merged(&update);
        PersistedSession::new(token.clone(), merged.clone())
            .save(&*self.storage)
            .await?;

        if !self.is_current(epoch) {
            self.reconcile_record().await;
            return Err(SessionError::Superseded);
        }

        self.publish(current.with_user(merged.clone()));
        tracing::info!(user_id = %merged.id, "identity updated");
        Ok(Some(merged))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Start a new transition; everything tagged with an older epoch is stale.
    fn begin(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn publish(&self, session: Session) {
        self.state.send_replace(session);
    }

    fn publish_if_current(&self, epoch: u64, session: Session) -> bool {
        if self.is_current(epoch) {
            self.publish(session);
            true
        } else {
            false
        }
    }

    /// Use the identity returned by the profile check when it differs from
    /// the stored one and can be persisted; otherwise keep the stored one.
    async fn refresh_identity(&self, record: &PersistedSession, fresh: Option<Identity>) -> Identity {
        let Some(fresh) = fresh else {
            return record.user.clone();
        };
        if fresh == record.user {
            return fresh;
        }
        if fresh.id != record.user.id {
            tracing::warn!(stored = %record.user.id, returned = %fresh.id, "profile returned a different user; keeping stored identity");
            return record.user.clone();
        }

        match PersistedSession::new(record.token.clone(), fresh.clone()).save(&*self.storage).await {
            Ok(()) => fresh,
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist refreshed identity; keeping stored one");
                record.user.clone()
            }
        }
    }

    async fn erase_record(&self) {
        if let Err(e) = PersistedSession::erase(&*self.storage).await {
            tracing::warn!(error = %e, "failed to erase persisted session");
        }
    }

    /// Rewrite the record from the currently published session.
    async fn reconcile_record(&self) {
        let current = self.snapshot();
        match (current.user(), current.token()) {
            (Some(user), Some(token)) => {
                if let Err(e) = PersistedSession::new(token.clone(), user.clone()).save(&*self.storage).await {
                    tracing::warn!(error = %e, "failed to reconcile persisted session");
                }
            }
            _ => self.erase_record().await,
        }
    }
}

/// Restores a settled state if a transition future is dropped before it
/// finishes and nothing newer has started since.
struct PendingTransition<'a> {
    store: &'a SessionStore,
    epoch: u64,
    fallback: Option<Session>,
}

impl<'a> PendingTransition<'a> {
    fn new(store: &'a SessionStore, epoch: u64) -> Self {
        let previous = store.snapshot();
        let fallback = if previous.loading().is_settled() {
            previous
        } else {
            Session::unauthenticated()
        };
        Self {
            store,
            epoch,
            fallback: Some(fallback),
        }
    }

    fn complete(mut self) {
        self.fallback = None;
    }
}

impl Drop for PendingTransition<'_> {
    fn drop(&mut self) {
        if let Some(fallback) = self.fallback.take() {
            if self.store.publish_if_current(self.epoch, fallback) {
                tracing::debug!(epoch = self.epoch, "abandoned session transition; previous state restored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use catequesis_auth::{ParishAffiliation, Role, permissions};
    use catequesis_core::{ParishId, UserId};

    use crate::api::LoginGrant;
    use crate::error::AuthApiError;
    use crate::record::{AUTH_TOKEN_KEY, USER_DATA_KEY};
    use crate::state::AccessToken;
    use crate::storage::MemoryStorage;

    /// Scripted backend: answers are popped in order.
    #[derive(Default)]
    struct FakeApi {
        logins: Mutex<VecDeque<Result<LoginGrant, AuthApiError>>>,
        profiles: Mutex<VecDeque<Result<Option<Identity>, AuthApiError>>>,
        profile_calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn with_login(self, result: Result<LoginGrant, AuthApiError>) -> Self {
            self.logins.lock().unwrap().push_back(result);
            self
        }

        fn with_profile(self, result: Result<Option<Identity>, AuthApiError>) -> Self {
            self.profiles.lock().unwrap().push_back(result);
            self
        }
    }

    #[async_trait]
    impl AuthApi for FakeApi {
        async fn login(&self, _credentials: &Credentials) -> Result<LoginGrant, AuthApiError> {
            self.logins
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AuthApiError::Network("no scripted login".to_string())))
        }

        async fn profile(&self, token: &AccessToken) -> Result<Option<Identity>, AuthApiError> {
            self.profile_calls.lock().unwrap().push(token.as_str().to_string());
            self.profiles
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AuthApiError::Network("no scripted profile".to_string())))
        }
    }

    fn identity(role: Role) -> Identity {
        Identity {
            id: UserId::new(12),
            username: "catequista1".to_string(),
            role,
            parish: Some(ParishAffiliation {
                id: ParishId::new(3),
                name: "Santa María".to_string(),
            }),
            active: true,
        }
    }

    fn grant(role: Role, token: &str) -> LoginGrant {
        LoginGrant {
            user: identity(role),
            token: AccessToken::new(token),
        }
    }

    fn seeded_storage(role: Role, token: &str) -> Arc<MemoryStorage> {
        let user = serde_json::to_string(&identity(role)).unwrap();
        Arc::new(MemoryStorage::with_entries([(AUTH_TOKEN_KEY, token.to_string()), (USER_DATA_KEY, user)]))
    }

    fn store(api: FakeApi, storage: Arc<MemoryStorage>) -> (SessionStore, Arc<FakeApi>) {
        let api = Arc::new(api);
        (SessionStore::new(api.clone(), storage), api)
    }

    #[tokio::test]
    async fn starts_initializing() {
        let (store, _) = store(FakeApi::default(), Arc::new(MemoryStorage::new()));
        assert_eq!(store.loading_state(), LoadingState::Initializing);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn initialize_without_record_settles_signed_out() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, api) = store(FakeApi::default(), storage);

        assert_eq!(store.initialize().await, LoadingState::SettledUnauthenticated);
        assert!(api.profile_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn initialize_confirms_valid_record() {
        let storage = seeded_storage(Role::Catequista, "stored-token");
        let (store, api) = store(FakeApi::default().with_profile(Ok(None)), storage.clone());

        assert_eq!(store.initialize().await, LoadingState::SettledAuthenticated);
        assert_eq!(store.current_identity(), Some(identity(Role::Catequista)));
        assert_eq!(api.profile_calls.lock().unwrap().as_slice(), ["stored-token"]);
        assert_eq!(storage.peek(AUTH_TOKEN_KEY).as_deref(), Some("stored-token"));
    }

    #[tokio::test]
    async fn rejected_record_is_erased() {
        let storage = seeded_storage(Role::Secretaria, "expired");
        let (store, _) = store(
            FakeApi::default().with_profile(Err(AuthApiError::Api(401, "expired".to_string()))),
            storage.clone(),
        );

        assert_eq!(store.initialize().await, LoadingState::SettledUnauthenticated);
        assert!(!store.is_authenticated());
        assert_eq!(storage.peek(AUTH_TOKEN_KEY), None);
        assert_eq!(storage.peek(USER_DATA_KEY), None);
    }

    #[tokio::test]
    async fn transport_error_during_check_is_invalidation() {
        let storage = seeded_storage(Role::Parroco, "tok");
        let (store, _) = store(
            FakeApi::default().with_profile(Err(AuthApiError::Network("connection refused".to_string()))),
            storage.clone(),
        );

        assert_eq!(store.initialize().await, LoadingState::SettledUnauthenticated);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn corrupted_record_is_erased_without_calling_backend() {
        let storage = Arc::new(MemoryStorage::with_entries([(AUTH_TOKEN_KEY, "tok"), (USER_DATA_KEY, "nope")]));
        let (store, api) = store(FakeApi::default(), storage.clone());

        assert_eq!(store.initialize().await, LoadingState::SettledUnauthenticated);
        assert!(storage.is_empty());
        assert!(api.profile_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_body_refreshes_identity() {
        let storage = seeded_storage(Role::Catequista, "tok");
        let promoted = identity(Role::Secretaria);
        let (store, _) = store(FakeApi::default().with_profile(Ok(Some(promoted.clone()))), storage.clone());

        store.initialize().await;

        assert_eq!(store.current_identity(), Some(promoted.clone()));
        let persisted: Identity = serde_json::from_str(&storage.peek(USER_DATA_KEY).unwrap()).unwrap();
        assert_eq!(persisted, promoted);
    }

    #[tokio::test]
    async fn login_persists_exactly_the_grant() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store(FakeApi::default().with_login(Ok(grant(Role::Secretaria, "new-token"))), storage.clone());
        store.initialize().await;

        let user = store.login(Credentials::new("ana", "pw")).await.unwrap();

        assert_eq!(user, identity(Role::Secretaria));
        assert_eq!(store.loading_state(), LoadingState::SettledAuthenticated);
        assert_eq!(storage.peek(AUTH_TOKEN_KEY).as_deref(), Some("new-token"));
        let persisted: Identity = serde_json::from_str(&storage.peek(USER_DATA_KEY).unwrap()).unwrap();
        assert_eq!(persisted, user);
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn failed_login_is_propagated_and_signed_out() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store(
            FakeApi::default().with_login(Err(AuthApiError::LoginFailed("Credenciales inválidas".to_string()))),
            storage.clone(),
        );
        store.initialize().await;

        let err = store.login(Credentials::new("ana", "wrong")).await.unwrap_err();

        assert!(matches!(err, SessionError::Auth(AuthApiError::LoginFailed(ref m)) if m == "Credenciales inválidas"));
        assert_eq!(store.loading_state(), LoadingState::SettledUnauthenticated);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn logout_clears_everything_and_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store(FakeApi::default().with_login(Ok(grant(Role::Parroco, "t"))), storage.clone());
        store.initialize().await;
        store.login(Credentials::new("padre", "pw")).await.unwrap();

        let nav = store.logout().await;
        assert_eq!(nav, Some(Navigation::hard("/login")));
        assert!(storage.is_empty());
        let after_first = store.snapshot();

        assert_eq!(store.logout().await, None);
        assert_eq!(store.snapshot(), after_first);
        assert_eq!(after_first.loading(), LoadingState::SettledUnauthenticated);
    }

    #[tokio::test]
    async fn logout_uses_configured_login_path() {
        let storage = seeded_storage(Role::Consulta, "tok");
        let api = Arc::new(FakeApi::default().with_profile(Ok(None)));
        let store = SessionStore::new(api, storage).with_login_path("/acceso");
        store.initialize().await;

        assert_eq!(store.logout().await, Some(Navigation::hard("/acceso")));
    }

    #[tokio::test]
    async fn update_identity_merges_and_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store(FakeApi::default().with_login(Ok(grant(Role::Catequista, "keep-me"))), storage.clone());
        store.initialize().await;
        store.login(Credentials::new("c", "pw")).await.unwrap();

        let merged = store
            .update_identity(IdentityUpdate::new().username("catequista.nuevo"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.username, "catequista.nuevo");
        assert_eq!(store.current_identity(), Some(merged.clone()));
        assert_eq!(storage.peek(AUTH_TOKEN_KEY).as_deref(), Some("keep-me"));
        let persisted: Identity = serde_json::from_str(&storage.peek(USER_DATA_KEY).unwrap()).unwrap();
        assert_eq!(persisted, merged);
    }

    #[tokio::test]
    async fn identity_update_during_revalidation_is_kept() {
        let storage = seeded_storage(Role::Catequista, "tok");
        let gate = Arc::new(tokio::sync::Notify::new());
        let api = Arc::new(GatedApi {
            gate: gate.clone(),
            grant: grant(Role::Catequista, "tok"),
        });
        let store = Arc::new(SessionStore::new(api, storage.clone()));

        let init = {
            let store = store.clone();
            tokio::spawn(async move { store.initialize().await })
        };
        while store.current_identity().is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.loading_state(), LoadingState::Initializing);

        let update = {
            let store = store.clone();
            tokio::spawn(async move { store.update_identity(IdentityUpdate::new().username("renombrado")).await })
        };
        tokio::task::yield_now().await;
        gate.notify_one();

        assert_eq!(init.await.unwrap(), LoadingState::SettledAuthenticated);
        let returned = update.await.unwrap().unwrap().unwrap();

        assert_eq!(returned.username, "renombrado");
        assert_eq!(store.current_identity(), Some(returned.clone()));
        let persisted: Identity = serde_json::from_str(&storage.peek(USER_DATA_KEY).unwrap()).unwrap();
        assert_eq!(persisted, returned);
        assert_eq!(storage.peek(AUTH_TOKEN_KEY).as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn stores_share_the_standard_matrix() {
        let (a, _) = store(FakeApi::default(), Arc::new(MemoryStorage::new()));
        let (b, _) = store(FakeApi::default(), Arc::new(MemoryStorage::new()));
        assert!(std::ptr::eq(a.matrix(), b.matrix()));
        assert_eq!(a.matrix(), PermissionMatrix::standard());
    }

    #[tokio::test]
    async fn update_identity_without_session_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store(FakeApi::default(), storage.clone());
        store.initialize().await;

        let result = store.update_identity(IdentityUpdate::new().active(false)).await.unwrap();
        assert!(result.is_none());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn capability_queries_follow_the_session() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store(FakeApi::default().with_login(Ok(grant(Role::Catequista, "t"))), storage);
        store.initialize().await;
        assert!(!store.has_permission(permissions::VIEW_DASHBOARD));

        store.login(Credentials::new("c", "pw")).await.unwrap();
        assert!(store.has_permission(permissions::VIEW_ASISTENCIA));
        assert!(!store.has_permission(permissions::MANAGE_CATEQUISTAS));
        assert!(!store.can_manage("certificados"));
        assert!(store.can_view("grupos"));

        store.logout().await;
        assert!(!store.can_view("grupos"));
    }

    #[tokio::test]
    async fn abandoned_login_restores_previous_state() {
        let storage = Arc::new(MemoryStorage::new());
        let api = Arc::new(GatedApi {
            gate: Arc::new(tokio::sync::Notify::new()),
            grant: grant(Role::Admin, "never"),
        });
        let store = SessionStore::new(api, storage.clone());
        store.initialize().await;

        {
            let mut fut = std::pin::pin!(store.login(Credentials::new("x", "y")));
            assert!(poll_once(fut.as_mut()).await.is_pending());
            assert_eq!(store.loading_state(), LoadingState::Initializing);
        }

        assert_eq!(store.loading_state(), LoadingState::SettledUnauthenticated);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn stale_login_result_is_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        let gate = Arc::new(tokio::sync::Notify::new());
        let api = Arc::new(GatedApi {
            gate: gate.clone(),
            grant: grant(Role::Admin, "late-token"),
        });
        let store = Arc::new(SessionStore::new(api, storage.clone()));
        store.initialize().await;

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.login(Credentials::new("a", "b")).await })
        };
        tokio::task::yield_now().await;
        while store.loading_state() != LoadingState::Initializing {
            tokio::task::yield_now().await;
        }

        // A logout lands while the login is still waiting on the backend.
        store.logout().await;
        gate.notify_one();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SessionError::Superseded)));
        assert!(!store.is_authenticated());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn settled_waits_for_revalidation() {
        let storage = seeded_storage(Role::Consulta, "tok");
        let (store, _) = store(FakeApi::default().with_profile(Ok(None)), storage);
        let store = Arc::new(store);

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.settled().await })
        };
        store.initialize().await;

        let settled = waiter.await.unwrap();
        assert_eq!(settled.loading(), LoadingState::SettledAuthenticated);
    }

    /// Backend whose calls block until `gate` is notified.
    struct GatedApi {
        gate: Arc<tokio::sync::Notify>,
        grant: LoginGrant,
    }

    #[async_trait]
    impl AuthApi for GatedApi {
        async fn login(&self, _credentials: &Credentials) -> Result<LoginGrant, AuthApiError> {
            self.gate.notified().await;
            Ok(self.grant.clone())
        }

        async fn profile(&self, _token: &AccessToken) -> Result<Option<Identity>, AuthApiError> {
            self.gate.notified().await;
            Ok(None)
        }
    }

    /// Poll a future exactly once.
    async fn poll_once<F: std::future::Future + Unpin>(mut fut: F) -> std::task::Poll<F::Output> {
        std::future::poll_fn(move |cx| std::task::Poll::Ready(std::pin::Pin::new(&mut fut).poll(cx))).await
    }
}
