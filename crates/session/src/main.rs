use std::sync::Arc;

use anyhow::Context;

use catequesis_auth::permissions;
use catequesis_core::ParishId;
use catequesis_session::{
    ClientConfig, Credentials, HttpAuthApi, LoadingState, RouteGuard, SessionStore, SqliteStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    catequesis_observability::init();

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    tracing::info!(
        api = %config.api_base_url,
        session_db = %config.session_db.display(),
        "starting session bootstrap"
    );

    let api = HttpAuthApi::new(&config).context("failed to build HTTP client")?;
    let storage = SqliteStorage::open(&config.session_db);
    let store = SessionStore::new(Arc::new(api), Arc::new(storage)).with_login_path(config.login_path.clone());

    let mut state = store.initialize().await;

    if state != LoadingState::SettledAuthenticated {
        if let Some(credentials) = credentials_from_env()? {
            match store.login(credentials).await {
                Ok(_) => state = store.loading_state(),
                Err(e) => tracing::warn!(error = %e, "login from environment failed"),
            }
        }
    }

    match store.current_identity().filter(|_| state == LoadingState::SettledAuthenticated) {
        Some(user) => {
            let granted: Vec<&str> = store
                .matrix()
                .permissions()
                .filter(|p| store.has_permission(p))
                .map(|p| p.as_str())
                .collect();
            tracing::info!(
                user_id = %user.id,
                username = %user.username,
                role = %user.role,
                parish = user.parish.as_ref().map(|p| p.name.as_str()).unwrap_or("-"),
                capabilities = ?granted,
                "session ready"
            );
        }
        None => tracing::info!("no active session"),
    }

    let dashboard = RouteGuard::for_path("/dashboard").require_permissions([permissions::VIEW_DASHBOARD]);
    let decision = dashboard.check(&store);
    tracing::info!(decision = %serde_json::to_string(&decision)?, "dashboard guard");

    Ok(())
}

fn credentials_from_env() -> anyhow::Result<Option<Credentials>> {
    let (Ok(username), Ok(password)) = (
        std::env::var("CATEQUESIS_USERNAME"),
        std::env::var("CATEQUESIS_PASSWORD"),
    ) else {
        return Ok(None);
    };

    let mut credentials = Credentials::new(username, password);
    if let Ok(raw) = std::env::var("CATEQUESIS_PARISH_ID") {
        let parish: ParishId = raw.parse().context("invalid CATEQUESIS_PARISH_ID")?;
        credentials = credentials.with_parish(parish);
    }
    Ok(Some(credentials))
}
