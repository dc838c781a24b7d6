mod common;

use std::sync::Arc;

use common::{profile, FakeSessionApi, GrantOutcome};
use worksync_core::auth::FileStore;
use worksync_core::{AuthState, AuthStatus, CredentialStore, SessionService};

fn file_store(dir: &tempfile::TempDir) -> CredentialStore {
    CredentialStore::new(Arc::new(FileStore::new(dir.path().to_path_buf())))
}

fn service(api: Arc<FakeSessionApi>, store: &CredentialStore, state: &AuthState) -> SessionService {
    SessionService::new(api, store.clone(), state.clone())
}

#[tokio::test]
async fn test_login_persists_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let state = AuthState::new();
    let api = Arc::new(FakeSessionApi::new());
    api.set_login(GrantOutcome::Token("tok_v1".into(), Some(profile("Dana"))));

    service(api.clone(), &store, &state)
        .login("dana@acme.io", "hunter2")
        .await
        .unwrap();

    assert_eq!(api.login_calls(), 1);
    assert_eq!(store.get_token().await.unwrap().as_deref(), Some("tok_v1"));
    assert_eq!(store.get_user_profile().await.unwrap(), Some(profile("Dana")));
    assert!(store.has_completed_login().await.unwrap());
    assert_eq!(
        state.current(),
        AuthStatus::LoggedIn {
            token: "tok_v1".to_string(),
            profile: Some(profile("Dana")),
        }
    );
}

#[tokio::test]
async fn test_rejected_login_stores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let state = AuthState::new();
    let api = Arc::new(FakeSessionApi::new());
    api.set_login(GrantOutcome::Unauthorized);

    let result = service(api, &store, &state)
        .login("dana@acme.io", "wrong")
        .await;

    assert!(result.is_err());
    assert!(!store.is_authenticated().await.unwrap());
    assert!(!store.has_completed_login().await.unwrap());
    assert!(!state.is_logged_in());
}

#[tokio::test]
async fn test_restore_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    file_store(&dir)
        .set_session_data("tok_v1", &profile("Dana"))
        .await
        .unwrap();

    // Fresh store and state, as on the next launch
    let store = file_store(&dir);
    let state = AuthState::new();
    let found = service(Arc::new(FakeSessionApi::new()), &store, &state)
        .restore()
        .await
        .unwrap();

    assert!(found);
    assert_eq!(state.current_token().as_deref(), Some("tok_v1"));
}

#[tokio::test]
async fn test_restore_without_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let state = AuthState::new();
    state.set_logged_in("stale".to_string(), None);

    let found = service(Arc::new(FakeSessionApi::new()), &store, &state)
        .restore()
        .await
        .unwrap();

    assert!(!found);
    assert!(!state.is_logged_in());
}

#[tokio::test]
async fn test_logout_keeps_onboarding_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    let state = AuthState::new();
    store.set_onboarding_completed(true).await.unwrap();
    store.set_session_data("tok_v1", &profile("Dana")).await.unwrap();
    store.set_login_completed(true).await.unwrap();
    state.set_logged_in("tok_v1".to_string(), None);

    service(Arc::new(FakeSessionApi::new()), &store, &state)
        .logout()
        .await
        .unwrap();

    let reopened = file_store(&dir);
    assert!(reopened.has_completed_onboarding().await.unwrap());
    assert_eq!(reopened.get_token().await.unwrap(), None);
    assert_eq!(reopened.get_user_profile().await.unwrap(), None);
    assert!(!reopened.has_completed_login().await.unwrap());
    assert!(!state.is_logged_in());
}
