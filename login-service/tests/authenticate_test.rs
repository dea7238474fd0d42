mod common;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use common::TestApp;
use login_service::{
    models::{CredentialRecord, Session, SessionId},
    services::{AuthError, AuthService, MockCredentialStore, MockSessionStore, UsernamePolicy},
    utils::{hash_password, Password, PasswordHashString},
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

fn pw(s: &str) -> Password {
    Password::new(s.to_string())
}

#[tokio::test]
async fn test_alice_wrong_then_correct_password() {
    let app = TestApp::spawn();
    let alice = app.provision("alice", "correct-pw");

    let err = app
        .auth()
        .authenticate("alice", pw("wrong-pw"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(app.sessions.write_count(), 0);

    let session = app
        .auth()
        .authenticate("alice", pw("correct-pw"), None)
        .await
        .unwrap();
    assert_eq!(session.user_id, alice);
    assert_eq!(session.username, "alice");

    let raw = URL_SAFE_NO_PAD
        .decode(session.session_id.as_str())
        .expect("session id is base64url");
    assert!(raw.len() * 8 >= 128);
    assert!(session.expires_at > session.created_at);
}

#[tokio::test]
async fn test_successful_logins_issue_unique_ids() {
    let app = TestApp::spawn();
    app.provision("alice", "correct-pw");

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let session = app
            .auth()
            .authenticate("alice", pw("correct-pw"), None)
            .await
            .unwrap();
        assert!(!session.session_id.as_str().is_empty());
        assert!(seen.insert(session.session_id.as_str().to_string()));
    }
}

#[tokio::test]
async fn test_second_login_invalidates_first_session() {
    let app = TestApp::spawn();
    app.provision("alice", "correct-pw");

    let first = app
        .auth()
        .authenticate("alice", pw("correct-pw"), None)
        .await
        .unwrap();
    let second = app
        .auth()
        .authenticate("alice", pw("correct-pw"), None)
        .await
        .unwrap();

    assert_ne!(first.session_id, second.session_id);
    assert!(app.auth().resolve(&first.session_id).await.unwrap().is_none());
    assert!(app.auth().resolve(&second.session_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_presented_session_is_rotated_out() {
    let app = TestApp::spawn();
    app.provision("alice", "correct-pw");

    // A session the client carried in before logging in, e.g. one planted by
    // an attacker through a fixation attempt.
    let planted = Session::new(Uuid::new_v4(), "mallory", Duration::seconds(3600)).unwrap();
    app.sessions.insert(&planted).unwrap();

    let session = app
        .auth()
        .authenticate("alice", pw("correct-pw"), Some(&planted.session_id))
        .await
        .unwrap();

    assert_ne!(session.session_id, planted.session_id);
    assert!(app.auth().resolve(&planted.session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_login_keeps_presented_session() {
    let app = TestApp::spawn();
    let alice = app.provision("alice", "correct-pw");

    let existing = app
        .auth()
        .authenticate("alice", pw("correct-pw"), None)
        .await
        .unwrap();

    let err = app
        .auth()
        .authenticate("alice", pw("wrong-pw"), Some(&existing.session_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let still_there = app.auth().resolve(&existing.session_id).await.unwrap();
    assert_eq!(still_there.map(|s| s.user_id), Some(alice));
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_are_indistinguishable() {
    let app = TestApp::spawn();
    app.provision("alice", "correct-pw");

    let wrong_password = app
        .auth()
        .authenticate("alice", pw("wrong-pw"), None)
        .await
        .unwrap_err();
    let unknown_user = app
        .auth()
        .authenticate("mallory", pw("wrong-pw"), None)
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(matches!(unknown_user, AuthError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    assert_eq!(format!("{:?}", wrong_password), format!("{:?}", unknown_user));
    assert_eq!(app.sessions.write_count(), 0);
}

#[tokio::test]
async fn test_unknown_user_pays_for_hash_verification() {
    let app = TestApp::spawn();
    app.provision("alice", "correct-pw");

    // Warm up the blocking pool
    let _ = app.auth().authenticate("alice", pw("warm-up"), None).await;

    let mut wrong_password = std::time::Duration::MAX;
    let mut unknown_user = std::time::Duration::MAX;
    for _ in 0..3 {
        let started = Instant::now();
        let _ = app.auth().authenticate("alice", pw("wrong-pw"), None).await;
        wrong_password = wrong_password.min(started.elapsed());

        let started = Instant::now();
        let _ = app.auth().authenticate("nobody", pw("wrong-pw"), None).await;
        unknown_user = unknown_user.min(started.elapsed());
    }

    // Generous tolerance: an unknown user that skipped Argon2 would be orders
    // of magnitude faster.
    assert!(
        unknown_user * 4 >= wrong_password,
        "unknown user took {:?}, wrong password took {:?}",
        unknown_user,
        wrong_password
    );
}

#[tokio::test]
async fn test_credential_store_outage_is_not_masked() {
    let app = TestApp::spawn();
    app.provision("alice", "correct-pw");
    app.credentials.set_available(false);

    let err = app
        .auth()
        .authenticate("alice", pw("correct-pw"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::StoreUnavailable(_)));
    assert_eq!(app.sessions.write_count(), 0);
    assert_eq!(app.sessions.live_sessions(), 0);
}

#[tokio::test]
async fn test_session_store_outage_after_verification() {
    let app = TestApp::spawn();
    let alice = app.provision("alice", "correct-pw");

    let existing = Session::new(alice, "alice", Duration::seconds(3600)).unwrap();
    app.sessions.insert(&existing).unwrap();
    app.sessions.set_available(false);

    let err = app
        .auth()
        .authenticate("alice", pw("correct-pw"), Some(&existing.session_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StoreUnavailable(_)));
    assert_eq!(app.sessions.write_count(), 0);

    // The failed login must not have cost the client its current session
    app.sessions.set_available(true);
    let survivor = app.auth().resolve(&existing.session_id).await.unwrap();
    assert_eq!(survivor.map(|s| s.user_id), Some(alice));
}

#[tokio::test]
async fn test_out_of_range_ttl_fails_without_panicking() {
    let credentials = Arc::new(MockCredentialStore::new(UsernamePolicy::CaseSensitive));
    let sessions = Arc::new(MockSessionStore::new());
    let hash = hash_password(&pw("correct-pw")).unwrap();
    credentials
        .insert(CredentialRecord::new(Uuid::new_v4(), "alice".to_string(), hash))
        .unwrap();

    let auth = AuthService::new(
        credentials.clone(),
        sessions.clone(),
        Duration::seconds(10_000_000_000_000),
    );

    let outcome = tokio::spawn(async move {
        auth.authenticate("alice", pw("correct-pw"), None).await
    })
    .await
    .expect("login task must not panic");

    assert!(matches!(outcome, Err(AuthError::Internal(_))));
    assert_eq!(sessions.write_count(), 0);
}

#[tokio::test]
async fn test_one_credential_read_per_attempt() {
    let app = TestApp::spawn();
    app.provision("alice", "correct-pw");

    let _ = app.auth().authenticate("alice", pw("correct-pw"), None).await;
    let _ = app.auth().authenticate("ghost", pw("correct-pw"), None).await;
    assert_eq!(app.credentials.lookup_count(), 2);
    assert_eq!(app.sessions.write_count(), 1);
}

#[tokio::test]
async fn test_case_sensitive_usernames() {
    let app = TestApp::spawn_with_policy(UsernamePolicy::CaseSensitive);
    app.provision("Alice", "correct-pw");

    assert!(app
        .auth()
        .authenticate("Alice", pw("correct-pw"), None)
        .await
        .is_ok());
    for probe in ["alice", "ALICE", "aLiCe"] {
        let err = app
            .auth()
            .authenticate(probe, pw("correct-pw"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials), "{}", probe);
    }
}

#[tokio::test]
async fn test_case_insensitive_usernames() {
    let app = TestApp::spawn_with_policy(UsernamePolicy::CaseInsensitive);
    let alice = app.provision("Alice", "correct-pw");

    for probe in ["Alice", "alice", "ALICE", "aLiCe"] {
        let session = app
            .auth()
            .authenticate(probe, pw("correct-pw"), None)
            .await
            .unwrap();
        assert_eq!(session.user_id, alice, "{}", probe);
        // The stored spelling, not the one typed at login
        assert_eq!(session.username, "Alice", "{}", probe);
    }

    // Password matching never folds case
    let err = app
        .auth()
        .authenticate("alice", pw("CORRECT-PW"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_unusable_stored_hash_is_rejected() {
    let app = TestApp::spawn();
    app.credentials
        .insert(CredentialRecord::new(
            Uuid::new_v4(),
            "legacy".to_string(),
            PasswordHashString::new("plaintext-from-old-system".to_string()),
        ))
        .unwrap();

    let err = app
        .auth()
        .authenticate("legacy", pw("plaintext-from-old-system"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(app.sessions.write_count(), 0);
}

#[tokio::test]
async fn test_concurrent_logins_for_distinct_users() {
    let app = TestApp::spawn();
    let users: Vec<(String, Uuid)> = (0..4)
        .map(|i| {
            let name = format!("user{}", i);
            let id = app.provision(&name, "correct-pw");
            (name, id)
        })
        .collect();

    let handles: Vec<_> = users
        .iter()
        .map(|(name, id)| {
            let auth = app.auth().clone();
            let name = name.clone();
            let id = *id;
            tokio::spawn(async move {
                let session = auth
                    .authenticate(&name, pw("correct-pw"), None)
                    .await
                    .unwrap();
                assert_eq!(session.user_id, id);
                session.session_id
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().as_str().to_string());
    }
    assert_eq!(ids.len(), users.len());
    assert_eq!(app.sessions.live_sessions(), users.len());
}

#[tokio::test]
async fn test_expired_session_resolves_to_none() {
    let app = TestApp::spawn();
    let expired = Session::new(Uuid::new_v4(), "alice", Duration::seconds(-5)).unwrap();
    app.sessions.insert(&expired).unwrap();

    assert!(app.auth().resolve(&expired.session_id).await.unwrap().is_none());
    assert_eq!(app.sessions.live_sessions(), 0);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let app = TestApp::spawn();
    app.provision("alice", "correct-pw");

    let session = app
        .auth()
        .authenticate("alice", pw("correct-pw"), None)
        .await
        .unwrap();
    app.auth().logout(&session.session_id).await.unwrap();
    assert!(app.auth().resolve(&session.session_id).await.unwrap().is_none());

    // Logging out twice is fine
    app.auth().logout(&session.session_id).await.unwrap();
}

#[tokio::test]
async fn test_unknown_session_id_resolves_to_none() {
    let app = TestApp::spawn();
    let stranger = SessionId::generate();
    assert!(app.auth().resolve(&stranger).await.unwrap().is_none());
}
