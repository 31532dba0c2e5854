use std::sync::{Arc, atomic::Ordering};

use liftcash_session::{
    SessionConfig, SessionController, SessionError, SessionMode, SessionStatus, SessionStore,
    actor::AgentActorFactory,
    backend::DemoBackend,
    principal::Principal,
    storage::MemoryStore,
};

use crate::helpers::*;

#[tokio::test]
async fn test_demo_initialize_yields_demo_principal() {
    let storage = Arc::new(MemoryStore::new());
    let controller = SessionController::new(parts(
        SessionMode::Demo,
        Arc::new(DemoBackend::new()),
        storage,
    ));
    assert_eq!(controller.mode(), SessionMode::Demo);

    let session = controller.initialize().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Authenticated);
    let principal = session.principal().unwrap();
    assert_eq!(principal.to_text(), "demo-principal");
    assert!(!principal.is_anonymous());
    assert!(session.actor("community").is_some());
    assert!(session.actor("economy").is_some());
    assert_eq!(session.actors().len(), 2);
}

#[tokio::test]
async fn test_demo_sessions_are_deterministic() {
    let config = SessionConfig::demo().unwrap();
    let first = SessionController::from_config(&config, SessionStore::new()).unwrap();
    let second = SessionController::from_config(&config, SessionStore::new()).unwrap();

    let a = first.initialize().await.unwrap();
    let b = second.initialize().await.unwrap();
    assert_eq!(a.principal(), b.principal());
    assert_eq!(
        a.actors().keys().collect::<Vec<_>>(),
        b.actors().keys().collect::<Vec<_>>()
    );

    first.logout().await;
    let c = first.login().await.unwrap();
    assert_eq!(c.principal(), a.principal());
    assert_eq!(c.actors().len(), 2);
    assert!(c.actors().values().all(|actor| actor.is_stand_in()));
}

#[tokio::test]
async fn test_live_unauthenticated_client_resolves_unauthenticated() {
    let client = ScriptedClient::new(false);
    let (controller, _backend, _storage) = scripted_controller(&client);

    let session = controller.initialize().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(session.actors().is_empty());
    assert!(session.client().is_some());
    assert!(session.principal().is_none_or(Principal::is_anonymous));
}

#[tokio::test]
async fn test_live_authenticated_client_gets_actors() {
    let client = ScriptedClient::new(true);
    let (controller, _backend, _storage) = scripted_controller(&client);

    let session = controller.initialize().await.unwrap();
    assert!(session.is_authenticated());
    assert_eq!(session.principal().unwrap().to_text(), USER_PRINCIPAL);
    for actor in session.actors().values() {
        assert_eq!(actor.caller().to_text(), USER_PRINCIPAL);
    }
    assert_eq!(
        session.actor("community").unwrap().canister_id(),
        "rrkah-fqaaa-aaaaa-aaaaq-cai"
    );
}

#[tokio::test]
async fn test_agent_actors_are_bound_to_host() {
    let client = ScriptedClient::new(true);
    let mut parts = parts(
        SessionMode::Live,
        ScriptedBackend::new(client.clone()),
        Arc::new(MemoryStore::new()),
    );
    parts.actor_factory = Arc::new(AgentActorFactory);
    let controller = SessionController::new(parts);

    let session = controller.initialize().await.unwrap();
    let actor = session.actor("economy").unwrap();
    assert!(!actor.is_stand_in());
    assert_eq!(actor.agent().unwrap().host().as_str(), "http://127.0.0.1:4943/");
    assert_eq!(actor.agent().unwrap().principal().to_text(), USER_PRINCIPAL);
}

#[tokio::test]
async fn test_authenticated_but_anonymous_is_not_a_session() {
    let client = ScriptedClient::new(true);
    client.set_principal(Principal::anonymous());
    let (controller, _backend, _storage) = scripted_controller(&client);

    let session = controller.initialize().await.unwrap();
    assert!(!session.is_authenticated());
    assert!(session.actors().is_empty());
    assert_eq!(session.principal().unwrap().to_text(), "2vxsx-fae");
}

#[tokio::test]
async fn test_query_failure_leaves_session_untouched() {
    let client = ScriptedClient::new(true);
    client.fail_queries.store(true, Ordering::SeqCst);
    let (controller, _backend, _storage) = scripted_controller(&client);
    let before = controller.current();

    let err = controller.initialize().await.unwrap_err();
    assert!(err.is_backend_error());
    assert!(matches!(
        err,
        SessionError::BackendQueryFailed {
            operation: "is_authenticated",
            ..
        }
    ));
    assert!(Arc::ptr_eq(&before, &controller.current()));

    // A failed initialize can be retried.
    client.fail_queries.store(false, Ordering::SeqCst);
    assert!(controller.initialize().await.unwrap().is_authenticated());
}

#[tokio::test]
async fn test_create_failure_is_backend_query_failure() {
    let client = ScriptedClient::new(true);
    let (controller, backend, _storage) = scripted_controller(&client);
    backend.fail_create.store(true, Ordering::SeqCst);

    let err = controller.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::BackendQueryFailed {
            operation: "create",
            ..
        }
    ));
    assert_eq!(controller.current().status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_initialize_only_once() {
    let client = ScriptedClient::new(false);
    let (controller, backend, _storage) = scripted_controller(&client);
    controller.initialize().await.unwrap();
    assert!(matches!(
        controller.initialize().await.unwrap_err(),
        SessionError::AlreadyInitialized
    ));
    assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_login_denied_keeps_previous_session() {
    let client = ScriptedClient::new(false);
    client.set_script(LoginScript::Deny("UserInterrupt".to_string()));
    let (controller, _backend, _storage) = scripted_controller(&client);
    let before = controller.initialize().await.unwrap();

    let err = controller.login().await.unwrap_err();
    assert!(matches!(err, SessionError::LoginDenied { ref reason } if reason == "UserInterrupt"));
    assert!(err.is_login_failure());
    assert!(Arc::ptr_eq(&before, &controller.current()));
    assert!(!controller.is_login_pending());
}

#[tokio::test]
async fn test_login_skips_provider_when_already_authenticated() {
    let client = ScriptedClient::new(true);
    let (controller, _backend, _storage) = scripted_controller(&client);
    controller.initialize().await.unwrap();

    let session = controller.login().await.unwrap();
    assert!(session.is_authenticated());
    assert_eq!(client.login_calls(), 0);
}

#[tokio::test]
async fn test_login_before_initialize_creates_client() {
    let client = ScriptedClient::new(false);
    let (controller, backend, _storage) = scripted_controller(&client);

    let session = controller.login().await.unwrap();
    assert!(session.is_authenticated());
    assert_eq!(client.login_calls(), 1);
    assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_canister_id_makes_actor_unavailable() {
    let client = ScriptedClient::new(true);
    let mut parts = parts(
        SessionMode::Live,
        ScriptedBackend::new(client.clone()),
        Arc::new(MemoryStore::new()),
    );
    parts.actor_factory = Arc::new(AgentActorFactory);
    parts.services[1].canister_id = None;
    let controller = SessionController::new(parts);

    let err = controller.initialize().await.unwrap_err();
    assert!(matches!(err, SessionError::ActorUnavailable { ref service, .. } if service == "economy"));
    assert_eq!(controller.current().status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_no_services_is_invalid_session() {
    let client = ScriptedClient::new(true);
    let mut parts = parts(
        SessionMode::Live,
        ScriptedBackend::new(client.clone()),
        Arc::new(MemoryStore::new()),
    );
    parts.services.clear();
    let controller = SessionController::new(parts);

    let err = controller.initialize().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidSession { .. }));
}

#[tokio::test]
async fn test_logout_always_unauthenticated() {
    let client = ScriptedClient::new(true);
    client.fail_logout.store(true, Ordering::SeqCst);
    let (controller, _backend, _storage) = scripted_controller(&client);
    controller.initialize().await.unwrap();

    let session = controller.logout().await;
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(session.actors().is_empty());
    assert_eq!(client.logout_calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&session, &controller.current()));
}

#[tokio::test]
async fn test_status_tracks_last_completed_transition() {
    let client = ScriptedClient::new(false);
    let (controller, _backend, _storage) = scripted_controller(&client);
    controller.initialize().await.unwrap();

    let steps = [
        ("login", true),
        ("logout", false),
        ("logout", false),
        ("login", true),
        ("login", true),
        ("logout", false),
        ("login", true),
    ];
    for (step, authenticated) in steps {
        let session = match step {
            "login" => controller.login().await.unwrap(),
            _ => controller.logout().await,
        };
        assert_eq!(session.is_authenticated(), authenticated, "after {step}");
        assert_eq!(!session.actors().is_empty(), authenticated, "after {step}");
        assert_eq!(controller.current().is_authenticated(), authenticated);
    }
}
