use std::{collections::HashMap, sync::Arc, time::Duration};

use base64ct::{Base64UrlUnpadded, Encoding};
use liftcash_session::{
    SessionConfig, SessionController, SessionMode, SessionStore,
    backend::{AuthorizeRequest, IdentityProvider, LoopbackProvider},
    config::Network,
    constants::USER_PRINCIPAL_KEY,
};
use tokio::sync::mpsc;
use url::Url;

use crate::helpers::*;

/// Provider whose authorize URLs are delivered to the test.
fn provider() -> (LoopbackProvider, mpsc::UnboundedReceiver<Url>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let provider = LoopbackProvider::new(0).with_launcher(move |url: &Url| {
        let _ = tx.send(url.clone());
    });
    (provider, rx)
}

fn request() -> AuthorizeRequest {
    AuthorizeRequest {
        identity_provider: Url::parse("https://identity.ic0.app/").unwrap(),
        session_public_key: vec![9; 44],
        max_time_to_live: Duration::from_secs(60),
    }
}

/// The redirect URI and state carried in an authorize URL's fragment.
fn callback_target(authorize_url: &Url) -> (Url, String) {
    let fragment = authorize_url.fragment().unwrap();
    let query = fragment.strip_prefix("authorize?").unwrap();
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    (
        Url::parse(&params["redirect_uri"]).unwrap(),
        params["state"].clone(),
    )
}

fn with_query(base: &Url, pairs: &[(&str, &str)]) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().extend_pairs(pairs.iter().copied());
    url
}

#[tokio::test]
async fn test_loopback_grants_delegation() {
    let (provider, mut urls) = provider();
    let flow = tokio::spawn(async move { provider.authorize(request()).await });

    let authorize_url = urls.recv().await.unwrap();
    assert_eq!(authorize_url.host_str(), Some("identity.ic0.app"));
    let (redirect, state) = callback_target(&authorize_url);
    assert_eq!(redirect.host_str(), Some("127.0.0.1"));
    assert_eq!(redirect.path(), "/callback");

    // A callback for another login attempt is refused and the flow keeps waiting.
    let wrong = with_query(&redirect, &[("state", "other"), ("error", "UserInterrupt")]);
    let response = reqwest::get(wrong).await.unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert!(!flow.is_finished());

    let key = Base64UrlUnpadded::encode_string(&[5u8; 44]);
    let expiration = (START_NANOS + HOUR_NANOS).to_string();
    let good = with_query(
        &redirect,
        &[
            ("state", state.as_str()),
            ("public_key", key.as_str()),
            ("expiration", expiration.as_str()),
        ],
    );
    let response = reqwest::get(good).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let delegation = flow.await.unwrap().unwrap();
    assert_eq!(delegation.public_key, vec![5u8; 44]);
    assert_eq!(delegation.expiration, START_NANOS + HOUR_NANOS);
}

#[tokio::test]
async fn test_loopback_reports_provider_error() {
    let (provider, mut urls) = provider();
    let flow = tokio::spawn(async move { provider.authorize(request()).await });

    let (redirect, state) = callback_target(&urls.recv().await.unwrap());
    let denied = with_query(
        &redirect,
        &[("state", state.as_str()), ("error", "UserInterrupt")],
    );
    let response = reqwest::get(denied).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let err = flow.await.unwrap().unwrap_err();
    assert!(err.is_denied());
}

#[tokio::test]
async fn test_loopback_listener_stops_when_flow_is_dropped() {
    let (provider, mut urls) = provider();
    let flow = tokio::spawn(async move { provider.authorize(request()).await });
    let (redirect, _state) = callback_target(&urls.recv().await.unwrap());

    flow.abort();
    let _ = flow.await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    assert!(client.get(redirect).send().await.is_err());
}

#[tokio::test]
async fn test_controller_logs_in_through_loopback() {
    let data_dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new(SessionMode::Live, Network::Local)
        .unwrap()
        .with_canister_id("community", "rrkah-fqaaa-aaaaa-aaaaq-cai")
        .unwrap()
        .with_canister_id("economy", "ryjl3-tyaaa-aaaaa-aaaba-cai")
        .unwrap()
        .with_data_dir(data_dir.path())
        .with_login_timeout_secs(10);
    let (provider, mut urls) = provider();
    let controller = Arc::new(
        SessionController::from_config_with_provider(
            &config,
            SessionStore::new(),
            Arc::new(provider),
        )
        .unwrap(),
    );

    let session = controller.initialize().await.unwrap();
    assert!(!session.is_authenticated());

    let login = tokio::spawn({
        let controller = controller.clone();
        async move { controller.login().await }
    });
    let (redirect, state) = callback_target(&urls.recv().await.unwrap());

    let mut user_key = vec![
        0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
    ];
    user_key.extend_from_slice(&[0u8; 32]);
    let key = Base64UrlUnpadded::encode_string(&user_key);
    // Far enough in the future for the system clock.
    let expiration = u64::MAX.to_string();
    let callback = with_query(
        &redirect,
        &[
            ("state", state.as_str()),
            ("public_key", key.as_str()),
            ("expiration", expiration.as_str()),
        ],
    );
    assert_eq!(reqwest::get(callback).await.unwrap().status().as_u16(), 200);

    let session = login.await.unwrap().unwrap();
    assert!(session.is_authenticated());
    assert_eq!(session.principal().unwrap().to_text(), USER_PRINCIPAL);
    assert!(session.actors().values().all(|actor| !actor.is_stand_in()));

    let persisted = std::fs::read_to_string(data_dir.path().join("session.json")).unwrap();
    assert!(persisted.contains(USER_PRINCIPAL_KEY));
    assert!(persisted.contains(USER_PRINCIPAL));
}
