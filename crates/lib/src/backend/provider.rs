//! Identity provider round-trip.
//!
//! [`LoopbackProvider`] is the interactive flow used by the live backend: it
//! binds a one-shot HTTP listener on 127.0.0.1, hands the authorize URL to a
//! launcher (normally a browser opener) and waits for the provider to
//! redirect back with a delegation:
//!
//! ```text
//! <provider>#authorize?session_public_key=..&redirect_uri=..&state=..&max_time_to_live=..
//! GET /callback?state=..&public_key=..&expiration=..
//! GET /callback?state=..&error=..
//! ```
//!
//! The listener shuts down when the flow finishes or its future is dropped.

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use url::Url;

use super::ProviderError;
use crate::identity::Delegation;

/// What the provider is asked to delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    pub identity_provider: Url,
    /// DER-encoded public key of the session key.
    pub session_public_key: Vec<u8>,
    pub max_time_to_live: Duration,
}

/// Something that can obtain a delegation for a session key.
#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<Delegation, ProviderError>;
}

type Launcher = Arc<dyn Fn(&Url) + Send + Sync>;

/// Provider flow over a loopback HTTP callback.
#[derive(Clone)]
pub struct LoopbackProvider {
    port: u16,
    launcher: Launcher,
}

impl fmt::Debug for LoopbackProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackProvider")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl LoopbackProvider {
    /// Listen on `port` (0 picks a free port); the authorize URL is logged.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            launcher: Arc::new(|url: &Url| {
                tracing::info!(url = %url, "Open this URL to log in");
            }),
        }
    }

    /// Replace what happens with the authorize URL.
    pub fn with_launcher(mut self, launcher: impl Fn(&Url) + Send + Sync + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    /// Build the URL the user visits to authorize the session key.
    pub fn authorize_url(request: &AuthorizeRequest, redirect_uri: &Url, state: &str) -> Url {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(
                "session_public_key",
                &Base64UrlUnpadded::encode_string(&request.session_public_key),
            )
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("state", state)
            .append_pair(
                "max_time_to_live",
                &request.max_time_to_live.as_nanos().to_string(),
            )
            .finish();
        let mut url = request.identity_provider.clone();
        url.set_fragment(Some(&format!("authorize?{query}")));
        url
    }
}

#[async_trait]
impl IdentityProvider for LoopbackProvider {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<Delegation, ProviderError> {
        let address = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ProviderError::Bind {
                address: address.clone(),
                source,
            })?;
        let local = listener
            .local_addr()
            .map_err(|source| ProviderError::Bind { address, source })?;
        let redirect_uri = Url::parse(&format!("http://{local}/callback")).map_err(|err| {
            ProviderError::Callback {
                reason: err.to_string(),
            }
        })?;

        let state = uuid::Uuid::new_v4().to_string();
        let (result_tx, result_rx) = oneshot::channel();
        let callback = CallbackState {
            expected_state: state.clone(),
            result: Arc::new(Mutex::new(Some(result_tx))),
        };
        let router = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(callback);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = served {
                tracing::warn!(error = %err, "Login callback server failed");
            }
        });
        let _server = ServerGuard {
            shutdown: Some(shutdown_tx),
            handle: server,
        };

        tracing::debug!(callback = %redirect_uri, "Waiting for identity provider");
        (self.launcher)(&Self::authorize_url(&request, &redirect_uri, &state));

        result_rx.await.map_err(|_| ProviderError::Closed)?
    }
}

/// Stops the callback server when the flow ends, including on cancellation.
struct ServerGuard {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle.abort();
    }
}

type ResultSender = oneshot::Sender<Result<Delegation, ProviderError>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    result: Arc<Mutex<Option<ResultSender>>>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    state: Option<String>,
    public_key: Option<String>,
    expiration: Option<u64>,
    error: Option<String>,
}

async fn handle_callback(
    State(callback): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, &'static str) {
    if params.state.as_deref() != Some(callback.expected_state.as_str()) {
        tracing::warn!("Ignoring login callback with mismatched state");
        return (StatusCode::BAD_REQUEST, "Unknown login request.");
    }

    let outcome = parse_callback(params);
    let page = match &outcome {
        Ok(_) => (
            StatusCode::OK,
            "Login complete. You can close this window.",
        ),
        Err(_) => (
            StatusCode::OK,
            "Login failed. You can close this window.",
        ),
    };

    let sender = match callback.result.lock() {
        Ok(mut slot) => slot.take(),
        Err(_) => None,
    };
    match sender {
        Some(sender) => {
            let _ = sender.send(outcome);
            page
        }
        None => (StatusCode::GONE, "Login already finished."),
    }
}

fn parse_callback(params: CallbackParams) -> Result<Delegation, ProviderError> {
    if let Some(reason) = params.error {
        return Err(ProviderError::Denied { reason });
    }
    let (Some(public_key), Some(expiration)) = (params.public_key, params.expiration) else {
        return Err(ProviderError::Callback {
            reason: "missing public_key or expiration".to_string(),
        });
    };
    let public_key =
        Base64UrlUnpadded::decode_vec(&public_key).map_err(|err| ProviderError::Callback {
            reason: format!("public_key is not base64url: {err}"),
        })?;
    Ok(Delegation {
        public_key,
        expiration,
    })
}
