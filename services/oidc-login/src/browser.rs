//! Loopback redirect capture
//!
//! Prints the authorization URL for the user to open, then serves the
//! redirect URI on a local listener until the provider sends the browser
//! back. The full callback URL is handed to the auth session through a
//! oneshot channel and the listener is shut down.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::Uri;
use axum::response::Html;
use axum::routing::get;
use oidc_client::{Browser, BrowserError};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use url::Url;

const CALLBACK_PAGE: &str =
    "<html><body><p>Sign-in complete. You can close this window.</p></body></html>";

/// Delivers the first callback's query string; later hits get the page only.
type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<Option<String>>>>>;

pub struct LoopbackBrowser {
    listen_addr: SocketAddr,
    timeout: Duration,
}

impl LoopbackBrowser {
    pub fn new(listen_addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            listen_addr,
            timeout,
        }
    }

    async fn run(&self, auth_uri: &Url, redirect_uri: &Url) -> Result<Url, BrowserError> {
        let listener = TcpListener::bind(self.listen_addr).await.map_err(|e| {
            BrowserError::Failed(format!("failed to bind {}: {e}", self.listen_addr))
        })?;

        let (callback_tx, callback_rx) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(callback_tx)));
        let app = Router::new()
            .route(redirect_uri.path(), get(callback_handler))
            .with_state(slot);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %e, "callback listener failed");
            }
        });

        info!(addr = %self.listen_addr, "waiting for authorization callback");
        println!("Open this URL in your browser to sign in:\n\n  {auth_uri}\n");

        let outcome = tokio::time::timeout(self.timeout, callback_rx).await;

        let _ = shutdown_tx.send(());
        if let Err(e) = server.await {
            warn!(error = %e, "callback listener task did not finish cleanly");
        }

        let query = match outcome {
            Ok(Ok(query)) => query,
            Ok(Err(_)) => {
                return Err(BrowserError::Failed(
                    "callback listener stopped before a redirect arrived".into(),
                ));
            }
            Err(_) => {
                return Err(BrowserError::Failed(format!(
                    "no callback within {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        debug!("authorization callback received");
        Ok(callback_url(redirect_uri, query.as_deref()))
    }
}

impl Browser for LoopbackBrowser {
    fn authenticate<'a>(
        &'a self,
        auth_uri: &'a Url,
        redirect_uri: &'a Url,
    ) -> Pin<Box<dyn Future<Output = Result<Url, BrowserError>> + Send + 'a>> {
        Box::pin(self.run(auth_uri, redirect_uri))
    }
}

async fn callback_handler(State(slot): State<CallbackSlot>, uri: Uri) -> Html<&'static str> {
    let sender = slot.lock().ok().and_then(|mut guard| guard.take());
    if let Some(sender) = sender {
        let _ = sender.send(uri.query().map(str::to_string));
    }
    Html(CALLBACK_PAGE)
}

/// The redirect URI with the query the provider appended.
fn callback_url(redirect_uri: &Url, query: Option<&str>) -> Url {
    let mut url = redirect_uri.clone();
    url.set_query(query);
    url
}
