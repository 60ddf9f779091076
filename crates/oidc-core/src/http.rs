//! Response handling shared by every endpoint call

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// OAuth 2.0 error body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Turn a non-2xx response into `OAuth` (when the body is an OAuth error)
/// or `UnexpectedStatus`.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));

    if let Ok(oauth) = serde_json::from_str::<OAuthErrorBody>(&body) {
        return Err(Error::OAuth {
            error: oauth.error,
            description: oauth.error_description,
        });
    }

    Err(Error::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

/// Read the body as text, then decode. Keeps transport failures (`Http`)
/// apart from malformed payloads (`Parse`).
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading {what} body: {e}")))?;
    serde_json::from_str(&body).map_err(|e| Error::Parse(format!("invalid {what}: {e}")))
}
