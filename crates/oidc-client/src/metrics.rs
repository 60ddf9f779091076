//! Client metrics
//!
//! Recorded through the `metrics` facade; they are no-ops until the host
//! installs a recorder.
//!
//! - `oidc_sign_in_total` (counter): label `outcome`
//! - `oidc_sign_in_duration_seconds` (histogram): label `outcome`
//! - `oidc_token_refresh_total` (counter): label `outcome`

/// `"success"` or the failing stage label.
pub(crate) fn outcome<T>(result: &crate::Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.stage(),
    }
}

pub(crate) fn record_sign_in(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("oidc_sign_in_total", "outcome" => outcome).increment(1);
    metrics::histogram!("oidc_sign_in_duration_seconds", "outcome" => outcome)
        .record(duration_secs);
}

pub(crate) fn record_token_refresh(outcome: &'static str) {
    metrics::counter!("oidc_token_refresh_total", "outcome" => outcome).increment(1);
}
