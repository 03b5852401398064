//! Catalogue and health probing
//!
//! Probes keep the reason a backend could not be listed or reached, so it can
//! be logged and tested. Callers outside this crate only see the collapsed
//! form: an empty (or static fallback) catalogue and `false` for health.

use thiserror::Error;

/// Why a probe did not produce a positive answer
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Connection refused, DNS failure, or timeout
    #[error("unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The backend answered but the body was not what the endpoint documents
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The backend cannot be probed in this build or configuration
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProbeError::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            ProbeError::Status(status)
        } else {
            ProbeError::Unreachable(e)
        }
    }
}

impl ProbeError {
    /// True when the backend could not be contacted at all
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ProbeError::Unreachable(_))
    }
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Collapse a catalogue probe, substituting `fallback` on failure
pub(crate) fn models_or(
    provider: &str,
    probe: ProbeResult<Vec<String>>,
    fallback: impl FnOnce() -> Vec<String>,
) -> Vec<String> {
    match probe {
        Ok(models) => models,
        Err(e) => {
            tracing::debug!("{} catalogue probe failed: {}", provider, e);
            fallback()
        }
    }
}

/// Collapse a health probe
pub(crate) fn healthy(provider: &str, probe: ProbeResult<()>) -> bool {
    match probe {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("{} health probe failed: {}", provider, e);
            false
        }
    }
}

/// Map a response to a probe result, rejecting non-success statuses
pub(crate) fn expect_success(response: reqwest::Response) -> ProbeResult<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ProbeError::Status(response.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_keeps_successes() {
        let models = models_or("ollama", Ok(vec!["llama3".into()]), Vec::new);
        assert_eq!(models, vec!["llama3".to_string()]);
        assert!(healthy("ollama", Ok(())));
    }

    #[test]
    fn test_collapse_failures() {
        let err = ProbeError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.is_unreachable());
        let models = models_or("ollama", Err(err), || vec!["fallback".into()]);
        assert_eq!(models, vec!["fallback".to_string()]);

        assert!(!healthy(
            "huggingface",
            Err(ProbeError::Unavailable("not compiled in".into()))
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let client = reqwest::Client::new();
        let err = client
            .get("http://127.0.0.1:1/api/tags")
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(ProbeError::from)
            .unwrap_err();
        assert!(err.is_unreachable());
    }
}
