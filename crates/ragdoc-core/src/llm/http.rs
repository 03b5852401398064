//! Shared HTTP plumbing for network-backed providers

use crate::error::{RagError, Result};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::BoxStream;
use futures::{future, StreamExt, TryStreamExt};
use std::io;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

/// Timeout for catalogue listing and health probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for embedding requests
pub const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for non-streaming generation requests
pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client a provider keeps for its lifetime.
///
/// No overall timeout is set on the client so streamed responses can run as
/// long as the backend keeps emitting; each request sets its own instead.
pub(crate) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(RagError::Http)
}

/// Turn a non-success response into a provider error carrying the body
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(RagError::provider(
        provider,
        format!("HTTP {}: {}", status, body),
    ))
}

/// Split a newline-delimited response body into lines as bytes arrive
pub(crate) fn line_stream(
    provider: &'static str,
    response: reqwest::Response,
) -> BoxStream<'static, Result<String>> {
    let body = response.bytes_stream().map_err(io::Error::other).boxed();

    FramedRead::new(StreamReader::new(body), LinesCodec::new())
        .map_err(move |e: LinesCodecError| {
            RagError::provider(provider, format!("stream interrupted: {}", e))
        })
        .boxed()
}

/// Data payloads of a server-sent event stream, ending at `[DONE]`
pub(crate) fn sse_data(
    provider: &'static str,
    response: reqwest::Response,
) -> BoxStream<'static, Result<String>> {
    response
        .bytes_stream()
        .eventsource()
        .map_err(move |e| match e {
            EventStreamError::Transport(e) => RagError::Http(e),
            other => RagError::provider(provider, format!("malformed event stream: {}", other)),
        })
        .map_ok(|event| event.data)
        .try_filter(|data| future::ready(!data.trim().is_empty()))
        .try_take_while(|data| future::ready(Ok(data.trim() != "[DONE]")))
        .boxed()
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
