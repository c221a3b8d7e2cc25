// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Plumbing shared by the HTTP providers: cancellable sends, line framing of
//! streamed bodies, and model-id prefix handling.

use futures::StreamExt;
use reqwest::{RequestBuilder, Response};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::message::TokenDelta;
use crate::llm::provider::DeltaCallback;

/// Names of the hosted providers. Ids carrying one of these as a prefix never
/// belong to the local daemon.
pub const CLOUD_PROVIDERS: &[&str] = &[
    "anthropic",
    "gemini",
    "openai",
    "deepseek",
    "groq",
    "together",
    "openrouter",
];

/// Remove a `"<provider>:"` prefix from a model id, if present.
pub fn strip_provider_prefix<'a>(model: &'a str, provider: &str) -> &'a str {
    model
        .strip_prefix(provider)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(model)
}

/// True when the model id starts with `"<provider>:"`.
pub fn has_provider_prefix(model: &str, provider: &str) -> bool {
    model
        .strip_prefix(provider)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// True when the model id carries any hosted-provider prefix.
pub fn has_cloud_prefix(model: &str) -> bool {
    CLOUD_PROVIDERS
        .iter()
        .any(|provider| has_provider_prefix(model, provider))
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; anything else is returned trimmed.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error"),
            value.get("message"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(text) = candidate.as_str() {
                return text.to_string();
            }
        }
    }
    body.trim().to_string()
}

/// Send a request, giving up as soon as the cancel token fires.
pub(crate) async fn send_with_cancel(
    request: RequestBuilder,
    cancel: &CancellationToken,
    on_error: impl FnOnce(reqwest::Error) -> ProviderError,
) -> Result<Response, ProviderError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = request.send() => result.map_err(on_error),
    }
}

/// Turn a non-success response into an error using the provider's parser.
pub(crate) async fn check_status(
    response: Response,
    parse_error: impl FnOnce(u16, &str) -> ProviderError,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(parse_error(status.as_u16(), &body))
}

/// Default error parser: status mapping plus message extraction.
pub(crate) fn parse_http_error(status: u16, body: &str) -> ProviderError {
    ProviderError::from_status(status, error_message(body))
}

/// What a decoder made of one line of a streamed body
#[derive(Debug, PartialEq)]
pub(crate) enum Decoded {
    /// Keep-alive, event name, unknown or malformed line
    Skip,
    /// Output to forward
    Delta(TokenDelta),
    /// The backend reported an error mid-stream
    Failed(ProviderError),
}

/// Stateful per-response decoder for a line-oriented wire format.
pub(crate) trait LineDecoder: Send {
    fn decode_line(&mut self, line: &str) -> Decoded;

    /// Called when the body ends without a final delta. Formats where a clean
    /// end of stream means completion return the closing delta here.
    fn finish(&mut self) -> Option<TokenDelta> {
        None
    }
}

/// Splits a byte stream into lines without breaking multi-byte characters
/// that straddle chunk boundaries.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every completed line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(Self::decode(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Flush an unterminated trailing line.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(Self::decode(&raw))
    }

    fn decode(raw: &[u8]) -> String {
        String::from_utf8_lossy(raw).trim_end_matches('\r').to_string()
    }
}

/// Strip the `data:` field name from a server-sent-event line.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|rest| rest.trim_start())
}

/// Read a streamed body line by line, forwarding decoded deltas until the
/// final one.
///
/// Token counts are clamped so they never decrease within a response. A body
/// that ends without a final delta is a malformed stream unless the decoder
/// treats end-of-stream as completion.
pub(crate) async fn drive_lines<D: LineDecoder>(
    provider: &str,
    response: Response,
    mut decoder: D,
    on_delta: DeltaCallback<'_>,
    cancel: &CancellationToken,
) -> Result<(), ProviderError> {
    let mut stream = response.bytes_stream();
    let mut buffer = LineBuffer::default();
    let mut last_tokens = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            next = stream.next() => next,
        };

        let (lines, ended) = match next {
            Some(Ok(bytes)) => (buffer.push(&bytes), false),
            Some(Err(e)) => return Err(ProviderError::Transport(e.to_string())),
            None => (buffer.finish().into_iter().collect(), true),
        };

        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match decoder.decode_line(&line) {
                Decoded::Skip => {}
                Decoded::Delta(mut delta) => {
                    delta.cumulative_tokens = delta.cumulative_tokens.max(last_tokens);
                    last_tokens = delta.cumulative_tokens;
                    let is_final = delta.is_final;
                    on_delta(delta);
                    if is_final {
                        return Ok(());
                    }
                }
                Decoded::Failed(err) => return Err(err),
            }
        }

        if ended {
            break;
        }
    }

    match decoder.finish() {
        Some(mut delta) => {
            delta.cumulative_tokens = delta.cumulative_tokens.max(last_tokens);
            on_delta(delta);
            Ok(())
        }
        None => {
            tracing::debug!(
                target: "roundtable.provider",
                provider = provider,
                "stream closed before a final delta"
            );
            Err(ProviderError::MalformedStream(
                "stream ended before completion".to_string(),
            ))
        }
    }
}
