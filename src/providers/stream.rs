//! Incremental parsing of `text/event-stream` completion responses.
//!
//! Converts the raw byte stream of a streaming chat-completion request into
//! [`StreamEvent`]s. Text deltas are surfaced as they arrive; tool-call
//! argument fragments are accumulated per index and emitted as one complete
//! [`ToolCallRequest`] when the endpoint reports a finish reason or the
//! stream ends.

use std::collections::BTreeMap;

use async_stream::try_stream;
use futures::StreamExt;
use serde_json::Value;
use tracing::warn;

use super::base::{CompletionStream, StreamEvent};
use super::utils::parse_arguments;
use crate::models::message::ToolCallRequest;

/// A tool call being assembled from per-index fragments.
#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Convert a streaming HTTP response into a [`CompletionStream`].
pub(crate) fn into_stream(response: reqwest::Response) -> CompletionStream {
    Box::pin(try_stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut pending: BTreeMap<u64, PartialToolCall> = BTreeMap::new();
        let mut finished = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);
            while let Some(end) = find_event_boundary(&buffer) {
                let event: Vec<u8> = buffer.drain(..end).collect();
                let text = String::from_utf8_lossy(&event);
                for parsed in parse_event(&text, &mut pending) {
                    if matches!(parsed, StreamEvent::Done) {
                        if finished {
                            continue;
                        }
                        finished = true;
                    }
                    yield parsed;
                }
                if finished {
                    break 'read;
                }
            }
        }

        // The connection closed without a completion signal; flush whatever
        // was accumulated so the caller still sees a terminated stream.
        if !finished {
            for call in flush_pending(&mut pending) {
                yield StreamEvent::ToolCall(call);
            }
            yield StreamEvent::Done;
        }
    })
}

/// Find the end of the first complete SSE event in the buffer (events are
/// separated by a blank line; CRLF tolerated).
fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 1 < buffer.len() {
        if buffer[i] == b'\n' {
            if buffer[i + 1] == b'\n' {
                return Some(i + 2);
            }
            if i + 2 < buffer.len() && buffer[i + 1] == b'\r' && buffer[i + 2] == b'\n' {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

/// Parse one SSE event into zero or more [`StreamEvent`]s.
fn parse_event(
    event_text: &str,
    pending: &mut BTreeMap<u64, PartialToolCall>,
) -> Vec<StreamEvent> {
    let Some(data) = extract_data_line(event_text) else {
        return Vec::new();
    };

    if data == "[DONE]" {
        let mut events: Vec<StreamEvent> = flush_pending(pending)
            .into_iter()
            .map(StreamEvent::ToolCall)
            .collect();
        events.push(StreamEvent::Done);
        return events;
    }

    let Ok(chunk) = serde_json::from_str::<Value>(data) else {
        warn!("skipping unparseable stream event");
        return Vec::new();
    };

    let mut events = Vec::new();
    let Some(choice) = chunk.get("choices").and_then(|choices| choices.get(0)) else {
        return events;
    };

    let delta = &choice["delta"];
    if let Some(text) = delta.get("content").and_then(|content| content.as_str()) {
        if !text.is_empty() {
            events.push(StreamEvent::ContentDelta(text.to_string()));
        }
    }

    if let Some(calls) = delta.get("tool_calls").and_then(|calls| calls.as_array()) {
        for call in calls {
            let index = call.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
            let entry = pending.entry(index).or_default();
            if let Some(id) = call.get("id").and_then(|id| id.as_str()) {
                entry.id = id.to_string();
            }
            if let Some(name) = call
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(|n| n.as_str())
            {
                entry.name = name.to_string();
            }
            if let Some(fragment) = call
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|a| a.as_str())
            {
                entry.arguments.push_str(fragment);
            }
        }
    }

    if choice
        .get("finish_reason")
        .and_then(|reason| reason.as_str())
        .is_some()
    {
        events.extend(flush_pending(pending).into_iter().map(StreamEvent::ToolCall));
        events.push(StreamEvent::Done);
    }

    events
}

/// Drain accumulated tool calls in index order.
fn flush_pending(pending: &mut BTreeMap<u64, PartialToolCall>) -> Vec<ToolCallRequest> {
    std::mem::take(pending)
        .into_values()
        .map(|partial| {
            ToolCallRequest::with_id(partial.id, partial.name, parse_arguments(&partial.arguments))
        })
        .collect()
}

/// Extract the `data:` payload from an SSE event block.
fn extract_data_line(event_text: &str) -> Option<&str> {
    for line in event_text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(data) = line.strip_prefix("data: ") {
            return Some(data);
        }
    }
    None
}
