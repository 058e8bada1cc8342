mod emitter;

pub use emitter::{FinishUsage, StreamEmitter, ToolCallDelta};

use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use eventsource_stream::Eventsource;
use futures::Stream;
use protogate_schema::gemini::{GenerateContentResponse, Part, UsageMetadata};
use protogate_schema::message::MessageStreamEvent;
use serde_json::json;
use tokio_stream::StreamExt as _;
use tracing::warn;

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Serializes one [`MessageStreamEvent`] as an SSE `Event`, naming the frame
/// after the payload's own `type` tag so clients needn't inspect the body to
/// dispatch on it.
fn to_sse_event(event: &MessageStreamEvent) -> Event {
    match Event::default().event(event.event_name()).json_data(event) {
        Ok(ev) => ev,
        Err(e) => {
            warn!(error = %e, "failed to serialize stream event");
            Event::default()
                .event("error")
                .data(json!({"error": "serialization_failed"}).to_string())
        }
    }
}

/// Drains one upstream `functionCall` part into its flattened delta shape,
/// or `None` for parts this stage doesn't forward as tool calls.
fn as_tool_call(part: &Part) -> Option<ToolCallDelta> {
    let call = part.function_call.as_ref()?;
    let id = call.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let name = call.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let arguments = call
        .get("args")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "{}".to_string());
    Some(ToolCallDelta { id, name, arguments })
}

/// Feeds one upstream chunk's candidate parts through the emitter, returning
/// every event it produced in order. The chunk's `usageMetadata`, when
/// present, is folded into `last_usage` so the eventual `finish` call can
/// report accurate totals even though only the terminal chunk reliably
/// carries it.
fn drive_chunk(
    emitter: &mut StreamEmitter,
    chunk: GenerateContentResponse,
    last_usage: &mut Option<UsageMetadata>,
) -> Vec<MessageStreamEvent> {
    let mut events = Vec::new();
    if let Some(usage) = chunk.usage_metadata {
        *last_usage = Some(usage);
    }
    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return events;
    };
    for part in &candidate.content.parts {
        if part.is_function_call() {
            if let Some(call) = as_tool_call(part) {
                events.extend(emitter.send_tool_calls(&[call]));
            }
            continue;
        }
        let Some(text) = part.text.as_deref() else { continue };
        if part.is_thought() {
            events.extend(emitter.send_thinking(text));
        } else {
            events.extend(emitter.send_text(text));
        }
    }
    events
}

/// Turns an upstream `streamGenerateContent` SSE response into the
/// client-facing content-block event stream, idle-timing out if the
/// upstream goes quiet for longer than [`IDLE_TIMEOUT`] and always emitting
/// a well-formed `message_delta`/`message_stop` pair when the upstream body
/// ends, even if it ended early or with an error.
pub fn build_stream_response(
    upstream: reqwest::Response,
    request_id: String,
    model: String,
    input_tokens: u32,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let body = async_stream::stream! {
        let mut emitter = StreamEmitter::new(request_id, model);
        let mut last_usage: Option<UsageMetadata> = None;

        yield Ok(to_sse_event(&emitter.start(input_tokens)));

        let mut upstream_events = upstream.bytes_stream().eventsource().timeout(IDLE_TIMEOUT);
        loop {
            let next = match upstream_events.next().await {
                Some(Ok(Ok(event))) => event,
                Some(Ok(Err(e))) => {
                    warn!(error = %e, "upstream SSE protocol error, ending stream");
                    break;
                }
                Some(Err(_)) => {
                    warn!("upstream SSE stream idle timeout");
                    break;
                }
                None => break,
            };

            if next.data.is_empty() {
                continue;
            }
            match serde_json::from_str::<GenerateContentResponse>(&next.data) {
                Ok(chunk) => {
                    for event in drive_chunk(&mut emitter, chunk, &mut last_usage) {
                        yield Ok(to_sse_event(&event));
                    }
                }
                Err(e) => warn!(error = %e, "skipping malformed upstream SSE chunk"),
            }
        }

        let output_tokens = last_usage.map(|u| u.candidates_token_count);
        for event in emitter.finish(FinishUsage { input_tokens, output_tokens }) {
            yield Ok(to_sse_event(&event));
        }
    };

    Sse::new(body).keep_alive(KeepAlive::default())
}
