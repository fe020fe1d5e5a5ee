use crate::util::env_flag_enabled;
use serde_json::Value;

const DEBUG_PAYLOAD_ENV: &str = "RUNSTREAM_DEBUG_PAYLOAD";

pub fn debug_payload_enabled() -> bool {
    env_flag_enabled(DEBUG_PAYLOAD_ENV)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    if !debug_payload_enabled() {
        return;
    }
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(
        target: "runstream::api",
        url = request_url,
        "request payload:\n{formatted_payload}"
    );
}

pub fn emit_sse_parse_error(
    event_type: Option<&str>,
    json_data: &str,
    parse_error: &serde_json::Error,
) {
    tracing::warn!(
        target: "runstream::api",
        event_type = event_type.unwrap_or("<none>"),
        error = %parse_error,
        data = json_data,
        "sse frame could not be decoded; skipping"
    );
}
