//! JSON-RPC 2.0 frames spoken by the Kurento media server.

use crate::media::{MediaError, MediaObjectId};
use beacon_core::IceCandidate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub(crate) const ICE_CANDIDATE_FOUND: &str = "IceCandidateFound";
/// Event name used by media servers older than 6.7.
pub(crate) const LEGACY_ICE_CANDIDATE: &str = "OnIceCandidate";

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub(crate) fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub(crate) fn into_result(self) -> Result<Value, MediaError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(MediaError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcNotification {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Event payload carried by an `onEvent` notification.
#[derive(Debug, Deserialize)]
pub(crate) struct KurentoEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub object: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct EventParams {
    value: KurentoEvent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KurentoIceCandidate {
    candidate: String,
    #[serde(default)]
    sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    sdp_m_line_index: Option<u16>,
}

pub(crate) enum KurentoFrame {
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

impl KurentoFrame {
    pub(crate) fn parse(text: &str) -> Result<Self, MediaError> {
        let value: Value = serde_json::from_str(text)?;
        if value.get("method").is_some() {
            Ok(Self::Notification(serde_json::from_value(value)?))
        } else {
            Ok(Self::Response(serde_json::from_value(value)?))
        }
    }
}

impl JsonRpcNotification {
    pub(crate) fn into_event(self) -> Option<KurentoEvent> {
        if self.method != "onEvent" {
            return None;
        }
        serde_json::from_value::<EventParams>(self.params)
            .ok()
            .map(|p| p.value)
    }
}

impl KurentoEvent {
    pub(crate) fn is_ice_candidate(&self) -> bool {
        self.kind == ICE_CANDIDATE_FOUND || self.kind == LEGACY_ICE_CANDIDATE
    }

    pub(crate) fn ice_candidate(&self) -> Option<IceCandidate> {
        let raw = self.data.get("candidate")?.clone();
        let parsed: KurentoIceCandidate = serde_json::from_value(raw).ok()?;
        Some(IceCandidate {
            candidate: parsed.candidate,
            sdp_mid: parsed.sdp_mid,
            sdp_mline_index: parsed.sdp_m_line_index,
            username_fragment: None,
        })
    }
}

/// Extracts `result.value` as an object id or string payload.
pub(crate) fn result_value(result: &Value) -> Result<String, MediaError> {
    result
        .get("value")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| MediaError::Protocol(format!("missing result value in {}", result)))
}

pub(crate) fn create_pipeline_params() -> Value {
    json!({
        "type": "MediaPipeline",
        "constructorParams": {},
        "properties": {}
    })
}

pub(crate) fn create_endpoint_params(pipeline: &MediaObjectId) -> Value {
    json!({
        "type": "WebRtcEndpoint",
        "constructorParams": { "mediaPipeline": pipeline.0 },
        "properties": {}
    })
}

pub(crate) fn invoke_params(
    object: &MediaObjectId,
    operation: &str,
    operation_params: Value,
) -> Value {
    json!({
        "object": object.0,
        "operation": operation,
        "operationParams": operation_params
    })
}

pub(crate) fn subscribe_params(object: &MediaObjectId) -> Value {
    json!({
        "type": ICE_CANDIDATE_FOUND,
        "object": object.0
    })
}

pub(crate) fn release_params(object: &MediaObjectId) -> Value {
    json!({ "object": object.0 })
}

/// Encodes a browser candidate as the `kurento.IceCandidate` complex type.
pub(crate) fn ice_candidate_param(candidate: &IceCandidate) -> Value {
    json!({
        "__module__": "kurento",
        "__type__": "IceCandidate",
        "candidate": candidate.candidate,
        "sdpMid": candidate.sdp_mid.clone().unwrap_or_default(),
        "sdpMLineIndex": candidate.sdp_mline_index.unwrap_or(0)
    })
}
