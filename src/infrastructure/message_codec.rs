// Wire decoding for telemetry and frame stream messages
use crate::application::stream_transport::RawMessage;
use crate::domain::road::StreamKind;
use crate::domain::telemetry::TelemetrySnapshot;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Telemetry(TelemetrySnapshot),
    Frame(Bytes),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed telemetry payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("telemetry payload is not a JSON object")]
    NotAnObject,
    #[error("field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("frame payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("frame payload is empty")]
    EmptyFrame,
}

#[derive(Debug, Deserialize)]
struct TelemetryWire {
    count_car: u32,
    count_motor: u32,
    speed_car: f64,
    speed_motor: f64,
}

#[derive(Debug, Deserialize)]
struct FrameEnvelope {
    #[serde(alias = "image", alias = "data")]
    frame: String,
}

pub fn decode(
    kind: StreamKind,
    raw: RawMessage,
    received_at: DateTime<Utc>,
) -> Result<Decoded, DecodeError> {
    match kind {
        StreamKind::Telemetry => decode_telemetry(&raw, received_at).map(Decoded::Telemetry),
        StreamKind::Frame => decode_frame(raw).map(Decoded::Frame),
    }
}

fn decode_telemetry(
    raw: &RawMessage,
    received_at: DateTime<Utc>,
) -> Result<TelemetrySnapshot, DecodeError> {
    let value: serde_json::Value = match raw {
        RawMessage::Text(text) => serde_json::from_str(text)?,
        RawMessage::Binary(bytes) => serde_json::from_slice(bytes)?,
    };
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    let wire: TelemetryWire = serde_json::from_value(value)?;

    for (field, value) in [("speed_car", wire.speed_car), ("speed_motor", wire.speed_motor)] {
        if !value.is_finite() || value < 0.0 {
            return Err(DecodeError::OutOfRange { field, value });
        }
    }

    Ok(TelemetrySnapshot::new(
        wire.count_car,
        wire.count_motor,
        wire.speed_car,
        wire.speed_motor,
        received_at,
    ))
}

fn decode_frame(raw: RawMessage) -> Result<Bytes, DecodeError> {
    let bytes = match raw {
        RawMessage::Binary(bytes) => bytes,
        RawMessage::Text(text) => {
            let text = text.trim();
            let encoded = if text.starts_with('{') {
                serde_json::from_str::<FrameEnvelope>(text)?.frame
            } else {
                text.to_string()
            };
            Bytes::from(STANDARD.decode(strip_data_url(encoded.trim()))?)
        }
    };

    if bytes.is_empty() {
        return Err(DecodeError::EmptyFrame);
    }
    Ok(bytes)
}

/// `data:image/jpeg;base64,AAAA` -> `AAAA`
fn strip_data_url(text: &str) -> &str {
    if text.starts_with("data:") {
        if let Some(idx) = text.find(";base64,") {
            return &text[idx + ";base64,".len()..];
        }
    }
    text
}
