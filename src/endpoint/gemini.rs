//! Gemini Live websocket endpoint.
//!
//! Speaks the `BidiGenerateContent` bidi protocol: a `setup` frame built from
//! the session config, a `setupComplete` acknowledgement, then `realtimeInput`
//! / `clientContent` frames out and `serverContent` frames in. Audio rides as
//! base64 inside JSON frames.

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{ConnectionError, LiveEndpoint, LiveReceiver, LiveSender, LiveSession};
use crate::credentials::Credential;
use crate::orchestrator::config::{ResponseModality, SessionConfig};
use crate::orchestrator::types::{AudioChunk, InboundEvent};

pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "models/gemini-2.0-flash-exp";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub struct GeminiLiveEndpoint {
    model: String,
}

impl GeminiLiveEndpoint {
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl Default for GeminiLiveEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

#[async_trait]
impl LiveEndpoint for GeminiLiveEndpoint {
    async fn connect(
        &self,
        credential: &Credential,
        config: &SessionConfig,
    ) -> Result<LiveSession, ConnectionError> {
        let url = format!("{GEMINI_LIVE_URL}?key={}", credential.as_str());
        let (ws, _) = connect_async(&url)
            .await
            .map_err(|err| ConnectionError::Handshake(err.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let setup = build_setup_frame(&self.model, config);
        sink.send(Message::Text(setup.to_string()))
            .await
            .map_err(|err| ConnectionError::Handshake(err.to_string()))?;

        await_setup_complete(&mut stream).await?;
        info!(target: "live_endpoint", model = %self.model, "gemini live session open");

        Ok(LiveSession {
            sender: Box::new(GeminiSender { sink }),
            receiver: Box::new(GeminiReceiver {
                stream,
                pending: VecDeque::new(),
            }),
        })
    }
}

async fn await_setup_complete(stream: &mut WsStream) -> Result<(), ConnectionError> {
    loop {
        let message = stream
            .next()
            .await
            .ok_or(ConnectionError::Closed)?
            .map_err(|err| ConnectionError::Handshake(err.to_string()))?;

        let payload = match message {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Close(_) => return Err(ConnectionError::Closed),
            _ => continue,
        };

        let frame: Value = serde_json::from_slice(&payload)
            .map_err(|err| ConnectionError::Protocol(err.to_string()))?;
        if frame.get("setupComplete").is_some() {
            return Ok(());
        }
        return Err(ConnectionError::Protocol(format!(
            "expected setupComplete, got: {frame}"
        )));
    }
}

struct GeminiSender {
    sink: WsSink,
}

#[async_trait]
impl LiveSender for GeminiSender {
    async fn send_audio(&mut self, chunk: AudioChunk) -> Result<(), ConnectionError> {
        let frame = json!({
            "realtimeInput": {
                "mediaChunks": [{
                    "mimeType": chunk.mime_type,
                    "data": BASE64.encode(&chunk.data),
                }],
            },
        });
        self.sink
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|err| ConnectionError::Transport(err.to_string()))
    }

    async fn send_turn_text(&mut self, text: &str) -> Result<(), ConnectionError> {
        let frame = json!({
            "clientContent": {
                "turns": [{
                    "role": "user",
                    "parts": [{"text": text}],
                }],
                "turnComplete": true,
            },
        });
        self.sink
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|err| ConnectionError::Transport(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|err| ConnectionError::Transport(err.to_string()))
    }
}

struct GeminiReceiver {
    stream: WsStream,
    pending: VecDeque<InboundEvent>,
}

#[async_trait]
impl LiveReceiver for GeminiReceiver {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, ConnectionError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let message = match self.stream.next().await {
                None => return Ok(None),
                Some(Err(err)) => return Err(ConnectionError::Transport(err.to_string())),
                Some(Ok(message)) => message,
            };

            let payload = match message {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(bytes) => bytes,
                Message::Close(_) => return Ok(None),
                _ => continue,
            };

            let frame: Value = serde_json::from_slice(&payload)
                .map_err(|err| ConnectionError::Protocol(err.to_string()))?;
            debug!(target: "live_endpoint", "server frame received");
            self.pending.extend(parse_server_frame(&frame)?);
        }
    }
}

fn build_setup_frame(model: &str, config: &SessionConfig) -> Value {
    let mut generation_config = json!({
        "responseModalities": [config.response_modality.as_str()],
    });

    // Voice selection only applies when the model answers with audio.
    if config.response_modality == ResponseModality::Audio {
        generation_config["speechConfig"] = json!({
            "voiceConfig": {
                "prebuiltVoiceConfig": {"voiceName": config.voice},
            },
        });
    }

    json!({
        "setup": {
            "model": model,
            "generationConfig": generation_config,
            "systemInstruction": {
                "parts": [{"text": config.system_instruction}],
            },
        },
    })
}

fn parse_server_frame(frame: &Value) -> Result<Vec<InboundEvent>, ConnectionError> {
    let mut events = Vec::new();
    let Some(content) = frame.get("serverContent") else {
        return Ok(events);
    };

    if let Some(parts) = content
        .pointer("/modelTurn/parts")
        .and_then(Value::as_array)
    {
        for part in parts {
            if let Some(data) = part.pointer("/inlineData/data").and_then(Value::as_str) {
                let pcm = BASE64
                    .decode(data)
                    .map_err(|err| ConnectionError::Protocol(err.to_string()))?;
                events.push(InboundEvent::Audio(Bytes::from(pcm)));
            } else if let Some(text) = part.get("text").and_then(Value::as_str) {
                events.push(InboundEvent::Text(text.to_string()));
            }
        }
    }

    if content
        .get("turnComplete")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        events.push(InboundEvent::TurnComplete);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_frame_includes_voice_for_audio() {
        let config = SessionConfig::default();
        let frame = build_setup_frame(DEFAULT_MODEL, &config);

        assert_eq!(
            frame.pointer("/setup/model").and_then(Value::as_str),
            Some(DEFAULT_MODEL)
        );
        assert_eq!(
            frame
                .pointer("/setup/generationConfig/speechConfig/voiceConfig/prebuiltVoiceConfig/voiceName")
                .and_then(Value::as_str),
            Some("Puck")
        );
    }

    #[test]
    fn setup_frame_omits_voice_for_text() {
        let config = SessionConfig {
            response_modality: ResponseModality::Text,
            ..Default::default()
        };
        let frame = build_setup_frame(DEFAULT_MODEL, &config);

        assert_eq!(
            frame.pointer("/setup/generationConfig/responseModalities/0"),
            Some(&Value::String("TEXT".to_string()))
        );
        assert!(frame
            .pointer("/setup/generationConfig/speechConfig")
            .is_none());
    }

    #[test]
    fn server_frame_yields_audio_text_and_turn_complete() {
        let frame = json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm", "data": BASE64.encode([1u8, 2, 3])}},
                        {"text": "hello"},
                    ],
                },
                "turnComplete": true,
            },
        });

        let events = parse_server_frame(&frame).expect("parses");
        assert_eq!(
            events,
            vec![
                InboundEvent::Audio(Bytes::from_static(&[1, 2, 3])),
                InboundEvent::Text("hello".to_string()),
                InboundEvent::TurnComplete,
            ]
        );
    }

    #[test]
    fn unrelated_frame_yields_nothing() {
        let frame = json!({"usageMetadata": {"promptTokenCount": 3}});
        assert!(parse_server_frame(&frame).expect("parses").is_empty());
    }

    #[test]
    fn invalid_audio_payload_is_a_protocol_error() {
        let frame = json!({
            "serverContent": {
                "modelTurn": {"parts": [{"inlineData": {"data": "!!not-base64!!"}}]},
            },
        });
        assert!(matches!(
            parse_server_frame(&frame),
            Err(ConnectionError::Protocol(_))
        ));
    }
}
