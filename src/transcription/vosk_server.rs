use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::streaming::{LanguageModel, StreamingRecognizer};

/// Language model hosted by a Vosk-protocol websocket server.
///
/// The model is loaded server side; each transcription opens its own
/// session so concurrent runs never share recognizer state.
#[derive(Debug, Clone)]
pub struct VoskServerModel {
    url: String,
}

impl VoskServerModel {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for VoskServerModel {
    async fn recognizer(&self, sample_rate: u32) -> Result<Box<dyn StreamingRecognizer>> {
        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("connecting to recognizer at {}", self.url))?;

        let config = json!({ "config": { "sample_rate": sample_rate } });
        socket.send(Message::text(config.to_string())).await?;
        debug!(url = %self.url, sample_rate, "Recognizer session opened");

        Ok(Box::new(VoskSession {
            socket,
            utterance: None,
        }))
    }

    fn name(&self) -> &str {
        "vosk_server"
    }
}

#[derive(Debug, Deserialize)]
struct VoskReply {
    /// Absent on partial replies; present once an utterance is closed.
    text: Option<String>,
}

struct VoskSession {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    utterance: Option<String>,
}

impl VoskSession {
    async fn next_reply(&mut self) -> Result<VoskReply> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Text(text) => {
                    return serde_json::from_str(text.as_str())
                        .with_context(|| format!("unexpected recognizer reply: {}", text.as_str()));
                }
                Message::Close(_) => break,
                _ => continue,
            }
        }
        Err(anyhow!("recognizer closed the session"))
    }
}

#[async_trait]
impl StreamingRecognizer for VoskSession {
    async fn accept_waveform(&mut self, block: &[i16]) -> Result<bool> {
        let bytes: Vec<u8> = block.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.socket.send(Message::binary(bytes)).await?;

        let reply = self.next_reply().await?;
        match reply.text {
            Some(text) => {
                self.utterance = Some(text);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn result(&mut self) -> Result<String> {
        Ok(self.utterance.take().unwrap_or_default())
    }

    async fn final_result(&mut self) -> Result<String> {
        self.socket.send(Message::text(r#"{"eof" : 1}"#.to_string())).await?;
        let reply = self.next_reply().await?;
        let _ = self.socket.close(None).await;
        Ok(reply.text.unwrap_or_default())
    }
}
