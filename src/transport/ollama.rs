use super::{FrameStream, Transport};
use crate::error::{Error, Result};
use crate::model::{ChatFrame, ChatRequest};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP transport for an Ollama-compatible server.
#[derive(Debug, Clone)]
pub struct OllamaTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), timeout })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_chat(&self, req: &ChatRequest) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(req)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout))?;
        if !resp.status().is_success() {
            return Err(Error::Status(resp.status().as_u16()));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Transport for OllamaTransport {
    async fn list_models(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(LIST_MODELS_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, LIST_MODELS_TIMEOUT))?;
        if !resp.status().is_success() {
            return Err(Error::Status(resp.status().as_u16()));
        }
        let tags: TagsResponse =
            resp.json().await.map_err(|e| Error::from_reqwest(e, LIST_MODELS_TIMEOUT))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat(&self, req: &ChatRequest) -> Result<ChatFrame> {
        let resp = self.post_chat(req).await?;
        let body = resp.bytes().await.map_err(|e| Error::from_reqwest(e, self.timeout))?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<FrameStream> {
        let resp = self.post_chat(req).await?;
        let timeout = self.timeout;
        let bytes = resp
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| Error::from_reqwest(e, timeout)))
            .boxed();
        Ok(ndjson_frames(bytes))
    }
}

/// Splits a byte stream into newline-delimited JSON frames. Lines may span
/// several network chunks; blank lines are skipped. Buffering stays at the
/// byte level because a chunk boundary can fall inside a UTF-8 sequence.
pub(crate) fn ndjson_frames(input: BoxStream<'static, Result<Bytes>>) -> FrameStream {
    let frames = stream::unfold(
        (input, BytesMut::new(), false),
        |(mut input, mut buf, finished)| async move {
            if finished {
                return None;
            }
            loop {
                if let Some(idx) = buf.iter().position(|b| *b == b'\n') {
                    let raw = buf.split_to(idx + 1);
                    let line = trim_whitespace(&raw[..idx]);
                    if line.is_empty() {
                        continue;
                    }
                    let frame = parse_line(line);
                    let stop = frame.is_err();
                    return Some((frame, (input, buf, stop)));
                }

                match input.next().await {
                    Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                    Some(Err(e)) => return Some((Err(e), (input, buf, true))),
                    None => {
                        let line = trim_whitespace(&buf);
                        if line.is_empty() {
                            return None;
                        }
                        let frame = parse_line(line);
                        return Some((frame, (input, BytesMut::new(), true)));
                    }
                }
            }
        },
    );
    Box::pin(frames)
}

fn trim_whitespace(mut line: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = line {
        if !first.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    while let [rest @ .., last] = line {
        if !last.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    line
}

fn parse_line(line: &[u8]) -> Result<ChatFrame> {
    serde_json::from_slice(line).map_err(|e| {
        debug!("unparseable frame: {}", String::from_utf8_lossy(line));
        Error::Protocol(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatOptions, Message};
    use std::collections::BTreeMap;
    use std::io::Write as _;

    fn request(stream: bool) -> ChatRequest {
        ChatRequest {
            model: "llama3.2:1b".into(),
            messages: vec![Message::user("ping")],
            stream,
            options: ChatOptions {
                temperature: 0.7,
                num_predict: 32,
                num_ctx: 2048,
                extra: BTreeMap::new(),
            },
        }
    }

    fn byte_chunks(parts: &[&'static str]) -> BoxStream<'static, Result<Bytes>> {
        let parts: Vec<Result<Bytes>> = parts.iter().map(|p| Ok(Bytes::from(*p))).collect();
        stream::iter(parts).boxed()
    }

    #[tokio::test]
    async fn lines_split_across_chunks_are_reassembled() {
        let input = byte_chunks(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"do",
            "ne\":false}\n\n{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"}}\n",
            "{\"done\":true}",
        ]);
        let frames: Vec<_> = ndjson_frames(input).collect().await;

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].as_ref().unwrap().text(), "Hel");
        assert_eq!(frames[1].as_ref().unwrap().text(), "lo");
        assert!(frames[2].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn multibyte_characters_split_across_chunks_survive() {
        let line = "{\"message\":{\"role\":\"assistant\",\"content\":\"café\"},\"done\":true}\n";
        let cut = line.find('é').unwrap() + 1;
        let bytes = line.as_bytes();
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..cut])),
            Ok(Bytes::copy_from_slice(&bytes[cut..])),
        ];
        let frames: Vec<_> = ndjson_frames(stream::iter(parts).boxed()).collect().await;

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().text(), "café");
    }

    #[test]
    fn trim_whitespace_strips_both_ends() {
        assert_eq!(trim_whitespace(b"  {}\r"), b"{}");
        assert_eq!(trim_whitespace(b" \t "), b"");
    }

    #[tokio::test]
    async fn malformed_line_ends_the_stream_with_an_error() {
        let input = byte_chunks(&["{\"done\":false}\nnot-json\n{\"done\":true}\n"]);
        let frames: Vec<_> = ndjson_frames(input).collect().await;

        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[1], Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn one_shot_chat_against_http_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(mockito::Matcher::PartialJsonString(r#"{"stream":false}"#.into()))
            .with_status(200)
            .with_body(r#"{"message":{"role":"assistant","content":"pong"},"done":true}"#)
            .create_async()
            .await;

        let transport = OllamaTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let frame = transport.chat(&request(false)).await.unwrap();

        assert_eq!(frame.text(), "pong");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn streamed_chat_against_http_server() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_header("content-type", "application/x-ndjson")
            .with_body(concat!(
                "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
                "{\"message\":{\"role\":\"assistant\",\"content\":\"lo \"},\"done\":false}\n",
                "{\"done\":true}\n",
            ))
            .create_async()
            .await;

        let transport = OllamaTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let frames = transport.chat_stream(&request(true)).await.unwrap();
        let mut seen = Vec::new();
        let mut sink = |s: &str| seen.push(s.to_string());
        let out = crate::stream::decode(frames, &mut sink).await;

        assert_eq!(out.text, "Hello ");
        assert_eq!(seen, vec!["Hel", "lo "]);
    }

    #[tokio::test]
    async fn server_errors_surface_as_status() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/api/chat").with_status(500).create_async().await;

        let transport = OllamaTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = transport.chat(&request(false)).await.unwrap_err();
        assert!(matches!(err, Error::Status(500)));
    }

    #[tokio::test]
    async fn slow_server_reports_the_configured_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(2));
                w.write_all(b"{\"done\":true}\n")
            })
            .create_async()
            .await;

        let timeout = Duration::from_millis(300);
        let transport = OllamaTransport::new(server.url(), timeout).unwrap();
        let err = transport.chat(&request(false)).await.unwrap_err();

        assert!(matches!(err, Error::Timeout(d) if d == timeout));
        assert_eq!(err.to_string(), "request timed out after 300ms");
    }

    #[tokio::test]
    async fn lists_models() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[{"name":"llama3.2:1b"},{"name":"phi3"}]}"#)
            .create_async()
            .await;

        let transport = OllamaTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        assert_eq!(transport.list_models().await.unwrap(), vec!["llama3.2:1b", "phi3"]);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connectivity_error() {
        // Port 9 (discard) is almost never listening.
        let transport = OllamaTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = transport.list_models().await.unwrap_err();
        assert!(matches!(err, Error::Connectivity(_) | Error::Timeout(_)));
    }
}
