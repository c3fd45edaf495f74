//! Turns transport frames into text increments and a final answer.

use crate::error::{Error, Result};
use crate::model::ChatFrame;
use crate::transport::FrameStream;
use futures::StreamExt;

/// Receives text increments in arrival order.
pub type IncrementSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Outcome of a decode. `text` holds everything delivered before `error`,
/// if any; increments already handed to the sink are never retracted.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub text: String,
    pub error: Option<Error>,
}

impl Decoded {
    pub fn into_result(self) -> Result<String> {
        match self.error {
            Some(e) => Err(e),
            None if self.text.is_empty() => Err(Error::EmptyResult),
            None => Ok(self.text),
        }
    }
}

/// Per-call buffer for a streaming response. Lives only as long as the call.
#[derive(Debug, Default)]
pub struct StreamingAccumulator {
    chunks: Vec<String>,
    complete: bool,
    error: Option<Error>,
}

impl StreamingAccumulator {
    pub fn push(&mut self, chunk: &str) {
        self.chunks.push(chunk.to_string());
    }

    pub fn finish(&mut self) {
        self.complete = true;
    }

    pub fn fail(&mut self, error: Error) {
        self.error = Some(error);
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn into_decoded(self) -> Decoded {
        Decoded { text: self.chunks.concat(), error: self.error }
    }
}

/// Reads frames until one is flagged done, the stream ends or it fails.
pub async fn decode(mut frames: FrameStream, sink: IncrementSink<'_>) -> Decoded {
    let mut acc = StreamingAccumulator::default();
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(frame) => {
                let text = frame.text();
                if !text.is_empty() {
                    acc.push(text);
                    sink(text);
                }
                if frame.done {
                    acc.finish();
                    break;
                }
            }
            Err(e) => {
                acc.fail(e);
                break;
            }
        }
    }
    // A stream that closes without a done frame still yields what arrived.
    if !acc.is_complete() {
        acc.finish();
    }
    acc.into_decoded()
}

pub fn decode_one_shot(response: Result<ChatFrame>) -> Decoded {
    match response {
        Ok(frame) => Decoded { text: frame.text().to_string(), error: None },
        Err(e) => Decoded { text: String::new(), error: Some(e) },
    }
}

/// Splits text into groups of at most `words_per_chunk` words. Every group
/// but the last carries a trailing space.
pub fn chunk_words(text: &str, words_per_chunk: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let size = words_per_chunk.max(1);
    let count = words.chunks(size).count();
    words
        .chunks(size)
        .enumerate()
        .map(|(i, group)| {
            let mut chunk = group.join(" ");
            if i + 1 < count {
                chunk.push(' ');
            }
            chunk
        })
        .collect()
}
