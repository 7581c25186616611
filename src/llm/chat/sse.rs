use log::debug;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Token(String),
    Error(String),
    Done,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: String,
}

/// Turns raw `text/event-stream` bytes into completion tokens.
///
/// Network chunks do not respect line boundaries, so incomplete lines stay
/// buffered until the next `push`.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Parses whatever is left once the upstream body has ended.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseEvent> {
    let line = match std::str::from_utf8(raw) {
        Ok(l) => l.trim_end_matches(&['\n', '\r'][..]),
        Err(e) => {
            debug!("Skipping non UTF-8 stream line: {}", e);
            return None;
        }
    };

    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(err) = chunk.error {
                return Some(SseEvent::Error(err.message));
            }
            let token: String = chunk.choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            if token.is_empty() {
                None
            } else {
                Some(SseEvent::Token(token))
            }
        }
        Err(e) => {
            debug!("JSON parse error: {} for data: {}", e, data);
            None
        }
    }
}
