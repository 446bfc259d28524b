//! Incremental `text/event-stream` decoding.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Frames without an `event:` name (absent, empty, or `message`) are the
    /// ones a browser delivers to `onmessage`.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("") | Some("message"))
    }
}

#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame_bytes: Vec<u8> = self.buf.drain(..idx + delim_len).take(idx).collect();
            if let Some(frame) = parse_sse_frame(&frame_bytes) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes received after the last complete frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event: Option<String> = None;
    let mut data_lines: Vec<String> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(strip_field_space(rest).to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(strip_field_space(rest).to_string());
        } else if line == "data" {
            data_lines.push(String::new());
        }
    }
    // EventSource never dispatches a frame whose data buffer is empty.
    let data = data_lines.join("\n");
    if data.is_empty() {
        return None;
    }
    Some(SseFrame { event, data })
}

fn strip_field_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}
