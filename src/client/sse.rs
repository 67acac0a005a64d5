//! Incremental decoder for the server-sent event stream.
//!
//! Wire format: frames separated by a blank line, each frame carrying
//! `event:` and `data:` fields. Comment lines (leading `:`) and unknown
//! fields are skipped; CRLF line endings are tolerated. Chunk boundaries
//! from the HTTP body do not align with frame boundaries, so the decoder
//! buffers across pushes.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    /// Feed a body chunk; returns every frame completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(end) = find_frame_end(&self.buffer) {
            let raw: String = self.buffer.drain(..end.frame_len).collect();
            self.buffer.drain(..end.separator_len);
            if let Some(frame) = parse_frame(&raw) {
                frames.push(frame);
            }
        }
        frames
    }
}

struct FrameEnd {
    frame_len: usize,
    separator_len: usize,
}

fn find_frame_end(buffer: &str) -> Option<FrameEnd> {
    // Accept both LF and CRLF blank-line separators, whichever comes first.
    let lf = buffer.find("\n\n").map(|at| FrameEnd {
        frame_len: at + 1,
        separator_len: 1,
    });
    let crlf = buffer.find("\r\n\r\n").map(|at| FrameEnd {
        frame_len: at + 2,
        separator_len: 2,
    });
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.frame_len <= b.frame_len { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut event = String::new();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = field_value(line, "event") {
            event = value.to_string();
        } else if let Some(value) = field_value(line, "data") {
            data_lines.push(value);
        }
        // Unknown fields (id, retry, ...) are ignored.
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

fn field_value<'l>(line: &'l str, field: &str) -> Option<&'l str> {
    let rest = line.strip_prefix(field)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
