// Newline framing over arbitrary network chunks

/// Reassembles newline-delimited records split across reads.
///
/// A record longer than `max_line_bytes` is discarded up to its newline.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_bytes: usize,
    discarding: bool,
    dropped: usize,
}

impl LineBuffer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes,
            discarding: false,
            dropped: 0,
        }
    }

    /// Feed one chunk, returning every record it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            if self.discarding {
                self.discarding = false;
            } else if self.pending.len() + head.len() > self.max_line_bytes {
                self.dropped += 1;
                self.pending.clear();
            } else {
                self.pending.extend_from_slice(head);
                lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                self.pending.clear();
            }
            rest = &tail[1..];
        }

        if !self.discarding {
            if self.pending.len() + rest.len() > self.max_line_bytes {
                self.dropped += 1;
                self.pending.clear();
                self.discarding = true;
            } else {
                self.pending.extend_from_slice(rest);
            }
        }

        lines
    }

    /// Trailing record without a final newline
    pub fn finish(&mut self) -> Option<String> {
        self.discarding = false;
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }

    /// Number of oversized records thrown away
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_complete_lines() {
        let mut buf = LineBuffer::new(1024);
        assert_eq!(buf.push(b"a\nb\n"), vec!["a", "b"]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_joins_across_chunks() {
        let mut buf = LineBuffer::new(1024);
        assert!(buf.push(b"{\"mess").is_empty());
        assert_eq!(buf.push(b"age\":1}\n{\"x"), vec!["{\"message\":1}"]);
        assert_eq!(buf.finish().as_deref(), Some("{\"x"));
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "héllo\n".as_bytes();
        let mut buf = LineBuffer::new(1024);
        assert!(buf.push(&text[..2]).is_empty());
        assert_eq!(buf.push(&text[2..]), vec!["héllo"]);
    }

    #[test]
    fn test_oversized_line_dropped() {
        let mut buf = LineBuffer::new(4);
        assert!(buf.push(b"abcdefgh").is_empty());
        assert!(buf.push(b"ij\nok\n") == vec!["ok"]);
        assert_eq!(buf.dropped(), 1);
    }
}
