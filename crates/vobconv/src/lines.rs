use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Lazy sequence of lines read from an ffmpeg output stream
///
/// ffmpeg terminates its status lines with `\r` and everything else with
/// `\n`, so both count as line endings here. Empty lines are skipped and
/// invalid UTF-8 is replaced. The sequence ends at EOF and cannot be restarted.
pub struct DiagnosticLines<R> {
    reader: R,
    pending: Vec<u8>,
    done: bool,
}

impl<R: AsyncBufRead + Unpin> DiagnosticLines<R> {
    pub fn new(reader: R) -> Self {
        DiagnosticLines {
            reader,
            pending: Vec::new(),
            done: false,
        }
    }

    /// Next non-empty line, or `None` at end of stream
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        while !self.done {
            let (found, used) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    self.done = true;
                    (false, 0)
                } else if let Some(pos) = available.iter().position(|&b| b == b'\r' || b == b'\n') {
                    self.pending.extend_from_slice(&available[..pos]);
                    (true, pos + 1)
                } else {
                    self.pending.extend_from_slice(available);
                    (false, available.len())
                }
            };
            self.reader.consume(used);

            if found && !self.pending.is_empty() {
                return Ok(Some(self.take_pending()));
            }
        }

        if self.pending.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.take_pending()))
        }
    }

    fn take_pending(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &[u8]) -> Vec<String> {
        let mut lines = DiagnosticLines::new(input);
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_splits_on_carriage_return_and_newline() {
        let input = b"Input #0, mpeg\n  Duration: 00:00:10.00, start: 0\nframe=1 time=00:00:01.00\rframe=2 time=00:00:02.00\r\n";
        assert_eq!(
            collect(input).await,
            vec![
                "Input #0, mpeg",
                "  Duration: 00:00:10.00, start: 0",
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00",
            ]
        );
    }

    #[tokio::test]
    async fn test_trailing_line_without_terminator() {
        assert_eq!(collect(b"a\nb").await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        assert!(collect(b"").await.is_empty());
        assert!(collect(b"\r\n\n\r").await.is_empty());
    }

    #[tokio::test]
    async fn test_lines_spanning_buffer_refills() {
        let long = "x".repeat(20_000);
        let input = format!("{}\r{}\n", long, "tail");
        let reader = tokio::io::BufReader::with_capacity(64, input.as_bytes());
        let mut lines = DiagnosticLines::new(reader);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some(long.as_str()));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("tail"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
