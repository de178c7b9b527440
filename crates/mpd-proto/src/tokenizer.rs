//! Line framing and argument tokenizing.
//!
//! Bytes arrive in arbitrary chunks; [`LineBuffer`] keeps the tail of an unfinished line
//! between reads and yields complete lines. [`tokenize`] then splits one line into
//! arguments, honoring double-quoted arguments with `\"` / `\\` escapes.

use std::fmt;

/// Longest line accepted before the peer is considered broken.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Inbound byte accumulator for one client.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held that do not yet form a complete line.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True when the pending partial line exceeds [`MAX_LINE_BYTES`].
    pub fn overflowed(&self) -> bool {
        self.buf.len() > MAX_LINE_BYTES && !self.buf.contains(&b'\n')
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Pop the next complete line, without its `\n` (and an optional `\r` before it).
    ///
    /// Invalid UTF-8 is replaced rather than rejected so one bad byte cannot wedge a session.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Failure to split a command line into arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    /// A quoted argument was not closed before the end of the line.
    UnterminatedQuote,
    /// A closing quote was followed by something other than whitespace.
    TrailingGarbage,
}

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizeError::UnterminatedQuote => f.write_str("Missing closing '\"'"),
            TokenizeError::TrailingGarbage => f.write_str("Space expected after closing '\"'"),
        }
    }
}

impl std::error::Error for TokenizeError {}

/// Split one command line on unquoted whitespace.
///
/// A token starting with `"` runs to the matching unescaped `"` and may contain spaces;
/// inside quotes `\"` and `\\` stand for the escaped character. Returns an empty vector for
/// a blank line.
pub fn tokenize(line: &str) -> Result<Vec<String>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => token.push(escaped),
                        None => return Err(TokenizeError::UnterminatedQuote),
                    },
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => token.push(other),
                }
            }
            if !closed {
                return Err(TokenizeError::UnterminatedQuote);
            }
            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                return Err(TokenizeError::TrailingGarbage);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_holds_partial_lines_between_reads() {
        let mut buf = LineBuffer::new();
        buf.extend(b"sta");
        assert_eq!(buf.next_line(), None);
        buf.extend(b"tus\r\nping\npa");
        assert_eq!(buf.next_line().as_deref(), Some("status"));
        assert_eq!(buf.next_line().as_deref(), Some("ping"));
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn line_buffer_reports_overflow_without_newline() {
        let mut buf = LineBuffer::new();
        buf.extend(&vec![b'a'; MAX_LINE_BYTES + 1]);
        assert!(buf.overflowed());
        buf.extend(b"\n");
        assert!(!buf.overflowed());
    }

    #[test]
    fn tokenize_splits_on_whitespace() {
        assert_eq!(
            tokenize("  setvol\t50 ").unwrap(),
            vec!["setvol".to_string(), "50".to_string()]
        );
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn tokenize_keeps_spaces_inside_quotes() {
        assert_eq!(
            tokenize(r#"add "/music/My Song.mp3" 3"#).unwrap(),
            vec!["add", "/music/My Song.mp3", "3"]
        );
    }

    #[test]
    fn tokenize_handles_escapes_and_empty_quotes() {
        assert_eq!(
            tokenize(r#"playlistfind Title "say \"hi\" \\o/" """#).unwrap(),
            vec!["playlistfind", "Title", r#"say "hi" \o/"#, ""]
        );
    }

    #[test]
    fn tokenize_rejects_broken_quotes() {
        assert_eq!(
            tokenize(r#"add "unterminated"#),
            Err(TokenizeError::UnterminatedQuote)
        );
        assert_eq!(tokenize(r#"add "a"b"#), Err(TokenizeError::TrailingGarbage));
    }
}
