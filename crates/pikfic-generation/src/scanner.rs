//! Tolerant incremental extraction of the episode prose from a partial body.
//!
//! The scanner only ever looks at the top-level `"content"` string. Output is
//! advisory display text; the complete body is still parsed strictly once the
//! stream ends.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Key,
    Content,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Escape {
    None,
    Backslash,
    Unicode(String),
}

/// Streaming decoder for the `content` field of an episode object.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    depth: usize,
    string: Option<StringKind>,
    escape: Escape,
    high_surrogate: Option<u32>,
    expecting_key: bool,
    key: String,
    last_key: Option<String>,
    content: String,
}

impl Default for ContentScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentScanner {
    /// Empty scanner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            depth: 0,
            string: None,
            escape: Escape::None,
            high_surrogate: None,
            expecting_key: false,
            key: String::new(),
            last_key: None,
            content: String::new(),
        }
    }

    /// Prose decoded so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Feeds the next chunk. Returns `true` when the prose grew.
    pub fn push(&mut self, chunk: &str) -> bool {
        let before = self.content.len();
        for c in chunk.chars() {
            match self.string {
                Some(kind) => self.string_char(kind, c),
                None => self.structural_char(c),
            }
        }
        self.content.len() > before
    }

    fn structural_char(&mut self, c: char) {
        match c {
            '{' => {
                self.depth += 1;
                if self.depth == 1 {
                    self.expecting_key = true;
                }
            }
            '[' => self.depth += 1,
            '}' | ']' => self.depth = self.depth.saturating_sub(1),
            ',' if self.depth == 1 => {
                self.expecting_key = true;
                self.last_key = None;
            }
            '"' => {
                let kind = if self.depth != 1 {
                    StringKind::Other
                } else if self.expecting_key {
                    self.key.clear();
                    StringKind::Key
                } else if self.last_key.as_deref() == Some("content") {
                    self.content.clear();
                    StringKind::Content
                } else {
                    StringKind::Other
                };
                self.string = Some(kind);
            }
            _ => {}
        }
    }

    fn string_char(&mut self, kind: StringKind, c: char) {
        match std::mem::replace(&mut self.escape, Escape::None) {
            Escape::Backslash => {
                let decoded = match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'b' => '\u{8}',
                    'f' => '\u{c}',
                    'u' => {
                        self.escape = Escape::Unicode(String::with_capacity(4));
                        return;
                    }
                    other => other,
                };
                self.emit(kind, decoded);
            }
            Escape::Unicode(mut digits) => {
                digits.push(c);
                if digits.len() < 4 {
                    self.escape = Escape::Unicode(digits);
                    return;
                }
                if let Ok(unit) = u32::from_str_radix(&digits, 16) {
                    self.unicode_unit(kind, unit);
                }
            }
            Escape::None => match c {
                '\\' => self.escape = Escape::Backslash,
                '"' => self.close_string(kind),
                other => self.emit(kind, other),
            },
        }
    }

    fn unicode_unit(&mut self, kind: StringKind, unit: u32) {
        match unit {
            0xD800..=0xDBFF => self.high_surrogate = Some(unit),
            0xDC00..=0xDFFF => {
                if let Some(high) = self.high_surrogate.take() {
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                    if let Some(decoded) = char::from_u32(combined) {
                        self.emit(kind, decoded);
                    }
                }
            }
            _ => {
                self.high_surrogate = None;
                if let Some(decoded) = char::from_u32(unit) {
                    self.emit(kind, decoded);
                }
            }
        }
    }

    fn close_string(&mut self, kind: StringKind) {
        self.string = None;
        match kind {
            StringKind::Key => {
                self.expecting_key = false;
                self.last_key = Some(std::mem::take(&mut self.key));
            }
            StringKind::Content | StringKind::Other => {
                if self.depth == 1 {
                    self.last_key = None;
                }
            }
        }
    }

    fn emit(&mut self, kind: StringKind, c: char) {
        match kind {
            StringKind::Key => self.key.push(c),
            StringKind::Content => self.content.push(c),
            StringKind::Other => {}
        }
    }
}
