//! Delimiter and wrapper aware scanner.
//!
//! # Responsibility
//! - Split text into free-text spans and configured tokens.
//! - Treat everything between a wrapper's open and close marker as one span.
//!
//! # Invariants
//! - Yielded tokens plus consumed space tokens reconstruct the input exactly.
//! - A close marker preceded by an odd run of escape symbols does not close
//!   its wrapper.
//! - A multi-byte close marker overlapping a longer run closes at the last
//!   match in that run.
//! - An unterminated wrapper runs to the end of input.

/// Scanner tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Matched in order; the first token that matches at the cursor wins.
    pub tokens: Vec<String>,
    /// `(open, close)` pairs.
    pub wrappers: Vec<(String, String)>,
    /// Tokens that separate spans but are never yielded.
    pub space_tokens: Vec<String>,
    pub escape_symbols: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            wrappers: Vec::new(),
            space_tokens: vec![" ".to_string()],
            escape_symbols: Vec::new(),
        }
    }
}

/// Stateful scanner over one attached buffer.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    tokens: Vec<String>,
    wrappers: Vec<(String, String)>,
    space_tokens: Vec<String>,
    escape_symbols: Vec<String>,
    text: String,
    /// Start of the span being accumulated.
    mark: usize,
    cursor: usize,
    /// Token found at `cursor`, consumed on the next scan.
    met_token: Option<String>,
    open_wrapper: Option<usize>,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        let mut tokenizer = Self::default();
        tokenizer.config(config);
        tokenizer
    }

    /// Replaces the scanner tables and rewinds.
    ///
    /// Wrapper markers and space tokens missing from `tokens` are appended.
    pub fn config(&mut self, config: TokenizerConfig) {
        let TokenizerConfig {
            mut tokens,
            wrappers,
            space_tokens,
            escape_symbols,
        } = config;
        let extra = wrappers
            .iter()
            .flat_map(|(open, close)| [open, close])
            .chain(space_tokens.iter());
        for marker in extra {
            if !marker.is_empty() && !tokens.contains(marker) {
                tokens.push(marker.clone());
            }
        }
        tokens.retain(|token| !token.is_empty());

        self.tokens = tokens;
        self.wrappers = wrappers;
        self.space_tokens = space_tokens;
        self.escape_symbols = escape_symbols;
        self.reset();
    }

    /// Attaches a new buffer and rewinds.
    pub fn attach(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.reset();
    }

    pub fn reset(&mut self) {
        self.mark = 0;
        self.cursor = 0;
        self.met_token = None;
        self.open_wrapper = None;
    }

    /// True once every byte of the buffer has been consumed.
    pub fn reaches_end(&self) -> bool {
        self.cursor >= self.text.len() && self.met_token.is_none()
    }

    /// Byte offset where the next token starts.
    pub fn position(&self) -> usize {
        self.mark
    }

    /// Returns the next span or token, `None` at end of input.
    pub fn next_token(&mut self) -> Option<String> {
        loop {
            self.scan();
            if self.cursor > self.mark {
                let token = self.text[self.mark..self.cursor].to_string();
                self.mark = self.cursor;
                return Some(token);
            }
            if self.reaches_end() {
                return None;
            }
        }
    }

    /// Advances `cursor` until the span `[mark, cursor)` is complete.
    fn scan(&mut self) {
        while self.cursor < self.text.len() {
            if let Some(token) = self.met_token.take() {
                self.cursor += token.len();
                if !self.space_tokens.contains(&token) {
                    return;
                }
                self.mark = self.cursor;
                continue;
            }

            if let Some(index) = self.open_wrapper.take() {
                let close = self.wrappers[index].1.clone();
                match self.find_close(&close) {
                    Some(at) => {
                        self.cursor = at;
                        self.met_token = Some(close);
                    }
                    None => self.cursor = self.text.len(),
                }
                return;
            }

            if let Some(token) = self.match_token() {
                self.open_wrapper = self.wrappers.iter().position(|(open, _)| *open == token);
                self.met_token = Some(token);
                return;
            }

            self.cursor += self.text[self.cursor..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
        }
    }

    fn match_token(&self) -> Option<String> {
        let rest = &self.text[self.cursor..];
        self.tokens
            .iter()
            .find(|token| rest.starts_with(token.as_str()))
            .cloned()
    }

    fn find_close(&self, close: &str) -> Option<usize> {
        if close.is_empty() {
            return None;
        }
        let mut from = self.cursor;
        while let Some(found) = self.text[from..].find(close) {
            let mut at = from + found;
            if !self.is_escaped(at) {
                // `""""` closes on its last three quotes.
                while close.len() > 1
                    && self
                        .text
                        .get(at + 1..)
                        .is_some_and(|rest| rest.starts_with(close))
                {
                    at += 1;
                }
                return Some(at);
            }
            from = at + close.len();
        }
        None
    }

    /// True when an odd run of one escape symbol ends right before `at`.
    fn is_escaped(&self, at: usize) -> bool {
        self.escape_symbols
            .iter()
            .filter(|symbol| !symbol.is_empty())
            .any(|symbol| {
                let mut before = &self.text[..at];
                let mut run = 0usize;
                while let Some(rest) = before.strip_suffix(symbol.as_str()) {
                    run += 1;
                    before = rest;
                }
                run % 2 == 1
            })
    }
}

impl Iterator for Tokenizer {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
