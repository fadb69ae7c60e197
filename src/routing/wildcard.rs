//! Wildcard pattern matching.
//!
//! # Responsibilities
//! - Compile glob-like patterns once at build time
//! - Match path-like keys, producing ordered captures
//!
//! # Syntax
//! - `*` matches zero or more characters, never the `/` separator
//! - `**` matches zero or more characters, separators included
//! - `\*` is a literal star, `\\` a literal backslash
//!
//! # Design Decisions
//! - A reachability table over (token, prefix end) is filled left to right,
//!   so matching is linear in tokens times input length with no backtracking
//! - Captures are read off right to left: each wildcard takes the shortest
//!   capture that leaves a matchable prefix
//! - Capture 0 is the whole input, 1..N are the wildcards left to right
//! - Case-sensitive, no normalization

use crate::routing::types::{ResultMap, SitemapError, SitemapResult};

/// Separator a single `*` refuses to cross.
pub const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Star,
    DoubleStar,
}

/// A compiled wildcard pattern. Immutable and shareable across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    source: String,
    tokens: Vec<Token>,
}

impl WildcardPattern {
    /// Compile `pattern`, rejecting malformed escape sequences.
    pub fn compile(pattern: &str) -> SitemapResult<Self> {
        let syntax = |reason: String| SitemapError::PatternSyntax {
            pattern: pattern.to_string(),
            reason,
        };

        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped @ ('*' | '\\')) => literal.push(escaped),
                    Some(other) => return Err(syntax(format!("invalid escape sequence '\\{}'", other))),
                    None => return Err(syntax("dangling escape at end of pattern".to_string())),
                },
                '*' => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        tokens.push(Token::DoubleStar);
                    } else {
                        tokens.push(Token::Star);
                    }
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            source: pattern.to_string(),
            tokens,
        })
    }

    /// The pattern text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of capture groups (excluding group 0).
    pub fn wildcard_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| !matches!(t, Token::Literal(_)))
            .count()
    }

    /// Match `input`, returning the captures on success.
    pub fn matches(&self, input: &str) -> Option<MatchResult> {
        if let Some(Token::Literal(head)) = self.tokens.first() {
            if !input.starts_with(head.as_str()) {
                return None;
            }
        }

        let table = MatchTable::fill(&self.tokens, input);
        if !table.get(self.tokens.len(), input.len()) {
            return None;
        }

        let captures = table.captures(&self.tokens, input);
        let mut groups = Vec::with_capacity(captures.len() + 1);
        groups.push(input.to_string());
        groups.extend(captures.into_iter().map(str::to_string));
        Some(MatchResult { groups })
    }
}

/// Reachability table: cell `(i, end)` is set when the first `i` tokens
/// match `input[..end]`. Only char boundaries are ever set.
struct MatchTable {
    width: usize,
    cells: Vec<bool>,
}

impl MatchTable {
    fn fill(tokens: &[Token], input: &str) -> Self {
        let width = input.len() + 1;
        let mut cells = vec![false; (tokens.len() + 1) * width];
        cells[0] = true;

        for (i, token) in tokens.iter().enumerate() {
            let (done, next) = cells.split_at_mut((i + 1) * width);
            let prev = &done[i * width..];
            let row = &mut next[..width];

            match token {
                Token::Literal(literal) => {
                    for end in literal.len()..width {
                        let start = end - literal.len();
                        row[end] = prev[start] && input.get(start..end) == Some(literal.as_str());
                    }
                }
                Token::Star | Token::DoubleStar => {
                    let crosses = matches!(token, Token::DoubleStar);
                    row[0] = prev[0];
                    for (offset, c) in input.char_indices() {
                        let end = offset + c.len_utf8();
                        let extend = row[offset] && (crosses || c != SEPARATOR);
                        row[end] = prev[end] || extend;
                    }
                }
            }
        }

        Self { width, cells }
    }

    fn get(&self, tokens: usize, end: usize) -> bool {
        self.cells[tokens * self.width + end]
    }

    /// Walk back from a full match, giving each wildcard its shortest capture.
    fn captures<'a>(&self, tokens: &[Token], input: &'a str) -> Vec<&'a str> {
        let mut captures = Vec::new();
        let mut end = input.len();

        for (i, token) in tokens.iter().enumerate().rev() {
            match token {
                Token::Literal(literal) => end -= literal.len(),
                Token::Star | Token::DoubleStar => {
                    // The first prefix the earlier tokens reach; every char
                    // skipped on the way is one the wildcard may take.
                    let start = std::iter::once(end)
                        .chain(input[..end].char_indices().rev().map(|(offset, _)| offset))
                        .find(|&start| self.get(i, start))
                        .unwrap_or(0);
                    captures.push(&input[start..end]);
                    end = start;
                }
            }
        }

        // Discovered right to left.
        captures.reverse();
        captures
    }
}

/// Captures from one successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    groups: Vec<String>,
}

impl MatchResult {
    /// Group `index`; 0 is the whole input.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index).map(String::as_str)
    }

    /// Captured groups 1..N.
    pub fn captures(&self) -> &[String] {
        &self.groups[1..]
    }

    /// Number of groups including group 0.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Keyed form pushed on the result stack: `"0"`, `"1"`, ...
    pub fn into_map(self) -> ResultMap {
        self.groups
            .into_iter()
            .enumerate()
            .map(|(i, group)| (i.to_string(), group))
            .collect()
    }
}
