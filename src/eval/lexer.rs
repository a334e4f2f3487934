//! Hand-written lexer for the expression language.

use crate::error::{HdfScanError, Result};

/// Python keywords that the expression grammar does not support.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "except", "finally", "for", "from", "global", "import", "is", "lambda", "nonlocal", "pass",
    "raise", "return", "try", "while", "with", "yield",
];

/// Token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal with escapes resolved.
    Str(String),
    /// Identifier.
    Name(String),
    // keywords
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,
    /// `in`
    In,
    /// `if`
    If,
    /// `else`
    Else,
    /// `True`
    True,
    /// `False`
    False,
    /// `None`
    None,
    /// Python keyword outside the grammar, such as `lambda`.
    Keyword(String),
    // operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    DoubleStar,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `%`
    Percent,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `~`
    Tilde,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `=`, only valid for keyword arguments.
    Assign,
    // punctuation
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// End of input.
    Eof,
}

/// A token and its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was read.
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub pos: usize,
}

/// Lexer that converts expression text into tokens.
#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Lexer over `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the entire source. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(b) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos: start,
                });
                return Ok(tokens);
            };

            let kind = match b {
                b'0'..=b'9' => self.lex_number()?,
                b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_number()?,
                b'\'' | b'"' => self.lex_string(b'\0')?,
                b if b == b'_' || b.is_ascii_alphabetic() || b >= 0x80 => {
                    if let Some(prefix) = self.string_prefix() {
                        self.pos += prefix;
                        let raw = self.source[start..self.pos].to_ascii_lowercase().contains('r');
                        self.lex_string(if raw { b'r' } else { b'\0' })?
                    } else {
                        self.lex_name()
                    }
                },
                _ => self.lex_operator()?,
            };
            tokens.push(Token { kind, pos: start });
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error(&self, pos: usize, message: impl Into<String>) -> HdfScanError {
        HdfScanError::syntax(self.source, pos, message)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Length of a string prefix (`r`, `b`, `rb`, ...) directly followed by a quote.
    fn string_prefix(&self) -> Option<usize> {
        let mut len = 0;
        while let Some(b) = self.peek_at(len) {
            match b {
                b'r' | b'R' | b'b' | b'B' | b'u' | b'U' if len < 2 => len += 1,
                b'\'' | b'"' if len > 0 => return Some(len),
                _ => return None,
            }
        }
        None
    }

    fn lex_number(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' | b'_' => self.pos += 1,
                b'.' if !is_float => {
                    is_float = true;
                    self.pos += 1;
                },
                b'e' | b'E' => {
                    let sign = matches!(self.peek_at(1), Some(b'+') | Some(b'-'));
                    let digit_at = if sign { 2 } else { 1 };
                    if !self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                        break;
                    }
                    is_float = true;
                    self.pos += digit_at;
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    break;
                },
                _ => break,
            }
        }
        let text = self.source[start..self.pos].replace('_', "");
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error(start, format!("invalid number '{}'", text)))
        } else {
            match text.parse::<i64>() {
                Ok(i) => Ok(TokenKind::Int(i)),
                // too large for i64; keep it as a float like a big Python int would compare
                Err(_) => text
                    .parse::<f64>()
                    .map(TokenKind::Float)
                    .map_err(|_| self.error(start, format!("invalid number '{}'", text))),
            }
        }
    }

    fn lex_string(&mut self, prefix: u8) -> Result<TokenKind> {
        let start = self.pos;
        let quote = self.bytes[self.pos];
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut out = String::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(self.error(start, "unterminated string literal"));
            };
            if b == quote {
                if !triple {
                    self.pos += 1;
                    return Ok(TokenKind::Str(out));
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    return Ok(TokenKind::Str(out));
                }
            }
            if b == b'\n' && !triple {
                return Err(self.error(start, "unterminated string literal"));
            }
            if b == b'\\' && prefix != b'r' {
                let escaped = self.peek_at(1);
                self.pos += 2;
                match escaped {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'r') => out.push('\r'),
                    Some(b'0') => out.push('\0'),
                    Some(b'\\') => out.push('\\'),
                    Some(b'\'') => out.push('\''),
                    Some(b'"') => out.push('"'),
                    Some(b'\n') => {},
                    Some(_) => {
                        // unknown escapes are kept verbatim
                        self.pos -= 1;
                        out.push('\\');
                    },
                    None => return Err(self.error(start, "unterminated string literal")),
                }
                continue;
            }
            let ch = self.source[self.pos..].chars().next().unwrap_or('\u{fffd}');
            out.push(ch);
            self.pos += ch.len_utf8();
        }
    }

    fn lex_name(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(ch) = self.source[self.pos..].chars().next() {
            if ch == '_' || ch.is_alphanumeric() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        let word = &self.source[start..self.pos];
        match word {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            w if UNSUPPORTED_KEYWORDS.contains(&w) => TokenKind::Keyword(w.to_string()),
            w => TokenKind::Name(w.to_string()),
        }
    }

    fn lex_operator(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let b = self.bytes[self.pos];
        let next = self.peek_at(1);
        let (kind, len) = match (b, next) {
            (b'*', Some(b'*')) => (TokenKind::DoubleStar, 2),
            (b'/', Some(b'/')) => (TokenKind::DoubleSlash, 2),
            (b'<', Some(b'=')) => (TokenKind::Le, 2),
            (b'>', Some(b'=')) => (TokenKind::Ge, 2),
            (b'=', Some(b'=')) => (TokenKind::EqEq, 2),
            (b'!', Some(b'=')) => (TokenKind::NotEq, 2),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            (b'&', _) => (TokenKind::Amp, 1),
            (b'|', _) => (TokenKind::Pipe, 1),
            (b'~', _) => (TokenKind::Tilde, 1),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'=', _) => (TokenKind::Assign, 1),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            (b'[', _) => (TokenKind::LBracket, 1),
            (b']', _) => (TokenKind::RBracket, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b':', _) => (TokenKind::Colon, 1),
            (b'.', _) => (TokenKind::Dot, 1),
            _ => {
                let ch = self.source[start..].chars().next().unwrap_or('?');
                return Err(self.error(start, format!("unexpected character '{}'", ch)));
            },
        };
        self.pos += len;
        Ok(kind)
    }
}

/// Tokenize `source`.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_method_call_tokens() {
        assert_eq!(
            kinds("eta.max()"),
            vec![
                TokenKind::Name("eta".to_string()),
                TokenKind::Dot,
                TokenKind::Name("max".to_string()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 1_000"),
            vec![
                TokenKind::Int(1),
                TokenKind::Float(2.5),
                TokenKind::Float(0.5),
                TokenKind::Float(1000.0),
                TokenKind::Int(1000),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'a\'b' "c\n" r'\d'"#),
            vec![
                TokenKind::Str("a'b".to_string()),
                TokenKind::Str("c\n".to_string()),
                TokenKind::Str("\\d".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a**2 // 3 != b"),
            vec![
                TokenKind::Name("a".to_string()),
                TokenKind::DoubleStar,
                TokenKind::Int(2),
                TokenKind::DoubleSlash,
                TokenKind::Int(3),
                TokenKind::NotEq,
                TokenKind::Name("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unsupported_keyword_is_a_token() {
        assert_eq!(kinds("lambda")[0], TokenKind::Keyword("lambda".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("'abc"),
            Err(HdfScanError::Syntax { position: 0, .. })
        ));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(matches!(
            tokenize("a $ b"),
            Err(HdfScanError::Syntax { position: 2, .. })
        ));
    }
}
