//! While lexer: converts source text into tokens.
//!
//! One pass, left to right, no backtracking. Each position is dispatched on
//! its first character; two-character operators are matched greedily. Token
//! `start` offsets are character offsets into the input and are monotone
//! non-decreasing across the output.

use wlc_syntax::error::{err, ErrorKind, Result};
use wlc_syntax::span::Span;
use wlc_syntax::token::{Token, TokenKind};

const OPERATOR_STARTS: &str = ",()[]{}+-*/%!=<>:;&|.";

/// Streaming character scanner producing tokens with source offsets.
pub struct Lexer {
    src: Vec<char>,
    pos: usize,
}

impl Lexer {
    /// Create a new lexer over the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            src: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn text(&self, start: usize) -> String {
        self.src[start..self.pos].iter().collect()
    }

    fn error_at<T>(&self, pos: usize, msg: impl Into<String>) -> Result<T> {
        err(ErrorKind::Lexical, msg, Span::new(pos, pos))
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                tokens.push(self.scan_number());
            } else if c == '"' {
                tokens.push(self.scan_string()?);
            } else if c == '\'' {
                tokens.push(self.scan_char()?);
            } else if OPERATOR_STARTS.contains(c) {
                tokens.push(self.scan_operator()?);
            } else if c.is_alphabetic() || c == '_' {
                tokens.push(self.scan_ident_or_keyword());
            } else if c.is_whitespace() {
                self.pos += 1;
            } else {
                return self.error_at(self.pos, format!("unexpected character '{}'", c));
            }
        }
        Ok(tokens)
    }

    /// Scan a maximal digit run. The value is folded into an `i32` with
    /// wrapping arithmetic, so the literal denotes its low 32 bits.
    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        let mut value: i32 = 0;
        while let Some(c) = self.peek() {
            match c.to_digit(10) {
                Some(d) => {
                    value = value.wrapping_mul(10).wrapping_add(d as i32);
                    self.pos += 1;
                }
                None => break,
            }
        }
        Token::new(TokenKind::Number(value), self.text(start), start)
    }

    fn scan_ident_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = self.text(start);
        let kind = match TokenKind::keyword(&text) {
            Some(k) => k,
            None => TokenKind::Ident(text.clone()),
        };
        Token::new(kind, text, start)
    }

    /// Scan a string literal. The literal runs to the next unescaped `"`.
    fn scan_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut value = String::new();
        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => return self.error_at(self.pos.saturating_sub(1), "unterminated string"),
            };
            self.pos += 1;
            match c {
                '"' => break,
                '\\' => value.push(self.scan_escape()?),
                other => value.push(other),
            }
        }
        Ok(Token::new(TokenKind::StrLit(value), self.text(start), start))
    }

    /// Scan the escape following a backslash inside a string literal.
    fn scan_escape(&mut self) -> Result<char> {
        let at = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return self.error_at(at.saturating_sub(1), "unterminated string"),
        };
        self.pos += 1;
        let decoded = match c {
            'b' => '\u{0008}',
            't' => '\t',
            'n' => '\n',
            'f' => '\u{000C}',
            'r' => '\r',
            '"' => '"',
            '\'' => '\'',
            '\\' => '\\',
            'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let h = match self.peek().and_then(|c| c.to_digit(16)) {
                        Some(h) => h,
                        None => return self.error_at(self.pos, "invalid unicode escape"),
                    };
                    code = code * 16 + h;
                    self.pos += 1;
                }
                match char::from_u32(code) {
                    Some(c) => c,
                    None => return self.error_at(at, "invalid unicode escape"),
                }
            }
            _ => return self.error_at(at, "unknown escape character"),
        };
        Ok(decoded)
    }

    /// Scan a character literal: one character or one of the escapes `\t`,
    /// `\n`, then a closing quote.
    fn scan_char(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let value = match self.peek() {
            None => return self.error_at(start, "unterminated character constant"),
            Some('\'') => return self.error_at(start, "empty character constant"),
            Some('\\') => {
                self.pos += 1;
                let esc = match self.peek() {
                    Some('t') => '\t',
                    Some('n') => '\n',
                    _ => return self.error_at(self.pos, "unrecognised escape character"),
                };
                self.pos += 1;
                esc
            }
            Some(c) => {
                self.pos += 1;
                c
            }
        };
        if self.peek() != Some('\'') {
            return self.error_at(self.pos, "unexpected end-of-character");
        }
        self.pos += 1;
        Ok(Token::new(TokenKind::CharLit(value), self.text(start), start))
    }

    fn scan_operator(&mut self) -> Result<Token> {
        let start = self.pos;
        let c = self.peek().unwrap_or('\0');
        let two = |lexer: &mut Lexer, kind: TokenKind| {
            lexer.pos += 2;
            Token::new(kind, lexer.text(start), start)
        };
        let one = |lexer: &mut Lexer, kind: TokenKind| {
            lexer.pos += 1;
            Token::new(kind, lexer.text(start), start)
        };
        let tok = match c {
            ',' => one(self, TokenKind::Comma),
            ':' => one(self, TokenKind::Colon),
            ';' => one(self, TokenKind::SemiColon),
            '.' => one(self, TokenKind::Dot),
            '(' => one(self, TokenKind::LParen),
            ')' => one(self, TokenKind::RParen),
            '[' => one(self, TokenKind::LBracket),
            ']' => one(self, TokenKind::RBracket),
            '{' => one(self, TokenKind::LBrace),
            '}' => one(self, TokenKind::RBrace),
            '+' => one(self, TokenKind::Plus),
            '-' => one(self, TokenKind::Minus),
            '*' => one(self, TokenKind::Star),
            '/' => one(self, TokenKind::Slash),
            '%' => one(self, TokenKind::Percent),
            '=' => {
                if self.peek_next() == Some('=') {
                    two(self, TokenKind::EqEq)
                } else {
                    one(self, TokenKind::Equal)
                }
            }
            '!' => {
                if self.peek_next() == Some('=') {
                    two(self, TokenKind::NotEq)
                } else {
                    one(self, TokenKind::Bang)
                }
            }
            '<' => {
                if self.peek_next() == Some('=') {
                    two(self, TokenKind::LessEq)
                } else {
                    one(self, TokenKind::Less)
                }
            }
            '>' => {
                if self.peek_next() == Some('=') {
                    two(self, TokenKind::GreaterEq)
                } else {
                    one(self, TokenKind::Greater)
                }
            }
            '&' => {
                if self.peek_next() == Some('&') {
                    two(self, TokenKind::AndAnd)
                } else {
                    return self.error_at(start, "unknown operator '&'");
                }
            }
            '|' => {
                if self.peek_next() == Some('|') {
                    two(self, TokenKind::OrOr)
                } else {
                    one(self, TokenKind::Bar)
                }
            }
            other => {
                return self.error_at(start, format!("unknown operator '{}'", other));
            }
        };
        Ok(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlc_syntax::error::ErrorKind;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().expect("lexing should succeed")
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).into_iter().map(|t| t.kind).collect()
    }

    fn lex_err(input: &str) -> wlc_syntax::Diagnostic {
        Lexer::new(input).tokenize().expect_err("expected lex error")
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        assert_eq!(
            kinds("while whileish _x"),
            vec![
                TokenKind::While,
                TokenKind::Ident("whileish".into()),
                TokenKind::Ident("_x".into()),
            ]
        );
    }

    #[test]
    fn null_is_an_identifier() {
        assert_eq!(kinds("null"), vec![TokenKind::Ident("null".into())]);
    }

    #[test]
    fn scans_numbers() {
        assert_eq!(kinds("0 42"), vec![TokenKind::Number(0), TokenKind::Number(42)]);
    }

    #[test]
    fn number_overflow_wraps_to_low_bits() {
        assert_eq!(kinds("2147483648"), vec![TokenKind::Number(-2147483648)]);
        assert_eq!(kinds("4294967296"), vec![TokenKind::Number(0)]);
    }

    #[test]
    fn two_char_operators_win() {
        assert_eq!(
            kinds("== = <= < >= > != ! && ||"),
            vec![
                TokenKind::EqEq,
                TokenKind::Equal,
                TokenKind::LessEq,
                TokenKind::Less,
                TokenKind::GreaterEq,
                TokenKind::Greater,
                TokenKind::NotEq,
                TokenKind::Bang,
                TokenKind::AndAnd,
                TokenKind::OrOr,
            ]
        );
    }

    #[test]
    fn lone_bar_is_lengthof_delimiter() {
        assert_eq!(
            kinds("|xs|"),
            vec![
                TokenKind::Bar,
                TokenKind::Ident("xs".into()),
                TokenKind::Bar,
            ]
        );
    }

    #[test]
    fn lone_ampersand_is_rejected() {
        let d = lex_err("a & b");
        assert_eq!(d.kind, ErrorKind::Lexical);
        assert_eq!(d.span.start, 2);
    }

    #[test]
    fn tracks_offsets_and_text() {
        let toks = lex("if (x) {");
        let starts: Vec<usize> = toks.iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![0, 3, 4, 5, 7]);
        assert_eq!(toks[0].text, "if");
        assert_eq!(toks[0].end(), 1);
    }

    #[test]
    fn string_escapes_decode() {
        let toks = lex(r#""a\tb\n\"q\" A""#);
        match &toks[0].kind {
            TokenKind::StrLit(s) => assert_eq!(s, "a\tb\n\"q\" A"),
            other => panic!("expected string, got {:?}", other),
        }
        // raw text keeps the quotes and escapes
        assert_eq!(toks[0].text, r#""a\tb\n\"q\" A""#);
    }

    #[test]
    fn escaped_quote_does_not_terminate() {
        let toks = lex(r#""a\"b""#);
        match &toks[0].kind {
            TokenKind::StrLit(s) => assert_eq!(s, "a\"b"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn unterminated_string_is_rejected() {
        assert_eq!(lex_err("\"abc").kind, ErrorKind::Lexical);
    }

    #[test]
    fn unknown_string_escape_is_rejected() {
        assert_eq!(lex_err(r#""\q""#).kind, ErrorKind::Lexical);
    }

    #[test]
    fn char_literals() {
        assert_eq!(kinds("'a'"), vec![TokenKind::CharLit('a')]);
        assert_eq!(kinds(r"'\n'"), vec![TokenKind::CharLit('\n')]);
        assert_eq!(kinds(r"'\t'"), vec![TokenKind::CharLit('\t')]);
    }

    #[test]
    fn bad_char_literals_are_rejected() {
        assert_eq!(lex_err("''").kind, ErrorKind::Lexical);
        assert_eq!(lex_err(r"'\r'").kind, ErrorKind::Lexical);
        assert_eq!(lex_err("'ab'").kind, ErrorKind::Lexical);
        assert_eq!(lex_err("'a").kind, ErrorKind::Lexical);
    }

    #[test]
    fn unknown_character_is_rejected() {
        let d = lex_err("int x = #;");
        assert_eq!(d.kind, ErrorKind::Lexical);
        assert_eq!(d.span.start, 8);
    }

    #[test]
    fn whitespace_is_skipped() {
        assert_eq!(kinds(" \t\n  int \n"), vec![TokenKind::Int]);
    }
}
