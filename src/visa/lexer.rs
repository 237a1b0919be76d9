use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

/// Tokens of the textual vISA kernel format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Int(u64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Lt,
    Gt,
    Colon,
    Comma,
    Dot,
    Minus,
    Bang,
    /// Instructions and directives are line-terminated.
    Newline,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::Int(n) => format!("integer {}", n),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Bang => "'!'".to_string(),
            Token::Newline => "end of line".to_string(),
            Token::Eof => "end of file".to_string(),
        }
    }
}

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Spanned<Token>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Token::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(start as u32, end as u32)
    }

    fn next_token(&mut self) -> Spanned<Token> {
        loop {
            self.skip_blanks_and_comments();

            if self.pos >= self.source.len() {
                return Spanned::new(Token::Eof, self.span(self.pos, self.pos));
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if ch == b'\n' {
                self.pos += 1;
                return Spanned::new(Token::Newline, self.span(start, self.pos));
            }
            if ch.is_ascii_alphabetic() || ch == b'_' {
                return self.scan_ident();
            }
            if ch.is_ascii_digit() {
                return self.scan_number();
            }

            let tok = match ch {
                b'(' => Some(Token::LParen),
                b')' => Some(Token::RParen),
                b'[' => Some(Token::LBracket),
                b']' => Some(Token::RBracket),
                b'<' => Some(Token::Lt),
                b'>' => Some(Token::Gt),
                b':' => Some(Token::Colon),
                b',' => Some(Token::Comma),
                b'.' => Some(Token::Dot),
                b'-' => Some(Token::Minus),
                b'!' => Some(Token::Bang),
                _ => None,
            };
            self.pos += 1;
            match tok {
                Some(tok) => return Spanned::new(tok, self.span(start, self.pos)),
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("unexpected character '{}'", ch as char),
                        self.span(start, self.pos),
                    ));
                }
            }
        }
    }

    /// Skips spaces, tabs, carriage returns and `//` comments (not newlines).
    fn skip_blanks_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len()
                && self.source[self.pos] != b'\n'
                && self.source[self.pos].is_ascii_whitespace()
            {
                self.pos += 1;
            }
            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn scan_ident(&mut self) -> Spanned<Token> {
        let start = self.pos;
        while self.pos < self.source.len()
            && (self.source[self.pos].is_ascii_alphanumeric() || self.source[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        Spanned::new(Token::Ident(text), self.span(start, self.pos))
    }

    fn scan_number(&mut self) -> Spanned<Token> {
        let start = self.pos;
        let hex = self.source[self.pos] == b'0'
            && self.pos + 1 < self.source.len()
            && matches!(self.source[self.pos + 1], b'x' | b'X');
        if hex {
            self.pos += 2;
        }
        let digits_start = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_hexdigit() {
            if !hex && !self.source[self.pos].is_ascii_digit() {
                break;
            }
            self.pos += 1;
        }
        let digits = String::from_utf8_lossy(&self.source[digits_start..self.pos]).into_owned();
        let radix = if hex { 16 } else { 10 };
        let span = self.span(start, self.pos);
        match u64::from_str_radix(&digits, radix) {
            Ok(n) => Spanned::new(Token::Int(n), span),
            Err(_) => {
                self.diagnostics.push(Diagnostic::error(
                    format!(
                        "invalid integer literal '{}'",
                        String::from_utf8_lossy(&self.source[start..self.pos])
                    ),
                    span,
                ));
                Spanned::new(Token::Int(0), span)
            }
        }
    }
}
