//! Tokenizer for rule expressions.

use dbpulse_core::errors::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    None,
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the source.
    pub offset: usize,
}

/// Split an expression into tokens. The last token is always `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let kind = match c {
            b'(' => single(&mut pos, TokenKind::LParen),
            b')' => single(&mut pos, TokenKind::RParen),
            b'[' => single(&mut pos, TokenKind::LBracket),
            b']' => single(&mut pos, TokenKind::RBracket),
            b',' => single(&mut pos, TokenKind::Comma),
            b'+' => single(&mut pos, TokenKind::Plus),
            b'-' => single(&mut pos, TokenKind::Minus),
            b'*' => single(&mut pos, TokenKind::Star),
            b'%' => single(&mut pos, TokenKind::Percent),
            b'/' => {
                if bytes.get(pos + 1) == Some(&b'/') {
                    pos += 2;
                    TokenKind::DoubleSlash
                } else {
                    single(&mut pos, TokenKind::Slash)
                }
            }
            b'=' | b'!' | b'<' | b'>' => {
                let has_eq = bytes.get(pos + 1) == Some(&b'=');
                pos += if has_eq { 2 } else { 1 };
                match (c, has_eq) {
                    (b'=', true) => TokenKind::EqEq,
                    (b'!', true) => TokenKind::NotEq,
                    (b'<', true) => TokenKind::Le,
                    (b'<', false) => TokenKind::Lt,
                    (b'>', true) => TokenKind::Ge,
                    (b'>', false) => TokenKind::Gt,
                    _ => {
                        return Err(syntax(start, format!("unexpected '{}'", c as char)));
                    }
                }
            }
            b'\'' | b'"' => lex_string(source, &mut pos)?,
            b'.' if !bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                single(&mut pos, TokenKind::Dot)
            }
            b'0'..=b'9' | b'.' => lex_number(source, &mut pos)?,
            c if c == b'_' || c.is_ascii_alphabetic() => lex_word(source, &mut pos),
            _ => {
                let ch = source[start..].chars().next().unwrap_or('?');
                return Err(syntax(start, format!("unexpected character '{ch}'")));
            }
        };

        tokens.push(Token { kind, offset: start });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: bytes.len(),
    });
    Ok(tokens)
}

fn single(pos: &mut usize, kind: TokenKind) -> TokenKind {
    *pos += 1;
    kind
}

fn syntax(offset: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        offset,
        message: message.into(),
    }
}

fn lex_word(source: &str, pos: &mut usize) -> TokenKind {
    let bytes = source.as_bytes();
    let start = *pos;
    while *pos < bytes.len() && (bytes[*pos] == b'_' || bytes[*pos].is_ascii_alphanumeric()) {
        *pos += 1;
    }
    match &source[start..*pos] {
        "True" => TokenKind::True,
        "False" => TokenKind::False,
        "None" => TokenKind::None,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "is" => TokenKind::Is,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        word => TokenKind::Ident(word.to_string()),
    }
}

fn lex_number(source: &str, pos: &mut usize) -> Result<TokenKind, ExpressionError> {
    let bytes = source.as_bytes();
    let start = *pos;
    let mut is_float = false;

    while *pos < bytes.len() {
        match bytes[*pos] {
            b'0'..=b'9' | b'_' => *pos += 1,
            b'.' if !is_float => {
                is_float = true;
                *pos += 1;
            }
            b'e' | b'E' => {
                is_float = true;
                *pos += 1;
                if matches!(bytes.get(*pos), Some(b'+') | Some(b'-')) {
                    *pos += 1;
                }
            }
            _ => break,
        }
    }

    let text: String = source[start..*pos].chars().filter(|c| *c != '_').collect();
    if is_float {
        text.parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| syntax(start, format!("invalid number '{text}'")))
    } else {
        text.parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| syntax(start, format!("invalid integer '{text}'")))
    }
}

fn lex_string(source: &str, pos: &mut usize) -> Result<TokenKind, ExpressionError> {
    let start = *pos;
    let mut chars = source[start..].char_indices();
    let (_, quote) = chars.next().unwrap_or((0, '\''));
    let mut out = String::new();

    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or_else(|| syntax(start, "unterminated string"))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            c if c == quote => {
                *pos = start + i + c.len_utf8();
                return Ok(TokenKind::Str(out));
            }
            c => out.push(c),
        }
    }

    Err(syntax(start, "unterminated string"))
}
