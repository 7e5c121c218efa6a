// src/template/lexer.rs

//! Tokenizer for expressions inside `${ ... }` interpolation holes

use super::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Assign,
    EqEq,
    NotEq,
    Question,
    Dot,
    Str(String),
    Number(f64),
    Ident(String),
    Eof,
}

/// Token with the byte offset where it starts in the template
#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) struct Lexer<'a> {
    template: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Start lexing `template` at byte offset `pos`
    pub fn new(template: &'a str, pos: usize) -> Self {
        Self { template, pos }
    }

    /// Byte offset just past the last consumed token
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<char> {
        self.template[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            template: self.template.to_string(),
            offset,
            message: message.into(),
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned, TemplateError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }

        let offset = self.pos;
        let Some(c) = self.bump() else {
            return Ok(Spanned {
                token: Token::Eof,
                offset,
            });
        };

        let token = match c {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '?' => Token::Question,
            '.' => Token::Dot,
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::NotEq
                } else {
                    return Err(self.error(offset, "unexpected '!'"));
                }
            }
            '"' => self.string(offset)?,
            c if c.is_ascii_digit() => self.number(offset)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '-' {
                        ident.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }
            other => return Err(self.error(offset, format!("unexpected character '{}'", other))),
        };

        Ok(Spanned { token, offset })
    }

    fn string(&mut self, start: usize) -> Result<Token, TemplateError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error(start, "unterminated string literal")),
                Some('"') => return Ok(Token::Str(value)),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => {
                        return Err(self.error(
                            self.pos - other.len_utf8() - 1,
                            format!("invalid escape sequence '\\{}'", other),
                        ));
                    }
                    None => return Err(self.error(start, "unterminated string literal")),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, TemplateError> {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.template[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(start, format!("invalid number '{}'", text)))
    }
}
