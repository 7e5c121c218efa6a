// src/template/parser.rs

//! Recursive-descent parser for template expressions
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr      := equality ( "?" expr ":" expr )?
//! equality  := postfix ( ( "==" | "!=" ) postfix )*
//! postfix   := primary ( "[" expr "]" | "." IDENT )*
//! primary   := STRING | NUMBER | "true" | "false" | VARIABLE
//!            | "{" ( key ( "=" | ":" ) expr ","? )* "}"
//!            | "(" expr ")"
//! key       := IDENT | STRING
//! ```

use super::eval::Value;
use super::lexer::{Lexer, Spanned, Token};
use super::{Expr, TemplateError, Variable};

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    template: &'a str,
    current: Spanned,
}

impl<'a> Parser<'a> {
    pub fn new(template: &'a str, pos: usize) -> Result<Self, TemplateError> {
        let mut lexer = Lexer::new(template, pos);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            template,
            current,
        })
    }

    /// Parse one interpolation body and its closing `}`
    ///
    /// Returns the expression and the byte offset just past the brace.
    pub fn parse_interpolation(mut self) -> Result<(Expr, usize), TemplateError> {
        let expr = self.expr()?;
        match self.current.token {
            Token::RBrace => Ok((expr, self.lexer.position())),
            Token::Eof => Err(self.error("unterminated interpolation, expected '}'")),
            _ => Err(self.error("expected '}' to close interpolation")),
        }
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            template: self.template.to_string(),
            offset: self.current.offset,
            message: message.into(),
        }
    }

    fn advance(&mut self) -> Result<Token, TemplateError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next).token)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), TemplateError> {
        if self.current.token == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expr(&mut self) -> Result<Expr, TemplateError> {
        let condition = self.equality()?;
        if self.current.token != Token::Question {
            return Ok(condition);
        }
        self.advance()?;
        let then = self.expr()?;
        self.expect(Token::Colon, "':' in conditional expression")?;
        let otherwise = self.expr()?;
        Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn equality(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.postfix()?;
        loop {
            let negate = match self.current.token {
                Token::EqEq => false,
                Token::NotEq => true,
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.postfix()?;
            left = Expr::Equal {
                left: Box::new(left),
                right: Box::new(right),
                negate,
            };
        }
    }

    fn postfix(&mut self) -> Result<Expr, TemplateError> {
        let mut expr = self.primary()?;
        loop {
            match self.current.token {
                Token::LBracket => {
                    self.advance()?;
                    let key = self.expr()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                Token::Dot => {
                    self.advance()?;
                    match self.advance()? {
                        Token::Ident(name) => expr = Expr::GetAttr(Box::new(expr), name),
                        _ => return Err(self.error("expected attribute name after '.'")),
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, TemplateError> {
        let offset = self.current.offset;
        match self.advance()? {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "hostname" => Ok(Expr::Variable(Variable::Hostname)),
                "namespace" => Ok(Expr::Variable(Variable::Namespace)),
                "type" => Ok(Expr::Variable(Variable::Type)),
                other => Err(TemplateError::Syntax {
                    template: self.template.to_string(),
                    offset,
                    message: format!(
                        "unknown variable '{}'; only hostname, namespace and type are available",
                        other
                    ),
                }),
            },
            Token::LBrace => self.object(),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Eof => Err(TemplateError::Syntax {
                template: self.template.to_string(),
                offset,
                message: "unexpected end of template, expected an expression".to_string(),
            }),
            _ => Err(TemplateError::Syntax {
                template: self.template.to_string(),
                offset,
                message: "expected an expression".to_string(),
            }),
        }
    }

    fn object(&mut self) -> Result<Expr, TemplateError> {
        let mut items = Vec::new();
        loop {
            let key = match &self.current.token {
                Token::RBrace => {
                    self.advance()?;
                    return Ok(Expr::Object(items));
                }
                Token::Ident(k) | Token::Str(k) => k.clone(),
                _ => return Err(self.error("expected object key or '}'")),
            };
            self.advance()?;

            match self.current.token {
                Token::Assign | Token::Colon => {
                    self.advance()?;
                }
                _ => return Err(self.error("expected '=' or ':' after object key")),
            }

            let value = self.expr()?;
            items.push((key, value));

            if self.current.token == Token::Comma {
                self.advance()?;
            }
        }
    }
}
