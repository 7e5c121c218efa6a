// src/template/mod.rs

//! Mirror address templates
//!
//! A templated mirror computes its location per provider from a string such
//! as:
//!
//! ```text
//! https://mirror.example.com/${namespace}/${type}
//! ${ {"example.com" = "/srv/internal", "registry.opentofu.org" = "/srv/public"}[hostname] }/${type}
//! ${ hostname == "example.com" ? "internal" : "public" }/${namespace}/${type}
//! ```
//!
//! Templates are handled in two stages:
//! - [`MirrorTemplate::parse`] checks syntax when the installation config is
//!   loaded. A syntax error rejects that source before any resolution runs.
//! - [`MirrorTemplate::evaluate`] runs once per provider. A template can be
//!   well-formed and still undefined for some providers (a lookup table with no
//!   entry for their hostname), so evaluation errors belong to that single
//!   call and leave the template usable for every other provider.

mod eval;
mod lexer;
mod parser;

use crate::addrs::PluginIdentity;
use thiserror::Error;

use self::eval::Value;
use self::parser::Parser;

/// Template errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Invalid template {template:?} at offset {offset}: {message}")]
    Syntax {
        template: String,
        offset: usize,
        message: String,
    },

    #[error("Template {template:?} is undefined for provider {provider}: {message}")]
    Evaluation {
        template: String,
        provider: String,
        message: String,
    },
}

/// Variables a template may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Variable {
    Hostname,
    Namespace,
    Type,
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Variable(Variable),
    Object(Vec<(String, Expr)>),
    Index(Box<Expr>, Box<Expr>),
    GetAttr(Box<Expr>, String),
    Equal {
        left: Box<Expr>,
        right: Box<Expr>,
        negate: bool,
    },
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Interpolation(Expr),
}

/// A parsed, not yet evaluated, address template
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorTemplate {
    source: String,
    parts: Vec<Part>,
}

impl MirrorTemplate {
    /// Parse a template, reporting syntax errors independent of any provider
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut pos = 0;

        while pos < source.len() {
            let rest = &source[pos..];
            if rest.starts_with("$${") {
                literal.push_str("${");
                pos += 3;
            } else if rest.starts_with("${") {
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                let (expr, end) = Parser::new(source, pos + 2)?.parse_interpolation()?;
                parts.push(Part::Interpolation(expr));
                pos = end;
            } else {
                let c = rest.chars().next().unwrap_or_default();
                literal.push(c);
                pos += c.len_utf8();
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// Evaluate for one provider
    pub fn evaluate(&self, identity: &PluginIdentity) -> Result<String, TemplateError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Interpolation(expr) => {
                    let value = eval::evaluate(expr, identity)
                        .and_then(|v| v.to_template_string())
                        .map_err(|message| TemplateError::Evaluation {
                            template: self.source.clone(),
                            provider: identity.to_string(),
                            message,
                        })?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }

    /// The template text as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}
