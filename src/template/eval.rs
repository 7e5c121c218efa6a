// src/template/eval.rs

//! Evaluation of parsed template expressions against one provider identity

use std::collections::BTreeMap;
use std::fmt;

use super::{Expr, Variable};
use crate::addrs::PluginIdentity;

/// Runtime value of a template expression
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Object(BTreeMap<String, Value>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Object(_) => "object",
        }
    }

    /// String form used for interpolation and as an object key
    pub fn to_template_string(&self) -> Result<String, String> {
        match self {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Object(_) => Err("cannot use an object value as a string".to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Object(_) => write!(f, "object"),
        }
    }
}

/// Evaluate `expr`, returning a plain message on failure
pub(crate) fn evaluate(expr: &Expr, identity: &PluginIdentity) -> Result<Value, String> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Variable(var) => Ok(Value::String(match var {
            Variable::Hostname => identity.hostname.clone(),
            Variable::Namespace => identity.namespace.clone(),
            Variable::Type => identity.type_name.clone(),
        })),
        Expr::Object(items) => {
            let mut map = BTreeMap::new();
            for (key, value) in items {
                map.insert(key.clone(), evaluate(value, identity)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Index(collection, key) => {
            let collection = evaluate(collection, identity)?;
            let key = evaluate(key, identity)?.to_template_string()?;
            lookup(collection, &key)
        }
        Expr::GetAttr(collection, name) => {
            let collection = evaluate(collection, identity)?;
            lookup(collection, name)
        }
        Expr::Equal {
            left,
            right,
            negate,
        } => {
            let equal = evaluate(left, identity)? == evaluate(right, identity)?;
            Ok(Value::Bool(equal != *negate))
        }
        Expr::Conditional(condition, then, otherwise) => match evaluate(condition, identity)? {
            Value::Bool(true) => evaluate(then, identity),
            Value::Bool(false) => evaluate(otherwise, identity),
            other => Err(format!(
                "condition must be a bool, got {}",
                other.type_name()
            )),
        },
    }
}

fn lookup(collection: Value, key: &str) -> Result<Value, String> {
    match collection {
        Value::Object(mut map) => map
            .remove(key)
            .ok_or_else(|| format!("object has no element with key {:?}", key)),
        other => Err(format!(
            "cannot index a {} value {} with key {:?}",
            other.type_name(),
            other,
            key
        )),
    }
}
