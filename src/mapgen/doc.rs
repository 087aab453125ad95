//! JSON document accessors
//!
//! A thin wrapper over `serde_json` objects that carries the document
//! context ("mapgen house > place_items[2]") into every error message.
//! The piece/palette syntax is too polymorphic for derive, so loaders walk
//! values through this layer instead.

use super::range::IntRange;
use crate::error::LoadError;
use serde_json::{Map, Value};

/// One JSON object plus the context string naming where it came from.
pub struct Obj<'a> {
    context: String,
    map: &'a Map<String, Value>,
}

impl<'a> Obj<'a> {
    pub fn new(value: &'a Value, context: impl Into<String>) -> Result<Self, LoadError> {
        let context = context.into();
        match value.as_object() {
            Some(map) => Ok(Self { context, map }),
            None => Err(LoadError::Malformed {
                context,
                message: "expected an object".to_string(),
            }),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// A child context, e.g. `self.child_context("rows")`.
    pub fn child_context(&self, part: &str) -> String {
        format!("{} > {}", self.context, part)
    }

    pub fn fail(&self, message: impl Into<String>) -> LoadError {
        LoadError::Malformed {
            context: self.context.clone(),
            message: message.into(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.map.keys().map(String::as_str)
    }

    pub fn str_field(&self, key: &str) -> Result<&'a str, LoadError> {
        self.opt_str(key)?
            .ok_or_else(|| self.fail(format!("missing required string field {key:?}")))
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>, LoadError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.fail(format!("field {key:?} must be a string"))),
        }
    }

    pub fn opt_int(&self, key: &str) -> Result<Option<i64>, LoadError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.fail(format!("field {key:?} must be an integer"))),
        }
    }

    pub fn int_or(&self, key: &str, default: i64) -> Result<i64, LoadError> {
        Ok(self.opt_int(key)?.unwrap_or(default))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, LoadError> {
        match self.map.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.fail(format!("field {key:?} must be a boolean"))),
        }
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, LoadError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.fail(format!("field {key:?} must be a number"))),
        }
    }

    pub fn opt_range(&self, key: &str) -> Result<Option<IntRange>, LoadError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(value) => parse_range(value, &self.child_context(key)).map(Some),
        }
    }

    pub fn range_or(&self, key: &str, default: IntRange) -> Result<IntRange, LoadError> {
        Ok(self.opt_range(key)?.unwrap_or(default))
    }

    pub fn opt_array(&self, key: &str) -> Result<Option<&'a Vec<Value>>, LoadError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(self.fail(format!("field {key:?} must be an array"))),
        }
    }

    pub fn array(&self, key: &str) -> Result<&'a Vec<Value>, LoadError> {
        self.opt_array(key)?
            .ok_or_else(|| self.fail(format!("missing required array field {key:?}")))
    }

    pub fn child(&self, key: &str) -> Result<Obj<'a>, LoadError> {
        let value = self
            .map
            .get(key)
            .ok_or_else(|| self.fail(format!("missing required object field {key:?}")))?;
        Obj::new(value, self.child_context(key))
    }

    pub fn opt_child(&self, key: &str) -> Result<Option<Obj<'a>>, LoadError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(value) => Obj::new(value, self.child_context(key)).map(Some),
        }
    }
}

/// A range literal: `3`, `[3]` or `[1, 4]`.
pub fn parse_range(value: &Value, context: &str) -> Result<IntRange, LoadError> {
    let malformed = || LoadError::Malformed {
        context: context.to_string(),
        message: "expected an integer or a one/two element integer array".to_string(),
    };
    match value {
        Value::Number(n) => {
            let v = n.as_i64().ok_or_else(malformed)? as i32;
            Ok(IntRange::fixed(v))
        }
        Value::Array(items) => {
            let ints: Vec<i32> = items
                .iter()
                .map(|v| v.as_i64().map(|n| n as i32).ok_or_else(malformed))
                .collect::<Result<_, _>>()?;
            match ints.as_slice() {
                [v] => Ok(IntRange::fixed(*v)),
                [a, b] => Ok(IntRange::new(*a.min(b), *a.max(b))),
                _ => Err(malformed()),
            }
        }
        _ => Err(malformed()),
    }
}
