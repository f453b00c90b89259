//! Call-frame validation.
//!
//! Every component method validates arity and argument types before touching
//! host state; failures become guest errors naming the method and the
//! 1-based argument position.

use crate::{MethodError, Value};

/// Borrowed view of a method's positional arguments.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    method: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(method: &'a str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn exactly(&self, n: usize) -> Result<(), MethodError> {
        if self.values.len() != n {
            return Err(MethodError::bad_arity(self.method));
        }
        Ok(())
    }

    pub fn between(&self, lo: usize, hi: usize) -> Result<(), MethodError> {
        if self.values.len() < lo || self.values.len() > hi {
            return Err(MethodError::bad_arity(self.method));
        }
        Ok(())
    }

    pub fn at_least(&self, n: usize) -> Result<(), MethodError> {
        if self.values.len() < n {
            return Err(MethodError::bad_arity(self.method));
        }
        Ok(())
    }

    fn get(&self, idx: usize) -> Option<&'a Value> {
        self.values.get(idx)
    }

    /// Required byte-string argument at 0-based `idx`.
    pub fn str(&self, idx: usize) -> Result<&'a [u8], MethodError> {
        self.get(idx)
            .and_then(Value::as_str)
            .ok_or_else(|| MethodError::bad_arg(self.method, idx + 1))
    }

    /// Required string argument, decoded lossily for path/label use.
    pub fn str_utf8(&self, idx: usize) -> Result<String, MethodError> {
        Ok(String::from_utf8_lossy(self.str(idx)?).into_owned())
    }

    /// Required integer argument; integral floats coerce.
    pub fn int(&self, idx: usize) -> Result<i64, MethodError> {
        self.get(idx)
            .and_then(Value::as_int)
            .ok_or_else(|| MethodError::bad_arg(self.method, idx + 1))
    }

    /// Required numeric argument.
    pub fn number(&self, idx: usize) -> Result<f64, MethodError> {
        self.get(idx)
            .and_then(Value::as_num)
            .ok_or_else(|| MethodError::bad_arg(self.method, idx + 1))
    }

    /// Optional boolean by guest truthiness; absent means false.
    pub fn opt_bool(&self, idx: usize) -> bool {
        self.get(idx).map(Value::truthy).unwrap_or(false)
    }

    /// Optional string; absent yields `None`, a present non-string errors.
    pub fn opt_str_utf8(&self, idx: usize) -> Result<Option<String>, MethodError> {
        match self.get(idx) {
            None | Some(Value::Nil) => Ok(None),
            Some(v) => v
                .as_str()
                .map(|s| Some(String::from_utf8_lossy(s).into_owned()))
                .ok_or_else(|| MethodError::bad_arg(self.method, idx + 1)),
        }
    }
}
