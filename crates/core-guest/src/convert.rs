//! Conversion between bus `Value`s and interpreter values at the bridge
//! boundary.

use core_bus::Value;
use mlua::{Lua, MultiValue};

/// Interpreter value to bus value. Functions, threads and userdata have no
/// bus representation and fail the way the serialiser contract requires.
pub fn to_bus(value: &mlua::Value) -> mlua::Result<Value> {
    match value {
        mlua::Value::Nil => Ok(Value::Nil),
        mlua::Value::Boolean(b) => Ok(Value::Bool(*b)),
        mlua::Value::Integer(i) => Ok(Value::Int(*i)),
        mlua::Value::Number(n) => Ok(Value::Num(*n)),
        mlua::Value::String(s) => Ok(Value::Str(s.as_bytes().to_vec())),
        mlua::Value::Table(table) => {
            let mut pairs = Vec::new();
            for entry in table.clone().pairs::<mlua::Value, mlua::Value>() {
                let (key, val) = entry?;
                pairs.push((to_bus(&key)?, to_bus(&val)?));
            }
            Ok(Value::Table(pairs))
        }
        other => Err(mlua::Error::RuntimeError(format!(
            "unsupported type: {}",
            other.type_name()
        ))),
    }
}

pub fn from_bus(lua: &Lua, value: &Value) -> mlua::Result<mlua::Value> {
    Ok(match value {
        Value::Nil => mlua::Value::Nil,
        Value::Bool(b) => mlua::Value::Boolean(*b),
        Value::Int(i) => mlua::Value::Integer(*i),
        Value::Num(n) => mlua::Value::Number(*n),
        Value::Str(bytes) => mlua::Value::String(lua.create_string(bytes)?),
        Value::Table(entries) => {
            let table = lua.create_table()?;
            for (key, val) in entries {
                table.raw_set(from_bus(lua, key)?, from_bus(lua, val)?)?;
            }
            mlua::Value::Table(table)
        }
    })
}

pub fn many_from_bus(lua: &Lua, values: &[Value]) -> mlua::Result<MultiValue> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(from_bus(lua, value)?);
    }
    Ok(MultiValue::from_vec(out))
}
