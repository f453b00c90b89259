//! Guest environment construction.
//!
//! Binds the `component`, `computer` and `unicode` tables into the guest
//! globals, installs the `checkArg` helper and the sandbox pruning, and
//! wires the pullSignal shim to the host signal queue. Short scripts load
//! as text chunks; everything else is Rust closures over the shared
//! `GuestContext`.

use crate::{convert, unicode, GuestContext, PullState};
use mlua::{ChunkMode, Function, Lua, MultiValue, Table, Variadic};
use std::rc::Rc;
use std::time::{Duration, Instant};

const CHECK_ARG: &str = r#"
local function checkArg(n, have, ...)
  have = type(have)
  local function check(want, ...)
    if not want then
      return false
    else
      return have == want or check(...)
    end
  end
  if not check(...) then
    local msg = string.format("bad argument #%d (%s expected, got %s)",
                              n, table.concat({...}, " or "), have)
    error(msg, 3)
  end
end
return checkArg
"#;

const LIST_WRAP: &str = r#"
return function(t)
  local key
  return setmetatable(t, { __call = function()
    local value
    key, value = next(t, key)
    return key, value
  end })
end
"#;

const PULL_SHIM: &str = r#"
local begin, poll = ...
return function(timeout)
  if timeout ~= nil and type(timeout) ~= "number" then
    error("pullSignal: invalid type of argument #1")
  end
  begin(timeout)
  while true do
    local result = table.pack(poll())
    if result[1] == "signal" then
      return table.unpack(result, 2, result.n)
    elseif result[1] == "timeout" then
      return
    elseif result[1] == "shutdown" then
      coroutine.yield()
      return
    end
    coroutine.yield()
  end
end
"#;

const SHUTDOWN_SHIM: &str = r#"
local finish = ...
return function(reboot)
  finish(debug.traceback("Computer shut down.", 2), not not reboot)
end
"#;

const SANDBOX: &str = r#"
rprint = print
require = nil
local allowed = { time = true, clock = true, date = true, difftime = true }
for k in pairs(os) do
  if not allowed[k] then os[k] = nil end
end
"#;

pub fn install(lua: &Lua, ctx: &Rc<GuestContext>) -> mlua::Result<()> {
    install_component(lua, ctx)?;
    install_computer(lua, ctx)?;
    install_check_arg(lua)?;
    install_unicode(lua)?;
    lua.load(SANDBOX)
        .set_name("sandbox")
        .set_mode(ChunkMode::Text)
        .exec()?;
    Ok(())
}

fn truthy(value: &mlua::Value) -> bool {
    !matches!(value, mlua::Value::Nil | mlua::Value::Boolean(false))
}

fn lossy(s: &mlua::String) -> String {
    String::from_utf8_lossy(&s.as_bytes()).into_owned()
}

/// Metatable whose `__index` warns about the missing key and hands back a
/// sentinel that fails when called.
fn stub_metatable(lua: &Lua, label: &str) -> mlua::Result<Table> {
    let label = label.to_string();
    let index = lua.create_function(move |lua, (_table, key): (mlua::Value, mlua::Value)| {
        if let mlua::Value::String(key) = &key {
            tracing::warn!(
                target: "guest",
                "{}: key '{}' not found",
                label,
                String::from_utf8_lossy(&key.as_bytes())
            );
        }
        lua.create_function(|_, _args: Variadic<mlua::Value>| -> mlua::Result<()> {
            Err(mlua::Error::RuntimeError(
                "attempt to call a nil value".to_string(),
            ))
        })
    })?;
    let metatable = lua.create_table()?;
    metatable.set("__index", index)?;
    Ok(metatable)
}

/// Resolve and call one component method, converting values at the
/// boundary. `not_found` is the prefix of the missing-component message
/// (`invoke`, `proxy`, ...).
fn dispatch(
    lua: &Lua,
    ctx: &GuestContext,
    address: &str,
    method: &str,
    args: &[mlua::Value],
    not_found: &str,
) -> mlua::Result<MultiValue> {
    let registry = ctx.computer.registry();
    let Some(component) = registry.by_address(address) else {
        return Err(mlua::Error::RuntimeError(format!(
            "{not_found}: no such component: {address}"
        )));
    };
    let mut bus_args = Vec::with_capacity(args.len());
    for value in args {
        bus_args.push(convert::to_bus(value)?);
    }
    let result = component
        .invoke(registry, method, &bus_args)
        .map_err(|err| mlua::Error::RuntimeError(err.to_string()))?;
    convert::many_from_bus(lua, &result)
}

fn install_component(lua: &Lua, ctx: &Rc<GuestContext>) -> mlua::Result<()> {
    let table = lua.create_table()?;

    {
        let ctx = Rc::clone(ctx);
        table.set(
            "type",
            lua.create_function(move |_, address: mlua::String| {
                let address = lossy(&address);
                ctx.computer
                    .registry()
                    .by_address(&address)
                    .map(|c| c.type_name())
                    .ok_or_else(|| {
                        mlua::Error::RuntimeError(format!("type: no such component: {address}"))
                    })
            })?,
        )?;
    }

    {
        let ctx = Rc::clone(ctx);
        let wrap: Function = lua
            .load(LIST_WRAP)
            .set_name("listWrap")
            .set_mode(ChunkMode::Text)
            .call(())?;
        table.set(
            "list",
            lua.create_function(move |lua, args: Variadic<mlua::Value>| {
                let filter = match args.first() {
                    None | Some(mlua::Value::Nil) => None,
                    Some(mlua::Value::String(s)) => Some(lossy(s)),
                    Some(_) => {
                        return Err(mlua::Error::RuntimeError("invalid argument #1".to_string()));
                    }
                };
                let exact = args.get(1).map(truthy).unwrap_or(false);
                let listing = lua.create_table()?;
                for component in ctx.computer.registry().components() {
                    let type_name = component.type_name();
                    let matched = match filter.as_deref() {
                        None | Some("") => true,
                        Some(f) if exact => type_name == f,
                        Some(f) => type_name.contains(f),
                    };
                    if matched {
                        listing.set(component.address(), type_name)?;
                    }
                }
                wrap.call::<Table>(listing)
            })?,
        )?;
    }

    {
        let ctx = Rc::clone(ctx);
        table.set(
            "invoke",
            lua.create_function(move |lua, args: Variadic<mlua::Value>| {
                if args.len() < 2 {
                    return Err(mlua::Error::RuntimeError(
                        "invoke: invalid number of arguments".to_string(),
                    ));
                }
                let mlua::Value::String(address) = &args[0] else {
                    return Err(mlua::Error::RuntimeError(
                        "invoke: invalid type of argument #1".to_string(),
                    ));
                };
                let mlua::Value::String(method) = &args[1] else {
                    return Err(mlua::Error::RuntimeError(
                        "invoke: invalid type of argument #2".to_string(),
                    ));
                };
                dispatch(lua, &ctx, &lossy(address), &lossy(method), &args[2..], "invoke")
            })?,
        )?;
    }

    {
        let ctx = Rc::clone(ctx);
        table.set(
            "proxy",
            lua.create_function(move |lua, address: mlua::String| {
                let address = lossy(&address);
                let Some(component) = ctx.computer.registry().by_address(&address) else {
                    return Err(mlua::Error::RuntimeError(format!(
                        "proxy: no such component: {address}"
                    )));
                };
                let proxy = lua.create_table()?;
                for &method in component.methods() {
                    let ctx = Rc::clone(&ctx);
                    let address = address.clone();
                    proxy.set(
                        method,
                        lua.create_function(move |lua, args: Variadic<mlua::Value>| {
                            dispatch(lua, &ctx, &address, method, &args, "invoke")
                        })?,
                    )?;
                }
                proxy.set("address", component.address())?;
                proxy.set("type", component.type_name())?;
                let label = format!("proxy for component {}", component.name());
                proxy.set_metatable(Some(stub_metatable(lua, &label)?));
                Ok(proxy)
            })?,
        )?;
    }

    table.set_metatable(Some(stub_metatable(lua, "component")?));
    lua.globals().set("component", table)
}

fn install_computer(lua: &Lua, ctx: &Rc<GuestContext>) -> mlua::Result<()> {
    let table = lua.create_table()?;

    table.set(
        "setArchitecture",
        lua.create_function(|_, _args: Variadic<mlua::Value>| Ok(()))?,
    )?;
    {
        let ctx = Rc::clone(ctx);
        table.set(
            "address",
            lua.create_function(move |_, ()| Ok(ctx.computer.address().to_string()))?,
        )?;
    }
    {
        let ctx = Rc::clone(ctx);
        table.set(
            "uptime",
            lua.create_function(move |_, ()| Ok(ctx.computer.uptime_seconds()))?,
        )?;
    }
    {
        let ctx = Rc::clone(ctx);
        table.set(
            "tmpAddress",
            lua.create_function(move |_, ()| {
                Ok(ctx.computer.tmp_address().unwrap_or_default())
            })?,
        )?;
    }
    {
        let ctx = Rc::clone(ctx);
        table.set(
            "freeMemory",
            lua.create_function(move |lua, ()| {
                let limit = ctx.computer.memory_limit();
                Ok(limit.saturating_sub(lua.used_memory()) as i64)
            })?,
        )?;
    }
    {
        let ctx = Rc::clone(ctx);
        table.set(
            "totalMemory",
            lua.create_function(move |_, ()| Ok(ctx.computer.memory_limit() as i64))?,
        )?;
    }
    {
        let ctx = Rc::clone(ctx);
        table.set(
            "pushSignal",
            lua.create_function(move |_, args: Variadic<mlua::Value>| {
                if args.is_empty() {
                    return Err(mlua::Error::RuntimeError(
                        "computer.pushSignal(): at least one argument expected".to_string(),
                    ));
                }
                let mut values = Vec::with_capacity(args.len());
                for value in args.iter() {
                    values.push(convert::to_bus(value)?);
                }
                ctx.computer
                    .signals()
                    .push_record(core_bus::serialize_record(&values));
                Ok(())
            })?,
        )?;
    }
    {
        let begin = {
            let ctx = Rc::clone(ctx);
            lua.create_function(move |_, timeout: Option<f64>| {
                let deadline = timeout
                    .filter(|t| t.is_finite())
                    .map(|t| Instant::now() + Duration::from_secs_f64(t.max(0.0)));
                *ctx.pull.borrow_mut() = PullState {
                    waiting: true,
                    deadline,
                };
                Ok(())
            })?
        };
        let poll = {
            let ctx = Rc::clone(ctx);
            lua.create_function(move |lua, ()| {
                let signals = ctx.computer.signals();
                if let Some(record) = signals.try_pop() {
                    *ctx.pull.borrow_mut() = PullState::default();
                    let values = core_bus::parse_record(&record).map_err(|err| {
                        mlua::Error::RuntimeError(format!("malformed signal record: {err}"))
                    })?;
                    let mut out = vec![mlua::Value::String(lua.create_string("signal")?)];
                    for value in &values {
                        out.push(convert::from_bus(lua, value)?);
                    }
                    return Ok(MultiValue::from_vec(out));
                }
                if signals.is_terminated() {
                    // The extra yield on this path hands control back to
                    // the run loop so a guest that keeps polling after
                    // shutdown cannot pin the thread.
                    *ctx.pull.borrow_mut() = PullState::default();
                    return Ok(MultiValue::from_vec(vec![mlua::Value::String(
                        lua.create_string("shutdown")?,
                    )]));
                }
                let deadline_passed = ctx
                    .pull
                    .borrow()
                    .deadline
                    .is_some_and(|d| Instant::now() >= d);
                if deadline_passed {
                    *ctx.pull.borrow_mut() = PullState::default();
                    return Ok(MultiValue::from_vec(vec![mlua::Value::String(
                        lua.create_string("timeout")?,
                    )]));
                }
                Ok(MultiValue::from_vec(vec![mlua::Value::String(
                    lua.create_string("wait")?,
                )]))
            })?
        };
        let pull: Function = lua
            .load(PULL_SHIM)
            .set_name("pullSignalLoad")
            .set_mode(ChunkMode::Text)
            .call((begin, poll))?;
        table.set("pullSignal", pull)?;
    }
    {
        let ctx = Rc::clone(ctx);
        let finish = lua.create_function(move |_, (traceback, reboot): (String, bool)| {
            ctx.computer.shutdown(reboot, &traceback);
            Ok(())
        })?;
        let shutdown: Function = lua
            .load(SHUTDOWN_SHIM)
            .set_name("shutdownLoad")
            .set_mode(ChunkMode::Text)
            .call(finish)?;
        table.set("shutdown", shutdown)?;
    }
    table.set(
        "beep",
        lua.create_function(|_, _args: Variadic<mlua::Value>| Ok(()))?,
    )?;
    table.set(
        "getProgramLocations",
        lua.create_function(|lua, ()| {
            let locations = lua.create_table()?;
            locations.set("n", 0)?;
            Ok(locations)
        })?,
    )?;

    table.set_metatable(Some(stub_metatable(lua, "computer")?));
    lua.globals().set("computer", table)
}

fn install_check_arg(lua: &Lua) -> mlua::Result<()> {
    let check_arg: Function = lua
        .load(CHECK_ARG)
        .set_name("checkArgLoad")
        .set_mode(ChunkMode::Text)
        .call(())?;
    lua.globals().set("checkArg", check_arg)
}

fn install_unicode(lua: &Lua) -> mlua::Result<()> {
    let table = lua.create_table()?;
    table.set(
        "len",
        lua.create_function(|_, s: mlua::String| Ok(unicode::len(&lossy(&s)) as i64))?,
    )?;
    table.set(
        "char",
        lua.create_function(|_, codes: Variadic<i64>| {
            let codepoints: Vec<u32> = codes
                .iter()
                .map(|&c| u32::try_from(c).unwrap_or(0xFFFD))
                .collect();
            Ok(unicode::char_from(&codepoints))
        })?,
    )?;
    table.set(
        "sub",
        lua.create_function(|_, (s, i, j): (mlua::String, i64, Option<i64>)| {
            Ok(unicode::sub(&lossy(&s), i, j.unwrap_or(-1)))
        })?,
    )?;
    table.set(
        "wlen",
        lua.create_function(|_, s: mlua::String| Ok(unicode::display_width(&lossy(&s)) as i64))?,
    )?;
    table.set(
        "wtrunc",
        lua.create_function(|_, (s, limit): (mlua::String, i64)| {
            unicode::wtrunc(&lossy(&s), limit)
                .map_err(|msg| mlua::Error::RuntimeError(msg.to_string()))
        })?,
    )?;
    table.set(
        "charWidth",
        lua.create_function(|_, s: mlua::String| Ok(unicode::char_width(&lossy(&s)) as i64))?,
    )?;
    table.set(
        "isWide",
        lua.create_function(|_, s: mlua::String| Ok(unicode::is_wide(&lossy(&s))))?,
    )?;
    table.set(
        "lower",
        lua.create_function(|_, s: mlua::String| Ok(unicode::lower(&lossy(&s))))?,
    )?;
    table.set(
        "upper",
        lua.create_function(|_, s: mlua::String| Ok(unicode::upper(&lossy(&s))))?,
    )?;
    table.set(
        "reverse",
        lua.create_function(|_, s: mlua::String| Ok(unicode::reverse(&lossy(&s))))?,
    )?;

    table.set_metatable(Some(stub_metatable(lua, "unicode")?));
    lua.globals().set("unicode", table)
}
