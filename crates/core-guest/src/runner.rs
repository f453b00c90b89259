//! The cooperative run loop.
//!
//! The boot payload runs on a guest coroutine; the host resumes it until it
//! finishes or crashes. When a yield arrives while a pullSignal wait is
//! pending, the host parks on the queue condvar until a signal, the
//! deadline, or termination, then resumes so the shim can re-poll.
//! Termination grants the guest exactly one more observation window (its
//! next poll returns no values) before the loop stops resuming.

use crate::GuestContext;
use anyhow::{Context, Result};
use mlua::{ChunkMode, Function, Lua, ThreadStatus};
use std::rc::Rc;

const BOOT_WRAP: &str = r#"
local boot = ...
return function()
  local ok, err = xpcall(boot, debug.traceback)
  if not ok then
    error(err, 0)
  end
end
"#;

/// How a guest run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The boot payload returned normally.
    Halted,
    /// `computer.shutdown()` (or host termination) stopped the run.
    Shutdown,
    /// Uncaught guest error; the traceback is already formatted.
    Crashed { traceback: String },
}

pub fn drive(lua: &Lua, ctx: &Rc<GuestContext>) -> Result<RunOutcome> {
    let payload = ctx
        .computer
        .boot_payload()
        .context("computer has no eeprom to boot from")?;
    let boot: Function = lua
        .load(payload.as_slice())
        .set_name("boot")
        .set_mode(ChunkMode::Text)
        .into_function()
        .map_err(|err| anyhow::anyhow!("loading boot payload: {err}"))?;
    let entry: Function = lua
        .load(BOOT_WRAP)
        .set_name("bootWrap")
        .set_mode(ChunkMode::Text)
        .call(boot)
        .map_err(|err| anyhow::anyhow!("wrapping boot payload: {err}"))?;
    let thread = lua
        .create_thread(entry)
        .map_err(|err| anyhow::anyhow!("creating guest thread: {err}"))?;

    let mut observed_termination = false;
    loop {
        if let Err(err) = thread.resume::<mlua::MultiValue>(()) {
            return Ok(RunOutcome::Crashed {
                traceback: err.to_string(),
            });
        }
        match thread.status() {
            ThreadStatus::Resumable => {
                let signals = ctx.computer.signals();
                if signals.is_terminated() {
                    if observed_termination {
                        return Ok(RunOutcome::Shutdown);
                    }
                    // One more resume so a pending pullSignal observes the
                    // shutdown and returns no values.
                    observed_termination = true;
                    continue;
                }
                let (waiting, deadline) = {
                    let pull = ctx.pull.borrow();
                    (pull.waiting, pull.deadline)
                };
                if waiting {
                    signals.wait(deadline);
                }
                // Non-pull yields resume immediately.
            }
            _ => {
                return Ok(if ctx.computer.signals().is_terminated() {
                    RunOutcome::Shutdown
                } else {
                    RunOutcome::Halted
                });
            }
        }
    }
}
