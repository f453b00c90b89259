//! Hosting of the guest interpreter: state creation with the memory
//! ceiling, environment installation, and the cooperative run loop.

use anyhow::{Context, Result};
use core_machine::Computer;
use mlua::Lua;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

pub mod convert;
mod env;
mod runner;
pub mod unicode;

pub use runner::RunOutcome;

/// One pullSignal wait, shared between the shim callbacks and the run
/// loop. Guest-thread-only.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PullState {
    waiting: bool,
    deadline: Option<Instant>,
}

pub struct GuestContext {
    pub(crate) computer: Rc<Computer>,
    pub(crate) pull: RefCell<PullState>,
}

/// Run one computer's guest to completion on the calling thread. Always
/// tears the computer down on the way out, whatever the outcome.
pub fn run(computer: Rc<Computer>) -> Result<RunOutcome> {
    let lua = create_state();
    let ctx = Rc::new(GuestContext {
        computer,
        pull: RefCell::new(PullState::default()),
    });
    env::install(&lua, &ctx)
        .map_err(|err| anyhow::anyhow!("installing guest environment: {err}"))?;
    if let Err(err) = lua.set_memory_limit(ctx.computer.memory_limit()) {
        tracing::warn!(target: "guest", %err, "memory ceiling not installed");
    }

    let result = runner::drive(&lua, &ctx);
    ctx.computer.teardown();
    let outcome = result.context("driving guest")?;
    match &outcome {
        RunOutcome::Halted => {
            tracing::info!(target: "guest", computer = ctx.computer.name(), "computer halted");
        }
        RunOutcome::Shutdown => {
            tracing::info!(target: "guest", computer = ctx.computer.name(), "computer shut down");
        }
        RunOutcome::Crashed { traceback } => {
            tracing::error!(
                target: "guest",
                computer = ctx.computer.name(),
                "computer crashed: {traceback}"
            );
        }
    }
    Ok(outcome)
}

/// The guest state carries the full standard library set (the original
/// environment keeps `debug` for tracebacks); the sandbox chunk prunes
/// `require` and most of `os` right after installation.
fn create_state() -> Lua {
    unsafe { Lua::unsafe_new_with(mlua::StdLib::ALL, mlua::LuaOptions::default()) }
}
