// Runtime library - Lua-visible view over the sandbox's resource
// accounting (see `lua_vm::resource_context`). Lets an embedded script
// introspect its own budget instead of only discovering it's been killed.
//
// Only registered when the `sandbox` feature is on; unlike the other
// stdlib modules this one has no unsandboxed analogue to fall back to.

use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{ContextStatus, LuaResult, LuaState};

pub fn create_runtime_lib() -> LibraryModule {
    crate::lib_module!("runtime", {
        "status" => runtime_status,
        "cpu_remaining" => runtime_cpu_remaining,
        "mem_remaining" => runtime_mem_remaining,
        "timer_remaining" => runtime_timer_remaining,
        "depth" => runtime_depth,
    })
}

/// runtime.status() - "live", "killed", or "none" (no context active).
fn runtime_status(l: &mut LuaState) -> LuaResult<usize> {
    let status = match l.vm().active_context() {
        None => "none",
        Some(ctx) => match ctx.status {
            ContextStatus::Running => "live",
            ContextStatus::Killed => "killed",
        },
    };
    let result = l.create_string(status);
    l.push_value(result)?;
    Ok(1)
}

/// runtime.cpu_remaining() - instruction ticks left before the innermost
/// active context is killed, or `nil` if no context is active.
fn runtime_cpu_remaining(l: &mut LuaState) -> LuaResult<usize> {
    match l.vm().active_context() {
        Some(ctx) => {
            let remaining = ctx.remaining().cpu;
            l.push_value(LuaValue::integer(remaining.min(i64::MAX as u64) as i64))?;
        }
        None => l.push_value(LuaValue::nil())?,
    }
    Ok(1)
}

/// runtime.mem_remaining() - bytes of GC heap left before the innermost
/// active context is killed, or `nil` if no context is active.
fn runtime_mem_remaining(l: &mut LuaState) -> LuaResult<usize> {
    match l.vm().active_context() {
        Some(ctx) => {
            let remaining = ctx.remaining().mem;
            l.push_value(LuaValue::integer(remaining as i64))?;
        }
        None => l.push_value(LuaValue::nil())?,
    }
    Ok(1)
}

/// runtime.timer_remaining() - wall-clock seconds left before the
/// innermost active context is killed, or `nil` if no context is active.
fn runtime_timer_remaining(l: &mut LuaState) -> LuaResult<usize> {
    match l.vm().active_context() {
        Some(ctx) => {
            let remaining = ctx.remaining().timer.as_secs_f64();
            l.push_value(LuaValue::float(remaining))?;
        }
        None => l.push_value(LuaValue::nil())?,
    }
    Ok(1)
}

/// runtime.depth() - how many nested contexts are currently active.
fn runtime_depth(l: &mut LuaState) -> LuaResult<usize> {
    let depth = l.vm().context_depth() as i64;
    l.push_value(LuaValue::integer(depth))?;
    Ok(1)
}
