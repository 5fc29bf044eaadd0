// Debug library
// Implements: traceback, getinfo, plus the argument-checking helpers
// (objtypename, typeerror, argerror, arg_typeerror) that the rest of the
// standard library raises its "bad argument" / "attempt to call a nil
// value" errors through.

use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaValue, LuaValueKind};
use crate::lua_vm::{CallInfo, LuaError, LuaResult, LuaState};

pub fn create_debug_lib() -> LibraryModule {
    crate::lib_module!("debug", {
        "traceback" => debug_traceback,
        "getinfo" => debug_getinfo,
    })
}

/// Name Lua would report for a value's type, e.g. in "number expected, got
/// table". Matches `lua_typename` naming, not Rust's.
pub fn objtypename(_l: &mut LuaState, v: &LuaValue) -> &'static str {
    match v.kind() {
        LuaValueKind::Nil => "no value",
        LuaValueKind::Boolean => "boolean",
        LuaValueKind::Integer | LuaValueKind::Float => "number",
        LuaValueKind::String => "string",
        LuaValueKind::Table => "table",
        LuaValueKind::Function | LuaValueKind::CFunction => "function",
        LuaValueKind::Userdata => "userdata",
        LuaValueKind::Thread => "thread",
    }
}

/// "attempt to <op> a <type> value" - raised when an operator or call sees
/// a value of a type it cannot work with at all (as opposed to a merely
/// out-of-range argument, which goes through [`argerror`]).
pub fn typeerror(l: &mut LuaState, v: &LuaValue, op: &str) -> LuaError {
    let t = objtypename(l, v);
    l.error(format!("attempt to {} a {} value", op, t))
}

/// "bad argument #<n> (<extramsg>)" - the standard shape for argument
/// errors that don't turn on the value's type (missing argument,
/// out-of-range number, malformed pattern, ...).
pub fn argerror(l: &mut LuaState, n: usize, extramsg: &str) -> LuaError {
    l.error(format!("bad argument #{} ({})", n, extramsg))
}

/// "bad argument #<n> (<expected> expected, got <actual>)" - the shape used
/// when the argument's type itself is wrong.
pub fn arg_typeerror(l: &mut LuaState, n: usize, expected: &str, got: &LuaValue) -> LuaError {
    let actual = objtypename(l, got);
    argerror(l, n, &format!("{} expected, got {}", expected, actual))
}

/// debug.traceback([message [, level]]) - build a "stack traceback:" string
/// by walking call frames from `level` (default 1) up to the root.
///
/// A non-string, non-nil `message` is returned untouched, matching
/// reference Lua's behavior of leaving such values for the caller (e.g. a
/// custom error object passed through `xpcall`'s message handler).
fn debug_traceback(l: &mut LuaState) -> LuaResult<usize> {
    let message = l.get_arg(1);
    let message_str = match message {
        None => None,
        Some(v) if v.is_nil() => None,
        Some(v) => {
            if !v.is_string() {
                l.push_value(v)?;
                return Ok(1);
            }
            v.as_str(&l.vm().object_pool).map(|s| s.to_string())
        }
    };

    let level = l
        .get_arg(2)
        .and_then(|v| v.as_integer())
        .unwrap_or(1)
        .max(0) as usize;

    let mut trace = String::new();
    if let Some(msg) = message_str {
        trace.push_str(&msg);
        trace.push('\n');
    }
    trace.push_str("stack traceback:");

    let depth = l.call_depth();
    let mut skipped = 0usize;
    let mut i = depth;
    while i > 0 {
        i -= 1;
        if skipped < level {
            skipped += 1;
            continue;
        }
        let info = l.get_call_info(i);
        trace.push_str("\n\t");
        trace.push_str(&describe_frame(info));
    }

    let result = l.create_string(&trace);
    l.push_value(result)?;
    Ok(1)
}

fn describe_frame(info: &CallInfo) -> String {
    if info.is_c() {
        "[C]: in function".to_string()
    } else {
        format!("?:{}: in function", info.pc)
    }
}

/// debug.getinfo(f | level [, what]) - return a table describing a function
/// or stack level. Supports the subset of fields the rest of this runtime's
/// error paths and tests rely on: `what`, `source`, `currentline`,
/// `short_src`, `isvararg`.
fn debug_getinfo(l: &mut LuaState) -> LuaResult<usize> {
    let Some(arg) = l.get_arg(1) else {
        return Err(l.error("debug.getinfo requires an argument".to_string()));
    };

    let info_table = l.create_table(0, 6);

    if let Some(level) = arg.as_integer() {
        let depth = l.call_depth();
        let level = level.max(0) as usize;
        if level >= depth {
            l.push_value(LuaValue::nil())?;
            return Ok(1);
        }
        let idx = depth - 1 - level;
        let call_info = l.get_call_info(idx).clone();
        fill_info_for_frame(l, &info_table, &call_info)?;
    } else if arg.is_function() || arg.is_cfunction() {
        fill_info_for_function(l, &info_table, &arg)?;
    } else {
        return Err(arg_typeerror(l, 1, "function or level", &arg));
    }

    l.push_value(info_table)?;
    Ok(1)
}

fn fill_info_for_frame(l: &mut LuaState, info_table: &LuaValue, call_info: &CallInfo) -> LuaResult<()> {
    let is_c = call_info.is_c();
    set_field(l, info_table, "what", if is_c { "C" } else { "Lua" })?;
    set_field(l, info_table, "source", if is_c { "=[C]" } else { "?" })?;
    set_field(l, info_table, "short_src", if is_c { "[C]" } else { "?" })?;
    set_field_int(l, info_table, "currentline", if is_c { -1 } else { call_info.pc as i64 })?;
    Ok(())
}

fn fill_info_for_function(l: &mut LuaState, info_table: &LuaValue, func: &LuaValue) -> LuaResult<()> {
    let is_c = func.is_cfunction();
    set_field(l, info_table, "what", if is_c { "C" } else { "Lua" })?;
    set_field(l, info_table, "source", if is_c { "=[C]" } else { "?" })?;
    set_field(l, info_table, "short_src", if is_c { "[C]" } else { "?" })?;
    set_field_int(l, info_table, "currentline", -1)?;
    set_field_bool(l, info_table, "isvararg", !is_c)?;
    Ok(())
}

fn set_field(l: &mut LuaState, table: &LuaValue, key: &str, value: &str) -> LuaResult<()> {
    let k = l.create_string(key);
    let v = l.create_string(value);
    l.raw_set(table, k, v);
    Ok(())
}

fn set_field_int(l: &mut LuaState, table: &LuaValue, key: &str, value: i64) -> LuaResult<()> {
    let k = l.create_string(key);
    l.raw_set(table, k, LuaValue::integer(value));
    Ok(())
}

fn set_field_bool(l: &mut LuaState, table: &LuaValue, key: &str, value: bool) -> LuaResult<()> {
    let k = l.create_string(key);
    l.raw_set(table, k, LuaValue::boolean(value));
    Ok(())
}
