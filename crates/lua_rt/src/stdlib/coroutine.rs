// Coroutine library - Full implementation
// Implements: create, resume, yield, status, running, wrap, isyieldable

use crate::ThreadId;
use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaError, LuaResult, LuaState};

pub fn create_coroutine_lib() -> LibraryModule {
    crate::lib_module!("coroutine", {
        "create" => coroutine_create,
        "resume" => coroutine_resume,
        "yield" => coroutine_yield,
        "status" => coroutine_status,
        "running" => coroutine_running,
        "wrap" => coroutine_wrap,
        "isyieldable" => coroutine_isyieldable,
        "close" => coroutine_close,
    })
}

/// coroutine.create(f) - Create a new coroutine
fn coroutine_create(l: &mut LuaState) -> LuaResult<usize> {
    let func = match l.get_arg(1) {
        Some(f) => f,
        None => {
            return Err(l.error("coroutine.create requires a function argument".to_string()));
        }
    };

    if !func.is_function() && !func.is_cfunction() {
        return Err(l.error("coroutine.create requires a function argument".to_string()));
    }

    // Use VM's create_thread which properly sets up the thread with the function
    let vm = l.vm_mut();
    let thread_val = vm.create_thread(func);

    l.push_value(thread_val)?;
    Ok(1)
}

/// coroutine.resume(co, ...) - Resume a coroutine
fn coroutine_resume(l: &mut LuaState) -> LuaResult<usize> {
    let thread_val = match l.get_arg(1) {
        Some(t) => t,
        None => {
            return Err(l.error("coroutine.resume requires a thread argument".to_string()));
        }
    };

    if !thread_val.is_thread() {
        return Err(l.error("coroutine.resume requires a thread argument".to_string()));
    }

    // Get remaining arguments
    let all_args = l.get_args();
    let args: Vec<LuaValue> = if all_args.len() > 1 {
        all_args[1..].to_vec()
    } else {
        Vec::new()
    };

    // Resume the thread
    let vm = l.vm_mut();
    match vm.resume_thread(thread_val, args) {
        Ok((_finished, results)) => {
            // Success - either yielded (finished=false) or completed (finished=true)
            // Both are successful from pcall perspective
            let result_count = results.len();
            l.push_value(LuaValue::boolean(true))?; // success=true
            for result in results {
                l.push_value(result)?;
            }
            Ok(1 + result_count)
        }
        Err(LuaError::ResourceKilled) => {
            // Resource limits are uncatchable even across a resume boundary.
            Err(LuaError::ResourceKilled)
        }
        Err(e) => {
            // Error occurred during resume - get detailed error message
            let error_str = l.create_string(&format!("{:?}", e));
            l.push_value(LuaValue::boolean(false))?; // success=false
            l.push_value(error_str)?;
            Ok(2)
        }
    }
}

/// coroutine.yield(...) - Yield from current coroutine
fn coroutine_yield(l: &mut LuaState) -> LuaResult<usize> {
    let args = l.get_args();

    // Yield with values
    l.do_yield(args)?;

    // This return value won't be used because do_yield returns Err(LuaError::Yield)
    Ok(0)
}

/// coroutine.status(co) - Get coroutine status
fn coroutine_status(l: &mut LuaState) -> LuaResult<usize> {
    let thread_val = match l.get_arg(1) {
        Some(t) => t,
        None => {
            return Err(l.error("coroutine.status requires a thread argument".to_string()));
        }
    };

    if !thread_val.is_thread() {
        return Err(l.error("coroutine.status requires a thread argument".to_string()));
    }

    let Some(thread_id) = thread_val.as_thread_id() else {
        return Err(l.error("invalid thread".to_string()));
    };

    if thread_id.is_main() {
        // Main thread is always running
        let status_val = l.create_string("running");
        l.push_value(status_val)?;
        return Ok(1);
    }

    let status_str = {
        let Some(thread) = l.vm().object_pool.get_thread(thread_id) else {
            return Err(l.error("invalid thread".to_string()));
        };
        thread.status().as_str()
    };
    let status_val = l.create_string(status_str);
    l.push_value(status_val)?;
    Ok(1)
}

/// coroutine.running() - Get currently running coroutine
fn coroutine_running(l: &mut LuaState) -> LuaResult<usize> {
    // In the main thread, return the main thread handle and true.
    if l.is_main_thread() {
        l.push_value(LuaValue::thread(ThreadId::main_id()))?;
        l.push_value(LuaValue::boolean(true))?;
        return Ok(2);
    }

    // Non-main coroutines cannot currently recover their own handle value.
    l.push_value(LuaValue::nil())?;
    l.push_value(LuaValue::boolean(false))?;
    Ok(2)
}

/// coroutine.wrap(f) - Create a wrapped coroutine
fn coroutine_wrap(l: &mut LuaState) -> LuaResult<usize> {
    let func = match l.get_arg(1) {
        Some(f) => f,
        None => {
            return Err(l.error("coroutine.wrap requires a function argument".to_string()));
        }
    };

    if !func.is_function() && !func.is_cfunction() {
        return Err(l.error("coroutine.wrap requires a function argument".to_string()));
    }

    // Create the coroutine
    let vm = l.vm_mut();
    let thread_val = vm.create_thread(func);

    // Create a C closure with the thread as upvalue
    let wrapper_func = vm.create_c_closure(coroutine_wrap_call, vec![thread_val]);

    l.push_value(wrapper_func)?;
    Ok(1)
}

/// Helper function for coroutine.wrap - called when the wrapper is invoked
fn coroutine_wrap_call(l: &mut LuaState) -> LuaResult<usize> {
    // Get the thread from the closure's first upvalue (always closed, set by create_c_closure)
    let func_val = l.current_frame().map(|f| f.func).unwrap_or(LuaValue::nil());
    let thread_val = {
        let pool = &l.vm().object_pool;
        func_val
            .as_lua_function(pool)
            .and_then(|f| f.upvalues().first())
            .and_then(|&uv_id| pool.get_upvalue(uv_id))
            .and_then(|uv| uv.get_closed_value())
            .unwrap_or(LuaValue::nil())
    };

    if !thread_val.is_thread() {
        return Err(l.error("invalid wrapped coroutine".to_string()));
    }

    // Collect arguments
    let args = l.get_args();

    // Resume the coroutine
    let vm = l.vm_mut();
    match vm.resume_thread(thread_val, args) {
        Ok((_finished, results)) => {
            // Success - push all results
            for result in &results {
                l.push_value(*result)?;
            }
            Ok(results.len())
        }
        Err(e) => {
            // Error occurred - propagate it
            let error_msg = format!("coroutine error: {:?}", e);
            Err(l.error(error_msg))
        }
    }
}

/// coroutine.isyieldable() - Check if current position can yield
fn coroutine_isyieldable(l: &mut LuaState) -> LuaResult<usize> {
    l.push_value(LuaValue::boolean(!l.is_main_thread()))?;
    Ok(1)
}

/// coroutine.close(co) - Close a coroutine, marking it as dead
fn coroutine_close(l: &mut LuaState) -> LuaResult<usize> {
    let thread_val = match l.get_arg(1) {
        Some(t) => t,
        None => {
            return Err(l.error("coroutine.close requires a thread argument".to_string()));
        }
    };

    if !thread_val.is_thread() {
        return Err(l.error("coroutine.close requires a thread argument".to_string()));
    }

    let Some(thread_id) = thread_val.as_thread_id() else {
        return Err(l.error("invalid thread".to_string()));
    };

    if thread_id.is_main() {
        return Err(l.error("cannot close the main thread".to_string()));
    }

    let vm = l.vm_mut();
    let Some(thread) = vm.object_pool.get_thread_mut(thread_id) else {
        return Err(l.error("invalid thread".to_string()));
    };

    match thread.status() {
        crate::lua_vm::CoroutineStatus::Running | crate::lua_vm::CoroutineStatus::Normal => {
            return Err(l.error("cannot close a running coroutine".to_string()));
        }
        crate::lua_vm::CoroutineStatus::Suspended | crate::lua_vm::CoroutineStatus::Dead => {
            thread.set_dead();
        }
    }

    l.push_value(LuaValue::boolean(true))?;
    Ok(1)
}
