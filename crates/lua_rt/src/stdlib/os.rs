// OS library
// Implements: clock, date, difftime, execute, exit, getenv, remove, rename,
// setlocale, time, tmpname
//
// `execute`/`exit` require SAFETY_PROCESS, `remove`/`rename` require
// SAFETY_FS_WRITE (and are further checked against the active context's
// FsPolicy, if any), `getenv`/`date`/`time` require SAFETY_OS_INFO. A
// sandboxed context that never grants these flags gets a catchable
// LuaError::SafetyViolation instead of touching the host at all.

use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::LuaResult;
use crate::lua_vm::LuaState;
#[cfg(feature = "sandbox")]
use crate::lua_vm::safety_flags::{SAFETY_FS_WRITE, SAFETY_OS_INFO, SAFETY_PROCESS, SafetyFlags};

pub fn create_os_lib() -> LibraryModule {
    let module = crate::lib_registry::LibraryModule::new("os")
        .with_function("clock", os_clock)
        .with_function("time", os_time)
        .with_function("difftime", os_difftime)
        .with_function("setlocale", os_setlocale);

    #[cfg(feature = "sandbox")]
    let module = module
        .with_flagged_function("date", os_date, SafetyFlags::of(SAFETY_OS_INFO))
        .with_flagged_function("getenv", os_getenv, SafetyFlags::of(SAFETY_OS_INFO))
        .with_flagged_function("execute", os_execute, SafetyFlags::of(SAFETY_PROCESS))
        .with_flagged_function("exit", os_exit, SafetyFlags::of(SAFETY_PROCESS))
        .with_flagged_function("remove", os_remove, SafetyFlags::of(SAFETY_FS_WRITE))
        .with_flagged_function("rename", os_rename, SafetyFlags::of(SAFETY_FS_WRITE))
        .with_flagged_function("tmpname", os_tmpname, SafetyFlags::of(SAFETY_FS_WRITE));

    #[cfg(not(feature = "sandbox"))]
    let module = module
        .with_function("date", os_date)
        .with_function("getenv", os_getenv)
        .with_function("execute", os_execute)
        .with_function("exit", os_exit)
        .with_function("remove", os_remove)
        .with_function("rename", os_rename)
        .with_function("tmpname", os_tmpname);

    module
}

fn os_clock(l: &mut LuaState) -> LuaResult<usize> {
    use std::time::Instant;

    thread_local! {
        static START_TIME: std::cell::RefCell<Option<Instant>> = std::cell::RefCell::new(None);
    }

    let elapsed = START_TIME.with(|start| {
        let mut start_ref = start.borrow_mut();
        if start_ref.is_none() {
            *start_ref = Some(Instant::now());
        }
        start_ref.unwrap().elapsed().as_secs_f64()
    });

    l.push_value(LuaValue::float(elapsed))?;
    Ok(1)
}

fn os_time(l: &mut LuaState) -> LuaResult<usize> {
    use std::time::SystemTime;

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    l.push_value(LuaValue::integer(timestamp as i64))?;
    Ok(1)
}

/// os.date([format [, time]]) - only the default `"%c"`-ish form is
/// implemented (an ISO-like "YYYY-MM-DD HH:MM:SS" string); custom `strftime`
/// patterns are not interpreted.
fn os_date(l: &mut LuaState) -> LuaResult<usize> {
    let now = l
        .get_arg(2)
        .and_then(|v| v.as_integer())
        .unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64
        });

    let datetime = chrono::DateTime::from_timestamp(now, 0).unwrap_or_default();
    let date_str = datetime.format("%Y-%m-%d %H:%M:%S").to_string();

    let result = l.create_string(&date_str);
    l.push_value(result)?;
    Ok(1)
}

fn os_exit(l: &mut LuaState) -> LuaResult<usize> {
    let code = l.get_arg(1).and_then(|v| v.as_integer()).unwrap_or(0);
    std::process::exit(code as i32);
}

fn os_difftime(l: &mut LuaState) -> LuaResult<usize> {
    let t2 = l
        .get_arg(1)
        .and_then(|v| v.as_number())
        .ok_or_else(|| l.error("difftime: argument 1 must be a number".to_string()))?;
    let t1 = l
        .get_arg(2)
        .and_then(|v| v.as_number())
        .ok_or_else(|| l.error("difftime: argument 2 must be a number".to_string()))?;

    l.push_value(LuaValue::float(t2 - t1))?;
    Ok(1)
}

fn os_execute(l: &mut LuaState) -> LuaResult<usize> {
    use std::process::Command;

    let Some(cmd) = l.get_arg(1) else {
        // os.execute() with no arguments: report whether a shell is available.
        l.push_value(LuaValue::boolean(true))?;
        return Ok(1);
    };
    let cmd = cmd
        .as_str(&l.vm().object_pool)
        .map(|s| s.to_string())
        .ok_or_else(|| l.error("execute: argument 1 must be a string".to_string()))?;

    let output = Command::new("sh").arg("-c").arg(cmd.as_str()).output();

    match output {
        Ok(result) => {
            let exit_code = result.status.code().unwrap_or(-1);
            let reason = l.create_string("exit");
            l.push_value(LuaValue::boolean(result.status.success()))?;
            l.push_value(reason)?;
            l.push_value(LuaValue::integer(exit_code as i64))?;
            Ok(3)
        }
        Err(_) => {
            l.push_value(LuaValue::nil())?;
            Ok(1)
        }
    }
}

fn os_getenv(l: &mut LuaState) -> LuaResult<usize> {
    let varname = l
        .get_arg(1)
        .and_then(|v| v.as_str(&l.vm().object_pool).map(|s| s.to_string()))
        .ok_or_else(|| l.error("getenv: argument 1 must be a string".to_string()))?;

    match std::env::var(varname.as_str()) {
        Ok(value) => {
            let result = l.create_string(&value);
            l.push_value(result)?;
        }
        Err(_) => {
            l.push_value(LuaValue::nil())?;
        }
    }
    Ok(1)
}

#[cfg(feature = "sandbox")]
fn check_fs_action(l: &mut LuaState, path: &str, action: crate::lua_vm::FsAction) -> LuaResult<()> {
    let policy = l.vm().fs_policy();
    match policy {
        Some(policy) if !policy.permits(path, action) => {
            Err(l.error_kind(
                format!("filesystem access denied: {}", path),
                crate::lua_vm::LuaError::FilesystemDenied,
            ))
        }
        _ => Ok(()),
    }
}

fn os_remove(l: &mut LuaState) -> LuaResult<usize> {
    let filename = l
        .get_arg(1)
        .and_then(|v| v.as_str(&l.vm().object_pool).map(|s| s.to_string()))
        .ok_or_else(|| l.error("remove: argument 1 must be a string".to_string()))?;

    #[cfg(feature = "sandbox")]
    check_fs_action(l, filename.as_str(), crate::lua_vm::FsAction::REMOVE)?;

    match std::fs::remove_file(filename.as_str()) {
        Ok(_) => {
            l.push_value(LuaValue::boolean(true))?;
            Ok(1)
        }
        Err(e) => {
            let err_msg = l.create_string(&format!("{}", e));
            l.push_value(LuaValue::nil())?;
            l.push_value(err_msg)?;
            Ok(2)
        }
    }
}

fn os_rename(l: &mut LuaState) -> LuaResult<usize> {
    let oldname = l
        .get_arg(1)
        .and_then(|v| v.as_str(&l.vm().object_pool).map(|s| s.to_string()))
        .ok_or_else(|| l.error("rename: argument 1 must be a string".to_string()))?;
    let newname = l
        .get_arg(2)
        .and_then(|v| v.as_str(&l.vm().object_pool).map(|s| s.to_string()))
        .ok_or_else(|| l.error("rename: argument 2 must be a string".to_string()))?;

    #[cfg(feature = "sandbox")]
    {
        check_fs_action(l, oldname.as_str(), crate::lua_vm::FsAction::RENAME)?;
        check_fs_action(l, newname.as_str(), crate::lua_vm::FsAction::RENAME)?;
    }

    match std::fs::rename(oldname.as_str(), newname.as_str()) {
        Ok(_) => {
            l.push_value(LuaValue::boolean(true))?;
            Ok(1)
        }
        Err(e) => {
            let err_msg = l.create_string(&format!("{}", e));
            l.push_value(LuaValue::nil())?;
            l.push_value(err_msg)?;
            Ok(2)
        }
    }
}

fn os_setlocale(l: &mut LuaState) -> LuaResult<usize> {
    // Stub: accept and echo back the requested locale (or "C" if none).
    let locale = l
        .get_arg(1)
        .and_then(|v| v.as_str(&l.vm().object_pool).map(|s| s.to_string()))
        .unwrap_or_else(|| "C".to_string());

    let result = l.create_string(&locale);
    l.push_value(result)?;
    Ok(1)
}

fn os_tmpname(l: &mut LuaState) -> LuaResult<usize> {
    use std::time::SystemTime;

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    let tmpname = format!("/tmp/lua_tmp_{}", timestamp);
    let result = l.create_string(&tmpname);
    l.push_value(result)?;
    Ok(1)
}
