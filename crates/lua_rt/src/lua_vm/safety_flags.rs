// Safety flags - per-native-function capability requirements.
//
// Mirrors the bitmask style of `call_info::call_status`: plain `u32`
// constants combined with `|`, checked with `&`. A context's flags are
// the set of capabilities a native call is *permitted* to use; a
// library function's flags (registered via `LibraryEntry::FunctionFlagged`)
// are the set it *requires*. A call is allowed when the function's
// required flags are a subset of the active context's permitted flags.

use crate::lua_vm::{CFunction, LuaError, LuaResult, LuaState};
use std::collections::HashMap;

/// Touches stdin/stdout/stderr or opens/reads/writes arbitrary files via `io`.
pub const SAFETY_IO: u32 = 1 << 0;
/// Spawns processes or exits the host process (`os.execute`, `os.exit`).
pub const SAFETY_PROCESS: u32 = 1 << 1;
/// Removes or renames files (`os.remove`, `os.rename`).
pub const SAFETY_FS_WRITE: u32 = 1 << 2;
/// Reads environment variables or the clock/locale (`os.getenv`, `os.date`, ...).
pub const SAFETY_OS_INFO: u32 = 1 << 3;
/// Loads or compiles new chunks at runtime (`load`, `loadstring`, `dofile`).
pub const SAFETY_LOAD: u32 = 1 << 4;
/// Introspects or rewrites running state (`debug.*` beyond `traceback`/`getinfo`).
pub const SAFETY_DEBUG: u32 = 1 << 5;

/// All capabilities. The default registry entry for an unflagged function.
pub const SAFETY_ALL: u32 = SAFETY_IO
    | SAFETY_PROCESS
    | SAFETY_FS_WRITE
    | SAFETY_OS_INFO
    | SAFETY_LOAD
    | SAFETY_DEBUG;

/// No capabilities. The tightest context a script can run under.
pub const SAFETY_NONE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SafetyFlags(pub u32);

impl SafetyFlags {
    pub const fn all() -> Self {
        Self(SAFETY_ALL)
    }

    pub const fn none() -> Self {
        Self(SAFETY_NONE)
    }

    pub const fn of(bits: u32) -> Self {
        Self(bits)
    }

    /// True if every bit `required` asks for is present in `self`.
    pub fn permits(self, required: SafetyFlags) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn with(self, other: SafetyFlags) -> Self {
        Self(self.0 | other.0)
    }

    pub fn without(self, other: SafetyFlags) -> Self {
        Self(self.0 & !other.0)
    }
}

/// Maps a native function's address to the capabilities it requires.
///
/// Keyed by the `fn` pointer's address: `CFunction` is a plain
/// `fn(&mut LuaState) -> LuaResult<usize>`, so two registrations of the
/// same Rust function always produce the same key.
#[derive(Default)]
pub struct SafetyRegistry {
    required: HashMap<usize, SafetyFlags>,
}

impl SafetyRegistry {
    pub fn new() -> Self {
        Self {
            required: HashMap::new(),
        }
    }

    pub fn declare(&mut self, func: CFunction, flags: SafetyFlags) {
        self.required.insert(func as usize, flags);
    }

    /// Flags required by `func`, or [`SafetyFlags::none`] if it was never
    /// declared (i.e. it doesn't touch anything sandbox-relevant).
    pub fn required_for(&self, func: CFunction) -> SafetyFlags {
        self.required
            .get(&(func as usize))
            .copied()
            .unwrap_or(SafetyFlags::none())
    }
}

/// Check `func` against `active`'s permitted flags, raising
/// [`LuaError::SafetyViolation`] via `l.error` if it isn't allowed.
///
/// Called from the native-call sites in `execute::call` right before a
/// `CFunction` actually runs. Returns `Ok(())` immediately when no
/// context is active (unsandboxed call, or sandboxing compiled out).
pub fn check_call(l: &mut LuaState, func: CFunction, active: Option<SafetyFlags>) -> LuaResult<()> {
    let Some(active) = active else {
        return Ok(());
    };
    let required = l.vm().safety_registry.required_for(func);
    if active.permits(required) {
        Ok(())
    } else {
        Err(l.error_kind(
            format!(
                "safety violation: call requires flags {:#x}, context only permits {:#x}",
                required.0, active.0
            ),
            LuaError::SafetyViolation,
        ))
    }
}
