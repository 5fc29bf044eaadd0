// Lua Runtime
// A compact Lua VM implementation with bytecode compiler and GC

#[cfg(test)]
mod test;

pub mod compiler;
pub mod gc;
pub mod lib_registry;
pub mod lua_pattern;
pub mod lua_value;
pub mod lua_vm;
pub mod stdlib;
pub use compiler::Compiler;
pub use gc::*;
pub use lib_registry::LibraryRegistry;
pub use lua_value::{Chunk, LuaFunction, LuaString, LuaTable, LuaValue};
pub use lua_vm::{Instruction, LuaResult, LuaVM, OpCode, SafeOption};
pub use stdlib::Stdlib;

/// Runs `source` against a fresh VM with the full standard library loaded.
///
/// Convenience wrapper for one-shot scripts and examples; embedders that need
/// to reuse a VM across calls or customize which libraries are loaded should
/// build their own [`LuaVM`] and call [`LuaVM::execute_string`] directly.
pub fn execute(source: &str) -> LuaResult<Vec<LuaValue>> {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All)?;
    vm.execute_string(source)
}

/// Execute Lua source against an already-configured VM instance.
pub fn execute_with_vm(vm: &mut LuaVM, source: &str) -> LuaResult<Vec<LuaValue>> {
    vm.execute_string(source)
}
