// Lua 5.4 Standard Libraries Implementation

// #[cfg(feature = "async")]
// pub mod async_lib;
pub mod basic;
pub mod coroutine;
pub mod debug;
pub mod io;
pub mod math;
pub mod os;
pub mod package;
#[cfg(feature = "sandbox")]
pub mod runtime;
pub mod string;
pub mod table;
pub mod utf8;

/// Selects which standard library modules `LuaVM::open_stdlib` registers.
/// `All` is the common case (a fresh embedder that wants the whole Lua
/// 5.4 surface); the individual variants let a host cherry-pick modules,
/// e.g. a sandboxed embedder that never wants `os`/`io` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stdlib {
    All,
    Basic,
    Package,
    String,
    Table,
    Math,
    Io,
    Os,
    Utf8,
    Coroutine,
    Debug,
    #[cfg(feature = "sandbox")]
    Runtime,
}
