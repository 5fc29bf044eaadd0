//! Trait surface behind `#[derive(LuaUserData)]` and `#[lua_methods]`.
//!
//! `UserDataTrait` is the object-safe interface the VM dispatches field
//! access, method calls, and metamethods through for any Rust value stored
//! as Lua userdata. `UdValue` is the small value type carried across that
//! boundary, independent from `LuaValue` so userdata implementations don't
//! need to depend on the VM's internal representation.

use crate::lua_vm::CFunction;
use std::any::Any;
use std::rc::Rc;

/// A value passed to or returned from `UserDataTrait` methods.
///
/// Distinct from `LuaValue`: userdata implementations live outside the VM
/// crate boundary in spirit, so this carries only what field/method
/// conversion needs, plus an escape hatch (`Userdata`) for values that are
/// themselves Rust structs (used by derived arithmetic metamethods).
#[derive(Clone)]
pub enum UdValue {
    Nil,
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Str(String),
    Function(CFunction),
    Userdata(Rc<dyn Any>),
}

impl UdValue {
    /// Wrap an arbitrary Rust value for round-tripping through a `UdValue`,
    /// e.g. the result of a derived arithmetic metamethod.
    pub fn from_userdata<T: 'static>(value: T) -> UdValue {
        UdValue::Userdata(Rc::new(value))
    }

    /// Downcast a `Userdata` payload back to `T`.
    pub fn as_userdata_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            UdValue::Userdata(rc) => rc.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn to_integer(&self) -> Option<i64> {
        match self {
            UdValue::Integer(i) => Some(*i),
            UdValue::Number(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn to_number(&self) -> Option<f64> {
        match self {
            UdValue::Number(n) => Some(*n),
            UdValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Lua truthiness: everything but `nil` and `false` is true.
    pub fn to_bool(&self) -> bool {
        !matches!(self, UdValue::Nil | UdValue::Boolean(false))
    }

    pub fn to_str(&self) -> Option<&str> {
        match self {
            UdValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl<T: Any> From<T> for UdValue {
    fn from(value: T) -> Self {
        UdValue::Userdata(Rc::new(value))
    }
}

/// Implemented by Rust types exposed to Lua as userdata.
///
/// Only `type_name`, `as_any` and `as_any_mut` are mandatory; everything
/// else defaults to "unsupported" so a type can opt into exactly the
/// field access and metamethods it needs.
pub trait UserDataTrait {
    /// Name shown by `tostring`/`type` errors and in derived method-lookup.
    fn type_name(&self) -> &'static str;

    /// Look up a field or method by name.
    fn get_field(&self, _key: &str) -> Option<UdValue> {
        None
    }

    /// Assign a field by name.
    ///
    /// Returns `None` if the field doesn't exist, `Some(Err(..))` if it
    /// exists but the value couldn't be converted or is read-only.
    fn set_field(&mut self, _key: &str, _value: UdValue) -> Option<Result<(), String>> {
        None
    }

    /// Names of fields this value exposes, for introspection.
    fn field_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Called when the owning `LuaUserdata` is collected.
    fn lua_gc(&mut self) {}

    /// Called by an explicit `file:close()`-style call, ahead of GC.
    fn lua_close(&mut self) {}

    fn lua_tostring(&self) -> Option<String> {
        None
    }

    fn lua_eq(&self, _other: &dyn UserDataTrait) -> Option<bool> {
        None
    }

    fn lua_lt(&self, _other: &dyn UserDataTrait) -> Option<bool> {
        None
    }

    fn lua_le(&self, _other: &dyn UserDataTrait) -> Option<bool> {
        None
    }

    fn lua_add(&self, _other: &UdValue) -> Option<UdValue> {
        None
    }

    fn lua_sub(&self, _other: &UdValue) -> Option<UdValue> {
        None
    }

    fn lua_mul(&self, _other: &UdValue) -> Option<UdValue> {
        None
    }

    fn lua_div(&self, _other: &UdValue) -> Option<UdValue> {
        None
    }

    fn lua_mod(&self, _other: &UdValue) -> Option<UdValue> {
        None
    }

    fn lua_unm(&self) -> Option<UdValue> {
        None
    }

    /// Drives `__pairs`/`next` for iterable userdata. `__control` is the
    /// previous key (`UdValue::Nil` to start iteration); returns the next
    /// `(key, value)` pair or `None` to stop.
    fn lua_next(&self, _control: &UdValue) -> Option<(UdValue, UdValue)> {
        None
    }

    fn lua_len(&self) -> Option<UdValue> {
        None
    }
}

/// Implemented by C-like enums via `#[derive(LuaUserData)]`, exposing
/// variant name/value pairs as a Lua-visible lookup table.
pub trait LuaEnum {
    fn variants() -> &'static [(&'static str, i64)];
    fn enum_name() -> &'static str;
}
