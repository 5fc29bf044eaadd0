use crate::{GC, LuaValue, ObjectPool, lua_vm::TmKind};

/// Number of tag methods (must match TmKind::N)
const TM_N: usize = 26;

pub struct ConstString {
    // Pre-cached metamethod name strings as array indexed by TmKind discriminant.
    // Layout: tmname[TmKind::Index as usize] = "__index", etc.
    // This replaces individual named fields for O(1) lookup via array index.
    pub tmname: [LuaValue; TM_N],

    // Individual aliases kept for direct access where TmKind is not available
    pub tm_pairs: LuaValue,     // "__pairs"
    pub tm_ipairs: LuaValue,    // "__ipairs"
    pub tm_name: LuaValue,      // "__name"
    pub tm_metatable: LuaValue, // "__metatable"

    // Pre-cached coroutine status strings for fast coroutine.status
    pub str_suspended: LuaValue, // "suspended"
    pub str_running: LuaValue,   // "running"
    pub str_normal: LuaValue,    // "normal"
    pub str_dead: LuaValue,      // "dead"

    // Pre-cached type name strings for type() / tostring() / math.type()
    pub str_nil: LuaValue,      // "nil"
    pub str_boolean: LuaValue,  // "boolean"
    pub str_number: LuaValue,   // "number"
    pub str_string: LuaValue,   // "string"
    pub str_table: LuaValue,    // "table"
    pub str_function: LuaValue, // "function"
    pub str_userdata: LuaValue, // "userdata"
    pub str_thread: LuaValue,   // "thread"
    pub str_true: LuaValue,     // "true"
    pub str_false: LuaValue,    // "false"
    pub str_integer: LuaValue,  // "integer" (for math.type)
    pub str_float: LuaValue,    // "float"   (for math.type)
}

fn make(pool: &mut ObjectPool, gc: &mut GC, s: &str) -> LuaValue {
    let id = pool.create_string(s);
    let value = LuaValue::string(id);
    gc.track_object(value.as_gc_id().unwrap(), s.len(), pool);
    value
}

impl ConstString {
    pub fn new(pool: &mut ObjectPool, gc: &mut GC) -> Self {
        let nil = LuaValue::nil();
        let mut cs = Self {
            tmname: [nil; TM_N],
            tm_pairs: nil,
            tm_ipairs: nil,
            tm_name: nil,
            tm_metatable: nil,
            str_suspended: nil,
            str_running: nil,
            str_normal: nil,
            str_dead: nil,
            str_nil: nil,
            str_boolean: nil,
            str_number: nil,
            str_string: nil,
            str_table: nil,
            str_function: nil,
            str_userdata: nil,
            str_thread: nil,
            str_true: nil,
            str_false: nil,
            str_integer: nil,
            str_float: nil,
        };

        // Pre-create all metamethod name strings indexed by TmKind discriminant
        // (like Lua's luaT_init: G(L)->tmname[i])
        let tm_names: [&str; TM_N] = [
            "__index",    // 0  Index
            "__newindex", // 1  NewIndex
            "__gc",       // 2  Gc
            "__mode",     // 3  Mode
            "__len",      // 4  Len
            "__eq",       // 5  Eq
            "__add",      // 6  Add
            "__sub",      // 7  Sub
            "__mul",      // 8  Mul
            "__mod",      // 9  Mod
            "__pow",      // 10 Pow
            "__div",      // 11 Div
            "__idiv",     // 12 IDiv
            "__band",     // 13 Band
            "__bor",      // 14 Bor
            "__bxor",     // 15 Bxor
            "__shl",      // 16 Shl
            "__shr",      // 17 Shr
            "__unm",      // 18 Unm
            "__bnot",     // 19 Bnot
            "__lt",       // 20 Lt
            "__le",       // 21 Le
            "__concat",   // 22 Concat
            "__call",     // 23 Call
            "__close",    // 24 Close
            "__tostring", // 25 ToString
        ];
        for (i, name) in tm_names.iter().enumerate() {
            cs.tmname[i] = make(pool, gc, name);
        }

        // Extra metamethod-like strings (not indexed by TmKind)
        cs.tm_pairs = make(pool, gc, "__pairs");
        cs.tm_ipairs = make(pool, gc, "__ipairs");
        cs.tm_name = make(pool, gc, "__name");
        cs.tm_metatable = make(pool, gc, "__metatable");
        // Pre-create coroutine status strings
        cs.str_suspended = make(pool, gc, "suspended");
        cs.str_running = make(pool, gc, "running");
        cs.str_normal = make(pool, gc, "normal");
        cs.str_dead = make(pool, gc, "dead");

        // Pre-create type name strings (for type(), tostring(), math.type())
        cs.str_nil = make(pool, gc, "nil");
        cs.str_boolean = make(pool, gc, "boolean");
        cs.str_number = make(pool, gc, "number");
        cs.str_string = make(pool, gc, "string");
        cs.str_table = make(pool, gc, "table");
        cs.str_function = make(pool, gc, "function");
        cs.str_userdata = make(pool, gc, "userdata");
        cs.str_thread = make(pool, gc, "thread");
        cs.str_true = make(pool, gc, "true");
        cs.str_false = make(pool, gc, "false");
        cs.str_integer = make(pool, gc, "integer");
        cs.str_float = make(pool, gc, "float");

        // Fix all metamethod name strings — they should never be collected
        // (like Lua's luaC_fix in luaT_init)
        for i in 0..TM_N {
            gc.fixed(cs.tmname[i].as_gc_id().unwrap(), pool);
        }
        gc.fixed(cs.tm_pairs.as_gc_id().unwrap(), pool);
        gc.fixed(cs.tm_ipairs.as_gc_id().unwrap(), pool);
        gc.fixed(cs.tm_name.as_gc_id().unwrap(), pool);
        gc.fixed(cs.tm_metatable.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_suspended.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_running.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_normal.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_dead.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_nil.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_boolean.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_number.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_string.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_table.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_function.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_userdata.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_thread.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_true.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_false.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_integer.as_gc_id().unwrap(), pool);
        gc.fixed(cs.str_float.as_gc_id().unwrap(), pool);

        gc.tm_gc = cs.tmname[TmKind::Gc as usize];
        gc.tm_mode = cs.tmname[TmKind::Mode as usize];
        cs
    }

    /// Get pre-cached metamethod name string by TmKind enum value — O(1) array index.
    /// This is the fast path for metamethod lookup in hot code.
    /// Equivalent to C Lua's `G(L)->tmname[event]`.
    #[inline(always)]
    pub fn get_tm_value(&self, tm: TmKind) -> LuaValue {
        unsafe { *self.tmname.get_unchecked(tm as usize) }
    }
}
