//! Safe, embedding-oriented wrapper APIs built on top of [`lua_rt`].
//!
//! Bundles a `sandbox`-feature-gated builder for resource-limited,
//! filesystem-policed Lua contexts so host applications don't have to wire
//! up `lua_rt`'s lower-level accounting and policy types by hand.

#[cfg(feature = "sandbox")]
use lua_rt::lua_vm::{ContextLimits, FsPolicy};
use lua_rt::{LuaResult, LuaVM, SafeOption, Stdlib, LuaValue};

/// Builds a [`LuaVM`] pre-configured with a standard-library selection and,
/// when the `sandbox` feature is enabled, a resource-accounting context and
/// filesystem policy.
///
/// ```ignore
/// let mut vm = SandboxBuilder::new()
///     .stdlibs(&[Stdlib::Basic, Stdlib::Math, Stdlib::String])
///     .limits(ContextLimits { cpu: 100_000, ..Default::default() })
///     .fs_policy(FsPolicy::locked_down())
///     .build();
/// let results = vm.run("return 1 + 1")?;
/// ```
pub struct SandboxBuilder {
    option: SafeOption,
    stdlibs: Vec<Stdlib>,
    #[cfg(feature = "sandbox")]
    limits: Option<ContextLimits>,
    #[cfg(feature = "sandbox")]
    fs_policy: Option<FsPolicy>,
}

impl SandboxBuilder {
    /// Start from a permissive default: the full standard library, no
    /// resource limits, and (when sandboxing is compiled in) no filesystem
    /// policy installed.
    pub fn new() -> Self {
        Self {
            option: SafeOption::default(),
            stdlibs: vec![Stdlib::All],
            #[cfg(feature = "sandbox")]
            limits: None,
            #[cfg(feature = "sandbox")]
            fs_policy: None,
        }
    }

    /// Override the VM's stack-size/call-depth/memory-limit parameters.
    pub fn safe_option(mut self, option: SafeOption) -> Self {
        self.option = option;
        self
    }

    /// Restrict which standard library modules get registered. Defaults to
    /// `&[Stdlib::All]`.
    pub fn stdlibs(mut self, libs: &[Stdlib]) -> Self {
        self.stdlibs = libs.to_vec();
        self
    }

    /// Install a root resource-accounting context with the given
    /// cpu/mem/timer/safety budgets. Only available with the `sandbox`
    /// feature.
    #[cfg(feature = "sandbox")]
    pub fn limits(mut self, limits: ContextLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Install a filesystem policy gating `os.remove`/`os.rename`/`io.open`.
    /// Only available with the `sandbox` feature.
    #[cfg(feature = "sandbox")]
    pub fn fs_policy(mut self, policy: FsPolicy) -> Self {
        self.fs_policy = Some(policy);
        self
    }

    /// Build the configured [`LuaVM`], with the standard library loaded and
    /// (if set) the resource context pushed and filesystem policy installed.
    pub fn build(self) -> LuaResult<SandboxedVm> {
        let mut vm = LuaVM::new(self.option);
        vm.open_stdlibs(&self.stdlibs)?;

        #[cfg(feature = "sandbox")]
        {
            if let Some(limits) = self.limits {
                vm.push_context(limits);
            }
            if let Some(policy) = self.fs_policy {
                vm.set_fs_policy(Some(policy));
            }
        }

        Ok(SandboxedVm { vm })
    }
}

impl Default for SandboxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`LuaVM`] assembled by [`SandboxBuilder`]. Thin wrapper that forwards
/// execution to the inner VM; kept separate from `LuaVM` itself so this
/// crate can grow embedding-only conveniences without touching `lua_rt`.
pub struct SandboxedVm {
    vm: Box<LuaVM>,
}

impl SandboxedVm {
    /// Run a chunk of Lua source to completion, returning its top-level
    /// return values.
    pub fn run(&mut self, source: &str) -> LuaResult<Vec<LuaValue>> {
        self.vm.execute_string(source)
    }

    /// Borrow the underlying VM for anything this wrapper doesn't expose
    /// directly (globals, further stdlib registration, etc.).
    pub fn vm(&mut self) -> &mut LuaVM {
        &mut self.vm
    }

    /// End the root resource context pushed by [`SandboxBuilder::limits`],
    /// if any, returning its final status.
    #[cfg(feature = "sandbox")]
    pub fn finish(&mut self) -> Option<lua_rt::lua_vm::ResourceContext> {
        self.vm.pop_context()
    }
}
