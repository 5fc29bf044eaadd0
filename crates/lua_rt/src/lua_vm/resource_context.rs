// Resource accounting - cpu/mem/timer-limited execution contexts.
//
// Modeled the same way `SafeOption` models its own limits: a small
// `Copy` struct of budgets, with "no limit" spelled as the type's max
// value rather than a separate `Option` layer. A `LuaVM` holds a plain
// `Vec<ResourceContext>` stack (single-threaded runtime, no `Rc`/`RefCell`
// needed) - pushing a child computes its limits as the element-wise
// minimum against the parent's *remaining* budget, so a nested context
// can never see a looser ceiling than the context that spawned it.

use crate::lua_vm::safety_flags::SafetyFlags;
use chrono::{DateTime, Utc};

/// Budgets for one resource context. `usize::MAX` / `isize::MAX` mean
/// "inherit whatever the enclosing context allows" (i.e. unlimited at
/// the root).
#[derive(Debug, Clone, Copy)]
pub struct ContextLimits {
    /// Instructions the context may execute before being killed.
    pub cpu: u64,
    /// Bytes the context may have live on the GC heap at once.
    pub mem: isize,
    /// Wall-clock budget.
    pub timer: std::time::Duration,
    /// Capabilities native calls made from this context may use.
    pub safety: SafetyFlags,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            cpu: u64::MAX,
            mem: isize::MAX,
            timer: std::time::Duration::MAX,
            safety: SafetyFlags::all(),
        }
    }
}

impl ContextLimits {
    /// Clamp `self` to never exceed `parent`'s limits, field by field.
    pub fn clamped_to(mut self, parent: &ContextLimits) -> Self {
        self.cpu = self.cpu.min(parent.cpu);
        self.mem = self.mem.min(parent.mem);
        self.timer = self.timer.min(parent.timer);
        self.safety = SafetyFlags::of(self.safety.0 & parent.safety.0);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStatus {
    Running,
    /// Killed by cpu, mem, or timer exhaustion. Uncatchable - see
    /// `LuaError::ResourceKilled`.
    Killed,
}

/// One entry on `LuaVM`'s resource-context stack.
#[derive(Debug, Clone)]
pub struct ResourceContext {
    pub limits: ContextLimits,
    /// Instructions (native calls, in this implementation) spent so far.
    pub cpu_used: u64,
    pub started_at: DateTime<Utc>,
    pub status: ContextStatus,
}

impl ResourceContext {
    /// A root context with no enclosing parent.
    pub fn root(limits: ContextLimits) -> Self {
        Self {
            limits,
            cpu_used: 0,
            started_at: Utc::now(),
            status: ContextStatus::Running,
        }
    }

    /// A child nested inside `parent`, with limits clamped to whatever
    /// budget `parent` has left.
    pub fn nested(limits: ContextLimits, parent: &ResourceContext) -> Self {
        let remaining = parent.remaining();
        Self {
            limits: limits.clamped_to(&remaining),
            cpu_used: 0,
            started_at: Utc::now(),
            status: ContextStatus::Running,
        }
    }

    /// The budget this context has *left*, expressed as a fresh
    /// `ContextLimits` - used both to clamp children and to report
    /// `runtime.remaining()` to scripts.
    pub fn remaining(&self) -> ContextLimits {
        ContextLimits {
            cpu: self.limits.cpu.saturating_sub(self.cpu_used),
            mem: self.limits.mem,
            timer: self
                .limits
                .timer
                .saturating_sub(self.elapsed()),
            safety: self.limits.safety,
        }
    }

    fn elapsed(&self) -> std::time::Duration {
        (Utc::now() - self.started_at)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }

    /// Tick one unit of cpu usage (charged per native call, see
    /// `execute::call`'s two `CFunction` call sites) and check every
    /// budget. Returns `Err` the moment any limit is exceeded; the
    /// caller maps that into `LuaError::ResourceKilled`.
    pub fn tick(&mut self, mem_now: isize) -> Result<(), ()> {
        if self.status == ContextStatus::Killed {
            return Err(());
        }
        self.cpu_used += 1;
        if self.cpu_used > self.limits.cpu || mem_now > self.limits.mem || self.elapsed() > self.limits.timer {
            self.status = ContextStatus::Killed;
            return Err(());
        }
        Ok(())
    }
}
