// Filesystem sandbox policy - allow/deny rules over paths and actions.
//
// `Option<FsPolicy>` lives on `LuaVM`: `None` is fully unrestricted,
// the same "absence means unlimited" convention `SafeOption` and
// `ResourceContext` use elsewhere in the sandbox subsystem. A policy is
// a `Rulechain`: an ordered list of `Rule`s, each a path prefix plus the
// `FsAction`s it covers and whether it allows or denies them. The first
// rule whose prefix matches the requested path wins; no match falls
// through to the chain's default (deny unless `FsPolicy::permissive`
// was used to build it).

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsAction(pub u8);

impl FsAction {
    pub const READ: FsAction = FsAction(1 << 0);
    pub const WRITE: FsAction = FsAction(1 << 1);
    pub const REMOVE: FsAction = FsAction(1 << 2);
    pub const RENAME: FsAction = FsAction(1 << 3);
    pub const EXECUTE: FsAction = FsAction(1 << 4);

    pub fn contains(self, other: FsAction) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for FsAction {
    type Output = FsAction;
    fn bitor(self, rhs: FsAction) -> FsAction {
        FsAction(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    /// Path prefix this rule matches (checked with `Path::starts_with`).
    pub prefix: PathBuf,
    pub actions: FsAction,
    pub allow: bool,
}

impl Rule {
    pub fn allow(prefix: impl Into<PathBuf>, actions: FsAction) -> Self {
        Self {
            prefix: prefix.into(),
            actions,
            allow: true,
        }
    }

    pub fn deny(prefix: impl Into<PathBuf>, actions: FsAction) -> Self {
        Self {
            prefix: prefix.into(),
            actions,
            allow: false,
        }
    }
}

/// An ordered chain of [`Rule`]s plus a default verdict for paths no
/// rule matches.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    rules: Vec<Rule>,
    default_allow: bool,
}

impl Ruleset {
    pub fn new(default_allow: bool) -> Self {
        Self {
            rules: Vec::new(),
            default_allow,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Union of every rule's verdict whose prefix matches `path` and
    /// whose actions overlap `action`: a single denying rule anywhere in
    /// the chain wins over an earlier allow, matching the "deny is a
    /// union across the ruleset" property the sandbox is tested against.
    fn check(&self, path: &Path, action: FsAction) -> bool {
        let mut matched = false;
        let mut allowed = false;
        for rule in &self.rules {
            if rule.actions.0 & action.0 == 0 || !path.starts_with(&rule.prefix) {
                continue;
            }
            if !rule.allow {
                // A denying rule wins immediately, regardless of any
                // earlier allow - deny is a union across the ruleset.
                return false;
            }
            matched = true;
            allowed = true;
        }
        if matched { allowed } else { self.default_allow }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FsPolicy {
    ruleset: Ruleset,
}

impl FsPolicy {
    /// A policy that denies everything unless explicitly allowed.
    pub fn locked_down() -> Self {
        Self {
            ruleset: Ruleset::new(false),
        }
    }

    /// A policy that allows everything unless explicitly denied - useful
    /// for "trust the script except for these paths" embeddings.
    pub fn permissive() -> Self {
        Self {
            ruleset: Ruleset::new(true),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.ruleset = self.ruleset.with_rule(rule);
        self
    }

    pub fn permits(&self, path: impl AsRef<Path>, action: FsAction) -> bool {
        self.ruleset.check(path.as_ref(), action)
    }
}
