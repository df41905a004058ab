use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attach/start behaviour requested from the workflow engine for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Reuse a running or completed execution; start only if none exists or the last one failed.
    AttachOrStart,
    /// Terminate whatever runs under the identity and start a new execution.
    ForceNew,
}

impl Disposition {
    /// Engine reuse policy that enforces this disposition for closed executions.
    pub fn reuse_policy(self) -> ReusePolicy {
        match self {
            Disposition::AttachOrStart => ReusePolicy::AllowDuplicateFailedOnly,
            Disposition::ForceNew => ReusePolicy::AllowDuplicate,
        }
    }

    /// Engine conflict policy that enforces this disposition for running executions.
    pub fn conflict_policy(self) -> ConflictPolicy {
        match self {
            Disposition::AttachOrStart => ConflictPolicy::UseExisting,
            Disposition::ForceNew => ConflictPolicy::TerminateExisting,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Disposition::AttachOrStart => "attach_or_start",
            Disposition::ForceNew => "force_new",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the engine does when the identity belongs to a closed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReusePolicy {
    AllowDuplicate,
    AllowDuplicateFailedOnly,
}

impl ReusePolicy {
    pub fn as_engine_str(self) -> &'static str {
        match self {
            ReusePolicy::AllowDuplicate => "WORKFLOW_ID_REUSE_POLICY_ALLOW_DUPLICATE",
            ReusePolicy::AllowDuplicateFailedOnly => "WORKFLOW_ID_REUSE_POLICY_ALLOW_DUPLICATE_FAILED_ONLY",
        }
    }
}

/// What the engine does when the identity belongs to a running execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictPolicy {
    UseExisting,
    TerminateExisting,
}

impl ConflictPolicy {
    pub fn as_engine_str(self) -> &'static str {
        match self {
            ConflictPolicy::UseExisting => "WORKFLOW_ID_CONFLICT_POLICY_USE_EXISTING",
            ConflictPolicy::TerminateExisting => "WORKFLOW_ID_CONFLICT_POLICY_TERMINATE_EXISTING",
        }
    }
}

/// Identity under which an execution is started or attached to.
///
/// Never empty: an empty template result is replaced by [`ExecutionIdentity::random`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionIdentity(String);

impl ExecutionIdentity {
    /// Wraps `value`, returning `None` when it is empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() { None } else { Some(Self(value)) }
    }

    /// Random identity for invocations without a stable one.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExecutionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExecutionIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
