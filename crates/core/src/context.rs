//! Per-operation execution context.
//!
//! One [`ExecutionContext`] is created per inbound operation and
//! discarded when the operation ends. It carries the tenant the
//! operation executes for, the correlation id, the acting user, the
//! business-operation tag, a clock, and the diagnostic messages
//! collected along the way. It is owned by a single logical operation
//! and never persisted or shared across operations.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};

/// Severity of a collected diagnostic. Ordered so a minimum level can
/// act as an append filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageLevel {
    Trace,
    Info,
    Warning,
    Error,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageLevel::Trace => "trace",
            MessageLevel::Info => "info",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// One diagnostic collected during an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub level: MessageLevel,
    /// Stable code of the form `<Entity>.<Field>.<Kind>`, e.g.
    /// `OneTimeToken.TokenHash.IsRequired`.
    pub code: String,
    /// Human-readable explanation. Callers present this; the code is
    /// what they branch on.
    pub text: String,
}

/// Tenant the current operation executes for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInfo {
    pub tenant_id: Uuid,
    pub name: String,
}

impl TenantInfo {
    pub fn new(tenant_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            name: name.into(),
        }
    }
}

/// Carrier of tenant identity, correlation, audit actor, clock, and
/// collected diagnostics for one operation.
///
/// Messages are appended through `&self` (the context is threaded
/// through handler closures and async calls by shared reference), so
/// the message list sits behind a mutex. Appends below the minimum
/// level are discarded.
pub struct ExecutionContext {
    correlation_id: Uuid,
    tenant: TenantInfo,
    execution_user: String,
    execution_origin: String,
    business_operation: String,
    minimum_level: MessageLevel,
    clock: Arc<dyn Clock>,
    messages: Mutex<Vec<ContextMessage>>,
}

impl ExecutionContext {
    /// New context with a fresh correlation id, the system clock, and
    /// `Info` as the minimum collected level.
    pub fn new(
        tenant: TenantInfo,
        execution_user: impl Into<String>,
        execution_origin: impl Into<String>,
        business_operation: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            tenant,
            execution_user: execution_user.into(),
            execution_origin: execution_origin.into(),
            business_operation: business_operation.into(),
            minimum_level: MessageLevel::Info,
            clock: Arc::new(SystemClock),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Replace the clock. Tests pin a [`FixedClock`](crate::FixedClock)
    /// here so audit timestamps are assertable.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Drop collected messages below `level`.
    pub fn with_minimum_level(mut self, level: MessageLevel) -> Self {
        self.minimum_level = level;
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn tenant(&self) -> &TenantInfo {
        &self.tenant
    }

    pub fn execution_user(&self) -> &str {
        &self.execution_user
    }

    pub fn execution_origin(&self) -> &str {
        &self.execution_origin
    }

    pub fn business_operation(&self) -> &str {
        &self.business_operation
    }

    /// Current instant per this operation's clock.
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Append a diagnostic unless it falls below the minimum level.
    pub fn add_message(
        &self,
        level: MessageLevel,
        code: impl Into<String>,
        text: impl Into<String>,
    ) {
        if level < self.minimum_level {
            return;
        }
        let mut messages = self.messages.lock().expect("context message lock poisoned");
        messages.push(ContextMessage {
            level,
            code: code.into(),
            text: text.into(),
        });
    }

    pub fn add_error(&self, code: impl Into<String>, text: impl Into<String>) {
        self.add_message(MessageLevel::Error, code, text);
    }

    pub fn add_warning(&self, code: impl Into<String>, text: impl Into<String>) {
        self.add_message(MessageLevel::Warning, code, text);
    }

    pub fn add_info(&self, code: impl Into<String>, text: impl Into<String>) {
        self.add_message(MessageLevel::Info, code, text);
    }

    /// Snapshot of the messages collected so far, in append order.
    pub fn messages(&self) -> Vec<ContextMessage> {
        self.messages
            .lock()
            .expect("context message lock poisoned")
            .clone()
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .lock()
            .expect("context message lock poisoned")
            .iter()
            .any(|m| m.level == MessageLevel::Error)
    }

    /// Whether any collected message carries exactly this code.
    pub fn has_message(&self, code: &str) -> bool {
        self.messages
            .lock()
            .expect("context message lock poisoned")
            .iter()
            .any(|m| m.code == code)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("correlation_id", &self.correlation_id)
            .field("tenant", &self.tenant)
            .field("execution_user", &self.execution_user)
            .field("execution_origin", &self.execution_origin)
            .field("business_operation", &self.business_operation)
            .field("minimum_level", &self.minimum_level)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}
