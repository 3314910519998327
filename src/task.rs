//! Delegated tasks.
//!
//! With [`Config::delegate_tasks`](crate::Config::delegate_tasks) set,
//! the handshake does not sign or verify signatures itself. It suspends,
//! reports [`HandshakeStatus::NeedTask`](crate::HandshakeStatus::NeedTask)
//! and hands out a [`DelegatedTask`] the caller runs on any thread. The
//! result goes back through
//! [`Handshaker::complete_task`](crate::Handshaker::complete_task), where
//! an error surfaces exactly as if the work had been done inline.
//!
//! At most one task is in flight per handshake.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::buffer::Buf;
use crate::crypto::{SignatureVerifier, SigningKey};
use crate::types::SignatureScheme;

/// Work the handshake needs done before it can continue.
pub enum DelegatedTask {
    /// Produce a signature with a local key.
    Sign {
        key: Arc<dyn SigningKey>,
        scheme: SignatureScheme,
        message: Buf,
    },
    /// Check a peer signature.
    Verify {
        verifier: &'static dyn SignatureVerifier,
        public_key: Buf,
        scheme: SignatureScheme,
        message: Buf,
        signature: Buf,
    },
}

/// Outcome of a [`DelegatedTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    Signed(Result<Buf, String>),
    Verified(Result<(), String>),
    /// The task panicked.
    Panicked(String),
}

impl DelegatedTask {
    /// Run the task. Panics inside the crypto provider are caught.
    pub fn run(self) -> TaskResult {
        let r = catch_unwind(AssertUnwindSafe(|| match self {
            DelegatedTask::Sign {
                key,
                scheme,
                message,
            } => {
                let mut out = Buf::new();
                TaskResult::Signed(key.sign(scheme, &message, &mut out).map(|_| out))
            }
            DelegatedTask::Verify {
                verifier,
                public_key,
                scheme,
                message,
                signature,
            } => TaskResult::Verified(verifier.verify_signature(
                &public_key,
                &message,
                &signature,
                scheme,
            )),
        }));

        r.unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            TaskResult::Panicked(reason)
        })
    }

    pub fn is_sign(&self) -> bool {
        matches!(self, DelegatedTask::Sign { .. })
    }
}

impl fmt::Debug for DelegatedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelegatedTask::Sign { scheme, message, .. } => f
                .debug_struct("Sign")
                .field("scheme", scheme)
                .field("message", message)
                .finish(),
            DelegatedTask::Verify { scheme, message, .. } => f
                .debug_struct("Verify")
                .field("scheme", scheme)
                .field("message", message)
                .finish(),
        }
    }
}

/// The single task slot of a handshake.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    /// Queued, not yet handed out.
    queued: Option<DelegatedTask>,
    /// Handed out, result not yet back.
    outstanding: bool,
    /// Result waiting to be picked up by the suspended step.
    result: Option<TaskResult>,
}

impl TaskSlot {
    pub fn queue(&mut self, task: DelegatedTask) {
        debug!("Delegating {:?}", task);
        self.queued = Some(task);
    }

    pub fn take(&mut self) -> Option<DelegatedTask> {
        let t = self.queued.take();
        if t.is_some() {
            self.outstanding = true;
        }
        t
    }

    /// A task is queued or out with the caller.
    pub fn is_pending(&self) -> bool {
        self.queued.is_some() || self.outstanding
    }

    /// Store the result of the pending task. False if none was pending.
    pub fn complete(&mut self, result: TaskResult) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.queued = None;
        self.outstanding = false;
        self.result = Some(result);
        true
    }

    pub fn take_result(&mut self) -> Option<TaskResult> {
        self.result.take()
    }
}
