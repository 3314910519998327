//! Ordered sets of handshake messages still to produce or consume.

use std::fmt;

use crate::types::HandshakeType;

/// An insertion-ordered set of handshake message types.
///
/// Consuming a message drops every entry queued before it. Those were
/// optional messages the peer chose not to send.
#[derive(Default, Clone, PartialEq, Eq)]
pub(crate) struct WorkQueue {
    name: &'static str,
    items: Vec<HandshakeType>,
}

impl WorkQueue {
    pub fn new(name: &'static str) -> Self {
        WorkQueue {
            name,
            items: Vec::new(),
        }
    }

    /// Append `t` unless it is already queued.
    pub fn push(&mut self, t: HandshakeType) {
        if !self.items.contains(&t) {
            trace!("{} += {}", self.name, t);
            self.items.push(t);
        }
    }

    pub fn extend(&mut self, ts: &[HandshakeType]) {
        for t in ts {
            self.push(*t);
        }
    }

    pub fn contains(&self, t: HandshakeType) -> bool {
        self.items.contains(&t)
    }

    pub fn first(&self) -> Option<HandshakeType> {
        self.items.first().copied()
    }

    /// Remove `t`. Returns whether it was queued.
    pub fn remove(&mut self, t: HandshakeType) -> bool {
        let Some(pos) = self.items.iter().position(|i| *i == t) else {
            return false;
        };
        trace!("{} -= {}", self.name, t);
        self.items.remove(pos);
        true
    }

    /// Remove `t` and everything queued before it.
    ///
    /// Returns false, leaving the queue untouched, if `t` is not queued.
    pub fn take_through(&mut self, t: HandshakeType) -> bool {
        let Some(pos) = self.items.iter().position(|i| *i == t) else {
            return false;
        };
        for skipped in &self.items[..pos] {
            trace!("{} skips {}", self.name, skipped);
        }
        self.items.drain(..=pos);
        true
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            trace!("{} cleared", self.name);
        }
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter().map(|t| t.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use HandshakeType::*;

    #[test]
    fn push_is_idempotent() {
        let mut q = WorkQueue::new("producers");
        q.extend(&[ServerHello, Certificate, ServerHello]);
        assert_eq!(q.len(), 2);
        assert_eq!(q.first(), Some(ServerHello));
    }

    #[test]
    fn consuming_skips_optional_entries() {
        let mut q = WorkQueue::new("consumers");
        q.extend(&[Certificate, CertificateStatus, ServerKeyExchange, CertificateRequest, ServerHelloDone]);
        assert!(q.take_through(ServerKeyExchange));
        assert_eq!(q.first(), Some(CertificateRequest));
        assert!(!q.take_through(Certificate));
        assert_eq!(q.len(), 2);
        assert!(q.take_through(ServerHelloDone));
        assert!(q.is_empty());
    }

    #[test]
    fn remove_single() {
        let mut q = WorkQueue::new("consumers");
        q.extend(&[Certificate, CertificateVerify, Finished]);
        assert!(q.remove(CertificateVerify));
        assert!(!q.remove(CertificateVerify));
        assert!(!q.contains(CertificateVerify));
        assert_eq!(q.len(), 2);
    }
}
