//! Negotiated sessions and the session cache.
//!
//! A [`HandshakeSession`] is filled in while a handshake runs and is
//! finished exactly once into an immutable [`Session`] shared behind an
//! `Arc`. The few things that change after that (invalidation, the single
//! use PSK identity, the ticket nonce counter, application bound values
//! and the list of child sessions) sit behind atomics and locks, so a
//! session can be used from many connections at once.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;

use crate::buffer::Buf;
use crate::crypto::SigningKey;
use crate::suite::CipherSuiteDescriptor;
use crate::types::{ProtocolVersion, SessionId, SignatureScheme};

// ============================================================================
// Session
// ============================================================================

/// An established session.
pub struct Session {
    id: SessionId,
    version: ProtocolVersion,
    suite: &'static CipherSuiteDescriptor,
    /// Master secret before 1.3, resumption master secret from 1.3.
    master_secret: Buf,
    /// Resumption PSK of a 1.3 ticket.
    psk: Option<Buf>,
    psk_identity: Mutex<Option<Buf>>,
    ticket_age_add: u32,
    ticket_lifetime: Option<Duration>,
    created: Instant,
    local_chain: Vec<Buf>,
    peer_chain: Vec<Buf>,
    local_key: Option<Arc<dyn SigningKey>>,
    ocsp_responses: Vec<Buf>,
    local_schemes: Vec<SignatureScheme>,
    peer_schemes: Vec<SignatureScheme>,
    extended_master_secret: bool,
    endpoint_identification: Option<String>,
    server_name: Option<String>,
    alpn: Option<Vec<u8>>,

    invalidated: AtomicBool,
    ticket_nonce: AtomicU64,
    children: Mutex<Vec<Weak<Session>>>,
    /// Keeps the chain up to the root alive for the cascade.
    parent: OnceCell<Arc<Session>>,
    bound_values: RwLock<HashMap<String, Vec<u8>>>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn suite(&self) -> &'static CipherSuiteDescriptor {
        self.suite
    }

    pub(crate) fn master_secret(&self) -> &[u8] {
        &self.master_secret
    }

    pub(crate) fn psk(&self) -> Option<&[u8]> {
        self.psk.as_deref()
    }

    pub fn ticket_age_add(&self) -> u32 {
        self.ticket_age_add
    }

    pub fn ticket_lifetime(&self) -> Option<Duration> {
        self.ticket_lifetime
    }

    pub fn creation_time(&self) -> Instant {
        self.created
    }

    pub fn local_chain(&self) -> &[Buf] {
        &self.local_chain
    }

    pub fn peer_chain(&self) -> &[Buf] {
        &self.peer_chain
    }

    /// Whether the peer authenticated with a certificate.
    pub fn has_peer_principal(&self) -> bool {
        !self.peer_chain.is_empty()
    }

    pub fn ocsp_responses(&self) -> &[Buf] {
        &self.ocsp_responses
    }

    /// Signature schemes we supported when the session was established.
    pub fn local_schemes(&self) -> &[SignatureScheme] {
        &self.local_schemes
    }

    /// Signature schemes the peer supported.
    pub fn peer_schemes(&self) -> &[SignatureScheme] {
        &self.peer_schemes
    }

    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    pub fn endpoint_identification(&self) -> Option<&str> {
        self.endpoint_identification.as_deref()
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn alpn(&self) -> Option<&[u8]> {
        self.alpn.as_deref()
    }

    /// Whether this session may be resumed.
    ///
    /// A session that was authenticated with a local key that is no
    /// longer usable is invalidated on the spot.
    pub fn is_rejoinable(&self) -> bool {
        if self.is_invalidated() {
            return false;
        }
        if !self.version.uses_tls13_key_schedule() && self.id.is_empty() {
            return false;
        }
        if let Some(key) = &self.local_key {
            if !key.is_usable() {
                debug!("Local key of session unusable, invalidating");
                self.invalidate();
                return false;
            }
        }
        true
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Invalidate this session and every session derived from it.
    pub fn invalidate(&self) {
        if self.invalidated.swap(true, Ordering::AcqRel) {
            return;
        }
        let children = match self.children.lock() {
            Ok(mut c) => std::mem::take(&mut *c),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.invalidate();
        }
    }

    /// Register a session derived from this one, such as a resumed
    /// session or a ticket.
    pub fn add_child(self: &Arc<Self>, child: &Arc<Session>) {
        if self.is_invalidated() {
            child.invalidate();
            return;
        }
        if child.parent.set(self.clone()).is_err() {
            warn!("Session already has a parent");
            return;
        }
        if let Ok(mut c) = self.children.lock() {
            c.retain(|w| w.strong_count() > 0);
            c.push(Arc::downgrade(child));
        }
    }

    /// Take the PSK identity. Each identity is offered at most once.
    pub fn take_psk_identity(&self) -> Option<Buf> {
        self.psk_identity.lock().ok().and_then(|mut i| i.take())
    }

    /// Nonce for the next ticket issued from this session.
    pub fn next_ticket_nonce(&self) -> u64 {
        self.ticket_nonce.fetch_add(1, Ordering::AcqRel)
    }

    /// Obfuscated ticket age (RFC 8446 Section 4.2.11.1).
    pub fn obfuscated_ticket_age(&self, now: Instant) -> u32 {
        let age_ms = now.saturating_duration_since(self.created).as_millis() as u32;
        age_ms.wrapping_add(self.ticket_age_add)
    }

    pub(crate) fn is_expired(&self, now: Instant, cache_lifetime: Duration) -> bool {
        let lifetime = self
            .ticket_lifetime
            .map_or(cache_lifetime, |l| l.min(cache_lifetime));
        now.saturating_duration_since(self.created) > lifetime
    }

    /// Attach an application value to the session.
    pub fn put_value(&self, name: impl Into<String>, value: Vec<u8>) {
        if let Ok(mut v) = self.bound_values.write() {
            v.insert(name.into(), value);
        }
    }

    pub fn value(&self, name: &str) -> Option<Vec<u8>> {
        self.bound_values.read().ok()?.get(name).cloned()
    }

    pub fn remove_value(&self, name: &str) -> Option<Vec<u8>> {
        self.bound_values.write().ok()?.remove(name)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.version)
            .field("suite", &self.suite.name)
            .field("id_len", &self.id.as_slice().len())
            .field("psk", &self.psk.is_some())
            .field("invalidated", &self.is_invalidated())
            .finish()
    }
}

// ============================================================================
// Handshake Session
// ============================================================================

/// Session state collected during a handshake.
pub(crate) struct HandshakeSession {
    pub id: SessionId,
    pub version: ProtocolVersion,
    pub suite: Option<&'static CipherSuiteDescriptor>,
    pub master_secret: Buf,
    pub psk: Option<Buf>,
    pub psk_identity: Option<Buf>,
    pub ticket_age_add: u32,
    pub ticket_lifetime: Option<Duration>,
    pub created: Instant,
    pub local_chain: Vec<Buf>,
    pub peer_chain: Vec<Buf>,
    pub local_key: Option<Arc<dyn SigningKey>>,
    pub ocsp_responses: Vec<Buf>,
    pub local_schemes: Vec<SignatureScheme>,
    pub peer_schemes: Vec<SignatureScheme>,
    pub extended_master_secret: bool,
    pub endpoint_identification: Option<String>,
    pub server_name: Option<String>,
    pub alpn: Option<Vec<u8>>,
}

impl HandshakeSession {
    pub fn new() -> Self {
        HandshakeSession {
            id: SessionId::empty(),
            version: ProtocolVersion::default(),
            suite: None,
            master_secret: Buf::new(),
            psk: None,
            psk_identity: None,
            ticket_age_add: 0,
            ticket_lifetime: None,
            created: Instant::now(),
            local_chain: Vec::new(),
            peer_chain: Vec::new(),
            local_key: None,
            ocsp_responses: Vec::new(),
            local_schemes: Vec::new(),
            peer_schemes: Vec::new(),
            extended_master_secret: false,
            endpoint_identification: None,
            server_name: None,
            alpn: None,
        }
    }

    /// Take over the facts of a session being resumed.
    pub fn resume_from(&mut self, s: &Session) {
        self.version = s.version;
        self.suite = Some(s.suite);
        self.local_chain = s.local_chain.clone();
        self.peer_chain = s.peer_chain.clone();
        self.local_key = s.local_key.clone();
        self.ocsp_responses = s.ocsp_responses.clone();
        self.local_schemes = s.local_schemes.clone();
        self.peer_schemes = s.peer_schemes.clone();
        self.extended_master_secret = s.extended_master_secret;
        self.endpoint_identification = s.endpoint_identification.clone();
        self.server_name = s.server_name.clone();
    }

    /// Finish into a shared session. Fails without a negotiated suite.
    pub fn finish(self) -> Option<Arc<Session>> {
        let suite = self.suite?;
        Some(Arc::new(Session {
            id: self.id,
            version: self.version,
            suite,
            master_secret: self.master_secret,
            psk: self.psk,
            psk_identity: Mutex::new(self.psk_identity),
            ticket_age_add: self.ticket_age_add,
            ticket_lifetime: self.ticket_lifetime,
            created: self.created,
            local_chain: self.local_chain,
            peer_chain: self.peer_chain,
            local_key: self.local_key,
            ocsp_responses: self.ocsp_responses,
            local_schemes: self.local_schemes,
            peer_schemes: self.peer_schemes,
            extended_master_secret: self.extended_master_secret,
            endpoint_identification: self.endpoint_identification,
            server_name: self.server_name,
            alpn: self.alpn,
            invalidated: AtomicBool::new(false),
            ticket_nonce: AtomicU64::new(0),
            children: Mutex::new(Vec::new()),
            parent: OnceCell::new(),
            bound_values: RwLock::new(HashMap::new()),
        }))
    }

    /// Derive a ticket session from an established 1.3 session.
    pub fn ticket_of(parent: &Session, psk: Buf, identity: Buf, age_add: u32, lifetime: Duration) -> Self {
        let mut s = HandshakeSession::new();
        s.resume_from(parent);
        s.alpn = parent.alpn.clone();
        s.psk = Some(psk);
        s.psk_identity = Some(identity);
        s.ticket_age_add = age_add;
        s.ticket_lifetime = Some(lifetime);
        s
    }
}

// ============================================================================
// Session Cache
// ============================================================================

/// Resumable sessions, shared between connections.
///
/// Servers look sessions up by session id (before 1.3) or by ticket
/// identity (1.3). Clients look them up by peer, the server name they
/// connect to.
pub struct SessionCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
    lifetime: Duration,
}

#[derive(Default)]
struct CacheInner {
    by_id: HashMap<Vec<u8>, Arc<Session>>,
    by_ticket: HashMap<Vec<u8>, Arc<Session>>,
    by_peer: HashMap<String, Vec<Arc<Session>>>,
    order: VecDeque<Arc<Session>>,
}

impl CacheInner {
    fn remove(&mut self, s: &Arc<Session>) {
        self.by_id.retain(|_, v| !Arc::ptr_eq(v, s));
        self.by_ticket.retain(|_, v| !Arc::ptr_eq(v, s));
        for list in self.by_peer.values_mut() {
            list.retain(|v| !Arc::ptr_eq(v, s));
        }
        self.by_peer.retain(|_, l| !l.is_empty());
        self.order.retain(|v| !Arc::ptr_eq(v, s));
    }
}

/// Default number of cached sessions.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Default session lifetime.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

impl Default for SessionCache {
    fn default() -> Self {
        SessionCache::new(DEFAULT_CACHE_CAPACITY, DEFAULT_SESSION_LIFETIME)
    }
}

impl SessionCache {
    /// A cache of at most `capacity` sessions living at most `lifetime`.
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        SessionCache {
            inner: RwLock::new(CacheInner::default()),
            capacity,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, session: Arc<Session>, f: impl FnOnce(&mut CacheInner, &Arc<Session>)) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        f(&mut inner, &session);
        // One slot per session, however many keys it is stored under.
        if !inner.order.iter().any(|v| Arc::ptr_eq(v, &session)) {
            inner.order.push_back(session);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.front().cloned() {
                inner.remove(&oldest);
            }
        }
    }

    /// Cache a session under its session id.
    pub fn put_by_id(&self, session: Arc<Session>) {
        if session.id().is_empty() {
            return;
        }
        self.insert(session, |inner, s| {
            inner.by_id.insert(s.id().as_slice().to_vec(), s.clone());
        });
    }

    /// Cache a ticket session under its PSK identity.
    pub fn put_by_ticket(&self, identity: &[u8], session: Arc<Session>) {
        self.insert(session, |inner, s| {
            inner.by_ticket.insert(identity.to_vec(), s.clone());
        });
    }

    /// Cache a session a client may resume with `peer`.
    pub fn put_by_peer(&self, peer: &str, session: Arc<Session>) {
        self.insert(session, |inner, s| {
            let list = inner.by_peer.entry(peer.to_string()).or_default();
            if !list.iter().any(|v| Arc::ptr_eq(v, s)) {
                list.push(s.clone());
            }
        });
    }

    fn usable(&self, s: &Arc<Session>, now: Instant) -> bool {
        !s.is_expired(now, self.lifetime) && s.is_rejoinable()
    }

    fn lookup(
        &self,
        find: impl Fn(&CacheInner) -> Option<Arc<Session>>,
    ) -> Option<Arc<Session>> {
        let now = Instant::now();
        let found = {
            let inner = self.inner.read().ok()?;
            find(&inner)?
        };
        if self.usable(&found, now) {
            return Some(found);
        }
        self.remove(&found);
        None
    }

    pub fn get_by_id(&self, id: &[u8]) -> Option<Arc<Session>> {
        if id.is_empty() {
            return None;
        }
        self.lookup(|i| i.by_id.get(id).cloned())
    }

    pub fn get_by_ticket(&self, identity: &[u8]) -> Option<Arc<Session>> {
        self.lookup(|i| i.by_ticket.get(identity).cloned())
    }

    /// Remove and return the ticket session for `identity`.
    ///
    /// Lookup and removal happen under one write lock. Of several
    /// handshakes presenting the same ticket, at most one gets it.
    pub fn take_by_ticket(&self, identity: &[u8]) -> Option<Arc<Session>> {
        let taken = {
            let mut inner = self.inner.write().ok()?;
            let s = inner.by_ticket.get(identity).cloned()?;
            inner.remove(&s);
            s
        };
        self.usable(&taken, Instant::now()).then_some(taken)
    }

    /// Newest resumable session for `peer`.
    pub fn get_by_peer(&self, peer: &str) -> Option<Arc<Session>> {
        let now = Instant::now();
        let candidates: Vec<Arc<Session>> = {
            let inner = self.inner.read().ok()?;
            inner.by_peer.get(peer)?.iter().rev().cloned().collect()
        };
        for s in candidates {
            if self.usable(&s, now) {
                return Some(s);
            }
            self.remove(&s);
        }
        None
    }

    pub fn remove(&self, session: &Arc<Session>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.remove(session);
        }
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::lookup_by_id;

    pub(crate) fn session(version: ProtocolVersion, id: &[u8]) -> Arc<Session> {
        let mut hs = HandshakeSession::new();
        hs.version = version;
        hs.suite = lookup_by_id(if version.uses_tls13_key_schedule() { 0x1301 } else { 0xC02B });
        hs.id = SessionId::try_new(id).unwrap();
        hs.master_secret = Buf::from_slice(&[0x11; 48]);
        hs.finish().unwrap()
    }

    #[test]
    fn invalidation_cascades() {
        let root = session(ProtocolVersion::TLS1_3, &[]);
        let child = session(ProtocolVersion::TLS1_3, &[]);
        let grandchild = session(ProtocolVersion::TLS1_3, &[]);
        root.add_child(&child);
        child.add_child(&grandchild);

        assert!(grandchild.is_rejoinable());
        root.invalidate();
        assert!(child.is_invalidated());
        assert!(grandchild.is_invalidated());
        assert!(!grandchild.is_rejoinable());

        // late children of an invalidated session are born invalid
        let late = session(ProtocolVersion::TLS1_3, &[]);
        root.add_child(&late);
        assert!(late.is_invalidated());
    }

    #[test]
    fn cascade_survives_dropped_intermediate() {
        let root = session(ProtocolVersion::TLS1_3, &[]);
        let ticket = session(ProtocolVersion::TLS1_3, &[]);
        let resumed = session(ProtocolVersion::TLS1_3, &[]);
        root.add_child(&ticket);
        ticket.add_child(&resumed);
        drop(ticket);

        root.invalidate();
        assert!(resumed.is_invalidated());
    }

    #[test]
    fn tls12_needs_session_id() {
        assert!(!session(ProtocolVersion::TLS1_2, &[]).is_rejoinable());
        assert!(session(ProtocolVersion::TLS1_2, &[1, 2, 3]).is_rejoinable());
        assert!(session(ProtocolVersion::TLS1_3, &[]).is_rejoinable());
    }

    #[test]
    fn psk_identity_single_use() {
        let mut hs = HandshakeSession::new();
        hs.suite = lookup_by_id(0x1301);
        hs.psk_identity = Some(Buf::from_slice(b"ticket"));
        let s = hs.finish().unwrap();
        assert_eq!(s.take_psk_identity().as_deref(), Some(&b"ticket"[..]));
        assert!(s.take_psk_identity().is_none());
        assert_eq!(s.next_ticket_nonce(), 0);
        assert_eq!(s.next_ticket_nonce(), 1);
    }

    #[test]
    fn cache_lookup_and_eviction() {
        let cache = SessionCache::new(2, DEFAULT_SESSION_LIFETIME);
        let a = session(ProtocolVersion::TLS1_2, &[1]);
        let b = session(ProtocolVersion::TLS1_2, &[2]);
        let c = session(ProtocolVersion::TLS1_2, &[3]);
        cache.put_by_id(a.clone());
        cache.put_by_id(b);
        assert!(cache.get_by_id(&[1]).is_some());
        cache.put_by_id(c);
        assert_eq!(cache.len(), 2);
        assert!(cache.get_by_id(&[1]).is_none());
        assert!(cache.get_by_id(&[3]).is_some());

        // invalidated sessions are dropped on lookup
        let d = session(ProtocolVersion::TLS1_3, &[]);
        cache.put_by_peer("example.com", d.clone());
        assert!(cache.get_by_peer("example.com").is_some());
        d.invalidate();
        assert!(cache.get_by_peer("example.com").is_none());
        assert!(a.is_rejoinable());
    }

    #[test]
    fn session_counts_once_against_capacity() {
        let cache = SessionCache::new(2, DEFAULT_SESSION_LIFETIME);
        let a = session(ProtocolVersion::TLS1_2, &[1]);
        let b = session(ProtocolVersion::TLS1_2, &[2]);
        cache.put_by_id(a.clone());
        cache.put_by_id(a.clone());
        cache.put_by_peer("example.com", a.clone());
        assert_eq!(cache.len(), 1);

        cache.put_by_id(b);
        assert_eq!(cache.len(), 2);
        assert!(cache.get_by_id(&[1]).is_some());
        assert!(cache.get_by_id(&[2]).is_some());
    }

    #[test]
    fn ticket_is_taken_once() {
        let cache = Arc::new(SessionCache::default());
        cache.put_by_ticket(b"ticket", session(ProtocolVersion::TLS1_3, &[]));

        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.take_by_ticket(b"ticket").is_some()
                })
            })
            .collect();

        let taken = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|t| *t)
            .count();
        assert_eq!(taken, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_sessions_not_returned() {
        let cache = SessionCache::new(8, Duration::ZERO);
        let s = session(ProtocolVersion::TLS1_3, &[]);
        cache.put_by_ticket(b"id", s);
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get_by_ticket(b"id").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn bound_values() {
        let s = session(ProtocolVersion::TLS1_3, &[]);
        s.put_value("k", vec![1]);
        assert_eq!(s.value("k"), Some(vec![1]));
        assert_eq!(s.remove_value("k"), Some(vec![1]));
        assert_eq!(s.value("k"), None);
    }
}
