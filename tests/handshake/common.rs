//! Shared helpers for handshake integration tests.

#![allow(unused)]

use std::sync::Arc;

use tlshake::crypto::rust_crypto::default_provider;
use tlshake::crypto::PinnedKeyTrust;
use tlshake::{CertifiedKey, ConfigBuilder, ContentKind, Error, HandshakeStatus, Handshaker};
use tlshake::{Config, Direction, Epoch, KeyChange, NamedGroup, Outgoing, ProtocolVersion};

/// A message on its way between the two sides.
#[derive(Debug, Clone)]
pub struct Sent {
    pub from_client: bool,
    pub kind: ContentKind,
    pub data: Vec<u8>,
}

impl Sent {
    /// Handshake type byte, `None` for change_cipher_spec.
    pub fn msg_type(&self) -> Option<u8> {
        match self.kind {
            ContentKind::Handshake => self.data.first().copied(),
            ContentKind::ChangeCipherSpec => None,
        }
    }
}

/// Which side failed a handshake.
#[derive(Debug)]
pub enum Failed {
    Client(Error),
    Server(Error),
}

impl Failed {
    pub fn error(&self) -> &Error {
        match self {
            Failed::Client(e) | Failed::Server(e) => e,
        }
    }
}

/// A credential on P-256 with raw public key chain.
pub fn credentials() -> CertifiedKey {
    CertifiedKey::generate(&default_provider(), NamedGroup::Secp256r1).expect("generate key")
}

/// Client config trusting exactly `server`.
pub fn client_builder(server: &CertifiedKey) -> ConfigBuilder {
    Config::builder()
        .server_name("example.com")
        .trust(Arc::new(PinnedKeyTrust::new([server.end_entity()])))
}

pub fn server_builder(server: &CertifiedKey) -> ConfigBuilder {
    Config::builder().credentials(server.clone())
}

pub fn build(b: ConfigBuilder) -> Arc<Config> {
    Arc::new(b.build().expect("config"))
}

/// Run every delegated task the side waits on.
pub fn run_tasks(hs: &mut Handshaker) -> Result<(), Error> {
    while let Some(task) = hs.delegated_task() {
        hs.complete_task(task.run())?;
    }
    Ok(())
}

/// Move everything `from` has to send over to `to`.
///
/// `tamper` sees each message before delivery and may change it.
fn pump(
    from: &mut Handshaker,
    to: &mut Handshaker,
    from_client: bool,
    log: &mut Vec<Sent>,
    tamper: &mut dyn FnMut(&mut Sent),
) -> Result<bool, Failed> {
    let (wrap_err, unwrap_err): (fn(Error) -> Failed, fn(Error) -> Failed) = if from_client {
        (Failed::Client, Failed::Server)
    } else {
        (Failed::Server, Failed::Client)
    };

    let mut moved = false;
    loop {
        run_tasks(from).map_err(wrap_err)?;
        let Some(Outgoing { kind, data }) = from.wrap().map_err(wrap_err)? else {
            if from.handshake_status() == HandshakeStatus::NeedTask {
                continue;
            }
            return Ok(moved);
        };

        let mut sent = Sent {
            from_client,
            kind,
            data: data.into_vec(),
        };
        tamper(&mut sent);
        log.push(sent.clone());

        run_tasks(to).map_err(unwrap_err)?;
        to.unwrap(sent.kind, &sent.data).map_err(unwrap_err)?;
        run_tasks(to).map_err(unwrap_err)?;
        moved = true;
    }
}

/// Drive both sides until neither has anything left to send.
pub fn handshake_with(
    client: &mut Handshaker,
    server: &mut Handshaker,
    mut tamper: impl FnMut(&mut Sent),
) -> Result<Vec<Sent>, Failed> {
    let mut log = Vec::new();
    for _ in 0..20 {
        let a = pump(client, server, true, &mut log, &mut tamper)?;
        let b = pump(server, client, false, &mut log, &mut tamper)?;
        if !a && !b {
            break;
        }
    }
    Ok(log)
}

pub fn handshake(client: &mut Handshaker, server: &mut Handshaker) -> Result<Vec<Sent>, Failed> {
    handshake_with(client, server, |_| {})
}

/// Connect a fresh client and server.
pub fn connect(
    client: Arc<Config>,
    server: Arc<Config>,
) -> (Handshaker, Handshaker, Result<Vec<Sent>, Failed>) {
    connect_with(client, server, |_| {})
}

/// Connect a fresh client and server through `tamper`.
pub fn connect_with(
    client: Arc<Config>,
    server: Arc<Config>,
    tamper: impl FnMut(&mut Sent),
) -> (Handshaker, Handshaker, Result<Vec<Sent>, Failed>) {
    let mut c = Handshaker::client(client).expect("client");
    let mut s = Handshaker::server(server).expect("server");
    let r = handshake_with(&mut c, &mut s, tamper);
    (c, s, r)
}

pub fn key_changes(hs: &mut Handshaker) -> Vec<KeyChange> {
    std::iter::from_fn(|| hs.poll_key_change()).collect()
}

/// Application keys one side writes and the other reads must match.
pub fn assert_application_keys_match(client: &mut Handshaker, server: &mut Handshaker) {
    let c = key_changes(client);
    let s = key_changes(server);

    let find = |changes: &[KeyChange], d: Direction| {
        changes
            .iter()
            .find(|k| k.direction == d && k.epoch == Epoch::Application)
            .cloned()
            .expect("application key change")
    };

    let c_write = find(&c, Direction::Write);
    let s_read = find(&s, Direction::Read);
    assert_eq!(c_write.key, s_read.key);
    assert_eq!(c_write.iv, s_read.iv);
    assert_eq!(c_write.mac_key, s_read.mac_key);

    let s_write = find(&s, Direction::Write);
    let c_read = find(&c, Direction::Read);
    assert_eq!(s_write.key, c_read.key);
    assert_eq!(s_write.iv, c_read.iv);
    assert_ne!(c_write.key, s_write.key);
}

/// Handshake types of the messages one side sent, in order.
pub fn sent_types(log: &[Sent], from_client: bool) -> Vec<Option<u8>> {
    log.iter()
        .filter(|s| s.from_client == from_client)
        .map(|s| s.msg_type())
        .collect()
}

/// Messages in TLS framing have a 4 byte header.
pub fn body(sent: &Sent) -> &[u8] {
    &sent.data[4..]
}

/// Append an extension to a ClientHello or ServerHello in TLS framing,
/// fixing up the lengths.
pub fn push_extension(sent: &mut Sent, ext_type: u16, payload: &[u8]) {
    let data = &mut sent.data;
    // header(4) legacy_version(2) random(32)
    let mut idx = 38;
    idx += 1 + data[idx] as usize; // session_id
    if data[0] == 1 {
        let suites = u16::from_be_bytes([data[idx], data[idx + 1]]) as usize;
        idx += 2 + suites;
        idx += 1 + data[idx] as usize; // compression_methods
    } else {
        idx += 3; // cipher_suite, compression_method
    }
    if idx == data.len() {
        // No extension block yet.
        data.extend_from_slice(&[0, 0]);
    }

    let ext_len = u16::from_be_bytes([data[idx], data[idx + 1]]) as usize;
    let added = 4 + payload.len();
    data[idx..idx + 2].copy_from_slice(&((ext_len + added) as u16).to_be_bytes());

    data.extend_from_slice(&ext_type.to_be_bytes());
    data.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    data.extend_from_slice(payload);

    let len = (data.len() - 4) as u32;
    data[1..4].copy_from_slice(&len.to_be_bytes()[1..]);
}
