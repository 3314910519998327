//! TLS 1.2 and earlier full handshakes.

use std::sync::Arc;

use tlshake::crypto::PinnedKeyTrust;
use tlshake::{Alert, ClientAuth, HandshakeStatus, Handshaker, ProtocolVersion};

use crate::common::*;

const CHANGE_CIPHER_SPEC: Option<u8> = None;
const CERTIFICATE: Option<u8> = Some(11);
const SERVER_KEY_EXCHANGE: Option<u8> = Some(12);
const CERTIFICATE_REQUEST: Option<u8> = Some(13);
const SERVER_HELLO_DONE: Option<u8> = Some(14);
const CERTIFICATE_VERIFY: Option<u8> = Some(15);
const CLIENT_KEY_EXCHANGE: Option<u8> = Some(16);
const FINISHED: Option<u8> = Some(20);

fn tls12_pair(server_key: &tlshake::CertifiedKey) -> (tlshake::ConfigBuilder, tlshake::ConfigBuilder) {
    (
        client_builder(server_key).protocol_versions(&[ProtocolVersion::TLS1_2]),
        server_builder(server_key).protocol_versions(&[ProtocolVersion::TLS1_2]),
    )
}

#[test]
fn tls12_full_handshake() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (c, s) = tls12_pair(&server_key);
    let (mut client, mut server, r) = connect(build(c), build(s));
    let log = r.expect("handshake");

    assert_eq!(client.negotiated_version(), Some(ProtocolVersion::TLS1_2));
    assert_eq!(client.handshake_status(), HandshakeStatus::Finished);
    assert_eq!(server.handshake_status(), HandshakeStatus::Finished);

    assert_eq!(
        sent_types(&log, false),
        vec![
            Some(2),
            CERTIFICATE,
            SERVER_KEY_EXCHANGE,
            SERVER_HELLO_DONE,
            CHANGE_CIPHER_SPEC,
            FINISHED
        ]
    );
    assert_eq!(
        sent_types(&log, true),
        vec![Some(1), CLIENT_KEY_EXCHANGE, CHANGE_CIPHER_SPEC, FINISHED]
    );

    let c_session = client.session().expect("client session").clone();
    let s_session = server.session().expect("server session").clone();
    assert!(!c_session.id().is_empty());
    assert_eq!(c_session.id(), s_session.id());
    assert!(c_session.extended_master_secret());
    assert!(s_session.extended_master_secret());

    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn tls12_without_extended_master_secret() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (c, s) = tls12_pair(&server_key);
    let (mut client, mut server, r) = connect(
        build(c.with_extended_master_secret(false)),
        build(s),
    );
    r.expect("handshake");

    let session = client.session().expect("client session");
    assert!(!session.extended_master_secret());
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn tls12_client_auth() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_key = credentials();
    let (c, s) = tls12_pair(&server_key);
    let client = build(c.credentials(client_key.clone()));
    let server = build(
        s.client_auth(ClientAuth::Required)
            .trust(Arc::new(PinnedKeyTrust::new([client_key.end_entity()]))),
    );

    let (mut client, mut server, r) = connect(client, server);
    let log = r.expect("handshake");

    assert!(sent_types(&log, false).contains(&CERTIFICATE_REQUEST));
    assert_eq!(
        sent_types(&log, true),
        vec![
            Some(1),
            CERTIFICATE,
            CLIENT_KEY_EXCHANGE,
            CERTIFICATE_VERIFY,
            CHANGE_CIPHER_SPEC,
            FINISHED
        ]
    );
    assert!(server.session().expect("server session").has_peer_principal());
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn tls12_client_auth_required_without_certificate() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (c, s) = tls12_pair(&server_key);
    let (_, _, r) = connect(build(c), build(s.client_auth(ClientAuth::Required)));

    let err = r.expect_err("certificate required");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::BadCertificate));
}

#[test]
fn tls10_full_handshake() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let suites = ["TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA"];
    let client = build(
        client_builder(&server_key)
            .protocol_versions(&[ProtocolVersion::TLS1_0])
            .cipher_suites(&suites),
    );
    let server = build(
        server_builder(&server_key)
            .protocol_versions(&[ProtocolVersion::TLS1_0])
            .cipher_suites(&suites),
    );

    let (mut client, mut server, r) = connect(client, server);
    r.expect("handshake");

    assert_eq!(client.negotiated_version(), Some(ProtocolVersion::TLS1_0));
    assert_eq!(
        server.negotiated_suite().map(|s| s.name),
        Some("TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA")
    );

    // CBC suites come with MAC keys.
    let changes = key_changes(&mut client);
    assert!(changes.iter().all(|k| !k.mac_key.is_empty()));
    let _ = key_changes(&mut server);
}

#[test]
fn version_negotiated_down_to_tls12() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client = build(client_builder(&server_key));
    let server = build(server_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_2]));

    let (client, _, r) = connect(client, server);
    r.expect("handshake");
    assert_eq!(client.negotiated_version(), Some(ProtocolVersion::TLS1_2));
}

#[test]
fn downgrade_sentinel_is_detected() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let mut client = Handshaker::client(build(client_builder(&server_key))).unwrap();
    let mut server = Handshaker::server(build(
        server_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_2]),
    ))
    .unwrap();

    let r = handshake_with(&mut client, &mut server, |s| {
        if !s.from_client && s.msg_type() == Some(2) {
            // Last 8 bytes of the server random.
            s.data[30..38].copy_from_slice(b"DOWNGRD\x01");
        }
    });
    let err = r.expect_err("downgrade");
    assert!(matches!(err, Failed::Client(_)));
    assert_eq!(err.error().alert(), Some(Alert::IllegalParameter));
}
