//! TLS 1.3 full handshakes.

use std::sync::Arc;

use tlshake::crypto::PinnedKeyTrust;
use tlshake::{Alert, ClientAuth, DriverState, HandshakeStatus, NamedGroup, ProtocolVersion};

use crate::common::*;

const HELLO: Option<u8> = Some(2);
const ENCRYPTED_EXTENSIONS: Option<u8> = Some(8);
const CERTIFICATE: Option<u8> = Some(11);
const CERTIFICATE_REQUEST: Option<u8> = Some(13);
const CERTIFICATE_VERIFY: Option<u8> = Some(15);
const FINISHED: Option<u8> = Some(20);
const NEW_SESSION_TICKET: Option<u8> = Some(4);

#[test]
fn tls13_full_handshake() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (mut client, mut server, r) = connect(
        build(client_builder(&server_key)),
        build(server_builder(&server_key)),
    );
    let log = r.expect("handshake");

    assert_eq!(client.handshake_status(), HandshakeStatus::Finished);
    assert_eq!(server.handshake_status(), HandshakeStatus::Finished);
    assert_eq!(client.state(), DriverState::Finished);
    assert_eq!(client.negotiated_version(), Some(ProtocolVersion::TLS1_3));
    assert_eq!(server.negotiated_version(), Some(ProtocolVersion::TLS1_3));
    assert_eq!(
        client.negotiated_suite().map(|s| s.id),
        server.negotiated_suite().map(|s| s.id)
    );

    assert_eq!(sent_types(&log, true), vec![Some(1), FINISHED]);
    assert_eq!(
        sent_types(&log, false),
        vec![
            HELLO,
            ENCRYPTED_EXTENSIONS,
            CERTIFICATE,
            CERTIFICATE_VERIFY,
            FINISHED,
            NEW_SESSION_TICKET
        ]
    );

    let session = client.session().expect("client session");
    assert_eq!(session.version(), ProtocolVersion::TLS1_3);
    assert_eq!(session.peer_chain().len(), 1);
    assert_eq!(&session.peer_chain()[0][..], server_key.end_entity());

    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn tls13_handshake_keys_precede_application_keys() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (mut client, _server, r) = connect(
        build(client_builder(&server_key)),
        build(server_builder(&server_key)),
    );
    r.expect("handshake");

    let changes = key_changes(&mut client);
    let epochs: Vec<_> = changes.iter().map(|k| (k.direction, k.epoch)).collect();
    use tlshake::Direction::*;
    use tlshake::Epoch::*;
    assert_eq!(
        epochs,
        vec![
            (Write, Handshake),
            (Read, Handshake),
            (Read, Application),
            (Write, Application)
        ]
    );
    assert!(changes.iter().all(|k| k.traffic_secret.is_some()));
}

#[test]
fn tls13_hello_retry_request() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client = build(
        client_builder(&server_key).named_groups(&[NamedGroup::X25519, NamedGroup::Secp256r1]),
    );
    let server = build(server_builder(&server_key).named_groups(&[NamedGroup::Secp256r1]));

    let (mut client, mut server, r) = connect(client, server);
    let log = r.expect("handshake");

    // ClientHello twice, the first ServerHello is the retry request.
    assert_eq!(sent_types(&log, true), vec![Some(1), Some(1), FINISHED]);
    let server_sent = sent_types(&log, false);
    assert_eq!(&server_sent[..2], &[HELLO, HELLO]);

    assert_eq!(client.handshake_status(), HandshakeStatus::Finished);
    assert_eq!(server.handshake_status(), HandshakeStatus::Finished);
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn tls13_no_common_group() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client = build(client_builder(&server_key).named_groups(&[NamedGroup::X25519]));
    let server = build(server_builder(&server_key).named_groups(&[NamedGroup::Secp384r1]));

    let (_, _, r) = connect(client, server);
    let err = r.expect_err("no common group");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::HandshakeFailure));
}

#[test]
fn tls13_untrusted_server() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let other = credentials();
    let client = build(client_builder(&other));
    let server = build(server_builder(&server_key));

    let (_, _, r) = connect(client, server);
    let err = r.expect_err("untrusted");
    assert!(matches!(err, Failed::Client(_)));
}

#[test]
fn tls13_client_auth() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_key = credentials();
    let client = build(client_builder(&server_key).credentials(client_key.clone()));
    let server = build(
        server_builder(&server_key)
            .client_auth(ClientAuth::Required)
            .trust(Arc::new(PinnedKeyTrust::new([client_key.end_entity()]))),
    );

    let (mut client, mut server, r) = connect(client, server);
    let log = r.expect("handshake");

    assert!(sent_types(&log, false).contains(&CERTIFICATE_REQUEST));
    assert_eq!(
        sent_types(&log, true),
        vec![Some(1), CERTIFICATE, CERTIFICATE_VERIFY, FINISHED]
    );

    let session = server.session().expect("server session");
    assert!(session.has_peer_principal());
    assert_eq!(&session.peer_chain()[0][..], client_key.end_entity());
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn tls13_client_auth_required_without_certificate() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client = build(client_builder(&server_key));
    let server = build(server_builder(&server_key).client_auth(ClientAuth::Required));

    let (_, _, r) = connect(client, server);
    let err = r.expect_err("certificate required");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::CertificateRequired));
}

#[test]
fn tls13_client_auth_requested_without_certificate() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client = build(client_builder(&server_key));
    let server = build(server_builder(&server_key).client_auth(ClientAuth::Requested));

    let (_, server, r) = connect(client, server);
    let log = r.expect("handshake");

    // An empty Certificate and no CertificateVerify.
    assert_eq!(sent_types(&log, true), vec![Some(1), CERTIFICATE, FINISHED]);
    let session = server.session().expect("server session");
    assert!(!session.has_peer_principal());
}

#[test]
fn tls13_tampered_finished() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let mut client = tlshake::Handshaker::client(build(client_builder(&server_key))).unwrap();
    let mut server = tlshake::Handshaker::server(build(server_builder(&server_key))).unwrap();

    let r = handshake_with(&mut client, &mut server, |s| {
        if s.from_client && s.msg_type() == FINISHED {
            let last = s.data.len() - 1;
            s.data[last] ^= 0x01;
        }
    });
    let err = r.expect_err("bad finished");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::DecryptError));

    // Aborted handshakes refuse to go on.
    assert_eq!(server.state(), DriverState::Aborted);
    assert!(server.wrap().is_err());
}

#[test]
fn tls13_only_client_against_tls12_server() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client = build(client_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_3]));
    let server = build(server_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_2]));

    let (_, _, r) = connect(client, server);
    let err = r.expect_err("no common version");
    assert_eq!(err.error().alert(), Some(Alert::ProtocolVersion));
}
