//! Session resumption by TLS 1.3 ticket and by pre-1.3 session id.

use tlshake::{Alert, Handshaker, NamedGroup, ProtocolVersion};

use crate::common::*;

const CERTIFICATE: Option<u8> = Some(11);
const NEW_SESSION_TICKET: Option<u8> = Some(4);
const CLIENT_HELLO: Option<u8> = Some(1);
const SERVER_HELLO: Option<u8> = Some(2);
const FINISHED: Option<u8> = Some(20);

#[test]
fn tls13_ticket_resumption() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_config = build(client_builder(&server_key));
    let server_config = build(server_builder(&server_key));

    let (first, _, r) = connect(client_config.clone(), server_config.clone());
    r.expect("first handshake");
    assert_eq!(client_config.session_cache().len(), 1);
    let first_suite = first.negotiated_suite().map(|s| s.id);

    let (mut client, mut server, r) = connect(client_config.clone(), server_config.clone());
    let log = r.expect("resumed handshake");

    // No certificate on resumption, and a fresh ticket at the end.
    let server_sent = sent_types(&log, false);
    assert!(!server_sent.contains(&CERTIFICATE));
    assert_eq!(server_sent.last(), Some(&NEW_SESSION_TICKET));
    assert_eq!(client.negotiated_suite().map(|s| s.id), first_suite);

    // The peer identity carries over from the original handshake.
    let session = client.session().expect("client session");
    assert_eq!(&session.peer_chain()[0][..], server_key.end_entity());

    assert_application_keys_match(&mut client, &mut server);

    // The used ticket is gone, the new one is cached.
    assert_eq!(client_config.session_cache().len(), 1);
}

#[test]
fn tls13_invalidation_reaches_resumed_sessions() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_config = build(client_builder(&server_key));
    let server_config = build(server_builder(&server_key));

    let (first_client, first_server, r) = connect(client_config.clone(), server_config.clone());
    r.expect("first handshake");
    let client_root = first_client.session().cloned().expect("client session");
    let server_root = first_server.session().cloned().expect("server session");

    let (client, server, r) = connect(client_config.clone(), server_config.clone());
    let log = r.expect("resumed handshake");
    assert!(!sent_types(&log, false).contains(&CERTIFICATE));
    drop(first_client);
    drop(first_server);

    client_root.invalidate();
    server_root.invalidate();
    assert!(client.session().expect("resumed").is_invalidated());
    assert!(server.session().expect("resumed").is_invalidated());

    // The ticket issued on resumption went with it.
    let (_, _, r) = connect(client_config.clone(), server_config);
    let log = r.expect("third handshake");
    assert!(sent_types(&log, false).contains(&CERTIFICATE));
}

#[test]
fn tls13_several_tickets() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_config = build(client_builder(&server_key));
    let server_config = build(server_builder(&server_key).session_tickets(3));

    let (_, _, r) = connect(client_config.clone(), server_config);
    let log = r.expect("handshake");

    let tickets = sent_types(&log, false)
        .into_iter()
        .filter(|t| *t == NEW_SESSION_TICKET)
        .count();
    assert_eq!(tickets, 3);
    assert_eq!(client_config.session_cache().len(), 3);
}

#[test]
fn tls13_no_tickets() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_config = build(client_builder(&server_key));
    let server_config = build(server_builder(&server_key).session_tickets(0));

    let (_, _, r) = connect(client_config.clone(), server_config.clone());
    let log = r.expect("first handshake");
    assert!(!sent_types(&log, false).contains(&NEW_SESSION_TICKET));
    assert!(client_config.session_cache().is_empty());

    let (_, _, r) = connect(client_config, server_config);
    let log = r.expect("second handshake");
    assert!(sent_types(&log, false).contains(&CERTIFICATE));
}

#[test]
fn tls13_unknown_ticket_falls_back_to_full_handshake() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_config = build(client_builder(&server_key));

    let (_, _, r) = connect(client_config.clone(), build(server_builder(&server_key)));
    r.expect("first handshake");

    // Another server, another cache.
    let (mut client, mut server, r) =
        connect(client_config, build(server_builder(&server_key)));
    let log = r.expect("second handshake");
    assert!(sent_types(&log, false).contains(&CERTIFICATE));
    assert_application_keys_match(&mut client, &mut server);
}

fn resumed_with(tamper: impl FnMut(&mut Sent)) -> Result<Vec<Sent>, Failed> {
    let server_key = credentials();
    let client_config = build(client_builder(&server_key));
    let server_config = build(server_builder(&server_key));

    let (_, _, r) = connect(client_config.clone(), server_config.clone());
    r.expect("first handshake");

    let mut client = Handshaker::client(client_config).unwrap();
    let mut server = Handshaker::server(server_config).unwrap();
    handshake_with(&mut client, &mut server, tamper)
}

#[test]
fn tls13_tampered_binder() {
    let _ = env_logger::try_init();

    let err = resumed_with(|s| {
        if s.msg_type() == CLIENT_HELLO {
            // pre_shared_key is last, its binder ends the message.
            let last = s.data.len() - 1;
            s.data[last] ^= 0x01;
        }
    })
    .expect_err("bad binder");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::IllegalParameter));
}

/// Resume against a server that always asks for another key share.
fn resumed_after_retry(
    tamper: impl FnMut(&mut Sent),
) -> (Handshaker, Handshaker, Result<Vec<Sent>, Failed>) {
    let server_key = credentials();
    let client_config = build(
        client_builder(&server_key).named_groups(&[NamedGroup::X25519, NamedGroup::Secp256r1]),
    );
    let server_config = build(server_builder(&server_key).named_groups(&[NamedGroup::Secp256r1]));

    let (_, _, r) = connect(client_config.clone(), server_config.clone());
    r.expect("first handshake");
    assert_eq!(client_config.session_cache().len(), 1);

    connect_with(client_config, server_config, tamper)
}

#[test]
fn tls13_resumption_after_hello_retry_request() {
    let _ = env_logger::try_init();

    let (mut client, mut server, r) = resumed_after_retry(|_| {});
    let log = r.expect("resumed handshake");

    assert_eq!(
        sent_types(&log, true),
        vec![CLIENT_HELLO, CLIENT_HELLO, FINISHED]
    );
    let server_sent = sent_types(&log, false);
    assert_eq!(&server_sent[..2], &[SERVER_HELLO, SERVER_HELLO]);
    assert!(!server_sent.contains(&CERTIFICATE));
    assert_eq!(server_sent.last(), Some(&NEW_SESSION_TICKET));

    assert_eq!(
        client.negotiated_suite().map(|s| s.id),
        server.negotiated_suite().map(|s| s.id)
    );
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn tls13_tampered_binder_after_hello_retry_request() {
    let _ = env_logger::try_init();

    // Only the second ClientHello's binder is checked.
    let mut hellos = 0;
    let (_, _, r) = resumed_after_retry(|s| {
        if s.msg_type() == CLIENT_HELLO {
            hellos += 1;
            if hellos == 2 {
                let last = s.data.len() - 1;
                s.data[last] ^= 0x01;
            }
        }
    });
    let err = r.expect_err("bad binder");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::IllegalParameter));
}

#[test]
fn tls13_pre_shared_key_not_last() {
    let _ = env_logger::try_init();

    let err = resumed_with(|s| {
        if s.msg_type() == CLIENT_HELLO {
            push_extension(s, 0xFAFA, &[]);
        }
    })
    .expect_err("psk not last");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::IllegalParameter));
}

#[test]
fn tls12_session_id_resumption() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_config = build(client_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_2]));
    let server_config = build(server_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_2]));

    let (first, _, r) = connect(client_config.clone(), server_config.clone());
    r.expect("first handshake");
    let first_id = first.session().expect("session").id().clone();

    let (mut client, mut server, r) = connect(client_config, server_config);
    let log = r.expect("resumed handshake");

    // Abbreviated handshake: the server finishes first.
    assert_eq!(sent_types(&log, false), vec![SERVER_HELLO, None, FINISHED]);
    assert_eq!(sent_types(&log, true), vec![CLIENT_HELLO, None, FINISHED]);

    assert_eq!(client.session().expect("client session").id(), &first_id);
    assert_eq!(server.session().expect("server session").id(), &first_id);
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn tls12_resumption_needs_the_same_server_cache() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client_config = build(client_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_2]));
    let server = || build(server_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_2]));

    let (first, _, r) = connect(client_config.clone(), server());
    r.expect("first handshake");
    let first_id = first.session().expect("session").id().clone();

    let (client, _, r) = connect(client_config, server());
    let log = r.expect("second handshake");
    assert!(sent_types(&log, false).contains(&CERTIFICATE));
    assert_ne!(client.session().expect("client session").id(), &first_id);
}
