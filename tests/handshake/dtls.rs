//! Handshakes over datagrams. Framing adds message_seq and fragment
//! fields, which this crate always sends unfragmented.

use tlshake::{ContentKind, Handshaker, NamedGroup, ProtocolVersion};

use crate::common::*;

const CERTIFICATE: Option<u8> = Some(11);

fn dtls_pair(version: ProtocolVersion) -> (Handshaker, Handshaker) {
    let server_key = credentials();
    let client = build(client_builder(&server_key).protocol_versions(&[version]));
    let server = build(server_builder(&server_key).protocol_versions(&[version]));
    (
        Handshaker::client(client).unwrap(),
        Handshaker::server(server).unwrap(),
    )
}

/// message_seq of a DTLS handshake message.
fn message_seq(sent: &Sent) -> u16 {
    u16::from_be_bytes([sent.data[4], sent.data[5]])
}

fn handshake_seqs(log: &[Sent], from_client: bool) -> Vec<u16> {
    log.iter()
        .filter(|s| s.from_client == from_client && s.kind == ContentKind::Handshake)
        .map(message_seq)
        .collect()
}

#[test]
fn dtls12_full_handshake() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = dtls_pair(ProtocolVersion::DTLS1_2);
    let log = handshake(&mut client, &mut server).expect("handshake");

    assert_eq!(
        sent_types(&log, true),
        vec![Some(1), Some(16), None, Some(20)]
    );
    assert_eq!(
        sent_types(&log, false),
        vec![Some(2), CERTIFICATE, Some(12), Some(14), None, Some(20)]
    );

    // change_cipher_spec has no message_seq.
    assert_eq!(handshake_seqs(&log, true), vec![0, 1, 2]);
    assert_eq!(handshake_seqs(&log, false), vec![0, 1, 2, 3, 4]);

    // Unfragmented: fragment_offset 0, fragment_length == length.
    for s in &log {
        if s.kind == ContentKind::Handshake {
            assert_eq!(&s.data[6..9], &[0, 0, 0]);
            assert_eq!(&s.data[1..4], &s.data[9..12]);
            assert_eq!(s.data.len(), 12 + u32::from_be_bytes([0, s.data[1], s.data[2], s.data[3]]) as usize);
        }
    }

    assert_eq!(client.negotiated_version(), Some(ProtocolVersion::DTLS1_2));
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn dtls13_full_handshake() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = dtls_pair(ProtocolVersion::DTLS1_3);
    let log = handshake(&mut client, &mut server).expect("handshake");

    assert_eq!(sent_types(&log, true), vec![Some(1), Some(20)]);
    assert_eq!(
        sent_types(&log, false),
        vec![Some(2), Some(8), CERTIFICATE, Some(15), Some(20), Some(4)]
    );
    assert_eq!(handshake_seqs(&log, false), vec![0, 1, 2, 3, 4, 5]);

    assert_eq!(client.negotiated_version(), Some(ProtocolVersion::DTLS1_3));
    assert_eq!(server.negotiated_version(), Some(ProtocolVersion::DTLS1_3));
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn dtls13_hello_retry_request() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client = build(
        client_builder(&server_key)
            .protocol_versions(&[ProtocolVersion::DTLS1_3])
            .named_groups(&[NamedGroup::X25519, NamedGroup::Secp256r1]),
    );
    let server = build(
        server_builder(&server_key)
            .protocol_versions(&[ProtocolVersion::DTLS1_3])
            .named_groups(&[NamedGroup::Secp256r1]),
    );
    let (mut client, mut server, r) = connect(client, server);
    let log = r.expect("handshake");

    // The second ClientHello continues the sequence.
    assert_eq!(sent_types(&log, true), vec![Some(1), Some(1), Some(20)]);
    assert_eq!(handshake_seqs(&log, true), vec![0, 1, 2]);
    assert_application_keys_match(&mut client, &mut server);
}

#[test]
fn dtls_client_against_tls_server() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let client = build(client_builder(&server_key).protocol_versions(&[ProtocolVersion::DTLS1_2]));
    let server = build(server_builder(&server_key).protocol_versions(&[ProtocolVersion::TLS1_2]));
    let (_, _, r) = connect(client, server);
    assert!(matches!(r, Err(Failed::Server(_))));
}
