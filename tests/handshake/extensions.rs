//! Extension negotiation seen from the outside.

use std::sync::Arc;

use tlshake::crypto::{CertificateTrust, PeerContext, PeerPublicKey, PinnedKeyTrust};
use tlshake::{Alert, Buf, CertificateError, ProtocolVersion};

use crate::common::*;

const CLIENT_HELLO: Option<u8> = Some(1);
const SERVER_HELLO: Option<u8> = Some(2);
const CERTIFICATE_STATUS: Option<u8> = Some(22);

const EXTENDED_MASTER_SECRET: u16 = 0x0017;

fn tls12(b: tlshake::ConfigBuilder) -> tlshake::ConfigBuilder {
    b.protocol_versions(&[ProtocolVersion::TLS1_2])
}

#[test]
fn duplicate_extension_in_client_hello() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (_, _, r) = connect_with(
        build(client_builder(&server_key)),
        build(server_builder(&server_key)),
        |s| {
            if s.msg_type() == CLIENT_HELLO {
                push_extension(s, EXTENDED_MASTER_SECRET, &[]);
            }
        },
    );
    let err = r.expect_err("duplicate extension");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::IllegalParameter));
}

#[test]
fn unknown_extension_in_server_hello() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (_, _, r) = connect_with(
        build(tls12(client_builder(&server_key))),
        build(tls12(server_builder(&server_key))),
        |s| {
            if s.msg_type() == SERVER_HELLO {
                push_extension(s, 0xFAFA, &[]);
            }
        },
    );
    let err = r.expect_err("unknown extension");
    assert!(matches!(err, Failed::Client(_)));
    assert_eq!(err.error().alert(), Some(Alert::UnsupportedExtension));
}

#[test]
fn unsolicited_extended_master_secret() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (_, _, r) = connect_with(
        build(tls12(client_builder(&server_key)).with_extended_master_secret(false)),
        build(tls12(server_builder(&server_key))),
        |s| {
            if s.msg_type() == SERVER_HELLO {
                push_extension(s, EXTENDED_MASTER_SECRET, &[]);
            }
        },
    );
    let err = r.expect_err("unsolicited extension");
    assert!(matches!(err, Failed::Client(_)));
    assert_eq!(err.error().alert(), Some(Alert::UnsupportedExtension));
}

#[test]
fn alpn_by_server_preference() {
    let _ = env_logger::try_init();

    for version in [ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2] {
        let server_key = credentials();
        let (client, server, r) = connect(
            build(
                client_builder(&server_key)
                    .protocol_versions(&[version])
                    .alpn_protocols(&["h2", "http/1.1"]),
            ),
            build(
                server_builder(&server_key)
                    .protocol_versions(&[version])
                    .alpn_protocols(&["http/1.1", "h2"]),
            ),
        );
        r.expect("handshake");
        assert_eq!(client.alpn_protocol(), Some(&b"http/1.1"[..]));
        assert_eq!(server.alpn_protocol(), Some(&b"http/1.1"[..]));
    }
}

#[test]
fn alpn_only_on_server() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (client, server, r) = connect(
        build(client_builder(&server_key)),
        build(server_builder(&server_key).alpn_protocols(&["h2"])),
    );
    r.expect("handshake");
    assert_eq!(client.alpn_protocol(), None);
    assert_eq!(server.alpn_protocol(), None);
}

#[test]
fn alpn_without_overlap() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (_, _, r) = connect(
        build(client_builder(&server_key).alpn_protocols(&["h2"])),
        build(server_builder(&server_key).alpn_protocols(&["spdy/3"])),
    );
    let err = r.expect_err("no common protocol");
    assert!(matches!(err, Failed::Server(_)));
    assert_eq!(err.error().alert(), Some(Alert::NoApplicationProtocol));
}

#[test]
fn server_name_reaches_the_server() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (_, server, r) = connect(
        build(client_builder(&server_key)),
        build(server_builder(&server_key)),
    );
    r.expect("handshake");
    let session = server.session().expect("server session");
    assert_eq!(session.server_name(), Some("example.com"));
}

const OCSP_RESPONSE: &[u8] = &[0x30, 0x03, 0x0A, 0x01, 0x00];

#[test]
fn stapled_ocsp_response() {
    let _ = env_logger::try_init();

    for version in [ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2] {
        let server_key = credentials();
        let (client, _, r) = connect(
            build(client_builder(&server_key).protocol_versions(&[version])),
            build(
                server_builder(&server_key)
                    .protocol_versions(&[version])
                    .ocsp_response(OCSP_RESPONSE),
            ),
        );
        let log = r.expect("handshake");

        // Its own message before 1.3, in the certificate entry after.
        let separate = sent_types(&log, false).contains(&CERTIFICATE_STATUS);
        assert_eq!(separate, version == ProtocolVersion::TLS1_2);

        let session = client.session().expect("client session");
        assert_eq!(session.ocsp_responses().len(), 1);
        assert_eq!(&session.ocsp_responses()[0][..], OCSP_RESPONSE);
    }
}

#[test]
fn no_staple_unless_asked() {
    let _ = env_logger::try_init();

    let server_key = credentials();
    let (client, _, r) = connect(
        build(tls12(client_builder(&server_key)).with_status_request(false)),
        build(tls12(server_builder(&server_key)).ocsp_response(OCSP_RESPONSE)),
    );
    let log = r.expect("handshake");
    assert!(!sent_types(&log, false).contains(&CERTIFICATE_STATUS));
    assert!(client.session().expect("session").ocsp_responses().is_empty());
}

#[test]
fn unparseable_ocsp_response_is_ignored() {
    let _ = env_logger::try_init();

    for version in [ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2] {
        let server_key = credentials();
        let (client, _, r) = connect(
            build(client_builder(&server_key).protocol_versions(&[version])),
            build(
                server_builder(&server_key)
                    .protocol_versions(&[version])
                    .ocsp_response(&[0x01, 0x02][..]),
            ),
        );
        r.expect("handshake");
        let session = client.session().expect("client session");
        assert!(session.ocsp_responses().is_empty());
    }
}

/// Trusts the pinned key but rejects every status response.
#[derive(Debug)]
struct Revoked(PinnedKeyTrust);

impl CertificateTrust for Revoked {
    fn check_peer_trusted(
        &self,
        chain: &[Buf],
        auth_type: &str,
        peer: &PeerContext<'_>,
    ) -> Result<(), CertificateError> {
        self.0.check_peer_trusted(chain, auth_type, peer)
    }

    fn public_key(&self, end_entity: &[u8]) -> Result<PeerPublicKey, CertificateError> {
        self.0.public_key(end_entity)
    }

    fn check_status_response(&self, _: &[u8], _: &[u8]) -> Result<(), CertificateError> {
        Err(CertificateError::BadStatusResponse("revoked".to_string()))
    }
}

#[test]
fn rejected_ocsp_response_fails_the_handshake() {
    let _ = env_logger::try_init();

    for version in [ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2] {
        let server_key = credentials();
        let trust = Revoked(PinnedKeyTrust::new([server_key.end_entity()]));
        let (_, _, r) = connect(
            build(
                client_builder(&server_key)
                    .protocol_versions(&[version])
                    .trust(Arc::new(trust)),
            ),
            build(
                server_builder(&server_key)
                    .protocol_versions(&[version])
                    .ocsp_response(OCSP_RESPONSE),
            ),
        );
        let err = r.expect_err("revoked");
        assert!(matches!(err, Failed::Client(_)));
        assert_eq!(err.error().alert(), Some(Alert::BadCertificateStatusResponse));
    }
}
