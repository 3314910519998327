//! Handshakes with signing and verification handed out as tasks.

use tlshake::{Alert, ContentKind, Error, HandshakeStatus, Handshaker, ProtocolVersion};
use tlshake::{DelegatedTask, TaskResult};

use crate::common::*;

fn delegating(version: ProtocolVersion) -> (Handshaker, Handshaker) {
    let server_key = credentials();
    let client = build(
        client_builder(&server_key)
            .protocol_versions(&[version])
            .delegate_tasks(true),
    );
    let server = build(
        server_builder(&server_key)
            .protocol_versions(&[version])
            .delegate_tasks(true),
    );
    (
        Handshaker::client(client).unwrap(),
        Handshaker::server(server).unwrap(),
    )
}

#[test]
fn delegated_handshakes() {
    let _ = env_logger::try_init();

    for version in [ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2] {
        let (mut client, mut server) = delegating(version);
        handshake(&mut client, &mut server).expect("handshake");
        assert_eq!(client.handshake_status(), HandshakeStatus::Finished);
        assert_eq!(server.handshake_status(), HandshakeStatus::Finished);
        assert_eq!(client.negotiated_version(), Some(version));
        assert_application_keys_match(&mut client, &mut server);
    }
}

/// Deliver the ClientHello and collect server messages up to the task.
fn server_until_task(client: &mut Handshaker, server: &mut Handshaker) -> Vec<u8> {
    let hello = client.wrap().unwrap().expect("ClientHello");
    server.unwrap(hello.kind, &hello.data).unwrap();

    let mut types = Vec::new();
    while let Some(out) = server.wrap().unwrap() {
        types.push(out.data[0]);
    }
    types
}

#[test]
fn server_suspends_on_signature() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = delegating(ProtocolVersion::TLS1_3);
    let sent = server_until_task(&mut client, &mut server);
    // ServerHello, EncryptedExtensions, Certificate
    assert_eq!(sent, vec![2, 8, 11]);
    assert_eq!(server.handshake_status(), HandshakeStatus::NeedTask);

    assert!(matches!(server.wrap(), Err(Error::TaskPending)));
    assert!(matches!(
        server.unwrap(ContentKind::Handshake, &[]),
        Err(Error::TaskPending)
    ));

    let task = server.delegated_task().expect("task");
    assert!(task.is_sign());
    // Handed out once, still pending until completed.
    assert!(server.delegated_task().is_none());
    assert_eq!(server.handshake_status(), HandshakeStatus::NeedTask);

    server.complete_task(task.run()).unwrap();
    assert_eq!(server.handshake_status(), HandshakeStatus::NeedWrap);
    let verify = server.wrap().unwrap().expect("CertificateVerify");
    assert_eq!(verify.data[0], 15);
}

#[test]
fn failed_signature_fails_the_handshake() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = delegating(ProtocolVersion::TLS1_3);
    server_until_task(&mut client, &mut server);

    let _task = server.delegated_task().expect("task");
    server
        .complete_task(TaskResult::Signed(Err("key unavailable".to_string())))
        .unwrap();

    let err = server.wrap().expect_err("signature failed");
    assert_eq!(err.alert(), Some(Alert::InternalError));
    assert_eq!(server.handshake_status(), HandshakeStatus::NotHandshaking);
}

#[test]
fn failed_verification_fails_the_handshake() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = delegating(ProtocolVersion::TLS1_3);

    let mut verify_task = None;
    for _ in 0..10 {
        while let Some(task) = server.delegated_task() {
            server.complete_task(task.run()).unwrap();
        }
        while let Some(out) = server.wrap().unwrap() {
            client.unwrap(out.kind, &out.data).unwrap();
            if let Some(task) = client.delegated_task() {
                verify_task = Some(task);
                break;
            }
        }
        if verify_task.is_some() {
            break;
        }
        if let Some(out) = client.wrap().unwrap() {
            server.unwrap(out.kind, &out.data).unwrap();
        }
    }

    let task = verify_task.expect("client verify task");
    assert!(matches!(task, DelegatedTask::Verify { .. }));

    let err = client
        .complete_task(TaskResult::Verified(Err("mismatch".to_string())))
        .expect_err("verification failed");
    assert_eq!(err.alert(), Some(Alert::DecryptError));
    assert!(matches!(client.wrap(), Err(Error::Aborted)));
}

#[test]
fn panicking_task_is_an_internal_error() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = delegating(ProtocolVersion::TLS1_2);
    server_until_task(&mut client, &mut server);

    let _task = server.delegated_task().expect("task");
    server
        .complete_task(TaskResult::Panicked("boom".to_string()))
        .unwrap();
    let err = server.wrap().expect_err("panicked task");
    assert_eq!(err.alert(), Some(Alert::InternalError));
}

#[test]
fn no_task_to_complete() {
    let _ = env_logger::try_init();

    let (mut client, _) = delegating(ProtocolVersion::TLS1_3);
    assert!(matches!(
        client.complete_task(TaskResult::Verified(Ok(()))),
        Err(Error::Crypto(_))
    ));
}
