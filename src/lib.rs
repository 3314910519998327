//! tlshake is the handshake negotiation core of a TLS/DTLS implementation.
//!
//! It decides what a connection runs with and derives the secrets for it.
//! It does not protect records or move bytes. The caller owns the record
//! layer and the transport, and drives a [`Handshaker`] with whole
//! handshake messages.
//!
//! # Versions
//!
//! SSL 3.0, TLS 1.0 to 1.3 on streams and DTLS 1.0, 1.2 and 1.3 on
//! datagrams. A config picks one family. TLS 1.3 is negotiated through
//! supported_versions, everything earlier through the legacy version
//! field, and a server that negotiates down marks its random so a 1.3
//! capable client notices a downgrade.
//!
//! # Parts
//!
//! - **Cipher suites**: a static registry of every suite the crate can
//!   name, filtered by version and by the crypto provider.
//! - **Extensions**: one descriptor per extension and message, with
//!   produce, load and trade hooks. The framework rejects unknown,
//!   duplicated and unsolicited extensions.
//! - **Flight driver**: queues of messages to produce and to consume, one
//!   handler per message type.
//! - **Key schedule**: the PRF derivations up to TLS 1.2 and the HKDF
//!   schedule of TLS 1.3, plus Finished verify_data.
//! - **Resumption**: session ids, TLS 1.3 tickets and PSK binders.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tlshake::{Config, ContentKind, Handshaker, HandshakeStatus};
//!
//! let config = Arc::new(Config::builder().server_name("example.com").build().unwrap());
//! let mut client = Handshaker::client(config).unwrap();
//!
//! loop {
//!     match client.handshake_status() {
//!         HandshakeStatus::NeedWrap => {
//!             if let Some(out) = client.wrap().unwrap() {
//!                 // Hand out.data to the record layer.
//!             }
//!         }
//!         HandshakeStatus::NeedUnwrap => {
//!             // Feed whole messages from the record layer.
//!             let msg: &[u8] = &[];
//!             client.unwrap(ContentKind::Handshake, msg).unwrap();
//!         }
//!         HandshakeStatus::NeedTask => {
//!             if let Some(task) = client.delegated_task() {
//!                 client.complete_task(task.run()).unwrap();
//!             }
//!         }
//!         HandshakeStatus::Finished | HandshakeStatus::NotHandshaking => break,
//!     }
//!     while let Some(change) = client.poll_key_change() {
//!         // Install keys in the record layer.
//!         let _ = change;
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

mod alert;
mod buffer;
mod certificate;
mod codec;
mod config;
mod context;
mod error;
mod extension;
mod flight;
mod handshake;
mod resumption;
mod session;
mod task;
mod types;

pub mod crypto;
pub mod suite;

pub use alert::Alert;
pub use buffer::Buf;
pub use certificate::CertifiedKey;
pub use config::{ClientAuth, Config, ConfigBuilder};
pub use error::{CertificateError, Error, FaultKind, ProtocolFault};
pub use extension::ExtensionType;
pub use handshake::{ContentKind, Direction, DriverState, Epoch, HandshakeStatus};
pub use handshake::{Handshaker, KeyChange, Outgoing};
pub use session::{Session, SessionCache, DEFAULT_CACHE_CAPACITY, DEFAULT_SESSION_LIFETIME};
pub use suite::{CipherSuiteDescriptor, KeyExchange};
pub use task::{DelegatedTask, TaskResult};
pub use types::{HandshakeType, HashAlgorithm, NamedGroup, ProtocolVersion};
pub use types::{Random, Role, SessionId, SignatureAlgorithm, SignatureScheme};
