//! Hello extensions and the framework that negotiates them.
//!
//! Every extension is described once per handshake message it may appear
//! in. A descriptor carries hooks for producing the extension, for loading
//! it from a received message, for acting on it once every extension of
//! the message has been loaded (the "trade" phase), and for reacting to its
//! absence. The registry is declaration ordered and that order is the
//! order extensions are produced and processed in. `pre_shared_key` is
//! declared last because it must be the last extension of a ClientHello.

use std::collections::HashMap;

use crate::buffer::Buf;
use crate::context::HandshakeContext;
use crate::error::ProtocolFault;
use crate::types::HandshakeType;
use crate::types::ProtocolVersion::{self, *};

mod alpn;
mod cookie;
mod ec_point_formats;
mod extended_master_secret;
mod framework;
mod key_share;
mod pre_shared_key;
mod psk_key_exchange_modes;
mod renegotiation_info;
mod server_name;
mod signature_algorithms;
mod status_request;
mod supported_groups;
mod supported_versions;

pub(crate) use framework::{consume_on_load, consume_on_trade, parse_block, produce};
pub(crate) use pre_shared_key::OfferedPsks;
pub(crate) use psk_key_exchange_modes::allows_resumption;
pub(crate) use renegotiation_info::accept_scsv;
pub(crate) use status_request::{parse_status, serialize_status, will_staple};
pub(crate) use supported_groups::choose_ecdhe_group;
pub(crate) use supported_versions::{peek_client_versions, peek_selected_version};

// ============================================================================
// Extension Type
// ============================================================================

/// Extension identifiers this crate negotiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    ServerName,
    StatusRequest,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    ApplicationLayerProtocolNegotiation,
    ExtendedMasterSecret,
    PreSharedKey,
    SupportedVersions,
    Cookie,
    PskKeyExchangeModes,
    SignatureAlgorithmsCert,
    KeyShare,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => ExtensionType::ServerName,
            0x0005 => ExtensionType::StatusRequest,
            0x000A => ExtensionType::SupportedGroups,
            0x000B => ExtensionType::EcPointFormats,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x0010 => ExtensionType::ApplicationLayerProtocolNegotiation,
            0x0017 => ExtensionType::ExtendedMasterSecret,
            0x0029 => ExtensionType::PreSharedKey,
            0x002B => ExtensionType::SupportedVersions,
            0x002C => ExtensionType::Cookie,
            0x002D => ExtensionType::PskKeyExchangeModes,
            0x0032 => ExtensionType::SignatureAlgorithmsCert,
            0x0033 => ExtensionType::KeyShare,
            0xFF01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0x0000,
            ExtensionType::StatusRequest => 0x0005,
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::EcPointFormats => 0x000B,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::ApplicationLayerProtocolNegotiation => 0x0010,
            ExtensionType::ExtendedMasterSecret => 0x0017,
            ExtensionType::PreSharedKey => 0x0029,
            ExtensionType::SupportedVersions => 0x002B,
            ExtensionType::Cookie => 0x002C,
            ExtensionType::PskKeyExchangeModes => 0x002D,
            ExtensionType::SignatureAlgorithmsCert => 0x0032,
            ExtensionType::KeyShare => 0x0033,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Unknown(value) => *value,
        }
    }
}

// ============================================================================
// Extension Store
// ============================================================================

/// Extension data produced or received, per handshake message.
///
/// Clients consult it to tell solicited from unsolicited extensions in
/// server responses.
#[derive(Debug, Default)]
pub(crate) struct ExtensionStore {
    entries: HashMap<(HandshakeType, ExtensionType), Buf>,
}

impl ExtensionStore {
    pub fn insert(&mut self, message: HandshakeType, id: ExtensionType, data: &[u8]) {
        self.entries.insert((message, id), Buf::from_slice(data));
    }

    pub fn get(&self, message: HandshakeType, id: ExtensionType) -> Option<&[u8]> {
        self.entries.get(&(message, id)).map(|b| &b[..])
    }

    pub fn contains(&self, message: HandshakeType, id: ExtensionType) -> bool {
        self.entries.contains_key(&(message, id))
    }

    /// Forget everything recorded for `message`. Used for the second
    /// ClientHello after a HelloRetryRequest.
    pub fn clear_message(&mut self, message: HandshakeType) {
        self.entries.retain(|(m, _), _| *m != message);
    }
}

// ============================================================================
// Descriptors
// ============================================================================

pub(crate) type ProduceFn = fn(&mut HandshakeContext, HandshakeType) -> Result<Option<Buf>, ProtocolFault>;
pub(crate) type LoadFn = fn(&mut HandshakeContext, HandshakeType, &[u8]) -> Result<(), ProtocolFault>;
pub(crate) type TradeFn = fn(&mut HandshakeContext, HandshakeType) -> Result<(), ProtocolFault>;

/// One extension in one handshake message.
pub(crate) struct ExtensionDescriptor {
    pub id: ExtensionType,
    pub message: HandshakeType,
    pub name: &'static str,
    /// Versions in which the extension may appear in `message`.
    pub versions: &'static [ProtocolVersion],
    pub produce: Option<ProduceFn>,
    pub consume_on_load: Option<LoadFn>,
    pub consume_on_trade: Option<TradeFn>,
    pub absent_on_load: Option<TradeFn>,
    pub absent_on_trade: Option<TradeFn>,
}

impl ExtensionDescriptor {
    pub fn applies_to(&self, version: ProtocolVersion) -> bool {
        self.versions.contains(&version)
    }
}

const ALL: &[ProtocolVersion] = &[TLS1_3, TLS1_2, TLS1_1, TLS1_0, DTLS1_3, DTLS1_2, DTLS1_0];
const TLS13: &[ProtocolVersion] = &[TLS1_3, DTLS1_3];
const DTLS13: &[ProtocolVersion] = &[DTLS1_3];
const TO_12: &[ProtocolVersion] = &[TLS1_2, TLS1_1, TLS1_0, DTLS1_2, DTLS1_0];
const FROM_12: &[ProtocolVersion] = &[TLS1_3, TLS1_2, DTLS1_3, DTLS1_2];

macro_rules! ext {
    (
        $id:ident, $msg:ident, $name:expr, $versions:expr,
        produce: $p:expr, load: $l:expr, trade: $t:expr,
        absent_load: $al:expr, absent_trade: $at:expr
    ) => {
        ExtensionDescriptor {
            id: ExtensionType::$id,
            message: HandshakeType::$msg,
            name: $name,
            versions: $versions,
            produce: $p,
            consume_on_load: $l,
            consume_on_trade: $t,
            absent_on_load: $al,
            absent_on_trade: $at,
        }
    };
}

use alpn as A;
use cookie as CK;
use ec_point_formats as PF;
use extended_master_secret as EMS;
use key_share as KS;
use pre_shared_key as PSK;
use psk_key_exchange_modes as PKM;
use renegotiation_info as RI;
use server_name as SN;
use signature_algorithms as SA;
use status_request as SR;
use supported_groups as SG;
use supported_versions as SV;

#[rustfmt::skip]
static REGISTRY: &[ExtensionDescriptor] = &[
    ext!(ServerName, ClientHello, "server_name", ALL,
        produce: Some(SN::produce_request), load: Some(SN::load_request), trade: None,
        absent_load: None, absent_trade: None),
    ext!(ServerName, ServerHello, "server_name", TO_12,
        produce: Some(SN::produce_ack), load: Some(SN::load_ack), trade: None,
        absent_load: None, absent_trade: None),
    ext!(ServerName, EncryptedExtensions, "server_name", TLS13,
        produce: Some(SN::produce_ack), load: Some(SN::load_ack), trade: None,
        absent_load: None, absent_trade: None),

    ext!(StatusRequest, ClientHello, "status_request", ALL,
        produce: Some(SR::produce_request), load: Some(SR::load_request), trade: None,
        absent_load: None, absent_trade: None),
    ext!(StatusRequest, ServerHello, "status_request", TO_12,
        produce: Some(SR::produce_ack), load: Some(SR::load_ack), trade: None,
        absent_load: None, absent_trade: None),

    ext!(SupportedGroups, ClientHello, "supported_groups", ALL,
        produce: Some(SG::produce), load: Some(SG::load), trade: None,
        absent_load: Some(SG::absent), absent_trade: None),

    ext!(EcPointFormats, ClientHello, "ec_point_formats", TO_12,
        produce: Some(PF::produce_request), load: Some(PF::load), trade: None,
        absent_load: None, absent_trade: None),
    ext!(EcPointFormats, ServerHello, "ec_point_formats", TO_12,
        produce: Some(PF::produce_ack), load: Some(PF::load), trade: None,
        absent_load: None, absent_trade: None),

    ext!(SignatureAlgorithms, ClientHello, "signature_algorithms", FROM_12,
        produce: Some(SA::produce), load: Some(SA::load), trade: None,
        absent_load: Some(SA::absent), absent_trade: None),
    ext!(SignatureAlgorithms, CertificateRequest, "signature_algorithms", TLS13,
        produce: Some(SA::produce), load: Some(SA::load), trade: None,
        absent_load: Some(SA::absent), absent_trade: None),

    ext!(SignatureAlgorithmsCert, ClientHello, "signature_algorithms_cert", FROM_12,
        produce: Some(SA::produce_cert), load: Some(SA::load_cert), trade: None,
        absent_load: None, absent_trade: None),
    ext!(SignatureAlgorithmsCert, CertificateRequest, "signature_algorithms_cert", TLS13,
        produce: Some(SA::produce_cert), load: Some(SA::load_cert), trade: None,
        absent_load: None, absent_trade: None),

    ext!(ApplicationLayerProtocolNegotiation, ClientHello, "application_layer_protocol_negotiation", ALL,
        produce: Some(A::produce_request), load: Some(A::load_request), trade: Some(A::select),
        absent_load: None, absent_trade: None),
    ext!(ApplicationLayerProtocolNegotiation, ServerHello, "application_layer_protocol_negotiation", TO_12,
        produce: Some(A::produce_selected), load: Some(A::load_selected), trade: None,
        absent_load: None, absent_trade: None),
    ext!(ApplicationLayerProtocolNegotiation, EncryptedExtensions, "application_layer_protocol_negotiation", TLS13,
        produce: Some(A::produce_selected), load: Some(A::load_selected), trade: None,
        absent_load: None, absent_trade: None),

    ext!(ExtendedMasterSecret, ClientHello, "extended_master_secret", TO_12,
        produce: Some(EMS::produce_request), load: Some(EMS::load), trade: Some(EMS::trade_request),
        absent_load: None, absent_trade: Some(EMS::trade_request)),
    ext!(ExtendedMasterSecret, ServerHello, "extended_master_secret", TO_12,
        produce: Some(EMS::produce_ack), load: Some(EMS::load), trade: Some(EMS::trade_ack),
        absent_load: None, absent_trade: Some(EMS::trade_ack)),

    ext!(SupportedVersions, ClientHello, "supported_versions", TLS13,
        produce: Some(SV::produce_request), load: Some(SV::load_request), trade: None,
        absent_load: None, absent_trade: None),
    ext!(SupportedVersions, ServerHello, "supported_versions", TLS13,
        produce: Some(SV::produce_selected), load: Some(SV::load_selected), trade: None,
        absent_load: None, absent_trade: None),
    ext!(SupportedVersions, HelloRetryRequest, "supported_versions", TLS13,
        produce: Some(SV::produce_selected), load: Some(SV::load_selected), trade: None,
        absent_load: None, absent_trade: None),

    ext!(Cookie, ClientHello, "cookie", DTLS13,
        produce: Some(CK::produce_echo), load: Some(CK::load_echo), trade: None,
        absent_load: Some(CK::absent_echo), absent_trade: None),
    ext!(Cookie, HelloRetryRequest, "cookie", DTLS13,
        produce: Some(CK::produce_issue), load: Some(CK::load_issue), trade: None,
        absent_load: None, absent_trade: None),

    ext!(PskKeyExchangeModes, ClientHello, "psk_key_exchange_modes", TLS13,
        produce: Some(PKM::produce), load: Some(PKM::load), trade: None,
        absent_load: None, absent_trade: None),

    ext!(KeyShare, ClientHello, "key_share", TLS13,
        produce: Some(KS::produce_client), load: Some(KS::load_client), trade: Some(KS::select),
        absent_load: Some(KS::absent_client), absent_trade: Some(KS::absent_client_trade)),
    ext!(KeyShare, ServerHello, "key_share", TLS13,
        produce: Some(KS::produce_server), load: Some(KS::load_server), trade: None,
        absent_load: Some(KS::absent_server), absent_trade: None),
    ext!(KeyShare, HelloRetryRequest, "key_share", TLS13,
        produce: Some(KS::produce_retry), load: Some(KS::load_retry), trade: None,
        absent_load: None, absent_trade: None),

    ext!(RenegotiationInfo, ClientHello, "renegotiation_info", TO_12,
        produce: Some(RI::produce), load: Some(RI::load), trade: None,
        absent_load: None, absent_trade: None),
    ext!(RenegotiationInfo, ServerHello, "renegotiation_info", TO_12,
        produce: Some(RI::produce), load: Some(RI::load), trade: None,
        absent_load: None, absent_trade: None),

    ext!(PreSharedKey, ClientHello, "pre_shared_key", TLS13,
        produce: Some(PSK::produce_offer), load: Some(PSK::load_offer), trade: Some(PSK::select),
        absent_load: None, absent_trade: None),
    ext!(PreSharedKey, ServerHello, "pre_shared_key", TLS13,
        produce: Some(PSK::produce_selected), load: Some(PSK::load_selected), trade: None,
        absent_load: None, absent_trade: Some(PSK::absent_selected)),
];

/// The descriptor for `id` in `message`.
pub(crate) fn find(message: HandshakeType, id: ExtensionType) -> Option<&'static ExtensionDescriptor> {
    REGISTRY.iter().find(|d| d.message == message && d.id == id)
}

/// Whether `id` can be consumed in any message.
pub(crate) fn is_consumable(id: ExtensionType) -> bool {
    REGISTRY
        .iter()
        .any(|d| d.id == id && d.consume_on_load.is_some())
}

/// Descriptors of `message`, in declaration order.
pub(crate) fn descriptors_for(
    message: HandshakeType,
) -> impl Iterator<Item = &'static ExtensionDescriptor> {
    REGISTRY.iter().filter(move |d| d.message == message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_shared_key_is_declared_last_in_client_hello() {
        let last = descriptors_for(HandshakeType::ClientHello).last().unwrap();
        assert_eq!(last.id, ExtensionType::PreSharedKey);
    }

    #[test]
    fn lookup() {
        let d = find(HandshakeType::ServerHello, ExtensionType::KeyShare).unwrap();
        assert_eq!(d.name, "key_share");
        assert!(d.applies_to(TLS1_3));
        assert!(!d.applies_to(TLS1_2));
        assert!(find(HandshakeType::EncryptedExtensions, ExtensionType::KeyShare).is_none());
        assert!(is_consumable(ExtensionType::Cookie));
        assert!(!is_consumable(ExtensionType::Unknown(0x1234)));
    }

    #[test]
    fn no_duplicate_descriptors() {
        for (i, a) in REGISTRY.iter().enumerate() {
            for b in &REGISTRY[i + 1..] {
                assert!(!(a.message == b.message && a.id == b.id), "{}", a.name);
            }
        }
    }

    #[test]
    fn ids_round_trip() {
        for d in REGISTRY {
            assert_eq!(ExtensionType::from_u16(d.id.as_u16()), d.id);
        }
    }
}
