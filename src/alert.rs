use std::fmt;

/// Alert descriptions (RFC 8446 Section 6, RFC 5246 Section 7.2).
///
/// Only fatal handshake conditions are raised by this crate, so the level
/// is implied and not modelled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alert {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    RecordOverflow,
    HandshakeFailure,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    InappropriateFallback,
    UserCanceled,
    NoRenegotiation,
    MissingExtension,
    UnsupportedExtension,
    UnrecognizedName,
    BadCertificateStatusResponse,
    UnknownPskIdentity,
    CertificateRequired,
    NoApplicationProtocol,
    Unknown(u8),
}

impl Alert {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Alert::CloseNotify,
            10 => Alert::UnexpectedMessage,
            20 => Alert::BadRecordMac,
            22 => Alert::RecordOverflow,
            40 => Alert::HandshakeFailure,
            42 => Alert::BadCertificate,
            43 => Alert::UnsupportedCertificate,
            44 => Alert::CertificateRevoked,
            45 => Alert::CertificateExpired,
            46 => Alert::CertificateUnknown,
            47 => Alert::IllegalParameter,
            48 => Alert::UnknownCa,
            49 => Alert::AccessDenied,
            50 => Alert::DecodeError,
            51 => Alert::DecryptError,
            70 => Alert::ProtocolVersion,
            71 => Alert::InsufficientSecurity,
            80 => Alert::InternalError,
            86 => Alert::InappropriateFallback,
            90 => Alert::UserCanceled,
            100 => Alert::NoRenegotiation,
            109 => Alert::MissingExtension,
            110 => Alert::UnsupportedExtension,
            112 => Alert::UnrecognizedName,
            113 => Alert::BadCertificateStatusResponse,
            115 => Alert::UnknownPskIdentity,
            116 => Alert::CertificateRequired,
            120 => Alert::NoApplicationProtocol,
            _ => Alert::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Alert::CloseNotify => 0,
            Alert::UnexpectedMessage => 10,
            Alert::BadRecordMac => 20,
            Alert::RecordOverflow => 22,
            Alert::HandshakeFailure => 40,
            Alert::BadCertificate => 42,
            Alert::UnsupportedCertificate => 43,
            Alert::CertificateRevoked => 44,
            Alert::CertificateExpired => 45,
            Alert::CertificateUnknown => 46,
            Alert::IllegalParameter => 47,
            Alert::UnknownCa => 48,
            Alert::AccessDenied => 49,
            Alert::DecodeError => 50,
            Alert::DecryptError => 51,
            Alert::ProtocolVersion => 70,
            Alert::InsufficientSecurity => 71,
            Alert::InternalError => 80,
            Alert::InappropriateFallback => 86,
            Alert::UserCanceled => 90,
            Alert::NoRenegotiation => 100,
            Alert::MissingExtension => 109,
            Alert::UnsupportedExtension => 110,
            Alert::UnrecognizedName => 112,
            Alert::BadCertificateStatusResponse => 113,
            Alert::UnknownPskIdentity => 115,
            Alert::CertificateRequired => 116,
            Alert::NoApplicationProtocol => 120,
            Alert::Unknown(value) => *value,
        }
    }

    /// The two-byte alert record body: level `fatal` (2) followed by the description.
    pub fn to_record(&self) -> [u8; 2] {
        [2, self.as_u8()]
    }

    fn name(&self) -> &'static str {
        match self {
            Alert::CloseNotify => "close_notify",
            Alert::UnexpectedMessage => "unexpected_message",
            Alert::BadRecordMac => "bad_record_mac",
            Alert::RecordOverflow => "record_overflow",
            Alert::HandshakeFailure => "handshake_failure",
            Alert::BadCertificate => "bad_certificate",
            Alert::UnsupportedCertificate => "unsupported_certificate",
            Alert::CertificateRevoked => "certificate_revoked",
            Alert::CertificateExpired => "certificate_expired",
            Alert::CertificateUnknown => "certificate_unknown",
            Alert::IllegalParameter => "illegal_parameter",
            Alert::UnknownCa => "unknown_ca",
            Alert::AccessDenied => "access_denied",
            Alert::DecodeError => "decode_error",
            Alert::DecryptError => "decrypt_error",
            Alert::ProtocolVersion => "protocol_version",
            Alert::InsufficientSecurity => "insufficient_security",
            Alert::InternalError => "internal_error",
            Alert::InappropriateFallback => "inappropriate_fallback",
            Alert::UserCanceled => "user_canceled",
            Alert::NoRenegotiation => "no_renegotiation",
            Alert::MissingExtension => "missing_extension",
            Alert::UnsupportedExtension => "unsupported_extension",
            Alert::UnrecognizedName => "unrecognized_name",
            Alert::BadCertificateStatusResponse => "bad_certificate_status_response",
            Alert::UnknownPskIdentity => "unknown_psk_identity",
            Alert::CertificateRequired => "certificate_required",
            Alert::NoApplicationProtocol => "no_application_protocol",
            Alert::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::Unknown(v) => write!(f, "unknown({})", v),
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_registry() {
        assert_eq!(Alert::DecodeError.as_u8(), 50);
        assert_eq!(Alert::MissingExtension.as_u8(), 109);
        assert_eq!(Alert::from_u8(113), Alert::BadCertificateStatusResponse);
        assert_eq!(Alert::from_u8(200), Alert::Unknown(200));
    }

    #[test]
    fn record_is_fatal() {
        assert_eq!(Alert::IllegalParameter.to_record(), [2, 47]);
    }
}
