use std::fmt;
use std::io;

use thiserror::Error;

use crate::alert::Alert;

/// Errors surfaced by the handshake core.
///
/// Transport failures and protocol faults are kept apart: only a
/// [`ProtocolFault`] carries an alert for the peer.
#[derive(Debug, Error)]
pub enum Error {
    /// The surrounding transport failed. Never produced by the core itself,
    /// but callers that drive a socket can fold their I/O failures into this.
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// Fatal protocol condition. The alert should be sent to the peer.
    #[error("{0}")]
    Fault(#[from] ProtocolFault),

    /// Requested cipher suite name is unknown or not negotiable.
    #[error("Unsupported cipher suite: {0}")]
    UnsupportedCipherSuite(String),

    /// A required list argument was empty.
    #[error("Empty input")]
    EmptyInput,

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Crypto provider failure outside of a running handshake.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The handshake is suspended on a delegated task.
    #[error("A delegated task must be completed first")]
    TaskPending,

    /// The handshake already failed and cannot be driven further.
    #[error("Handshake aborted")]
    Aborted,
}

impl Error {
    /// The alert to send to the peer, if this error carries one.
    pub fn alert(&self) -> Option<Alert> {
        match self {
            Error::Fault(f) => Some(f.alert),
            _ => None,
        }
    }
}

/// Broad classification of a [`ProtocolFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Malformed lengths, truncated vectors and other wire errors.
    Decode,
    /// Missing or unexpected extensions and messages, failed negotiation.
    Policy,
    /// Finished, binder or signature verification failure.
    Verification,
    /// Local failure, typically a crypto provider error.
    Internal,
}

/// A fatal protocol condition tagged with the alert to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFault {
    pub alert: Alert,
    pub reason: String,
}

impl ProtocolFault {
    pub fn new(alert: Alert, reason: impl Into<String>) -> Self {
        ProtocolFault {
            alert,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self.alert {
            Alert::DecodeError | Alert::RecordOverflow => FaultKind::Decode,
            Alert::DecryptError
            | Alert::BadRecordMac
            | Alert::BadCertificate
            | Alert::UnsupportedCertificate
            | Alert::CertificateUnknown
            | Alert::CertificateRevoked
            | Alert::CertificateExpired
            | Alert::UnknownCa
            | Alert::BadCertificateStatusResponse => FaultKind::Verification,
            Alert::InternalError | Alert::Unknown(_) => FaultKind::Internal,
            // illegal_parameter is raised both for malformed values and for
            // binder mismatch; the binder case is the interesting one.
            Alert::IllegalParameter => FaultKind::Verification,
            _ => FaultKind::Policy,
        }
    }

    pub fn decode_error(reason: impl Into<String>) -> Self {
        Self::new(Alert::DecodeError, reason)
    }

    pub fn illegal_parameter(reason: impl Into<String>) -> Self {
        Self::new(Alert::IllegalParameter, reason)
    }

    pub fn missing_extension(reason: impl Into<String>) -> Self {
        Self::new(Alert::MissingExtension, reason)
    }

    pub fn unsupported_extension(reason: impl Into<String>) -> Self {
        Self::new(Alert::UnsupportedExtension, reason)
    }

    pub fn unexpected_message(reason: impl Into<String>) -> Self {
        Self::new(Alert::UnexpectedMessage, reason)
    }

    pub fn handshake_failure(reason: impl Into<String>) -> Self {
        Self::new(Alert::HandshakeFailure, reason)
    }

    pub fn decrypt_error(reason: impl Into<String>) -> Self {
        Self::new(Alert::DecryptError, reason)
    }

    pub fn protocol_version(reason: impl Into<String>) -> Self {
        Self::new(Alert::ProtocolVersion, reason)
    }

    pub fn bad_certificate(reason: impl Into<String>) -> Self {
        Self::new(Alert::BadCertificate, reason)
    }

    pub fn bad_certificate_status_response(reason: impl Into<String>) -> Self {
        Self::new(Alert::BadCertificateStatusResponse, reason)
    }

    pub fn certificate_required(reason: impl Into<String>) -> Self {
        Self::new(Alert::CertificateRequired, reason)
    }

    pub fn no_application_protocol(reason: impl Into<String>) -> Self {
        Self::new(Alert::NoApplicationProtocol, reason)
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::new(Alert::InternalError, reason)
    }
}

impl fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.alert)
    }
}

impl std::error::Error for ProtocolFault {}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for ProtocolFault {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let reason = match value {
            nom::Err::Incomplete(_) => "Truncated input".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("Malformed input ({:?}, {} bytes left)", e.code, e.input.len())
            }
        };
        ProtocolFault::decode_error(reason)
    }
}

/// Outcome of certificate trust evaluation by a [`CertificateTrust`](crate::crypto::CertificateTrust).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("Bad certificate: {0}")]
    BadCertificate(String),

    #[error("Unsupported certificate: {0}")]
    Unsupported(String),

    #[error("Untrusted certificate: {0}")]
    Untrusted(String),

    #[error("Bad certificate status response: {0}")]
    BadStatusResponse(String),
}

impl From<CertificateError> for ProtocolFault {
    fn from(value: CertificateError) -> Self {
        let alert = match &value {
            CertificateError::BadCertificate(_) => Alert::BadCertificate,
            CertificateError::Unsupported(_) => Alert::UnsupportedCertificate,
            CertificateError::Untrusted(_) => Alert::CertificateUnknown,
            CertificateError::BadStatusResponse(_) => Alert::BadCertificateStatusResponse,
        };
        ProtocolFault::new(alert, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nom::number::complete::be_u16;

    #[test]
    fn nom_errors_are_decode_errors() {
        let r: Result<(), ProtocolFault> = (|| {
            let (_, _) = be_u16::<_, nom::error::Error<&[u8]>>(&[1u8][..])?;
            Ok(())
        })();
        let fault = r.unwrap_err();
        assert_eq!(fault.alert, Alert::DecodeError);
        assert_eq!(fault.kind(), FaultKind::Decode);
    }

    #[test]
    fn certificate_errors_map_to_alerts() {
        let f: ProtocolFault = CertificateError::Untrusted("pin".into()).into();
        assert_eq!(f.alert, Alert::CertificateUnknown);
        let f: ProtocolFault = CertificateError::BadStatusResponse("ocsp".into()).into();
        assert_eq!(f.alert, Alert::BadCertificateStatusResponse);
    }

    #[test]
    fn only_faults_carry_alerts() {
        let e = Error::from(ProtocolFault::missing_extension("key_share"));
        assert_eq!(e.alert(), Some(Alert::MissingExtension));
        let e = Error::Transport(io::Error::new(io::ErrorKind::Other, "gone"));
        assert_eq!(e.alert(), None);
    }
}
