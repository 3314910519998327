use std::sync::Arc;

use crate::certificate::CertifiedKey;
use crate::crypto::{rust_crypto, CertificateTrust, CryptoProvider, PinnedKeyTrust};
use crate::session::SessionCache;
use crate::suite::{self, CipherSuiteDescriptor};
use crate::types::{NamedGroup, ProtocolVersion, SignatureScheme};
use crate::Error;

/// Whether a server asks for a client certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    /// No CertificateRequest is sent.
    #[default]
    None,
    /// Ask, but accept an empty Certificate.
    Requested,
    /// Ask, and fail the handshake without one.
    Required,
}

/// Handshake configuration
#[derive(Clone)]
pub struct Config {
    protocol_versions: Vec<ProtocolVersion>,
    cipher_suites: Vec<&'static CipherSuiteDescriptor>,
    named_groups: Vec<NamedGroup>,
    signature_schemes: Vec<SignatureScheme>,
    signature_schemes_cert: Option<Vec<SignatureScheme>>,
    server_name: Option<String>,
    alpn_protocols: Vec<Vec<u8>>,
    client_auth: ClientAuth,
    endpoint_identification: Option<String>,
    with_extended_master_secret: bool,
    with_status_request: bool,
    ocsp_response: Option<Vec<u8>>,
    delegate_tasks: bool,
    session_tickets: usize,
    session_cache: Arc<SessionCache>,
    credentials: Option<CertifiedKey>,
    trust: Arc<dyn CertificateTrust>,
    crypto_provider: CryptoProvider,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            protocol_versions: vec![ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2],
            cipher_suites: None,
            named_groups: vec![NamedGroup::X25519, NamedGroup::Secp256r1],
            signature_schemes: vec![
                SignatureScheme::ECDSA_SECP256R1_SHA256,
                SignatureScheme::ECDSA_SECP384R1_SHA384,
                SignatureScheme::ECDSA_SHA1,
            ],
            signature_schemes_cert: None,
            server_name: None,
            alpn_protocols: Vec::new(),
            client_auth: ClientAuth::None,
            endpoint_identification: None,
            with_extended_master_secret: true,
            with_status_request: true,
            ocsp_response: None,
            delegate_tasks: false,
            session_tickets: 1,
            session_cache: None,
            credentials: None,
            trust: None,
            crypto_provider: None,
        }
    }

    /// Versions we are willing to negotiate, most preferred first.
    #[inline(always)]
    pub fn protocol_versions(&self) -> &[ProtocolVersion] {
        &self.protocol_versions
    }

    /// Enabled cipher suites in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[&'static CipherSuiteDescriptor] {
        &self.cipher_suites
    }

    /// Key exchange groups, most preferred first.
    #[inline(always)]
    pub fn named_groups(&self) -> &[NamedGroup] {
        &self.named_groups
    }

    /// Signature schemes for handshake signatures.
    #[inline(always)]
    pub fn signature_schemes(&self) -> &[SignatureScheme] {
        &self.signature_schemes
    }

    /// Signature schemes for certificate signatures, when they differ.
    #[inline(always)]
    pub fn signature_schemes_cert(&self) -> Option<&[SignatureScheme]> {
        self.signature_schemes_cert.as_deref()
    }

    /// Host name sent in server_name by a client.
    #[inline(always)]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// ALPN protocol names, most preferred first.
    #[inline(always)]
    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        &self.alpn_protocols
    }

    /// For a server, whether to request a client certificate.
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// Endpoint identification algorithm, for example `"HTTPS"`.
    ///
    /// Sessions are only resumed under the same algorithm.
    #[inline(always)]
    pub fn endpoint_identification(&self) -> Option<&str> {
        self.endpoint_identification.as_deref()
    }

    /// Whether to enable Extended Master Secret extension (rfc7627).
    #[inline(always)]
    pub fn with_extended_master_secret(&self) -> bool {
        self.with_extended_master_secret
    }

    /// Whether a client asks for OCSP stapling (rfc6066).
    #[inline(always)]
    pub fn with_status_request(&self) -> bool {
        self.with_status_request
    }

    /// DER OCSP response a server staples, if any.
    #[inline(always)]
    pub fn ocsp_response(&self) -> Option<&[u8]> {
        self.ocsp_response.as_deref()
    }

    /// Hand signing and signature verification to the caller as delegated tasks.
    #[inline(always)]
    pub fn delegate_tasks(&self) -> bool {
        self.delegate_tasks
    }

    /// NewSessionTicket messages a TLS 1.3 server sends per handshake.
    #[inline(always)]
    pub fn session_tickets(&self) -> usize {
        self.session_tickets
    }

    /// Cache of resumable sessions.
    #[inline(always)]
    pub fn session_cache(&self) -> &Arc<SessionCache> {
        &self.session_cache
    }

    /// Local certificate chain and key.
    #[inline(always)]
    pub fn credentials(&self) -> Option<&CertifiedKey> {
        self.credentials.as_ref()
    }

    /// Evaluation of the peer's certificate chain.
    #[inline(always)]
    pub fn trust(&self) -> &Arc<dyn CertificateTrust> {
        &self.trust
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Whether any enabled version is in the datagram family.
    pub fn is_dtls(&self) -> bool {
        self.protocol_versions.iter().any(|v| v.is_dtls())
    }

    /// The highest enabled version.
    pub fn max_version(&self) -> ProtocolVersion {
        self.protocol_versions
            .iter()
            .copied()
            .max_by_key(|v| v.rank())
            .unwrap_or_default()
    }
}

/// Builder for handshake configuration.
pub struct ConfigBuilder {
    protocol_versions: Vec<ProtocolVersion>,
    cipher_suites: Option<Vec<String>>,
    named_groups: Vec<NamedGroup>,
    signature_schemes: Vec<SignatureScheme>,
    signature_schemes_cert: Option<Vec<SignatureScheme>>,
    server_name: Option<String>,
    alpn_protocols: Vec<Vec<u8>>,
    client_auth: ClientAuth,
    endpoint_identification: Option<String>,
    with_extended_master_secret: bool,
    with_status_request: bool,
    ocsp_response: Option<Vec<u8>>,
    delegate_tasks: bool,
    session_tickets: usize,
    session_cache: Option<Arc<SessionCache>>,
    credentials: Option<CertifiedKey>,
    trust: Option<Arc<dyn CertificateTrust>>,
    crypto_provider: Option<CryptoProvider>,
}

impl ConfigBuilder {
    /// Set the protocol versions, most preferred first.
    ///
    /// Stream and datagram versions cannot be mixed.
    /// Defaults to TLS 1.3 and TLS 1.2.
    pub fn protocol_versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.protocol_versions = versions.to_vec();
        self
    }

    /// Set the enabled cipher suites by standard name or legacy alias.
    ///
    /// Defaults to the registry's default-enabled suites.
    pub fn cipher_suites<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.cipher_suites = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self
    }

    /// Set the key exchange groups, most preferred first.
    ///
    /// Defaults to x25519 and secp256r1.
    pub fn named_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.named_groups = groups.to_vec();
        self
    }

    /// Set the signature schemes for handshake signatures.
    ///
    /// Defaults to ecdsa_secp256r1_sha256, ecdsa_secp384r1_sha384 and,
    /// for TLS 1.1 and earlier only, ecdsa_sha1.
    pub fn signature_schemes(mut self, schemes: &[SignatureScheme]) -> Self {
        self.signature_schemes = schemes.to_vec();
        self
    }

    /// Set separate schemes for certificate signatures (signature_algorithms_cert).
    ///
    /// Defaults to none, meaning signature_algorithms applies to both.
    pub fn signature_schemes_cert(mut self, schemes: &[SignatureScheme]) -> Self {
        self.signature_schemes_cert = Some(schemes.to_vec());
        self
    }

    /// Set the host name a client sends in server_name.
    ///
    /// Defaults to none.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Set the ALPN protocols, most preferred first.
    ///
    /// Defaults to none.
    pub fn alpn_protocols<P: AsRef<[u8]>>(mut self, protocols: &[P]) -> Self {
        self.alpn_protocols = protocols.iter().map(|p| p.as_ref().to_vec()).collect();
        self
    }

    /// Set whether a server requests a client certificate.
    ///
    /// Defaults to [`ClientAuth::None`].
    pub fn client_auth(mut self, auth: ClientAuth) -> Self {
        self.client_auth = auth;
        self
    }

    /// Set the endpoint identification algorithm.
    ///
    /// Defaults to none.
    pub fn endpoint_identification(mut self, algorithm: impl Into<String>) -> Self {
        self.endpoint_identification = Some(algorithm.into());
        self
    }

    /// Set whether to enable Extended Master Secret extension (rfc7627)
    ///
    /// Defaults to true.
    pub fn with_extended_master_secret(mut self, enabled: bool) -> Self {
        self.with_extended_master_secret = enabled;
        self
    }

    /// Set whether a client asks for OCSP stapling.
    ///
    /// Defaults to true.
    pub fn with_status_request(mut self, enabled: bool) -> Self {
        self.with_status_request = enabled;
        self
    }

    /// Set the OCSP response a server staples.
    ///
    /// Defaults to none, in which case status_request is not answered.
    pub fn ocsp_response(mut self, response: impl Into<Vec<u8>>) -> Self {
        self.ocsp_response = Some(response.into());
        self
    }

    /// Set whether signing and verification run as delegated tasks.
    ///
    /// Defaults to false.
    pub fn delegate_tasks(mut self, enabled: bool) -> Self {
        self.delegate_tasks = enabled;
        self
    }

    /// Set the number of TLS 1.3 tickets a server issues per handshake.
    ///
    /// Defaults to 1.
    pub fn session_tickets(mut self, count: usize) -> Self {
        self.session_tickets = count;
        self
    }

    /// Set the session cache. Share one cache between configurations to
    /// resume across connections.
    ///
    /// Defaults to a fresh [`SessionCache`].
    pub fn session_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.session_cache = Some(cache);
        self
    }

    /// Set the local certificate chain and key.
    ///
    /// Required for servers. Defaults to none.
    pub fn credentials(mut self, credentials: CertifiedKey) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the peer certificate evaluation.
    ///
    /// Defaults to a [`PinnedKeyTrust`] with no pins, which trusts nobody.
    pub fn trust(mut self, trust: Arc<dyn CertificateTrust>) -> Self {
        self.trust = Some(trust);
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, the installed default or the RustCrypto provider is used.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Build the configuration.
    ///
    /// The crypto provider is selected in the following priority order:
    /// 1. Explicit provider set via `with_crypto_provider()`
    /// 2. Default provider installed via `CryptoProvider::install_default()`
    /// 3. The RustCrypto provider
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(rust_crypto::default_provider);

        crypto_provider.validate().map_err(Error::Config)?;

        if self.protocol_versions.is_empty() {
            return Err(Error::EmptyInput);
        }
        if let Some(v) = self.protocol_versions.iter().find(|v| !v.is_known()) {
            return Err(Error::Config(format!("Unknown protocol version {}", v)));
        }
        let first = self.protocol_versions[0];
        if self.protocol_versions.iter().any(|v| !v.same_family(&first)) {
            return Err(Error::Config(
                "Stream and datagram versions cannot be mixed".to_string(),
            ));
        }

        // No ECDHE suite runs over SSL 3.0.
        if self.protocol_versions.contains(&ProtocolVersion::SSL3_0) {
            return Err(Error::Config(
                "SSL 3.0 has no cipher suite with a supported key exchange".to_string(),
            ));
        }

        let cipher_suites = match &self.cipher_suites {
            Some(names) => suite::validate_requested_names(names)?,
            None => suite::default_suites().to_vec(),
        };
        if !cipher_suites.iter().any(|s| {
            s.has_key_exchange_handler() && self.protocol_versions.iter().any(|v| s.is_available(*v))
        }) {
            return Err(Error::Config(
                "No cipher suite usable with the enabled versions".to_string(),
            ));
        }

        if self.named_groups.is_empty() || self.signature_schemes.is_empty() {
            return Err(Error::EmptyInput);
        }
        if let Some(g) = self
            .named_groups
            .iter()
            .find(|g| crypto_provider.kx_group(**g).is_none())
        {
            return Err(Error::Config(format!("No key exchange for {:?}", g)));
        }

        if self.alpn_protocols.iter().any(|p| p.is_empty() || p.len() > 255) {
            return Err(Error::Config("ALPN protocol name length".to_string()));
        }

        Ok(Config {
            protocol_versions: self.protocol_versions,
            cipher_suites,
            named_groups: self.named_groups,
            signature_schemes: self.signature_schemes,
            signature_schemes_cert: self.signature_schemes_cert,
            server_name: self.server_name,
            alpn_protocols: self.alpn_protocols,
            client_auth: self.client_auth,
            endpoint_identification: self.endpoint_identification,
            with_extended_master_secret: self.with_extended_master_secret,
            with_status_request: self.with_status_request,
            ocsp_response: self.ocsp_response,
            delegate_tasks: self.delegate_tasks,
            session_tickets: self.session_tickets,
            session_cache: self
                .session_cache
                .unwrap_or_else(|| Arc::new(SessionCache::default())),
            credentials: self.credentials,
            trust: self
                .trust
                .unwrap_or_else(|| Arc::new(PinnedKeyTrust::default())),
            crypto_provider,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
