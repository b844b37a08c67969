//! Minting of CA, server and client key pairs.
//!
//! Every call generates a fresh RSA key and a fresh serial number; nothing is
//! cached between calls.

use std::net::IpAddr;
use std::time::Duration;

use bon::Builder;

use crate::cert::extensions::SubjectAltName;
use crate::cert::params::{
    CertificationRequestInfo, DistinguishedName, ExtendedKeyUsageOption, ExtensionParam, Validity,
};
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::error::Result;
use crate::issuer::Issuer;
use crate::key::{DEFAULT_RSA_BITS, KeyPair, PublicKey};

/// Inputs for a server certificate.
///
/// # Fields
/// * `common_name` - Subject common name of the certificate.
/// * `service_name` - Name of the in-cluster service the server sits behind.
/// * `namespace` - Namespace of the service.
/// * `domain` - Cluster DNS domain, e.g. `cluster.local`.
/// * `dns_names` - Extra host names, listed before the service names.
/// * `ip_addresses` - IP addresses the server answers on.
#[derive(Clone, Debug, Builder)]
pub struct ServerKeyPairRequest {
    #[builder(into)]
    pub common_name: String,
    #[builder(into)]
    pub service_name: String,
    #[builder(into)]
    pub namespace: String,
    #[builder(into)]
    pub domain: String,
    #[builder(default)]
    pub dns_names: Vec<String>,
    #[builder(default)]
    pub ip_addresses: Vec<IpAddr>,
}

impl ServerKeyPairRequest {
    /// DNS names placed in the subject alternative name extension.
    pub fn alt_names(&self) -> Vec<String> {
        let svc = &self.service_name;
        let ns = &self.namespace;
        let mut names = self.dns_names.clone();
        names.push(svc.clone());
        names.push(format!("{svc}.{ns}"));
        names.push(format!("{svc}.{ns}.svc"));
        names.push(format!("{svc}.{ns}.svc.{}", self.domain));
        names
    }
}

/// Generates key pairs and the certificates that go with them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPairFactory {
    key_bits: usize,
}

impl Default for KeyPairFactory {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_RSA_BITS,
        }
    }
}

impl KeyPairFactory {
    pub fn with_key_bits(key_bits: usize) -> Self {
        Self { key_bits }
    }

    /// Creates a self-signed CA valid from now for `duration`.
    pub fn new_ca(&self, common_name: &str, duration: Duration) -> Result<CertificateWithPrivateKey> {
        self.new_ca_with_validity(common_name, Validity::starting_now(duration)?)
    }

    /// Creates a self-signed CA with an explicit validity window.
    pub fn new_ca_with_validity(
        &self,
        common_name: &str,
        validity: Validity,
    ) -> Result<CertificateWithPrivateKey> {
        let key = KeyPair::generate_rsa(self.key_bits)?;
        let request = CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name(common_name.to_string())
                    .build(),
            )
            .subject_public_key(PublicKey::from_key_pair(&key))
            .is_ca(true)
            .build();

        let cert = Certificate::new_self_signed(&request, &key, &validity)?;
        tracing::debug!(common_name, not_after = %validity.not_after, "created CA");
        Ok(CertificateWithPrivateKey { cert, key })
    }

    /// Creates a server certificate signed by `ca`.
    pub fn new_server_key_pair(
        &self,
        ca: &CertificateWithPrivateKey,
        request: &ServerKeyPairRequest,
        duration: Duration,
    ) -> Result<CertificateWithPrivateKey> {
        let san = SubjectAltName {
            dns_names: request.alt_names(),
            ip_addresses: request.ip_addresses.clone(),
        };
        self.new_leaf(
            ca,
            DistinguishedName::builder()
                .common_name(request.common_name.clone())
                .build(),
            ExtendedKeyUsageOption::ServerAuth,
            vec![ExtensionParam::from_extension(san, false)?],
            duration,
        )
    }

    /// Creates a client-auth certificate signed by `ca`. Client certificates
    /// carry no subject alternative names.
    pub fn new_client_key_pair(
        &self,
        ca: &CertificateWithPrivateKey,
        common_name: &str,
        organizations: &[String],
        duration: Duration,
    ) -> Result<CertificateWithPrivateKey> {
        self.new_leaf(
            ca,
            DistinguishedName::builder()
                .common_name(common_name.to_string())
                .organizations(organizations.to_vec())
                .build(),
            ExtendedKeyUsageOption::ClientAuth,
            Vec::new(),
            duration,
        )
    }

    fn new_leaf(
        &self,
        ca: &CertificateWithPrivateKey,
        subject: DistinguishedName,
        usage: ExtendedKeyUsageOption,
        extensions: Vec<ExtensionParam>,
        duration: Duration,
    ) -> Result<CertificateWithPrivateKey> {
        let key = KeyPair::generate_rsa(self.key_bits)?;
        let request = CertificationRequestInfo::builder()
            .subject(subject)
            .subject_public_key(PublicKey::from_key_pair(&key))
            .usages(vec![usage])
            .extensions(extensions)
            .build();

        let cert = ca.issue(&request, &Validity::starting_now(duration)?)?;
        Ok(CertificateWithPrivateKey { cert, key })
    }
}
