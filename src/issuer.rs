use der::Encode;
use der::flagset::FlagSet;
use x509_cert::certificate::CertificateInner;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::AuthorityKeyIdentifier;
use crate::cert::extensions::BasicConstraints;
use crate::cert::extensions::ExtendedKeyUsage;
use crate::cert::extensions::KeyUsage;
use crate::cert::extensions::KeyUsages;
use crate::cert::extensions::SubjectKeyIdentifier;
use crate::cert::params::Validity;
use crate::cert::params::{CertificationRequestInfo, ExtensionParam};
use crate::error::{CertError, Result};
use crate::key::KeyPair;
use crate::tbs_certificate::{TbsCertificate, random_serial_number};

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the name of the issuer, as it appears on the issuer's certificate.
    fn issuer_name(&self) -> Result<x509_cert::name::Name>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Issues a certificate based on the provided certification request information.
    ///
    /// # Arguments
    /// * `cert_request` - The certification request information containing details about the certificate to be issued.
    /// * `validity` - The validity window of the issued certificate.
    ///
    /// # Returns
    /// A `Certificate` signed with SHA-256 by the issuer's key.
    fn issue(&self, cert_request: &CertificationRequestInfo, validity: &Validity) -> Result<Certificate> {
        let signature_algo = SignatureAlgorithm::Sha256WithRsa;

        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: None,
        };

        let key_usage_flags: FlagSet<KeyUsages> = if cert_request.is_ca {
            KeyUsages::KeyCertSign | KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment
        } else {
            KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment
        };

        let mut extensions: Vec<ExtensionParam> = vec![
            ExtensionParam::from_extension(basic_constraints, true)?,
            ExtensionParam::from_extension(KeyUsage(key_usage_flags), true)?,
            ExtensionParam::from_extension(
                SubjectKeyIdentifier(cert_request.subject_public_key.key_id()?),
                false,
            )?,
            ExtensionParam::from_extension(
                AuthorityKeyIdentifier {
                    key_identifier: self.signing_key().key_id()?,
                },
                false,
            )?,
        ];

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        extensions.extend(cert_request.extensions.iter().cloned());

        let tbs_cert = TbsCertificate {
            serial_number: random_serial_number(),
            signature_algorithm: signature_algo,
            issuer: self.issuer_name()?,
            validity: *validity,
            subject: cert_request.subject.clone(),
            subject_public_key: cert_request.subject_public_key.clone(),
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| CertError::SigningError(e.to_string()))?,
        };

        tracing::debug!(
            subject = %cert_request.subject.common_name,
            is_ca = cert_request.is_ca,
            not_after = %validity.not_after,
            "issued certificate"
        );

        Ok(Certificate { inner: cert_inner })
    }
}
