pub mod extensions;
pub mod params;

use der::asn1::AnyRef;
use der::{Decode, Encode, EncodePem};
use extensions::{
    BasicConstraints, ExtendedKeyUsage, FlagSet, KeyUsage, KeyUsages, SubjectAltName,
    ToAndFromX509Extension,
};
use params::{CertificationRequestInfo, DistinguishedName, Validity};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;

use crate::error::{CertError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::from_x509_time;

/// Represents the supported signature algorithms for certificates.
///
/// Certificates are always signed with SHA-256; the wider digests are accepted
/// when verifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRsa,
    /// SHA-384 with RSA encryption.
    Sha384WithRsa,
    /// SHA-512 with RSA encryption.
    Sha512WithRsa,
}

impl SignatureAlgorithm {
    pub fn from_oid(oid: &const_oid::ObjectIdentifier) -> Option<Self> {
        [
            Self::Sha256WithRsa,
            Self::Sha384WithRsa,
            Self::Sha512WithRsa,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
    }

    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        match self {
            Self::Sha256WithRsa => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            Self::Sha384WithRsa => const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
            Self::Sha512WithRsa => const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
        }
    }
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA algorithm identifiers carry an explicit NULL parameter (RFC 4055).
    fn from(value: SignatureAlgorithm) -> Self {
        x509_cert::spki::AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters: Some(AnyRef::NULL.into()),
        }
    }
}

/// Semantic view of a certificate: the fields rotation decisions are made on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub common_name: String,
    pub organizations: Vec<String>,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub is_ca: bool,
    pub serial_number: Vec<u8>,
    pub key_usage: FlagSet<KeyUsages>,
    pub extended_key_usage: Vec<extensions::ExtendedKeyUsageOption>,
    pub subject_alt_name: SubjectAltName,
}

/// Represents an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CertError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CertError::EncodingError(e.to_string()))
    }

    /// Parses a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)
            .map_err(|e| CertError::MalformedMaterial(format!("failed to parse certificate: {e}")))?;
        Ok(Certificate { inner })
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn common_name(&self) -> String {
        self.subject().common_name
    }

    pub fn not_before(&self) -> OffsetDateTime {
        from_x509_time(&self.inner.tbs_certificate.validity.not_before)
    }

    pub fn not_after(&self) -> OffsetDateTime {
        from_x509_time(&self.inner.tbs_certificate.validity.not_after)
    }

    pub fn validity(&self) -> Validity {
        Validity {
            not_before: self.not_before(),
            not_after: self.not_after(),
        }
    }

    pub fn serial_number(&self) -> Vec<u8> {
        self.inner.tbs_certificate.serial_number.as_bytes().to_vec()
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Decodes the extension of type `E`, if the certificate carries one.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    /// Whether BasicConstraints marks this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension::<BasicConstraints>(),
            Ok(Some(BasicConstraints { is_ca: true, .. }))
        )
    }

    /// Extracts the semantic fields of the certificate.
    pub fn info(&self) -> Result<CertificateInfo> {
        let subject = self.subject();
        Ok(CertificateInfo {
            common_name: subject.common_name,
            organizations: subject.organizations,
            not_before: self.not_before(),
            not_after: self.not_after(),
            is_ca: self.is_ca(),
            serial_number: self.serial_number(),
            key_usage: self
                .extension::<KeyUsage>()?
                .map(|ku| ku.0)
                .unwrap_or_else(FlagSet::empty),
            extended_key_usage: self
                .extension::<ExtendedKeyUsage>()?
                .map(|eku| eku.usage)
                .unwrap_or_default(),
            subject_alt_name: self.extension::<SubjectAltName>()?.unwrap_or_default(),
        })
    }

    /// Verifies that this certificate was issued by `ca`, using `ca` as the
    /// only trust root, and that both are valid at `now`.
    pub fn verify_signed_by(&self, ca: &Certificate, now: OffsetDateTime) -> Result<()> {
        if !ca.is_ca() {
            return Err(CertError::VerificationFailure(format!(
                "'{}' is not a certificate authority",
                ca.common_name()
            )));
        }

        if self.inner.tbs_certificate.issuer != ca.inner.tbs_certificate.subject {
            return Err(CertError::VerificationFailure(format!(
                "'{}' was not issued by '{}'",
                self.common_name(),
                ca.common_name()
            )));
        }

        let algorithm = SignatureAlgorithm::from_oid(&self.inner.signature_algorithm.oid)
            .ok_or_else(|| {
                CertError::VerificationFailure(format!(
                    "unsupported signature algorithm {}",
                    self.inner.signature_algorithm.oid
                ))
            })?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        ca.public_key()
            .map_err(|e| CertError::VerificationFailure(e.to_string()))?
            .verify(&tbs, self.inner.signature.raw_bytes(), &algorithm)?;

        for (role, cert) in [("certificate", self), ("CA", ca)] {
            if !cert.validity().contains(now) {
                return Err(CertError::VerificationFailure(format!(
                    "{role} '{}' is not valid at {now}: valid from {} to {}",
                    cert.common_name(),
                    cert.not_before(),
                    cert.not_after()
                )));
            }
        }

        Ok(())
    }

    /// Creates a new self-signed certificate.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    /// * `validity` - The validity window of the new certificate.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: &Validity,
    ) -> Result<Self> {
        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.as_x509_name()?,
            key,
        };
        self_issuer.issue(cert_info, validity)
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: x509_cert::name::Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<x509_cert::name::Name> {
        Ok(self.name.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// A certificate together with its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Result<x509_cert::name::Name> {
        // The name of the issuer is the subject of the certificate
        Ok(self.cert.inner.tbs_certificate.subject.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }
}
