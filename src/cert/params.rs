use bon::Builder;
use const_oid::ObjectIdentifier;
use der::Tag;
use der::asn1::{Any, SetOfVec};
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsage;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::error::{CertError, Result};
use crate::key::PublicKey;

/// Parameters for building an X.509 certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `usages` - A list of extended key usage options.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `extensions` - Additional X.509 extensions, such as subject alternative names.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Subject or issuer name of a certificate.
///
/// Only the attributes the cluster PKI uses are modelled: one common name
/// and any number of organizations.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    #[builder(default)]
    pub organizations: Vec<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509 name.
    ///
    /// Organizations are emitted before the common name and every value is
    /// encoded as a UTF8String.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::Name> {
        let mut rdns = Vec::with_capacity(self.organizations.len() + 1);
        for organization in &self.organizations {
            rdns.push(single_attribute(const_oid::db::rfc4519::O, organization)?);
        }
        rdns.push(single_attribute(
            const_oid::db::rfc4519::CN,
            &self.common_name,
        )?);
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 name.
    ///
    /// Attributes other than CN and O are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::Name) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Ok(value) = std::str::from_utf8(attr.value.value()) else {
                    continue;
                };
                if attr.oid == const_oid::db::rfc4519::CN {
                    dn.common_name = value.to_string();
                } else if attr.oid == const_oid::db::rfc4519::O {
                    dn.organizations.push(value.to_string());
                }
            }
        }

        dn
    }
}

fn single_attribute(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName> {
    let atv = AttributeTypeAndValue {
        oid,
        value: Any::new(Tag::Utf8String, value.as_bytes())?,
    };
    Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
}

/// Certificate validity period.
///
/// Invariant: `not_before < not_after`.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period, rejecting empty or inverted windows.
    pub fn new(not_before: OffsetDateTime, not_after: OffsetDateTime) -> Result<Self> {
        if not_before >= not_after {
            return Err(CertError::InvalidInput(format!(
                "validity window is empty: not_before {not_before} is not before not_after {not_after}"
            )));
        }
        Ok(Self {
            not_before,
            not_after,
        })
    }

    /// Creates a validity period starting now and lasting `duration`.
    pub fn starting_now(duration: std::time::Duration) -> Result<Self> {
        let now = OffsetDateTime::now_utc();
        let lifetime = time::Duration::try_from(duration)
            .map_err(|e| CertError::InvalidInput(format!("duration out of range: {e}")))?;
        let not_after = now.checked_add(lifetime).ok_or_else(|| {
            CertError::InvalidInput(format!("duration {lifetime} overflows the calendar"))
        })?;
        Self::new(now, not_after)
    }

    /// Total lifetime of the window.
    pub fn lifetime(&self) -> time::Duration {
        self.not_after - self.not_before
    }

    /// Whether `instant` lies inside the window, bounds included.
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }
}
