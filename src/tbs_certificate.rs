use std::time::SystemTime;

use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use der::DateTime;
use rand_core::{OsRng, RngCore};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::Result;
use crate::key::PublicKey;

/// Length of freshly generated serial numbers, in bytes.
pub const SERIAL_NUMBER_LEN: usize = 16;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The name of the certificate issuer, copied verbatim from the issuing CA.
/// * `validity` - The certificate's validity window.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| -> Result<x509_cert::ext::Extension> {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial_number)?,
            signature: self.signature_algorithm.clone().into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }
}

/// Generates a positive, non-zero serial number from the operating system RNG.
pub fn random_serial_number() -> Vec<u8> {
    let mut serial = vec![0u8; SERIAL_NUMBER_LEN];
    OsRng.fill_bytes(&mut serial);
    // Clear the sign bit and keep the leading byte non-zero so the DER
    // INTEGER is exactly SERIAL_NUMBER_LEN bytes.
    serial[0] = (serial[0] & 0x7f) | 0x40;
    serial
}

/// RFC 5280: UTCTime through 2049, GeneralizedTime from 2050 on.
fn to_x509_time(instant: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let date_time = DateTime::from_system_time(SystemTime::from(instant))?;
    if date_time.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(UtcTime::from_date_time(
            date_time,
        )?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_date_time(date_time),
        ))
    }
}

/// Converts an X.509 time into an `OffsetDateTime`.
pub fn from_x509_time(time: &x509_cert::time::Time) -> OffsetDateTime {
    OffsetDateTime::from(time.to_system_time())
}
