//! PEM encoding of certificates, private keys and certificate chains.

use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::error::{CertError, Result};
use crate::key::KeyPair;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PEM_BEGIN_MARKER: &str = "-----BEGIN ";

/// Encodes a certificate as a single `CERTIFICATE` PEM block.
pub fn encode_cert(cert: &Certificate) -> Result<Vec<u8>> {
    Ok(cert.to_pem()?.into_bytes())
}

/// Encodes a private key as a PKCS#1 `RSA PRIVATE KEY` PEM block.
pub fn encode_key(key: &KeyPair) -> Result<Vec<u8>> {
    Ok(key.to_pkcs1_pem()?.into_bytes())
}

/// Encodes certificates as concatenated PEM blocks, in order.
pub fn encode_cert_chain<'a>(certs: impl IntoIterator<Item = &'a Certificate>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for cert in certs {
        out.extend_from_slice(&encode_cert(cert)?);
    }
    Ok(out)
}

/// Parses zero or more PEM certificates from a single blob.
///
/// Empty or whitespace-only input yields an empty chain. Blocks with a label
/// other than `CERTIFICATE` are skipped, but input holding no certificate at
/// all is rejected. Input containing an unterminated or undecodable block is
/// rejected as a whole.
pub fn decode_cert_chain(bytes: &[u8]) -> Result<Vec<Certificate>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let blocks = pem::parse_many(bytes)
        .map_err(|e| CertError::MalformedMaterial(format!("failed to parse PEM: {e}")))?;

    let markers = count_begin_markers(bytes);
    if blocks.is_empty() || blocks.len() != markers {
        return Err(CertError::MalformedMaterial(format!(
            "found {} complete PEM blocks but {markers} begin markers",
            blocks.len()
        )));
    }

    let certs = blocks
        .iter()
        .filter(|block| block.tag() == CERTIFICATE_LABEL)
        .map(|block| Certificate::from_der(block.contents()))
        .collect::<Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(CertError::MalformedMaterial(format!(
            "none of the {} PEM blocks is a certificate",
            blocks.len()
        )));
    }
    Ok(certs)
}

fn count_begin_markers(bytes: &[u8]) -> usize {
    bytes
        .windows(PEM_BEGIN_MARKER.len())
        .filter(|window| *window == PEM_BEGIN_MARKER.as_bytes())
        .count()
}

/// Decodes a certificate and its private key.
///
/// The first certificate of `cert_bytes` is the leaf; it must carry the
/// public half of the key in `key_bytes`.
pub fn decode_key_pair(cert_bytes: &[u8], key_bytes: &[u8]) -> Result<CertificateWithPrivateKey> {
    let cert = decode_cert_chain(cert_bytes)?
        .into_iter()
        .next()
        .ok_or_else(|| CertError::MalformedMaterial("no certificate found".to_string()))?;
    let key = KeyPair::import_from_pem(key_bytes)?;

    if cert.public_key()? != key.public_key() {
        return Err(CertError::MalformedMaterial(format!(
            "private key does not match the public key of certificate '{}'",
            cert.common_name()
        )));
    }

    Ok(CertificateWithPrivateKey { cert, key })
}
