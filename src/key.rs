use der::{Decode, Encode};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{CertError, Result};

/// Default modulus size for freshly generated keys.
pub const DEFAULT_RSA_BITS: usize = 2048;

const PKCS1_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
const PKCS8_PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// An RSA key pair used to sign certificates or to back a TLS endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    ///
    /// Randomness is drawn from the operating system on every call.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CertError::KeyGenerationError(e.to_string()))?;
        Ok(Self::from_private_key(private))
    }

    /// Wraps an existing RSA private key.
    pub fn from_private_key(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair {
            private: Box::new(private),
            public,
        }
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.public.clone())
    }

    /// Returns the SubjectPublicKeyInfo structure for this key.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// SHA-1 over the subject public key bits, as used for key identifiers.
    pub fn key_id(&self) -> Result<Vec<u8>> {
        self.public_key().key_id()
    }

    /// Signs `data` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::<Sha256>::new((*self.private).clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| CertError::SigningError(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Encodes the private key as a PKCS#1 `RSA PRIVATE KEY` PEM block.
    pub fn to_pkcs1_pem(&self) -> Result<String> {
        let pem = self
            .private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| CertError::EncodingError(e.to_string()))?;
        Ok(pem.to_string())
    }

    /// Imports a private key from a PKCS#1 or PKCS#8 PEM block.
    pub fn import_from_pem(pem_bytes: &[u8]) -> Result<Self> {
        let block = pem::parse(pem_bytes)
            .map_err(|e| CertError::MalformedMaterial(format!("failed to parse key PEM: {e}")))?;

        let private = match block.tag() {
            PKCS1_PRIVATE_KEY_LABEL => RsaPrivateKey::from_pkcs1_der(block.contents())
                .map_err(|e| CertError::MalformedMaterial(format!("invalid PKCS#1 key: {e}")))?,
            PKCS8_PRIVATE_KEY_LABEL => RsaPrivateKey::from_pkcs8_der(block.contents())
                .map_err(|e| CertError::MalformedMaterial(format!("invalid PKCS#8 key: {e}")))?,
            other => {
                return Err(CertError::MalformedMaterial(format!(
                    "unexpected PEM block '{other}' where a private key was expected"
                )));
            }
        };

        Ok(Self::from_private_key(private))
    }
}

/// The public half of a [`KeyPair`], as carried in a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(pub RsaPublicKey);

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        key_pair.public_key()
    }

    /// Extracts the RSA public key from a certificate's SubjectPublicKeyInfo.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        let public = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CertError::MalformedMaterial(format!("unsupported public key: {e}")))?;
        Ok(PublicKey(public))
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| CertError::EncodingError(e.to_string()))?;
        Ok(SubjectPublicKeyInfoOwned::from_der(der.as_bytes())?)
    }

    pub fn key_id(&self) -> Result<Vec<u8>> {
        let spki = self.to_spki()?;
        Ok(Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec())
    }

    /// Verifies an RSASSA-PKCS1-v1_5 signature made with the given algorithm.
    pub fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        algorithm: &SignatureAlgorithm,
    ) -> Result<()> {
        let signature = Signature::try_from(signature)
            .map_err(|e| CertError::VerificationFailure(format!("malformed signature: {e}")))?;

        let outcome = match algorithm {
            SignatureAlgorithm::Sha256WithRsa => {
                VerifyingKey::<Sha256>::new(self.0.clone()).verify(data, &signature)
            }
            SignatureAlgorithm::Sha384WithRsa => {
                VerifyingKey::<Sha384>::new(self.0.clone()).verify(data, &signature)
            }
            SignatureAlgorithm::Sha512WithRsa => {
                VerifyingKey::<Sha512>::new(self.0.clone()).verify(data, &signature)
            }
        };

        outcome.map_err(|e| CertError::VerificationFailure(format!("bad signature: {e}")))
    }
}
