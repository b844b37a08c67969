//! Named byte-blob secrets and the store they live in.

use std::collections::BTreeMap;

use crate::cert::CertificateWithPrivateKey;
use crate::codec;
use crate::error::{CertError, Result};

/// Data key holding the PEM certificate (chain) of a secret.
pub const CERT_BYTES_KEY: &str = "tls.crt";
/// Data key holding the PEM private key of a secret.
pub const KEY_BYTES_KEY: &str = "tls.key";

/// A named map of byte blobs plus string annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, Vec<u8>>,
    pub annotations: BTreeMap<String, String>,
}

impl Secret {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Checks that both the certificate and the key entries are present.
    pub fn validate(&self) -> Result<()> {
        self.required(CERT_BYTES_KEY)?;
        self.required(KEY_BYTES_KEY)?;
        Ok(())
    }

    /// Decodes the certificate and key held by the secret. The first
    /// certificate of the stored chain becomes the leaf.
    pub fn load(&self) -> Result<CertificateWithPrivateKey> {
        self.validate()?;
        let cert = self.required(CERT_BYTES_KEY)?;
        let key = self.required(KEY_BYTES_KEY)?;
        codec::decode_key_pair(cert, key)
    }

    fn required(&self, field: &str) -> Result<&[u8]> {
        self.get(field).ok_or_else(|| CertError::MissingField {
            secret: self.name.clone(),
            field: field.to_string(),
        })
    }
}

/// Persistence boundary for secrets.
///
/// `put` replaces the whole secret; implementations never store a partial one.
pub trait SecretStore {
    fn get(&self, name: &str) -> Result<Option<Secret>>;

    fn put(&mut self, secret: Secret) -> Result<()>;
}

/// In-memory secret store.
#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore {
    secrets: BTreeMap<String, Secret>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, name: &str) -> Result<Option<Secret>> {
        Ok(self.secrets.get(name).cloned())
    }

    fn put(&mut self, secret: Secret) -> Result<()> {
        if secret.name.is_empty() {
            return Err(CertError::Store("secret name must not be empty".to_string()));
        }
        self.secrets.insert(secret.name.clone(), secret);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::factory::KeyPairFactory;

    fn populated(name: &str) -> (Secret, CertificateWithPrivateKey) {
        let ca = KeyPairFactory::with_key_bits(1024)
            .new_ca("certrotor.io", Duration::from_secs(3600))
            .unwrap();
        let mut secret = Secret::new(name, "ops");
        secret
            .data
            .insert(CERT_BYTES_KEY.to_string(), codec::encode_cert(&ca.cert).unwrap());
        secret
            .data
            .insert(KEY_BYTES_KEY.to_string(), codec::encode_key(&ca.key).unwrap());
        (secret, ca)
    }

    #[test]
    fn test_validate_reports_missing_key() {
        let (mut secret, _) = populated("certrotor-ca");
        secret.data.remove(KEY_BYTES_KEY);

        assert_eq!(
            secret.validate().unwrap_err(),
            CertError::MissingField {
                secret: "certrotor-ca".to_string(),
                field: KEY_BYTES_KEY.to_string(),
            }
        );
        assert_eq!(secret.load().unwrap_err(), secret.validate().unwrap_err());
    }

    #[test]
    fn test_load_reports_missing_cert_before_key() {
        let mut secret = Secret::new("certrotor-api-certs", "ops");
        secret.data.insert(KEY_BYTES_KEY.to_string(), b"garbage".to_vec());

        assert_eq!(
            secret.load().unwrap_err(),
            CertError::MissingField {
                secret: "certrotor-api-certs".to_string(),
                field: CERT_BYTES_KEY.to_string(),
            }
        );
    }

    #[test]
    fn test_validate_reports_missing_cert_first() {
        let secret = Secret::new("empty", "ops");
        let err = secret.validate().unwrap_err();
        assert_eq!(err.to_string(), "tls.crt value not found in empty secret");
    }

    #[test]
    fn test_load_round_trip() {
        let (secret, ca) = populated("certrotor-ca");
        assert_eq!(secret.load().unwrap(), ca);
    }

    #[test]
    fn test_load_corrupt_cert_is_malformed() {
        let (mut secret, _) = populated("certrotor-ca");
        secret
            .data
            .insert(CERT_BYTES_KEY.to_string(), b"garbage".to_vec());
        assert!(matches!(secret.load(), Err(CertError::MalformedMaterial(_))));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemorySecretStore::new();
        assert!(store.get("certrotor-ca").unwrap().is_none());

        let (secret, _) = populated("certrotor-ca");
        store.put(secret.clone()).unwrap();
        assert_eq!(store.get("certrotor-ca").unwrap(), Some(secret));
        assert_eq!(store.len(), 1);

        assert!(matches!(
            store.put(Secret::default()),
            Err(CertError::Store(_))
        ));
    }
}
