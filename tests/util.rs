#![allow(dead_code)]

use std::time::Duration;

use certrotor::cert::CertificateWithPrivateKey;
use certrotor::cert::params::Validity;
use certrotor::config::{Config, RegistryConfig};
use certrotor::factory::KeyPairFactory;
use certrotor::strategy::CertificateRegistry;
use time::OffsetDateTime;

/// Small keys keep the suites fast; nothing here depends on key strength.
pub const TEST_KEY_BITS: usize = 1024;

pub const HOUR: Duration = Duration::from_secs(3600);

pub fn factory() -> KeyPairFactory {
    KeyPairFactory::with_key_bits(TEST_KEY_BITS)
}

pub fn generate_ca_cert() -> CertificateWithPrivateKey {
    factory().new_ca("certrotor.io", HOUR).unwrap()
}

/// A CA issued at `not_before` with the given lifetime.
pub fn ca_issued_at(not_before: OffsetDateTime, lifetime: time::Duration) -> CertificateWithPrivateKey {
    factory()
        .new_ca_with_validity(
            "certrotor.io",
            Validity::new(not_before, not_before + lifetime).unwrap(),
        )
        .unwrap()
}

pub fn test_config() -> Config {
    Config {
        namespace: "ops".to_string(),
        registry: RegistryConfig {
            key_bits: TEST_KEY_BITS,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn test_registry() -> CertificateRegistry {
    CertificateRegistry::new(test_config().registry)
}

/// Current time truncated to whole seconds, the resolution of X.509 times.
pub fn now_seconds() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp()).unwrap()
}
