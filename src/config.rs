//! Configuration for the certificate registry and the rotation schedule.
//!
//! Every struct deserializes with defaults for missing fields, so an empty
//! document yields a working configuration. Durations use humantime notation
//! (`"7d"`, `"24h"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::key::DEFAULT_RSA_BITS;

/// Top level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Namespace the managed secrets live in.
    pub namespace: String,

    pub registry: RegistryConfig,

    pub rotation: RotationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "certrotor".to_string(),
            registry: RegistryConfig::default(),
            rotation: RotationConfig::default(),
        }
    }
}

/// Naming and key parameters of the certificate registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Prefix of every managed secret name, `<prefix>-<slot>`.
    pub secret_prefix: String,

    /// Base of the CA and identity common names.
    pub identity_domain: String,

    /// Cluster DNS domain used in fully qualified service names.
    pub cluster_domain: String,

    /// Prefix of the annotations written on populated secrets.
    pub annotation_prefix: String,

    /// RSA modulus size of newly generated keys.
    pub key_bits: usize,

    pub services: ServiceNames,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            secret_prefix: "certrotor".to_string(),
            identity_domain: "certrotor.io".to_string(),
            cluster_domain: "cluster.local".to_string(),
            annotation_prefix: "certrotor.io".to_string(),
            key_bits: DEFAULT_RSA_BITS,
            services: ServiceNames::default(),
        }
    }
}

/// Service names of the components that get server certificates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceNames {
    pub operator: String,
    pub api: String,
    pub controller: String,
    pub handler: String,
    pub export_proxy: String,
    pub synchronization_controller: String,
}

impl Default for ServiceNames {
    fn default() -> Self {
        Self {
            operator: "certrotor-operator".to_string(),
            api: "certrotor-api".to_string(),
            controller: "certrotor-controller".to_string(),
            handler: "certrotor-handler".to_string(),
            export_proxy: "certrotor-exportproxy".to_string(),
            synchronization_controller: "certrotor-synchronization-controller".to_string(),
        }
    }
}

/// Lifetimes of minted certificates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Lifetime of CA certificates.
    #[serde(with = "humantime_serde")]
    pub ca_duration: Duration,

    /// How long a replaced CA stays in the trust bundle.
    #[serde(with = "humantime_serde")]
    pub ca_overlap: Duration,

    /// Lifetime of server and client certificates.
    #[serde(with = "humantime_serde")]
    pub cert_duration: Duration,
}

const fn default_ca_duration() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

const fn default_ca_overlap() -> Duration {
    Duration::from_secs(2 * 24 * 60 * 60)
}

const fn default_cert_duration() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            ca_duration: default_ca_duration(),
            ca_overlap: default_ca_overlap(),
            cert_duration: default_cert_duration(),
        }
    }
}
