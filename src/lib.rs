//! # certrotor - Certificate Lifecycle and CA Rotation for Cluster Components
//!
//! certrotor mints and rotates the TLS material of a set of cooperating cluster
//! components: one self-signed root CA, server and client certificates signed by
//! it, and a rolling trust bundle that lets the CA itself be replaced without
//! breaking connections that still rely on the previous CA.
//!
//! It is built on the rustcrypto libraries and has no I/O of its own. Secrets
//! are read and written through the [`secret::SecretStore`] trait.
//!
//! ## Key Features
//!
//! - **Key Pair Minting**: RSA CA, server and client certificates with the usual
//!   X.509 extensions
//! - **Certificate Slots**: A closed registry mapping every secret name to the
//!   certificate that belongs in it
//! - **Rotation Deadlines**: Rotate at 80% of the lifetime, or immediately when a
//!   certificate no longer chains to its CA
//! - **Trust Bundles**: Keep replaced CAs trusted for a configurable overlap
//! - **PEM Codec**: Certificates, PKCS#1 keys and concatenated certificate chains
//!
//! ## Quick Start
//!
//! ### Minting a CA and a Server Certificate
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use certrotor::factory::{KeyPairFactory, ServerKeyPairRequest};
//!
//! # fn main() -> Result<(), certrotor::error::CertError> {
//! let factory = KeyPairFactory::default();
//! let ca = factory.new_ca("certrotor.io", Duration::from_secs(7 * 24 * 3600))?;
//!
//! let request = ServerKeyPairRequest::builder()
//!     .common_name("certrotor-api.ops.pod.cluster.local")
//!     .service_name("certrotor-api")
//!     .namespace("ops")
//!     .domain("cluster.local")
//!     .build();
//! let server = factory.new_server_key_pair(&ca, &request, Duration::from_secs(24 * 3600))?;
//!
//! println!("{}", server.cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Running a Rotation Pass
//!
//! ```rust,no_run
//! use certrotor::config::Config;
//! use certrotor::reconcile::reconcile;
//! use certrotor::secret::MemorySecretStore;
//! use certrotor::strategy::CertificateRegistry;
//!
//! # fn main() -> Result<(), certrotor::error::CertError> {
//! let config = Config::default();
//! let registry = CertificateRegistry::new(config.registry.clone());
//! let mut store = MemorySecretStore::new();
//!
//! let report = reconcile(&registry, &config, &mut store)?;
//! println!("rotated {:?}, next pass at {}", report.rotated, report.next_wakeup);
//! # Ok(())
//! # }
//! ```
//!
//! ### Folding a New CA into a Trust Bundle
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use certrotor::bundle::merge_bundle;
//! use certrotor::factory::KeyPairFactory;
//!
//! # fn main() -> Result<(), certrotor::error::CertError> {
//! let factory = KeyPairFactory::default();
//! let old_ca = factory.new_ca("certrotor.io", Duration::from_secs(3600))?;
//! let new_ca = factory.new_ca("certrotor.io", Duration::from_secs(3600))?;
//!
//! let existing = certrotor::codec::encode_cert(&old_ca.cert)?;
//! let merged = merge_bundle(&new_ca.cert, &existing, Duration::from_secs(600))?;
//! assert_eq!(merged.count, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::CertError`]:
//!
//! ```rust
//! use certrotor::{error::CertError, secret::Secret};
//!
//! let secret = Secret::new("certrotor-ca", "ops");
//! match secret.load() {
//!     Ok(_) => println!("loaded"),
//!     Err(CertError::MissingField { field, .. }) => println!("missing {field}"),
//!     Err(CertError::MalformedMaterial(msg)) => println!("corrupt: {msg}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: RSA key generation, PEM import/export and signatures
//! - [`cert`]: Certificate model, extensions and chain verification
//! - [`issuer`]: Certificate issuing
//! - [`factory`]: CA, server and client key pair minting
//! - [`codec`]: PEM encoding of certificates, keys and chains
//! - [`rotation`]: Rotation deadlines
//! - [`bundle`]: Trust bundle merging
//! - [`secret`]: Secrets and the secret store boundary
//! - [`strategy`]: Certificate slots and the registry that populates them
//! - [`reconcile`]: A complete rotation pass
//! - [`config`]: Serde configuration
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod bundle;
pub mod cert;
pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod issuer;
pub mod key;
pub mod reconcile;
pub mod rotation;
pub mod secret;
pub mod strategy;
pub mod tbs_certificate;
