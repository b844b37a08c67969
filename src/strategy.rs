//! The certificate slots of the cluster and how each one is minted.
//!
//! A slot is identified by the name of the secret holding it. The registry is
//! built once from [`RegistryConfig`] and is the single place that knows which
//! certificate goes into which secret.

use std::fmt;
use std::time::Duration;

use crate::cert::CertificateWithPrivateKey;
use crate::codec;
use crate::config::RegistryConfig;
use crate::error::{CertError, Result};
use crate::factory::{KeyPairFactory, ServerKeyPairRequest};
use crate::secret::{CERT_BYTES_KEY, KEY_BYTES_KEY, Secret};

/// A named certificate managed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CertSlot {
    /// Root CA signing every other certificate.
    Ca,
    /// Separate self-signed CA for the export service.
    ExportCa,
    Operator,
    Api,
    Controller,
    ExportProxy,
    HandlerServer,
    /// Client certificate of the node handler.
    Handler,
    HandlerMigrationClient,
    HandlerVsockClient,
    /// Client certificate of the synchronization controller.
    SynchronizationController,
    SynchronizationControllerServer,
}

impl CertSlot {
    pub const ALL: [CertSlot; 12] = [
        CertSlot::Ca,
        CertSlot::ExportCa,
        CertSlot::Operator,
        CertSlot::Api,
        CertSlot::Controller,
        CertSlot::ExportProxy,
        CertSlot::HandlerServer,
        CertSlot::Handler,
        CertSlot::HandlerMigrationClient,
        CertSlot::HandlerVsockClient,
        CertSlot::SynchronizationController,
        CertSlot::SynchronizationControllerServer,
    ];

    /// Suffix of the secret name, after the configured prefix.
    pub fn suffix(&self) -> &'static str {
        match self {
            CertSlot::Ca => "ca",
            CertSlot::ExportCa => "export-ca",
            CertSlot::Operator => "operator-certs",
            CertSlot::Api => "api-certs",
            CertSlot::Controller => "controller-certs",
            CertSlot::ExportProxy => "exportproxy-certs",
            CertSlot::HandlerServer => "handler-server-certs",
            CertSlot::Handler => "handler-certs",
            CertSlot::HandlerMigrationClient => "handler-migration-client-certs",
            CertSlot::HandlerVsockClient => "handler-vsock-client-certs",
            CertSlot::SynchronizationController => "synchronization-controller-certs",
            CertSlot::SynchronizationControllerServer => {
                "synchronization-controller-server-certs"
            }
        }
    }

    /// Whether the slot holds a self-signed CA rather than a leaf.
    pub fn is_ca(&self) -> bool {
        matches!(self, CertSlot::Ca | CertSlot::ExportCa)
    }
}

impl fmt::Display for CertSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Maps secret names to the certificate that belongs in them.
#[derive(Debug, Clone)]
pub struct CertificateRegistry {
    config: RegistryConfig,
    factory: KeyPairFactory,
}

impl CertificateRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let factory = KeyPairFactory::with_key_bits(config.key_bits);
        Self { config, factory }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Name of the secret holding `slot`.
    pub fn secret_name(&self, slot: CertSlot) -> String {
        format!("{}-{}", self.config.secret_prefix, slot.suffix())
    }

    /// Looks up the slot stored under `secret_name`.
    pub fn slot_for(&self, secret_name: &str) -> Option<CertSlot> {
        CertSlot::ALL
            .into_iter()
            .find(|slot| self.secret_name(*slot) == secret_name)
    }

    /// Annotation recording the duration of the latest population.
    pub fn duration_annotation_key(&self) -> String {
        format!("{}/duration", self.config.annotation_prefix)
    }

    /// Builds the empty secret for `slot`.
    pub fn new_secret(&self, slot: CertSlot, namespace: &str) -> Secret {
        Secret::new(self.secret_name(slot), namespace)
    }

    /// Mints fresh material for `slot`.
    ///
    /// CA slots are self-signed and ignore `signing_ca`; every other slot
    /// requires it.
    pub fn mint(
        &self,
        slot: CertSlot,
        namespace: &str,
        signing_ca: Option<&CertificateWithPrivateKey>,
        duration: Duration,
    ) -> Result<CertificateWithPrivateKey> {
        let domain = &self.config.identity_domain;
        let services = &self.config.services;

        match slot {
            CertSlot::Ca => self.factory.new_ca(domain, duration),
            CertSlot::ExportCa => self.factory.new_ca(&format!("export.{domain}"), duration),
            CertSlot::Operator => {
                self.pod_server(slot, &services.operator, namespace, signing_ca, duration)
            }
            CertSlot::Api => self.pod_server(slot, &services.api, namespace, signing_ca, duration),
            CertSlot::Controller => {
                self.pod_server(slot, &services.controller, namespace, signing_ca, duration)
            }
            CertSlot::ExportProxy => {
                self.pod_server(slot, &services.export_proxy, namespace, signing_ca, duration)
            }
            CertSlot::HandlerServer => self.server(
                slot,
                format!("{domain}:system:node:{}", services.handler),
                &services.handler,
                namespace,
                signing_ca,
                duration,
            ),
            CertSlot::SynchronizationControllerServer => self.server(
                slot,
                format!("{domain}:system:node:{}", services.synchronization_controller),
                &services.synchronization_controller,
                namespace,
                signing_ca,
                duration,
            ),
            CertSlot::Handler => self.client(
                slot,
                &format!("{domain}:system:client:{}", services.handler),
                signing_ca,
                duration,
            ),
            CertSlot::HandlerMigrationClient => self.client(
                slot,
                &format!("{domain}:system:client:migration"),
                signing_ca,
                duration,
            ),
            CertSlot::HandlerVsockClient => self.client(
                slot,
                &format!("{domain}:system:client:vsock"),
                signing_ca,
                duration,
            ),
            CertSlot::SynchronizationController => self.client(
                slot,
                &format!("{domain}:system:client:{}", services.synchronization_controller),
                signing_ca,
                duration,
            ),
        }
    }

    /// Returns a copy of `secret` holding fresh material for its slot.
    ///
    /// The data map is replaced by the PEM certificate and key, and the
    /// duration is recorded as an annotation. `secret` itself is never
    /// modified, so a failure leaves nothing half written.
    pub fn populate(
        &self,
        secret: &Secret,
        signing_ca: Option<&CertificateWithPrivateKey>,
        duration: Duration,
    ) -> Result<Secret> {
        let slot = self
            .slot_for(&secret.name)
            .ok_or_else(|| CertError::UnknownSlot(secret.name.clone()))?;

        let minted = self.mint(slot, &secret.namespace, signing_ca, duration)?;

        let mut populated = secret.clone();
        populated.data = [
            (CERT_BYTES_KEY.to_string(), codec::encode_cert(&minted.cert)?),
            (KEY_BYTES_KEY.to_string(), codec::encode_key(&minted.key)?),
        ]
        .into_iter()
        .collect();
        populated.annotations.insert(
            self.duration_annotation_key(),
            humantime::format_duration(duration).to_string(),
        );
        Ok(populated)
    }

    fn pod_server(
        &self,
        slot: CertSlot,
        service: &str,
        namespace: &str,
        signing_ca: Option<&CertificateWithPrivateKey>,
        duration: Duration,
    ) -> Result<CertificateWithPrivateKey> {
        let common_name = format!("{service}.{namespace}.pod.{}", self.config.cluster_domain);
        self.server(slot, common_name, service, namespace, signing_ca, duration)
    }

    fn server(
        &self,
        slot: CertSlot,
        common_name: String,
        service: &str,
        namespace: &str,
        signing_ca: Option<&CertificateWithPrivateKey>,
        duration: Duration,
    ) -> Result<CertificateWithPrivateKey> {
        let ca = self.require_ca(slot, signing_ca)?;
        let request = ServerKeyPairRequest::builder()
            .common_name(common_name)
            .service_name(service)
            .namespace(namespace)
            .domain(self.config.cluster_domain.as_str())
            .build();
        self.factory.new_server_key_pair(ca, &request, duration)
    }

    fn client(
        &self,
        slot: CertSlot,
        common_name: &str,
        signing_ca: Option<&CertificateWithPrivateKey>,
        duration: Duration,
    ) -> Result<CertificateWithPrivateKey> {
        let ca = self.require_ca(slot, signing_ca)?;
        self.factory
            .new_client_key_pair(ca, common_name, &[], duration)
    }

    fn require_ca<'a>(
        &self,
        slot: CertSlot,
        signing_ca: Option<&'a CertificateWithPrivateKey>,
    ) -> Result<&'a CertificateWithPrivateKey> {
        signing_ca.ok_or_else(|| CertError::MissingSigningCa(self.secret_name(slot)))
    }
}
