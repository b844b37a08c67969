//! One synchronous rotation pass over every managed secret.
//!
//! The pass brings the CAs up to date first, folds each CA into its trust
//! bundle, and then re-issues every leaf that is due or no longer chains to
//! the current root CA. Scheduling the next pass is left to the caller; the
//! report says when it should happen.

use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::bundle::{CA_BUNDLE_KEY, MergedBundle, merge_bundle_at};
use crate::cert::CertificateWithPrivateKey;
use crate::config::Config;
use crate::error::{CertError, Result};
use crate::rotation::{needs_rotation, next_rotation_deadline_at};
use crate::secret::{Secret, SecretStore};
use crate::strategy::{CertSlot, CertificateRegistry};

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Slots that received fresh material, in processing order.
    pub rotated: Vec<CertSlot>,
    /// Number of certificates in each CA's trust bundle.
    pub bundle_counts: BTreeMap<CertSlot, usize>,
    /// When the next pass is due.
    pub next_wakeup: OffsetDateTime,
}

/// Name of the secret holding the trust bundle of the CA stored in `ca_secret_name`.
pub fn bundle_secret_name(ca_secret_name: &str) -> String {
    format!("{ca_secret_name}-bundle")
}

/// Runs one pass against `store`.
///
/// Material is written back slot by slot, so a failure part way through
/// leaves every already persisted secret complete and valid.
pub fn reconcile<S: SecretStore>(
    registry: &CertificateRegistry,
    config: &Config,
    store: &mut S,
) -> Result<ReconcileReport> {
    let now = OffsetDateTime::now_utc();
    let mut rotated = Vec::new();
    let mut bundle_counts = BTreeMap::new();
    let mut deadlines = Vec::new();
    let mut root_ca = None;

    for slot in CertSlot::ALL.into_iter().filter(CertSlot::is_ca) {
        let ca = ensure_slot(registry, config, store, slot, None, now, &mut rotated)?;
        deadlines.push(next_rotation_deadline_at(Some(&ca.cert), None, now));

        let merged = update_bundle(registry, config, store, slot, &ca, now)?;
        // Older CAs in the bundle become prunable once the current CA has
        // been out for the overlap window.
        if merged.count > 1 {
            deadlines.push(
                ca.cert
                    .not_before()
                    .saturating_add(to_time_duration(config.rotation.ca_overlap)),
            );
        }
        bundle_counts.insert(slot, merged.count);

        if slot == CertSlot::Ca {
            root_ca = Some(ca);
        }
    }

    let root_ca =
        root_ca.ok_or_else(|| CertError::MissingSigningCa(registry.secret_name(CertSlot::Ca)))?;

    for slot in CertSlot::ALL.into_iter().filter(|slot| !slot.is_ca()) {
        let leaf = ensure_slot(
            registry,
            config,
            store,
            slot,
            Some(&root_ca),
            now,
            &mut rotated,
        )?;
        deadlines.push(next_rotation_deadline_at(
            Some(&leaf.cert),
            Some(&root_ca.cert),
            now,
        ));
    }

    let next_wakeup = deadlines.into_iter().min().unwrap_or(now);
    tracing::debug!(rotated = rotated.len(), %next_wakeup, "reconciliation pass finished");

    Ok(ReconcileReport {
        rotated,
        bundle_counts,
        next_wakeup,
    })
}

/// Loads the secret of `slot`, re-populating and persisting it when it is
/// missing, unreadable or due.
fn ensure_slot<S: SecretStore>(
    registry: &CertificateRegistry,
    config: &Config,
    store: &mut S,
    slot: CertSlot,
    signing_ca: Option<&CertificateWithPrivateKey>,
    now: OffsetDateTime,
    rotated: &mut Vec<CertSlot>,
) -> Result<CertificateWithPrivateKey> {
    let name = registry.secret_name(slot);
    let secret = store
        .get(&name)?
        .unwrap_or_else(|| registry.new_secret(slot, &config.namespace));

    if !needs_rotation(&secret, signing_ca.map(|ca| &ca.cert), now) {
        tracing::debug!(secret = %name, "certificate is up to date");
        return secret.load();
    }

    let duration = if slot.is_ca() {
        config.rotation.ca_duration
    } else {
        config.rotation.cert_duration
    };
    let populated = registry.populate(&secret, signing_ca, duration)?;
    let loaded = populated.load()?;
    store.put(populated)?;

    tracing::info!(secret = %name, not_after = %loaded.cert.not_after(), "rotated certificate");
    rotated.push(slot);
    Ok(loaded)
}

fn update_bundle<S: SecretStore>(
    registry: &CertificateRegistry,
    config: &Config,
    store: &mut S,
    slot: CertSlot,
    ca: &CertificateWithPrivateKey,
    now: OffsetDateTime,
) -> Result<MergedBundle> {
    let name = bundle_secret_name(&registry.secret_name(slot));
    let mut secret = store
        .get(&name)?
        .unwrap_or_else(|| Secret::new(name.clone(), config.namespace.clone()));
    let existing = secret.get(CA_BUNDLE_KEY).unwrap_or_default().to_vec();
    let overlap = config.rotation.ca_overlap;

    let merged = match merge_bundle_at(&ca.cert, &existing, overlap, now) {
        Ok(merged) => merged,
        Err(err) => {
            tracing::info!(secret = %name, error = %err, "trust bundle is corrupt, resetting it");
            merge_bundle_at(&ca.cert, &[], overlap, now)?
        }
    };

    if merged.bytes != existing {
        secret
            .data
            .insert(CA_BUNDLE_KEY.to_string(), merged.bytes.clone());
        store.put(secret)?;
    }

    Ok(merged)
}

fn to_time_duration(duration: std::time::Duration) -> time::Duration {
    time::Duration::try_from(duration).unwrap_or(time::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::secret::MemorySecretStore;

    fn setup() -> (CertificateRegistry, Config) {
        let config = Config {
            namespace: "ops".to_string(),
            registry: RegistryConfig {
                key_bits: 1024,
                ..Default::default()
            },
            ..Default::default()
        };
        (CertificateRegistry::new(config.registry.clone()), config)
    }

    #[test]
    fn test_bundle_secret_name() {
        assert_eq!(bundle_secret_name("certrotor-ca"), "certrotor-ca-bundle");
    }

    #[test]
    fn test_first_pass_populates_everything() {
        let (registry, config) = setup();
        let mut store = MemorySecretStore::new();

        let report = reconcile(&registry, &config, &mut store).unwrap();
        assert_eq!(report.rotated, CertSlot::ALL.to_vec());
        assert_eq!(report.bundle_counts[&CertSlot::Ca], 1);
        assert_eq!(report.bundle_counts[&CertSlot::ExportCa], 1);
        // 12 slots plus 2 bundles
        assert_eq!(store.len(), 14);
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let (registry, config) = setup();
        let mut store = MemorySecretStore::new();
        reconcile(&registry, &config, &mut store).unwrap();
        let before = store.clone();

        let report = reconcile(&registry, &config, &mut store).unwrap();
        assert!(report.rotated.is_empty());
        for name in before.names() {
            assert_eq!(store.get(name).unwrap(), before.get(name).unwrap());
        }
    }
}
