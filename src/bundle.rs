//! Rolling CA trust bundles.
//!
//! When the CA is replaced, peers keep trusting the previous CAs until the
//! overlap window has passed. The bundle always leads with the current CA,
//! followed by the prior CAs still inside their window, newest first.

use std::time::Duration;

use time::OffsetDateTime;

use crate::cert::Certificate;
use crate::codec;
use crate::error::Result;

/// Number of existing bundle entries considered when merging.
pub const MAX_CERTIFICATES_IN_BUNDLE: usize = 10;

/// Data key holding the concatenated PEM trust bundle.
pub const CA_BUNDLE_KEY: &str = "ca-bundle";

/// Result of a merge: the encoded bundle and the number of certificates in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedBundle {
    pub bytes: Vec<u8>,
    pub count: usize,
}

/// Folds `current_ca` into the existing bundle, reading the clock once.
pub fn merge_bundle(
    current_ca: &Certificate,
    existing: &[u8],
    overlap: Duration,
) -> Result<MergedBundle> {
    merge_bundle_at(current_ca, existing, overlap, OffsetDateTime::now_utc())
}

/// Folds `current_ca` into the existing bundle, as seen at `now`.
///
/// Only the first [`MAX_CERTIFICATES_IN_BUNDLE`] entries of `existing` are
/// considered. Those are ordered by issuance, newest first, and walked until
/// the issuance time of the entry before (the current CA for the first entry)
/// is more than `overlap` in the past. Expired entries and repeats of a
/// certificate already in the bundle are dropped along the way.
///
/// Fails only when `existing` cannot be decoded.
pub fn merge_bundle_at(
    current_ca: &Certificate,
    existing: &[u8],
    overlap: Duration,
    now: OffsetDateTime,
) -> Result<MergedBundle> {
    let mut prior = codec::decode_cert_chain(existing)?;
    if prior.len() > MAX_CERTIFICATES_IN_BUNDLE {
        tracing::warn!(
            found = prior.len(),
            max = MAX_CERTIFICATES_IN_BUNDLE,
            "trust bundle holds too many certificates, ignoring the oldest entries"
        );
        prior.truncate(MAX_CERTIFICATES_IN_BUNDLE);
    }
    prior.sort_by(|a, b| b.not_before().cmp(&a.not_before()));

    let overlap = time::Duration::try_from(overlap).unwrap_or(time::Duration::MAX);
    let current_pem = codec::encode_cert(current_ca)?;

    let mut emitted = vec![current_pem];
    let mut reference = current_ca.not_before();

    for (i, cert) in prior.iter().enumerate() {
        if i > 0 {
            reference = prior[i - 1].not_before();
        }
        if reference.saturating_add(overlap) < now {
            tracing::info!(
                remaining = prior.len() - i,
                "overlap window elapsed, dropping older CAs from the trust bundle"
            );
            break;
        }

        if cert.not_after() < now {
            tracing::debug!(
                common_name = %cert.common_name(),
                not_after = %cert.not_after(),
                "skipping expired CA"
            );
            continue;
        }

        let pem = codec::encode_cert(cert)?;
        if emitted.contains(&pem) {
            tracing::debug!(common_name = %cert.common_name(), "skipping duplicate CA");
            continue;
        }
        emitted.push(pem);
    }

    Ok(MergedBundle {
        count: emitted.len(),
        bytes: emitted.concat(),
    })
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::cert::CertificateWithPrivateKey;
    use crate::cert::params::Validity;
    use crate::error::CertError;
    use crate::factory::KeyPairFactory;

    const OVERLAP: Duration = Duration::from_secs(120);

    fn minutes(n: i64) -> time::Duration {
        time::Duration::minutes(n)
    }

    fn t0() -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        OffsetDateTime::from_unix_timestamp(now.unix_timestamp()).unwrap()
    }

    fn ca_issued_at(not_before: OffsetDateTime) -> CertificateWithPrivateKey {
        KeyPairFactory::with_key_bits(1024)
            .new_ca_with_validity(
                "certrotor.io",
                Validity::new(not_before, not_before + time::Duration::hours(2)).unwrap(),
            )
            .unwrap()
    }

    fn bundle_of(certs: &[&Certificate]) -> Vec<u8> {
        codec::encode_cert_chain(certs.iter().copied()).unwrap()
    }

    #[test]
    fn test_empty_bundle_holds_current_ca() {
        let t0 = t0();
        let current = ca_issued_at(t0);

        let merged = merge_bundle_at(&current.cert, b"", OVERLAP, t0).unwrap();
        assert_eq!(merged.count, 1);
        assert_eq!(merged.bytes, codec::encode_cert(&current.cert).unwrap());
    }

    #[test]
    fn test_current_ca_comes_first() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        let prior = ca_issued_at(t0 - minutes(20));

        let merged =
            merge_bundle_at(&current.cert, &bundle_of(&[&prior.cert]), OVERLAP, t0).unwrap();
        let chain = codec::decode_cert_chain(&merged.bytes).unwrap();
        assert_eq!(chain, vec![current.cert, prior.cert]);
        assert_eq!(merged.count, 2);
    }

    #[test]
    fn test_prior_ca_kept_inside_overlap_window() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        let prior = ca_issued_at(t0 - minutes(20));
        let existing = bundle_of(&[&prior.cert]);

        let merged = merge_bundle_at(&current.cert, &existing, OVERLAP, t0 + minutes(1)).unwrap();
        assert_eq!(merged.count, 2);
    }

    #[test]
    fn test_prior_ca_dropped_once_overlap_elapsed() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        let prior = ca_issued_at(t0 - minutes(20));
        let existing = bundle_of(&[&prior.cert]);

        let merged = merge_bundle_at(&current.cert, &existing, OVERLAP, t0 + minutes(5)).unwrap();
        assert_eq!(merged.count, 1);
        assert_eq!(merged.bytes, codec::encode_cert(&current.cert).unwrap());
    }

    #[test]
    fn test_prior_ca_dropped_when_current_is_older_than_overlap() {
        let t0 = t0();
        let current = ca_issued_at(t0 - minutes(3));
        let prior = ca_issued_at(t0 - minutes(20));
        let existing = bundle_of(&[&prior.cert]);

        let merged = merge_bundle_at(&current.cert, &existing, OVERLAP, t0).unwrap();
        assert_eq!(merged.count, 1);
    }

    #[test]
    fn test_walk_uses_previous_entry_as_reference() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        let newer = ca_issued_at(t0 - minutes(10));
        let older = ca_issued_at(t0 - minutes(30));
        let existing = bundle_of(&[&older.cert, &newer.cert]);

        // `newer` is judged against the current CA, `older` against `newer`.
        let merged = merge_bundle_at(&current.cert, &existing, OVERLAP, t0).unwrap();
        let chain = codec::decode_cert_chain(&merged.bytes).unwrap();
        assert_eq!(chain, vec![current.cert, newer.cert]);
    }

    #[test]
    fn test_duplicates_are_removed() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        let prior = ca_issued_at(t0 - minutes(1));
        let existing = bundle_of(&[&current.cert, &prior.cert, &current.cert, &prior.cert]);

        let merged =
            merge_bundle_at(&current.cert, &existing, Duration::from_secs(3600), t0).unwrap();
        let chain = codec::decode_cert_chain(&merged.bytes).unwrap();
        assert_eq!(chain, vec![current.cert, prior.cert]);
        assert_eq!(merged.count, 2);
    }

    #[test]
    fn test_expired_entries_are_skipped_without_stopping() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        let expired = KeyPairFactory::with_key_bits(1024)
            .new_ca_with_validity(
                "certrotor.io",
                Validity::new(t0 - minutes(2), t0 - minutes(1)).unwrap(),
            )
            .unwrap();
        let older = ca_issued_at(t0 - minutes(3));
        let existing = bundle_of(&[&expired.cert, &older.cert]);

        let merged =
            merge_bundle_at(&current.cert, &existing, Duration::from_secs(3600), t0).unwrap();
        let chain = codec::decode_cert_chain(&merged.bytes).unwrap();
        assert_eq!(chain, vec![current.cert, older.cert]);
    }

    #[test]
    #[traced_test]
    fn test_input_is_capped_before_sorting() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        // Later entries are newer, so capping before the sort drops the newest.
        let prior: Vec<_> = (0..19)
            .map(|i| ca_issued_at(t0 - minutes(40 - i)))
            .collect();
        let refs: Vec<&Certificate> = prior.iter().map(|p| &p.cert).collect();

        let merged =
            merge_bundle_at(&current.cert, &bundle_of(&refs), Duration::from_secs(86400), t0)
                .unwrap();
        assert_eq!(merged.count, MAX_CERTIFICATES_IN_BUNDLE + 1);

        let chain = codec::decode_cert_chain(&merged.bytes).unwrap();
        let mut expected: Vec<Certificate> = prior[..MAX_CERTIFICATES_IN_BUNDLE]
            .iter()
            .rev()
            .map(|p| p.cert.clone())
            .collect();
        expected.insert(0, current.cert.clone());
        assert_eq!(chain, expected);
        assert!(logs_contain("too many certificates"));
    }

    #[test]
    fn test_malformed_bundle_fails() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        assert!(matches!(
            merge_bundle_at(&current.cert, b"-----BEGIN CERTIFICATE-----\nAAAA", OVERLAP, t0),
            Err(CertError::MalformedMaterial(_))
        ));
    }

    #[test]
    fn test_merge_is_stable_across_passes() {
        let t0 = t0();
        let current = ca_issued_at(t0);
        let prior = ca_issued_at(t0 - minutes(1));

        let first = merge_bundle_at(&current.cert, &bundle_of(&[&prior.cert]), OVERLAP, t0)
            .unwrap();
        let second = merge_bundle_at(&current.cert, &first.bytes, OVERLAP, t0).unwrap();
        assert_eq!(first, second);
    }
}
