//! Rotation deadlines.
//!
//! A certificate is due for replacement once 80% of its lifetime has passed,
//! or immediately when it is missing or no longer chains to its CA.

use time::OffsetDateTime;

use crate::cert::Certificate;
use crate::cert::params::Validity;
use crate::secret::Secret;

/// Fraction of the lifetime after which rotation begins, as `NUMERATOR / DENOMINATOR`.
const ROTATION_THRESHOLD_NUMERATOR: i32 = 4;
const ROTATION_THRESHOLD_DENOMINATOR: i32 = 5;

/// `not_before + 0.8 * (not_after - not_before)`.
pub fn rotation_deadline(validity: &Validity) -> OffsetDateTime {
    validity.not_before
        + validity.lifetime() * ROTATION_THRESHOLD_NUMERATOR / ROTATION_THRESHOLD_DENOMINATOR
}

/// Computes when `cert` has to be rotated, reading the clock once.
pub fn next_rotation_deadline(
    cert: Option<&Certificate>,
    ca: Option<&Certificate>,
) -> OffsetDateTime {
    next_rotation_deadline_at(cert, ca, OffsetDateTime::now_utc())
}

/// Computes when `cert` has to be rotated, as seen at `now`.
///
/// Returns `now` when there is no certificate, or when `ca` is given and the
/// certificate does not verify against it as the sole root.
pub fn next_rotation_deadline_at(
    cert: Option<&Certificate>,
    ca: Option<&Certificate>,
    now: OffsetDateTime,
) -> OffsetDateTime {
    let Some(cert) = cert else {
        return now;
    };

    if let Some(ca) = ca {
        if let Err(err) = cert.verify_signed_by(ca, now) {
            tracing::info!(
                common_name = %cert.common_name(),
                error = %err,
                "certificate does not verify against its CA, forcing rotation"
            );
            return now;
        }
    }

    let deadline = rotation_deadline(&cert.validity());
    tracing::debug!(
        common_name = %cert.common_name(),
        not_after = %cert.not_after(),
        %deadline,
        "computed rotation deadline"
    );
    deadline
}

/// Whether the material in `secret` has to be replaced at `now`.
///
/// True when the secret cannot be loaded or its rotation deadline is not in
/// the future.
pub fn needs_rotation(secret: &Secret, ca: Option<&Certificate>, now: OffsetDateTime) -> bool {
    match secret.load() {
        Ok(loaded) => next_rotation_deadline_at(Some(&loaded.cert), ca, now) <= now,
        Err(err) => {
            tracing::info!(secret = %secret.name, error = %err, "secret cannot be loaded");
            true
        }
    }
}
