//! Stack detection over a [`FileOracle`].

use crate::error::{DetectionFailure, Rejection};
use crate::oracle::FileOracle;
use crate::registry::Registry;
use crate::stack::StackProfile;

/// Return the first profile, in priority order, whose markers all hold.
///
/// The registry guarantees at most one profile can match any filesystem
/// state, so the priority order only decides evaluation cost, never the
/// outcome.
///
/// # Errors
///
/// [`DetectionFailure`] listing, for every profile, the first marker that
/// failed.
pub fn detect<'r>(
    registry: &'r Registry,
    oracle: &dyn FileOracle,
) -> Result<&'r StackProfile, DetectionFailure> {
    let mut rejected = Vec::new();

    for profile in registry.profiles() {
        match profile.first_failing_marker(oracle) {
            None => {
                tracing::debug!(stack = %profile.id, "stack detected");
                return Ok(profile);
            }
            Some(marker) => {
                tracing::debug!(stack = %profile.id, %marker, "stack rejected");
                rejected.push(Rejection {
                    stack: profile.id.clone(),
                    marker: marker.clone(),
                });
            }
        }
    }

    Err(DetectionFailure {
        reason: "no matching stack".to_owned(),
        rejected,
    })
}
