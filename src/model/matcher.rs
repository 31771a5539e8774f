use crate::{domain::identity::IdentityMatch, tools::log::{log_debug, LogServiceType}};

use super::{error::Result, identity_store::IdentityStore};

/// Maximum squared distance accepted as the same person, unless configured otherwise.
pub const DEFAULT_THRESHOLD: f32 = 0.8;

pub struct IdentityMatcher;

impl IdentityMatcher {
    /// Closest enrolled identity, if it lies within `threshold` of `query`.
    pub async fn match_best(store: &IdentityStore, query: &[f32], threshold: f32) -> Result<Option<IdentityMatch>> {
        let candidates = store.search(query, 1).await?;
        let Some(best) = candidates.into_iter().next() else {
            log_debug(LogServiceType::Recognition, "No identity enrolled".to_string());
            return Ok(None);
        };
        log_debug(LogServiceType::Recognition, format!("Best candidate {} at distance {:.4} (threshold {})", best.name, best.distance, threshold));
        if best.distance <= threshold {
            Ok(Some(best))
        } else {
            Ok(None)
        }
    }
}
