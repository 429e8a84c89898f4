//! Short-lived correlation between a Connect OAuth link and its callback.
//!
//! Each authorization attempt gets a random single-use state token mapping
//! back to the church being connected. Entries expire after 15 minutes and
//! are lost on restart; the donor just restarts onboarding in that case.

use std::time::Duration;

use moka::sync::Cache;
use uuid::Uuid;

const STATE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Clone)]
pub struct OauthStateCache {
    states: Cache<String, Uuid>,
}

impl OauthStateCache {
    pub fn new() -> Self {
        Self::with_ttl(STATE_TTL)
    }

    fn with_ttl(ttl: Duration) -> Self {
        Self {
            states: Cache::builder().time_to_live(ttl).build(),
        }
    }

    /// Issue a new state token for an authorization attempt
    pub fn issue(&self, church_id: Uuid) -> String {
        let state = Uuid::new_v4().simple().to_string();
        self.states.insert(state.clone(), church_id);
        state
    }

    /// Redeem a state token, consuming it. Returns None for unknown,
    /// expired, or already-used tokens.
    pub fn redeem(&self, state: &str) -> Option<Uuid> {
        let church_id = self.states.get(state)?;
        self.states.invalidate(state);
        Some(church_id)
    }
}

impl Default for OauthStateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_state_redeems_once() {
        let cache = OauthStateCache::new();
        let church_id = Uuid::new_v4();

        let state = cache.issue(church_id);
        assert_eq!(cache.redeem(&state), Some(church_id));
        assert_eq!(cache.redeem(&state), None);
    }

    #[test]
    fn unknown_state_is_rejected() {
        let cache = OauthStateCache::new();
        assert_eq!(cache.redeem("nonsense"), None);
    }

    #[test]
    fn states_are_unique_per_attempt() {
        let cache = OauthStateCache::new();
        let church_id = Uuid::new_v4();
        let a = cache.issue(church_id);
        let b = cache.issue(church_id);
        assert_ne!(a, b);
    }

    #[test]
    fn expired_state_is_rejected() {
        let cache = OauthStateCache::with_ttl(Duration::from_millis(10));
        let state = cache.issue(Uuid::new_v4());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.redeem(&state), None);
    }
}
