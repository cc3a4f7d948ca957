//! Capability tokens advertised by services and the decisions derived from them.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CAN_UPDATE_STATUS: &str = "can-update-status";
pub const CAN_UPDATE_STATUS_WITH_GEOTAG: &str = "can-update-status-with-geotag";

/// Unordered set of capability tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.0.insert(token.into())
    }

    pub fn remove(&mut self, token: &str) -> bool {
        self.0.remove(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Exact membership test. An absent set has no capabilities.
///
/// ```
/// use mps_social::caps::{has_capability, CapabilitySet, CAN_UPDATE_STATUS};
///
/// let caps: CapabilitySet = [CAN_UPDATE_STATUS].into_iter().collect();
/// assert!(has_capability(Some(&caps), CAN_UPDATE_STATUS));
/// assert!(!has_capability(Some(&caps), "can-update"));
/// assert!(!has_capability(None, CAN_UPDATE_STATUS));
/// ```
pub fn has_capability(caps: Option<&CapabilitySet>, token: &str) -> bool {
    caps.is_some_and(|caps| caps.contains(token))
}

/// UI affordances enabled by a capability set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityState {
    pub status_update_enabled: bool,
    pub geotag_enabled: bool,
}

/// Pure function of the two gating tokens.
pub fn classify(caps: Option<&CapabilitySet>) -> CapabilityState {
    CapabilityState {
        status_update_enabled: has_capability(caps, CAN_UPDATE_STATUS),
        geotag_enabled: has_capability(caps, CAN_UPDATE_STATUS_WITH_GEOTAG),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets() -> Vec<CapabilitySet> {
        vec![
            CapabilitySet::new(),
            [CAN_UPDATE_STATUS].into_iter().collect(),
            [CAN_UPDATE_STATUS_WITH_GEOTAG].into_iter().collect(),
            [CAN_UPDATE_STATUS, CAN_UPDATE_STATUS_WITH_GEOTAG]
                .into_iter()
                .collect(),
            ["can-request-avatar", "can-update-status-later"]
                .into_iter()
                .collect(),
        ]
    }

    #[test]
    fn classification_matches_membership() {
        for set in sets() {
            let state = classify(Some(&set));
            assert_eq!(
                state.status_update_enabled,
                has_capability(Some(&set), CAN_UPDATE_STATUS)
            );
            assert_eq!(
                state.geotag_enabled,
                has_capability(Some(&set), CAN_UPDATE_STATUS_WITH_GEOTAG)
            );
        }
    }

    #[test]
    fn geotag_is_independent_of_status_update() {
        let set: CapabilitySet = [CAN_UPDATE_STATUS_WITH_GEOTAG].into_iter().collect();
        assert_eq!(
            classify(Some(&set)),
            CapabilityState {
                status_update_enabled: false,
                geotag_enabled: true,
            }
        );
    }

    #[test]
    fn absent_set_fails_closed() {
        assert_eq!(classify(None), CapabilityState::default());
    }

    #[test]
    fn prefix_tokens_do_not_match() {
        let set: CapabilitySet = ["can-update-status-later"].into_iter().collect();
        assert!(!classify(Some(&set)).status_update_enabled);
    }
}
