//! Region tags and the symmetric local/peer pair an instance is bound to.

use serde::{Deserialize, Serialize};

/// Replication endpoint tag, e.g. `india` or `china`.
///
/// Tags are normalized to lowercase so envelope origins compare reliably
/// against configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two regions of a deployment, from the local instance's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPair {
    pub local: Region,
    pub peer: Region,
}

impl RegionPair {
    pub fn new(local: Region, peer: Region) -> Self {
        Self { local, peer }
    }

    /// Counterpart of `local` in the conventional india/china deployment.
    pub fn conventional_peer(local: &Region) -> Option<Region> {
        match local.as_str() {
            "india" => Some(Region::new("china")),
            "china" => Some(Region::new("india")),
            _ => None,
        }
    }

    /// Metrics direction key for changes flowing into this instance.
    pub fn inbound_direction(&self) -> String {
        format!("{}-to-{}", self.peer, self.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_tags_are_normalized() {
        assert_eq!(Region::new(" India ").as_str(), "india");
        assert_eq!(Region::new("CHINA"), Region::new("china"));
    }

    #[test]
    fn conventional_peer_flips_the_default_pair() {
        let china = Region::new("china");
        assert_eq!(
            RegionPair::conventional_peer(&china),
            Some(Region::new("india"))
        );
        assert_eq!(RegionPair::conventional_peer(&Region::new("emea")), None);
    }

    #[test]
    fn inbound_direction_reads_peer_to_local() {
        let pair = RegionPair::new(Region::new("china"), Region::new("india"));
        assert_eq!(pair.inbound_direction(), "india-to-china");
    }
}
