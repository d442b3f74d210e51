//! Canonical identity of a title and the image-server path derived from it

use serde::Serialize;
use std::path::PathBuf;

/// Where an identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityOrigin {
    /// Matched catalog record
    Catalog,
    /// Synthesized from the root pack identifier
    Fallback,
}

/// Serial number and catalog partition of one title
///
/// Built once per title and shared read-only by every rewrite and layout
/// step, so document URLs and on-disk paths always agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    serial_number: String,
    partition: String,
    origin: IdentityOrigin,
}

impl ResolvedIdentity {
    /// Identity from a catalog record
    ///
    /// The serial must be ASCII and long enough for the 3+3+rest grouping.
    pub fn from_catalog(serial_number: &str, partition: &str) -> Option<Self> {
        let serial_number = serial_number.trim();
        if serial_number.len() < 7 || !serial_number.is_ascii() || partition.trim().is_empty() {
            return None;
        }

        Some(Self {
            serial_number: serial_number.to_string(),
            partition: partition.trim().to_string(),
            origin: IdentityOrigin::Catalog,
        })
    }

    /// Synthetic identity for titles the catalog cannot match
    ///
    /// Serial = root pack id without hyphens, partition = `sentinel`.
    pub fn fallback(root_pack_id: &str, sentinel: &str) -> Option<Self> {
        let serial_number: String = root_pack_id.chars().filter(|c| *c != '-').collect();
        if serial_number.len() < 6 || !serial_number.is_ascii() || sentinel.trim().is_empty() {
            return None;
        }

        Some(Self {
            serial_number,
            partition: sentinel.to_string(),
            origin: IdentityOrigin::Fallback,
        })
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Partition code as delivered by the catalog (e.g. `MZK01`)
    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn origin(&self) -> IdentityOrigin {
        self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == IdentityOrigin::Fallback
    }

    /// Partition as used in paths and URLs
    pub fn path_partition(&self) -> String {
        self.partition.to_lowercase()
    }

    /// Three directory segments below the partition
    ///
    /// Catalog serials group 3+3+rest (`000329646` → `000/329/646`). Fallback
    /// identities use the first 3+3 characters and then the full identifier.
    pub fn path_segments(&self) -> [&str; 3] {
        let serial = self.serial_number.as_str();
        let last = match self.origin {
            IdentityOrigin::Catalog => &serial[6..],
            IdentityOrigin::Fallback => serial,
        };
        [&serial[0..3], &serial[3..6], last]
    }

    /// `<partition>/<seg>/<seg>/<seg>` for URLs
    pub fn url_path(&self) -> String {
        let [a, b, c] = self.path_segments();
        format!("{}/{}/{}/{}", self.path_partition(), a, b, c)
    }

    /// Same grouping as a relative filesystem path
    pub fn relative_path(&self) -> PathBuf {
        let [a, b, c] = self.path_segments();
        [self.path_partition().as_str(), a, b, c].iter().collect()
    }
}
