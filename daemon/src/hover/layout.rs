//! List layout constants and the read-only list snapshot

use serde::{Deserialize, Serialize};

/// Stable identity of a todo item, opaque to the overlay core
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Priority band, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Critical,
    High,
    Today,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Critical, Band::High, Band::Today];
}

/// Maximum number of displayed items per band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandCaps {
    pub critical: usize,
    pub high: usize,
    pub today: usize,
}

impl BandCaps {
    pub fn cap(&self, band: Band) -> usize {
        match band {
            Band::Critical => self.critical,
            Band::High => self.high,
            Band::Today => self.today,
        }
    }
}

impl Default for BandCaps {
    fn default() -> Self {
        Self {
            critical: 3,
            high: 2,
            today: 5,
        }
    }
}

/// Pixel layout of the rendered list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetrics {
    /// Height of the header band above the list
    pub header_height: i32,
    /// Margin between header and first row, and on the left/right edges
    pub margin: i32,
    /// Fixed height of one item row
    pub row_height: i32,
    /// Window width
    pub width: i32,
    pub caps: BandCaps,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            header_height: 60,
            margin: 16,
            row_height: 60,
            width: 280,
            caps: BandCaps::default(),
        }
    }
}

/// Snapshot of the displayed bands, published by the todo service
///
/// Bands may carry more entries than displayed; consumers apply the caps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListSnapshot {
    pub critical: Vec<ItemId>,
    pub high: Vec<ItemId>,
    pub today: Vec<ItemId>,
}

impl ListSnapshot {
    pub fn band(&self, band: Band) -> &[ItemId] {
        match band {
            Band::Critical => &self.critical,
            Band::High => &self.high,
            Band::Today => &self.today,
        }
    }

    /// Displayed items in render order: bands concatenated, each capped.
    pub fn visible(&self, caps: BandCaps) -> impl Iterator<Item = (Band, usize, &ItemId)> + '_ {
        Band::ALL.into_iter().flat_map(move |band| {
            self.band(band)
                .iter()
                .take(caps.cap(band))
                .enumerate()
                .map(move |(pos, id)| (band, pos, id))
        })
    }

    pub fn visible_len(&self, caps: &BandCaps) -> usize {
        Band::ALL
            .iter()
            .map(|&band| self.band(band).len().min(caps.cap(band)))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(prefix: &str, n: usize) -> Vec<ItemId> {
        (0..n).map(|i| ItemId::from(format!("{prefix}{i}"))).collect()
    }

    #[test]
    fn test_visible_caps_each_band() {
        let snapshot = ListSnapshot {
            critical: ids("c", 5),
            high: ids("h", 1),
            today: ids("t", 9),
        };
        let caps = BandCaps::default();
        assert_eq!(snapshot.visible_len(&caps), 3 + 1 + 5);

        let order: Vec<_> = snapshot.visible(caps).map(|(_, _, id)| id.as_str().to_string()).collect();
        assert_eq!(order[..4], ["c0", "c1", "c2", "h0"]);
        assert_eq!(order.last().map(String::as_str), Some("t4"));
    }

    #[test]
    fn test_snapshot_deserializes_partial() {
        let snapshot: ListSnapshot = serde_json::from_str(r#"{"critical":["a"]}"#).unwrap();
        assert_eq!(snapshot.critical, vec![ItemId::from("a")]);
        assert!(snapshot.today.is_empty());
    }
}
