//! Anchor type taxonomy.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of overlay content an anchor carries.
///
/// Parsing never fails: unrecognized names are preserved in
/// [`AnchorType::Other`], and every consumer falls back to its default
/// parameter set for them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnchorType {
    /// Interactive point of interest.
    Hotspot,
    /// Floating text label.
    Label,
    /// Ghosted reconstruction of a historical structure.
    GhostReconstruction,
    /// Timeline ribbon marker.
    Timeline,
    /// Heatmap layer anchor.
    Heatmap,
    /// Any other name supplied by a caller.
    Other(String),
}

impl AnchorType {
    /// The four placeable types with dedicated constraint sets.
    pub const PLACEABLE: [AnchorType; 4] = [
        AnchorType::Hotspot,
        AnchorType::Label,
        AnchorType::GhostReconstruction,
        AnchorType::Timeline,
    ];

    /// Wire name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            AnchorType::Hotspot => "hotspot",
            AnchorType::Label => "label",
            AnchorType::GhostReconstruction => "ghost_reconstruction",
            AnchorType::Timeline => "timeline",
            AnchorType::Heatmap => "heatmap",
            AnchorType::Other(name) => name,
        }
    }

    /// Returns false for [`AnchorType::Other`].
    pub fn is_recognized(&self) -> bool {
        !matches!(self, AnchorType::Other(_))
    }
}

impl From<&str> for AnchorType {
    fn from(name: &str) -> Self {
        match name {
            "hotspot" => AnchorType::Hotspot,
            "label" => AnchorType::Label,
            "ghost_reconstruction" => AnchorType::GhostReconstruction,
            "timeline" => AnchorType::Timeline,
            "heatmap" => AnchorType::Heatmap,
            other => AnchorType::Other(other.to_string()),
        }
    }
}

impl From<String> for AnchorType {
    fn from(name: String) -> Self {
        AnchorType::from(name.as_str())
    }
}

impl From<AnchorType> for String {
    fn from(anchor_type: AnchorType) -> Self {
        match anchor_type {
            AnchorType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for AnchorType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AnchorType::from(s))
    }
}

impl fmt::Display for AnchorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_roundtrip() {
        for ty in AnchorType::PLACEABLE {
            assert_eq!(AnchorType::from(ty.as_str()), ty);
            assert!(ty.is_recognized());
        }
        assert_eq!(AnchorType::from("heatmap"), AnchorType::Heatmap);
    }

    #[test]
    fn test_unknown_name_is_preserved() {
        let ty: AnchorType = "portal".parse().unwrap();
        assert_eq!(ty, AnchorType::Other("portal".to_string()));
        assert!(!ty.is_recognized());
        assert_eq!(ty.to_string(), "portal");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let ron_str = ron::to_string(&AnchorType::GhostReconstruction).unwrap();
        assert_eq!(ron_str, "\"ghost_reconstruction\"");
        let parsed: AnchorType = ron::from_str("\"label\"").unwrap();
        assert_eq!(parsed, AnchorType::Label);
    }
}
