//! # Material Module
//!
//! This module defines the materials a block can be made of. The terrain generator only
//! produces the first five; the remaining ones exist so players can place them.

use std::fmt;

use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::MaterialSize;

/// Enumerates every material a solid cell can carry.
///
/// Air is not a material: an empty cell is represented as `None` wherever a
/// `MaterialId` is optional. The `FromPrimitive` derive allows conversion from the compact
/// `MaterialSize` representation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaterialId {
    /// Topmost cell of every generated column.
    Grass,

    /// The three cells directly beneath the surface.
    Dirt,

    /// Default material of deep terrain.
    Stone,

    /// Deep-terrain ore found below y=8 where the ore noise is high.
    CoalOre,

    /// Deep-terrain ore found below y=5 where the ore noise is low.
    IronOre,

    /// Player-placed glass.
    Glass,

    /// Player-placed planks.
    Wood,

    /// Player-placed log.
    Log,

    /// Player-placed cobblestone.
    Cobblestone,

    /// Player-placed sand.
    Sand,

    /// Player-placed gravel.
    Gravel,
}

impl MaterialId {
    /// Every material, in discriminant order.
    pub const ALL: [MaterialId; 11] = [
        MaterialId::Grass,
        MaterialId::Dirt,
        MaterialId::Stone,
        MaterialId::CoalOre,
        MaterialId::IronOre,
        MaterialId::Glass,
        MaterialId::Wood,
        MaterialId::Log,
        MaterialId::Cobblestone,
        MaterialId::Sand,
        MaterialId::Gravel,
    ];

    /// Converts a `MaterialSize` back into a `MaterialId`.
    ///
    /// # Returns
    /// `None` if the value does not correspond to a material
    pub fn from_int(value: MaterialSize) -> Option<Self> {
        num::FromPrimitive::from_u8(value)
    }

    /// The compact integer form of this material.
    pub fn to_int(self) -> MaterialSize {
        self as MaterialSize
    }

    /// Whether the terrain generator can emit this material.
    pub fn is_generated(self) -> bool {
        matches!(
            self,
            MaterialId::Grass
                | MaterialId::Dirt
                | MaterialId::Stone
                | MaterialId::CoalOre
                | MaterialId::IronOre
        )
    }

    /// Picks a random material from the full set.
    ///
    /// Used by the headless driver to vary what it places.
    pub fn random() -> Self {
        Self::ALL[fastrand::usize(..Self::ALL.len())]
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_conversion_covers_every_material() {
        for material in MaterialId::ALL {
            assert_eq!(MaterialId::from_int(material.to_int()), Some(material));
        }
        assert_eq!(MaterialId::from_int(MaterialId::ALL.len() as MaterialSize), None);
    }

    #[test]
    fn serializes_with_camel_case_names() {
        let json = serde_json::to_string(&MaterialId::CoalOre).unwrap();
        assert_eq!(json, "\"coalOre\"");
        let parsed: MaterialId = serde_json::from_str("\"ironOre\"").unwrap();
        assert_eq!(parsed, MaterialId::IronOre);
    }

    #[test]
    fn only_terrain_materials_are_generated() {
        let generated: Vec<_> = MaterialId::ALL
            .iter()
            .copied()
            .filter(|m| m.is_generated())
            .collect();
        assert_eq!(generated.len(), 5);
        assert!(!MaterialId::Glass.is_generated());
    }
}
