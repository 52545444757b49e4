//! Materials and modifiers known to the session core.
//!
//! The host world owns the real block/item registry; the core only needs a
//! closed catalog of what towers are built from and what loot tables may hand
//! out. Names parse case-insensitively and accept `UPPER_SNAKE`,
//! `lower_snake` and namespaced (`minecraft:stone`) spellings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cell materials and item kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Material {
    // Tower blocks
    Stone,
    Cobblestone,
    Dirt,
    OakPlanks,
    Gravel,
    Sand,
    Clay,
    Sandstone,
    MossyCobblestone,
    Andesite,
    Diorite,
    Granite,
    // Building / utility
    OakLog,
    Glass,
    Ladder,
    Cobweb,
    Tnt,
    WaterBucket,
    LavaBucket,
    FlintAndSteel,
    EnderPearl,
    Snowball,
    Egg,
    Arrow,
    // Food
    Apple,
    Bread,
    CookedBeef,
    GoldenApple,
    EnchantedGoldenApple,
    // Weapons & tools
    WoodenSword,
    StoneSword,
    IronSword,
    DiamondSword,
    IronAxe,
    IronPickaxe,
    DiamondPickaxe,
    Bow,
    Crossbow,
    FishingRod,
    Shield,
    // Armor
    LeatherHelmet,
    LeatherChestplate,
    LeatherLeggings,
    LeatherBoots,
    IronHelmet,
    IronChestplate,
    IronLeggings,
    IronBoots,
    DiamondHelmet,
    DiamondChestplate,
    DiamondLeggings,
    DiamondBoots,
    // Rare
    TotemOfUndying,
    ExperienceBottle,
}

const MATERIAL_NAMES: &[(Material, &str)] = &[
    (Material::Stone, "STONE"),
    (Material::Cobblestone, "COBBLESTONE"),
    (Material::Dirt, "DIRT"),
    (Material::OakPlanks, "OAK_PLANKS"),
    (Material::Gravel, "GRAVEL"),
    (Material::Sand, "SAND"),
    (Material::Clay, "CLAY"),
    (Material::Sandstone, "SANDSTONE"),
    (Material::MossyCobblestone, "MOSSY_COBBLESTONE"),
    (Material::Andesite, "ANDESITE"),
    (Material::Diorite, "DIORITE"),
    (Material::Granite, "GRANITE"),
    (Material::OakLog, "OAK_LOG"),
    (Material::Glass, "GLASS"),
    (Material::Ladder, "LADDER"),
    (Material::Cobweb, "COBWEB"),
    (Material::Tnt, "TNT"),
    (Material::WaterBucket, "WATER_BUCKET"),
    (Material::LavaBucket, "LAVA_BUCKET"),
    (Material::FlintAndSteel, "FLINT_AND_STEEL"),
    (Material::EnderPearl, "ENDER_PEARL"),
    (Material::Snowball, "SNOWBALL"),
    (Material::Egg, "EGG"),
    (Material::Arrow, "ARROW"),
    (Material::Apple, "APPLE"),
    (Material::Bread, "BREAD"),
    (Material::CookedBeef, "COOKED_BEEF"),
    (Material::GoldenApple, "GOLDEN_APPLE"),
    (Material::EnchantedGoldenApple, "ENCHANTED_GOLDEN_APPLE"),
    (Material::WoodenSword, "WOODEN_SWORD"),
    (Material::StoneSword, "STONE_SWORD"),
    (Material::IronSword, "IRON_SWORD"),
    (Material::DiamondSword, "DIAMOND_SWORD"),
    (Material::IronAxe, "IRON_AXE"),
    (Material::IronPickaxe, "IRON_PICKAXE"),
    (Material::DiamondPickaxe, "DIAMOND_PICKAXE"),
    (Material::Bow, "BOW"),
    (Material::Crossbow, "CROSSBOW"),
    (Material::FishingRod, "FISHING_ROD"),
    (Material::Shield, "SHIELD"),
    (Material::LeatherHelmet, "LEATHER_HELMET"),
    (Material::LeatherChestplate, "LEATHER_CHESTPLATE"),
    (Material::LeatherLeggings, "LEATHER_LEGGINGS"),
    (Material::LeatherBoots, "LEATHER_BOOTS"),
    (Material::IronHelmet, "IRON_HELMET"),
    (Material::IronChestplate, "IRON_CHESTPLATE"),
    (Material::IronLeggings, "IRON_LEGGINGS"),
    (Material::IronBoots, "IRON_BOOTS"),
    (Material::DiamondHelmet, "DIAMOND_HELMET"),
    (Material::DiamondChestplate, "DIAMOND_CHESTPLATE"),
    (Material::DiamondLeggings, "DIAMOND_LEGGINGS"),
    (Material::DiamondBoots, "DIAMOND_BOOTS"),
    (Material::TotemOfUndying, "TOTEM_OF_UNDYING"),
    (Material::ExperienceBottle, "EXPERIENCE_BOTTLE"),
];

/// Materials a growing tower picks from
pub const PILLAR_PALETTE: [Material; 12] = [
    Material::Stone,
    Material::Cobblestone,
    Material::Dirt,
    Material::OakPlanks,
    Material::Gravel,
    Material::Sand,
    Material::Clay,
    Material::Sandstone,
    Material::MossyCobblestone,
    Material::Andesite,
    Material::Diorite,
    Material::Granite,
];

/// Material of the initial column
pub const BASE_MATERIAL: Material = Material::Stone;

impl Material {
    pub fn name(&self) -> &'static str {
        MATERIAL_NAMES
            .iter()
            .find(|(m, _)| m == self)
            .map(|(_, n)| *n)
            .unwrap_or("UNKNOWN")
    }

    pub fn is_pillar_block(&self) -> bool {
        PILLAR_PALETTE.contains(self)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{name}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

/// `minecraft:oak_planks` / `Oak Planks` / `oak-planks` → `OAK_PLANKS`
fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let bare = trimmed
        .rsplit_once(':')
        .map(|(_, name)| name)
        .unwrap_or(trimmed);
    bare.chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

impl FromStr for Material {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize(s);
        MATERIAL_NAMES
            .iter()
            .find(|(_, n)| *n == key)
            .map(|(m, _)| *m)
            .ok_or(UnknownName {
                kind: "material",
                name: s.to_string(),
            })
    }
}

// ============================================================================
// Modifiers
// ============================================================================

/// Enchantment-like modifiers a loot entry may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Sharpness,
    Smite,
    Knockback,
    FireAspect,
    Looting,
    Protection,
    FireProtection,
    BlastProtection,
    ProjectileProtection,
    FeatherFalling,
    Thorns,
    Power,
    Punch,
    Flame,
    Infinity,
    Efficiency,
    Unbreaking,
    Mending,
}

/// Modern names first; legacy server names are accepted as aliases
const MODIFIER_NAMES: &[(Modifier, &str)] = &[
    (Modifier::Sharpness, "SHARPNESS"),
    (Modifier::Sharpness, "DAMAGE_ALL"),
    (Modifier::Smite, "SMITE"),
    (Modifier::Smite, "DAMAGE_UNDEAD"),
    (Modifier::Knockback, "KNOCKBACK"),
    (Modifier::FireAspect, "FIRE_ASPECT"),
    (Modifier::Looting, "LOOTING"),
    (Modifier::Looting, "LOOT_BONUS_MOBS"),
    (Modifier::Protection, "PROTECTION"),
    (Modifier::Protection, "PROTECTION_ENVIRONMENTAL"),
    (Modifier::FireProtection, "FIRE_PROTECTION"),
    (Modifier::FireProtection, "PROTECTION_FIRE"),
    (Modifier::BlastProtection, "BLAST_PROTECTION"),
    (Modifier::BlastProtection, "PROTECTION_EXPLOSIONS"),
    (Modifier::ProjectileProtection, "PROJECTILE_PROTECTION"),
    (Modifier::ProjectileProtection, "PROTECTION_PROJECTILE"),
    (Modifier::FeatherFalling, "FEATHER_FALLING"),
    (Modifier::FeatherFalling, "PROTECTION_FALL"),
    (Modifier::Thorns, "THORNS"),
    (Modifier::Power, "POWER"),
    (Modifier::Power, "ARROW_DAMAGE"),
    (Modifier::Punch, "PUNCH"),
    (Modifier::Punch, "ARROW_KNOCKBACK"),
    (Modifier::Flame, "FLAME"),
    (Modifier::Flame, "ARROW_FIRE"),
    (Modifier::Infinity, "INFINITY"),
    (Modifier::Infinity, "ARROW_INFINITE"),
    (Modifier::Efficiency, "EFFICIENCY"),
    (Modifier::Efficiency, "DIG_SPEED"),
    (Modifier::Unbreaking, "UNBREAKING"),
    (Modifier::Unbreaking, "DURABILITY"),
    (Modifier::Mending, "MENDING"),
];

impl Modifier {
    pub fn name(&self) -> &'static str {
        MODIFIER_NAMES
            .iter()
            .find(|(m, _)| m == self)
            .map(|(_, n)| *n)
            .unwrap_or("UNKNOWN")
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modifier {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize(s);
        MODIFIER_NAMES
            .iter()
            .find(|(_, n)| *n == key)
            .map(|(m, _)| *m)
            .ok_or(UnknownName {
                kind: "modifier",
                name: s.to_string(),
            })
    }
}

/// A modifier with its level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierLevel {
    pub modifier: Modifier,
    pub level: u32,
}

impl FromStr for ModifierLevel {
    type Err = UnknownName;

    /// `"SHARPNESS:2"`; a missing level means 1
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, level) = match s.rsplit_once(':') {
            Some((name, level)) if !name.is_empty() => match level.trim().parse::<u32>() {
                Ok(level) => (name, level),
                Err(_) => {
                    return Err(UnknownName {
                        kind: "modifier level",
                        name: s.to_string(),
                    })
                }
            },
            _ => (s, 1),
        };
        Ok(ModifierLevel {
            modifier: name.parse()?,
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_parse_spellings() {
        assert_eq!("STONE".parse::<Material>().unwrap(), Material::Stone);
        assert_eq!("oak_planks".parse::<Material>().unwrap(), Material::OakPlanks);
        assert_eq!(
            "minecraft:golden_apple".parse::<Material>().unwrap(),
            Material::GoldenApple
        );
        assert_eq!(
            "Mossy Cobblestone".parse::<Material>().unwrap(),
            Material::MossyCobblestone
        );
    }

    #[test]
    fn test_material_unknown() {
        let err = "UNOBTAINIUM".parse::<Material>().unwrap_err();
        assert_eq!(err.kind, "material");
        assert!(err.to_string().contains("UNOBTAINIUM"));
    }

    #[test]
    fn test_material_name_roundtrip() {
        for (material, _) in MATERIAL_NAMES {
            assert_eq!(material.name().parse::<Material>().unwrap(), *material);
        }
    }

    #[test]
    fn test_palette_is_blocks() {
        assert!(PILLAR_PALETTE.iter().all(|m| m.is_pillar_block()));
        assert!(BASE_MATERIAL.is_pillar_block());
        assert!(!Material::DiamondSword.is_pillar_block());
    }

    #[test]
    fn test_modifier_aliases() {
        assert_eq!("DAMAGE_ALL".parse::<Modifier>().unwrap(), Modifier::Sharpness);
        assert_eq!("sharpness".parse::<Modifier>().unwrap(), Modifier::Sharpness);
        assert_eq!(Modifier::Sharpness.name(), "SHARPNESS");
    }

    #[test]
    fn test_modifier_level_parse() {
        let m: ModifierLevel = "PROTECTION:3".parse().unwrap();
        assert_eq!(m.modifier, Modifier::Protection);
        assert_eq!(m.level, 3);

        let bare: ModifierLevel = "mending".parse().unwrap();
        assert_eq!(bare.level, 1);

        assert!("SHARPNESS:x".parse::<ModifierLevel>().is_err());
        assert!("NOPE:2".parse::<ModifierLevel>().is_err());
    }
}
