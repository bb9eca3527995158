// Asset types, size classes, and the storage layout contract.
//
// Bucket names and index kinds are externally visible: existing objects and
// index rows use them, so renaming any of them needs a data migration.
//
//   teams   -> team_logo       leagues -> league_logo
//   players -> player_photo    coachs  -> coach_photo
//   venues  -> venue_photo
//
// Variants live at {bucket}/{size}/{entity_id}.webp, legacy originals at
// {bucket}/{entity_id}.png.

use serde::{Deserialize, Serialize};

/// File extension of every encoded variant.
pub const VARIANT_FORMAT: &str = "webp";

/// File extension of legacy originals at the bucket root.
pub const ORIGINAL_FORMAT: &str = "png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    TeamLogo,
    LeagueLogo,
    PlayerPhoto,
    CoachPhoto,
    VenuePhoto,
}

impl AssetType {
    /// Every asset type, in the order bulk jobs process their buckets.
    pub const ALL: [AssetType; 5] = [
        AssetType::TeamLogo,
        AssetType::LeagueLogo,
        AssetType::PlayerPhoto,
        AssetType::CoachPhoto,
        AssetType::VenuePhoto,
    ];

    /// Storage bucket (and origin path segment) for this asset type.
    pub fn bucket(&self) -> &'static str {
        match self {
            AssetType::TeamLogo => "teams",
            AssetType::LeagueLogo => "leagues",
            AssetType::PlayerPhoto => "players",
            // Spelling matches the origin host and existing buckets.
            AssetType::CoachPhoto => "coachs",
            AssetType::VenuePhoto => "venues",
        }
    }

    /// Kind stored in the cache index.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::TeamLogo => "team_logo",
            AssetType::LeagueLogo => "league_logo",
            AssetType::PlayerPhoto => "player_photo",
            AssetType::CoachPhoto => "coach_photo",
            AssetType::VenuePhoto => "venue_photo",
        }
    }

    pub fn from_bucket(bucket: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.bucket() == bucket)
    }

    pub fn parse(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == kind)
    }

    /// Longest-side pixel bound for a size class. Venue photos are
    /// landscape shots and get twice the logo/portrait bounds.
    pub fn max_dimension(&self, size: SizeClass) -> u32 {
        let base = match size {
            SizeClass::Sm => 64,
            SizeClass::Md => 128,
            SizeClass::Lg => 256,
        };
        match self {
            AssetType::VenuePhoto => base * 2,
            _ => base,
        }
    }

    /// Path of a variant inside the bucket, e.g. `md/33.webp`.
    pub fn variant_key(&self, size: SizeClass, entity_id: i64) -> String {
        format!("{}/{entity_id}.{VARIANT_FORMAT}", size.as_str())
    }

    /// Full object path of a variant, e.g. `teams/md/33.webp`.
    pub fn variant_path(&self, size: SizeClass, entity_id: i64) -> String {
        format!("{}/{}", self.bucket(), self.variant_key(size, entity_id))
    }

    /// Full object path of the legacy original, e.g. `teams/33.png`.
    pub fn original_path(&self, entity_id: i64) -> String {
        format!("{}/{entity_id}.{ORIGINAL_FORMAT}", self.bucket())
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Sm,
    Md,
    Lg,
}

impl SizeClass {
    pub const ALL: [SizeClass; 3] = [SizeClass::Sm, SizeClass::Md, SizeClass::Lg];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Sm => "sm",
            SizeClass::Md => "md",
            SizeClass::Lg => "lg",
        }
    }
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_to_kind_mapping() {
        let pairs = [
            ("teams", "team_logo"),
            ("leagues", "league_logo"),
            ("players", "player_photo"),
            ("coachs", "coach_photo"),
            ("venues", "venue_photo"),
        ];
        for (bucket, kind) in pairs {
            let asset = AssetType::from_bucket(bucket).unwrap();
            assert_eq!(asset.as_str(), kind);
            assert_eq!(AssetType::parse(kind), Some(asset));
        }
        assert!(AssetType::from_bucket("coaches").is_none());
    }

    #[test]
    fn test_variant_paths() {
        assert_eq!(
            AssetType::TeamLogo.variant_path(SizeClass::Md, 33),
            "teams/md/33.webp"
        );
        assert_eq!(AssetType::CoachPhoto.original_path(7), "coachs/7.png");
        assert_eq!(AssetType::VenuePhoto.variant_key(SizeClass::Lg, 556), "lg/556.webp");
    }

    #[test]
    fn test_venue_bounds_are_double() {
        for size in SizeClass::ALL {
            assert_eq!(
                AssetType::VenuePhoto.max_dimension(size),
                AssetType::PlayerPhoto.max_dimension(size) * 2
            );
        }
        assert_eq!(AssetType::TeamLogo.max_dimension(SizeClass::Md), 128);
    }
}
