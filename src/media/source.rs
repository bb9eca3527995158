// Origin URL resolution for third-party media.

use super::asset::{AssetType, ORIGINAL_FORMAT};

/// Media host the platform mirrors from.
pub const DEFAULT_ORIGIN_BASE_URL: &str = "https://media.api-sports.io/football";

/// Deterministic origin URL for one entity: `{base}/{bucket}/{id}.png`.
pub fn resolve(base_url: &str, asset_type: AssetType, entity_id: i64) -> String {
    format!(
        "{}/{}/{entity_id}.{ORIGINAL_FORMAT}",
        base_url.trim_end_matches('/'),
        asset_type.bucket()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default_host() {
        assert_eq!(
            resolve(DEFAULT_ORIGIN_BASE_URL, AssetType::TeamLogo, 33),
            "https://media.api-sports.io/football/teams/33.png"
        );
        assert_eq!(
            resolve(DEFAULT_ORIGIN_BASE_URL, AssetType::CoachPhoto, 7),
            "https://media.api-sports.io/football/coachs/7.png"
        );
    }

    #[test]
    fn test_resolve_trims_trailing_slash() {
        assert_eq!(
            resolve("http://localhost:9000/media/", AssetType::VenuePhoto, 556),
            "http://localhost:9000/media/venues/556.png"
        );
    }
}
