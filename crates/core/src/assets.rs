//! Deterministic asset URL construction.
//!
//! Image URLs are derived from entity identity alone; attachment is a pure
//! decoration step that never influences retrieval or ranking.

use crate::domain::perfume::PerfumeId;

#[derive(Clone, Debug)]
pub struct AssetResolver {
    base_url: String,
}

impl AssetResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn perfume_image_url(&self, id: PerfumeId) -> String {
        format!("{}/perfumes/{}.jpg", self.base_url, id.0)
    }

    pub fn profile_image_url(&self, user_id: i64, ext: &str) -> String {
        format!("{}/profiles/{}.{}", self.base_url, user_id, ext)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::perfume::PerfumeId;

    use super::AssetResolver;

    #[test]
    fn perfume_url_is_derived_from_identity() {
        let resolver = AssetResolver::new("https://images.example.com");
        assert_eq!(
            resolver.perfume_image_url(PerfumeId(42)),
            "https://images.example.com/perfumes/42.jpg"
        );
    }

    #[test]
    fn trailing_slashes_are_normalized() {
        let resolver = AssetResolver::new("https://images.example.com/");
        assert_eq!(
            resolver.profile_image_url(7, "jpg"),
            "https://images.example.com/profiles/7.jpg"
        );
    }
}
