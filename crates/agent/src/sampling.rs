//! Candidate retrieval and sampling over the perfume catalog.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;

use scentpick_core::assets::AssetResolver;
use scentpick_core::attributes::parse_score;
use scentpick_core::domain::perfume::{GenderFilter, Perfume, PerfumeId};
use scentpick_db::repositories::{PerfumeRepository, RepositoryError};

/// Random picks draw from a pool of this size before sampling.
const RANDOM_POOL_SIZE: u32 = 60;

/// Ranked picks retrieve this many candidates before scoring.
const RANKED_POOL_SIZE: u32 = 200;

/// The tie window for ranked sampling never shrinks below this, so picks
/// stay varied even when fewer are requested.
const MIN_TIE_WINDOW: usize = 12;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeOfDay {
    Day,
    Night,
}

impl TimeOfDay {
    /// Key into the `day_night_score` attribute.
    pub fn score_key(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
        }
    }

    pub fn try_parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" | "낮" => Some(Self::Day),
            "night" | "밤" => Some(Self::Night),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self::try_parse(raw).unwrap_or(Self::Day)
    }
}

/// A selected perfume with its display image attached. Decoration happens
/// after selection and never influences it.
#[derive(Clone, Debug, Serialize)]
pub struct PerfumePick {
    pub perfume: Perfume,
    pub image_url: String,
}

pub struct SamplingEngine {
    perfumes: Arc<dyn PerfumeRepository>,
    assets: AssetResolver,
}

impl SamplingEngine {
    pub fn new(perfumes: Arc<dyn PerfumeRepository>, assets: AssetResolver) -> Self {
        Self { perfumes, assets }
    }

    /// Uniformly samples `k` perfumes matching any of the accords, skipping
    /// `exclude_ids`. Short pools return everything they have.
    pub async fn random_pick(
        &self,
        accords: &[String],
        k: usize,
        exclude_ids: &[PerfumeId],
    ) -> Result<Vec<PerfumePick>, SamplingError> {
        let pool = self.perfumes.find_by_accords(accords, RANDOM_POOL_SIZE, None).await?;
        let excluded: HashSet<PerfumeId> = exclude_ids.iter().copied().collect();
        let eligible: Vec<Perfume> =
            pool.into_iter().filter(|perfume| !excluded.contains(&perfume.id)).collect();

        let sampled = eligible
            .choose_multiple(&mut rand::thread_rng(), k.min(eligible.len()))
            .cloned()
            .collect::<Vec<_>>();
        Ok(self.decorate(sampled))
    }

    /// Score-ranked sampling: candidates matching the accord and gender are
    /// ordered by their day/night preference score, the top window (at least
    /// `MIN_TIE_WINDOW` wide) is kept, and `need` picks are drawn from it
    /// uniformly.
    pub async fn ranked_pick(
        &self,
        gender_label: &str,
        accord: &str,
        time_of_day: TimeOfDay,
        need: usize,
    ) -> Result<Vec<PerfumePick>, SamplingError> {
        let filter = GenderFilter::parse(gender_label);
        let pool = self
            .perfumes
            .find_by_accords(&[accord.to_string()], RANKED_POOL_SIZE, Some(filter))
            .await?;

        let mut scored: Vec<(f64, Perfume)> = pool
            .into_iter()
            .map(|perfume| {
                let score = parse_score(&perfume.day_night_score, time_of_day.score_key());
                (score, perfume)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let window = need.max(MIN_TIE_WINDOW).min(scored.len());
        let top: Vec<Perfume> =
            scored.into_iter().take(window).map(|(_, perfume)| perfume).collect();

        let sampled = top
            .choose_multiple(&mut rand::thread_rng(), need.min(top.len()))
            .cloned()
            .collect::<Vec<_>>();
        Ok(self.decorate(sampled))
    }

    fn decorate(&self, perfumes: Vec<Perfume>) -> Vec<PerfumePick> {
        perfumes
            .into_iter()
            .map(|perfume| {
                let image_url = self.assets.perfume_image_url(perfume.id);
                PerfumePick { perfume, image_url }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;

    use scentpick_core::assets::AssetResolver;
    use scentpick_core::domain::perfume::{Gender, Perfume, PerfumeId};
    use scentpick_db::repositories::InMemoryPerfumeRepository;

    use super::{SamplingEngine, TimeOfDay};

    fn perfume(id: i64, gender: Gender, accords: &[&str], day: f64, night: f64) -> Perfume {
        let now = Utc::now();
        Perfume {
            id: PerfumeId(id),
            brand: "House".to_string(),
            name: format!("No. {id}"),
            description: String::new(),
            concentration: "EDP".to_string(),
            gender,
            sizes: vec![50],
            detail_url: None,
            main_accords: json!(accords),
            top_notes: json!([]),
            middle_notes: json!([]),
            base_notes: json!([]),
            notes_score: json!({}),
            season_score: json!({}),
            day_night_score: json!({"day": day, "night": night}),
            created_at: now,
            updated_at: now,
        }
    }

    fn engine(perfumes: Vec<Perfume>) -> SamplingEngine {
        SamplingEngine::new(
            Arc::new(InMemoryPerfumeRepository::new(perfumes)),
            AssetResolver::new("https://img.test"),
        )
    }

    #[tokio::test]
    async fn random_pick_excludes_and_caps() {
        let perfumes: Vec<Perfume> =
            (1..=10).map(|id| perfume(id, Gender::Unisex, &["woody"], 0.5, 0.5)).collect();
        let engine = engine(perfumes);

        let picks = engine
            .random_pick(&["woody".to_string()], 3, &[PerfumeId(1), PerfumeId(2)])
            .await
            .expect("sample");
        assert_eq!(picks.len(), 3);
        let ids: HashSet<i64> = picks.iter().map(|pick| pick.perfume.id.0).collect();
        assert_eq!(ids.len(), 3, "picks must be distinct");
        assert!(!ids.contains(&1) && !ids.contains(&2));
    }

    #[tokio::test]
    async fn random_pick_returns_short_pool_whole() {
        let engine = engine(vec![perfume(1, Gender::Unisex, &["woody"], 0.5, 0.5)]);
        let picks =
            engine.random_pick(&["woody".to_string()], 3, &[]).await.expect("sample");
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].image_url, "https://img.test/perfumes/1.jpg");
    }

    #[tokio::test]
    async fn ranked_pick_prefers_high_scores_within_gender() {
        // 20 low scorers plus 8 high scorers; with need=8 the window is 12,
        // so every pick must come from the 12 best.
        let mut perfumes: Vec<Perfume> = (1..=20)
            .map(|id| perfume(id, Gender::Male, &["citrus"], 0.1, 0.9))
            .collect();
        perfumes.extend((21..=28).map(|id| perfume(id, Gender::Male, &["citrus"], 0.9, 0.1)));
        perfumes.push(perfume(99, Gender::Female, &["citrus"], 1.0, 1.0));
        let engine = engine(perfumes);

        let picks = engine
            .ranked_pick("남성", "citrus", TimeOfDay::Day, 8)
            .await
            .expect("sample");
        assert_eq!(picks.len(), 8);
        assert!(picks.iter().all(|pick| pick.perfume.id.0 != 99), "gender filter must hold");
        let high_scorers =
            picks.iter().filter(|pick| pick.perfume.id.0 >= 21).count();
        assert!(high_scorers >= 4, "at least the 8 top scorers are in the 12-wide window");
    }

    #[tokio::test]
    async fn ranked_pick_night_preference_flips_scores() {
        let perfumes = vec![
            perfume(1, Gender::Unisex, &["woody"], 0.9, 0.1),
            perfume(2, Gender::Unisex, &["woody"], 0.1, 0.9),
        ];
        let engine = engine(perfumes);

        let picks = engine
            .ranked_pick("남녀공용", "woody", TimeOfDay::Night, 1)
            .await
            .expect("sample");
        assert_eq!(picks.len(), 1);
        // Both survive the minimum window, so either can be drawn; the call
        // must simply succeed with a short pool.
    }

    #[test]
    fn time_of_day_parses_labels() {
        assert_eq!(TimeOfDay::parse("night"), TimeOfDay::Night);
        assert_eq!(TimeOfDay::parse("밤"), TimeOfDay::Night);
        assert_eq!(TimeOfDay::parse("day"), TimeOfDay::Day);
        assert_eq!(TimeOfDay::try_parse("anything"), None);
        assert_eq!(TimeOfDay::parse("anything"), TimeOfDay::Day);
    }
}
