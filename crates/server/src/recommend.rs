//! Weather and preference driven recommendations.
//!
//! A weather lookup failure is a normal operating condition here: the
//! response degrades to placeholder weather text with an empty weather
//! triple while the season picks (and worldcup candidates, when requested)
//! still render.

use std::collections::HashSet;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use scentpick_agent::sampling::{PerfumePick, TimeOfDay};
use scentpick_agent::weather::placeholder_lines;
use scentpick_core::weather::{code_to_advice, code_to_emoji, season_advice};
use scentpick_db::repositories::{NewRecCandidate, NewRecRun};

use crate::bootstrap::AppState;
use crate::catalog::PerfumeCard;
use crate::errors::ApiError;

/// Triple sizes for the weather and season pick lists.
const PICK_COUNT: usize = 3;

/// Worldcup bracket size.
const WORLDCUP_NEED: usize = 8;

pub fn router(state: AppState) -> Router {
    Router::new().route("/api/recommend", get(recommend)).with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub user_id: i64,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub g: Option<String>,
    pub a: Option<String>,
    pub t: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WeatherBox {
    pub lines: Vec<String>,
    pub emoji: &'static str,
    pub tip: &'static str,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct SeasonBox {
    pub title: &'static str,
    pub tip: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RecommendReply {
    pub weather: WeatherBox,
    pub weather_picks: Vec<PerfumeCard>,
    pub season: SeasonBox,
    pub season_picks: Vec<PerfumeCard>,
    pub accord_options: Vec<String>,
    pub worldcup: Option<Vec<PerfumeCard>>,
}

pub async fn recommend(
    State(state): State<AppState>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<RecommendReply>, ApiError> {
    let city = query.city.clone().unwrap_or_else(|| state.default_city.clone());

    let observation = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => state.weather.current_at(lat, lon).await,
        _ => state.weather.current(&city).await,
    };

    let (weather, weather_picks) = match observation {
        Ok(observation) => {
            let advice = code_to_advice(observation.code);
            let accords: Vec<String> =
                advice.accords.iter().map(|accord| accord.to_string()).collect();
            let picks = state.sampling.random_pick(&accords, PICK_COUNT, &[]).await?;
            let weather = WeatherBox {
                lines: observation.display_lines(&city),
                emoji: code_to_emoji(observation.code),
                tip: advice.tip,
                available: true,
            };
            (weather, picks)
        }
        Err(error) => {
            tracing::warn!(
                event_name = "recommend.weather.unavailable",
                city = %city,
                error = %error,
                "weather lookup failed, serving placeholder"
            );
            let weather = WeatherBox {
                lines: placeholder_lines(&city),
                emoji: code_to_emoji(-1),
                tip: code_to_advice(-1).tip,
                available: false,
            };
            (weather, Vec::new())
        }
    };

    let season = season_advice(Utc::now().month());
    let exclude: Vec<_> = weather_picks.iter().map(|pick| pick.perfume.id).collect();
    let season_accords: Vec<String> =
        season.accords.iter().map(|accord| accord.to_string()).collect();
    let season_picks = state.sampling.random_pick(&season_accords, PICK_COUNT, &exclude).await?;

    let worldcup = match (&query.g, &query.a, query.t.as_deref().and_then(TimeOfDay::try_parse)) {
        (Some(gender), Some(accord), Some(time_of_day)) => Some(
            state.sampling.ranked_pick(gender, accord, time_of_day, WORLDCUP_NEED).await?,
        ),
        _ => None,
    };

    let accord_options = state.perfumes.facets().await?.accords;

    log_run(&state, &query, &city, &weather_picks, &season_picks, worldcup.as_deref()).await?;

    Ok(Json(RecommendReply {
        weather,
        weather_picks: weather_picks.iter().map(PerfumeCard::from_pick).collect(),
        season: SeasonBox { title: season.title, tip: season.tip },
        season_picks: season_picks.iter().map(PerfumeCard::from_pick).collect(),
        accord_options,
        worldcup: worldcup
            .map(|picks| picks.iter().map(PerfumeCard::from_pick).collect()),
    }))
}

/// Records which candidates each retrieval strategy surfaced. A perfume
/// appearing under two strategies is only logged once, with its first rank.
async fn log_run(
    state: &AppState,
    query: &RecommendQuery,
    city: &str,
    weather_picks: &[PerfumePick],
    season_picks: &[PerfumePick],
    worldcup: Option<&[PerfumePick]>,
) -> Result<(), ApiError> {
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();
    let mut rank = 0u32;

    let mut push_all = |picks: &[PerfumePick], retrieved_from: &str| {
        for pick in picks {
            if !seen.insert(pick.perfume.id) {
                continue;
            }
            rank += 1;
            candidates.push(NewRecCandidate {
                perfume_id: pick.perfume.id,
                rank,
                score: 0.0,
                reason_summary: None,
                reason_detail: None,
                retrieved_from: Some(retrieved_from.to_string()),
            });
        }
    };

    push_all(weather_picks, "weather");
    push_all(season_picks, "season");
    if let Some(picks) = worldcup {
        push_all(picks, "worldcup");
    }

    let run = NewRecRun {
        user_id: query.user_id,
        conversation_id: None,
        request_message_id: None,
        query_text: format!("recommend city={city}"),
        parsed_slots: Some(json!({
            "city": city,
            "g": query.g,
            "a": query.a,
            "t": query.t,
        })),
        agent: Some("recommend".to_string()),
        model_version: None,
    };
    state.rec_runs.log_run(run, candidates).await?;
    Ok(())
}
