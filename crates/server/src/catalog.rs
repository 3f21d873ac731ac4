//! Catalog browsing, favorites, and feedback endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use scentpick_agent::sampling::PerfumePick;
use scentpick_core::assets::AssetResolver;
use scentpick_core::attributes::{parse_tokens, ACCORD_DISPLAY_CAP};
use scentpick_core::domain::perfume::{Perfume, PerfumeId};
use scentpick_core::domain::recommendation::FeedbackAction;
use scentpick_core::pagination::{compute_range, PageItem};
use scentpick_db::repositories::{CatalogFacets, SearchFilter};

use crate::bootstrap::AppState;
use crate::errors::ApiError;

const PER_PAGE: u32 = 24;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/perfumes", get(list_perfumes))
        .route("/api/perfumes/{id}", get(perfume_detail))
        .route("/api/favorites/toggle", post(toggle_favorite))
        .route("/api/feedback/toggle", post(toggle_feedback))
        .route("/api/mypage", get(mypage))
        .with_state(state)
}

/// Compact list representation shared by search results, picks, and the
/// mypage lists. Accord tokens are normalized and capped for display.
#[derive(Debug, Serialize)]
pub struct PerfumeCard {
    pub id: i64,
    pub brand: String,
    pub name: String,
    pub concentration: String,
    pub gender: &'static str,
    pub accords: Vec<String>,
    pub image_url: String,
}

impl PerfumeCard {
    pub fn from_perfume(perfume: &Perfume, assets: &AssetResolver) -> Self {
        Self {
            id: perfume.id.0,
            brand: perfume.brand.clone(),
            name: perfume.name.clone(),
            concentration: perfume.concentration.clone(),
            gender: perfume.gender.as_str(),
            accords: parse_tokens(&perfume.main_accords)
                .into_iter()
                .take(ACCORD_DISPLAY_CAP)
                .collect(),
            image_url: assets.perfume_image_url(perfume.id),
        }
    }

    pub fn from_pick(pick: &PerfumePick) -> Self {
        Self {
            id: pick.perfume.id.0,
            brand: pick.perfume.brand.clone(),
            name: pick.perfume.name.clone(),
            concentration: pick.perfume.concentration.clone(),
            gender: pick.perfume.gender.as_str(),
            accords: parse_tokens(&pick.perfume.main_accords)
                .into_iter()
                .take(ACCORD_DISPLAY_CAP)
                .collect(),
            image_url: pick.image_url.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub q: Option<String>,
    pub brand: Option<String>,
    pub size: Option<i64>,
    pub gender: Option<String>,
    pub conc: Option<String>,
    pub accord: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CatalogReply {
    pub items: Vec<PerfumeCard>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
    pub page_range: Vec<PageItem>,
    pub facets: CatalogFacets,
}

pub async fn list_perfumes(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogReply>, ApiError> {
    let filter = SearchFilter {
        query: query.q,
        brands: query.brand.into_iter().collect(),
        sizes: query.size.into_iter().collect(),
        genders: query.gender.into_iter().collect(),
        concentrations: query.conc.into_iter().collect(),
        accords: query.accord.into_iter().collect(),
    };

    let page = state.perfumes.search(&filter, query.page.unwrap_or(1), PER_PAGE).await?;
    let facets = state.perfumes.facets().await?;

    Ok(Json(CatalogReply {
        items: page
            .items
            .iter()
            .map(|perfume| PerfumeCard::from_perfume(perfume, &state.assets))
            .collect(),
        total: page.total,
        page: page.page,
        total_pages: page.total_pages,
        page_range: compute_range(page.page, page.total_pages),
        facets,
    }))
}

#[derive(Debug, Serialize)]
pub struct NoteView {
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PerfumeDetail {
    pub id: i64,
    pub brand: String,
    pub name: String,
    pub description: String,
    pub concentration: String,
    pub gender: &'static str,
    pub sizes: Vec<i64>,
    pub detail_url: Option<String>,
    pub accords: Vec<String>,
    pub top_notes: Vec<NoteView>,
    pub middle_notes: Vec<NoteView>,
    pub base_notes: Vec<NoteView>,
    pub notes_score: Value,
    pub season_score: Value,
    pub day_night_score: Value,
    pub image_url: String,
    pub prev_id: Option<i64>,
    pub next_id: Option<i64>,
}

pub async fn perfume_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PerfumeDetail>, ApiError> {
    let perfume = state
        .perfumes
        .find_by_id(PerfumeId(id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("perfume {id}")))?;

    let (prev, next) = state.perfumes.neighbor_ids(perfume.id).await?;
    let top_notes = note_views(&state, &perfume.top_notes).await?;
    let middle_notes = note_views(&state, &perfume.middle_notes).await?;
    let base_notes = note_views(&state, &perfume.base_notes).await?;

    Ok(Json(PerfumeDetail {
        id: perfume.id.0,
        brand: perfume.brand,
        name: perfume.name,
        description: perfume.description,
        concentration: perfume.concentration,
        gender: perfume.gender.as_str(),
        sizes: perfume.sizes,
        detail_url: perfume.detail_url,
        accords: parse_tokens(&perfume.main_accords)
            .into_iter()
            .take(ACCORD_DISPLAY_CAP)
            .collect(),
        top_notes,
        middle_notes,
        base_notes,
        notes_score: perfume.notes_score,
        season_score: perfume.season_score,
        day_night_score: perfume.day_night_score,
        image_url: state.assets.perfume_image_url(perfume.id),
        prev_id: prev.map(|id| id.0),
        next_id: next.map(|id| id.0),
    }))
}

async fn note_views(state: &AppState, raw: &Value) -> Result<Vec<NoteView>, ApiError> {
    let mut views = Vec::new();
    for name in parse_tokens(raw) {
        let image_url = state.note_images.find_image_url(&name).await?;
        views.push(NoteView { name, image_url });
    }
    Ok(views)
}

#[derive(Debug, Deserialize)]
pub struct FavoriteBody {
    pub user_id: i64,
    pub perfume_id: i64,
}

#[derive(Debug, Serialize)]
pub struct FavoriteReply {
    pub is_favorite: bool,
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Json(body): Json<FavoriteBody>,
) -> Result<Json<FavoriteReply>, ApiError> {
    ensure_perfume(&state, body.perfume_id).await?;
    let is_favorite = state.favorites.toggle(body.user_id, PerfumeId(body.perfume_id)).await?;
    Ok(Json(FavoriteReply { is_favorite }))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub user_id: i64,
    pub perfume_id: i64,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackReply {
    pub current_action: Option<&'static str>,
}

pub async fn toggle_feedback(
    State(state): State<AppState>,
    Json(body): Json<FeedbackBody>,
) -> Result<Json<FeedbackReply>, ApiError> {
    let action = FeedbackAction::parse(&body.action)
        .filter(FeedbackAction::is_active_vote)
        .ok_or_else(|| {
            ApiError::bad_request(format!("action must be like or dislike, got `{}`", body.action))
        })?;
    ensure_perfume(&state, body.perfume_id).await?;

    let current = state
        .feedback
        .toggle_vote(body.user_id, PerfumeId(body.perfume_id), action, "detail", None)
        .await?;
    Ok(Json(FeedbackReply { current_action: current.map(|action| action.as_str()) }))
}

#[derive(Debug, Deserialize)]
pub struct MypageQuery {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct MypageReply {
    pub favorites: Vec<PerfumeCard>,
    pub liked: Vec<PerfumeCard>,
    pub disliked: Vec<PerfumeCard>,
}

pub async fn mypage(
    State(state): State<AppState>,
    Query(query): Query<MypageQuery>,
) -> Result<Json<MypageReply>, ApiError> {
    let favorites = state.favorites.list_for_user(query.user_id).await?;
    let liked = state.feedback.perfumes_with_action(query.user_id, FeedbackAction::Like).await?;
    let disliked =
        state.feedback.perfumes_with_action(query.user_id, FeedbackAction::Dislike).await?;

    let cards = |perfumes: Vec<Perfume>| {
        perfumes
            .iter()
            .map(|perfume| PerfumeCard::from_perfume(perfume, &state.assets))
            .collect::<Vec<_>>()
    };
    Ok(Json(MypageReply {
        favorites: cards(favorites),
        liked: cards(liked),
        disliked: cards(disliked),
    }))
}

async fn ensure_perfume(state: &AppState, id: i64) -> Result<(), ApiError> {
    state
        .perfumes
        .find_by_id(PerfumeId(id))
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found(format!("perfume {id}")))
}
