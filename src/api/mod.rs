use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Settings;
use crate::models::{
    ApiResponse, ComparisonResult, ConferenceSummary, Metric, ScoutingProfile, TeamRecord, TeamSummary,
};
use crate::services::{
    classify, compare_teams, CompareOutcome, DataQuality, FeedSource, Layout, RawSource, SeasonStore,
    TeamTable, Thresholds,
};
use crate::utils::validate_team_name;

const SUGGESTION_LIMIT: usize = 3;

#[derive(Clone)]
pub struct AppState {
    store: Arc<SeasonStore<FeedSource>>,
    default_season: i32,
    thresholds: Thresholds,
}

impl AppState {
    pub fn new(store: SeasonStore<FeedSource>, default_season: i32, thresholds: Thresholds) -> Self {
        Self {
            store: Arc::new(store),
            default_season,
            thresholds,
        }
    }

    fn season(&self, year: Option<i32>) -> i32 {
        year.unwrap_or(self.default_season)
    }

    /// The season's table, or 503 when nothing could be loaded.
    async fn table(&self, year: Option<i32>) -> Result<Arc<TeamTable>, ApiError> {
        let season = self.season(year);
        let snapshot = self.store.snapshot(season).await;
        if snapshot.table.is_empty() {
            let reason = snapshot
                .diagnostic
                .map(|e| e.to_string())
                .unwrap_or_else(|| "feed contained no teams".to_string());
            return Err(ApiError::DataUnavailable { season, reason });
        }
        Ok(snapshot.table)
    }
}

pub async fn serve(settings: Settings, source: FeedSource) -> anyhow::Result<()> {
    tracing::info!("Serving season data from {}", source.describe());
    let store = SeasonStore::new(source, settings.parse_policy.clone()).with_ttl(settings.cache_ttl);
    let state = AppState::new(store, settings.default_season, settings.thresholds);

    let app = create_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    tracing::info!("CBB scout API listening on port {}", settings.port);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/teams/list", get(list_teams_handler))
        .route("/teams/search", get(search_teams_handler))
        .route("/teams/compare/{team1}/{team2}", get(compare_teams_handler))
        .route("/teams/{name}", get(get_team_handler))
        .route("/teams/{name}/scouting", get(scouting_report_handler))
        .route("/conferences", get(conferences_handler))
        .route("/seasons", get(cached_seasons_handler).delete(clear_seasons_handler))
        .route("/seasons/{year}", get(season_overview_handler).delete(invalidate_season_handler))
        .route("/seasons/{year}/refresh", post(refresh_season_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No data available for season {season}: {reason}")]
    DataUnavailable { season: i32, reason: String },
    #[error("Team '{query}' not found{}", did_you_mean(.suggestions))]
    TeamNotFound { query: String, suggestions: Vec<String> },
    #[error("No requested metric is available for both {team1} and {team2}")]
    NotComparable { team1: String, team2: String },
    #[error("{0}")]
    BadRequest(String),
}

fn did_you_mean(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(". Did you mean: {}?", suggestions.join(", "))
    }
}

impl ApiError {
    fn team_not_found(table: &TeamTable, query: &str) -> Self {
        ApiError::TeamNotFound {
            query: query.to_string(),
            suggestions: table
                .suggest(query, SUGGESTION_LIMIT)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::DataUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::TeamNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::NotComparable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::warn!("{}", message);
        }
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn checked_name(name: &str) -> Result<&str, ApiError> {
    if validate_team_name(name) {
        Ok(name)
    } else {
        Err(ApiError::BadRequest(format!("Invalid team name '{}'", name)))
    }
}

// ── Handlers ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("CBB scout API is running"))
}

// GET /teams/list - Every team name in table order
async fn list_teams_handler(
    State(state): State<AppState>,
    Query(params): Query<YearQuery>,
) -> ApiResult<Vec<String>> {
    let table = state.table(params.year).await?;
    let names = table.list_teams().into_iter().map(str::to_string).collect();
    Ok(Json(ApiResponse::success(names)))
}

#[derive(Deserialize)]
struct SearchQuery {
    query: Option<String>,
    year: Option<i32>,
}

// GET /teams/search - Case-insensitive substring search
async fn search_teams_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Vec<TeamSummary>> {
    let table = state.table(params.year).await?;
    let results = table.search(params.query.as_deref().unwrap_or(""));
    Ok(Json(ApiResponse::success(results)))
}

#[derive(Deserialize)]
struct TeamQuery {
    year: Option<i32>,
    exact: Option<bool>,
}

// GET /teams/{name} - Full records for matching teams
async fn get_team_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<TeamQuery>,
) -> ApiResult<Vec<TeamRecord>> {
    let name = checked_name(&name)?;
    let table = state.table(params.year).await?;
    let matches: Vec<TeamRecord> = table
        .find_by_name(name, params.exact.unwrap_or(false))
        .into_iter()
        .cloned()
        .collect();
    if matches.is_empty() {
        return Err(ApiError::team_not_found(&table, name));
    }
    Ok(Json(ApiResponse::success(matches)))
}

// GET /teams/{name}/scouting - Strengths, weaknesses and game plan
async fn scouting_report_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<YearQuery>,
) -> ApiResult<ScoutingProfile> {
    let name = checked_name(&name)?;
    let table = state.table(params.year).await?;
    let team = table
        .find_team(name)
        .ok_or_else(|| ApiError::team_not_found(&table, name))?;
    Ok(Json(ApiResponse::success(classify(team, &table, &state.thresholds))))
}

#[derive(Deserialize)]
struct CompareQuery {
    year: Option<i32>,
    /// Comma-separated metric keys; defaults to the standard comparison set.
    metrics: Option<String>,
}

fn requested_metrics(raw: Option<&str>) -> Result<Vec<Metric>, ApiError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Metric::DEFAULT_COMPARISON.to_vec()),
        Some(raw) => raw
            .split(',')
            .map(|key| key.parse::<Metric>().map_err(ApiError::BadRequest))
            .collect(),
    }
}

// GET /teams/compare/{team1}/{team2} - Head-to-head metric deltas
async fn compare_teams_handler(
    State(state): State<AppState>,
    Path((team1, team2)): Path<(String, String)>,
    Query(params): Query<CompareQuery>,
) -> ApiResult<ComparisonResult> {
    let team1 = checked_name(&team1)?;
    let team2 = checked_name(&team2)?;
    let metrics = requested_metrics(params.metrics.as_deref())?;
    let table = state.table(params.year).await?;

    match compare_teams(&table, team1, team2, &metrics) {
        CompareOutcome::Compared(result) => Ok(Json(ApiResponse::success(result))),
        CompareOutcome::TeamNotFound(query) => Err(ApiError::team_not_found(&table, &query)),
        CompareOutcome::NotComparable => Err(ApiError::NotComparable {
            team1: team1.to_string(),
            team2: team2.to_string(),
        }),
    }
}

#[derive(Deserialize)]
struct ConferenceQuery {
    year: Option<i32>,
    name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ConferencesResponse {
    pub conferences: Vec<String>,
    pub summary: ConferenceSummary,
}

// GET /conferences - Conference list plus a summary (one conference or all)
async fn conferences_handler(
    State(state): State<AppState>,
    Query(params): Query<ConferenceQuery>,
) -> ApiResult<ConferencesResponse> {
    let table = state.table(params.year).await?;
    let name = params.name.as_deref().filter(|n| !n.trim().is_empty());
    let summary = table.conference_summary(name).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown conference '{}'", name.unwrap_or_default()))
    })?;
    let conferences = table.conferences().into_iter().map(str::to_string).collect();
    Ok(Json(ApiResponse::success(ConferencesResponse { conferences, summary })))
}

#[derive(Serialize, Deserialize)]
pub struct SeasonOverview {
    pub season: i32,
    pub teams: usize,
    pub layout: Option<Layout>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub barthag_range: Option<(f64, f64)>,
    pub conferences: usize,
    pub quality: DataQuality,
}

// GET /seasons/{year} - What the normalizer made of the feed
async fn season_overview_handler(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> ApiResult<SeasonOverview> {
    let table = state.table(Some(year)).await?;
    Ok(Json(ApiResponse::success(SeasonOverview {
        season: table.season(),
        teams: table.len(),
        layout: table.layout(),
        fetched_at: table.fetched_at(),
        barthag_range: table.barthag_range(),
        conferences: table.conferences().len(),
        quality: table.quality().clone(),
    })))
}

// GET /seasons - Seasons currently cached
async fn cached_seasons_handler(State(state): State<AppState>) -> Json<ApiResponse<Vec<i32>>> {
    Json(ApiResponse::success(state.store.cached_seasons().await))
}

// DELETE /seasons/{year} - Drop one cached season
async fn invalidate_season_handler(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Json<ApiResponse<bool>> {
    let removed = state.store.invalidate(year).await;
    tracing::info!("Invalidated season {} (cached: {})", year, removed);
    Json(ApiResponse::success(removed))
}

// DELETE /seasons - Drop every cached season
async fn clear_seasons_handler(State(state): State<AppState>) -> Json<ApiResponse<&'static str>> {
    state.store.clear().await;
    tracing::info!("Cleared season cache");
    Json(ApiResponse::success("cache cleared"))
}

#[derive(Serialize, Deserialize)]
pub struct RefreshResponse {
    pub season: i32,
    pub teams: usize,
    pub layout: Option<Layout>,
}

// POST /seasons/{year}/refresh - Refetch a season and swap it in
async fn refresh_season_handler(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> ApiResult<RefreshResponse> {
    let snapshot = state.store.refresh(year).await;
    if let Some(diagnostic) = snapshot.diagnostic {
        let kept = if snapshot.table.is_empty() {
            "no previous data".to_string()
        } else {
            format!("still serving {} cached teams", snapshot.table.len())
        };
        return Err(ApiError::DataUnavailable {
            season: year,
            reason: format!("{} ({})", diagnostic, kept),
        });
    }
    if snapshot.table.is_empty() {
        return Err(ApiError::DataUnavailable {
            season: year,
            reason: "feed contained no teams".to_string(),
        });
    }
    tracing::info!("Refreshed season {}: {} teams", year, snapshot.table.len());
    Ok(Json(ApiResponse::success(RefreshResponse {
        season: year,
        teams: snapshot.table.len(),
        layout: snapshot.table.layout(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::header_document;
    use crate::services::{ParsePolicy, StaticSource};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn test_state(source: StaticSource) -> AppState {
        let store = SeasonStore::new(FeedSource::Static(source), ParsePolicy::default());
        AppState::new(store, 2025, Thresholds::default())
    }

    fn app() -> Router {
        create_router().with_state(test_state(StaticSource::with_season(2025, header_document())))
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn data<T: DeserializeOwned>(body: serde_json::Value) -> T {
        let envelope: ApiResponse<T> = serde_json::from_value(body).unwrap();
        assert!(envelope.success);
        envelope.data.unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(app(), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_list_and_search() {
        let (status, body) = call(app(), Method::GET, "/teams/list").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data::<Vec<String>>(body), vec!["Houston", "Duke", "Auburn"]);

        let (_, body) = call(app(), Method::GET, "/teams/search?query=HOU&year=2025").await;
        let results: Vec<TeamSummary> = data(body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].team, "Houston");

        let (_, body) = call(app(), Method::GET, "/teams/search").await;
        assert_eq!(data::<Vec<TeamSummary>>(body).len(), 3);
    }

    #[tokio::test]
    async fn test_get_team_exact_and_missing() {
        let (status, body) = call(app(), Method::GET, "/teams/duke?exact=true").await;
        assert_eq!(status, StatusCode::OK);
        let teams: Vec<TeamRecord> = data(body);
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].conference, "ACC");

        let (status, body) = call(app(), Method::GET, "/teams/Hoston").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("Houston"));
    }

    #[tokio::test]
    async fn test_scouting_report() {
        let (status, body) = call(app(), Method::GET, "/teams/auburn/scouting").await;
        assert_eq!(status, StatusCode::OK);
        let profile: ScoutingProfile = data(body);
        assert_eq!(profile.team, "Auburn");
        assert_eq!(profile.season, 2025);
        assert!(profile.percentiles.contains_key(&Metric::Barthag));
    }

    #[tokio::test]
    async fn test_compare() {
        let (status, body) = call(
            app(),
            Method::GET,
            "/teams/compare/Houston/Duke?metrics=barthag,adjde",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let result: ComparisonResult = data(body);
        assert_eq!(result.metrics.len(), 2);
        assert!((result.metrics[&Metric::Barthag].difference - 0.003).abs() < 1e-9);

        let (status, _) = call(app(), Method::GET, "/teams/compare/Houston/Gonzaga").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(app(), Method::GET, "/teams/compare/Houston/Duke?metrics=elo").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_conferences() {
        let (status, body) = call(app(), Method::GET, "/conferences").await;
        assert_eq!(status, StatusCode::OK);
        let response: ConferencesResponse = data(body);
        assert_eq!(response.conferences, vec!["ACC", "B12", "SEC"]);
        assert_eq!(response.summary.teams, 3);

        let (_, body) = call(app(), Method::GET, "/conferences?name=acc").await;
        let response: ConferencesResponse = data(body);
        assert_eq!(response.summary.conference.as_deref(), Some("ACC"));

        let (status, _) = call(app(), Method::GET, "/conferences?name=Ivy").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_season_is_unavailable() {
        let (status, body) = call(app(), Method::GET, "/teams/list?year=1999").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("1999"));
    }

    #[tokio::test]
    async fn test_season_overview_and_refresh() {
        let state = test_state(StaticSource::with_season(2025, header_document()));
        let app = create_router().with_state(state.clone());

        let (status, body) = call(app.clone(), Method::GET, "/seasons/2025").await;
        assert_eq!(status, StatusCode::OK);
        let overview: SeasonOverview = data(body);
        assert_eq!(overview.quality.rows_admitted, 3);
        assert_eq!(overview.barthag_range, Some((0.951, 0.975)));
        assert_eq!(overview.conferences, 3);

        let (status, body) = call(app.clone(), Method::POST, "/seasons/2025/refresh").await;
        assert_eq!(status, StatusCode::OK);
        let refreshed: RefreshResponse = data(body);
        assert_eq!(refreshed.teams, 3);
        assert_eq!(refreshed.layout, Some(Layout::HeaderDriven));

        let (status, _) = call(app, Method::POST, "/seasons/1999/refresh").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_season_cache_management() {
        let state = test_state(StaticSource::with_season(2025, header_document()));
        let app = create_router().with_state(state.clone());

        call(app.clone(), Method::GET, "/teams/list").await;
        let (_, body) = call(app.clone(), Method::GET, "/seasons").await;
        assert_eq!(data::<Vec<i32>>(body), vec![2025]);

        let (_, body) = call(app.clone(), Method::DELETE, "/seasons/2025").await;
        assert!(data::<bool>(body));
        let (_, body) = call(app.clone(), Method::DELETE, "/seasons/2025").await;
        assert!(!data::<bool>(body));

        call(app.clone(), Method::GET, "/teams/list").await;
        let (status, _) = call(app.clone(), Method::DELETE, "/seasons").await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.store.cached_seasons().await.is_empty());
    }
}
