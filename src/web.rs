use crate::{
    quiz::{Question, QUESTIONS},
    semantic::{FailureKind, MatchError, MatchResult, MatchService},
    survey::{AnswerSet, QuizAnswers},
};
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    service: Arc<MatchService>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

pub fn router(service: Arc<MatchService>) -> Router {
    let shared_state = Arc::new(SharedState { service });

    Router::new()
        .route("/api/questions", get(questions))
        .route("/api/match", post(find_match))
        .route("/api/corpus", get(corpus_info))
        .route("/api/corpus/reload", post(reload_corpus))
        .route("/api/corpus/:participant_id", get(participant))
        .route("/api/stats", get(stats))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn serve(service: Arc<MatchService>, addr: String) -> anyhow::Result<()> {
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Run the http service until ctrl-c or SIGTERM.
pub fn start_daemon(service: MatchService, addr: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(Arc::new(service), addr.to_string()))
}

#[derive(Debug)]
struct HttpError(MatchError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match (&self.0, self.0.kind()) {
            (MatchError::InvalidInput(_), _) => StatusCode::BAD_REQUEST,
            (MatchError::DegenerateVector(_), _) => StatusCode::UNPROCESSABLE_ENTITY,
            (MatchError::UnknownParticipant(_), _) => StatusCode::NOT_FOUND,
            (_, FailureKind::Transient) => StatusCode::SERVICE_UNAVAILABLE,
            (_, FailureKind::Request) => StatusCode::BAD_REQUEST,
            (_, FailureKind::Fatal) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            log::error!("{:?}", self.0);
        } else {
            log::warn!("{}", self.0);
        }

        (status, Json(json!({"error": self.0.user_message()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<MatchError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn questions() -> Json<&'static [Question]> {
    Json(QUESTIONS)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchRequest {
    #[serde(flatten)]
    pub answers: QuizAnswers,

    /// Number of matches; the configured default when absent
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub status: &'static str,
    pub identity: String,
    pub matches: Vec<MatchResult>,
}

async fn find_match(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, HttpError> {
    log::debug!("payload: {payload:?}");

    let service = state.service.clone();
    let outcome = tokio::task::block_in_place(move || {
        service.find_matches(&AnswerSet::from(payload.answers), payload.k)
    })?;

    Ok(Json(MatchResponse {
        status: "ok",
        identity: outcome.identity,
        matches: outcome.matches,
    }))
}

async fn corpus_info(State(state): State<Arc<SharedState>>) -> Json<serde_json::Value> {
    let corpus = state.service.corpus();
    Json(json!({
        "size": corpus.len(),
        "dimensions": corpus.dimensions(),
        "model": corpus.model(),
    }))
}

async fn reload_corpus(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let service = state.service.clone();
    let size = tokio::task::block_in_place(move || service.reload())?;

    Ok(Json(json!({"status": "ok", "size": size})))
}

async fn participant(
    State(state): State<Arc<SharedState>>,
    Path(participant_id): Path<String>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let corpus = state.service.corpus();
    let record = corpus
        .get(&participant_id)
        .ok_or(MatchError::UnknownParticipant(participant_id))?;

    Ok(Json(json!({
        "participant_id": record.participant_id,
        "data": record.data,
    })))
}

async fn stats(State(state): State<Arc<SharedState>>) -> Json<serde_json::Value> {
    let corpus = state.service.corpus();
    let counts = |field: &str| corpus.value_counts(field);

    Json(json!({
        "total_responses": corpus.len(),
        "demographics": {
            "age": counts("Age"),
            "gender": counts("Gender"),
            "provinces": counts("Province"),
        },
        "music_preferences": {
            "relationship": counts("Q1_Relationship_with_music"),
            "discovery": counts("Q2_Discovering_music"),
            "current_preference": counts("Q9_Music_preference_these_days"),
            "ai_songs": counts("Q10_Songs_by_AI"),
            "dead_artists_voice": counts("Q11_Use_of_dead_artists_voice_feelings"),
        },
        "format_changes": counts("Q4_Music_format_changes"),
    }))
}
