use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;

use crate::audit::{AuditSession, Notice, SearchOutcome, SubmitOutcome};
use crate::config::Config;
use crate::downloader::{DOWNLOAD_FILENAME, DOWNLOAD_MIME};
use crate::record::{Dataset, EditDraft, NAME_COLUMN, RowKey, is_immutable};
use crate::store::XlsxStore;

const PAGE_TITLE: &str = "Assets Audit Management System";

/// Prefix of edit form fields; the rest of the name is the column.
const FIELD_PREFIX: &str = "col.";

pub struct AppState {
    session: Mutex<AuditSession<XlsxStore>>,
    pages: Handlebars<'static>,
}

impl AppState {
    pub fn new(store: XlsxStore) -> Result<Self, handlebars::TemplateError> {
        let mut pages = Handlebars::new();
        pages.register_template_string("index", include_str!("./static/index.html"))?;

        Ok(AppState {
            session: Mutex::new(AuditSession::new(store)),
            pages,
        })
    }

    fn session(&self) -> MutexGuard<'_, AuditSession<XlsxStore>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    siteid: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct FieldView {
    column: String,
    value: String,
}

#[derive(Serialize)]
struct ResultView {
    label: String,
    action: String,
    expanded: bool,
    current: Vec<FieldView>,
    editable: Vec<FieldView>,
}

#[derive(Serialize)]
struct PageContext {
    title: &'static str,
    notices: Vec<Notice>,
    query: String,
    searched: bool,
    results: Vec<ResultView>,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct TableResponse {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    notices: Vec<Notice>,
}

#[derive(Serialize)]
struct HitResponse {
    key: RowKey,
    position: usize,
    expanded: bool,
    values: Vec<FieldView>,
}

#[derive(Serialize)]
struct SearchResponse {
    status: &'static str,
    hits: Vec<HitResponse>,
    notices: Vec<Notice>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/assets/:site_id/:ordinal", post(submit_form))
        .route("/download", get(download))
        .route("/refresh", post(refresh))
        .route("/api/assets", get(get_assets))
        .route("/api/search", get(search_assets))
        .route("/api/assets/:site_id/:ordinal", post(update_asset))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(XlsxStore::new(&config.data_file))?);
    let app = router(state);

    let listener = TcpListener::bind(config.bind).await?;
    log::info!(
        "Listening on http://{} (data file {})",
        config.bind,
        config.data_file.display()
    );
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index(
    Query(params): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let context = {
        let mut session = state.session();
        let outcome = session.search(&params.siteid);
        let dataset = session.dataset();

        let results = outcome
            .hits()
            .iter()
            .map(|hit| ResultView {
                label: format!(
                    "Site: {} (ID: {})",
                    cell(dataset, hit.position, NAME_COLUMN),
                    hit.key.site_id
                ),
                action: edit_path(&hit.key),
                expanded: hit.expanded,
                current: fields(dataset, hit.position, |_| true),
                editable: fields(dataset, hit.position, |column| !is_immutable(column)),
            })
            .collect();

        PageContext {
            title: PAGE_TITLE,
            query: params.siteid.clone(),
            searched: outcome != SearchOutcome::NoQuery,
            results,
            columns: dataset.columns().to_vec(),
            rows: display_rows(dataset),
            notices: session.drain_notices(),
        }
    };

    match state.pages.render("index", &context) {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            log::error!("page render failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn submit_form(
    Path((site_id, ordinal)): Path<(String, usize)>,
    State(state): State<Arc<AppState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Redirect {
    let submitted = form
        .iter()
        .filter_map(|(name, value)| Some((name.strip_prefix(FIELD_PREFIX)?, value.as_str())));

    let mut session = state.session();
    let draft = build_draft(&mut session, RowKey::new(site_id, ordinal), submitted);
    session.submit_edit(&draft);

    let query = form.get("query").map(String::as_str).unwrap_or_default();
    Redirect::to(&back_to(query))
}

async fn update_asset(
    Path((site_id, ordinal)): Path<(String, usize)>,
    State(state): State<Arc<AppState>>,
    Json(values): Json<HashMap<String, String>>,
) -> impl IntoResponse {
    let mut session = state.session();
    let submitted = values.iter().map(|(c, v)| (c.as_str(), v.as_str()));
    let draft = build_draft(&mut session, RowKey::new(site_id, ordinal), submitted);

    let outcome = session.submit_edit(&draft);
    session.drain_notices();

    match outcome {
        SubmitOutcome::Saved => Json(StatusResponse {
            status: "ok".to_string(),
            message: None,
        }),
        SubmitOutcome::Failed(message) => Json(StatusResponse {
            status: "error".to_string(),
            message: Some(message),
        }),
    }
}

async fn download(State(state): State<Arc<AppState>>) -> Response {
    let result = state.session().export();

    match result {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, DOWNLOAD_MIME.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            log::error!("export failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse {
                    status: "error".to_string(),
                    message: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

async fn refresh(State(state): State<Arc<AppState>>) -> Redirect {
    state.session().refresh();
    Redirect::to("/")
}

async fn get_assets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut session = state.session();
    let dataset = session.dataset();
    let columns = dataset.columns().to_vec();
    let rows = display_rows(dataset);

    Json(TableResponse {
        columns,
        rows,
        notices: session.drain_notices(),
    })
}

async fn search_assets(
    Query(params): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let mut session = state.session();
    let outcome = session.search(&params.siteid);
    let dataset = session.dataset();

    let status = match outcome {
        SearchOutcome::NoQuery => "no_query",
        SearchOutcome::NoMatches => "no_matches",
        SearchOutcome::Matches(_) => "matches",
    };
    let hits = outcome
        .hits()
        .iter()
        .map(|hit| HitResponse {
            key: hit.key.clone(),
            position: hit.position,
            expanded: hit.expanded,
            values: fields(dataset, hit.position, |_| true),
        })
        .collect();

    Json(SearchResponse {
        status,
        hits,
        notices: session.drain_notices(),
    })
}

// Seed from the row so omitted fields keep their values; an unknown row
// yields a bare draft and the session reports it.
fn build_draft<'a>(
    session: &mut AuditSession<XlsxStore>,
    key: RowKey,
    submitted: impl Iterator<Item = (&'a str, &'a str)>,
) -> EditDraft {
    let mut draft = session
        .begin_edit(&key)
        .unwrap_or_else(|| EditDraft::new(key));
    for (column, value) in submitted {
        draft.set(column, value);
    }
    draft
}

fn cell(dataset: &Dataset, position: usize, column: &str) -> String {
    dataset
        .value(position, column)
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn fields(dataset: &Dataset, position: usize, keep: impl Fn(&str) -> bool) -> Vec<FieldView> {
    let Some(row) = dataset.row(position) else {
        return Vec::new();
    };
    dataset
        .columns()
        .iter()
        .zip(row)
        .filter(|(column, _)| keep(column))
        .map(|(column, value)| FieldView {
            column: column.clone(),
            value: value.to_string(),
        })
        .collect()
}

fn display_rows(dataset: &Dataset) -> Vec<Vec<String>> {
    dataset
        .rows()
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect()
}

fn edit_path(key: &RowKey) -> String {
    format!(
        "/assets/{}/{}",
        urlencoding::encode(&key.site_id),
        key.ordinal
    )
}

fn back_to(query: &str) -> String {
    if query.is_empty() {
        "/".to_string()
    } else {
        format!("/?siteid={}", urlencoding::encode(query))
    }
}
