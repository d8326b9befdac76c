use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, get_service},
    Router,
};
use serde::Deserialize;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::app_error::{AppError, AppResult};
use crate::hot_reload::ws_handler;
use crate::pages::{self, PageLookup};
use crate::preview::{self, expired_preview_cookie, preview_cookie};
use crate::render::{
    render_error, render_home, render_not_found, render_post, render_with_layout, RenderState,
    RenderedPage,
};
use crate::retrieval::{fetch_home_page, fetch_post_page, resolve_preview_document, PostPage, RetrievalError};
use crate::state::{AppState, RouterState};

#[derive(Deserialize, Debug, Default)]
pub struct HomeParams {
    page: Option<u32>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PreviewParams {
    token: Option<String>,
    #[serde(rename = "documentId")]
    document_id: Option<String>,
}

pub fn build_router(router_state: RouterState) -> Router {
    let static_dir = get_service(ServeDir::new("content/static"));
    let favicon_ico = get_service(ServeFile::new("content/static/favicon.ico"));
    let favicon_png = get_service(ServeFile::new("content/static/favicon.png"));

    Router::new()
        .route("/", get(homepage))
        .route("/post/{slug}", get(post_page))
        .route("/api/preview", get(enter_preview))
        .route("/api/exit-preview", get(exit_preview))
        .nest_service("/static", static_dir)
        .route_service("/favicon.ico", favicon_ico)
        .route_service("/favicon.png", favicon_png)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(router_state)
}

async fn html_page(state: &AppState, status: StatusCode, page: RenderedPage) -> Response {
    let templates = state.templates.read().await;
    let html = render_with_layout(
        &templates.layout_html,
        &templates.banner_html,
        &page,
        state.settings.is_development,
    );
    (status, Html(html)).into_response()
}

async fn not_found(state: &AppState, slug: &str) -> Response {
    let options = state.render_options().await;
    let template = state.templates.read().await.not_found_html.clone();
    html_page(
        state,
        StatusCode::NOT_FOUND,
        render_not_found(&template, slug, &options),
    )
    .await
}

async fn server_error(state: &AppState) -> Response {
    let options = state.render_options().await;
    html_page(state, StatusCode::INTERNAL_SERVER_ERROR, render_error(&options)).await
}

async fn ready_post(state: &AppState, page: &PostPage) -> Response {
    let options = state.render_options().await;
    html_page(
        state,
        StatusCode::OK,
        render_post(RenderState::Ready(page), &options),
    )
    .await
}

async fn homepage(
    Query(params): Query<HomeParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let page = params.page.unwrap_or(1);
    let home = match fetch_home_page(
        state.source.as_ref(),
        state.doc_type(),
        page,
        state.settings.server.home_page_size,
    )
    .await
    {
        Ok(home) => home,
        Err(e) => {
            error!(page, "Failed to load home page: {}", e);
            return server_error(&state).await;
        }
    };

    let options = state.render_options().await;
    let intro = state.templates.read().await.home_intro_html.clone();
    html_page(&state, StatusCode::OK, render_home(&home, &intro, &options)).await
}

async fn post_page(
    Path(slug): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(reference) = preview::preview_ref(&headers) {
        return preview_post(&state, &slug, &reference).await;
    }

    match pages::lookup(&state, &slug).await {
        PageLookup::Ready(page) => ready_post(&state, &page).await,
        PageLookup::Resolving => {
            let options = state.render_options().await;
            html_page(
                &state,
                StatusCode::OK,
                render_post(RenderState::Resolving, &options),
            )
            .await
        }
        PageLookup::NotFound => not_found(&state, &slug).await,
        PageLookup::Failed(reason) => {
            error!(%slug, %reason, "Post page generation failed");
            server_error(&state).await
        }
    }
}

/// Preview sessions bypass the page store and always read the draft ref.
async fn preview_post(state: &AppState, slug: &str, reference: &str) -> Response {
    match fetch_post_page(state.source.as_ref(), state.doc_type(), slug, Some(reference)).await {
        Ok(page) => {
            state.previews.sync(reference, &page.post.id).await;
            let mut response = ready_post(state, &page).await;
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
            response
        }
        Err(RetrievalError::NotFound { .. }) => not_found(state, slug).await,
        Err(e) => {
            error!(%slug, "Failed to load preview: {}", e);
            server_error(state).await
        }
    }
}

async fn enter_preview(
    Query(params): Query<PreviewParams>,
    State(state): State<Arc<AppState>>,
) -> AppResult<Response> {
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing preview token".to_string()))?;

    let location = match &params.document_id {
        Some(document_id) => {
            match resolve_preview_document(state.source.as_ref(), document_id, &token).await? {
                Some(uid) => format!("/post/{uid}"),
                None => "/".to_string(),
            }
        }
        None => "/".to_string(),
    };

    info!(%location, "Entering preview mode");
    Ok((
        [(header::SET_COOKIE, preview_cookie(&token))],
        Redirect::temporary(&location),
    )
        .into_response())
}

async fn exit_preview(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(reference) = preview::preview_ref(&headers) {
        state.previews.end(&reference).await;
        info!("Leaving preview mode");
    }

    (
        [(header::SET_COOKIE, expired_preview_cookie())],
        Redirect::temporary("/"),
    )
        .into_response()
}
