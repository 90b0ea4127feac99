//! Sign-in, OAuth callback and sign-out routes

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::SharedState;
use crate::auth::{session_token, AuthError, Provider, SessionStore, User};
use crate::helpers::PageMeta;
use crate::templates::ProviderData;

#[derive(Debug, Default, Deserialize)]
pub struct SignInQuery {
    callback: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn signin_response(
    state: &SharedState,
    status: StatusCode,
    callback: Option<&str>,
    error: Option<&str>,
    user: Option<&User>,
) -> Response {
    let providers: Vec<ProviderData> = state
        .oauth
        .enabled()
        .into_iter()
        .map(|p| ProviderData {
            id: p.id().to_string(),
            name: p.display_name().to_string(),
        })
        .collect();

    let meta = PageMeta::simple("Sign in", "Sign in to edit content");
    let mut context = state.context(&meta, user);
    context.insert("providers", &providers);
    context.insert("callback", &callback);
    context.insert("error", &error);
    state.page(status, "signin.html", &context)
}

pub async fn signin_page(
    State(state): State<SharedState>,
    Query(query): Query<SignInQuery>,
    headers: HeaderMap,
) -> Response {
    let user = state.user(&headers);
    signin_response(
        &state,
        StatusCode::OK,
        query.callback.as_deref(),
        query.error.as_deref(),
        user.as_ref(),
    )
}

/// Redirect to the provider's consent screen
pub async fn signin_start(
    State(state): State<SharedState>,
    Path(provider): Path<String>,
    Query(query): Query<SignInQuery>,
    headers: HeaderMap,
) -> Response {
    let user = state.user(&headers);
    let provider = match provider.parse::<Provider>() {
        Ok(p) => p,
        Err(e) => return state.not_found("Unknown provider", &e.to_string(), user.as_ref()),
    };

    match state.oauth.authorize_url(provider, query.callback.as_deref()) {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            tracing::warn!("Cannot start sign-in: {}", e);
            signin_response(
                &state,
                StatusCode::BAD_REQUEST,
                query.callback.as_deref(),
                Some(&e.to_string()),
                user.as_ref(),
            )
        }
    }
}

/// Provider redirect target: create a session and set its cookie
pub async fn callback(
    State(state): State<SharedState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let provider = match provider.parse::<Provider>() {
        Ok(p) => p,
        Err(e) => return state.not_found("Unknown provider", &e.to_string(), None),
    };

    if let Some(error) = query.error {
        let reason = query.error_description.unwrap_or(error);
        tracing::warn!("{} sign-in denied: {}", provider.display_name(), reason);
        return signin_response(&state, StatusCode::UNAUTHORIZED, None, Some(&reason), None);
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        let error = AuthError::InvalidState.to_string();
        return signin_response(&state, StatusCode::BAD_REQUEST, None, Some(&error), None);
    };

    match state.oauth.complete(provider, &code, &oauth_state).await {
        Ok((user, callback)) => {
            let token = state.sessions.create(user);
            let target = callback.unwrap_or_else(|| "/".to_string());
            (
                [(header::SET_COOKIE, state.sessions.cookie(&token))],
                Redirect::to(&target),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("{} sign-in failed: {}", provider.display_name(), e);
            let status = match e {
                AuthError::InvalidState => StatusCode::BAD_REQUEST,
                _ => StatusCode::UNAUTHORIZED,
            };
            signin_response(&state, status, None, Some(&e.to_string()), None)
        }
    }
}

pub async fn signout(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        if let Some(session) = state.sessions.remove(&token) {
            tracing::info!("Signed out {}", session.user.name);
        }
    }
    (
        [(header::SET_COOKIE, SessionStore::clear_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}
