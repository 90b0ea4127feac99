//! Authenticated editor: write a post and publish it to the content repository

use axum::{
    extract::{Form, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Local;
use serde::Deserialize;

use super::SharedState;
use crate::auth::User;
use crate::content::{yaml_quote, FrontMatter};
use crate::helpers::{error_paragraph, PageMeta};

#[derive(Debug, Deserialize)]
pub struct EditorForm {
    content: String,
    #[serde(default)]
    action: Option<String>,
}

/// Starting document for a new post
fn draft_template(user: &User) -> String {
    format!(
        "---\ntitle: \ndate: {}\nauthor: {}\ndescription: \ntags: []\n---\n\nStart writing here.\n",
        Local::now().format("%Y-%m-%d"),
        yaml_quote(&user.name)
    )
}

/// Validate a submitted document and derive its file slug
fn post_slug(document: &str) -> Result<String, String> {
    let (fm, _) = FrontMatter::parse(document).map_err(|e| e.to_string())?;
    let title = fm
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "A title is required in the front matter.".to_string())?;

    let slug = fm
        .slug
        .as_deref()
        .map(slug::slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slug::slugify(title));
    if slug.is_empty() {
        return Err("Could not derive a file name from the title.".to_string());
    }
    Ok(slug)
}

fn access_denied(state: &SharedState, user: Option<&User>) -> Response {
    let (status, description) = match user {
        Some(_) => (StatusCode::FORBIDDEN, "This account may not publish"),
        None => (StatusCode::UNAUTHORIZED, "Sign in to use the editor"),
    };
    let meta = PageMeta::simple("Access Denied", description);
    let mut context = state.context(&meta, user);
    context.insert("callback", "/editor");
    state.page(status, "access_denied.html", &context)
}

/// The signed-in user, if they are on the editors list
fn editor(state: &SharedState, headers: &HeaderMap) -> Result<User, Response> {
    let Some(user) = state.user(headers) else {
        return Err(access_denied(state, None));
    };
    let auth = &state.site.config.auth;
    if !auth.is_editor(user.login.as_deref(), user.email.as_deref()) {
        tracing::warn!("Refused editor access for {}", user.name);
        return Err(access_denied(state, Some(&user)));
    }
    Ok(user)
}

struct EditorView<'a> {
    draft: &'a str,
    error: Option<&'a str>,
    preview: Option<String>,
}

fn editor_page(state: &SharedState, user: &User, status: StatusCode, view: EditorView) -> Response {
    let meta = PageMeta::simple("Editor", "Write and publish a post");
    let mut context = state.context(&meta, Some(user));
    context.insert("draft", view.draft);
    context.insert("error", &view.error);
    context.insert("preview", &view.preview);
    state.page(status, "editor.html", &context)
}

pub async fn show(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user = match editor(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let draft = draft_template(&user);
    editor_page(
        &state,
        &user,
        StatusCode::OK,
        EditorView {
            draft: &draft,
            error: None,
            preview: None,
        },
    )
}

pub async fn publish(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<EditorForm>,
) -> Response {
    let user = match editor(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    if form.action.as_deref() == Some("preview") {
        let preview = match FrontMatter::parse(&form.content) {
            Ok((_, body)) => state.site.renderer().render_or_fallback(body),
            Err(e) => error_paragraph(&e.to_string()),
        };
        return editor_page(
            &state,
            &user,
            StatusCode::OK,
            EditorView {
                draft: &form.content,
                error: None,
                preview: Some(preview),
            },
        );
    }

    let slug = match post_slug(&form.content) {
        Ok(slug) => slug,
        Err(message) => {
            return editor_page(
                &state,
                &user,
                StatusCode::UNPROCESSABLE_ENTITY,
                EditorView {
                    draft: &form.content,
                    error: Some(&message),
                    preview: None,
                },
            )
        }
    };

    let file_name = format!("{}.mdx", slug);
    match state.site.publish_post(&file_name, &form.content).await {
        Ok(reference) => {
            tracing::info!("{} published {} ({})", user.name, file_name, reference);
            Redirect::to(&format!("/blog/{}", slug)).into_response()
        }
        Err(e) => {
            tracing::error!("Publishing {} failed: {:#}", file_name, e);
            let message = format!("Publishing failed: {:#}", e);
            editor_page(
                &state,
                &user,
                StatusCode::BAD_GATEWAY,
                EditorView {
                    draft: &form.content,
                    error: Some(&message),
                    preview: None,
                },
            )
        }
    }
}
