//! Read-only content pages

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::SharedState;
use crate::helpers::PageMeta;

/// Number of posts shown on the home page
const HOME_POSTS: usize = 5;

pub async fn home(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user = state.user(&headers);
    let site = &state.site;

    let (blog, courses) = (site.blog(), site.courses());
    let (posts, courses) = tokio::join!(blog.list_posts(), courses.list());
    let posts: Vec<_> = posts.into_iter().take(HOME_POSTS).collect();

    let meta = PageMeta::simple(&site.config.title, &site.config.description);
    let mut context = state.context(&meta, user.as_ref());
    context.insert("posts", &posts);
    context.insert("courses", &courses);
    state.page(StatusCode::OK, "home.html", &context)
}

pub async fn blog_index(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user = state.user(&headers);
    let blog = state.site.blog();

    // Both walk the same cached listing
    let posts = blog.list_posts().await;
    let tags = blog.tags().await;

    let meta = PageMeta::simple("Blog", "All blog posts");
    let mut context = state.context(&meta, user.as_ref());
    context.insert("posts", &posts);
    context.insert("tags", &tags);
    state.page(StatusCode::OK, "blog.html", &context)
}

pub async fn blog_post(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let user = state.user(&headers);
    let not_found = PageMeta::post_not_found();

    match state.site.blog().post(&slug).await {
        Ok(Some(post)) => {
            let meta = PageMeta::for_post(&post, &state.site.config.base_url);
            let mut context = state.context(&meta, user.as_ref());
            context.insert("post", &post);
            state.page(StatusCode::OK, "post.html", &context)
        }
        Ok(None) => state.not_found(&not_found.title, &not_found.description, user.as_ref()),
        Err(e) => state.content_error(
            &e,
            (&not_found.title, &not_found.description),
            user.as_ref(),
        ),
    }
}

pub async fn tag(
    State(state): State<SharedState>,
    Path(tag): Path<String>,
    headers: HeaderMap,
) -> Response {
    let user = state.user(&headers);
    let posts = state.site.blog().posts_by_tag(&tag).await;

    let meta = PageMeta::simple(
        &format!("Posts tagged \"{}\"", tag),
        &format!("Blog posts tagged {}", tag),
    );
    let mut context = state.context(&meta, user.as_ref());
    context.insert("tag", &tag);
    context.insert("posts", &posts);
    state.page(StatusCode::OK, "tag.html", &context)
}

pub async fn courses_index(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user = state.user(&headers);
    let courses = state.site.courses().list().await;

    let meta = PageMeta::simple("Courses", "All courses");
    let mut context = state.context(&meta, user.as_ref());
    context.insert("courses", &courses);
    state.page(StatusCode::OK, "courses.html", &context)
}

pub async fn course(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let user = state.user(&headers);

    let Some(course) = state.site.courses().course(&name).await else {
        return state.not_found(
            "Course not found",
            "Sorry, we couldn't find the requested course.",
            user.as_ref(),
        );
    };

    let meta = PageMeta::simple(&course.summary.title, &course.summary.description);
    let mut context = state.context(&meta, user.as_ref());
    context.insert("course", &course);
    state.page(StatusCode::OK, "course.html", &context)
}

pub async fn lesson(
    State(state): State<SharedState>,
    Path((course, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let user = state.user(&headers);
    let not_found = (
        "Lesson not found",
        "Sorry, we couldn't find the requested lesson.",
    );

    match state.site.courses().lesson(&course, &slug).await {
        Ok(Some(lesson)) => {
            let description = lesson
                .front_matter
                .description
                .clone()
                .unwrap_or_default();
            let meta = PageMeta::simple(&lesson.title, &description);
            let mut context = state.context(&meta, user.as_ref());
            context.insert("lesson", &lesson);
            state.page(StatusCode::OK, "lesson.html", &context)
        }
        Ok(None) => state.not_found(not_found.0, not_found.1, user.as_ref()),
        Err(e) => state.content_error(&e, not_found, user.as_ref()),
    }
}

/// GitHub API quota as JSON
pub async fn rate_limit(State(state): State<SharedState>) -> Response {
    match state.site.rate_limit().await {
        Ok(Some(limit)) => Json(json!({
            "backend": "github",
            "limit": limit.limit,
            "remaining": limit.remaining,
            "reset": limit.reset,
        }))
        .into_response(),
        Ok(None) => Json(json!({ "backend": "local" })).into_response(),
        Err(e) => {
            tracing::error!("Failed to query rate limit: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn fallback(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user = state.user(&headers);
    state.not_found(
        "Page Not Found",
        "The page you are looking for does not exist.",
        user.as_ref(),
    )
}
