use axum::extract::State;
use axum::http::Uri;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Extension;
use std::fmt::Write;
use std::sync::Arc;

use super::jobs::ListJobsParams;
use super::resumes::load_latest;
use super::{backend_error, capability};
use crate::api::response::{ApiError, AppQuery};
use crate::auth::User;
use crate::records::jobs::{self, StatusFilter};
use crate::records::{messages, templates};
use crate::AppState;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, user: Option<&User>, body: &str) -> Html<String> {
    let nav = match user {
        Some(user) => format!(
            r#"<nav class="navbar"><a href="/">Home</a> <a href="/profile">Profile</a> <a href="/messages">Messages</a> <a href="/prompt-templates">Templates</a> <a href="/jobs">Jobs</a> <span class="user">{}</span></nav>"#,
            escape(user.email.as_deref().unwrap_or(&user.id))
        ),
        None => String::new(),
    };
    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{} | Resume Desk</title></head>\n<body>{nav}<main><h1>{}</h1>{body}</main></body></html>",
        escape(title),
        escape(title)
    ))
}

fn list_items<I: IntoIterator<Item = String>>(items: I, empty: &str) -> String {
    let mut html = String::from("<ul>");
    let mut any = false;
    for item in items {
        any = true;
        let _ = write!(html, "<li>{item}</li>");
    }
    if !any {
        return format!("<p class=\"empty\">{}</p>", escape(empty));
    }
    html.push_str("</ul>");
    html
}

pub async fn login_page(State(state): State<Arc<AppState>>) -> Response {
    if state.session.user().is_some() {
        return Redirect::to("/").into_response();
    }
    layout(
        "Sign in",
        None,
        r#"<form id="login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required minlength="6"></label>
<button type="submit">Sign in</button>
<p class="error" hidden></p>
</form>
<script>
document.getElementById("login").addEventListener("submit", async (e) => {
  e.preventDefault();
  const form = new FormData(e.target);
  const res = await fetch("/auth/login", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ email: form.get("email"), password: form.get("password") }),
  });
  if (res.ok) { window.location.replace("/"); return; }
  const body = await res.json();
  const error = e.target.querySelector(".error");
  error.textContent = body.data?.message || body.message || "Sign in failed";
  error.hidden = false;
});
</script>"#,
    )
    .into_response()
}

pub async fn home(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Html<String>, ApiError> {
    let cap = capability(&state)?;
    let body = match load_latest(&state, &cap).await? {
        Some(record) => format!(
            "<section id=\"resume\"><h2>Your Resume</h2><p>{}</p><p>Uploaded {}</p></section>",
            escape(&record.filename),
            record.created_at.format("%Y-%m-%d %H:%M UTC")
        ),
        None => "<section id=\"upload\"><p>Upload your resume (PDF or text) to get started.</p></section>"
            .to_string(),
    };
    Ok(layout("Resume", Some(&user), &body))
}

pub async fn profile(Extension(user): Extension<User>) -> Html<String> {
    let last_sign_in = user
        .last_sign_in_at
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let body = format!(
        "<dl id=\"profile\"><dt>Email</dt><dd>{}</dd><dt>User ID</dt><dd>{}</dd><dt>Last sign in</dt><dd>{}</dd></dl>",
        escape(user.email.as_deref().unwrap_or("")),
        escape(&user.id),
        escape(&last_sign_in)
    );
    layout("Profile", Some(&user), &body)
}

pub async fn messages_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Html<String>, ApiError> {
    let cap = capability(&state)?;
    let items = messages::list(state.backend.records.as_ref(), &cap)
        .await
        .map_err(backend_error)?;
    let body = list_items(
        items.iter().map(|m| {
            format!(
                "<strong>{}</strong> {}<p>{}</p>",
                escape(&m.recipient_name),
                escape(m.recipient_company.as_deref().unwrap_or("")),
                escape(&m.message)
            )
        }),
        "No messages generated yet.",
    );
    Ok(layout("Message History", Some(&user), &body))
}

pub async fn templates_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Html<String>, ApiError> {
    let cap = capability(&state)?;
    let items = templates::list(state.backend.records.as_ref(), &cap)
        .await
        .map_err(backend_error)?;
    let body = list_items(
        items.iter().map(|t| {
            let marker = if t.is_default { " (default)" } else { "" };
            format!(
                "<strong>{}</strong>{marker}<p>{}</p>",
                escape(&t.name),
                escape(&t.description)
            )
        }),
        "No templates yet.",
    );
    Ok(layout("Prompt Templates", Some(&user), &body))
}

pub async fn jobs_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(params): AppQuery<ListJobsParams>,
) -> Result<Html<String>, ApiError> {
    let filter: StatusFilter = params
        .status
        .as_deref()
        .unwrap_or_default()
        .parse()
        .unwrap_or_default();
    let cap = capability(&state)?;
    let items = jobs::list(state.backend.records.as_ref(), &cap, filter)
        .await
        .map_err(backend_error)?;

    let empty = match filter {
        StatusFilter::All => "You haven't added any jobs yet.".to_string(),
        other => format!("You don't have any jobs with '{other}' status."),
    };
    let body = list_items(
        items.iter().map(|j| {
            format!(
                "<strong>{}</strong> at {} <span class=\"status\">{}</span>",
                escape(&j.title),
                escape(&j.company),
                escape(j.status.as_deref().unwrap_or("Unknown"))
            )
        }),
        &empty,
    );
    Ok(layout("Jobs", Some(&user), &body))
}

/// Unknown API paths answer 404; any other unknown path goes home.
pub async fn fallback(uri: Uri) -> Response {
    let path = uri.path();
    if ["/api/", "/auth/", "/storage/", "/_internal/", "/admin/"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return ApiError::not_found(format!("No route for {path}")).into_response();
    }
    Redirect::to("/").into_response()
}
