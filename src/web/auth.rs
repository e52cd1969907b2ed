//! Member sign-in via the identity provider
//!
//! Sessions live in [`crate::session::SessionStore`]; this module only
//! deals with cookies and the sign-in page.

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use super::pages::html_escape;
use crate::session::{MemberSession, SharedSessionStore};

const SESSION_COOKIE: &str = "club_session";
const OAUTH_STATE_COOKIE: &str = "club_oauth_state";

/// OAuth callback parameters
#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Resolve the session from the cookie, or redirect to the sign-in page
pub async fn require_session(
    headers: &HeaderMap,
    sessions: &SharedSessionStore,
) -> Result<MemberSession, Response> {
    let token =
        get_session_token(headers).ok_or_else(|| Redirect::to("/login").into_response())?;

    sessions
        .get_session(&token)
        .await
        .ok_or_else(|| Redirect::to("/login").into_response())
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(axum::http::header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|value| value.to_string())
        })
}

/// Extract session token from cookies
pub fn get_session_token(headers: &HeaderMap) -> Option<String> {
    get_cookie(headers, SESSION_COOKIE).filter(|t| !t.is_empty())
}

pub fn get_oauth_state(headers: &HeaderMap) -> Option<String> {
    get_cookie(headers, OAUTH_STATE_COOKIE).filter(|s| !s.is_empty())
}

pub fn create_session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=86400",
        SESSION_COOKIE, token
    )
}

/// Clears the session cookie
pub fn create_logout_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Short-lived cookie carrying the OAuth `state` until the callback
pub fn create_oauth_state_cookie(state: &str) -> String {
    format!(
        "{}={}; Path=/callback; HttpOnly; SameSite=Lax; Max-Age=600",
        OAUTH_STATE_COOKIE, state
    )
}

pub fn clear_oauth_state_cookie() -> String {
    format!(
        "{}=; Path=/callback; HttpOnly; SameSite=Lax; Max-Age=0",
        OAUTH_STATE_COOKIE
    )
}

/// Sign-in page HTML
pub fn login_page(club_name: &str, sign_in_url: &str, message: Option<&str>) -> String {
    let notice = message
        .map(|m| format!(r#"<p class="error">{}</p>"#, html_escape(m)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sign in - {club}</title>
    <style>
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: linear-gradient(135deg, #1f4037 0%, #99f2c8 100%);
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
        }}
        .container {{
            background: white;
            border-radius: 16px;
            padding: 3rem;
            text-align: center;
            box-shadow: 0 10px 40px rgba(0,0,0,0.2);
            max-width: 400px;
            width: 90%;
        }}
        h1 {{ font-size: 1.6rem; margin-bottom: 0.5rem; color: #1f2937; }}
        p {{ color: #6b7280; margin-bottom: 2rem; }}
        p.error {{ color: #dc2626; margin-bottom: 1rem; }}
        .sign-in-btn {{
            display: inline-block;
            background: #2563eb;
            color: white;
            text-decoration: none;
            padding: 1rem 2rem;
            border-radius: 8px;
            font-weight: 600;
        }}
        .sign-in-btn:hover {{ background: #1d4ed8; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Welcome to {club}</h1>
        <p>Sign in to continue.</p>
        {notice}
        <a href="{url}" class="sign-in-btn">Sign in</a>
    </div>
</body>
</html>"#,
        club = html_escape(club_name),
        notice = notice,
        url = html_escape(sign_in_url)
    )
}
