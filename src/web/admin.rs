//! Admin panel: member list with live updates and balance adjustments

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Redirect, Response,
    },
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, error, warn};

use super::auth::require_session;
use super::pages::{error_page, html_escape, layout, notice};
use super::server::AppState;
use crate::error::ClubError;
use crate::state::Member;

/// Admin routes, nested under `/admin`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(members_page))
        .route("/members/:id/adjust", post(adjust_balance))
        .route("/members/stream", get(members_stream))
}

#[derive(Deserialize)]
pub struct AdminParams {
    error: Option<String>,
}

#[derive(Deserialize)]
pub struct AdjustForm {
    amount: String,
}

fn access_denied() -> Response {
    (
        StatusCode::FORBIDDEN,
        Html(error_page("You do not have access to the admin panel.")),
    )
        .into_response()
}

/// GET /admin - Member list
async fn members_page(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Response {
    let session = match require_session(&headers, &state.sessions).await {
        Ok(session) => session,
        Err(redirect) => return redirect,
    };

    let members = match state.members.list_members(&session).await {
        Ok(members) => members,
        Err(ClubError::PermissionDenied { .. }) => return access_denied(),
        Err(e) => {
            error!("Failed to list members: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(error_page("Could not load the member list.")),
            )
                .into_response();
        }
    };

    let rows: String = members.iter().map(member_row).collect();
    let body = format!(
        r#"{notice}
        <div class="card">
            <h2>Members <span id="live" class="muted">(connecting...)</span></h2>
            <table>
                <thead>
                    <tr><th>Name</th><th>ID</th><th>Balance</th><th>Role</th><th>Adjust balance</th></tr>
                </thead>
                <tbody id="members">{rows}</tbody>
            </table>
        </div>
        <script>{script}</script>"#,
        notice = notice(params.error.as_deref()),
        rows = rows,
        script = LIVE_MEMBERS_SCRIPT
    );

    Html(layout(&state.config.name, "Admin", &session, &body)).into_response()
}

fn member_row(member: &Member) -> String {
    let balance_class = if member.owes() { "owes" } else { "clear" };
    let role = if member.is_admin { "Admin" } else { "Member" };

    format!(
        r#"<tr>
            <td>{name}</td>
            <td class="muted">{id}</td>
            <td class="{class}">${balance}</td>
            <td>{role}</td>
            <td>
                <form method="post" action="/admin/members/{path_id}/adjust">
                    <input type="text" name="amount" inputmode="numeric" pattern="-?[0-9]+" placeholder="e.g. -200" required>
                    <button type="submit">Apply</button>
                </form>
            </td>
        </tr>"#,
        name = html_escape(&member.display_name),
        id = html_escape(&member.id),
        class = balance_class,
        balance = member.balance,
        role = role,
        path_id = html_escape(&urlencoding::encode(&member.id))
    )
}

/// POST /admin/members/:id/adjust - Add a signed amount to a balance
async fn adjust_balance(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    Form(form): Form<AdjustForm>,
) -> Response {
    let session = match require_session(&headers, &state.sessions).await {
        Ok(session) => session,
        Err(redirect) => return redirect,
    };

    match state
        .members
        .adjust_balance(&session, &member_id, &form.amount)
        .await
    {
        Ok(_) => Redirect::to("/admin").into_response(),
        Err(ClubError::PermissionDenied { .. }) => access_denied(),
        Err(e) => {
            let message = if e.is_validation() {
                debug!("Rejected balance adjustment for {}: {}", member_id, e);
                e.to_string()
            } else if matches!(e, ClubError::MemberNotFound { .. }) {
                warn!("Balance adjustment for unknown member {}", member_id);
                "That member no longer exists.".to_string()
            } else {
                error!("Failed to adjust balance for {}: {}", member_id, e);
                "Could not update the balance. Please try again.".to_string()
            };
            Redirect::to(&format!("/admin?error={}", urlencoding::encode(&message)))
                .into_response()
        }
    }
}

/// GET /admin/members/stream - Member list snapshots as server-sent events
async fn members_stream(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let session = match require_session(&headers, &state.sessions).await {
        Ok(session) => session,
        Err(_) => return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    };

    let subscription = match state.members.subscribe_members(&session).await {
        Ok(subscription) => subscription,
        Err(ClubError::PermissionDenied { .. }) => {
            return (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
        Err(e) => {
            error!("Failed to open member subscription: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Unavailable").into_response();
        }
    };

    // Dropping the stream on disconnect releases the subscription
    let stream = subscription
        .into_stream()
        .map(|snapshot| Event::default().event("members").json_data(snapshot));

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("ping"),
        )
        .into_response()
}

const LIVE_MEMBERS_SCRIPT: &str = r#"
    const tbody = document.getElementById('members');
    const live = document.getElementById('live');

    function cell(text, className) {
        const td = document.createElement('td');
        td.textContent = text;
        if (className) td.className = className;
        return td;
    }

    function adjustForm(id) {
        const form = document.createElement('form');
        form.method = 'post';
        form.action = '/admin/members/' + encodeURIComponent(id) + '/adjust';
        const input = document.createElement('input');
        input.type = 'text';
        input.name = 'amount';
        input.inputMode = 'numeric';
        input.pattern = '-?[0-9]+';
        input.placeholder = 'e.g. -200';
        input.required = true;
        const button = document.createElement('button');
        button.type = 'submit';
        button.textContent = 'Apply';
        form.append(input, button);
        const td = document.createElement('td');
        td.appendChild(form);
        return td;
    }

    function render(members) {
        // Keep the table while an admin is typing an amount
        if (tbody.contains(document.activeElement)) return;
        tbody.replaceChildren(...members.map(function(m) {
            const tr = document.createElement('tr');
            tr.append(
                cell(m.display_name),
                cell(m.id, 'muted'),
                cell('$' + m.balance, m.balance > 0 ? 'owes' : 'clear'),
                cell(m.is_admin ? 'Admin' : 'Member'),
                adjustForm(m.id)
            );
            return tr;
        }));
    }

    const source = new EventSource('/admin/members/stream');
    source.onopen = function() { live.textContent = '(live)'; };
    source.addEventListener('members', function(event) {
        try {
            render(JSON.parse(event.data));
        } catch (e) {
            console.error('Failed to parse member list:', e);
        }
    });
    source.onerror = function() { live.textContent = '(reconnecting...)'; };
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_row_escapes_and_flags_debt() {
        let member = Member::new("a/b".to_string(), "<Ana>".to_string(), 250);
        let row = member_row(&member);

        assert!(row.contains("&lt;Ana&gt;"));
        assert!(row.contains(r#"class="owes">$250"#));
        assert!(row.contains("/admin/members/a%2Fb/adjust"));
    }

    #[test]
    fn test_member_row_clear_balance() {
        let mut member = Member::new("u1".to_string(), "Luis".to_string(), 0);
        member.is_admin = true;
        let row = member_row(&member);

        assert!(row.contains(r#"class="clear">$0"#));
        assert!(row.contains("<td>Admin</td>"));
    }
}
