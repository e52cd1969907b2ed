//! Shared page chrome for member and admin pages

use crate::session::MemberSession;

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Wrap page content with the sidebar and common styles
pub fn layout(club_name: &str, title: &str, session: &MemberSession, body: &str) -> String {
    let admin_link = if session.is_admin {
        r#"<li><a href="/admin">Admin</a></li>"#
    } else {
        ""
    };
    let admin_badge = if session.is_admin {
        r#"<p class="badge">Admin</p>"#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - {club}</title>
    <style>{css}</style>
</head>
<body>
    <nav class="sidebar">
        <h2>{club}</h2>
        <p class="welcome">Welcome, {name}</p>
        {admin_badge}
        <ul>
            <li><a href="/dashboard">Dashboard</a></li>
            <li><a href="/bookings">Bookings</a></li>
            {admin_link}
            <li><a href="/logout">Sign out</a></li>
        </ul>
    </nav>
    <main>
        <h1>{title}</h1>
        {body}
    </main>
</body>
</html>"#,
        title = html_escape(title),
        club = html_escape(club_name),
        css = site_css(),
        name = html_escape(&session.display_name),
        admin_badge = admin_badge,
        admin_link = admin_link,
        body = body
    )
}

/// Standalone error page (no session required)
pub fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Error</title>
    <style>{css}</style>
</head>
<body>
    <main>
        <div class="card">
            <h1>Something went wrong</h1>
            <p class="error">{message}</p>
            <p><a href="/">Back to start</a></p>
        </div>
    </main>
</body>
</html>"#,
        css = site_css(),
        message = html_escape(message)
    )
}

/// Inline notice for validation or store errors
pub fn notice(message: Option<&str>) -> String {
    message
        .map(|m| format!(r#"<p class="error">{}</p>"#, html_escape(m)))
        .unwrap_or_default()
}

fn site_css() -> &'static str {
    r#"
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #f3f4f6;
            min-height: 100vh;
            display: flex;
            color: #1f2937;
        }
        .sidebar {
            background: #1f2937;
            color: white;
            width: 16rem;
            padding: 1.5rem;
        }
        .sidebar h2 { margin-bottom: 1.5rem; }
        .sidebar .welcome { font-weight: 600; margin-bottom: 0.5rem; }
        .sidebar .badge { color: #4ade80; margin-bottom: 1rem; }
        .sidebar ul { list-style: none; margin-top: 1.5rem; }
        .sidebar li { margin-bottom: 0.75rem; }
        .sidebar a { color: #d1d5db; text-decoration: none; }
        .sidebar a:hover { color: white; }
        main { flex: 1; padding: 1.5rem; }
        main h1 { margin-bottom: 1.5rem; }
        .card {
            background: white;
            padding: 1.5rem;
            border-radius: 8px;
            box-shadow: 0 4px 12px rgba(0,0,0,0.08);
            margin-bottom: 1.5rem;
        }
        .card h2 { font-size: 1.2rem; margin-bottom: 1rem; }
        .booking { border: 1px solid #e5e7eb; border-radius: 8px; padding: 1rem; margin-bottom: 0.75rem; background: #f9fafb; }
        .owes { color: #dc2626; }
        .clear { color: #16a34a; }
        .error { color: #dc2626; margin: 0.75rem 0; }
        .muted { color: #6b7280; }
        button, .btn {
            background: #2563eb;
            color: white;
            border: none;
            border-radius: 8px;
            padding: 0.5rem 1rem;
            font-weight: 600;
            cursor: pointer;
            text-decoration: none;
        }
        button.secondary { background: #6b7280; }
        button.confirm { background: #16a34a; }
        button.danger { background: #dc2626; }
        .slots { display: grid; grid-template-columns: repeat(4, 1fr); gap: 0.5rem; margin: 0.75rem 0; }
        .slots label { background: #e5e7eb; border-radius: 8px; padding: 0.5rem; text-align: center; }
        .wizard-nav { display: flex; gap: 0.5rem; margin-top: 1rem; }
        .wizard-nav form { display: inline; }
        select, input { padding: 0.5rem; border: 1px solid #d1d5db; border-radius: 8px; }
        table { width: 100%; border-collapse: collapse; }
        td, th { padding: 0.75rem; border-bottom: 1px solid #e5e7eb; text-align: left; }
    "#
}
