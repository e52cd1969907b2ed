//! Member pages: dashboard (balance) and bookings (wizard)

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use tracing::{debug, error};

use super::auth::require_session;
use super::pages::{html_escape, layout, notice};
use super::server::AppState;
use crate::booking::{BookingWizard, WizardStep};
use crate::config::ClubConfig;
use crate::error::{ClubError, Result};
use crate::session::MemberSession;
use crate::state::{BookingDuration, Member, Reservation};

/// Resolve the session or bail out with a redirect to sign-in
macro_rules! session_or_redirect {
    ($headers:expr, $state:expr) => {
        match require_session(&$headers, &$state.sessions).await {
            Ok(session) => session,
            Err(redirect) => return redirect,
        }
    };
}

#[derive(Deserialize)]
pub struct DashboardParams {
    settled: Option<String>,
    failed: Option<String>,
}

#[derive(Deserialize)]
pub struct BookingsParams {
    refresh: Option<String>,
}

#[derive(Deserialize)]
pub struct CourtForm {
    court: Option<String>,
}

#[derive(Deserialize)]
pub struct DateForm {
    date: Option<String>,
}

#[derive(Deserialize)]
pub struct SlotForm {
    slot: Option<String>,
    duration: Option<String>,
}

/// GET /dashboard - Balance and upcoming bookings
pub async fn dashboard(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Response {
    let session = session_or_redirect!(headers, state);

    let mut body = String::new();
    if params.settled.is_some() {
        body.push_str(r#"<p class="clear">Balance settled.</p>"#);
    }
    if params.failed.is_some() {
        body.push_str(&notice(Some("Could not settle your balance. Please try again.")));
    }

    match state.members.current_member(&session).await {
        Ok(member) => body.push_str(&balance_card(&member)),
        Err(e) => {
            error!("Failed to load member {}: {}", session.member_id, e);
            body.push_str(&notice(Some("Could not load your balance.")));
        }
    }

    match state.bookings.refresh_bookings(&session).await {
        Ok(upcoming) => body.push_str(&upcoming_card(&upcoming)),
        Err(e) => {
            error!("Failed to load bookings for {}: {}", session.member_id, e);
            body.push_str(&notice(Some("Could not load your bookings.")));
        }
    }

    Html(layout(&state.config.name, "Dashboard", &session, &body)).into_response()
}

/// POST /dashboard/settle - Pay off the balance
pub async fn settle(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let session = session_or_redirect!(headers, state);

    match state.members.settle(&session).await {
        Ok(_) => Redirect::to("/dashboard?settled=1").into_response(),
        Err(e) => {
            error!("Failed to settle balance for {}: {}", session.member_id, e);
            Redirect::to("/dashboard?failed=1").into_response()
        }
    }
}

/// GET /bookings - Upcoming bookings and the booking wizard
pub async fn bookings_page(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<BookingsParams>,
) -> Response {
    let session = session_or_redirect!(headers, state);

    let upcoming = if params.refresh.is_some() {
        state.bookings.refresh_bookings(&session).await
    } else {
        state.bookings.upcoming_bookings(&session).await
    };

    let mut body = String::new();
    match upcoming {
        Ok(upcoming) => body.push_str(&upcoming_card(&upcoming)),
        Err(e) => {
            error!("Failed to load bookings for {}: {}", session.member_id, e);
            body.push_str(&notice(Some("Could not load your bookings.")));
        }
    }

    let wizard = state.bookings.wizard(&session);
    body.push_str(&wizard_card(&state.config, &wizard));

    Html(layout(&state.config.name, "Bookings", &session, &body)).into_response()
}

pub async fn wizard_open(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let session = session_or_redirect!(headers, state);
    state.bookings.open_wizard(&session);
    back_to_bookings()
}

pub async fn wizard_close(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let session = session_or_redirect!(headers, state);
    state.bookings.close_wizard(&session);
    back_to_bookings()
}

pub async fn wizard_back(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let session = session_or_redirect!(headers, state);
    state.bookings.back(&session);
    back_to_bookings()
}

pub async fn wizard_next(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let session = session_or_redirect!(headers, state);
    log_rejection(&session, state.bookings.next(&session).await);
    back_to_bookings()
}

pub async fn wizard_court(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(form): Form<CourtForm>,
) -> Response {
    let session = session_or_redirect!(headers, state);

    match form.court.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(court) => log_rejection(&session, state.bookings.select_court(&session, court)),
        None => state.bookings.report(&session, "Please select a court."),
    }
    back_to_bookings()
}

pub async fn wizard_date(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(form): Form<DateForm>,
) -> Response {
    let session = session_or_redirect!(headers, state);

    match form.date.as_deref().and_then(parse_date) {
        Some(date) => log_rejection(&session, state.bookings.select_date(&session, date).await),
        None => state.bookings.report(&session, "Please select a date."),
    }
    back_to_bookings()
}

pub async fn wizard_slot(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(form): Form<SlotForm>,
) -> Response {
    let session = session_or_redirect!(headers, state);
    log_rejection(&session, apply_slot_form(&state, &session, &form));
    back_to_bookings()
}

/// POST /bookings/wizard/confirm - Optionally pick slot and duration, then book
pub async fn wizard_confirm(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(form): Form<SlotForm>,
) -> Response {
    let session = session_or_redirect!(headers, state);

    if form.slot.is_some() {
        if let Err(e) = apply_slot_form(&state, &session, &form) {
            log_rejection::<()>(&session, Err(e));
            return back_to_bookings();
        }
    }

    // Store failures are logged by the manager and shown in the wizard
    log_rejection(&session, state.bookings.confirm(&session).await);
    back_to_bookings()
}

fn apply_slot_form(state: &AppState, session: &MemberSession, form: &SlotForm) -> Result<()> {
    let duration = match form.duration.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => parse_duration(raw).map_err(|e| {
            state.bookings.report(session, "Please choose a duration of 1 or 2 hours.");
            e
        })?,
        None => state.bookings.wizard(session).duration(),
    };

    match &form.slot {
        Some(slot) => state.bookings.select_slot(session, slot, duration),
        None => {
            state.bookings.report(session, "Please select a time slot.");
            Err(ClubError::validation("Please select a time slot."))
        }
    }
}

fn log_rejection<T>(session: &MemberSession, result: Result<T>) {
    if let Err(e) = result {
        if e.is_validation() {
            debug!("Wizard input rejected for {}: {}", session.member_id, e);
        } else {
            error!("Wizard action failed for {}: {}", session.member_id, e);
        }
    }
}

fn back_to_bookings() -> Response {
    Redirect::to("/bookings").into_response()
}

fn parse_duration(raw: &str) -> Result<BookingDuration> {
    let hours: u8 = raw
        .parse()
        .map_err(|_| ClubError::validation(format!("Invalid duration '{}'", raw)))?;
    BookingDuration::try_from(hours).map_err(ClubError::validation)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn balance_card(member: &Member) -> String {
    let status = if member.owes() {
        format!(
            r#"<p class="owes">You have an outstanding balance of ${}.</p>
            <form method="post" action="/dashboard/settle"
                  onsubmit="return confirm('Are you sure you want to settle your balance?');">
                <button type="submit">Settle balance</button>
            </form>"#,
            member.balance
        )
    } else {
        r#"<p class="clear">You have no outstanding balance.</p>"#.to_string()
    };

    format!(
        r#"<div class="card"><h2>Balance</h2>{}</div>"#,
        status
    )
}

fn upcoming_card(upcoming: &[Reservation]) -> String {
    let items = if upcoming.is_empty() {
        r#"<p class="muted">You have no upcoming bookings.</p>"#.to_string()
    } else {
        upcoming
            .iter()
            .map(|r| {
                format!(
                    r#"<div class="booking"><p><strong>Court:</strong> {}</p><p><strong>Date:</strong> {}</p><p><strong>Time:</strong> {} ({}h)</p></div>"#,
                    html_escape(&r.court),
                    r.date,
                    html_escape(&r.start_slot),
                    r.duration.hours()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"<div class="card"><h2>Upcoming bookings</h2>{}</div>"#,
        items
    )
}

fn wizard_card(config: &ClubConfig, wizard: &BookingWizard) -> String {
    let step = match wizard.step() {
        Some(step) => step,
        None => {
            return r#"<div class="card"><h2>Book a court</h2>
                <form method="post" action="/bookings/wizard/open"><button type="submit">Book</button></form>
            </div>"#
                .to_string()
        }
    };

    let content = match step {
        WizardStep::SelectCourt => {
            let options: String = config
                .courts
                .iter()
                .map(|court| {
                    let selected = if wizard.court() == Some(court.as_str()) {
                        " selected"
                    } else {
                        ""
                    };
                    format!(
                        r#"<option value="{court}"{selected}>{court}</option>"#,
                        court = html_escape(court),
                        selected = selected
                    )
                })
                .collect();
            format!(
                r#"<h3>Select a court</h3>
                <form method="post" action="/bookings/wizard/court">
                    <select name="court" onchange="this.form.submit()">
                        <option value="" disabled{none}>Choose an option</option>
                        {options}
                    </select>
                    <button type="submit">Select</button>
                </form>"#,
                none = if wizard.court().is_none() { " selected" } else { "" },
                options = options
            )
        }
        WizardStep::SelectDate => format!(
            r#"<h3>Select a date for {court}</h3>
            <form method="post" action="/bookings/wizard/date">
                <input type="date" name="date" min="{today}" value="{value}" required>
                <button type="submit">Show times</button>
            </form>"#,
            court = html_escape(wizard.court().unwrap_or_default()),
            today = Local::now().date_naive(),
            value = wizard.date().map(|d| d.to_string()).unwrap_or_default()
        ),
        WizardStep::SelectSlot => slot_step(wizard),
    };

    let back = if step > WizardStep::SelectCourt {
        r#"<form method="post" action="/bookings/wizard/back"><button type="submit" class="secondary">Back</button></form>"#
    } else {
        ""
    };
    let next = if step < WizardStep::SelectSlot {
        r#"<form method="post" action="/bookings/wizard/next"><button type="submit">Next</button></form>"#
    } else {
        ""
    };

    format!(
        r#"<div class="card">
            <h2>Book a court</h2>
            <p class="muted">Step {number} of 3</p>
            {message}
            {content}
            <div class="wizard-nav">
                {back}
                {next}
                <form method="post" action="/bookings/wizard/close"><button type="submit" class="danger">Cancel</button></form>
            </div>
        </div>"#,
        number = step.number(),
        message = notice(wizard.message()),
        content = content,
        back = back,
        next = next
    )
}

fn slot_step(wizard: &BookingWizard) -> String {
    let durations: String = BookingDuration::ALL
        .iter()
        .map(|d| {
            let selected = if *d == wizard.duration() { " selected" } else { "" };
            let label = if d.hours() == 1 { "1 hour" } else { "2 hours" };
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                d.hours(),
                selected,
                label
            )
        })
        .collect();

    let slots = if wizard.available().is_empty() {
        r#"<p class="muted">No time slots available.</p>"#.to_string()
    } else {
        let buttons: String = wizard
            .available()
            .iter()
            .map(|slot| {
                let checked = if wizard.slot() == Some(slot.as_str()) {
                    " checked"
                } else {
                    ""
                };
                format!(
                    r#"<label><input type="radio" name="slot" value="{slot}"{checked}> {slot}</label>"#,
                    slot = html_escape(slot),
                    checked = checked
                )
            })
            .collect();
        format!(r#"<div class="slots">{}</div>"#, buttons)
    };

    format!(
        r#"<h3>Select a time and duration</h3>
        <p>{court} on {date}</p>
        <form method="post" action="/bookings/wizard/confirm">
            <label>Duration (hours):
                <select name="duration">{durations}</select>
            </label>
            {slots}
            <button type="submit" formaction="/bookings/wizard/slot" class="secondary">Select</button>
            <button type="submit" class="confirm">Confirm booking</button>
        </form>"#,
        court = html_escape(wizard.court().unwrap_or_default()),
        date = wizard.date().map(|d| d.to_string()).unwrap_or_default(),
        durations = durations,
        slots = slots
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::{create_shared_booking_manager, create_shared_member_manager};
    use crate::session::create_session_store;
    use crate::state::{
        create_shared_member_store, create_shared_reservation_store, FileMemberStore,
        FileReservationStore,
    };
    use crate::web::oauth::IdentityProvider;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;

    fn app_state() -> AppState {
        let config = Arc::new(ClubConfig::default());
        AppState {
            config: config.clone(),
            identity: IdentityProvider {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                base_url: "http://localhost:3000".to_string(),
                authorize_url: "https://idp.example/auth".to_string(),
                token_url: "https://idp.example/token".to_string(),
                userinfo_url: "https://idp.example/userinfo".to_string(),
                http_client: reqwest::Client::new(),
            },
            sessions: create_session_store(),
            members: create_shared_member_manager(
                create_shared_member_store(FileMemberStore::in_memory()),
                1000,
            ),
            bookings: create_shared_booking_manager(
                create_shared_reservation_store(FileReservationStore::in_memory()),
                config,
            ),
        }
    }

    async fn sign_in(state: &AppState) -> (HeaderMap, MemberSession) {
        let session = MemberSession::new(&Member::new("m1".to_string(), "Ana".to_string(), 1000));
        let token = state.sessions.create_session(session.clone()).await;
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("club_session={}", token).parse().unwrap(),
        );
        (headers, session)
    }

    async fn extract_form<T: serde::de::DeserializeOwned + Send>(body: &'static str) -> T {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        match Form::<T>::from_request(request, &()).await {
            Ok(Form(form)) => form,
            Err(rejection) => panic!("form rejected: {}", rejection.status()),
        }
    }

    #[tokio::test]
    async fn test_empty_court_form_stays_on_first_step() {
        let state = app_state();
        let (headers, session) = sign_in(&state).await;
        wizard_open(headers.clone(), State(state.clone())).await;

        for body in ["", "court=", "court=+"] {
            let form: CourtForm = extract_form(body).await;
            let response = wizard_court(headers.clone(), State(state.clone()), Form(form)).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);

            let wizard = state.bookings.wizard(&session);
            assert_eq!(wizard.step(), Some(WizardStep::SelectCourt));
            assert_eq!(wizard.message(), Some("Please select a court."));
        }

        let form: CourtForm = extract_form("court=Paddle").await;
        wizard_court(headers, State(state.clone()), Form(form)).await;
        assert_eq!(
            state.bookings.wizard(&session).step(),
            Some(WizardStep::SelectDate)
        );
    }

    #[tokio::test]
    async fn test_empty_date_form_reports_inline() {
        let state = app_state();
        let (headers, session) = sign_in(&state).await;
        wizard_open(headers.clone(), State(state.clone())).await;
        state.bookings.select_court(&session, "Paddle").unwrap();

        let form: DateForm = extract_form("").await;
        wizard_date(headers, State(state.clone()), Form(form)).await;

        let wizard = state.bookings.wizard(&session);
        assert_eq!(wizard.step(), Some(WizardStep::SelectDate));
        assert_eq!(wizard.message(), Some("Please select a date."));
    }

    #[tokio::test]
    async fn test_bad_duration_reports_inline() {
        let state = app_state();
        let (headers, session) = sign_in(&state).await;
        wizard_open(headers.clone(), State(state.clone())).await;
        state.bookings.select_court(&session, "Paddle").unwrap();
        let day = Local::now().date_naive() + chrono::Duration::days(1);
        state.bookings.select_date(&session, day).await.unwrap();

        for body in ["slot=09:00&duration=abc", "slot=09:00&duration=3"] {
            let form: SlotForm = extract_form(body).await;
            wizard_slot(headers.clone(), State(state.clone()), Form(form)).await;

            let wizard = state.bookings.wizard(&session);
            assert_eq!(wizard.step(), Some(WizardStep::SelectSlot));
            assert_eq!(wizard.slot(), None);
            assert_eq!(
                wizard.message(),
                Some("Please choose a duration of 1 or 2 hours.")
            );
        }

        // An empty duration keeps the current one
        let form: SlotForm = extract_form("slot=09:00&duration=").await;
        wizard_slot(headers, State(state.clone()), Form(form)).await;
        let wizard = state.bookings.wizard(&session);
        assert_eq!(wizard.slot(), Some("09:00"));
        assert_eq!(wizard.duration(), BookingDuration::One);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("2").unwrap(), BookingDuration::Two);
        assert!(parse_duration("abc").unwrap_err().is_validation());
        assert!(parse_duration("0").unwrap_err().is_validation());
    }

    fn wizard_at_slots() -> BookingWizard {
        let mut wizard = BookingWizard::new();
        wizard.open();
        wizard.select_court("Tenis 1").unwrap();
        let date: NaiveDate = "2026-05-04".parse().unwrap();
        wizard.select_date(date).unwrap();
        wizard.show_slots(date, vec!["09:00".to_string(), "12:00".to_string()]);
        wizard
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(" 2026-05-04 "),
            Some("2026-05-04".parse().unwrap())
        );
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("04/05/2026"), None);
    }

    #[test]
    fn test_closed_wizard_offers_book_button() {
        let html = wizard_card(&ClubConfig::default(), &BookingWizard::new());
        assert!(html.contains("/bookings/wizard/open"));
        assert!(!html.contains("Step"));
    }

    #[test]
    fn test_first_step_lists_courts_without_back() {
        let mut wizard = BookingWizard::new();
        wizard.open();
        let html = wizard_card(&ClubConfig::default(), &wizard);

        assert!(html.contains("Step 1 of 3"));
        assert!(html.contains(r#"<option value="Paddle">Paddle</option>"#));
        assert!(!html.contains("/bookings/wizard/back"));
        assert!(html.contains("/bookings/wizard/next"));
    }

    #[test]
    fn test_slot_step_lists_free_slots() {
        let html = wizard_card(&ClubConfig::default(), &wizard_at_slots());

        assert!(html.contains("Step 3 of 3"));
        assert!(html.contains(r#"value="09:00""#));
        assert!(html.contains(r#"value="12:00""#));
        assert!(!html.contains(r#"value="10:00""#));
        assert!(html.contains("/bookings/wizard/back"));
        assert!(!html.contains("/bookings/wizard/next"));
    }

    #[test]
    fn test_balance_card() {
        let mut member = Member::new("u1".to_string(), "Ana".to_string(), 1000);
        assert!(balance_card(&member).contains("$1000"));
        assert!(balance_card(&member).contains("/dashboard/settle"));

        member.balance = 0;
        assert!(!balance_card(&member).contains("/dashboard/settle"));
    }
}
