use chrono::{Local, NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::booking::{available_slots, BookingWizard, NextAction};
use crate::config::ClubConfig;
use crate::error::{ClubError, Result};
use crate::session::MemberSession;
use crate::state::{BookingDuration, Reservation, ReservationQuery, SharedReservationStore};

/// Per-member booking page state
#[derive(Debug, Default)]
struct BookingView {
    wizard: BookingWizard,

    /// Upcoming bookings, fetched once per view and appended to on confirm
    upcoming: Option<Vec<Reservation>>,
}

/// Drives the booking wizard against the reservation store
pub struct BookingManager {
    reservations: SharedReservationStore,

    config: Arc<ClubConfig>,

    /// Member ID -> booking view
    views: DashMap<String, BookingView>,
}

impl BookingManager {
    pub fn new(reservations: SharedReservationStore, config: Arc<ClubConfig>) -> Self {
        Self {
            reservations,
            config,
            views: DashMap::new(),
        }
    }

    /// Free start slots for a court on a date
    pub async fn availability(&self, court: &str, date: NaiveDate) -> Result<Vec<String>> {
        let existing = self
            .reservations
            .query(ReservationQuery::court_on(court, date))
            .await?;
        Ok(available_slots(&self.config.slots, court, date, &existing))
    }

    /// Upcoming bookings of the member, loaded on first use of the view
    pub async fn upcoming_bookings(&self, session: &MemberSession) -> Result<Vec<Reservation>> {
        if let Some(cached) = self
            .views
            .get(&session.member_id)
            .and_then(|view| view.upcoming.clone())
        {
            return Ok(cached);
        }
        self.refresh_bookings(session).await
    }

    /// Re-read upcoming bookings from the store
    pub async fn refresh_bookings(&self, session: &MemberSession) -> Result<Vec<Reservation>> {
        let mine = self
            .reservations
            .query(ReservationQuery::member(&session.member_id))
            .await?;
        let upcoming = upcoming_only(mine, Local::now().naive_local());

        self.views
            .entry(session.member_id.clone())
            .or_default()
            .upcoming = Some(upcoming.clone());
        Ok(upcoming)
    }

    /// Copy of the member's wizard for rendering
    pub fn wizard(&self, session: &MemberSession) -> BookingWizard {
        self.views
            .get(&session.member_id)
            .map(|view| view.wizard.clone())
            .unwrap_or_default()
    }

    pub fn open_wizard(&self, session: &MemberSession) {
        self.views
            .entry(session.member_id.clone())
            .or_default()
            .wizard
            .open();
        debug!("Member {} opened the booking wizard", session.member_id);
    }

    pub fn close_wizard(&self, session: &MemberSession) {
        if let Some(mut view) = self.views.get_mut(&session.member_id) {
            view.wizard.close();
        }
    }

    pub fn back(&self, session: &MemberSession) {
        if let Some(mut view) = self.views.get_mut(&session.member_id) {
            view.wizard.back();
        }
    }

    pub fn select_court(&self, session: &MemberSession, court: &str) -> Result<()> {
        let mut view = self.views.entry(session.member_id.clone()).or_default();
        if !self.config.has_court(court) {
            view.wizard.fail("Please select a court.");
            return Err(ClubError::validation(format!("Unknown court '{}'", court)));
        }
        view.wizard.select_court(court)
    }

    /// Record the date and load the free slots for it
    pub async fn select_date(&self, session: &MemberSession, date: NaiveDate) -> Result<()> {
        let court = {
            let mut view = self.views.entry(session.member_id.clone()).or_default();
            view.wizard.select_date(date)?
        };
        self.load_slots(session, &court, date).await
    }

    pub async fn next(&self, session: &MemberSession) -> Result<()> {
        let action = {
            let mut view = self.views.entry(session.member_id.clone()).or_default();
            view.wizard.next()?
        };

        match action {
            NextAction::LoadAvailability { court, date } => {
                self.load_slots(session, &court, date).await
            }
            NextAction::Moved(_) | NextAction::Stay => Ok(()),
        }
    }

    pub fn select_slot(
        &self,
        session: &MemberSession,
        slot: &str,
        duration: BookingDuration,
    ) -> Result<()> {
        let mut view = self.views.entry(session.member_id.clone()).or_default();
        view.wizard.select_slot(slot)?;
        view.wizard.select_duration(duration)
    }

    /// Store the drafted reservation and close the wizard.
    ///
    /// Availability is not re-checked here: two members who saw the same
    /// free slot can both book it.
    pub async fn confirm(&self, session: &MemberSession) -> Result<Reservation> {
        let draft = {
            let mut view = self.views.entry(session.member_id.clone()).or_default();
            view.wizard.draft(&session.member_id)?
        };

        match self.reservations.create(draft.clone()).await {
            Ok(()) => {
                let mut view = self.views.entry(session.member_id.clone()).or_default();
                view.wizard.complete();
                if let Some(upcoming) = view.upcoming.as_mut() {
                    upcoming.push(draft.clone());
                }
                info!(
                    "Member {} booked {} on {} at {} for {}h",
                    session.member_id,
                    draft.court,
                    draft.date,
                    draft.start_slot,
                    draft.duration.hours()
                );
                Ok(draft)
            }
            Err(e) => {
                error!("Failed to store booking for {}: {}", session.member_id, e);
                if let Some(mut view) = self.views.get_mut(&session.member_id) {
                    view.wizard
                        .fail("Could not save your booking. Check your permissions and try again.");
                }
                Err(e)
            }
        }
    }

    /// Show a message in the wizard without changing its step
    pub fn report(&self, session: &MemberSession, message: &str) {
        if let Some(mut view) = self.views.get_mut(&session.member_id) {
            view.wizard.fail(message);
        }
    }

    /// Forget the member's booking view (sign-out)
    pub fn end_view(&self, session: &MemberSession) {
        self.views.remove(&session.member_id);
    }

    async fn load_slots(&self, session: &MemberSession, court: &str, date: NaiveDate) -> Result<()> {
        match self.availability(court, date).await {
            Ok(free) => {
                if let Some(mut view) = self.views.get_mut(&session.member_id) {
                    view.wizard.show_slots(date, free);
                }
                Ok(())
            }
            Err(e) => {
                error!("Failed to load availability for {} on {}: {}", court, date, e);
                if let Some(mut view) = self.views.get_mut(&session.member_id) {
                    view.wizard
                        .fail("Could not load available times. Please try again.");
                }
                Err(e)
            }
        }
    }
}

/// Bookings starting after `now`, earliest first
pub fn upcoming_only(bookings: Vec<Reservation>, now: NaiveDateTime) -> Vec<Reservation> {
    let mut upcoming: Vec<(NaiveDateTime, Reservation)> = bookings
        .into_iter()
        .filter_map(|r| r.starts_at().map(|at| (at, r)))
        .filter(|(at, _)| *at > now)
        .collect();
    upcoming.sort_by(|a, b| a.0.cmp(&b.0));
    upcoming.into_iter().map(|(_, r)| r).collect()
}

pub type SharedBookingManager = Arc<BookingManager>;

pub fn create_shared_booking_manager(
    reservations: SharedReservationStore,
    config: Arc<ClubConfig>,
) -> SharedBookingManager {
    Arc::new(BookingManager::new(reservations, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::WizardStep;
    use crate::state::{FileReservationStore, Member, ReservationStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and optionally refuses writes
    struct RecordingStore {
        inner: FileReservationStore,
        queries: AtomicUsize,
        creates: AtomicUsize,
        deny_writes: bool,
    }

    impl RecordingStore {
        fn new(deny_writes: bool) -> Self {
            Self {
                inner: FileReservationStore::in_memory(),
                queries: AtomicUsize::new(0),
                creates: AtomicUsize::new(0),
                deny_writes,
            }
        }
    }

    #[async_trait]
    impl ReservationStore for RecordingStore {
        async fn query(&self, query: ReservationQuery) -> Result<Vec<Reservation>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.query(query).await
        }

        async fn create(&self, reservation: Reservation) -> Result<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.deny_writes {
                return Err(ClubError::PermissionDenied {
                    message: "writes are not allowed".to_string(),
                });
            }
            self.inner.create(reservation).await
        }
    }

    fn config() -> Arc<ClubConfig> {
        Arc::new(ClubConfig {
            slots: ["09:00", "10:00", "11:00", "12:00"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..ClubConfig::default()
        })
    }

    fn session(id: &str) -> MemberSession {
        MemberSession::new(&Member::new(id.to_string(), id.to_string(), 1000))
    }

    fn tomorrow() -> NaiveDate {
        Local::now().date_naive() + chrono::Duration::days(1)
    }

    async fn seed(
        store: &RecordingStore,
        court: &str,
        date: NaiveDate,
        slot: &str,
        duration: BookingDuration,
    ) {
        store
            .inner
            .create(Reservation {
                member_id: "other".to_string(),
                court: court.to_string(),
                date,
                start_slot: slot.to_string(),
                duration,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wizard_flow_books_free_slot() {
        let store = Arc::new(RecordingStore::new(false));
        let manager = BookingManager::new(store.clone(), config());
        let member = session("m1");
        let day = tomorrow();
        seed(&store, "Tenis 1", day, "10:00", BookingDuration::Two).await;

        manager.upcoming_bookings(&member).await.unwrap();
        manager.open_wizard(&member);
        manager.select_court(&member, "Tenis 1").unwrap();
        manager.select_date(&member, day).await.unwrap();

        let wizard = manager.wizard(&member);
        assert_eq!(wizard.step(), Some(WizardStep::SelectSlot));
        assert_eq!(
            wizard.available().to_vec(),
            vec!["09:00".to_string(), "12:00".to_string()]
        );

        manager
            .select_slot(&member, "12:00", BookingDuration::One)
            .unwrap();
        let booked = manager.confirm(&member).await.unwrap();
        assert_eq!(booked.start_slot, "12:00");

        assert!(!manager.wizard(&member).is_open());
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);

        // Appended to the cached list without another query
        let queries_before = store.queries.load(Ordering::SeqCst);
        let upcoming = manager.upcoming_bookings(&member).await.unwrap();
        assert_eq!(upcoming, vec![booked]);
        assert_eq!(store.queries.load(Ordering::SeqCst), queries_before);
    }

    #[tokio::test]
    async fn test_open_then_cancel_writes_nothing() {
        let store = Arc::new(RecordingStore::new(false));
        let manager = BookingManager::new(store.clone(), config());
        let member = session("m1");

        manager.open_wizard(&member);
        manager.close_wizard(&member);

        assert!(!manager.wizard(&member).is_open());
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_midway_discards_selection() {
        let store = Arc::new(RecordingStore::new(false));
        let manager = BookingManager::new(store.clone(), config());
        let member = session("m1");

        manager.open_wizard(&member);
        manager.select_court(&member, "Paddle").unwrap();
        manager.select_date(&member, tomorrow()).await.unwrap();
        manager
            .select_slot(&member, "09:00", BookingDuration::Two)
            .unwrap();
        manager.close_wizard(&member);

        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
        manager.open_wizard(&member);
        let wizard = manager.wizard(&member);
        assert_eq!(wizard.step(), Some(WizardStep::SelectCourt));
        assert!(wizard.court().is_none());
    }

    #[tokio::test]
    async fn test_next_without_court_is_a_validation_error() {
        let store = Arc::new(RecordingStore::new(false));
        let manager = BookingManager::new(store.clone(), config());
        let member = session("m1");

        manager.open_wizard(&member);
        let err = manager.next(&member).await.unwrap_err();
        assert!(err.is_validation());

        let wizard = manager.wizard(&member);
        assert_eq!(wizard.step(), Some(WizardStep::SelectCourt));
        assert!(wizard.message().is_some());
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_court_is_rejected() {
        let store = Arc::new(RecordingStore::new(false));
        let manager = BookingManager::new(store, config());
        let member = session("m1");

        manager.open_wizard(&member);
        assert!(manager.select_court(&member, "Golf").is_err());
        assert_eq!(manager.wizard(&member).step(), Some(WizardStep::SelectCourt));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_wizard_open() {
        let store = Arc::new(RecordingStore::new(true));
        let manager = BookingManager::new(store.clone(), config());
        let member = session("m1");

        assert!(manager.upcoming_bookings(&member).await.unwrap().is_empty());
        manager.open_wizard(&member);
        manager.select_court(&member, "Tenis 2").unwrap();
        manager.select_date(&member, tomorrow()).await.unwrap();
        manager
            .select_slot(&member, "11:00", BookingDuration::One)
            .unwrap();

        let result = manager.confirm(&member).await;
        assert!(matches!(result, Err(ClubError::PermissionDenied { .. })));

        let wizard = manager.wizard(&member);
        assert_eq!(wizard.step(), Some(WizardStep::SelectSlot));
        assert_eq!(wizard.slot(), Some("11:00"));
        assert!(wizard.message().is_some());
        assert!(manager.upcoming_bookings(&member).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_without_slot_makes_no_write() {
        let store = Arc::new(RecordingStore::new(false));
        let manager = BookingManager::new(store.clone(), config());
        let member = session("m1");

        manager.open_wizard(&member);
        manager.select_court(&member, "Tenis 2").unwrap();
        manager.select_date(&member, tomorrow()).await.unwrap();

        assert!(manager.confirm(&member).await.unwrap_err().is_validation());
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_bookers_both_succeed() {
        // Check-then-write is not atomic: both members see 10:00 free and
        // both bookings are stored, overlapping. This documents the gap.
        let store = Arc::new(RecordingStore::new(false));
        let manager = BookingManager::new(store.clone(), config());
        let ana = session("ana");
        let luis = session("luis");
        let day = tomorrow();

        for member in [&ana, &luis] {
            manager.open_wizard(member);
            manager.select_court(member, "Tenis 1").unwrap();
            manager.select_date(member, day).await.unwrap();
            assert!(manager
                .wizard(member)
                .available()
                .contains(&"10:00".to_string()));
        }

        manager
            .select_slot(&ana, "10:00", BookingDuration::Two)
            .unwrap();
        manager
            .select_slot(&luis, "10:00", BookingDuration::One)
            .unwrap();

        let (first, second) = tokio::join!(manager.confirm(&ana), manager.confirm(&luis));
        assert!(first.is_ok());
        assert!(second.is_ok());

        let stored = store
            .query(ReservationQuery::court_on("Tenis 1", day))
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|r| r.start_slot == "10:00"));
    }

    #[tokio::test]
    async fn test_failed_availability_stays_on_date_step() {
        struct BrokenStore;

        #[async_trait]
        impl ReservationStore for BrokenStore {
            async fn query(&self, _query: ReservationQuery) -> Result<Vec<Reservation>> {
                Err(ClubError::Internal {
                    message: "store offline".to_string(),
                })
            }

            async fn create(&self, _reservation: Reservation) -> Result<()> {
                Ok(())
            }
        }

        let manager = BookingManager::new(Arc::new(BrokenStore), config());
        let member = session("m1");

        manager.open_wizard(&member);
        manager.select_court(&member, "Paddle").unwrap();
        assert!(manager.select_date(&member, tomorrow()).await.is_err());

        let wizard = manager.wizard(&member);
        assert_eq!(wizard.step(), Some(WizardStep::SelectDate));
        assert_eq!(wizard.date(), Some(tomorrow()));
        assert!(wizard.message().is_some());
    }

    #[test]
    fn test_upcoming_only_filters_and_sorts() {
        let day: NaiveDate = "2026-05-04".parse().unwrap();
        let now = day.and_hms_opt(10, 30, 0).unwrap();
        let make = |date: NaiveDate, slot: &str| Reservation {
            member_id: "m1".to_string(),
            court: "Paddle".to_string(),
            date,
            start_slot: slot.to_string(),
            duration: BookingDuration::One,
        };

        let next_day = day + chrono::Duration::days(1);
        let bookings = vec![
            make(next_day, "09:00"),
            make(day, "10:00"),
            make(day, "11:00"),
            make(day, "bad"),
        ];

        let upcoming = upcoming_only(bookings, now);
        assert_eq!(upcoming, vec![make(day, "11:00"), make(next_day, "09:00")]);
    }
}
