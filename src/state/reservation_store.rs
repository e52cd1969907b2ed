use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::document::{current_timestamp, load_document, save_document};
use crate::config::club::parse_slot;
use crate::error::Result;

/// Booking length in whole hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BookingDuration {
    #[default]
    One,
    Two,
}

impl BookingDuration {
    pub const ALL: [BookingDuration; 2] = [BookingDuration::One, BookingDuration::Two];

    pub fn hours(self) -> u8 {
        match self {
            BookingDuration::One => 1,
            BookingDuration::Two => 2,
        }
    }
}

impl TryFrom<u8> for BookingDuration {
    type Error = String;

    fn try_from(hours: u8) -> std::result::Result<Self, Self::Error> {
        match hours {
            1 => Ok(BookingDuration::One),
            2 => Ok(BookingDuration::Two),
            other => Err(format!("duration must be 1 or 2 hours, got {}", other)),
        }
    }
}

impl From<BookingDuration> for u8 {
    fn from(duration: BookingDuration) -> Self {
        duration.hours()
    }
}

/// A court booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub member_id: String,
    pub court: String,
    pub date: NaiveDate,
    pub start_slot: String,
    pub duration: BookingDuration,
}

impl Reservation {
    /// Local start time, if the slot label is a valid time
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        parse_slot(&self.start_slot).map(|time| self.date.and_time(time))
    }
}

/// Filter for reservation queries; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct ReservationQuery {
    pub court: Option<String>,
    pub date: Option<NaiveDate>,
    pub member_id: Option<String>,
}

impl ReservationQuery {
    pub fn court_on(court: &str, date: NaiveDate) -> Self {
        Self {
            court: Some(court.to_string()),
            date: Some(date),
            member_id: None,
        }
    }

    pub fn member(member_id: &str) -> Self {
        Self {
            member_id: Some(member_id.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.court.as_ref().map_or(true, |c| *c == reservation.court)
            && self.date.map_or(true, |d| d == reservation.date)
            && self
                .member_id
                .as_ref()
                .map_or(true, |m| *m == reservation.member_id)
    }
}

/// Reservation record store
///
/// `create` performs no overlap check: availability is advisory and
/// computed by the caller before writing.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn query(&self, query: ReservationQuery) -> Result<Vec<Reservation>>;

    async fn create(&self, reservation: Reservation) -> Result<()>;
}

pub type SharedReservationStore = Arc<dyn ReservationStore>;

/// On-disk reservation document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationDatabase {
    pub version: u32,
    pub last_updated: u64,
    pub reservations: Vec<Reservation>,
}

impl Default for ReservationDatabase {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: current_timestamp(),
            reservations: Vec::new(),
        }
    }
}

/// Reservation store persisted to a JSON file (or kept in memory only when no path is given)
pub struct FileReservationStore {
    db: RwLock<ReservationDatabase>,
    path: Option<String>,
}

impl FileReservationStore {
    pub async fn open(path: &str) -> Result<Self> {
        let db = load_document::<ReservationDatabase>(path)
            .await?
            .unwrap_or_default();
        info!("Loaded {} reservations from {}", db.reservations.len(), path);

        Ok(Self {
            db: RwLock::new(db),
            path: Some(path.to_string()),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            db: RwLock::new(ReservationDatabase::default()),
            path: None,
        }
    }
}

#[async_trait]
impl ReservationStore for FileReservationStore {
    async fn query(&self, query: ReservationQuery) -> Result<Vec<Reservation>> {
        let db = self.db.read().await;
        Ok(db
            .reservations
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn create(&self, reservation: Reservation) -> Result<()> {
        let mut db = self.db.write().await;
        let mut next = db.clone();
        next.reservations.push(reservation.clone());
        next.last_updated = current_timestamp();

        if let Some(path) = &self.path {
            save_document(path, &next).await?;
        }
        *db = next;

        debug!(
            "Stored reservation: {} on {} at {} ({}h) for {}",
            reservation.court,
            reservation.date,
            reservation.start_slot,
            reservation.duration.hours(),
            reservation.member_id
        );
        Ok(())
    }
}

pub fn create_shared_reservation_store(store: FileReservationStore) -> SharedReservationStore {
    Arc::new(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::document::temp_path;

    fn reservation(member: &str, court: &str, date: &str, slot: &str) -> Reservation {
        Reservation {
            member_id: member.to_string(),
            court: court.to_string(),
            date: date.parse().unwrap(),
            start_slot: slot.to_string(),
            duration: BookingDuration::One,
        }
    }

    #[test]
    fn test_duration_serializes_as_hours() {
        let json = serde_json::to_string(&BookingDuration::Two).unwrap();
        assert_eq!(json, "2");

        let parsed: BookingDuration = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, BookingDuration::One);

        assert!(serde_json::from_str::<BookingDuration>("3").is_err());
    }

    #[test]
    fn test_reservation_json_shape() {
        let json = r#"{
            "member_id": "u1",
            "court": "Paddle",
            "date": "2026-03-01",
            "start_slot": "19:00",
            "duration": 2
        }"#;

        let parsed: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.duration, BookingDuration::Two);
        assert_eq!(
            parsed.starts_at().unwrap().to_string(),
            "2026-03-01 19:00:00"
        );
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = FileReservationStore::in_memory();
        store
            .create(reservation("u1", "Tenis 1", "2026-03-01", "09:00"))
            .await
            .unwrap();
        store
            .create(reservation("u2", "Tenis 1", "2026-03-02", "09:00"))
            .await
            .unwrap();
        store
            .create(reservation("u1", "Paddle", "2026-03-01", "10:00"))
            .await
            .unwrap();

        let date = "2026-03-01".parse().unwrap();
        let on_court = store
            .query(ReservationQuery::court_on("Tenis 1", date))
            .await
            .unwrap();
        assert_eq!(on_court.len(), 1);
        assert_eq!(on_court[0].member_id, "u1");

        let mine = store.query(ReservationQuery::member("u1")).await.unwrap();
        assert_eq!(mine.len(), 2);

        let all = store.query(ReservationQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_persists_to_file() {
        let path = temp_path("reservations");
        {
            let store = FileReservationStore::open(&path).await.unwrap();
            store
                .create(reservation("u1", "Tenis 2", "2026-03-01", "12:00"))
                .await
                .unwrap();
        }

        let reopened = FileReservationStore::open(&path).await.unwrap();
        let all = reopened.query(ReservationQuery::default()).await.unwrap();
        assert_eq!(all, vec![reservation("u1", "Tenis 2", "2026-03-01", "12:00")]);

        let _ = std::fs::remove_file(&path);
    }
}
