//! Free start slots for a court on a given date

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::state::{BookingDuration, Reservation};

/// Slots of `slots` not covered by any reservation on (`court`, `date`), in `slots` order.
///
/// A reservation covers its start slot, and a two-hour reservation also
/// covers the slot at the next position in `slots` when there is one.
/// Adjacency is positional: no clock arithmetic, no wraparound.
pub fn available_slots(
    slots: &[String],
    court: &str,
    date: NaiveDate,
    reservations: &[Reservation],
) -> Vec<String> {
    let occupied = occupied_slots(slots, court, date, reservations);
    slots
        .iter()
        .filter(|slot| !occupied.contains(slot.as_str()))
        .cloned()
        .collect()
}

/// Slot labels taken by reservations on (`court`, `date`)
pub fn occupied_slots<'a>(
    slots: &'a [String],
    court: &str,
    date: NaiveDate,
    reservations: &'a [Reservation],
) -> HashSet<&'a str> {
    let mut occupied = HashSet::new();

    for reservation in reservations
        .iter()
        .filter(|r| r.court == court && r.date == date)
    {
        occupied.insert(reservation.start_slot.as_str());

        if reservation.duration == BookingDuration::Two {
            let following = slots
                .iter()
                .position(|s| *s == reservation.start_slot)
                .and_then(|index| slots.get(index + 1));
            if let Some(following) = following {
                occupied.insert(following.as_str());
            }
        }
    }

    occupied
}
