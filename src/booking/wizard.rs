//! Three-step booking flow: court, then date, then slot and duration
//!
//! The wizard only holds selections and decides transitions. Store access
//! (the availability query and the final write) belongs to the caller,
//! which feeds results back through [`BookingWizard::show_slots`] and
//! [`BookingWizard::complete`].

use chrono::NaiveDate;

use crate::error::{ClubError, Result};
use crate::state::{BookingDuration, Reservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    SelectCourt,
    SelectDate,
    SelectSlot,
}

impl WizardStep {
    /// 1-based step number shown to the member
    pub fn number(self) -> u8 {
        match self {
            WizardStep::SelectCourt => 1,
            WizardStep::SelectDate => 2,
            WizardStep::SelectSlot => 3,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            WizardStep::SelectCourt => None,
            WizardStep::SelectDate => Some(WizardStep::SelectCourt),
            WizardStep::SelectSlot => Some(WizardStep::SelectDate),
        }
    }
}

/// What the caller must do after a successful `next`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    Moved(WizardStep),
    /// Query availability for this court and date, then call `show_slots`
    LoadAvailability { court: String, date: NaiveDate },
    Stay,
}

#[derive(Debug, Clone, Default)]
pub struct BookingWizard {
    /// `None` while closed
    step: Option<WizardStep>,
    court: Option<String>,
    date: Option<NaiveDate>,
    available: Vec<String>,
    slot: Option<String>,
    duration: BookingDuration,
    /// Last validation or store error, shown inline
    message: Option<String>,
}

impl BookingWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.step.is_some()
    }

    pub fn step(&self) -> Option<WizardStep> {
        self.step
    }

    pub fn court(&self) -> Option<&str> {
        self.court.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    pub fn duration(&self) -> BookingDuration {
        self.duration
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Start over at the first step with nothing selected
    pub fn open(&mut self) {
        *self = Self {
            step: Some(WizardStep::SelectCourt),
            ..Self::default()
        };
    }

    /// Discard everything; nothing is persisted
    pub fn close(&mut self) {
        *self = Self::default();
    }

    /// Picking a court moves straight to date selection
    pub fn select_court(&mut self, court: &str) -> Result<()> {
        self.expect_step(WizardStep::SelectCourt)?;

        self.court = Some(court.to_string());
        self.date = None;
        self.available.clear();
        self.slot = None;
        self.message = None;
        self.step = Some(WizardStep::SelectDate);
        Ok(())
    }

    /// Record the date; returns the court to query availability for
    pub fn select_date(&mut self, date: NaiveDate) -> Result<String> {
        self.expect_step(WizardStep::SelectDate)?;
        let court = match &self.court {
            Some(court) => court.clone(),
            None => return Err(self.reject("Please select a court.")),
        };

        self.date = Some(date);
        self.slot = None;
        self.message = None;
        Ok(court)
    }

    /// Availability for `date` resolved; show the free slots.
    ///
    /// Ignored (returns false) if the member has since moved on or picked another date.
    pub fn show_slots(&mut self, date: NaiveDate, available: Vec<String>) -> bool {
        if self.step != Some(WizardStep::SelectDate) || self.date != Some(date) {
            return false;
        }

        self.available = available;
        self.slot = self
            .slot
            .take()
            .filter(|slot| self.available.contains(slot));
        self.message = None;
        self.step = Some(WizardStep::SelectSlot);
        true
    }

    /// Record an error from a store call; the step does not change
    pub fn fail(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn select_slot(&mut self, slot: &str) -> Result<()> {
        self.expect_step(WizardStep::SelectSlot)?;
        if !self.available.iter().any(|s| s == slot) {
            return Err(self.reject("That time slot is not available."));
        }

        self.slot = Some(slot.to_string());
        self.message = None;
        Ok(())
    }

    pub fn select_duration(&mut self, duration: BookingDuration) -> Result<()> {
        self.expect_step(WizardStep::SelectSlot)?;
        self.duration = duration;
        self.message = None;
        Ok(())
    }

    pub fn next(&mut self) -> Result<NextAction> {
        match self.step {
            None => Err(self.reject("The booking wizard is not open.")),
            Some(WizardStep::SelectCourt) => {
                if self.court.is_none() {
                    return Err(self.reject("Please select a court."));
                }
                self.message = None;
                self.step = Some(WizardStep::SelectDate);
                Ok(NextAction::Moved(WizardStep::SelectDate))
            }
            Some(WizardStep::SelectDate) => match (&self.court, self.date) {
                (Some(court), Some(date)) => Ok(NextAction::LoadAvailability {
                    court: court.clone(),
                    date,
                }),
                (None, _) => Err(self.reject("Please select a court.")),
                (_, None) => Err(self.reject("Please select a date.")),
            },
            Some(WizardStep::SelectSlot) => Ok(NextAction::Stay),
        }
    }

    /// One step back; no-op on the first step
    pub fn back(&mut self) {
        if let Some(previous) = self.step.and_then(WizardStep::previous) {
            self.step = Some(previous);
            self.message = None;
        }
    }

    /// The reservation the member is about to confirm
    pub fn draft(&mut self, member_id: &str) -> Result<Reservation> {
        self.expect_step(WizardStep::SelectSlot)?;

        let (court, date) = match (&self.court, self.date) {
            (Some(court), Some(date)) => (court.clone(), date),
            _ => return Err(self.reject("Please select a court and a date.")),
        };
        let start_slot = match &self.slot {
            Some(slot) => slot.clone(),
            None => return Err(self.reject("Please select a time slot.")),
        };

        Ok(Reservation {
            member_id: member_id.to_string(),
            court,
            date,
            start_slot,
            duration: self.duration,
        })
    }

    /// The reservation was stored
    pub fn complete(&mut self) {
        self.close();
    }

    fn expect_step(&mut self, expected: WizardStep) -> Result<()> {
        match self.step {
            Some(step) if step == expected => Ok(()),
            None => Err(self.reject("The booking wizard is not open.")),
            Some(_) => Err(self.reject(match expected {
                WizardStep::SelectCourt => "Go back to the first step to change the court.",
                WizardStep::SelectDate => "Select a court before picking a date.",
                WizardStep::SelectSlot => "Select a date before picking a time slot.",
            })),
        }
    }

    fn reject(&mut self, message: &str) -> ClubError {
        self.message = Some(message.to_string());
        ClubError::validation(message)
    }
}
