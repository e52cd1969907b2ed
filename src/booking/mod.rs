//! Court booking: slot availability and the booking wizard

pub mod availability;
pub mod wizard;

pub use availability::available_slots;
pub use wizard::{BookingWizard, NextAction, WizardStep};
