use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ClubError, Result};

/// Club facilities and defaults
/// Loaded from data/club.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClubConfig {
    /// Display name shown in page headers
    pub name: String,

    /// Bookable courts, in display order
    pub courts: Vec<String>,

    /// Hourly start slots ("HH:MM"). Order defines adjacency for two-hour bookings.
    pub slots: Vec<String>,

    /// Balance assigned to a member on first sign-in
    #[serde(default = "default_initial_balance")]
    pub initial_balance: i64,
}

fn default_initial_balance() -> i64 {
    1000
}

impl Default for ClubConfig {
    fn default() -> Self {
        Self {
            name: "Club La Armonía".to_string(),
            courts: ["Fútbol 7", "Fútbol 11", "Tenis 1", "Tenis 2", "Paddle"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            slots: (9..=20).map(|h| format!("{:02}:00", h)).collect(),
            initial_balance: default_initial_balance(),
        }
    }
}

impl ClubConfig {
    /// Load from a JSON file and validate
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ClubError::ConfigLoad {
            path: path.to_string(),
            source: e,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| ClubError::ConfigParse {
            path: path.to_string(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.courts.is_empty() {
            return Err(ClubError::ConfigValidation {
                message: "at least one court is required".to_string(),
            });
        }
        if self.slots.is_empty() {
            return Err(ClubError::ConfigValidation {
                message: "at least one slot is required".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for slot in &self.slots {
            if parse_slot(slot).is_none() {
                return Err(ClubError::ConfigValidation {
                    message: format!("slot '{}' is not a HH:MM time", slot),
                });
            }
            if !seen.insert(slot.as_str()) {
                return Err(ClubError::ConfigValidation {
                    message: format!("slot '{}' is listed twice", slot),
                });
            }
        }

        let mut courts = HashSet::new();
        for court in &self.courts {
            if !courts.insert(court.as_str()) {
                return Err(ClubError::ConfigValidation {
                    message: format!("court '{}' is listed twice", court),
                });
            }
        }

        Ok(())
    }

    pub fn has_court(&self, court: &str) -> bool {
        self.courts.iter().any(|c| c == court)
    }
}

/// Parse a slot label such as "09:00"
pub fn parse_slot(label: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(label, "%H:%M").ok()
}
