// libs/notification-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::TimeRange;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Booked,
    Cancelled,
    Rescheduled,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Booked => write!(f, "booked"),
            NotificationKind::Cancelled => write!(f, "cancelled"),
            NotificationKind::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

/// A domain event emitted after a booking mutation has committed. Delivery is
/// best-effort; gateways never influence the outcome of the transaction that
/// produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub patient_email: Option<String>,
    pub doctor_email: Option<String>,
    pub reason: Option<String>,
    pub old_range: Option<TimeRange>,
    pub new_range: Option<TimeRange>,
}

impl NotificationEvent {
    pub fn subject(&self) -> String {
        match self.kind {
            NotificationKind::Booked => format!("Appointment Confirmation: #{}", self.appointment_id),
            NotificationKind::Cancelled => format!("Appointment Cancellation: #{}", self.appointment_id),
            NotificationKind::Rescheduled => format!("Appointment Rescheduled: #{}", self.appointment_id),
        }
    }

    pub fn body(&self) -> String {
        match self.kind {
            NotificationKind::Booked => format!(
                "Dear Patient,\n\nYour appointment has been successfully booked for {}.\n\nThank you.",
                self.appointment_time.to_rfc3339()
            ),
            NotificationKind::Cancelled => {
                let mut body = format!(
                    "Dear Patient,\n\nYour appointment on {} has been cancelled.",
                    self.appointment_time.to_rfc3339()
                );
                if let Some(reason) = &self.reason {
                    body.push_str(&format!("\nReason: {}", reason));
                }
                body.push_str("\n\nWe apologize for any inconvenience.");
                body
            }
            NotificationKind::Rescheduled => {
                let mut body = "Dear Patient,\n\nYour appointment has been rescheduled.".to_string();
                match (&self.old_range, &self.new_range) {
                    (Some(old), Some(new)) => {
                        body.push_str(&format!(
                            "\nOld time: {} - {}",
                            old.start.to_rfc3339(),
                            old.end.to_rfc3339()
                        ));
                        body.push_str(&format!(
                            "\nNew time: {} - {}",
                            new.start.to_rfc3339(),
                            new.end.to_rfc3339()
                        ));
                    }
                    _ => {
                        body.push_str(&format!("\nNew time: {}", self.appointment_time.to_rfc3339()));
                    }
                }
                body.push_str("\n\nThank you.");
                body
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification channel failure: {0}")]
    Channel(String),

    #[error("notification endpoint rejected event: {0}")]
    Rejected(String),
}
