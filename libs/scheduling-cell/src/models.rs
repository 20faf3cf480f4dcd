// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::TimeRange;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    /// Exclusive slot bookable by exactly one active appointment at a time.
    Stream,
    /// Capacity-bounded slot bookable by several active appointments at once.
    Wave,
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Stream => write!(f, "stream"),
            SlotType::Wave => write!(f, "wave"),
        }
    }
}

/// A doctor's bookable time window. `[start_time, end_time)` is half-open.
///
/// `is_available` carries stream semantics only; for wave slots availability is
/// derived from `booked_count` against `max_capacity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub slot_type: SlotType,
    pub is_available: bool,
    pub max_capacity: Option<u32>,
    pub booked_count: u32,
}

impl Slot {
    pub fn stream(doctor_id: Uuid, range: TimeRange) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            start_time: range.start,
            end_time: range.end,
            slot_type: SlotType::Stream,
            is_available: true,
            max_capacity: None,
            booked_count: 0,
        }
    }

    pub fn wave(doctor_id: Uuid, range: TimeRange, max_capacity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            start_time: range.start,
            end_time: range.end,
            slot_type: SlotType::Wave,
            is_available: true,
            max_capacity: Some(max_capacity),
            booked_count: 0,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    pub fn duration(&self) -> Duration {
        self.range().duration()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
    Rejected,
}

impl AppointmentStatus {
    /// An appointment that still holds claim on its slot's capacity.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Rejected
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// `slot_id` is severed (set to `None`) when the referenced slot is deleted by
/// a session adjustment; the appointment row itself is never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub expected_check_in_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Doctor,
}

// ==============================================================================
// DIRECTORY RECORDS
// ==============================================================================

/// Contact projection of a patient profile, resolved through the store on
/// demand instead of a lazily-loaded object graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub slot_id: Uuid,
    pub patient_id: Uuid,
    pub notes: Option<String>,
    /// Wave scheduling only: the patient's expected check-in time within the
    /// slot's span.
    pub expected_check_in_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleConfirmation {
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationConfirmation {
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityAdjustment {
    pub slot_id: Uuid,
    pub new_max_capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustSessionRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub new_start_time: DateTime<Utc>,
    pub new_end_time: DateTime<Utc>,
    pub new_consultation_duration_minutes: Option<u32>,
    pub capacity_adjustment: Option<CapacityAdjustment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionAdjustmentSummary {
    pub appointments_cancelled: u32,
    pub slots_deleted: u32,
    pub slots_created: u32,
    pub slots_resized: u32,
    pub slots_capacity_adjusted: u32,
}

// ==============================================================================
// SLOT CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSlotRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub slot_type: Option<SlotType>,
    pub max_capacity: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_available: Option<bool>,
    pub slot_type: Option<SlotType>,
    pub max_capacity: Option<u32>,
}

// ==============================================================================
// AGENDA MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub slot_type: SlotType,
    pub is_available: bool,
    pub max_capacity: Option<u32>,
    pub booked_count: u32,
}

impl From<&Slot> for SlotSnapshot {
    fn from(slot: &Slot) -> Self {
        Self {
            start_time: slot.start_time,
            end_time: slot.end_time,
            slot_type: slot.slot_type,
            is_available: slot.is_available,
            max_capacity: slot.max_capacity,
            booked_count: slot.booked_count,
        }
    }
}

/// An appointment as listed on a patient's or doctor's agenda. The slot
/// snapshot is `None` when the slot has since been removed by an adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentView {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub slot_id: Option<Uuid>,
    pub slot: Option<SlotSnapshot>,
    pub notes: Option<String>,
    pub expected_check_in_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
