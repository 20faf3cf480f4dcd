// libs/scheduling-cell/src/store/mod.rs
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use shared_models::{DomainError, TimeRange};

use crate::models::{Appointment, DoctorRecord, PatientRecord, Slot};

pub mod memory;

pub use memory::InMemorySchedulingStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found: {0}")]
    RowMissing(String),

    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        DomainError::Internal(err.to_string())
    }
}

/// Hands out transactions. The handle is injected into the services at
/// construction time and owned by the surrounding application; there is no
/// implicitly-initialized global session.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One atomic unit of work over slots, appointments and directory records.
///
/// Dropping a transaction without calling `commit` rolls every buffered
/// mutation back, so a mid-operation failure never leaves partial state
/// behind. Implementations must also mutually exclude transactions touching
/// the same slot: a SQL backend would lock the slot row (or the doctor's
/// whole day for a session adjustment); the in-memory store serializes
/// transactions outright.
#[async_trait]
pub trait StoreTx: Send {
    // Slots
    async fn find_slot(&mut self, id: Uuid) -> Result<Option<Slot>, StoreError>;

    /// Slots of one doctor whose `start_time` falls inside `range`, ordered
    /// by start time.
    async fn find_slots_by_doctor_and_range(
        &mut self,
        doctor_id: Uuid,
        range: TimeRange,
    ) -> Result<Vec<Slot>, StoreError>;

    async fn create_slot(&mut self, slot: Slot) -> Result<(), StoreError>;
    async fn update_slot(&mut self, slot: &Slot) -> Result<(), StoreError>;
    async fn delete_slot(&mut self, id: Uuid) -> Result<(), StoreError>;

    // Appointments
    async fn find_appointment(&mut self, id: Uuid) -> Result<Option<Appointment>, StoreError>;
    async fn create_appointment(&mut self, appointment: Appointment) -> Result<(), StoreError>;
    async fn update_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError>;

    async fn count_active_by_slot(&mut self, slot_id: Uuid) -> Result<u32, StoreError>;

    /// Active appointments referencing `slot_id`, newest `created_at` first.
    async fn find_active_by_slot(&mut self, slot_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    /// Active appointments of one doctor whose `appointment_time` falls
    /// inside `range`, ordered by appointment time.
    async fn find_active_by_doctor_and_date_range(
        &mut self,
        doctor_id: Uuid,
        range: TimeRange,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// All appointments of one patient, ordered by appointment time.
    async fn find_appointments_by_patient(
        &mut self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// All appointments of one doctor, ordered by appointment time.
    async fn find_appointments_by_doctor(
        &mut self,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError>;

    // Directory
    async fn find_patient(&mut self, id: Uuid) -> Result<Option<PatientRecord>, StoreError>;
    async fn find_doctor(&mut self, id: Uuid) -> Result<Option<DoctorRecord>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
