// libs/scheduling-cell/src/store/memory.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use shared_models::TimeRange;

use crate::models::{Appointment, DoctorRecord, PatientRecord, Slot};
use crate::store::{SchedulingStore, StoreError, StoreTx};

#[derive(Debug, Clone, Default)]
struct StoreState {
    slots: HashMap<Uuid, Slot>,
    appointments: HashMap<Uuid, Appointment>,
    patients: HashMap<Uuid, PatientRecord>,
    doctors: HashMap<Uuid, DoctorRecord>,
}

/// Reference store. A transaction holds the store mutex for its whole
/// lifetime, which serializes all transactions; a snapshot taken at `begin`
/// is restored if the transaction is dropped without committing.
pub struct InMemorySchedulingStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    pub async fn register_patient(&self, patient: PatientRecord) {
        self.state.lock().await.patients.insert(patient.id, patient);
    }

    pub async fn register_doctor(&self, doctor: DoctorRecord) {
        self.state.lock().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn seed_slot(&self, slot: Slot) {
        self.state.lock().await.slots.insert(slot.id, slot);
    }

    pub async fn seed_appointment(&self, appointment: Appointment) {
        self.state
            .lock()
            .await
            .appointments
            .insert(appointment.id, appointment);
    }

    pub async fn slot(&self, id: Uuid) -> Option<Slot> {
        self.state.lock().await.slots.get(&id).cloned()
    }

    pub async fn appointment(&self, id: Uuid) -> Option<Appointment> {
        self.state.lock().await.appointments.get(&id).cloned()
    }

    pub async fn slots_for_doctor(&self, doctor_id: Uuid) -> Vec<Slot> {
        let state = self.state.lock().await;
        let mut slots: Vec<Slot> = state
            .slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.start_time);
        slots
    }
}

impl Default for InMemorySchedulingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulingStore for InMemorySchedulingStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            snapshot: Some(snapshot),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<StoreState>,
    /// Pre-transaction state, restored on drop unless committed.
    snapshot: Option<StoreState>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            debug!("rolling back uncommitted store transaction");
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_slot(&mut self, id: Uuid) -> Result<Option<Slot>, StoreError> {
        Ok(self.guard.slots.get(&id).cloned())
    }

    async fn find_slots_by_doctor_and_range(
        &mut self,
        doctor_id: Uuid,
        range: TimeRange,
    ) -> Result<Vec<Slot>, StoreError> {
        let mut slots: Vec<Slot> = self
            .guard
            .slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id && range.contains(slot.start_time))
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.start_time);
        Ok(slots)
    }

    async fn create_slot(&mut self, slot: Slot) -> Result<(), StoreError> {
        self.guard.slots.insert(slot.id, slot);
        Ok(())
    }

    async fn update_slot(&mut self, slot: &Slot) -> Result<(), StoreError> {
        if !self.guard.slots.contains_key(&slot.id) {
            return Err(StoreError::RowMissing(format!("slot {}", slot.id)));
        }
        self.guard.slots.insert(slot.id, slot.clone());
        Ok(())
    }

    async fn delete_slot(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.guard.slots.remove(&id);
        Ok(())
    }

    async fn find_appointment(&mut self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.guard.appointments.get(&id).cloned())
    }

    async fn create_appointment(&mut self, appointment: Appointment) -> Result<(), StoreError> {
        self.guard.appointments.insert(appointment.id, appointment);
        Ok(())
    }

    async fn update_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError> {
        if !self.guard.appointments.contains_key(&appointment.id) {
            return Err(StoreError::RowMissing(format!("appointment {}", appointment.id)));
        }
        self.guard.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn count_active_by_slot(&mut self, slot_id: Uuid) -> Result<u32, StoreError> {
        let count = self
            .guard
            .appointments
            .values()
            .filter(|appointment| {
                appointment.slot_id == Some(slot_id) && appointment.status.is_active()
            })
            .count();
        Ok(count as u32)
    }

    async fn find_active_by_slot(&mut self, slot_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let mut appointments: Vec<Appointment> = self
            .guard
            .appointments
            .values()
            .filter(|appointment| {
                appointment.slot_id == Some(slot_id) && appointment.status.is_active()
            })
            .cloned()
            .collect();
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(appointments)
    }

    async fn find_active_by_doctor_and_date_range(
        &mut self,
        doctor_id: Uuid,
        range: TimeRange,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut appointments: Vec<Appointment> = self
            .guard
            .appointments
            .values()
            .filter(|appointment| {
                appointment.doctor_id == doctor_id
                    && appointment.status.is_active()
                    && range.contains(appointment.appointment_time)
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|appointment| appointment.appointment_time);
        Ok(appointments)
    }

    async fn find_appointments_by_patient(
        &mut self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut appointments: Vec<Appointment> = self
            .guard
            .appointments
            .values()
            .filter(|appointment| appointment.patient_id == patient_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|appointment| appointment.appointment_time);
        Ok(appointments)
    }

    async fn find_appointments_by_doctor(
        &mut self,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut appointments: Vec<Appointment> = self
            .guard
            .appointments
            .values()
            .filter(|appointment| appointment.doctor_id == doctor_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|appointment| appointment.appointment_time);
        Ok(appointments)
    }

    async fn find_patient(&mut self, id: Uuid) -> Result<Option<PatientRecord>, StoreError> {
        Ok(self.guard.patients.get(&id).cloned())
    }

    async fn find_doctor(&mut self, id: Uuid) -> Result<Option<DoctorRecord>, StoreError> {
        Ok(self.guard.doctors.get(&id).cloned())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.snapshot = None;
        Ok(())
    }
}
