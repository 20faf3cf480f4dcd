// libs/scheduling-cell/src/services/agenda.rs
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_models::DomainError;

use crate::models::{Appointment, AppointmentView, SlotSnapshot};
use crate::store::{SchedulingStore, StoreTx};

/// Read-side listings of a patient's or doctor's appointments, each with a
/// snapshot of its slot when the slot still exists.
pub struct AgendaService {
    store: Arc<dyn SchedulingStore>,
}

impl AgendaService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn patient_appointments(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<AppointmentView>, DomainError> {
        debug!("Fetching appointments for patient {}", patient_id);

        let mut tx = self.store.begin().await?;
        tx.find_patient(patient_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("patient profile not found".to_string()))?;

        let appointments = tx.find_appointments_by_patient(patient_id).await?;
        let views = self.into_views(tx.as_mut(), appointments).await?;
        tx.commit().await?;
        Ok(views)
    }

    pub async fn doctor_appointments(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<AppointmentView>, DomainError> {
        debug!("Fetching appointments for doctor {}", doctor_id);

        let mut tx = self.store.begin().await?;
        tx.find_doctor(doctor_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("doctor not found".to_string()))?;

        let appointments = tx.find_appointments_by_doctor(doctor_id).await?;
        let views = self.into_views(tx.as_mut(), appointments).await?;
        tx.commit().await?;
        Ok(views)
    }

    async fn into_views(
        &self,
        tx: &mut dyn StoreTx,
        appointments: Vec<Appointment>,
    ) -> Result<Vec<AppointmentView>, DomainError> {
        let mut views = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let slot = match appointment.slot_id {
                Some(slot_id) => tx
                    .find_slot(slot_id)
                    .await?
                    .as_ref()
                    .map(SlotSnapshot::from),
                None => None,
            };
            views.push(AppointmentView {
                id: appointment.id,
                doctor_id: appointment.doctor_id,
                patient_id: appointment.patient_id,
                appointment_time: appointment.appointment_time,
                status: appointment.status,
                slot_id: appointment.slot_id,
                slot,
                notes: appointment.notes,
                expected_check_in_time: appointment.expected_check_in_time,
                created_at: appointment.created_at,
            });
        }
        Ok(views)
    }
}
