// libs/scheduling-cell/src/services/booking.rs
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use notification_cell::{NotificationEvent, NotificationGateway, NotificationKind};
use shared_models::{DomainError, TimeRange};

use crate::models::{
    ActorRole, Appointment, AppointmentStatus, BookSlotRequest, BookingConfirmation,
    CancellationConfirmation, RescheduleConfirmation, Slot, SlotType,
};
use crate::services::lifecycle::AppointmentLifecycle;
use crate::store::{SchedulingStore, StoreTx};

/// Books, reschedules and cancels single appointments against single slots.
/// Every operation runs inside one store transaction; notifications go out
/// only after the transaction has committed.
pub struct BookingEngine {
    store: Arc<dyn SchedulingStore>,
    notifier: Arc<dyn NotificationGateway>,
    lifecycle: AppointmentLifecycle,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn SchedulingStore>, notifier: Arc<dyn NotificationGateway>) -> Self {
        Self {
            store,
            notifier,
            lifecycle: AppointmentLifecycle::new(),
        }
    }

    pub async fn book_slot(
        &self,
        request: BookSlotRequest,
    ) -> Result<BookingConfirmation, DomainError> {
        info!(
            "Booking slot {} for patient {}",
            request.slot_id, request.patient_id
        );

        let mut tx = self.store.begin().await?;

        let mut slot = tx.find_slot(request.slot_id).await?.ok_or_else(|| {
            DomainError::NotFound(
                "availability slot not found; it may have been adjusted or removed by the doctor"
                    .to_string(),
            )
        })?;

        if slot.start_time < Utc::now() {
            return Err(DomainError::InvalidInput(
                "cannot book a slot that has already started or passed".to_string(),
            ));
        }

        ensure_bookable(&slot)?;

        let patient = tx
            .find_patient(request.patient_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("patient profile not found".to_string()))?;
        let doctor = tx.find_doctor(slot.doctor_id).await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: slot.doctor_id,
            patient_id: patient.id,
            slot_id: Some(slot.id),
            appointment_time: slot.start_time,
            status: AppointmentStatus::Pending,
            notes: request.notes,
            expected_check_in_time: request.expected_check_in_time,
            created_at: now,
            updated_at: now,
        };
        tx.create_appointment(appointment.clone()).await?;

        consume(&mut slot);
        tx.update_slot(&slot).await?;
        tx.commit().await?;

        info!(
            "Appointment {} booked on slot {} for patient {}",
            appointment.id, slot.id, patient.id
        );

        self.dispatch(NotificationEvent {
            kind: NotificationKind::Booked,
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            appointment_time: appointment.appointment_time,
            patient_email: Some(patient.email),
            doctor_email: doctor.map(|record| record.email),
            reason: None,
            old_range: None,
            new_range: Some(slot.range()),
        })
        .await;

        Ok(BookingConfirmation {
            appointment_id: appointment.id,
            status: appointment.status,
        })
    }

    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_slot_id: Uuid,
        patient_id: Uuid,
    ) -> Result<RescheduleConfirmation, DomainError> {
        info!(
            "Rescheduling appointment {} to slot {} for patient {}",
            appointment_id, new_slot_id, patient_id
        );

        let mut tx = self.store.begin().await?;

        let mut appointment = tx
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("appointment not found".to_string()))?;
        if appointment.patient_id != patient_id {
            return Err(DomainError::Forbidden(
                "appointment does not belong to this patient".to_string(),
            ));
        }

        self.lifecycle
            .validate_transition(&appointment.status, &AppointmentStatus::Rescheduled)?;

        let mut new_slot = tx.find_slot(new_slot_id).await?.ok_or_else(|| {
            DomainError::NotFound(
                "new availability slot not found; it may have been adjusted or removed by the doctor"
                    .to_string(),
            )
        })?;
        if new_slot.start_time < Utc::now() {
            return Err(DomainError::InvalidInput(
                "cannot reschedule to a slot that has already started or passed".to_string(),
            ));
        }
        ensure_bookable(&new_slot)?;

        let old_range = self.release_current_slot(tx.as_mut(), &appointment).await?;

        consume(&mut new_slot);
        tx.update_slot(&new_slot).await?;

        appointment.slot_id = Some(new_slot.id);
        appointment.appointment_time = new_slot.start_time;
        appointment.status = AppointmentStatus::Rescheduled;
        appointment.expected_check_in_time = match new_slot.slot_type {
            SlotType::Wave => Some(Utc::now()),
            SlotType::Stream => None,
        };
        appointment.updated_at = Utc::now();
        tx.update_appointment(&appointment).await?;

        let patient = tx.find_patient(appointment.patient_id).await?;
        let doctor = tx.find_doctor(appointment.doctor_id).await?;
        tx.commit().await?;

        self.dispatch(NotificationEvent {
            kind: NotificationKind::Rescheduled,
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            appointment_time: appointment.appointment_time,
            patient_email: patient.map(|record| record.email),
            doctor_email: doctor.map(|record| record.email),
            reason: None,
            old_range,
            new_range: Some(new_slot.range()),
        })
        .await;

        Ok(RescheduleConfirmation {
            appointment_id: appointment.id,
        })
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<CancellationConfirmation, DomainError> {
        info!(
            "Cancelling appointment {} on behalf of {:?} {}",
            appointment_id, actor_role, actor_id
        );

        let mut tx = self.store.begin().await?;

        let mut appointment = tx
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("appointment not found".to_string()))?;

        let authorized = match actor_role {
            ActorRole::Patient => appointment.patient_id == actor_id,
            ActorRole::Doctor => appointment.doctor_id == actor_id,
        };
        if !authorized {
            return Err(DomainError::Forbidden(
                "you do not have permission to cancel this appointment".to_string(),
            ));
        }

        if matches!(
            appointment.status,
            AppointmentStatus::Cancelled | AppointmentStatus::Completed
        ) {
            return Err(DomainError::InvalidInput(format!(
                "appointment is already {}; cannot cancel",
                appointment.status
            )));
        }

        self.release_current_slot(tx.as_mut(), &appointment).await?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.updated_at = Utc::now();
        tx.update_appointment(&appointment).await?;

        let patient = tx.find_patient(appointment.patient_id).await?;
        let doctor = tx.find_doctor(appointment.doctor_id).await?;
        tx.commit().await?;

        self.dispatch(NotificationEvent {
            kind: NotificationKind::Cancelled,
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            appointment_time: appointment.appointment_time,
            patient_email: patient.map(|record| record.email),
            doctor_email: doctor.map(|record| record.email),
            reason: Some("your appointment has been cancelled by you or the doctor".to_string()),
            old_range: None,
            new_range: None,
        })
        .await;

        Ok(CancellationConfirmation {
            appointment_id: appointment.id,
        })
    }

    /// Give the appointment's current slot its capacity back. The slot may
    /// have been removed by an earlier session adjustment; that is not an
    /// error, the release is skipped.
    async fn release_current_slot(
        &self,
        tx: &mut dyn StoreTx,
        appointment: &Appointment,
    ) -> Result<Option<TimeRange>, DomainError> {
        let Some(slot_id) = appointment.slot_id else {
            return Ok(None);
        };

        match tx.find_slot(slot_id).await? {
            Some(mut slot) => {
                let range = slot.range();
                release(&mut slot);
                tx.update_slot(&slot).await?;
                Ok(Some(range))
            }
            None => {
                warn!(
                    "Slot {} for appointment {} no longer exists, likely deleted by a session adjustment; skipping release",
                    slot_id, appointment.id
                );
                Ok(None)
            }
        }
    }

    async fn dispatch(&self, event: NotificationEvent) {
        if let Err(err) = self.notifier.notify(event).await {
            warn!("Notification dispatch failed: {}", err);
        }
    }
}

/// Capacity check by slot type: a wave slot must have spare capacity, a
/// stream slot must still be marked available.
fn ensure_bookable(slot: &Slot) -> Result<(), DomainError> {
    match slot.slot_type {
        SlotType::Wave => match slot.max_capacity {
            None => Err(DomainError::Conflict(
                "wave slot has no max capacity configured".to_string(),
            )),
            Some(capacity) if slot.booked_count >= capacity => {
                Err(DomainError::Conflict("wave slot is fully booked".to_string()))
            }
            Some(_) => Ok(()),
        },
        SlotType::Stream => {
            if slot.is_available {
                Ok(())
            } else {
                Err(DomainError::Conflict(
                    "stream slot is already booked or not available".to_string(),
                ))
            }
        }
    }
}

fn consume(slot: &mut Slot) {
    match slot.slot_type {
        SlotType::Wave => slot.booked_count += 1,
        SlotType::Stream => slot.is_available = false,
    }
}

fn release(slot: &mut Slot) {
    match slot.slot_type {
        SlotType::Wave => slot.booked_count = slot.booked_count.saturating_sub(1),
        SlotType::Stream => slot.is_available = true,
    }
}
