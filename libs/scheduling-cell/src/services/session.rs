// libs/scheduling-cell/src/services/session.rs
use chrono::{Duration, NaiveTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::{NotificationEvent, NotificationGateway, NotificationKind};
use shared_config::AppConfig;
use shared_models::{DomainError, TimeRange};

use crate::models::{
    AdjustSessionRequest, Appointment, AppointmentStatus, SessionAdjustmentSummary, Slot, SlotType,
};
use crate::services::slot_plan;
use crate::store::{SchedulingStore, StoreTx};

/// Re-derives a doctor's slot set for one day under a new working window,
/// consultation duration and optional per-slot capacity override, as one
/// transaction: cancel out-of-window appointments, drop out-of-window slots,
/// re-cut mismatched stream slots, reconcile wave capacity, then fill every
/// remaining gap with fresh stream slots.
pub struct SessionAdjustmentPlanner {
    store: Arc<dyn SchedulingStore>,
    notifier: Arc<dyn NotificationGateway>,
    default_consultation_minutes: u32,
}

impl SessionAdjustmentPlanner {
    pub fn new(store: Arc<dyn SchedulingStore>, notifier: Arc<dyn NotificationGateway>) -> Self {
        Self {
            store,
            notifier,
            default_consultation_minutes: shared_config::DEFAULT_CONSULTATION_MINUTES,
        }
    }

    pub fn with_config(
        store: Arc<dyn SchedulingStore>,
        notifier: Arc<dyn NotificationGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            default_consultation_minutes: config.default_consultation_minutes,
        }
    }

    pub async fn adjust_session(
        &self,
        request: AdjustSessionRequest,
    ) -> Result<SessionAdjustmentSummary, DomainError> {
        info!(
            "Adjusting session for doctor {} on {}: window {} - {}",
            request.doctor_id, request.date, request.new_start_time, request.new_end_time
        );

        if request.new_end_time <= request.new_start_time {
            return Err(DomainError::InvalidInput(
                "new_end_time must be after new_start_time".to_string(),
            ));
        }
        if request.new_consultation_duration_minutes == Some(0) {
            return Err(DomainError::InvalidInput(
                "consultation duration must be a positive number of minutes".to_string(),
            ));
        }
        if let Some(adjustment) = &request.capacity_adjustment {
            if adjustment.new_max_capacity == 0 {
                return Err(DomainError::InvalidInput(
                    "max capacity must be a positive number".to_string(),
                ));
            }
        }

        let duration = Duration::minutes(
            request
                .new_consultation_duration_minutes
                .unwrap_or(self.default_consultation_minutes) as i64,
        );
        let window = TimeRange::new(request.new_start_time, request.new_end_time);
        let day_start = Utc.from_utc_datetime(&request.date.and_time(NaiveTime::MIN));
        let day = TimeRange::new(day_start, day_start + Duration::days(1));

        let mut tx = self.store.begin().await?;

        let doctor = tx
            .find_doctor(request.doctor_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("doctor not found".to_string()))?;

        let appointments = tx
            .find_active_by_doctor_and_date_range(request.doctor_id, day)
            .await?;
        let day_slots = tx
            .find_slots_by_doctor_and_range(request.doctor_id, day)
            .await?;
        let slots_by_id: HashMap<Uuid, Slot> =
            day_slots.iter().map(|slot| (slot.id, slot.clone())).collect();

        let mut summary = SessionAdjustmentSummary::default();
        let mut events: Vec<NotificationEvent> = Vec::new();
        let mut doomed: HashSet<Uuid> = HashSet::new();

        // Cancel active appointments whose slot falls outside the new window
        // and queue those slots for deletion.
        for appointment in &appointments {
            let Some(slot_id) = appointment.slot_id else {
                continue;
            };
            let Some(slot) = slots_by_id.get(&slot_id) else {
                continue;
            };
            if outside_window(slot, &window) {
                self.cancel_appointment(
                    tx.as_mut(),
                    appointment.clone(),
                    &doctor.email,
                    "doctor session was adjusted and the appointment falls outside the new time range",
                    &mut events,
                )
                .await?;
                summary.appointments_cancelled += 1;
                doomed.insert(slot_id);
            }
        }

        // Remaining out-of-window slots go too, booked or not.
        for slot in &day_slots {
            if !doomed.contains(&slot.id) && outside_window(slot, &window) {
                doomed.insert(slot.id);
            }
        }

        for slot_id in &doomed {
            tx.delete_slot(*slot_id).await?;
            summary.slots_deleted += 1;
        }

        // Re-cut in-window stream slots whose duration no longer matches.
        // Wave slots are never split; only their capacity is adjustable.
        let mut survivors: Vec<Slot> = day_slots
            .iter()
            .filter(|slot| !doomed.contains(&slot.id))
            .cloned()
            .collect();
        survivors.sort_by_key(|slot| slot.start_time);

        let mut kept: Vec<Slot> = Vec::new();
        let mut generated: Vec<Slot> = Vec::new();

        for mut slot in survivors {
            if slot.slot_type != SlotType::Stream || slot.duration() == duration {
                kept.push(slot);
                continue;
            }

            let active = tx.count_active_by_slot(slot.id).await?;
            if active > 0 {
                // Shrink the booked slot to the new duration at its original
                // start; the freed tail becomes a new open slot.
                let shrunk_end = slot.start_time + duration;
                if shrunk_end < slot.end_time {
                    let freed = TimeRange::new(shrunk_end, slot.end_time);
                    slot.end_time = shrunk_end;
                    tx.update_slot(&slot).await?;
                    summary.slots_resized += 1;
                    generated.push(Slot::stream(request.doctor_id, freed));
                }
                kept.push(slot);
            } else {
                tx.delete_slot(slot.id).await?;
                summary.slots_deleted += 1;
                for piece in slot_plan::split_range(slot.range(), duration) {
                    generated.push(Slot::stream(request.doctor_id, piece));
                }
            }
        }

        if let Some(adjustment) = &request.capacity_adjustment {
            self.adjust_slot_capacity(
                tx.as_mut(),
                request.doctor_id,
                adjustment.slot_id,
                adjustment.new_max_capacity,
                &doctor.email,
                &mut summary,
                &mut events,
            )
            .await?;
        }

        // Everything still standing occupies its full span (a wave slot
        // regardless of booked count, a stream slot at its possibly-shrunk
        // size); the rest of the window gets fresh stream slots.
        let occupied: Vec<TimeRange> = kept
            .iter()
            .map(Slot::range)
            .chain(generated.iter().map(Slot::range))
            .collect();
        let merged = slot_plan::merge_ranges(occupied);
        for piece in slot_plan::plan_free_slots(window, &merged, duration) {
            generated.push(Slot::stream(request.doctor_id, piece));
        }

        for slot in &generated {
            tx.create_slot(slot.clone()).await?;
        }
        summary.slots_created = generated.len() as u32;

        tx.commit().await?;

        for event in events {
            if let Err(err) = self.notifier.notify(event).await {
                warn!("Notification dispatch failed: {}", err);
            }
        }

        info!(
            "Session adjusted for doctor {} on {}: {} appointments cancelled, {} slots deleted, {} created, {} resized, {} capacity-adjusted",
            request.doctor_id,
            request.date,
            summary.appointments_cancelled,
            summary.slots_deleted,
            summary.slots_created,
            summary.slots_resized,
            summary.slots_capacity_adjusted
        );

        Ok(summary)
    }

    /// Convert the target slot to wave scheduling if needed and apply the new
    /// capacity, evicting the newest bookings when the capacity drops below
    /// the current booked count.
    #[allow(clippy::too_many_arguments)]
    async fn adjust_slot_capacity(
        &self,
        tx: &mut dyn StoreTx,
        doctor_id: Uuid,
        slot_id: Uuid,
        new_max_capacity: u32,
        doctor_email: &str,
        summary: &mut SessionAdjustmentSummary,
        events: &mut Vec<NotificationEvent>,
    ) -> Result<(), DomainError> {
        let mut slot = match tx.find_slot(slot_id).await? {
            Some(slot) if slot.doctor_id == doctor_id => slot,
            _ => {
                warn!(
                    "Capacity adjustment target {} not found for doctor {}; skipping",
                    slot_id, doctor_id
                );
                return Ok(());
            }
        };

        if slot.slot_type != SlotType::Wave {
            debug!("Converting stream slot {} to wave scheduling", slot.id);
            slot.slot_type = SlotType::Wave;
            // Stream bookings never tracked a count; derive it so the wave
            // invariant holds from the moment of conversion.
            slot.booked_count = tx.count_active_by_slot(slot.id).await?;
        }

        if new_max_capacity < slot.booked_count {
            let excess = slot.booked_count - new_max_capacity;
            let victims: Vec<Appointment> = tx
                .find_active_by_slot(slot.id)
                .await?
                .into_iter()
                .take(excess as usize)
                .collect();
            debug!(
                "Evicting {} of {} active bookings from slot {}",
                victims.len(),
                slot.booked_count,
                slot.id
            );

            for victim in victims {
                self.cancel_appointment(
                    tx,
                    victim,
                    doctor_email,
                    "doctor session capacity was reduced and the appointment was affected",
                    events,
                )
                .await?;
                slot.booked_count -= 1;
                summary.appointments_cancelled += 1;
            }
        }

        slot.max_capacity = Some(new_max_capacity);
        slot.is_available = slot.booked_count < new_max_capacity;
        tx.update_slot(&slot).await?;
        summary.slots_capacity_adjusted += 1;

        Ok(())
    }

    /// Cancel in place, sever the slot link and queue the notification for
    /// dispatch after commit.
    async fn cancel_appointment(
        &self,
        tx: &mut dyn StoreTx,
        mut appointment: Appointment,
        doctor_email: &str,
        reason: &str,
        events: &mut Vec<NotificationEvent>,
    ) -> Result<(), DomainError> {
        appointment.status = AppointmentStatus::Cancelled;
        appointment.slot_id = None;
        appointment.updated_at = Utc::now();
        tx.update_appointment(&appointment).await?;

        let patient = tx.find_patient(appointment.patient_id).await?;
        events.push(NotificationEvent {
            kind: NotificationKind::Cancelled,
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            appointment_time: appointment.appointment_time,
            patient_email: patient.map(|record| record.email),
            doctor_email: Some(doctor_email.to_string()),
            reason: Some(reason.to_string()),
            old_range: None,
            new_range: None,
        });
        Ok(())
    }
}

fn outside_window(slot: &Slot, window: &TimeRange) -> bool {
    !window.encloses(&slot.range())
}
