// libs/scheduling-cell/src/services/catalog.rs
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_models::{DomainError, TimeRange};

use crate::models::{AddSlotRequest, Slot, SlotType, UpdateSlotRequest};
use crate::store::{SchedulingStore, StoreTx};

/// Direct management of a doctor's slot inventory, used by the doctor-facing
/// surface. Bulk re-derivation of a whole day goes through the session
/// adjustment planner instead.
pub struct SlotCatalogService {
    store: Arc<dyn SchedulingStore>,
}

impl SlotCatalogService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn list_slots(&self, doctor_id: Uuid) -> Result<Vec<Slot>, DomainError> {
        debug!("Fetching slots for doctor {}", doctor_id);

        let mut tx = self.store.begin().await?;
        tx.find_doctor(doctor_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("doctor not found".to_string()))?;

        let slots = tx
            .find_slots_by_doctor_and_range(doctor_id, all_time())
            .await?;
        tx.commit().await?;
        Ok(slots)
    }

    pub async fn add_slot(
        &self,
        doctor_id: Uuid,
        request: AddSlotRequest,
    ) -> Result<Slot, DomainError> {
        debug!(
            "Adding slot for doctor {}: {} - {}",
            doctor_id, request.start_time, request.end_time
        );

        if request.end_time <= request.start_time {
            return Err(DomainError::InvalidInput(
                "end_time must be after start_time".to_string(),
            ));
        }
        if request.start_time < Utc::now() {
            return Err(DomainError::InvalidInput(
                "cannot add slots in the past".to_string(),
            ));
        }

        let range = TimeRange::new(request.start_time, request.end_time);
        let slot = match request.slot_type.unwrap_or(SlotType::Stream) {
            SlotType::Wave => {
                let capacity = request.max_capacity.filter(|cap| *cap > 0).ok_or_else(|| {
                    DomainError::InvalidInput(
                        "max_capacity is required and must be positive for wave slots".to_string(),
                    )
                })?;
                Slot::wave(doctor_id, range, capacity)
            }
            SlotType::Stream => Slot::stream(doctor_id, range),
        };

        let mut tx = self.store.begin().await?;
        tx.find_doctor(doctor_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("doctor not found".to_string()))?;
        tx.create_slot(slot.clone()).await?;
        tx.commit().await?;

        Ok(slot)
    }

    pub async fn update_slot(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        request: UpdateSlotRequest,
    ) -> Result<Slot, DomainError> {
        debug!("Updating slot {} for doctor {}", slot_id, doctor_id);

        let mut tx = self.store.begin().await?;
        let mut slot = match tx.find_slot(slot_id).await? {
            Some(slot) if slot.doctor_id == doctor_id => slot,
            _ => {
                return Err(DomainError::NotFound(
                    "availability slot not found or does not belong to this doctor".to_string(),
                ))
            }
        };

        let active = tx.count_active_by_slot(slot.id).await?;
        if active > 0 && (request.slot_type.is_some() || request.max_capacity.is_some()) {
            return Err(DomainError::InvalidInput(
                "cannot change slot type or capacity for a slot with active appointments"
                    .to_string(),
            ));
        }

        if let Some(start_time) = request.start_time {
            slot.start_time = start_time;
        }
        if let Some(end_time) = request.end_time {
            slot.end_time = end_time;
        }
        if slot.end_time <= slot.start_time {
            return Err(DomainError::InvalidInput(
                "end_time must be after start_time".to_string(),
            ));
        }
        if let Some(is_available) = request.is_available {
            slot.is_available = is_available;
        }
        if let Some(slot_type) = request.slot_type {
            slot.slot_type = slot_type;
        }

        match slot.slot_type {
            SlotType::Wave => {
                if let Some(capacity) = request.max_capacity {
                    if capacity == 0 {
                        return Err(DomainError::InvalidInput(
                            "max_capacity must be positive for wave slots".to_string(),
                        ));
                    }
                    slot.max_capacity = Some(capacity);
                }
                match slot.max_capacity {
                    None => {
                        return Err(DomainError::InvalidInput(
                            "max_capacity is required for wave slots".to_string(),
                        ))
                    }
                    Some(capacity) if slot.booked_count > capacity => {
                        return Err(DomainError::InvalidInput(format!(
                            "cannot reduce max_capacity below current booked count ({})",
                            slot.booked_count
                        )))
                    }
                    Some(_) => {}
                }
            }
            SlotType::Stream => {
                slot.max_capacity = None;
            }
        }

        tx.update_slot(&slot).await?;
        tx.commit().await?;
        Ok(slot)
    }

    pub async fn remove_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<(), DomainError> {
        debug!("Removing slot {} for doctor {}", slot_id, doctor_id);

        let mut tx = self.store.begin().await?;
        let slot = match tx.find_slot(slot_id).await? {
            Some(slot) if slot.doctor_id == doctor_id => slot,
            _ => {
                return Err(DomainError::NotFound(
                    "availability slot not found or does not belong to this doctor".to_string(),
                ))
            }
        };

        let active = tx.count_active_by_slot(slot.id).await?;
        if active > 0 {
            return Err(DomainError::InvalidInput(
                "cannot delete a slot with active appointments; cancel them first".to_string(),
            ));
        }

        tx.delete_slot(slot.id).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn all_time() -> TimeRange {
    TimeRange::new(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
}
