// libs/scheduling-cell/tests/booking_test.rs
use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use notification_cell::{MemoryGateway, NotificationKind};
use scheduling_cell::models::{
    ActorRole, AppointmentStatus, BookSlotRequest, DoctorRecord, PatientRecord, Slot,
};
use scheduling_cell::services::BookingEngine;
use scheduling_cell::store::InMemorySchedulingStore;
use shared_models::{DomainError, TimeRange};

struct TestSetup {
    store: Arc<InMemorySchedulingStore>,
    gateway: Arc<MemoryGateway>,
    engine: Arc<BookingEngine>,
    doctor_id: Uuid,
    patient_id: Uuid,
}

impl TestSetup {
    async fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let store = Arc::new(InMemorySchedulingStore::new());
        let gateway = Arc::new(MemoryGateway::new());
        let engine = Arc::new(BookingEngine::new(store.clone(), gateway.clone()));

        let doctor_id = Uuid::new_v4();
        let patient_id = Uuid::new_v4();
        store
            .register_doctor(DoctorRecord {
                id: doctor_id,
                full_name: "Dr. Jane Smith".to_string(),
                email: "jane.smith@clinic.test".to_string(),
            })
            .await;
        store
            .register_patient(PatientRecord {
                id: patient_id,
                full_name: "John Doe".to_string(),
                email: "john.doe@test.com".to_string(),
            })
            .await;

        Self {
            store,
            gateway,
            engine,
            doctor_id,
            patient_id,
        }
    }

    async fn register_patient(&self, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .register_patient(PatientRecord {
                id,
                full_name: "Test Patient".to_string(),
                email: email.to_string(),
            })
            .await;
        id
    }

    async fn seed_stream_slot(&self, offset_minutes: i64, length_minutes: i64) -> Slot {
        let start = Utc::now() + Duration::days(7) + Duration::minutes(offset_minutes);
        let slot = Slot::stream(
            self.doctor_id,
            TimeRange::new(start, start + Duration::minutes(length_minutes)),
        );
        self.store.seed_slot(slot.clone()).await;
        slot
    }

    async fn seed_wave_slot(&self, length_minutes: i64, max_capacity: u32) -> Slot {
        let start = Utc::now() + Duration::days(7);
        let slot = Slot::wave(
            self.doctor_id,
            TimeRange::new(start, start + Duration::minutes(length_minutes)),
            max_capacity,
        );
        self.store.seed_slot(slot.clone()).await;
        slot
    }

    fn book_request(&self, slot_id: Uuid) -> BookSlotRequest {
        BookSlotRequest {
            slot_id,
            patient_id: self.patient_id,
            notes: None,
            expected_check_in_time: None,
        }
    }
}

#[tokio::test]
async fn booking_a_stream_slot_creates_pending_appointment() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_stream_slot(0, 15).await;

    let confirmation = setup
        .engine
        .book_slot(setup.book_request(slot.id))
        .await
        .unwrap();

    assert_eq!(confirmation.status, AppointmentStatus::Pending);

    let stored_slot = setup.store.slot(slot.id).await.unwrap();
    assert!(!stored_slot.is_available);

    let appointment = setup
        .store
        .appointment(confirmation.appointment_id)
        .await
        .unwrap();
    assert_eq!(appointment.slot_id, Some(slot.id));
    assert_eq!(appointment.appointment_time, slot.start_time);
    assert_eq!(appointment.patient_id, setup.patient_id);

    let events = setup.gateway.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, NotificationKind::Booked);
    assert_eq!(events[0].patient_email.as_deref(), Some("john.doe@test.com"));
}

#[tokio::test]
async fn booking_an_unknown_slot_is_not_found() {
    let setup = TestSetup::new().await;

    let result = setup.engine.book_slot(setup.book_request(Uuid::new_v4())).await;
    assert_matches!(result, Err(DomainError::NotFound(_)));
}

#[tokio::test]
async fn booking_a_past_slot_is_rejected() {
    let setup = TestSetup::new().await;
    let start = Utc::now() - Duration::hours(1);
    let slot = Slot::stream(
        setup.doctor_id,
        TimeRange::new(start, start + Duration::minutes(15)),
    );
    setup.store.seed_slot(slot.clone()).await;

    let result = setup.engine.book_slot(setup.book_request(slot.id)).await;
    assert_matches!(result, Err(DomainError::InvalidInput(_)));
}

#[tokio::test]
async fn booking_without_patient_profile_is_not_found() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_stream_slot(0, 15).await;

    let request = BookSlotRequest {
        slot_id: slot.id,
        patient_id: Uuid::new_v4(),
        notes: None,
        expected_check_in_time: None,
    };
    let result = setup.engine.book_slot(request).await;
    assert_matches!(result, Err(DomainError::NotFound(_)));

    // The failed booking must not consume the slot.
    assert!(setup.store.slot(slot.id).await.unwrap().is_available);
}

#[tokio::test]
async fn double_booking_a_stream_slot_conflicts() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_stream_slot(0, 15).await;

    setup
        .engine
        .book_slot(setup.book_request(slot.id))
        .await
        .unwrap();
    let second = setup.engine.book_slot(setup.book_request(slot.id)).await;

    assert_matches!(second, Err(DomainError::Conflict(_)));
}

#[tokio::test]
async fn concurrent_stream_bookings_admit_exactly_one() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_stream_slot(0, 15).await;
    let rival = setup.register_patient("rival@test.com").await;

    let first = {
        let engine = setup.engine.clone();
        let request = setup.book_request(slot.id);
        tokio::spawn(async move { engine.book_slot(request).await })
    };
    let second = {
        let engine = setup.engine.clone();
        let request = BookSlotRequest {
            slot_id: slot.id,
            patient_id: rival,
            notes: None,
            expected_check_in_time: None,
        };
        tokio::spawn(async move { engine.book_slot(request).await })
    };

    let results: Vec<_> = futures::future::join_all([first, second])
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Err(DomainError::Conflict(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
}

#[tokio::test]
async fn wave_slot_admits_up_to_capacity() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_wave_slot(60, 3).await;

    for index in 0..3 {
        let patient = setup
            .register_patient(&format!("patient{}@test.com", index))
            .await;
        let request = BookSlotRequest {
            slot_id: slot.id,
            patient_id: patient,
            notes: None,
            expected_check_in_time: Some(slot.start_time + Duration::minutes(index * 10)),
        };
        setup.engine.book_slot(request).await.unwrap();
    }

    let fourth = setup.engine.book_slot(setup.book_request(slot.id)).await;
    assert_matches!(fourth, Err(DomainError::Conflict(_)));

    let stored = setup.store.slot(slot.id).await.unwrap();
    assert_eq!(stored.booked_count, 3);
}

#[tokio::test]
async fn wave_slot_without_capacity_conflicts() {
    let setup = TestSetup::new().await;
    let mut slot = setup.seed_wave_slot(60, 1).await;
    slot.max_capacity = None;
    setup.store.seed_slot(slot.clone()).await;

    let result = setup.engine.book_slot(setup.book_request(slot.id)).await;
    assert_matches!(result, Err(DomainError::Conflict(_)));
}

#[tokio::test]
async fn patient_cancellation_frees_the_stream_slot() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_stream_slot(0, 15).await;

    let confirmation = setup
        .engine
        .book_slot(setup.book_request(slot.id))
        .await
        .unwrap();
    setup
        .engine
        .cancel_appointment(confirmation.appointment_id, setup.patient_id, ActorRole::Patient)
        .await
        .unwrap();

    let appointment = setup
        .store
        .appointment(confirmation.appointment_id)
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert!(setup.store.slot(slot.id).await.unwrap().is_available);

    // The freed slot is immediately bookable again.
    setup
        .engine
        .book_slot(setup.book_request(slot.id))
        .await
        .unwrap();
}

#[tokio::test]
async fn doctor_may_cancel_own_appointment() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_wave_slot(60, 2).await;

    let confirmation = setup
        .engine
        .book_slot(setup.book_request(slot.id))
        .await
        .unwrap();
    setup
        .engine
        .cancel_appointment(confirmation.appointment_id, setup.doctor_id, ActorRole::Doctor)
        .await
        .unwrap();

    let stored = setup.store.slot(slot.id).await.unwrap();
    assert_eq!(stored.booked_count, 0);
}

#[tokio::test]
async fn foreign_actor_cannot_cancel() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_stream_slot(0, 15).await;
    let confirmation = setup
        .engine
        .book_slot(setup.book_request(slot.id))
        .await
        .unwrap();

    let stranger = Uuid::new_v4();
    for role in [ActorRole::Patient, ActorRole::Doctor] {
        let result = setup
            .engine
            .cancel_appointment(confirmation.appointment_id, stranger, role)
            .await;
        assert_matches!(result, Err(DomainError::Forbidden(_)));
    }
}

#[tokio::test]
async fn cancelling_twice_is_rejected() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_stream_slot(0, 15).await;
    let confirmation = setup
        .engine
        .book_slot(setup.book_request(slot.id))
        .await
        .unwrap();

    setup
        .engine
        .cancel_appointment(confirmation.appointment_id, setup.patient_id, ActorRole::Patient)
        .await
        .unwrap();
    let again = setup
        .engine
        .cancel_appointment(confirmation.appointment_id, setup.patient_id, ActorRole::Patient)
        .await;

    assert_matches!(again, Err(DomainError::InvalidInput(_)));
}

#[tokio::test]
async fn reschedule_moves_capacity_between_slots() {
    let setup = TestSetup::new().await;
    let old_slot = setup.seed_stream_slot(0, 15).await;
    let new_slot = setup.seed_stream_slot(30, 15).await;

    let confirmation = setup
        .engine
        .book_slot(setup.book_request(old_slot.id))
        .await
        .unwrap();
    setup
        .engine
        .reschedule_appointment(confirmation.appointment_id, new_slot.id, setup.patient_id)
        .await
        .unwrap();

    let appointment = setup
        .store
        .appointment(confirmation.appointment_id)
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Rescheduled);
    assert_eq!(appointment.slot_id, Some(new_slot.id));
    assert_eq!(appointment.appointment_time, new_slot.start_time);

    assert!(setup.store.slot(old_slot.id).await.unwrap().is_available);
    assert!(!setup.store.slot(new_slot.id).await.unwrap().is_available);

    let events = setup.gateway.events().await;
    let rescheduled = events
        .iter()
        .find(|event| event.kind == NotificationKind::Rescheduled)
        .expect("rescheduled event");
    assert_eq!(rescheduled.old_range, Some(old_slot.range()));
    assert_eq!(rescheduled.new_range, Some(new_slot.range()));
}

#[tokio::test]
async fn reschedule_requires_ownership() {
    let setup = TestSetup::new().await;
    let old_slot = setup.seed_stream_slot(0, 15).await;
    let new_slot = setup.seed_stream_slot(30, 15).await;
    let confirmation = setup
        .engine
        .book_slot(setup.book_request(old_slot.id))
        .await
        .unwrap();

    let result = setup
        .engine
        .reschedule_appointment(confirmation.appointment_id, new_slot.id, Uuid::new_v4())
        .await;
    assert_matches!(result, Err(DomainError::Forbidden(_)));
}

#[tokio::test]
async fn reschedule_of_terminal_appointment_is_rejected() {
    let setup = TestSetup::new().await;
    let old_slot = setup.seed_stream_slot(0, 15).await;
    let new_slot = setup.seed_stream_slot(30, 15).await;
    let confirmation = setup
        .engine
        .book_slot(setup.book_request(old_slot.id))
        .await
        .unwrap();
    setup
        .engine
        .cancel_appointment(confirmation.appointment_id, setup.patient_id, ActorRole::Patient)
        .await
        .unwrap();

    let result = setup
        .engine
        .reschedule_appointment(confirmation.appointment_id, new_slot.id, setup.patient_id)
        .await;
    assert_matches!(result, Err(DomainError::InvalidInput(_)));
}

#[tokio::test]
async fn reschedule_into_full_wave_slot_conflicts() {
    let setup = TestSetup::new().await;
    let old_slot = setup.seed_stream_slot(0, 15).await;
    let wave = setup.seed_wave_slot(60, 1).await;

    let rival = setup.register_patient("rival@test.com").await;
    setup
        .engine
        .book_slot(BookSlotRequest {
            slot_id: wave.id,
            patient_id: rival,
            notes: None,
            expected_check_in_time: None,
        })
        .await
        .unwrap();

    let confirmation = setup
        .engine
        .book_slot(setup.book_request(old_slot.id))
        .await
        .unwrap();
    let result = setup
        .engine
        .reschedule_appointment(confirmation.appointment_id, wave.id, setup.patient_id)
        .await;

    assert_matches!(result, Err(DomainError::Conflict(_)));
    // The old booking is untouched by the failed reschedule.
    assert!(!setup.store.slot(old_slot.id).await.unwrap().is_available);
}

#[tokio::test]
async fn reschedule_survives_a_vanished_old_slot() {
    let setup = TestSetup::new().await;
    let old_slot = setup.seed_stream_slot(0, 15).await;
    let new_slot = setup.seed_stream_slot(30, 15).await;
    let confirmation = setup
        .engine
        .book_slot(setup.book_request(old_slot.id))
        .await
        .unwrap();

    // Simulate a session adjustment having deleted the old slot.
    {
        use scheduling_cell::store::{SchedulingStore, StoreTx};
        let mut tx = setup.store.begin().await.unwrap();
        tx.delete_slot(old_slot.id).await.unwrap();
        tx.commit().await.unwrap();
    }

    setup
        .engine
        .reschedule_appointment(confirmation.appointment_id, new_slot.id, setup.patient_id)
        .await
        .unwrap();

    let appointment = setup
        .store
        .appointment(confirmation.appointment_id)
        .await
        .unwrap();
    assert_eq!(appointment.slot_id, Some(new_slot.id));
    assert!(!setup.store.slot(new_slot.id).await.unwrap().is_available);
}

#[tokio::test]
async fn wave_booked_count_tracks_active_appointments() {
    let setup = TestSetup::new().await;
    let slot = setup.seed_wave_slot(60, 5).await;

    let first = setup
        .engine
        .book_slot(setup.book_request(slot.id))
        .await
        .unwrap();
    let rival = setup.register_patient("rival@test.com").await;
    setup
        .engine
        .book_slot(BookSlotRequest {
            slot_id: slot.id,
            patient_id: rival,
            notes: None,
            expected_check_in_time: None,
        })
        .await
        .unwrap();
    assert_eq!(setup.store.slot(slot.id).await.unwrap().booked_count, 2);

    setup
        .engine
        .cancel_appointment(first.appointment_id, setup.patient_id, ActorRole::Patient)
        .await
        .unwrap();
    assert_eq!(setup.store.slot(slot.id).await.unwrap().booked_count, 1);
}
