mod common;

use chrono::Duration;

use common::*;
use lesson_booking::chat::Action;
use lesson_booking::error::AppError;
use lesson_booking::models::{
    ConfirmedLessons, DaySchedule, LessonDay, PendingRequests, RequestStatus, SlotTime,
};
use lesson_booking::services::{Availability, BookingService, TemplateService};

fn slot(s: &str) -> SlotTime {
    s.parse().unwrap()
}

#[tokio::test]
async fn approved_request_takes_the_slot_but_not_the_template() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());
    let availability = Availability::new(h.state.clone());

    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Tuesday, slot("19:30"))
        .await
        .expect("request should be filed");
    assert_eq!(request.target_datetime, at("2026-03-03T19:30:00+03:00"));

    let tutor_msg = h.chat.last_to(TUTOR).expect("tutor notified");
    assert!(tutor_msg.text.contains("Anna"));
    assert!(tutor_msg
        .choices
        .iter()
        .any(|c| c.action == Action::ApproveRequest(request.request_id.clone())));

    // Pending requests do not hold the slot.
    assert!(availability.slots(LessonDay::Tuesday).await.unwrap().contains(&slot("19:30")));

    let lesson = booking.approve(&request.request_id).await.expect("approve");
    assert_eq!(lesson.lesson_id, request.request_id);
    assert!(!lesson.reminder_sent);

    let free = availability.slots(LessonDay::Tuesday).await.unwrap();
    assert_eq!(free, vec![slot("20:30")]);

    let template = TemplateService::new(h.state.clone()).current().await.unwrap();
    assert!(template.offers(LessonDay::Tuesday, slot("19:30")));

    let requests: PendingRequests = h.state.repo.read().await.unwrap();
    assert_eq!(requests[&request.request_id].status, RequestStatus::Confirmed);
    assert!(h.chat.last_to(ANNA).unwrap().text.contains("CONFIRMED"));
}

#[tokio::test]
async fn a_request_is_decided_only_once() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());

    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Monday, slot("18:00"))
        .await
        .unwrap();
    booking.approve(&request.request_id).await.unwrap();

    assert!(matches!(booking.approve(&request.request_id).await, Err(AppError::NotFound)));
    assert!(matches!(booking.reject(&request.request_id).await, Err(AppError::NotFound)));

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert_eq!(lessons.len(), 1);
}

#[tokio::test]
async fn rejected_request_leaves_no_lesson() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());

    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Chemistry", LessonDay::Saturday, slot("16:30"))
        .await
        .unwrap();
    booking.reject(&request.request_id).await.unwrap();

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(lessons.is_empty());
    assert!(h.chat.last_to(ANNA).unwrap().text.contains("cannot take place"));
    assert!(matches!(booking.approve(&request.request_id).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn second_approval_for_the_same_slot_is_refused() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());

    let first = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Tuesday, slot("19:30"))
        .await
        .unwrap();
    let second = booking
        .submit_request(BORIS, &profile("Boris"), "Mathematics", LessonDay::Tuesday, slot("19:30"))
        .await
        .unwrap();

    booking.approve(&first.request_id).await.unwrap();
    let result = booking.approve(&second.request_id).await;
    assert!(matches!(result, Err(AppError::SlotTaken)));

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert_eq!(lessons.len(), 1);
    assert!(lessons.contains_key(&first.request_id));

    let requests: PendingRequests = h.state.repo.read().await.unwrap();
    assert_eq!(requests[&second.request_id].status, RequestStatus::Rejected);
    assert!(h.chat.last_to(BORIS).unwrap().text.contains("no longer free"));
}

#[tokio::test]
async fn concurrent_approvals_confirm_exactly_one() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());

    let mut ids = Vec::new();
    for student in 1..=4 {
        let request = booking
            .submit_request(student, &profile("Student"), "Physics", LessonDay::Monday, slot("19:00"))
            .await
            .unwrap();
        ids.push(request.request_id);
    }

    let mut handles = Vec::new();
    for id in ids {
        let service = BookingService::new(h.state.clone());
        handles.push(tokio::spawn(async move { service.approve(&id).await }));
    }
    let mut confirmed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            confirmed += 1;
        }
    }
    assert_eq!(confirmed, 1);

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert_eq!(lessons.len(), 1);
}

#[tokio::test]
async fn booking_an_occupied_or_unknown_slot_fails() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());

    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Monday, slot("18:00"))
        .await
        .unwrap();
    booking.approve(&request.request_id).await.unwrap();

    let taken = booking
        .submit_request(BORIS, &profile("Boris"), "Physics", LessonDay::Monday, slot("18:00"))
        .await;
    assert!(matches!(taken, Err(AppError::SlotTaken)));

    let off_template = booking
        .submit_request(BORIS, &profile("Boris"), "Physics", LessonDay::Monday, slot("12:00"))
        .await;
    assert!(matches!(off_template, Err(AppError::Validation(_))));

    let bad_subject = booking
        .submit_request(BORIS, &profile("Boris"), "Latin", LessonDay::Monday, slot("19:00"))
        .await;
    assert!(matches!(bad_subject, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn slots_earlier_in_the_week_cannot_be_booked() {
    let h = harness().await;
    h.clock.set(at("2026-03-03T20:00:00+03:00"));
    let booking = BookingService::new(h.state.clone());

    let past = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Monday, slot("18:00"))
        .await;
    assert!(matches!(past, Err(AppError::Validation(_))));

    let overview = Availability::new(h.state.clone()).week_overview().await.unwrap();
    let tuesday = overview.iter().find(|d| d.day == LessonDay::Tuesday).unwrap();
    assert_eq!(tuesday.slots, vec![slot("20:30")]);
    let monday = overview.iter().find(|d| d.day == LessonDay::Monday).unwrap();
    assert!(monday.slots.is_empty());
}

#[tokio::test]
async fn closing_a_day_hides_slots_but_keeps_lessons() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());
    let templates = TemplateService::new(h.state.clone());
    let availability = Availability::new(h.state.clone());

    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Thursday, slot("18:15"))
        .await
        .unwrap();
    booking.approve(&request.request_id).await.unwrap();

    assert!(matches!(
        templates.close_day(ANNA, LessonDay::Thursday).await,
        Err(AppError::Forbidden)
    ));
    let template = templates.close_day(TUTOR, LessonDay::Thursday).await.unwrap();
    assert_eq!(template.day(LessonDay::Thursday), Some(&DaySchedule::NoLessons));

    assert!(availability.slots(LessonDay::Thursday).await.unwrap().is_empty());
    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(lessons.contains_key(&request.request_id));

    let closed = booking
        .submit_request(BORIS, &profile("Boris"), "Physics", LessonDay::Thursday, slot("19:15"))
        .await;
    assert!(matches!(closed, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn template_replacement_requires_every_day() {
    let h = harness().await;
    let templates = TemplateService::new(h.state.clone());

    let partial = r#"{"Monday": ["18:00"]}"#;
    assert!(matches!(templates.replace(TUTOR, partial).await, Err(AppError::Validation(_))));

    let full = r#"{
        "Monday": ["17:00", "18:00"],
        "Tuesday": [],
        "Wednesday": "no lessons",
        "Thursday": ["18:15"],
        "Friday": ["15:00"],
        "Saturday": []
    }"#;
    assert!(matches!(templates.replace(ANNA, full).await, Err(AppError::Forbidden)));
    templates.replace(TUTOR, full).await.unwrap();

    let free = Availability::new(h.state.clone())
        .slots(LessonDay::Friday)
        .await
        .unwrap();
    assert_eq!(free, vec![slot("15:00")]);
    assert!(templates.current().await.unwrap().is_closed(LessonDay::Wednesday));
}

#[tokio::test]
async fn failed_notifications_do_not_undo_a_booking() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());
    h.chat.set_failing(true);

    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Monday, slot("20:00"))
        .await
        .expect("filing survives a dead transport");
    booking.approve(&request.request_id).await.expect("approval survives a dead transport");

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(lessons.contains_key(&request.request_id));
    assert!(h.chat.sent().is_empty());

    h.clock.advance(Duration::hours(1));
    h.chat.set_failing(false);
    let again = booking
        .submit_request(BORIS, &profile("Boris"), "Physics", LessonDay::Monday, slot("20:00"))
        .await;
    assert!(matches!(again, Err(AppError::SlotTaken)));
}

#[tokio::test]
async fn wednesday_marked_no_lessons_keeps_its_booked_lesson() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());
    let templates = TemplateService::new(h.state.clone());
    let availability = Availability::new(h.state.clone());

    templates
        .set_day(TUTOR, LessonDay::Wednesday, DaySchedule::slots(vec![slot("17:00"), slot("18:00")]))
        .await
        .unwrap();
    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Wednesday, slot("17:00"))
        .await
        .unwrap();
    booking.approve(&request.request_id).await.unwrap();
    assert_eq!(availability.slots(LessonDay::Wednesday).await.unwrap(), vec![slot("18:00")]);

    templates.close_day(TUTOR, LessonDay::Wednesday).await.unwrap();

    assert!(availability.slots(LessonDay::Wednesday).await.unwrap().is_empty());
    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert_eq!(
        lessons[&request.request_id].lesson_datetime,
        at("2026-03-04T17:00:00+03:00")
    );
}

#[tokio::test]
async fn approving_after_the_lesson_time_is_refused() {
    let h = harness().await;
    let booking = BookingService::new(h.state.clone());

    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Monday, slot("18:00"))
        .await
        .unwrap();
    h.clock.set(at("2026-03-02T18:30:00+03:00"));

    let result = booking.approve(&request.request_id).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(lessons.is_empty());
    let requests: PendingRequests = h.state.repo.read().await.unwrap();
    assert_eq!(requests[&request.request_id].status, RequestStatus::Rejected);

    let notice = h.chat.last_to(ANNA).unwrap();
    assert!(notice.text.contains("already passed"));
    assert!(!notice.text.contains("CONFIRMED"));
}
