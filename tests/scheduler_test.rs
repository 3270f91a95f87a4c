mod common;

use std::time::Duration as StdDuration;

use chrono::Duration;

use common::*;
use lesson_booking::error::AppError;
use lesson_booking::models::{
    ConfirmedLessons, LessonDay, PendingCancellations, PendingRequests, PendingReschedules,
};
use lesson_booking::services::{
    BookingService, CancellationService, Janitor, ReminderScheduler, RescheduleService,
};

async fn tuesday_lesson(h: &Harness) -> String {
    let booking = BookingService::new(h.state.clone());
    let request = booking
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Tuesday, "19:30".parse().unwrap())
        .await
        .unwrap();
    booking.approve(&request.request_id).await.unwrap();
    request.request_id
}

#[tokio::test]
async fn reminder_goes_out_once_inside_the_window() {
    let h = harness().await;
    let lesson_id = tuesday_lesson(&h).await;
    let reminders = ReminderScheduler::new(h.state.clone(), 30);
    h.chat.clear();

    let lesson_at = at("2026-03-03T19:30:00+03:00");
    let mut reminded = 0;
    for minutes_before in [70, 60, 50, 1] {
        let stats = reminders.sweep(lesson_at - Duration::minutes(minutes_before)).await.unwrap();
        reminded += stats.reminded;
        assert_eq!(stats.expired, 0);
    }
    assert_eq!(reminded, 1);

    assert_eq!(h.chat.sent_to(ANNA).len(), 1);
    assert_eq!(h.chat.sent_to(TUTOR).len(), 1);
    assert!(h.chat.sent_to(TUTOR)[0].text.contains("Anna"));

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(lessons[&lesson_id].reminder_sent);
}

#[tokio::test]
async fn started_lessons_are_removed_by_the_sweep() {
    let h = harness().await;
    let lesson_id = tuesday_lesson(&h).await;
    let reminders = ReminderScheduler::new(h.state.clone(), 30);

    let stats = reminders.sweep(at("2026-03-03T19:31:00+03:00")).await.unwrap();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.reminded, 0);

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(!lessons.contains_key(&lesson_id));
}

#[tokio::test]
async fn reminder_is_not_repeated_when_delivery_fails() {
    let h = harness().await;
    tuesday_lesson(&h).await;
    let reminders = ReminderScheduler::new(h.state.clone(), 30);

    h.chat.set_failing(true);
    let stats = reminders.sweep(at("2026-03-03T18:30:00+03:00")).await.unwrap();
    assert_eq!(stats.reminded, 1);

    h.chat.set_failing(false);
    let stats = reminders.sweep(at("2026-03-03T18:31:00+03:00")).await.unwrap();
    assert_eq!(stats.reminded, 0);
    assert!(h.chat.sent().iter().all(|m| !m.text.contains("REMINDER")));
}

#[tokio::test]
async fn janitor_drops_day_old_records_whatever_their_status() {
    let h = harness().await;
    let lesson_id = tuesday_lesson(&h).await;
    let booking = BookingService::new(h.state.clone());
    let open = booking
        .submit_request(BORIS, &profile("Boris"), "Physics", LessonDay::Monday, "19:00".parse().unwrap())
        .await
        .unwrap();
    let reschedule = RescheduleService::new(h.state.clone())
        .request_by_student(ANNA, &lesson_id, LessonDay::Saturday, "16:30".parse().unwrap())
        .await
        .unwrap();
    let cancel = CancellationService::new(h.state.clone())
        .request_cancel(ANNA, &lesson_id)
        .await
        .unwrap();

    let janitor = Janitor::new(h.state.clone(), 3600);

    let stats = janitor.sweep(at(MONDAY_MORNING) + Duration::hours(23)).await.unwrap();
    assert_eq!(stats.total(), 0);

    let stats = janitor.sweep(at(MONDAY_MORNING) + Duration::hours(25)).await.unwrap();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.reschedules, 1);
    assert_eq!(stats.cancellations, 1);

    let requests: PendingRequests = h.state.repo.read().await.unwrap();
    assert!(requests.is_empty());
    let reschedules: PendingReschedules = h.state.repo.read().await.unwrap();
    assert!(reschedules.is_empty());
    let cancels: PendingCancellations = h.state.repo.read().await.unwrap();
    assert!(cancels.is_empty());

    assert!(matches!(booking.approve(&open.request_id).await, Err(AppError::NotFound)));
    assert!(matches!(
        RescheduleService::new(h.state.clone())
            .approve_reschedule(&reschedule.reschedule_id)
            .await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        CancellationService::new(h.state.clone())
            .approve_cancel(&cancel.cancel_id)
            .await,
        Err(AppError::NotFound)
    ));

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(lessons.contains_key(&lesson_id));
}

#[tokio::test]
async fn reminder_scheduler_runs_on_its_interval() {
    let h = harness().await;
    tuesday_lesson(&h).await;
    h.clock.set(at("2026-03-03T18:30:00+03:00"));
    h.chat.clear();

    // The first tick fires immediately; the next one is a minute away.
    let handle = tokio::spawn(ReminderScheduler::new(h.state.clone(), 60).start());
    tokio::time::sleep(StdDuration::from_millis(500)).await;
    handle.abort();

    assert_eq!(h.chat.sent_to(ANNA).len(), 1);
    assert_eq!(h.chat.sent_to(TUTOR).len(), 1);
}

#[tokio::test]
async fn janitor_runs_on_its_interval() {
    let h = harness().await;
    BookingService::new(h.state.clone())
        .submit_request(ANNA, &profile("Anna"), "Physics", LessonDay::Monday, "19:00".parse().unwrap())
        .await
        .unwrap();
    h.clock.advance(Duration::hours(30));

    let handle = tokio::spawn(Janitor::new(h.state.clone(), 60).start());
    tokio::time::sleep(StdDuration::from_millis(500)).await;
    handle.abort();

    let requests: PendingRequests = h.state.repo.read().await.unwrap();
    assert!(requests.is_empty());
}
