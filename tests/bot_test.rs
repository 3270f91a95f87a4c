mod common;

use common::*;
use lesson_booking::bot::{Bot, DialogState, Inbound};
use lesson_booking::chat::{Action, Outgoing};
use lesson_booking::models::{ConfirmedLessons, LessonDay, PendingRequests};

fn find_action(message: &Outgoing, wanted: impl Fn(&Action) -> bool) -> Action {
    message
        .choices
        .iter()
        .map(|c| c.action.clone())
        .find(|a| wanted(a))
        .expect("choice offered")
}

async fn walk_to_slot_picker(bot: &Bot, user: i64, name: &str) {
    bot.handle(Inbound::text(user, "/start")).await.unwrap();
    bot.handle(Inbound::selected(user, Action::FirstLesson)).await.unwrap();
    bot.handle(Inbound::text(user, name)).await.unwrap();
    bot.handle(Inbound::text(user, "9")).await.unwrap();
    bot.handle(Inbound::selected(user, Action::ToggleSubject("Physics".to_string())))
        .await
        .unwrap();
    bot.handle(Inbound::selected(user, Action::SubjectsDone)).await.unwrap();
}

#[tokio::test]
async fn first_lesson_dialog_ends_in_a_confirmed_lesson() {
    let h = harness().await;
    let bot = Bot::new(h.state.clone());

    bot.handle(Inbound::text(ANNA, "/start")).await.unwrap();
    let menu = h.chat.last_to(ANNA).unwrap();
    assert!(menu.choices.iter().any(|c| c.action == Action::FirstLesson));
    assert!(!menu.choices.iter().any(|c| c.action == Action::EditSchedule));

    walk_to_slot_picker(&bot, ANNA, "Anna").await;
    assert!(matches!(bot.dialog(ANNA), DialogState::ChoosingSlot { .. }));

    let picker = h.chat.last_to(ANNA).unwrap();
    let slot = find_action(&picker, |a| {
        matches!(a, Action::PickSlot(LessonDay::Tuesday, t) if t.to_string() == "19:30")
    });
    bot.handle(Inbound::selected(ANNA, slot)).await.unwrap();
    assert_eq!(bot.dialog(ANNA), DialogState::Idle);
    assert!(h.chat.last_to(ANNA).unwrap().text.contains("Waiting for the tutor"));

    let request = h.chat.last_to(TUTOR).unwrap();
    let approve = find_action(&request, |a| matches!(a, Action::ApproveRequest(_)));

    // A student cannot approve their own request.
    bot.handle(Inbound::selected(ANNA, approve.clone())).await.unwrap();
    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(lessons.is_empty());

    bot.handle(Inbound::selected(TUTOR, approve.clone())).await.unwrap();
    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert_eq!(lessons.len(), 1);
    assert!(h.chat.last_to(ANNA).unwrap().text.contains("CONFIRMED"));

    // Pressing the stale button again is harmless.
    bot.handle(Inbound::selected(TUTOR, approve)).await.unwrap();
    assert!(h.chat.last_to(TUTOR).unwrap().text.contains("already been handled"));
}

#[tokio::test]
async fn taken_slot_keeps_the_student_on_the_picker() {
    let h = harness().await;
    let bot = Bot::new(h.state.clone());

    walk_to_slot_picker(&bot, ANNA, "Anna").await;
    walk_to_slot_picker(&bot, BORIS, "Boris").await;

    let slot = Action::PickSlot(LessonDay::Monday, "18:00".parse().unwrap());
    bot.handle(Inbound::selected(ANNA, slot.clone())).await.unwrap();
    let approve = find_action(&h.chat.last_to(TUTOR).unwrap(), |a| {
        matches!(a, Action::ApproveRequest(_))
    });
    bot.handle(Inbound::selected(TUTOR, approve)).await.unwrap();

    h.chat.clear();
    bot.handle(Inbound::selected(BORIS, slot)).await.unwrap();
    assert!(matches!(bot.dialog(BORIS), DialogState::ChoosingSlot { .. }));

    let sent = h.chat.sent_to(BORIS);
    assert!(sent[0].text.contains("just been taken"));
    let repicker = sent.last().unwrap();
    assert!(!repicker
        .choices
        .iter()
        .any(|c| matches!(&c.action, Action::PickSlot(LessonDay::Monday, t) if t.to_string() == "18:00")));

    let requests: PendingRequests = h.state.repo.read().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn repeat_lesson_without_history_offers_registration() {
    let h = harness().await;
    let bot = Bot::new(h.state.clone());

    bot.handle(Inbound::selected(ANNA, Action::RepeatLesson)).await.unwrap();
    assert_eq!(bot.dialog(ANNA), DialogState::Idle);

    let offer = h.chat.last_to(ANNA).unwrap();
    assert!(offer.choices.iter().any(|c| c.action == Action::FirstLesson));
}

#[tokio::test]
async fn repeat_lesson_uses_the_stored_profile() {
    let h = harness().await;
    let bot = Bot::new(h.state.clone());
    walk_to_slot_picker(&bot, ANNA, "Anna").await;
    bot.handle(Inbound::text(ANNA, "/menu")).await.unwrap();

    bot.handle(Inbound::selected(ANNA, Action::RepeatLesson)).await.unwrap();
    match bot.dialog(ANNA) {
        DialogState::ChoosingSubjects { profile, selected } => {
            assert_eq!(profile.name, "Anna");
            assert!(selected.is_empty());
        }
        other => panic!("unexpected dialog {:?}", other),
    }
}

#[tokio::test]
async fn tutor_edits_the_template_through_the_dialog() {
    let h = harness().await;
    let bot = Bot::new(h.state.clone());

    bot.handle(Inbound::text(TUTOR, "/menu")).await.unwrap();
    let menu = h.chat.last_to(TUTOR).unwrap();
    assert!(menu.choices.iter().any(|c| c.action == Action::EditSchedule));

    bot.handle(Inbound::selected(TUTOR, Action::EditSchedule)).await.unwrap();
    assert_eq!(bot.dialog(TUTOR), DialogState::AwaitingTemplate);

    bot.handle(Inbound::text(TUTOR, "{\"Monday\": [\"18:00\"]}")).await.unwrap();
    assert_eq!(bot.dialog(TUTOR), DialogState::AwaitingTemplate);
    assert!(h.chat.last_to(TUTOR).unwrap().text.contains("missing"));

    let json = r#"{"Monday": ["17:00"], "Tuesday": [], "Wednesday": "no lessons",
                   "Thursday": [], "Friday": [], "Saturday": []}"#;
    bot.handle(Inbound::text(TUTOR, json)).await.unwrap();
    assert_eq!(bot.dialog(TUTOR), DialogState::Idle);
    assert!(h.chat.last_to(TUTOR).unwrap().text.contains("Schedule updated"));

    bot.handle(Inbound::text(ANNA, "/close monday")).await.unwrap();
    assert!(h.chat.last_to(ANNA).unwrap().text.contains("only available to the tutor"));

    bot.handle(Inbound::text(TUTOR, "/close monday")).await.unwrap();
    let template: lesson_booking::models::ScheduleTemplate = h.state.repo.read().await.unwrap();
    assert!(template.is_closed(LessonDay::Monday));
}

#[tokio::test]
async fn cancellation_dialog_asks_for_confirmation() {
    let h = harness().await;
    let bot = Bot::new(h.state.clone());
    walk_to_slot_picker(&bot, ANNA, "Anna").await;
    bot.handle(Inbound::selected(ANNA, Action::PickSlot(LessonDay::Monday, "19:00".parse().unwrap())))
        .await
        .unwrap();
    let approve = find_action(&h.chat.last_to(TUTOR).unwrap(), |a| {
        matches!(a, Action::ApproveRequest(_))
    });
    bot.handle(Inbound::selected(TUTOR, approve)).await.unwrap();

    bot.handle(Inbound::selected(ANNA, Action::Cancel)).await.unwrap();
    let pick = find_action(&h.chat.last_to(ANNA).unwrap(), |a| matches!(a, Action::PickLesson(_)));
    bot.handle(Inbound::selected(ANNA, pick)).await.unwrap();
    assert!(matches!(bot.dialog(ANNA), DialogState::ConfirmingCancel { .. }));

    bot.handle(Inbound::selected(ANNA, Action::ConfirmCancel)).await.unwrap();
    let approve_cancel = find_action(&h.chat.last_to(TUTOR).unwrap(), |a| {
        matches!(a, Action::ApproveCancel(_))
    });
    bot.handle(Inbound::selected(TUTOR, approve_cancel)).await.unwrap();

    let lessons: ConfirmedLessons = h.state.repo.read().await.unwrap();
    assert!(lessons.is_empty());
}

#[tokio::test]
async fn stray_text_and_stale_buttons_are_answered() {
    let h = harness().await;
    let bot = Bot::new(h.state.clone());

    bot.handle(Inbound::text(ANNA, "hello?")).await.unwrap();
    assert!(h.chat.last_to(ANNA).unwrap().text.contains("/menu"));

    bot.handle(Inbound::selected(ANNA, Action::ConfirmCancel)).await.unwrap();
    assert!(h.chat.sent_to(ANNA).iter().any(|m| m.text.contains("no longer active")));
    assert_eq!(bot.dialog(ANNA), DialogState::Idle);
}
