//! End-to-end code entry scenarios against the mocks, on a paused clock.

mod common;

use common::{MAINTENANCE_PREFIX, capture_logs, id, rig};
use keybox_core::{ContentStatus, DoorStatus};
use keybox_engine::Prompt;
use keybox_hardware::{AnswerIcons, KeypadInput, LedColor};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_normal_code_opens_and_audits() {
    let mut rig = rig();
    rig.keys.enter_code("1234").await.unwrap();
    rig.tap_later(Duration::from_secs(10), KeypadInput::Confirm);

    rig.run_until_audited(1).await;

    assert_eq!(rig.locks.assertion_count(rig.slot(3)), 1);
    assert_eq!(rig.state(3), (ContentStatus::Present, DoorStatus::Closed));
    assert_eq!(rig.transport.code_fetches(), 1);

    let audit = &rig.transport.audits()[0];
    assert_eq!(audit.code_entered, "1234");
    assert_eq!(audit.compartment.as_deref(), Some("3"));
    assert_eq!(audit.content.as_deref(), Some("present"));
    assert_eq!(audit.door.as_deref(), Some("closed"));

    assert!(rig.panel.has_shown(&Prompt::Opening(id(3)).to_string()));
    assert!(rig.panel.has_shown("Did you return"));
    assert_eq!(rig.panel.last_status(), Some(Prompt::Welcome.to_string()));
    assert_eq!(rig.panel.answer_icons(), AnswerIcons::Hidden);
    assert_eq!(rig.panel.compartment_light(rig.led(3)), LedColor::Off);
    assert_eq!(rig.panel.status_light(), LedColor::Idle);
    assert_eq!(rig.supervisor.code(), "");
    assert!(rig.watchdog.feeds() > 0);
}

#[tokio::test(start_paused = true)]
async fn test_declined_answer_keeps_content() {
    let mut rig = rig();
    rig.set_content(3, ContentStatus::Present);
    rig.keys.enter_code("1234").await.unwrap();
    rig.tap_later(Duration::from_secs(10), KeypadInput::Cancel);

    rig.run_until_audited(1).await;

    assert!(rig.panel.has_shown("Did you take out"));
    assert_eq!(rig.state(3), (ContentStatus::Present, DoorStatus::Closed));
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_code_works_offline() {
    let mut rig = rig();
    rig.transport.set_unreachable(true);
    rig.supervisor.context_mut().flags.content_tracking = false;
    rig.keys
        .enter_code(&format!("03{MAINTENANCE_PREFIX}"))
        .await
        .unwrap();

    rig.run_until_audited(1).await;

    assert_eq!(rig.transport.code_fetches(), 0);
    assert_eq!(rig.locks.assertion_count(rig.slot(3)), 1);
    assert_eq!(rig.state(3), (ContentStatus::Unknown, DoorStatus::Closed));
    assert!(!rig.panel.has_shown("Did you"));

    let audit = &rig.transport.audits()[0];
    assert_eq!(audit.code_entered, "maintenance");
    assert_eq!(audit.compartment.as_deref(), Some("3"));
}

#[tokio::test(start_paused = true)]
async fn test_lookup_failure_opens_nothing() {
    let mut rig = rig();
    rig.transport.set_codes_status(500);
    rig.keys.enter_code("1234").await.unwrap();

    rig.run_until_audited(1).await;

    for n in 1..=8 {
        assert_eq!(rig.locks.assertion_count(rig.slot(n)), 0);
    }
    assert!(rig.panel.has_shown(&Prompt::LookupFailed.to_string()));
    assert!(!rig.panel.has_shown(&Prompt::InvalidCode.to_string()));

    let audit = &rig.transport.audits()[0];
    assert_eq!(audit.code_entered, "1234");
    assert_eq!(audit.compartment, None);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_code_is_rejected() {
    let mut rig = rig();
    rig.keys.enter_code("9999").await.unwrap();

    rig.run_until_audited(1).await;

    assert!(rig.panel.has_shown(&Prompt::InvalidCode.to_string()));
    assert_eq!(rig.locks.assertion_count(rig.slot(3)), 0);
    assert_eq!(rig.transport.audits()[0].compartment, None);
    assert_eq!(rig.panel.status_light(), LedColor::Idle);
    // Fast tier once at the first tick, then after the lookup and the audit.
    assert_eq!(rig.watchdog.feeds(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_code_for_absent_compartment() {
    let mut rig = rig();
    rig.keys
        .enter_code(&format!("12{MAINTENANCE_PREFIX}"))
        .await
        .unwrap();

    rig.run_until_audited(1).await;

    assert!(rig.panel.has_shown(&Prompt::AbsentCompartment.to_string()));
    let audit = &rig.transport.audits()[0];
    assert_eq!(audit.code_entered, "maintenance");
    assert_eq!(audit.compartment.as_deref(), Some("12"));
    assert_eq!(audit.content, None);
    assert_eq!(audit.door, None);
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_code_without_compartment_hides_prefix() {
    let (_guard, logs) = capture_logs();
    let mut rig = rig();
    rig.keys
        .enter_code(&format!("00{MAINTENANCE_PREFIX}"))
        .await
        .unwrap();

    rig.run_until_audited(1).await;

    assert!(rig.panel.has_shown(&Prompt::AbsentCompartment.to_string()));
    assert!(!rig.panel.has_shown(&Prompt::InvalidCode.to_string()));
    for n in 1..=8 {
        assert_eq!(rig.locks.assertion_count(rig.slot(n)), 0);
    }

    let audit = &rig.transport.audits()[0];
    assert_eq!(audit.code_entered, "maintenance");
    assert_eq!(audit.compartment, None);
    assert!(
        logs.lines().iter().all(|line| !line.contains(MAINTENANCE_PREFIX)),
        "{:?}",
        logs.lines()
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_all_pulses_every_compartment() {
    let mut rig = rig();
    rig.keys
        .enter_code(&format!("99{MAINTENANCE_PREFIX}"))
        .await
        .unwrap();

    rig.run_until_audited(1).await;

    for n in 1..=8 {
        assert_eq!(rig.locks.assertion_count(rig.slot(n)), 1, "compartment {n}");
    }
    assert!(rig.panel.has_shown(&Prompt::OpeningAll.to_string()));
    assert!(!rig.locks.any_engaged());

    let audit = &rig.transport.audits()[0];
    assert_eq!(audit.code_entered, "maintenance");
    assert_eq!(audit.compartment, None);
}

#[tokio::test(start_paused = true)]
async fn test_jammed_door_gives_up_after_retry() {
    let mut rig = rig();
    rig.locks.jam(rig.slot(3), 2);
    rig.keys.enter_code("1234").await.unwrap();

    rig.run_until_audited(1).await;

    let assertions = rig.locks.assertions(rig.slot(3));
    assert_eq!(
        assertions,
        vec![Duration::from_secs(1), Duration::from_secs(3)]
    );
    assert!(rig.panel.has_shown(&Prompt::DoorBlocked(id(3)).to_string()));
    assert!(rig.panel.has_shown(&Prompt::DoorDidNotOpen.to_string()));
    assert!(!rig.panel.has_shown("Did you"));
    assert_eq!(rig.state(3), (ContentStatus::Unknown, DoorStatus::Closed));
}

#[tokio::test(start_paused = true)]
async fn test_door_left_open_is_recorded() {
    let mut rig = rig();
    rig.locks.set_auto_close(rig.slot(3), None);
    rig.keys.enter_code("1234").await.unwrap();

    rig.run_until_audited(1).await;

    assert!(rig.locks.is_door_open(rig.slot(3)));
    assert_eq!(rig.state(3), (ContentStatus::Unknown, DoorStatus::Open));
    let audit = &rig.transport.audits()[0];
    assert_eq!(audit.door.as_deref(), Some("open"));
    assert_eq!(audit.content.as_deref(), Some("unknown"));
}

#[tokio::test(start_paused = true)]
async fn test_close_wait_timeout_warns_once() {
    let (_guard, logs) = capture_logs();
    let mut rig = rig();
    rig.locks.set_auto_close(rig.slot(3), None);
    rig.keys.enter_code("1234").await.unwrap();

    rig.run_until_audited(1).await;

    let warnings: Vec<String> = logs
        .lines()
        .into_iter()
        .filter(|line| line.starts_with("WARN: Door not closed"))
        .collect();
    assert_eq!(warnings, vec!["WARN: Door not closed compartment=3"]);
    assert_eq!(rig.state(3).1, DoorStatus::Open);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_close_wait_skips_question() {
    let mut rig = rig();
    rig.set_content(3, ContentStatus::Present);
    rig.locks.set_auto_close(rig.slot(3), None);
    rig.keys.enter_code("1234").await.unwrap();
    rig.tap_later(Duration::from_secs(5), KeypadInput::Cancel);

    rig.run_until_audited(1).await;

    assert!(!rig.panel.has_shown("Did you"));
    assert_eq!(rig.state(3), (ContentStatus::Unknown, DoorStatus::Open));
}

#[tokio::test(start_paused = true)]
async fn test_code_buffer_limits() {
    let mut rig = rig();
    rig.keys.type_keys("123456789").await.unwrap();

    rig.run_ticks(20).await;

    assert_eq!(rig.supervisor.code(), "12345678");
    assert_eq!(rig.panel.code(), "1234");
    assert_eq!(rig.keys.clicks(), 9);

    rig.keys.tap(KeypadInput::Cancel).await.unwrap();
    rig.run_ticks(3).await;

    assert_eq!(rig.supervisor.code(), "");
    assert_eq!(rig.panel.code(), "");
    assert!(rig.transport.audits().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_confirm_without_code_is_ignored() {
    let mut rig = rig();
    rig.keys.tap(KeypadInput::Confirm).await.unwrap();

    rig.run_ticks(5).await;

    assert_eq!(rig.transport.code_fetches(), 0);
    assert!(rig.transport.audits().is_empty());
}
