//! End-to-end flows: record a take against a synthetic desktop, persist
//! it, and replay it against a desktop whose layout drifted.

mod common;

use anyhow::Result;
use common::*;
use image::imageops;
use macroplay::anchor::encode_image_base64;
use macroplay::{
    load_events, save_events, CancelToken, EventKind, InputNotification, MacroEvent, MouseButton,
    PlaybackConfig, PlaybackStatus, Player, Recorder, RecorderConfig, Rect,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn recorded_click_survives_layout_drift() -> Result<()> {
    // Record-time desktop: a distinctive patch sits at (120, 70).
    let mut record_screen = gradient_screen(300, 200);
    imageops::replace(&mut record_screen, &reference_patch(40, 30), 120, 70);

    let recorder = Recorder::new(RecorderConfig {
        capture_anchors: true,
        record_window: false,
    })
    .with_capture(Arc::new(FakeDesktop::single(record_screen.clone())));

    recorder.start()?;
    recorder.handle(InputNotification::MouseMove { x: 10.0, y: 10.0 });
    recorder.handle(InputNotification::MouseClick {
        x: 140.0,
        y: 85.0,
        button: MouseButton::Left,
        pressed: true,
    });
    recorder.handle(InputNotification::MouseClick {
        x: 140.0,
        y: 85.0,
        button: MouseButton::Left,
        pressed: false,
    });
    recorder.stop();

    // Persist and reload, as the editor would between sessions.
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("take.json");
    save_events(&path, &recorder.take())?;
    let events = load_events(&path)?;
    assert_eq!(events.len(), 3);

    // Play-time desktop: everything moved. The 70x70 anchor region that
    // was captured around the click now sits at (30, 100) on a flat
    // background.
    let anchor_region = imageops::crop_imm(&record_screen, 105, 50, 70, 70).to_image();
    let mut play_screen = image::RgbaImage::from_pixel(300, 200, image::Rgba([40, 40, 40, 255]));
    imageops::replace(&mut play_screen, &anchor_region, 30, 100);

    let input = Arc::new(ScriptedInput::default());
    let player = Player::new(input.clone())
        .with_capture(Arc::new(FakeDesktop::single(play_screen)));

    let config = PlaybackConfig {
        threshold: 0.9,
        ..Default::default()
    };
    let status = player.run(&events, &config, &CancelToken::new());
    assert_eq!(status, PlaybackStatus::Finished);

    // The click followed the anchor: match top-left (30, 100) plus the
    // recorded [35, 35] offset.
    assert_eq!(
        input.calls(),
        vec![
            InputCall::Move(10, 10),
            InputCall::Move(65, 135),
            InputCall::Button(MouseButton::Left, true),
            InputCall::Button(MouseButton::Left, false),
        ]
    );
    Ok(())
}

#[test]
fn wait_for_image_sees_the_screen_change() -> Result<()> {
    let patch = reference_patch(30, 24);
    let before = gradient_screen(200, 150);
    let mut after = before.clone();
    imageops::replace(&mut after, &patch, 60, 40);

    // Patch appears on the third capture.
    let screen = Arc::new(AppearingScreen::new(before, after, 2));

    let mut wait = MacroEvent::wait_for_image(5.0);
    macroplay::Anchor::new(patch, (0, 0)).embed(&mut wait)?;
    let events = vec![wait, MacroEvent::mouse_move(0.0, 7.0, 8.0)];

    let input = Arc::new(ScriptedInput::default());
    let player = Player::new(input.clone()).with_capture(screen);

    let config = PlaybackConfig {
        threshold: 0.9,
        ..Default::default()
    };
    let started = Instant::now();
    let status = player.run(&events, &config, &CancelToken::new());

    assert_eq!(status, PlaybackStatus::Finished);
    // Two misses at 200ms apart, then the hit; nowhere near the 5s budget.
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(input.calls(), vec![InputCall::Move(7, 8)]);
    Ok(())
}

#[test]
fn collaborator_steps_reach_their_collaborators() -> Result<()> {
    let desktop = Arc::new(FakeDesktop::single(gradient_screen(200, 150)));
    let windows = Arc::new(FakeWindows::default());
    let opener = Arc::new(RecordingOpener::default());
    let sink = Arc::new(CollectingSink::default());

    let shot = reference_patch(12, 10);
    let events = vec![
        MacroEvent::screenshot(0.0, encode_image_base64(&shot)?),
        MacroEvent::ocr_region(0.0, Rect::new(10, 10, 50, 20)),
        MacroEvent::open_url(0.0, "https://example.com/run"),
    ];

    let input = Arc::new(ScriptedInput::default());
    let player = Player::new(input)
        .with_capture(desktop)
        .with_window_control(windows)
        .with_ocr(Arc::new(CannedOcr("hello from ocr")))
        .with_url_opener(opener.clone())
        .with_screenshots(sink.clone());

    let status = player.run(&events, &PlaybackConfig::default(), &CancelToken::new());

    assert_eq!(status, PlaybackStatus::Finished);
    assert_eq!(sink.saved.lock().clone(), vec![shot]);
    assert_eq!(
        opener.opened.lock().clone(),
        vec!["https://example.com/run".to_string()]
    );
    Ok(())
}

#[test]
fn absent_collaborators_make_steps_inert() -> Result<()> {
    let events = vec![
        MacroEvent::screenshot(0.0, "aaaa".into()),
        MacroEvent::ocr_region(0.0, Rect::new(0, 0, 10, 10)),
        MacroEvent::open_url(0.0, "https://example.com"),
    ];

    // No collaborators bound at all; everything degrades to a no-op.
    let input = Arc::new(ScriptedInput::default());
    let player = Player::new(input.clone());
    let status = player.run(&events, &PlaybackConfig::default(), &CancelToken::new());

    assert_eq!(status, PlaybackStatus::Finished);
    assert!(input.calls().is_empty());
    Ok(())
}

#[test]
fn unknown_kinds_load_replay_and_persist() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("newer.json");
    std::fs::write(
        &path,
        r#"[
            {"kind": "mouse_move", "delay": 0.0, "payload": {"x": 3.0, "y": 4.0}},
            {"kind": "hover_hold", "delay": 0.0, "payload": {"ms": 250}},
            {"kind": "wait", "delay": 0.0, "payload": {}}
        ]"#,
    )?;

    let events = load_events(&path)?;
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].kind, EventKind::Other("hover_hold".to_string()));

    let input = Arc::new(ScriptedInput::default());
    let player = Player::new(input.clone());
    let status = player.run(&events, &PlaybackConfig::default(), &CancelToken::new());
    assert_eq!(status, PlaybackStatus::Finished);
    assert_eq!(input.calls(), vec![InputCall::Move(3, 4)]);

    // Round-trip: the unknown kind is preserved, not dropped.
    let out = dir.path().join("roundtrip.json");
    save_events(&out, &events)?;
    assert_eq!(load_events(&out)?, events);
    Ok(())
}

#[test]
fn restore_pre_pass_runs_before_the_walk() -> Result<()> {
    let windows = Arc::new(FakeWindows::default());
    let input = Arc::new(ScriptedInput::default());
    let player = Player::new(input.clone()).with_window_control(windows.clone());

    let geometry = macroplay::WindowGeometry {
        title: "Workbench".into(),
        x: 100,
        y: 120,
        width: 1024,
        height: 768,
    };
    let events = vec![
        MacroEvent::window_restore(0.0, &geometry),
        MacroEvent::mouse_move(0.0, 1.0, 1.0),
    ];

    let config = PlaybackConfig {
        restore_window: true,
        ..Default::default()
    };
    let status = player.run(&events, &config, &CancelToken::new());

    assert_eq!(status, PlaybackStatus::Finished);
    assert_eq!(
        windows.restored.lock().clone(),
        vec![("Workbench".to_string(), 100, 120, 1024, 768)]
    );
    assert_eq!(input.calls(), vec![InputCall::Move(1, 1)]);
    Ok(())
}

#[test]
fn cancelling_a_background_run_reports_cancelled() -> Result<()> {
    let input = Arc::new(ScriptedInput::default());
    let player = Player::new(input);

    let events = vec![MacroEvent::wait(30.0)];
    let rx = player.start(events, PlaybackConfig::default())?;
    assert!(player.is_playing());

    std::thread::sleep(Duration::from_millis(80));
    player.cancel();

    let status = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(status, PlaybackStatus::Cancelled);
    assert!(!player.is_playing());
    Ok(())
}
