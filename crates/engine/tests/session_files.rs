mod common;

use std::fs;

use common::*;
use rewind_engine::{GameStateId, SettingObject, Vec2};
use tempfile::TempDir;

#[test]
fn quitting_writes_a_save_that_the_next_session_restores() {
    let temp = TempDir::new().expect("temp");
    let mut session = boot(temp.path());
    move_to(&mut session, PLAYER, Vec2::new(4.0, 0.0));
    move_to(&mut session, ROCK, Vec2::new(-1.0, 2.0));
    session.save().expect("save");
    session.settings_mut().set(SettingObject {
        id: "teleport".to_string(),
        unlocked: true,
        upgrade_level: 2,
    });
    let path = session.on_quit().expect("quit");
    assert_eq!(path, temp.path().join("merky.json"));
    let saved_states = session.timeline().len();

    let mut restored = new_session(temp.path());
    assert!(restored.start().expect("start"));
    assert_eq!(restored.timeline().len(), saved_states);
    assert_eq!(
        restored.current(),
        Some(GameStateId(saved_states as u32 - 1))
    );
    assert!(restored.settings().is_unlocked("teleport"));

    tick(&mut restored, 2);
    assert_eq!(position_of(&restored, PLAYER), Vec2::new(4.0, 0.0));
    assert_eq!(position_of(&restored, ROCK), Vec2::new(-1.0, 2.0));
    assert_eq!(restored.timeline().len(), saved_states);
}

#[test]
fn corrupt_save_is_discarded_and_the_game_starts_fresh() {
    let temp = TempDir::new().expect("temp");
    let path = temp.path().join("merky.json");
    fs::write(&path, "{ \"save_version\": 1, \"body\": [").expect("write garbage");

    let mut session = new_session(temp.path());
    assert!(!session.start().expect("start"));
    assert!(!path.exists());
    assert!(session.timeline().is_empty());

    tick(&mut session, 1);
    assert_eq!(session.current(), Some(GameStateId(0)));
}

#[test]
fn demo_mode_ignores_existing_saves_and_stamps_new_ones() {
    let temp = TempDir::new().expect("temp");
    let mut first = boot(temp.path());
    first.on_quit().expect("quit");

    let mut config = config(temp.path());
    config.save.demo_mode = true;
    let mut demo = new_session_with(config);
    assert!(!demo.start().expect("start"));
    assert!(demo.timeline().is_empty());

    tick(&mut demo, 2);
    let path = demo.on_quit().expect("quit");
    let file_name = path.file_name().and_then(|name| name.to_str()).expect("name");
    assert!(file_name.starts_with("merky_"));
    assert!(file_name.ends_with(".json"));
}

#[test]
fn reset_can_save_the_abandoned_run_first() {
    let temp = TempDir::new().expect("temp");
    let mut session = boot(temp.path());
    session.save().expect("save");
    session.forget(SIGN).expect("forget");

    session.reset_game(true).expect("reset");
    assert!(temp.path().join("merky.json").is_file());
    assert!(session.timeline().is_empty());
    assert!(session.world().is_empty());
    assert!(session.registry().is_empty());
    assert!(session.memory(SIGN).is_none());

    tick(&mut session, 2);
    assert_eq!(session.current(), Some(GameStateId(0)));
    assert!(session.world().get(SIGN).expect("sign").active);
}

#[test]
fn reset_without_saving_leaves_no_file() {
    let temp = TempDir::new().expect("temp");
    let mut session = boot(temp.path());
    session.reset_game(false).expect("reset");
    assert!(!temp.path().join("merky.json").exists());
}
