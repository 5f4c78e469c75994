//! Content loading and session setup shared between conductor_cli and conductor_daemon.

use anyhow::{Context, Result};
use conductor_core::{new_session, start_session, Constants, GameContent, SessionState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Deserialize)]
struct TrainsFile {
    content_version: String,
    names: Vec<String>,
    colors: Vec<String>,
}

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like: a duplicated train name, an empty palette, a delay
/// range whose minimum exceeds its maximum, or a near-miss window that swallows
/// the whole countdown.
pub fn validate_content(content: &GameContent) {
    assert!(!content.names.is_empty(), "train name pool is empty");
    let mut seen: HashSet<&str> = HashSet::new();
    for name in &content.names {
        assert!(!name.trim().is_empty(), "train name pool contains a blank name");
        assert!(seen.insert(name.as_str()), "train name '{name}' is duplicated");
    }

    assert!(!content.colors.is_empty(), "color palette is empty");
    for color in &content.colors {
        assert!(
            color.len() == 7
                && color.starts_with('#')
                && color[1..].chars().all(|c| c.is_ascii_hexdigit()),
            "color '{color}' is not a #RRGGBB hex color",
        );
    }

    validate_constants(&content.constants);
}

fn validate_constants(c: &Constants) {
    assert!(c.tick_ms > 0, "tick_ms must be positive");
    assert!(
        c.countdown_interval_ms > 0,
        "countdown_interval_ms must be positive"
    );
    for (label, min, max) in [
        ("spawn_interval", c.spawn_interval_min_ms, c.spawn_interval_max_ms),
        ("request_delay", c.request_delay_min_ms, c.request_delay_max_ms),
        (
            "departure_delay",
            c.departure_delay_min_ms,
            c.departure_delay_max_ms,
        ),
    ] {
        assert!(min <= max, "{label} min {min}ms exceeds max {max}ms");
    }
    assert!(c.countdown_secs > 0, "countdown_secs must be positive");
    assert!(
        c.near_miss_secs < c.countdown_secs,
        "near_miss_secs {} must be below countdown_secs {}",
        c.near_miss_secs,
        c.countdown_secs,
    );
    assert!(
        c.overload_threshold >= 2,
        "overload_threshold {} must be at least 2",
        c.overload_threshold,
    );
    assert!(c.platform_count >= 1, "platform_count must be at least 1");
    assert!(c.log_capacity >= 1, "log_capacity must be at least 1");
}

pub fn load_content(content_dir: &str) -> Result<GameContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = serde_json::from_str(
        &std::fs::read_to_string(dir.join("constants.json")).context("reading constants.json")?,
    )
    .context("parsing constants.json")?;
    let trains_file: TrainsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("trains.json")).context("reading trains.json")?,
    )
    .context("parsing trains.json")?;
    let content = GameContent {
        content_version: trains_file.content_version,
        names: trains_file.names,
        colors: trains_file.colors,
        constants,
    };
    validate_content(&content);
    Ok(content)
}

/// New session with the first arrival already scheduled.
pub fn build_initial_state(content: &GameContent, seed: u64) -> SessionState {
    let mut state = new_session(content, seed);
    start_session(&mut state, content);
    state
}

/// The simulation RNG for `seed`. Every run with the same seed and operator
/// replays the same session.
pub fn session_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}
