use feargreed_core::{
    AppSettings, BUCKET_TABLE, Button, CacheSlot, DEBOUNCE, DisplayMode, FetchError, InputPoller,
    MAX_DISPLAY_SECONDS, MIN_DISPLAY_SECONDS, MemoryStatus, MockButtons, Rotation, SettingsStore,
    SourceKey, Step, classify,
};
use quickcheck_macros::quickcheck;
use std::cell::Cell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn bucket_rank(value: u8) -> usize {
    let bucket = classify(value);
    BUCKET_TABLE
        .iter()
        .position(|(_, b)| *b == bucket)
        .unwrap()
}

fn modes_from_mask(mask: u8) -> Vec<DisplayMode> {
    DisplayMode::CYCLABLE
        .into_iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, m)| m)
        .collect()
}

#[quickcheck]
fn classify_picks_first_row_at_or_above(value: u8) -> bool {
    let rank = bucket_rank(value);
    let (upper, _) = BUCKET_TABLE[rank];
    let lower_ok = rank == 0 || BUCKET_TABLE[rank - 1].0 < value;
    value <= upper && lower_ok
}

#[quickcheck]
fn classify_is_monotonic(a: u8, b: u8) -> bool {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    bucket_rank(low) <= bucket_rank(high)
}

#[quickcheck]
fn settings_from_any_numbers_are_in_range(
    display: i64,
    screen: f64,
    led: f64,
    offset: i64,
) -> bool {
    let json = serde_json::json!({
        "display_duration_seconds": display,
        "screen_brightness": screen,
        "led_brightness": led,
        "manual_time_offset_seconds": offset,
    });
    let settings = AppSettings::from_json(json.as_object().unwrap());
    (MIN_DISPLAY_SECONDS..=MAX_DISPLAY_SECONDS).contains(&settings.display_duration_seconds)
        && (0.0..=1.0).contains(&settings.screen_brightness)
        && (0.0..=1.0).contains(&settings.led_brightness)
}

/// Full precision value in `[0, 1)` from the top 53 bits.
fn unit_from_bits(bits: u64) -> f64 {
    (bits >> 11) as f64 / (1u64 << 53) as f64
}

fn scratch_settings() -> (SettingsStore, PathBuf) {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "feargreed-property-{}-{}.json",
        std::process::id(),
        n
    ));
    (SettingsStore::new(&path), path)
}

#[quickcheck]
fn settings_survive_a_save_load_cycle(
    display: u32,
    screen_bits: u64,
    led_bits: u64,
    led_enabled: bool,
    mask: u8,
    offset: i64,
    address: String,
) -> bool {
    let settings = AppSettings {
        display_duration_seconds: display,
        screen_brightness: unit_from_bits(screen_bits),
        led_brightness: unit_from_bits(led_bits),
        led_enabled,
        enabled_modes: modes_from_mask(mask).into_iter().collect(),
        manual_time_offset_seconds: offset,
        donation_address: address,
        ..AppSettings::default()
    }
    .clamped();

    let (store, path) = scratch_settings();
    store.try_save(&settings).unwrap();
    let loaded = store.try_load();
    let _ = std::fs::remove_file(path);
    loaded.ok() == Some(settings)
}

#[test]
fn brightness_with_long_mantissa_round_trips() {
    let settings = AppSettings {
        screen_brightness: 0.9856906946328695,
        led_brightness: 0.21291890726713458,
        ..AppSettings::default()
    };
    let (store, path) = scratch_settings();
    store.save(&settings);
    let loaded = store.load();
    let _ = std::fs::remove_file(path);
    assert_eq!(loaded, settings);
}

#[quickcheck]
fn rotation_step_forward_then_back_returns(mask: u8, position: usize) -> bool {
    let rotation = Rotation::from_modes(modes_from_mask(mask));
    let position = position % rotation.len();
    let next = rotation.select(position, Step::Next, MemoryStatus::Sufficient);
    let back = rotation.select(next.position, Step::Previous, MemoryStatus::Sufficient);
    back.position == position && back.mode == rotation.mode_at(position)
}

#[quickcheck]
fn rotation_only_holds_cyclable_modes(mask: u8) -> bool {
    let rotation = Rotation::from_modes(modes_from_mask(mask));
    !rotation.is_empty() && rotation.modes().iter().all(|m| m.is_cyclable())
}

#[quickcheck]
fn low_memory_never_selects_animation_heavy(mask: u8, position: usize, forward: bool) -> bool {
    let rotation = Rotation::from_modes(modes_from_mask(mask));
    let step = if forward { Step::Next } else { Step::Previous };
    let selection = rotation.select(position, step, MemoryStatus::Low);
    !selection.mode.is_animation_heavy() && selection.degraded
}

#[quickcheck]
fn cache_reads_within_ttl_fetch_once(payload: u32, offsets: Vec<u16>) -> bool {
    let ttl = Duration::from_secs(300);
    let mut slot = CacheSlot::new(SourceKey::Market);
    let fetches = Cell::new(0);
    let now = Instant::now();

    let mut consistent = true;
    for offset in std::iter::once(0).chain(offsets) {
        let at = now + Duration::from_millis(u64::from(offset) % 300_000);
        let read = slot.get(at, ttl, || {
            fetches.set(fetches.get() + 1);
            Ok::<_, FetchError>(payload)
        });
        consistent &= read.payload == Some(payload) && read.fresh;
    }
    consistent && fetches.get() == 1
}

#[quickcheck]
fn second_press_honored_only_outside_debounce(gap_ms: u8) -> bool {
    let buttons = MockButtons::new();
    let mut poller = InputPoller::new(Box::new(buttons.clone()));
    let t0 = Instant::now();
    let gap = Duration::from_millis(u64::from(gap_ms));

    buttons.press(Button::Y);
    let first = poller.poll(t0);
    buttons.release(Button::Y);
    poller.poll(t0);
    buttons.press(Button::B);
    let second = poller.poll(t0 + gap);

    first == Some(Button::Y) && (second == Some(Button::B)) == (gap >= DEBOUNCE)
}
