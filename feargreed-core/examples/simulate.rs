//! Run the render loop against mock hardware and print what it does.
//!
//! ```text
//! RUST_LOG=debug cargo run -p feargreed-core --example simulate
//! ```

use feargreed_core::{
    Button, Engine, EngineConfig, EngineError, Hardware, MarketData, MockAnimations, MockButtons,
    MockMarketData, MockPlatform, MockSink, SettingsStore,
};
use std::time::Duration;

fn press(engine: &mut Engine, buttons: &MockButtons, button: Button) -> Result<(), EngineError> {
    buttons.press(button);
    engine.tick()?;
    buttons.release(button);
    engine.tick()
}

fn main() -> Result<(), EngineError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let sink = MockSink::new();
    let buttons = MockButtons::new();
    let platform = MockPlatform::new();
    let source = MockMarketData::new();
    source.set_sentiment(22);
    source.set_market(Some(61_842.5), Some(-2.4));

    let settings = std::env::temp_dir().join("feargreed-simulate.json");
    let mut engine = Engine::new(
        Hardware {
            sink: Box::new(sink.clone()),
            buttons: Box::new(buttons.clone()),
            platform: Box::new(platform.clone()),
        },
        MarketData::new(Box::new(source.clone())),
        Box::new(MockAnimations::new()),
        SettingsStore::new(&settings),
        EngineConfig::default(),
    );

    engine.start()?;
    press(&mut engine, &buttons, Button::A)?;

    // Let two full rotations play out.
    let cycle = engine.settings().display_duration() * engine.rotation().len() as u32;
    while platform.slept() < cycle * 2 {
        engine.tick()?;
    }

    // The provider goes away; cached data keeps the screen alive.
    source.fail_all();
    platform.advance(Duration::from_secs(600));
    engine.tick()?;

    press(&mut engine, &buttons, Button::A)?;
    press(&mut engine, &buttons, Button::X)?;
    press(&mut engine, &buttons, Button::B)?;
    press(&mut engine, &buttons, Button::B)?;

    engine.shutdown();
    let log = sink.snapshot();
    println!("phase:     {:?}", engine.phase());
    println!("blits:     {}", log.blits);
    println!("LED:       {:?}", log.led.last());
    println!("backlight: {:?}", log.backlight.last());
    println!("calls:     {:?}", source.calls());

    let _ = std::fs::remove_file(settings);
    Ok(())
}
