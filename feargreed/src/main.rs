mod config;
mod hardware;

use anyhow::{Context, Result};
use config::Config;
use feargreed_core::{
    Engine, EngineConfig, GifLibrary, Hardware, HttpMarketData, LinuxPlatform, MarketData,
    SettingsStore, StopHandle,
};
use gpio_cdev::Chip;
use hardware::{FramebufferSink, GpioButtons};
use log::{error, info};

/// Stop the loop on SIGINT, SIGTERM or SIGHUP so teardown still runs.
fn stop_on_signal(stop: StopHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("termination signal received");
        stop.stop();
    })
    .context("installing signal handler")
}

fn run() -> Result<()> {
    let config = Config::from_env();
    info!("starting with {:?}", config);

    let mut chip = Chip::new(&config.gpiochip)
        .with_context(|| format!("opening {}", config.gpiochip.display()))?;
    let hardware = Hardware {
        sink: Box::new(FramebufferSink::open(&config, &mut chip)?),
        buttons: Box::new(GpioButtons::open(&mut chip)?),
        platform: Box::new(LinuxPlatform::new().with_interface(&config.interface)),
    };
    let source = HttpMarketData::new().context("building HTTP client")?;

    let mut engine = Engine::new(
        hardware,
        MarketData::new(Box::new(source)),
        Box::new(GifLibrary::new(&config.assets)),
        SettingsStore::new(&config.settings),
        EngineConfig::default(),
    );
    stop_on_signal(engine.stop_handle())?;
    engine.run_supervised()?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
