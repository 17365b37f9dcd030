//! Linux framebuffer and GPIO drivers.

use crate::config::{BACKLIGHT_LINE, BUTTON_LINES, Config, LED_LINES};

use anyhow::{Context, Result};
use feargreed_core::{Button, ButtonReader, DisplaySink, Frame, HardwareError, LedColor};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Length of one software PWM period.
const PWM_PERIOD: Duration = Duration::from_millis(10);
/// Duty cycle resolution.
const PWM_STEPS: u32 = 20;

const RED: usize = 0;
const GREEN: usize = 1;
const BLUE: usize = 2;
const BACKLIGHT: usize = 3;

// =============================================================================
// Software PWM
// =============================================================================

/// Dims LED and backlight lines by toggling them on a background thread.
struct Pwm {
    duty: Arc<Mutex<[f64; 4]>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Pwm {
    fn spawn(lines: [LineHandle; 4]) -> Result<Self> {
        let duty = Arc::new(Mutex::new([0.0; 4]));
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let duty = Arc::clone(&duty);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("pwm".to_string())
                .spawn(move || pwm_loop(&lines, &duty, &stop))
                .context("spawning PWM thread")?
        };
        Ok(Self {
            duty,
            stop,
            worker: Some(worker),
        })
    }

    fn set(&self, channel: usize, level: f64) -> Result<(), HardwareError> {
        let mut duty = self
            .duty
            .lock()
            .map_err(|_| HardwareError::Device("PWM state poisoned".to_string()))?;
        duty[channel] = level.clamp(0.0, 1.0);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), HardwareError> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| HardwareError::Device("PWM thread panicked".to_string()))?;
        }
        Ok(())
    }
}

fn pwm_loop(lines: &[LineHandle; 4], duty: &Mutex<[f64; 4]>, stop: &AtomicBool) {
    let slot = PWM_PERIOD / PWM_STEPS;
    while !stop.load(Ordering::SeqCst) {
        let levels = match duty.lock() {
            Ok(levels) => *levels,
            Err(_) => break,
        };
        let on_steps = levels.map(|l| (l * f64::from(PWM_STEPS)).round() as u32);
        for step in 0..PWM_STEPS {
            for (line, on) in lines.iter().zip(on_steps) {
                if let Err(e) = line.set_value(u8::from(step < on)) {
                    warn!("PWM write failed, stopping: {}", e);
                    return;
                }
            }
            thread::sleep(slot);
        }
    }
    for line in lines {
        let _ = line.set_value(0);
    }
    debug!("PWM stopped");
}

// =============================================================================
// Framebuffer Sink
// =============================================================================

/// The panel behind a 16 bit Linux framebuffer, with GPIO LED and backlight.
pub struct FramebufferSink {
    framebuffer: File,
    pwm: Pwm,
}

impl FramebufferSink {
    /// Open the framebuffer and claim the LED and backlight lines.
    pub fn open(config: &Config, chip: &mut Chip) -> Result<Self> {
        let framebuffer = OpenOptions::new()
            .write(true)
            .open(&config.framebuffer)
            .with_context(|| format!("opening {}", config.framebuffer.display()))?;

        let mut led = |offset: u32, consumer: &str| -> Result<LineHandle> {
            chip.get_line(offset)
                .with_context(|| format!("getting LED line {}", offset))?
                .request(
                    LineRequestFlags::OUTPUT | LineRequestFlags::ACTIVE_LOW,
                    0,
                    consumer,
                )
                .with_context(|| format!("requesting LED line {}", offset))
        };
        let red = led(LED_LINES[RED], "feargreed-led-r")?;
        let green = led(LED_LINES[GREEN], "feargreed-led-g")?;
        let blue = led(LED_LINES[BLUE], "feargreed-led-b")?;
        let backlight = chip
            .get_line(BACKLIGHT_LINE)
            .context("getting backlight line")?
            .request(LineRequestFlags::OUTPUT, 0, "feargreed-bl")
            .context("requesting backlight line")?;

        Ok(Self {
            framebuffer,
            pwm: Pwm::spawn([red, green, blue, backlight])?,
        })
    }
}

impl DisplaySink for FramebufferSink {
    fn blit(&mut self, frame: &Frame) -> Result<(), HardwareError> {
        self.framebuffer.write_all_at(&frame.to_rgb565_le(), 0)?;
        Ok(())
    }

    fn set_backlight(&mut self, level: f64) -> Result<(), HardwareError> {
        self.pwm.set(BACKLIGHT, level)
    }

    fn set_led(&mut self, color: LedColor) -> Result<(), HardwareError> {
        self.pwm.set(RED, color.r)?;
        self.pwm.set(GREEN, color.g)?;
        self.pwm.set(BLUE, color.b)
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.pwm.shutdown()
    }
}

// =============================================================================
// Buttons
// =============================================================================

/// Front panel buttons on GPIO input lines.
pub struct GpioButtons {
    lines: Vec<(Button, LineHandle)>,
}

impl GpioButtons {
    /// Claim the four button lines.
    pub fn open(chip: &mut Chip) -> Result<Self> {
        let lines = Button::ALL
            .into_iter()
            .zip(BUTTON_LINES)
            .map(|(button, offset)| {
                let handle = chip
                    .get_line(offset)
                    .with_context(|| format!("getting button line {}", offset))?
                    .request(
                        LineRequestFlags::INPUT | LineRequestFlags::ACTIVE_LOW,
                        0,
                        "feargreed-button",
                    )
                    .with_context(|| format!("requesting button line {}", offset))?;
                Ok((button, handle))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { lines })
    }
}

impl ButtonReader for GpioButtons {
    fn is_pressed(&mut self, button: Button) -> bool {
        let Some((_, handle)) = self.lines.iter().find(|(b, _)| *b == button) else {
            return false;
        };
        match handle.get_value() {
            Ok(value) => value == 1,
            Err(e) => {
                warn!("failed to read button {:?}: {}", button, e);
                false
            }
        }
    }
}
