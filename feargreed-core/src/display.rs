//! Display sink and actuator seam.

use crate::error::HardwareError;
use crate::frame::Frame;

use log::{debug, warn};

// =============================================================================
// LED Color
// =============================================================================

/// An RGB LED drive level, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedColor {
    /// Red channel.
    pub r: f64,
    /// Green channel.
    pub g: f64,
    /// Blue channel.
    pub b: f64,
}

impl LedColor {
    /// All channels off.
    pub const OFF: LedColor = LedColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Create a color, clamping each channel to `0.0..=1.0`.
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Solid red at the given brightness.
    pub fn red(brightness: f64) -> Self {
        Self::new(brightness, 0.0, 0.0)
    }

    /// Whether every channel is off.
    pub fn is_off(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }
}

// =============================================================================
// Display Sink Trait
// =============================================================================

/// The physical panel plus its backlight and status LED.
///
/// Implemented by the framebuffer driver in the appliance binary and by
/// [`MockSink`](crate::MockSink) in tests.
pub trait DisplaySink: Send {
    /// Push a complete frame to the panel.
    fn blit(&mut self, frame: &Frame) -> Result<(), HardwareError>;

    /// Set the backlight level (`0.0..=1.0`).
    fn set_backlight(&mut self, level: f64) -> Result<(), HardwareError>;

    /// Drive the RGB status LED.
    fn set_led(&mut self, color: LedColor) -> Result<(), HardwareError>;

    /// Release device handles. Called once, after the backlight and LED are off.
    fn release(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// Switch the backlight and LED off and release the device.
///
/// Every step runs even when an earlier one fails; failures are logged.
pub fn teardown(sink: &mut dyn DisplaySink) {
    debug!("tearing down display");
    if let Err(e) = sink.set_backlight(0.0) {
        warn!("failed to switch backlight off: {}", e);
    }
    if let Err(e) = sink.set_led(LedColor::OFF) {
        warn!("failed to switch LED off: {}", e);
    }
    if let Err(e) = sink.release() {
        warn!("failed to release display: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSink;

    #[test]
    fn test_led_color_clamps_channels() {
        let color = LedColor::new(1.5, -0.2, 0.4);
        assert_eq!(color, LedColor::new(1.0, 0.0, 0.4));
        assert!(LedColor::OFF.is_off());
        assert!(!LedColor::red(0.5).is_off());
    }

    #[test]
    fn test_teardown_runs_every_step_after_failure() {
        let sink = MockSink::new();
        sink.fail_backlight(true);
        let mut boxed = sink.clone();
        teardown(&mut boxed);

        let log = sink.snapshot();
        assert_eq!(log.led.last(), Some(&LedColor::OFF));
        assert!(log.released);
    }
}
