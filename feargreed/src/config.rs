//! Device wiring read from the environment.

use std::path::PathBuf;

/// Button lines on the display HAT (A, B, X, Y).
pub const BUTTON_LINES: [u32; 4] = [5, 6, 16, 24];
/// RGB LED lines (red, green, blue), active low.
pub const LED_LINES: [u32; 3] = [17, 27, 22];
/// Backlight line.
pub const BACKLIGHT_LINE: u32 = 13;

/// Paths and devices used by the appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Settings JSON file.
    pub settings: PathBuf,
    /// Root of the GIF assets.
    pub assets: PathBuf,
    /// Framebuffer device of the panel.
    pub framebuffer: PathBuf,
    /// GPIO character device.
    pub gpiochip: PathBuf,
    /// Wireless interface reported on the boot screen.
    pub interface: String,
}

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

impl Config {
    /// Read `FEARGREED_*` variables, falling back to the defaults.
    pub fn from_env() -> Self {
        Self {
            settings: env_path("FEARGREED_SETTINGS", "config.json"),
            assets: env_path("FEARGREED_ASSETS", "gifs"),
            framebuffer: env_path("FEARGREED_FRAMEBUFFER", "/dev/fb1"),
            gpiochip: env_path("FEARGREED_GPIOCHIP", "/dev/gpiochip0"),
            interface: std::env::var("FEARGREED_WLAN")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "wlan0".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variable_uses_default() {
        assert_eq!(
            env_path("FEARGREED_TEST_SURELY_UNSET", "/dev/fb1"),
            PathBuf::from("/dev/fb1")
        );
    }

    #[test]
    fn test_from_env_has_a_wireless_interface() {
        assert!(!Config::from_env().interface.is_empty());
    }
}
