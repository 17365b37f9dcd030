//! Operating system services used by the render loop.

use crate::error::HardwareError;

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

/// Available memory below which the low memory guard engages (50 MB).
pub const LOW_MEMORY_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Whether there is enough memory for animation-heavy modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStatus {
    /// At or above the threshold, or unknown.
    Sufficient,
    /// Below the threshold.
    Low,
}

impl MemoryStatus {
    /// Classify an available memory reading. Unknown counts as sufficient.
    pub fn from_available(available: Option<u64>, threshold: u64) -> Self {
        match available {
            Some(bytes) if bytes < threshold => Self::Low,
            _ => Self::Sufficient,
        }
    }
}

/// Wireless connectivity shown on the boot screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStatus {
    /// Whether an access point is associated.
    pub online: bool,
    /// SSID of the access point.
    pub ssid: Option<String>,
    /// Signal level in dBm, as reported.
    pub signal_dbm: Option<String>,
}

/// Clock, memory, network and time-setting services.
pub trait Platform: Send {
    /// Monotonic time, used for every interval in the loop.
    fn now(&self) -> Instant;

    /// Wall clock time, used for display and clock setting.
    fn wall_time(&self) -> DateTime<Utc>;

    /// Available system memory in bytes, if known.
    fn available_memory(&self) -> Option<u64>;

    /// Current wireless connectivity.
    fn network_status(&self) -> NetworkStatus;

    /// Set the system clock.
    fn set_system_time(&mut self, time: DateTime<Utc>) -> Result<(), HardwareError>;

    /// Block the loop for `duration`.
    fn sleep(&mut self, duration: Duration);
}

// =============================================================================
// Linux Implementation
// =============================================================================

/// [`Platform`] backed by `/proc`, wireless tools and `date`.
#[derive(Debug, Clone)]
pub struct LinuxPlatform {
    meminfo: PathBuf,
    interface: String,
}

impl LinuxPlatform {
    /// Platform reading `/proc/meminfo` and querying `wlan0`.
    pub fn new() -> Self {
        Self {
            meminfo: PathBuf::from("/proc/meminfo"),
            interface: "wlan0".to_string(),
        }
    }

    /// Use another wireless interface.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

/// `MemAvailable` from the contents of `/proc/meminfo`, in bytes.
pub fn parse_meminfo(text: &str) -> Option<u64> {
    text.lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// The `Signal level=-NN dBm` value from `iwconfig` output.
pub fn parse_signal_level(text: &str) -> Option<String> {
    let start = text.find("Signal level=")? + "Signal level=".len();
    let value: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if value.is_empty() { None } else { Some(value) }
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        debug!("{} exited with {}", program, output.status);
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl Platform for LinuxPlatform {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn available_memory(&self) -> Option<u64> {
        fs::read_to_string(&self.meminfo)
            .ok()
            .and_then(|text| parse_meminfo(&text))
    }

    fn network_status(&self) -> NetworkStatus {
        let ssid = command_output("iwgetid", &["-r"]).filter(|s| !s.is_empty());
        let signal_dbm = command_output("iwconfig", &[self.interface.as_str()])
            .and_then(|text| parse_signal_level(&text));
        NetworkStatus {
            online: ssid.is_some(),
            ssid,
            signal_dbm,
        }
    }

    fn set_system_time(&mut self, time: DateTime<Utc>) -> Result<(), HardwareError> {
        let stamp = time.format("%Y-%m-%d %H:%M:%S").to_string();
        info!("setting system time to {} UTC", stamp);
        let status = Command::new("sudo")
            .args(["date", "-u", "-s", stamp.as_str()])
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(HardwareError::Device(format!("date exited with {}", status)))
        }
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let text = "MemTotal:        3884360 kB\nMemFree:          123456 kB\nMemAvailable:      40960 kB\n";
        assert_eq!(parse_meminfo(text), Some(40960 * 1024));
        assert_eq!(parse_meminfo("MemTotal: 1 kB\n"), None);
    }

    #[test]
    fn test_memory_status_threshold() {
        let t = LOW_MEMORY_THRESHOLD;
        assert_eq!(MemoryStatus::from_available(Some(t - 1), t), MemoryStatus::Low);
        assert_eq!(MemoryStatus::from_available(Some(t), t), MemoryStatus::Sufficient);
        assert_eq!(MemoryStatus::from_available(None, t), MemoryStatus::Sufficient);
    }

    #[test]
    fn test_parse_signal_level() {
        let text = "wlan0  IEEE 802.11  ESSID:\"home\"\n   Link Quality=52/70  Signal level=-58 dBm\n";
        assert_eq!(parse_signal_level(text), Some("-58".to_string()));
        assert_eq!(parse_signal_level("no wireless extensions."), None);
    }

    #[test]
    fn test_with_interface_overrides_wlan0() {
        assert_eq!(LinuxPlatform::new().interface, "wlan0");
        assert_eq!(LinuxPlatform::new().with_interface("wlan1").interface, "wlan1");
    }
}
