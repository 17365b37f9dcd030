//! Drawing of every visual on a [`Frame`].

use crate::data::{MarketSnapshot, SentimentPoint};
use crate::error::RenderError;
use crate::frame::{Frame, HEIGHT, WIDTH};
use crate::menu::{SettingsRow, TimeRow};
use crate::platform::NetworkStatus;
use crate::settings::AppSettings;

use chrono::{DateTime, Local, Utc};
use embedded_graphics::mono_font::iso_8859_1::{FONT_6X10, FONT_9X15, FONT_9X18_BOLD, FONT_10X20};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, Line, PrimitiveStyle, Rectangle, Triangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use qrcode::QrCode;

/// Counting frames of the price ticker.
pub const TICKER_COUNT_FRAMES: usize = 10;
/// Fixed USD to GBP rate of the ticker's second line.
pub const USD_TO_GBP: f64 = 0.79;
/// Daily closes drawn by the historical graph.
pub const GRAPH_POINTS: usize = 5;
/// Steps used to draw one graph segment.
pub const GRAPH_SEGMENT_STEPS: usize = 5;
/// Drawing frames of the historical graph.
pub const GRAPH_STEP_FRAMES: usize = (GRAPH_POINTS - 1) * GRAPH_SEGMENT_STEPS;

const CENTER_X: i32 = WIDTH as i32 / 2;
const BITCOIN_ORANGE: Rgb888 = Rgb888::new(247, 147, 26);
const GRAY: Rgb888 = Rgb888::new(128, 128, 128);
const DARK_GRAY: Rgb888 = Rgb888::new(60, 60, 60);
const UP_GREEN: Rgb888 = Rgb888::new(0, 200, 80);
const DOWN_RED: Rgb888 = Rgb888::new(220, 40, 40);
const TERMINAL_GREEN: Rgb888 = Rgb888::new(0, 255, 0);

// =============================================================================
// Helpers
// =============================================================================

fn text(
    frame: &mut Frame,
    s: &str,
    at: Point,
    font: &'static MonoFont<'static>,
    color: Rgb888,
    alignment: Alignment,
) {
    let style = MonoTextStyle::new(font, color);
    let layout = TextStyleBuilder::new()
        .alignment(alignment)
        .baseline(Baseline::Top)
        .build();
    let _ = Text::with_text_style(s, at, style, layout).draw(frame);
}

fn centered(frame: &mut Frame, s: &str, y: i32, font: &'static MonoFont<'static>, color: Rgb888) {
    text(frame, s, Point::new(CENTER_X, y), font, color, Alignment::Center);
}

fn fill(frame: &mut Frame, area: Rectangle, color: Rgb888) {
    let _ = area
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(frame);
}

/// Format with thousands separators and a fixed number of decimals.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(f) = frac {
        grouped.push('.');
        grouped.push_str(f);
    }
    if value < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn compact_price(price: f64) -> String {
    if price >= 1000.0 {
        format!("{:.1}k", price / 1000.0)
    } else {
        format!("{:.0}", price)
    }
}

fn local_stamp(time: DateTime<Utc>, pattern: &str) -> String {
    time.with_timezone(&Local).format(pattern).to_string()
}

// =============================================================================
// Error
// =============================================================================

/// Red message on black.
pub fn error_frame(message: &str) -> Frame {
    let mut frame = Frame::black();
    centered(
        &mut frame,
        message,
        HEIGHT as i32 / 2 - 10,
        &FONT_10X20,
        Rgb888::RED,
    );
    frame
}

// =============================================================================
// Price Ticker
// =============================================================================

/// The price counting up from zero, one frame per step.
pub fn price_ticker(snapshot: &MarketSnapshot) -> Result<Vec<Frame>, RenderError> {
    let price = snapshot.price.ok_or(RenderError::MissingData("price"))?;
    let stamp = local_stamp(snapshot.fetched_at, "%Y-%m-%d %H:%M:%S");

    let frames = (1..=TICKER_COUNT_FRAMES)
        .map(|step| {
            let shown = price * step as f64 / TICKER_COUNT_FRAMES as f64;
            let mut frame = Frame::black();
            centered(&mut frame, "Current Price", 20, &FONT_10X20, Rgb888::WHITE);
            centered(
                &mut frame,
                &format!("${}", group_thousands(shown, 2)),
                75,
                &FONT_10X20,
                BITCOIN_ORANGE,
            );
            centered(
                &mut frame,
                &format!("£{}", group_thousands(shown * USD_TO_GBP, 2)),
                110,
                &FONT_9X15,
                Rgb888::WHITE,
            );
            if let Some(change) = snapshot.change_24h {
                let color = if change >= 0.0 { UP_GREEN } else { DOWN_RED };
                centered(
                    &mut frame,
                    &format!("24h: {:+.2}%", change),
                    145,
                    &FONT_9X15,
                    color,
                );
            }
            centered(
                &mut frame,
                &format!("Data: {}", stamp),
                215,
                &FONT_6X10,
                GRAY,
            );
            frame
        })
        .collect();
    Ok(frames)
}

// =============================================================================
// Volume
// =============================================================================

/// The 24h volume in billions.
pub fn volume(snapshot: &MarketSnapshot) -> Result<Frame, RenderError> {
    let volume = snapshot
        .volume_24h
        .ok_or(RenderError::MissingData("volume"))?;
    let mut frame = Frame::black();
    centered(&mut frame, "Bitcoin", 60, &FONT_10X20, BITCOIN_ORANGE);
    centered(
        &mut frame,
        &format!("24h Vol: ${:.1}B", volume / 1e9),
        110,
        &FONT_10X20,
        Rgb888::WHITE,
    );
    Ok(frame)
}

// =============================================================================
// Historical Graph
// =============================================================================

const PLOT_LEFT: i32 = 50;
const PLOT_RIGHT: i32 = 300;
const PLOT_TOP: i32 = 45;
const PLOT_BOTTOM: i32 = 195;

fn plot_points(prices: &[f64]) -> Vec<Point> {
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let last = (prices.len() - 1).max(1) as f64;

    prices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let x = PLOT_LEFT as f64 + i as f64 * (PLOT_RIGHT - PLOT_LEFT) as f64 / last;
            let y = PLOT_BOTTOM as f64 - (p - min) / span * (PLOT_BOTTOM - PLOT_TOP) as f64;
            Point::new(x.round() as i32, y.round() as i32)
        })
        .collect()
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(
        a.x + ((b.x - a.x) as f64 * t).round() as i32,
        a.y + ((b.y - a.y) as f64 * t).round() as i32,
    )
}

fn arrow_head(from: Point, tip: Point) -> Triangle {
    let dx = (tip.x - from.x) as f64;
    let dy = (tip.y - from.y) as f64;
    let len = (dx * dx + dy * dy).sqrt().max(1.0);
    let (ux, uy) = (dx / len, dy / len);
    let (bx, by) = (tip.x as f64 - ux * 12.0, tip.y as f64 - uy * 12.0);
    let (px, py) = (-uy * 6.0, ux * 6.0);
    Triangle::new(
        tip,
        Point::new((bx + px).round() as i32, (by + py).round() as i32),
        Point::new((bx - px).round() as i32, (by - py).round() as i32),
    )
}

fn graph_background(frame: &mut Frame, prices: &[f64], sentiment: &[SentimentPoint]) {
    centered(frame, "5 Day Price Movement", 8, &FONT_9X18_BOLD, Rgb888::WHITE);

    let axis = PrimitiveStyle::with_stroke(GRAY, 1);
    let _ = Line::new(
        Point::new(PLOT_LEFT - 5, PLOT_TOP),
        Point::new(PLOT_LEFT - 5, PLOT_BOTTOM + 5),
    )
    .into_styled(axis)
    .draw(frame);
    let _ = Line::new(
        Point::new(PLOT_LEFT - 5, PLOT_BOTTOM + 5),
        Point::new(PLOT_RIGHT + 5, PLOT_BOTTOM + 5),
    )
    .into_styled(axis)
    .draw(frame);

    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    text(
        frame,
        &compact_price(max),
        Point::new(2, PLOT_TOP - 4),
        &FONT_6X10,
        GRAY,
        Alignment::Left,
    );
    text(
        frame,
        &compact_price(min),
        Point::new(2, PLOT_BOTTOM - 4),
        &FONT_6X10,
        GRAY,
        Alignment::Left,
    );

    for (i, point) in plot_points(prices).iter().enumerate() {
        let days_ago = prices.len() - 1 - i;
        let label = if days_ago == 0 {
            "now".to_string()
        } else {
            format!("-{}d", days_ago)
        };
        text(
            frame,
            &label,
            Point::new(point.x, PLOT_BOTTOM + 9),
            &FONT_6X10,
            GRAY,
            Alignment::Center,
        );
    }

    if !sentiment.is_empty() {
        let values: Vec<String> = sentiment.iter().map(|p| p.value.to_string()).collect();
        centered(
            frame,
            &format!("F&G: {}", values.join(" ")),
            226,
            &FONT_6X10,
            GRAY,
        );
    }
}

/// The last five closes drawn segment by segment, with a moving dot.
///
/// Needs at least [`GRAPH_POINTS`] closes; only the last ones are drawn.
pub fn historical_graph(
    prices: &[f64],
    sentiment: &[SentimentPoint],
) -> Result<Vec<Frame>, RenderError> {
    if prices.len() < GRAPH_POINTS {
        return Err(RenderError::MissingData("price history"));
    }
    let prices = &prices[prices.len() - GRAPH_POINTS..];
    let points = plot_points(prices);

    let mut base = Frame::black();
    graph_background(&mut base, prices, sentiment);

    let mut frames = Vec::with_capacity(GRAPH_STEP_FRAMES);
    for index in 0..GRAPH_STEP_FRAMES {
        let segment = index / GRAPH_SEGMENT_STEPS;
        let t = (index % GRAPH_SEGMENT_STEPS + 1) as f64 / GRAPH_SEGMENT_STEPS as f64;
        let mut frame = base.clone();

        for s in 0..=segment {
            let start = points[s];
            let end = if s == segment {
                lerp(points[s], points[s + 1], t)
            } else {
                points[s + 1]
            };
            let color = if prices[s + 1] >= prices[s] {
                UP_GREEN
            } else {
                DOWN_RED
            };
            let _ = Line::new(start, end)
                .into_styled(PrimitiveStyle::with_stroke(color, 3))
                .draw(&mut frame);

            if s == segment {
                let _ = Circle::with_center(end, 8)
                    .into_styled(PrimitiveStyle::with_fill(Rgb888::WHITE))
                    .draw(&mut frame);
            }
        }

        if index == GRAPH_STEP_FRAMES - 1 {
            let last = GRAPH_POINTS - 1;
            let color = if prices[last] >= prices[last - 1] {
                UP_GREEN
            } else {
                DOWN_RED
            };
            let _ = arrow_head(points[last - 1], points[last])
                .into_styled(PrimitiveStyle::with_fill(color))
                .draw(&mut frame);
        }
        frames.push(frame);
    }
    Ok(frames)
}

// =============================================================================
// QR Code
// =============================================================================

/// QR code of the donation address.
pub fn qr_code(address: &str) -> Result<Frame, RenderError> {
    let code = QrCode::new(address.as_bytes()).map_err(|e| RenderError::Qr(e.to_string()))?;
    let modules = code.width();
    let quiet = 2;
    let scale = (180 / (modules + 2 * quiet)).max(1);
    let side = (modules + 2 * quiet) * scale;
    let left = (WIDTH as usize).saturating_sub(side) as i32 / 2;
    let top = 28;

    let mut frame = Frame::black();
    centered(&mut frame, "Donate Bitcoin", 4, &FONT_10X20, BITCOIN_ORANGE);
    fill(
        &mut frame,
        Rectangle::new(Point::new(left, top), Size::new(side as u32, side as u32)),
        Rgb888::WHITE,
    );
    for y in 0..modules {
        for x in 0..modules {
            if code[(x, y)] == qrcode::Color::Dark {
                let origin = Point::new(
                    left + ((x + quiet) * scale) as i32,
                    top + ((y + quiet) * scale) as i32,
                );
                fill(
                    &mut frame,
                    Rectangle::new(origin, Size::new(scale as u32, scale as u32)),
                    Rgb888::BLACK,
                );
            }
        }
    }

    let caption: String = address.chars().take(52).collect();
    centered(
        &mut frame,
        &caption,
        top + side as i32 + 6,
        &FONT_6X10,
        Rgb888::WHITE,
    );
    Ok(frame)
}

// =============================================================================
// Menus
// =============================================================================

fn menu_row(frame: &mut Frame, label: &str, y: i32, height: u32, selected: bool) {
    if selected {
        fill(
            frame,
            Rectangle::new(Point::new(10, y - 2), Size::new(WIDTH - 20, height)),
            DARK_GRAY,
        );
    }
    let color = if selected {
        Rgb888::YELLOW
    } else {
        Rgb888::WHITE
    };
    let marker = if selected { "> " } else { "  " };
    text(
        frame,
        &format!("{}{}", marker, label),
        Point::new(14, y),
        &FONT_9X15,
        color,
        Alignment::Left,
    );
}

/// The settings menu with `selected` highlighted.
pub fn settings_menu(settings: &AppSettings, selected: SettingsRow) -> Frame {
    let mut frame = Frame::black();
    centered(&mut frame, "Settings", 6, &FONT_10X20, BITCOIN_ORANGE);
    for (i, row) in SettingsRow::ALL.iter().enumerate() {
        menu_row(
            &mut frame,
            &row.label(settings),
            34 + i as i32 * 26,
            20,
            *row == selected,
        );
    }
    frame
}

/// The clock screen showing `adjusted` with `selected` highlighted.
pub fn time_setting(adjusted: DateTime<Utc>, selected: TimeRow) -> Frame {
    let mut frame = Frame::black();
    centered(&mut frame, "Set System Time", 6, &FONT_10X20, BITCOIN_ORANGE);
    centered(
        &mut frame,
        &format!("New: {}", local_stamp(adjusted, "%Y-%m-%d %H:%M")),
        32,
        &FONT_9X15,
        Rgb888::WHITE,
    );
    for (i, row) in TimeRow::ALL.iter().enumerate() {
        menu_row(&mut frame, row.label(), 60 + i as i32 * 25, 19, *row == selected);
    }
    frame
}

// =============================================================================
// Boot
// =============================================================================

/// Boot lines for the given network status.
pub fn boot_lines(network: &NetworkStatus) -> Vec<String> {
    let mut lines = vec![
        "SYSTEM BOOT v1.1".to_string(),
        "INITIALIZING HARDWARE...".to_string(),
        "CHECKING NETWORK INTERFACE".to_string(),
    ];
    if network.online {
        lines.push("NETWORK ONLINE".to_string());
        if let Some(ssid) = &network.ssid {
            lines.push(format!("SSID: {}", ssid));
        }
        if let Some(signal) = &network.signal_dbm {
            lines.push(format!("SIGNAL: {} dBm", signal));
        }
    } else {
        lines.push("NETWORK OFFLINE".to_string());
    }
    lines.push("BOOT COMPLETE - PRESS ANY KEY".to_string());
    lines
}

/// The boot terminal, one more line per frame.
pub fn boot_frames(network: &NetworkStatus) -> Vec<Frame> {
    let lines = boot_lines(network);
    let mut frame = Frame::black();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            text(
                &mut frame,
                line,
                Point::new(10, 12 + i as i32 * 24),
                &FONT_9X15,
                TERMINAL_GREEN,
                Alignment::Left,
            );
            frame.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(price: Option<f64>) -> MarketSnapshot {
        MarketSnapshot {
            price,
            change_24h: Some(-3.2),
            volume_24h: Some(21_500_000_000.0),
            fetched_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(43_000.5, 2), "43,000.50");
        assert_eq!(group_thousands(999.0, 2), "999.00");
        assert_eq!(group_thousands(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(group_thousands(-1500.0, 0), "-1,500");
    }

    #[test]
    fn test_error_frame_is_red_on_black() {
        let frame = error_frame("Low Memory");
        assert!(frame.lit_pixels() > 0);
        assert!(
            frame
                .pixels()
                .iter()
                .all(|p| *p == Rgb888::BLACK || *p == Rgb888::RED)
        );
    }

    #[test]
    fn test_price_ticker_frames_differ() {
        let frames = price_ticker(&snapshot(Some(43_000.0))).unwrap();
        assert_eq!(frames.len(), TICKER_COUNT_FRAMES);
        assert_ne!(frames[0], frames[TICKER_COUNT_FRAMES - 1]);
        assert!(price_ticker(&snapshot(None)).is_err());
    }

    #[test]
    fn test_volume_needs_value() {
        assert!(volume(&snapshot(None)).is_ok());
        let mut missing = snapshot(None);
        missing.volume_24h = None;
        assert!(matches!(volume(&missing), Err(RenderError::MissingData(_))));
    }

    #[test]
    fn test_graph_frames_grow() {
        let frames = historical_graph(&[10.0, 12.0, 11.0, 15.0, 14.0, 18.0], &[]).unwrap();
        assert_eq!(frames.len(), GRAPH_STEP_FRAMES);
        assert!(frames[GRAPH_STEP_FRAMES - 1].lit_pixels() > frames[0].lit_pixels());
    }

    #[test]
    fn test_graph_handles_flat_prices() {
        assert!(historical_graph(&[5.0; 5], &[]).is_ok());
    }

    #[test]
    fn test_plot_points_span_plot_area() {
        let points = plot_points(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(points[0], Point::new(PLOT_LEFT, PLOT_BOTTOM));
        assert_eq!(points[4], Point::new(PLOT_RIGHT, PLOT_TOP));
    }

    #[test]
    fn test_qr_code_draws_modules() {
        let frame = qr_code("bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh").unwrap();
        let white = frame.pixels().iter().filter(|p| **p == Rgb888::WHITE).count();
        let black = frame.pixels().iter().filter(|p| **p == Rgb888::BLACK).count();
        assert!(white > 1000);
        assert!(black > white);
    }

    #[test]
    fn test_boot_lines_reflect_network() {
        let offline = boot_lines(&NetworkStatus::default());
        assert!(offline.contains(&"NETWORK OFFLINE".to_string()));

        let online = boot_lines(&NetworkStatus {
            online: true,
            ssid: Some("home".to_string()),
            signal_dbm: Some("-58".to_string()),
        });
        assert!(online.contains(&"SSID: home".to_string()));
        assert!(online.contains(&"SIGNAL: -58 dBm".to_string()));
        assert_eq!(
            online.last().map(String::as_str),
            Some("BOOT COMPLETE - PRESS ANY KEY")
        );
        assert_eq!(boot_frames(&NetworkStatus::default()).len(), offline.len());
    }

    #[test]
    fn test_menus_highlight_selection() {
        let settings = AppSettings::default();
        let a = settings_menu(&settings, SettingsRow::DisplayTime);
        let b = settings_menu(&settings, SettingsRow::Exit);
        assert_ne!(a, b);

        let wall = Utc::now();
        assert_ne!(
            time_setting(wall, TimeRow::Year),
            time_setting(wall, TimeRow::Back)
        );
    }
}
