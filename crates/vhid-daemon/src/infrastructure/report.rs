//! Statistics reports for the observability surface.
//!
//! The text form mirrors the per-device status pages a driver would expose:
//! one block per device, one `name: value` line per counter.  The JSON form is
//! the serialised [`StatisticsSnapshot`] plus the live settings.

use std::fmt::Write as _;

use serde::Serialize;
use vhid_core::{DeviceSettings, PacketFraming, StatisticsSnapshot};

use crate::application::inject::Reply;

/// One-line answer to a command; statistics expand to the full text report.
pub fn render_reply(reply: &Reply, settings: &DeviceSettings) -> String {
    match reply {
        Reply::Injected { accepted, dropped } => {
            format!("ok accepted={accepted} dropped={dropped}")
        }
        Reply::Value(setting, value) => format!("{} = {value}", setting.name()),
        Reply::Stats(snapshot) => render_text(snapshot, settings),
        Reply::Reset(Some(device)) => format!("reset {}", device.as_str()),
        Reply::Reset(None) => "reset all".to_string(),
    }
}

/// Renders the plain-text report.
pub fn render_text(snapshot: &StatisticsSnapshot, settings: &DeviceSettings) -> String {
    let kbd = &snapshot.keyboard;
    let ptr = &snapshot.pointer;
    let tch = &snapshot.touch;
    let framing = match settings.packet_framing {
        PacketFraming::Standard => "standard (3 bytes)",
        PacketFraming::IntelliMouse => "intellimouse (4 bytes)",
    };

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "keyboard");
    let _ = writeln!(out, "  uptime_secs:       {}", kbd.uptime_secs);
    let _ = writeln!(out, "  key_presses:       {}", kbd.key_presses);
    let _ = writeln!(out, "  key_releases:      {}", kbd.key_releases);
    let _ = writeln!(out, "  unknown_scancodes: {}", kbd.unknown_scancodes);
    let _ = writeln!(out, "  combos:            {}", kbd.combos);
    let _ = writeln!(out, "  overflows:         {}", kbd.overflows);
    let _ = writeln!(out, "  repeat_delay_ms:   {}", settings.repeat_delay_ms);
    let _ = writeln!(out, "  repeat_rate_ms:    {}", settings.repeat_rate_ms);

    let _ = writeln!(out, "pointer");
    let _ = writeln!(out, "  uptime_secs:       {}", ptr.uptime_secs);
    let _ = writeln!(out, "  packets:           {}", ptr.packets);
    let _ = writeln!(out, "  invalid_packets:   {}", ptr.invalid_packets);
    let _ = writeln!(out, "  overflows:         {}", ptr.overflows);
    let _ = writeln!(
        out,
        "  clicks:            {} (left {}, right {}, middle {}, side {}, forward {})",
        ptr.total_clicks,
        ptr.left_clicks,
        ptr.right_clicks,
        ptr.middle_clicks,
        ptr.side_clicks,
        ptr.forward_clicks
    );
    let _ = writeln!(out, "  scroll_events:     {}", ptr.scroll_events);
    let _ = writeln!(out, "  total_dx:          {}", ptr.total_dx);
    let _ = writeln!(out, "  total_dy:          {}", ptr.total_dy);
    let _ = writeln!(out, "  total_distance:    {}", ptr.total_distance);
    let _ = writeln!(out, "  dpi_percent:       {}", settings.dpi_percent);
    let _ = writeln!(out, "  framing:           {framing}");

    let _ = writeln!(out, "touch");
    let _ = writeln!(out, "  uptime_secs:       {}", tch.uptime_secs);
    let _ = writeln!(out, "  touches:           {}", tch.touches);
    let _ = writeln!(out, "  moves:             {}", tch.moves);
    let _ = writeln!(out, "  taps:              {}", tch.taps);
    let _ = writeln!(out, "  two_finger_taps:   {}", tch.two_finger_taps);
    let _ = writeln!(out, "  scrolls:           {}", tch.scrolls);
    let _ = writeln!(out, "  rejected:          {}", tch.rejected);
    let _ = writeln!(out, "  overflows:         {}", tch.overflows);
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    statistics: &'a StatisticsSnapshot,
    settings: &'a DeviceSettings,
}

/// Renders the JSON report.
///
/// # Errors
///
/// Returns the serializer error; with plain counters this does not happen in
/// practice.
pub fn render_json(
    snapshot: &StatisticsSnapshot,
    settings: &DeviceSettings,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport {
        statistics: snapshot,
        settings,
    })
}
