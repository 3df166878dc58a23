//! Notification rendering
//!
//! Turns a [`ChangeEvent`] into an email-ready subject line and a
//! self-contained HTML card. All event text is HTML-escaped; courier pages
//! are untrusted input.

use crate::courier::Courier;
use crate::traits::ChangeEvent;

/// Characters of status text kept in the subject line
const SUBJECT_STATUS_CHARS: usize = 30;

/// Status color once a shipment is delivered
const DELIVERED_COLOR: &str = "#166534";

/// A rendered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
}

/// Brand color of a courier's card
pub fn theme_color(courier: Courier) -> &'static str {
    match courier {
        Courier::BlueDart => "#2563EB",
        Courier::Delhivery => "#DC2626",
    }
}

fn badge(courier: Courier) -> &'static str {
    match courier {
        Courier::BlueDart => "🔵",
        Courier::Delhivery => "🔴",
    }
}

/// Render the subject and body for a change event
pub fn render_message(event: &ChangeEvent) -> RenderedMessage {
    RenderedMessage {
        subject: render_subject(event),
        html: render_html(event),
    }
}

/// `"{✅|📦} {Courier}: {status prefix}..."`
pub fn render_subject(event: &ChangeEvent) -> String {
    let icon = if event.delivered { "✅" } else { "📦" };
    let status: String = event.payload.status.chars().take(SUBJECT_STATUS_CHARS).collect();
    format!("{} {}: {}...", icon, event.courier.display_name(), status)
}

/// Courier-branded HTML card
pub fn render_html(event: &ChangeEvent) -> String {
    let payload = &event.payload;
    let theme = theme_color(event.courier);
    let status_color = if event.delivered { DELIVERED_COLOR } else { theme };
    let status_icon = if event.delivered { "✅" } else { "🚚" };

    let when = match (&payload.event_date, &payload.event_time) {
        (Some(date), Some(time)) => format!("{} &bull; {}", escape_html(date), escape_html(time)),
        (Some(date), None) => escape_html(date),
        (None, Some(time)) => escape_html(time),
        (None, None) => escape_html(&payload.observed_at.format("%d %b %Y %H:%M UTC").to_string()),
    };

    let previous = match &event.previous_status {
        Some(previous) => format!(
            r#"<tr><td class="cell"><span class="label">Previously</span><span class="value">{}</span></td></tr>"#,
            escape_html(previous)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Shipment Update</title>
<style>
body {{ margin: 0; padding: 0; background: #F3F4F6; color: #1F2937; font-family: -apple-system, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; }}
.card {{ max-width: 450px; margin: 40px auto; background: #FFFFFF; border-radius: 16px; overflow: hidden; }}
.header {{ background: {theme}; padding: 20px; text-align: center; color: #FFFFFF; font-weight: 700; letter-spacing: 1px; text-transform: uppercase; }}
.content {{ padding: 32px 24px; text-align: center; }}
.icon {{ font-size: 42px; }}
.status {{ font-size: 22px; font-weight: 800; color: {status_color}; margin: 8px 0 4px; }}
.location {{ color: #6B7280; font-size: 14px; margin: 0 0 28px; }}
.details {{ width: 100%; text-align: left; background: #F9FAFB; border: 1px solid #E5E7EB; border-radius: 12px; border-spacing: 0; }}
.cell {{ padding: 12px 16px; border-bottom: 1px solid #E5E7EB; }}
.label {{ display: block; font-size: 11px; font-weight: 700; color: #6B7280; text-transform: uppercase; }}
.value {{ display: block; font-size: 15px; color: #111827; }}
.mono {{ font-family: monospace; }}
.button {{ display: inline-block; margin-top: 32px; padding: 16px 36px; background: {theme}; color: #FFFFFF; border-radius: 99px; font-weight: 700; text-decoration: none; }}
.footer {{ text-align: center; color: #9CA3AF; font-size: 12px; padding-bottom: 40px; }}
</style>
</head>
<body>
<div class="card">
<div class="header">{badge} &nbsp; {courier} update</div>
<div class="content">
<div class="icon">{status_icon}</div>
<h1 class="status">{status}</h1>
<p class="location">{location}</p>
<table class="details">
<tr><td class="cell"><span class="label">Date &amp; Time</span><span class="value">{when}</span></td></tr>
{previous}
<tr><td class="cell"><span class="label">Tracking Number</span><span class="value mono">{waybill}</span></td></tr>
</table>
<a class="button" href="{link}">Track Package</a>
</div>
</div>
<div class="footer">Sent by hytrack</div>
</body>
</html>
"#,
        theme = theme,
        status_color = status_color,
        badge = badge(event.courier),
        courier = escape_html(event.courier.display_name()),
        status_icon = status_icon,
        status = escape_html(&payload.status),
        location = escape_html(payload.location.as_deref().unwrap_or("")),
        when = when,
        previous = previous,
        waybill = escape_html(&event.waybill),
        link = escape_html(&payload.tracking_url),
    )
}

/// Escape text for use in HTML element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
