//! Reminder text shared by every transport.

use chrono::{DateTime, Utc};
use common::types::Subscription;

pub const TITLE: &str = "Subscription expiry reminder";

pub fn days_left(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    expiry
        .date_naive()
        .signed_duration_since(now.date_naive())
        .num_days()
}

fn status_line(sub: &Subscription, now: DateTime<Utc>) -> String {
    match days_left(sub.expiry_date, now) {
        0 => "expires today".to_string(),
        1 => "expires tomorrow".to_string(),
        n if n > 1 => format!("expires in {} days", n),
        n => format!("expired {} days ago", -n),
    }
}

fn item_fields(sub: &Subscription, now: DateTime<Utc>) -> (String, String) {
    let name = match sub.custom_type.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(kind) => format!("{} ({})", sub.name, kind),
        None => sub.name.clone(),
    };
    let mut detail = format!(
        "{}, {}, auto-renew {}",
        sub.expiry_date.format("%Y-%m-%d"),
        status_line(sub, now),
        if sub.auto_renew { "on" } else { "off" }
    );
    if let Some(notes) = sub.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        detail.push_str(&format!(", notes: {}", notes.trim()));
    }
    (name, detail)
}

pub fn render_text(subscriptions: &[Subscription], now: DateTime<Utc>) -> String {
    let mut out = format!("{}\n", TITLE);
    for sub in subscriptions {
        let (name, detail) = item_fields(sub, now);
        out.push_str(&format!("\n- {}: {}", name, detail));
    }
    out
}

pub fn render_markdown(subscriptions: &[Subscription], now: DateTime<Utc>) -> String {
    let mut out = format!("### {}\n", TITLE);
    for sub in subscriptions {
        let (name, detail) = item_fields(sub, now);
        out.push_str(&format!("\n> **{}**: {}", name, detail));
    }
    out
}

pub fn render_html(subscriptions: &[Subscription], now: DateTime<Utc>) -> String {
    let mut out = format!("<h2>{}</h2><ul>", TITLE);
    for sub in subscriptions {
        let (name, detail) = item_fields(sub, now);
        out.push_str(&format!(
            "<li><strong>{}</strong>: {}</li>",
            escape_html(&name),
            escape_html(&detail)
        ));
    }
    out.push_str("</ul>");
    out
}

pub fn subject(subscriptions: &[Subscription]) -> String {
    match subscriptions {
        [only] => format!("{}: {}", TITLE, only.name),
        many => format!("{}: {} subscriptions", TITLE, many.len()),
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
