//! Reply texts, rendered for Telegram HTML parse mode.

use crate::{
    extraction::ExtractionResult,
    relay::{RelayFailure, RelayOutcome},
};

/// Sample used by `/test` and the help texts.
pub const SAMPLE_SMS: &str = "Dear Merchant, your VPA 7483185815@kbl is credited for Rs.2.00 on 12-09-25 and debited from a/c no. XX0076 (UPI Ref no 690518190930) -Karnataka Bank";

const SERVER_RESPONSE_PREVIEW: usize = 300;
const SUCCESS_BODY_PREVIEW: usize = 500;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `₹1,234.56` style rendering with thousands separators and two decimals.
pub fn format_inr(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}₹{grouped}.{frac_part}")
}

fn truncate_chars(s: &str, max: usize) -> String {
    let mut out: String = s.chars().take(max).collect();
    if out.len() < s.len() {
        out.push_str("...");
    }
    out
}

pub fn welcome_text() -> String {
    format!(
        "🤖 <b>Transaction Bot Started!</b>\n\n\
<b>What I can extract:</b>\n\
• Reference numbers (UPI Ref no 690518190930)\n\
• Money amounts (₹1,234.56, Rs 2.00, INR 1000)\n\n\
<b>Example SMS:</b>\n\
\"{}\"\n\n\
Just send me any message with transaction details!",
        escape_html(SAMPLE_SMS)
    )
}

pub fn help_text() -> String {
    "📖 <b>Help - Transaction Bot</b>\n\n\
<b>Commands:</b>\n\
/start - Show the welcome message\n\
/help - Show this help message\n\
/test - Run extraction on a sample SMS (no API call)\n\n\
<b>Recognized formats:</b>\n\
• UPI Ref no 690518190930, Ref no 12345678, Transaction ID: 12345678, Txn ID 12345678\n\
• ₹1,234.56, Rs.2.00, INR 1000, $100, amount: 2500, 500 rupees\n\n\
The first reference number and the first amount are sent to the verification API."
        .to_string()
}

pub fn nothing_found_text() -> String {
    format!(
        "❌ No reference numbers or amounts found.\n\n\
<b>Examples:</b>\n\
• UPI Ref no 690518190930\n\
• Rs.2.00\n\
• {}",
        escape_html(
            "credited for Rs.2.00 on 12-09-25 and debited from a/c no. XX0076 (UPI Ref no 690518190930)"
        )
    )
}

pub fn unauthorized_text() -> String {
    "Unauthorized. Contact the bot owner for access.".to_string()
}

fn extracted_lines(found: &ExtractionResult) -> Vec<String> {
    let mut lines = Vec::new();
    if !found.reference_numbers.is_empty() {
        lines.push(format!(
            "📝 Reference No: {}",
            escape_html(&found.reference_numbers.join(", "))
        ));
    }
    if !found.amounts.is_empty() {
        let amounts = found
            .amounts
            .iter()
            .map(|a| format_inr(*a))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("💰 Amounts: {amounts}"));
    }
    lines
}

/// Intermediate reply, sent before the relay call.
pub fn extracted_text(found: &ExtractionResult) -> String {
    let mut lines = vec!["🔍 <b>Extracted Data:</b>".to_string()];
    lines.extend(extracted_lines(found));
    lines.push("📤 Sending to API...".to_string());
    lines.join("\n")
}

/// `/test` reply: what the sample yields, without relaying it.
pub fn sample_extraction_text(found: &ExtractionResult) -> String {
    let mut lines = vec![
        "🧪 <b>Test Extraction Results:</b>".to_string(),
        String::new(),
        format!("<b>Test Message:</b> <code>{}</code>", escape_html(SAMPLE_SMS)),
        String::new(),
    ];
    let found_lines = extracted_lines(found);
    if found_lines.is_empty() {
        lines.push("None found".to_string());
    } else {
        lines.extend(found_lines);
    }
    lines.push(String::new());
    lines.push("This is a test - no API call was made.".to_string());
    lines.join("\n")
}

/// Final reply describing the relay outcome.
pub fn relay_outcome_text(outcome: &RelayOutcome) -> String {
    match outcome {
        RelayOutcome::Success { response_body } => {
            let mut msg = "✅ <b>Successfully sent to API!</b>".to_string();
            let rendered = match response_body {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_default(),
            };
            if !rendered.trim().is_empty() {
                let preview = truncate_chars(&rendered, SUCCESS_BODY_PREVIEW);
                msg.push_str(&format!(
                    "\n\n📋 <b>API Response:</b>\n<pre>{}</pre>",
                    escape_html(&preview)
                ));
            }
            msg
        }
        RelayOutcome::Failure(RelayFailure::Timeout) => {
            "❌ <b>API call failed:</b> API request timed out".to_string()
        }
        RelayOutcome::Failure(RelayFailure::Network(detail)) => format!(
            "❌ <b>API call failed:</b> Network error: {}",
            escape_html(detail)
        ),
        RelayOutcome::Failure(RelayFailure::NonOkStatus {
            status,
            body_excerpt,
        }) => {
            let mut msg = format!("❌ <b>API call failed:</b> API returned status {status}");
            if !body_excerpt.is_empty() {
                let preview: String = body_excerpt.chars().take(SERVER_RESPONSE_PREVIEW).collect();
                msg.push_str(&format!(
                    "\n\n<b>Server Response:</b>\n<pre>{}</pre>",
                    escape_html(&preview)
                ));
            }
            msg.push_str(&format!("\n<b>Status Code:</b> {status}"));
            msg
        }
    }
}
