//! Reference-number and amount extraction from free-form bank/UPI message text.
//!
//! Both extractors run an ordered pattern list over the whole text, collect
//! every match pattern-by-pattern, then deduplicate keeping first occurrence.
//! Patterns are not anchored to word boundaries and overlapping matches from
//! different patterns are expected; only exact duplicates are collapsed.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;

/// Label variants for reference numbers, most specific first. Payload is 8-20 digits.
const REFERENCE_PATTERNS: &[&str] = &[
    r"(?i)UPI\s*Ref(?:erence)?\s*(?:no\.?|number)?\s*[:\-]?\s*(\d{8,20})",
    r"(?i)Ref(?:erence)?\s*(?:no\.?|number)?\s*[:\-]?\s*(\d{8,20})",
    r"(?i)Transaction\s*ID[:\-]?\s*(\d{8,20})",
    r"(?i)Txn\s*ID[:\-]?\s*(\d{8,20})",
];

/// Currency notations. Each captures digits with optional thousands separators
/// and at most two decimal places.
const AMOUNT_PATTERNS: &[&str] = &[
    r"(?i)₹\s*([\d,]+(?:\.\d{2})?)",
    r"(?i)Rs\.?\s*([\d,]+(?:\.\d{2})?)",
    r"(?i)INR\s*([\d,]+(?:\.\d{2})?)",
    r"(?i)\$\s*([\d,]+(?:\.\d{2})?)",
    r"(?i)amount\s*:?\s*([\d,]+(?:\.\d{2})?)",
    r"(?i)([\d,]+(?:\.\d{2})?)\s*(?:rupees|rs)",
    r"(?i)credited\s+for\s+Rs\.?\s*([\d,]+(?:\.\d{2})?)",
    r"(?i)debited\s+for\s+Rs\.?\s*([\d,]+(?:\.\d{2})?)",
];

static REFERENCE_RES: OnceLock<Vec<Regex>> = OnceLock::new();
static AMOUNT_RES: OnceLock<Vec<Regex>> = OnceLock::new();

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

fn reference_res() -> &'static [Regex] {
    REFERENCE_RES.get_or_init(|| compile(REFERENCE_PATTERNS))
}

fn amount_res() -> &'static [Regex] {
    AMOUNT_RES.get_or_init(|| compile(AMOUNT_PATTERNS))
}

/// Everything found in one message. Built once, never mutated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionResult {
    pub reference_numbers: Vec<String>,
    pub amounts: Vec<f64>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.reference_numbers.is_empty() && self.amounts.is_empty()
    }
}

pub fn extract(text: &str) -> ExtractionResult {
    ExtractionResult {
        reference_numbers: extract_reference_numbers(text),
        amounts: extract_amounts(text),
    }
}

pub fn extract_reference_numbers(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    reference_res()
        .iter()
        .flat_map(|re| captures(re, text))
        .filter(|m| seen.insert(*m))
        .map(str::to_string)
        .collect()
}

pub fn extract_amounts(text: &str) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    for raw in amount_res().iter().flat_map(|re| captures(re, text)) {
        // A bare "," fails here; drop just that match.
        let Ok(value) = normalize_amount(raw).parse::<f64>() else {
            continue;
        };
        if !out.iter().any(|seen| *seen == value) {
            out.push(value);
        }
    }
    out
}

/// First code point (digit zero) of every run of ten decimal digits that `\d`
/// accepts, ASCII first.
const DIGIT_ZEROS: &[u32] = &[
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66,
    0x0CE6, 0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946,
    0x19D0, 0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0,
    0xA9F0, 0xAA50, 0xABF0, 0xFF10, 0x104A0, 0x10D30, 0x11066, 0x110F0, 0x11136, 0x111D0,
    0x112F0, 0x11450, 0x114D0, 0x11650, 0x116C0, 0x11730, 0x118E0, 0x11950, 0x11C50, 0x11D50,
    0x11DA0, 0x16A60, 0x16B50, 0x1D7CE, 0x1D7D8, 0x1D7E2, 0x1D7EC, 0x1D7F6, 0x1E140, 0x1E2F0,
    0x1E950, 0x1FBF0,
];

fn ascii_digit(c: char) -> Option<char> {
    let cp = c as u32;
    DIGIT_ZEROS
        .iter()
        .find(|zero| (**zero..**zero + 10).contains(&cp))
        .and_then(|zero| char::from_digit(cp - zero, 10))
}

/// Drop thousands separators and fold any script's decimal digits to ASCII.
fn normalize_amount(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != ',')
        .map(|c| ascii_digit(c).unwrap_or(c))
        .collect()
}

fn captures<'t>(re: &'t Regex, text: &'t str) -> impl Iterator<Item = &'t str> + 't {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANK_SMS: &str = "Dear Merchant, your VPA 7483185815@kbl is credited for Rs.2.00 on 12-09-25 \
and debited from a/c no. XX0076 (UPI Ref no 690518190930) -Karnataka Bank";

    #[test]
    fn rupee_symbol_without_reference_label() {
        let r = extract("Payment of ₹15,000 completed via UTR123456789");
        assert_eq!(r.amounts, vec![15000.0]);
        assert!(r.reference_numbers.is_empty());
    }

    #[test]
    fn credited_sms_collapses_overlapping_amount_matches() {
        let r = extract(
            "credited for Rs.2.00 on 12-09-25 and debited from a/c no. XX0076 (UPI Ref no 690518190930)",
        );
        assert_eq!(r.reference_numbers, vec!["690518190930".to_string()]);
        assert_eq!(r.amounts, vec![2.0]);
    }

    #[test]
    fn full_bank_sms() {
        let r = extract(BANK_SMS);
        assert_eq!(r.reference_numbers, vec!["690518190930".to_string()]);
        assert_eq!(r.amounts, vec![2.0]);
    }

    #[test]
    fn reference_label_variants() {
        assert_eq!(
            extract_reference_numbers("UPI Ref no: 123456789012"),
            vec!["123456789012".to_string()]
        );
        assert_eq!(
            extract_reference_numbers("reference number - 98765432"),
            vec!["98765432".to_string()]
        );
        assert_eq!(
            extract_reference_numbers("transaction id:55556666777788"),
            vec!["55556666777788".to_string()]
        );
        assert_eq!(
            extract_reference_numbers("TXN ID-11112222"),
            vec!["11112222".to_string()]
        );
    }

    #[test]
    fn dot_directly_after_ref_label_is_not_accepted() {
        assert!(extract_reference_numbers("UPI Ref. no 123456789012").is_empty());
    }

    #[test]
    fn reference_payload_length_bounds() {
        assert!(extract_reference_numbers("Ref no 1234567").is_empty());
        // Greedy: a 21-digit run yields its first 20 digits.
        assert_eq!(
            extract_reference_numbers("Ref no 123456789012345678901"),
            vec!["12345678901234567890".to_string()]
        );
    }

    #[test]
    fn references_keep_first_seen_order_across_patterns() {
        let refs = extract_reference_numbers(
            "Txn ID 33333333 then Ref no 22222222 and UPI Ref 11111111, again Ref 22222222",
        );
        // UPI pattern first, then generic Ref (which re-finds 11111111), then Txn.
        assert_eq!(refs, vec!["11111111", "22222222", "33333333"]);
    }

    #[test]
    fn amount_notations() {
        assert_eq!(extract_amounts("₹1,234.56"), vec![1234.56]);
        assert_eq!(extract_amounts("INR 1000"), vec![1000.0]);
        assert_eq!(extract_amounts("Transaction of $100.99"), vec![100.99]);
        assert_eq!(extract_amounts("Transfer amount: 2500"), vec![2500.0]);
        assert_eq!(extract_amounts("Payment 2500 rupees"), vec![2500.0]);
    }

    #[test]
    fn amounts_dedup_by_value_in_first_seen_order() {
        assert_eq!(
            extract_amounts("amount: 1000 rs 500 INR 750"),
            vec![500.0, 750.0, 1000.0]
        );
        assert_eq!(extract_amounts("₹1,000 and Rs 1000.00"), vec![1000.0]);
    }

    #[test]
    fn separator_only_capture_is_dropped_not_fatal() {
        assert_eq!(extract_amounts("Rs , then ₹ 40"), vec![40.0]);
    }

    #[test]
    fn devanagari_digits_are_read_as_amounts() {
        let r = extract("₹१५,००० जमा किया गया");
        assert_eq!(r.amounts, vec![15000.0]);
        assert!(r.reference_numbers.is_empty());
    }

    #[test]
    fn mixed_script_amounts_dedup_by_value() {
        assert_eq!(
            extract_amounts("Rs ২০০.৫০ and INR 200.50 and ₹૩"),
            vec![200.5, 3.0]
        );
    }

    #[test]
    fn nothing_to_find() {
        let r = extract("hello there, see you at 5");
        assert!(r.is_empty());
    }

    #[test]
    fn extraction_is_deterministic_and_duplicate_free() {
        let inputs = [
            BANK_SMS,
            "Rs 10 Rs 10 ₹10 INR 10.00 $10 Ref no 12345678 Ref no 12345678",
            "amount: 1,00,000.50 Txn ID 99999999 UPI Ref 99999999",
        ];
        for input in inputs {
            let a = extract(input);
            let b = extract(input);
            assert_eq!(a, b);

            let unique: HashSet<_> = a.reference_numbers.iter().collect();
            assert_eq!(unique.len(), a.reference_numbers.len());
            for (i, x) in a.amounts.iter().enumerate() {
                assert!(!a.amounts[i + 1..].contains(x), "duplicate {x} in {input}");
            }
        }
    }
}
