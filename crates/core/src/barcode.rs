//! Scan classification for the sales screen.
//!
//! Keyboard-wedge scanners deliver the code as keystrokes with a trailing
//! Enter; the normalizer strips that before classification. In-store
//! weighted-item codes follow the GS1 prefix-2 scheme the label scale is
//! configured for: `2` + 6-digit item code + 5-digit price in whole colones
//! + EAN-13 check digit.

use rust_decimal::Decimal;

/// Result of classifying one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedCode {
    Ean13 { code: String },
    Ean8 { code: String },
    /// Price-embedded label from the store scale.
    Weighted { item_code: String, embedded_price: Decimal },
    /// Anything that is not a valid EAN: internal PLU or free-form code.
    Internal { code: String },
}

fn ean_checksum_valid(digits: &str) -> bool {
    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if values.len() != digits.len() || values.is_empty() {
        return false;
    }
    let check = *values.last().unwrap();
    // Weights alternate 3/1 from the rightmost payload digit.
    let sum: u32 = values[..values.len() - 1]
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - (sum % 10)) % 10 == check
}

/// Strip scanner artifacts: surrounding whitespace and wedge suffixes.
pub fn normalize_scan(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{0}')
        .to_string()
}

/// Classify a normalized scan.
pub fn classify(raw: &str) -> ScannedCode {
    let code = normalize_scan(raw);
    let all_digits = !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit());

    if all_digits && code.len() == 13 && ean_checksum_valid(&code) {
        if let Some(rest) = code.strip_prefix('2') {
            let item_code = rest[..6].to_string();
            let price_digits = &rest[6..11];
            return ScannedCode::Weighted {
                item_code,
                embedded_price: Decimal::from(price_digits.parse::<u32>().unwrap_or(0)),
            };
        }
        return ScannedCode::Ean13 { code };
    }

    if all_digits && code.len() == 8 && ean_checksum_valid(&code) {
        return ScannedCode::Ean8 { code };
    }

    ScannedCode::Internal { code }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn valid_ean13_is_recognized() {
        // Real-world CR product code with valid check digit.
        assert_eq!(
            classify("7441000000011"),
            ScannedCode::Ean13 {
                code: "7441000000011".into()
            }
        );
    }

    #[test]
    fn invalid_checksum_falls_back_to_internal() {
        assert_eq!(
            classify("7441000000012"),
            ScannedCode::Internal {
                code: "7441000000012".into()
            }
        );
    }

    #[test]
    fn weighted_code_extracts_item_and_price() {
        // 2 | 000123 | 03958 | check
        let payload = "200012303958";
        let check = (0..10)
            .find(|d| ean_checksum_valid(&format!("{}{}", payload, d)))
            .unwrap();
        let code = format!("{}{}", payload, check);
        assert_eq!(
            classify(&code),
            ScannedCode::Weighted {
                item_code: "000123".into(),
                embedded_price: dec!(3958),
            }
        );
    }

    #[test]
    fn wedge_suffix_is_stripped() {
        assert_eq!(
            classify("96385074\r\n"),
            ScannedCode::Ean8 {
                code: "96385074".into()
            }
        );
    }

    #[test]
    fn free_form_plu_stays_internal() {
        assert_eq!(
            classify("CAFE-500"),
            ScannedCode::Internal {
                code: "CAFE-500".into()
            }
        );
    }
}
