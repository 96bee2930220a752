//! Per-pattern validators that confirm a regex hit is structurally plausible
//! before it is trusted as a span (§4.B Stage 1). Each one is a pure
//! `fn(&str) -> bool` over the matched text, independent of surrounding
//! context — context scoring happens later, in Stage 3.

/// Standard Luhn (mod 10) checksum over the digit characters of `value`.
pub fn luhn_check(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 2 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Rejects SSNs whose area/group/serial fall in ranges the SSA never issues.
/// The regex already excludes the bulk of these; this is a defense-in-depth
/// check for callers that construct a `Span` from a pre-extracted value.
pub fn validate_ssn(value: &str) -> bool {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 9 {
        return false;
    }

    let area: u32 = digits[0..3].parse().unwrap_or(0);
    let group: u32 = digits[3..5].parse().unwrap_or(0);
    let serial: u32 = digits[5..9].parse().unwrap_or(0);

    area != 0 && area != 666 && area < 900 && group != 0 && serial != 0
}

pub fn validate_credit_card(value: &str) -> bool {
    luhn_check(value)
}

/// NPI check digit: prefix the first 9 digits with the constant `80840`,
/// Luhn-validate the 15-digit result against the 10th (check) digit.
pub fn validate_npi(value: &str) -> bool {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 10 {
        return false;
    }
    let prefixed = format!("80840{digits}");
    luhn_check(&prefixed)
}

/// ABA routing checksum: `3*(d1+d4+d7) + 7*(d2+d5+d8) + (d3+d6+d9) ≡ 0 (mod 10)`.
pub fn validate_aba_routing(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 9 {
        return false;
    }

    let checksum = 3 * (digits[0] + digits[3] + digits[6])
        + 7 * (digits[1] + digits[4] + digits[7])
        + (digits[2] + digits[5] + digits[8]);

    checksum % 10 == 0
}

/// IBAN mod-97 validation (ISO 7064): move the first four characters to the
/// end, convert letters to their two-digit numeric value (A=10..Z=35), and
/// check the resulting number mod 97 == 1.
pub fn validate_iban(value: &str) -> bool {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).map(|c| c.to_ascii_uppercase()).collect();
    if cleaned.len() < 15 || cleaned.len() > 34 {
        return false;
    }
    if !cleaned.chars().take(2).all(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    let rearranged = format!("{}{}", &cleaned[4..], &cleaned[..4]);

    let mut remainder: u64 = 0;
    for c in rearranged.chars() {
        let value = if c.is_ascii_digit() {
            c.to_digit(10).unwrap() as u64
        } else if c.is_ascii_uppercase() {
            (c as u64) - ('A' as u64) + 10
        } else {
            return false;
        };

        let digit_count = if value >= 10 { 2 } else { 1 };
        for _ in 0..digit_count {
            let digit = if digit_count == 2 { value / 10 } else { value % 10 };
            remainder = (remainder * 10 + digit) % 97;
            if digit_count == 2 {
                remainder = (remainder * 10 + value % 10) % 97;
                break;
            }
        }
    }

    remainder == 1
}

/// VIN check digit (position 9, 0-indexed 8): weighted sum over a
/// transliteration table, mod 11, with `X` representing 10.
pub fn validate_vin(value: &str) -> bool {
    const WEIGHTS: [u32; 17] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];

    let vin: Vec<char> = value.chars().filter(|c| c.is_ascii_alphanumeric()).map(|c| c.to_ascii_uppercase()).collect();
    if vin.len() != 17 {
        return false;
    }

    let transliterate = |c: char| -> Option<u32> {
        match c {
            '0'..='9' => c.to_digit(10),
            'A' | 'J' => Some(1),
            'B' | 'K' | 'S' => Some(2),
            'C' | 'L' | 'T' => Some(3),
            'D' | 'M' | 'U' => Some(4),
            'E' | 'N' | 'V' => Some(5),
            'F' | 'W' => Some(6),
            'G' | 'P' | 'X' => Some(7),
            'H' | 'Y' => Some(8),
            'R' | 'Z' => Some(9),
            'I' | 'O' | 'Q' => None,
            _ => None,
        }
    };

    let mut sum = 0u32;
    for (i, &c) in vin.iter().enumerate() {
        let Some(digit) = transliterate(c) else {
            return false;
        };
        sum += digit * WEIGHTS[i];
    }

    let remainder = sum % 11;
    let expected = if remainder == 10 { 'X' } else { char::from_digit(remainder, 10).unwrap() };
    vin[8] == expected
}

/// 9-character alphanumeric identifier with a check digit — shared shape
/// used for both CUSIP and (as a prefix) ISIN validation.
fn cusip_checksum(value: &str) -> bool {
    let chars: Vec<char> = value.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if chars.len() != 9 {
        return false;
    }

    let char_value = |c: char| -> Option<u32> {
        match c {
            '0'..='9' => c.to_digit(10),
            'A'..='Z' => Some((c as u32) - ('A' as u32) + 10),
            '*' => Some(36),
            '@' => Some(37),
            '#' => Some(38),
            _ => None,
        }
    };

    let mut sum = 0u32;
    for (i, &c) in chars[..8].iter().enumerate() {
        let Some(v) = char_value(c.to_ascii_uppercase()) else {
            return false;
        };
        let mut v = if i % 2 == 1 { v * 2 } else { v };
        if v > 9 {
            v = v / 10 + v % 10;
        }
        sum += v;
    }

    let check = (10 - (sum % 10)) % 10;
    chars[8].to_digit(10) == Some(check)
}

pub fn validate_cusip(value: &str) -> bool {
    cusip_checksum(value)
}

pub fn validate_isin(value: &str) -> bool {
    let chars: Vec<char> = value.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if chars.len() != 12 {
        return false;
    }
    // The ISIN check digit is the last character; the preceding 9 national
    // security identifier characters follow the same Luhn-over-expanded-
    // alphanumeric scheme as CUSIP, applied after expanding letters to
    // two-digit values across the whole 12-character string.
    let mut expanded = String::new();
    for &c in &chars[..11] {
        if c.is_ascii_alphabetic() {
            expanded.push_str(&((c.to_ascii_uppercase() as u32 - 'A' as u32 + 10)).to_string());
        } else {
            expanded.push(c);
        }
    }
    luhn_check(&format!("{expanded}{}", chars[11]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_accepts_a_known_valid_card_number() {
        assert!(luhn_check("4532015112830366"));
    }

    #[test]
    fn luhn_rejects_a_single_digit_flip() {
        assert!(!luhn_check("4532015112830367"));
    }

    #[test]
    fn ssn_rejects_reserved_area_numbers() {
        assert!(!validate_ssn("000-12-3456"));
        assert!(!validate_ssn("666-12-3456"));
        assert!(!validate_ssn("900-12-3456"));
    }

    #[test]
    fn ssn_accepts_a_plausible_number() {
        assert!(validate_ssn("123-45-6789"));
    }

    #[test]
    fn aba_routing_validates_known_checksum() {
        assert!(validate_aba_routing("021000021"));
    }

    #[test]
    fn iban_validates_a_known_good_number() {
        assert!(validate_iban("GB82WEST12345698765432"));
    }

    #[test]
    fn iban_rejects_a_bad_checksum() {
        assert!(!validate_iban("GB82WEST12345698765431"));
    }

    #[test]
    fn npi_validates_luhn_with_prefix() {
        assert!(validate_npi("1234567893"));
    }
}
