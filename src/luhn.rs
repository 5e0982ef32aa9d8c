// Luhn checksum over card-number digits
//
// Pure functions only. Malformed input yields None / false instead of an error.

/// Total length of a card number, check digit included
pub const CARD_LENGTH: usize = 16;

/// Digits covered by the checksum (everything except the check digit)
pub const PAYLOAD_LENGTH: usize = CARD_LENGTH - 1;

fn parse_digits(input: &str) -> Option<Vec<u32>> {
    input.chars().map(|c| c.to_digit(10)).collect()
}

/// Luhn sum of a payload that does not yet carry its check digit.
///
/// The rightmost payload digit sits next to the check digit, so it is the
/// first one doubled.
fn luhn_sum(payload: &[u32]) -> u32 {
    payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 0 {
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
        .sum()
}

/// Check digit for an arbitrary non-empty digit string
pub fn check_digit(payload: &str) -> Option<u8> {
    if payload.is_empty() {
        return None;
    }
    let digits = parse_digits(payload)?;
    Some(((10 - luhn_sum(&digits) % 10) % 10) as u8)
}

/// Check digit for `issuer prefix + account identifier`.
///
/// The two parts must add up to the 15 payload digits of a card number.
///
/// # Example
/// ```
/// use simple_bank::luhn::compute_check_digit;
///
/// assert_eq!(compute_check_digit("400000", "123456789"), Some(9));
/// assert_eq!(compute_check_digit("400000", "12345"), None);
/// ```
pub fn compute_check_digit(prefix: &str, account: &str) -> Option<u8> {
    if prefix.len() + account.len() != PAYLOAD_LENGTH {
        return None;
    }
    check_digit(&format!("{}{}", prefix, account))
}

/// True when `card` is 16 ASCII digits whose last digit is the Luhn check digit
pub fn is_valid(card: &str) -> bool {
    if card.len() != CARD_LENGTH || !card.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (payload, last) = card.split_at(PAYLOAD_LENGTH);
    match (check_digit(payload), last.parse::<u8>()) {
        (Some(expected), Ok(actual)) => expected == actual,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_known_check_digit() {
        assert_eq!(compute_check_digit("400000", "123456789"), Some(9));
        assert!(is_valid("4000001234567899"));
    }

    #[rstest]
    #[case("4111111111111111")]
    #[case("4000008449433403")]
    #[case("5500000000000004")]
    #[case("0000000000000000")]
    fn test_valid_numbers(#[case] card: &str) {
        assert!(is_valid(card), "{} should pass", card);
    }

    #[rstest]
    #[case("")]
    #[case("4000001234567898")]
    #[case("400000123456789")]
    #[case("40000012345678990")]
    #[case("400000123456789a")]
    #[case("4000 00123456789")]
    #[case("４000001234567899")]
    #[case("-400000123456789")]
    fn test_invalid_numbers(#[case] card: &str) {
        assert!(!is_valid(card), "{:?} should fail", card);
    }

    #[test]
    fn test_check_digit_rejects_malformed_payload() {
        assert_eq!(check_digit(""), None);
        assert_eq!(check_digit("12x4"), None);
        assert_eq!(compute_check_digit("40000a", "123456789"), None);
        assert_eq!(compute_check_digit("", ""), None);
    }

    #[test]
    fn test_single_digit_error_detected() {
        let card = "4000001234567899";
        for pos in 0..CARD_LENGTH {
            let mut bytes = card.as_bytes().to_vec();
            bytes[pos] = if bytes[pos] == b'9' { b'0' } else { bytes[pos] + 1 };
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(!is_valid(&mutated), "mutation at {} not detected", pos);
        }
    }

    proptest! {
        #[test]
        fn prop_computed_digit_validates(prefix in "[0-9]{6}", account in "[0-9]{9}") {
            let d = compute_check_digit(&prefix, &account).unwrap();
            prop_assert!(d <= 9);
            let full = format!("{}{}{}", prefix, account, d);
            prop_assert!(is_valid(&full));
        }

        #[test]
        fn prop_wrong_length_is_invalid(card in "[0-9]{0,15}|[0-9]{17,20}") {
            prop_assert!(!is_valid(&card));
        }
    }
}
