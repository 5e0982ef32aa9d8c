// 💳 Account - card number, PIN and balance
//
// Card number layout: 6-digit issuer prefix + 9-digit account identifier + Luhn check digit.
// The number and PIN never change after creation; only the balance moves.

use crate::error::{BankError, BankResult};
use crate::luhn;
use rand::Rng;

pub const ISSUER_PREFIX_LENGTH: usize = 6;
pub const ACCOUNT_ID_LENGTH: usize = luhn::PAYLOAD_LENGTH - ISSUER_PREFIX_LENGTH;
pub const PIN_LENGTH: usize = 4;

// ============================================================================
// ACCOUNT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// 16-digit Luhn-valid card number, unique across the store
    pub number: String,

    /// 4-digit PIN
    pub pin: String,

    /// Smallest currency unit
    pub balance: i64,
}

impl Account {
    /// Fresh account with a generated number and PIN and a zero balance
    pub fn generate<R: Rng + ?Sized>(issuer_prefix: &str, rng: &mut R) -> BankResult<Self> {
        Ok(Account {
            number: generate_card_number(issuer_prefix, rng)?,
            pin: generate_pin(rng),
            balance: 0,
        })
    }

    /// Card number reduced to its last 4 digits, for logs and listings
    pub fn masked_number(&self) -> String {
        mask_card_number(&self.number)
    }
}

/// Example: "4000001234567899" → "*7899"
pub fn mask_card_number(number: &str) -> String {
    if number.len() <= 4 || !number.is_ascii() {
        return number.to_string();
    }
    format!("*{}", &number[number.len() - 4..])
}

// ============================================================================
// GENERATION
// ============================================================================

pub fn generate_card_number<R: Rng + ?Sized>(issuer_prefix: &str, rng: &mut R) -> BankResult<String> {
    let account_id: String = (0..ACCOUNT_ID_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();

    let check = luhn::compute_check_digit(issuer_prefix, &account_id)
        .filter(|_| issuer_prefix.len() == ISSUER_PREFIX_LENGTH)
        .ok_or_else(|| BankError::InvalidIssuerPrefix(issuer_prefix.to_string()))?;

    Ok(format!("{}{}{}", issuer_prefix, account_id, check))
}

pub fn generate_pin<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:04}", rng.gen_range(0..10_000u16))
}

// ============================================================================
// FORMAT VALIDATION
// ============================================================================

/// Length and digit check only; the checksum is `validate_card_number`'s job
pub fn is_well_formed_card_number(number: &str) -> bool {
    number.len() == luhn::CARD_LENGTH && number.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_card_number(number: &str) -> BankResult<()> {
    if !is_well_formed_card_number(number) {
        return Err(BankError::MalformedCardNumber(number.to_string()));
    }
    if !luhn::is_valid(number) {
        return Err(BankError::ChecksumMismatch(number.to_string()));
    }
    Ok(())
}

pub fn validate_pin(pin: &str) -> BankResult<()> {
    if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(BankError::MalformedPin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_generated_account_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        let account = Account::generate("400000", &mut rng).unwrap();

        assert_eq!(account.number.len(), 16);
        assert!(account.number.starts_with("400000"));
        assert!(luhn::is_valid(&account.number));
        assert!(validate_pin(&account.pin).is_ok());
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_generated_numbers_are_valid_and_mostly_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        let numbers: HashSet<String> = (0..500)
            .map(|_| generate_card_number("400000", &mut rng).unwrap())
            .collect();

        assert!(numbers.len() > 495);
        assert!(numbers.iter().all(|n| luhn::is_valid(n)));
    }

    #[test]
    fn test_bad_prefix_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            generate_card_number("4000", &mut rng),
            Err(BankError::InvalidIssuerPrefix(_))
        ));
        assert!(matches!(
            generate_card_number("40000x", &mut rng),
            Err(BankError::InvalidIssuerPrefix(_))
        ));
    }

    #[test]
    fn test_pin_is_zero_padded() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let pin = generate_pin(&mut rng);
            assert_eq!(pin.len(), 4, "{}", pin);
        }
    }

    #[test]
    fn test_validate_card_number() {
        assert!(validate_card_number("4000001234567899").is_ok());
        assert!(matches!(
            validate_card_number("4000001234567898"),
            Err(BankError::ChecksumMismatch(_))
        ));
        assert!(matches!(
            validate_card_number("40000012345"),
            Err(BankError::MalformedCardNumber(_))
        ));
        assert!(matches!(
            validate_card_number(""),
            Err(BankError::MalformedCardNumber(_))
        ));
    }

    #[test]
    fn test_validate_pin() {
        assert!(validate_pin("0042").is_ok());
        assert!(validate_pin("042").is_err());
        assert!(validate_pin("12345").is_err());
        assert!(validate_pin("12a4").is_err());
    }

    #[test]
    fn test_mask_card_number() {
        assert_eq!(mask_card_number("4000001234567899"), "*7899");
        assert_eq!(mask_card_number("1234"), "1234");
        assert_eq!(mask_card_number(""), "");
    }
}
