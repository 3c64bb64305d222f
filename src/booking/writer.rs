use tracing::info;
use ulid::Ulid;

use crate::limits::REGISTRATION_NUMBER_LEN;
use crate::model::Pass;
use crate::store::{PutOutcome, Table};

use super::BookingError;

/// Fresh registration number: the last ten characters of a new ULID, i.e.
/// 50 random bits in Crockford base32. Fixed length, no ambiguous letters,
/// short enough to read over the phone.
pub fn registration_number() -> String {
    let ulid = Ulid::new().to_string();
    let code = ulid[ulid.len() - REGISTRATION_NUMBER_LEN..].to_string();
    debug_assert_eq!(code.len(), REGISTRATION_NUMBER_LEN);
    code
}

/// Insert the pass unless its `(pk, sk)` is taken.
pub async fn write_pass(table: &dyn Table, pass: &Pass) -> Result<(), BookingError> {
    match table.put_pass_if_absent(pass).await? {
        PutOutcome::Inserted => {
            info!(
                pk = %pass.pk(),
                sk = pass.sk(),
                facility = %pass.facility_name,
                date = %pass.short_pass_date,
                pass_type = %pass.pass_type,
                guests = pass.number_of_guests,
                status = ?pass.pass_status,
                "pass created"
            );
            Ok(())
        }
        PutOutcome::KeyExists => Err(BookingError::DuplicateKey(pass.registration_number.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn registration_numbers_are_fixed_length_base32() {
        for _ in 0..100 {
            let code = registration_number();
            assert_eq!(code.len(), REGISTRATION_NUMBER_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn registration_numbers_do_not_repeat() {
        let codes: HashSet<String> = (0..10_000).map(|_| registration_number()).collect();
        assert_eq!(codes.len(), 10_000);
    }
}
