use common_money::{minor_units_from_f64, to_minor_units};
use bigdecimal::BigDecimal;
use proptest::prelude::*;
use std::str::FromStr;

proptest! {
    // Any price already expressed in whole cents converts exactly.
    #[test]
    fn exact_cents_round_trip(cents in 0i64..10_000_000) {
        let price = BigDecimal::from_str(&format!("{}.{:02}", cents / 100, cents % 100)).unwrap();
        prop_assert_eq!(to_minor_units(&price).unwrap(), cents);
    }

    // A trailing thousandth of 5 or more rounds up, anything smaller rounds down.
    #[test]
    fn half_up_on_thousandths(cents in 0i64..1_000_000, thousandth in 0i64..10) {
        let price = BigDecimal::from_str(&format!("{}.{:02}{}", cents / 100, cents % 100, thousandth)).unwrap();
        let expected = if thousandth >= 5 { cents + 1 } else { cents };
        prop_assert_eq!(to_minor_units(&price).unwrap(), expected);
    }

    // f64 inputs with two decimals never suffer binary drift.
    #[test]
    fn two_decimal_floats_are_exact(cents in 0i64..1_000_000) {
        let value: f64 = format!("{}.{:02}", cents / 100, cents % 100).parse().unwrap();
        prop_assert_eq!(minor_units_from_f64(value).unwrap(), cents);
    }
}
