use rust_decimal::{Decimal, RoundingStrategy};

/// Every stored amount carries exactly two fractional digits.
pub const MONEY_SCALE: u32 = 2;

/// Round to two places, ties away from zero, and pad the scale so that
/// `10` is rendered as `10.00`.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// `base * percent / 100`, rounded like any other amount.
pub fn percent_of(base: Decimal, percent: Decimal) -> Decimal {
    round_money(base * percent / Decimal::ONE_HUNDRED)
}

/// Sum a list of amounts and round the result.
pub fn sum_money<'a, I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = &'a Decimal>,
{
    round_money(amounts.into_iter().copied().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(0.005)), dec!(0.01));
    }

    #[test]
    fn test_scale_is_padded() {
        let rounded = round_money(dec!(10));
        assert_eq!(rounded.scale(), 2);
        assert_eq!(rounded.to_string(), "10.00");
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(dec!(150), dec!(12.5)), dec!(18.75));
        assert_eq!(percent_of(dec!(33.33), dec!(10)), dec!(3.33));
        assert_eq!(percent_of(dec!(0), dec!(50)), dec!(0.00));
    }

    #[test]
    fn test_sum_money() {
        let amounts = vec![dec!(1.10), dec!(2.205), dec!(3)];
        assert_eq!(sum_money(&amounts), dec!(6.31));
    }
}
