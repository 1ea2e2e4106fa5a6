use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::ItemForm;

/// Inputs of the gold price calculator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInputs {
    /// Grams
    pub weight: Decimal,
    /// Price per gram
    pub gold_rate: Decimal,
    pub making_charges: Decimal,
    pub stone_value: Decimal,
}

/// `weight × gold_rate + making_charges + stone_value`, rounded to cents.
///
/// Returns `None` until both weight and gold rate are positive.
pub fn calculate_total_price(inputs: &PriceInputs) -> Option<Decimal> {
    if inputs.weight <= Decimal::ZERO || inputs.gold_rate <= Decimal::ZERO {
        return None;
    }
    let gold_value = inputs.weight * inputs.gold_rate;
    let total = gold_value + inputs.making_charges + inputs.stone_value;
    Some(total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Fills the form's total price from the calculator. Returns the derived price,
/// or `None` (leaving the form untouched) when the inputs are incomplete.
pub fn apply_to_form(form: &mut ItemForm, inputs: &PriceInputs) -> Option<Decimal> {
    let total = calculate_total_price(inputs)?;
    form.total_price = format!("{:.2}", total);
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(5), dec!(60), dec!(0), dec!(0), Some(dec!(300.00)))]
    #[case(dec!(10.5), dec!(62.75), dec!(150), dec!(80), Some(dec!(888.88)))]
    #[case(dec!(0.333), dec!(10), dec!(0), dec!(0.005), Some(dec!(3.34)))]
    #[case(dec!(0), dec!(60), dec!(10), dec!(0), None)]
    #[case(dec!(5), dec!(0), dec!(10), dec!(0), None)]
    fn calculates_gold_price(
        #[case] weight: Decimal,
        #[case] gold_rate: Decimal,
        #[case] making_charges: Decimal,
        #[case] stone_value: Decimal,
        #[case] expected: Option<Decimal>,
    ) {
        let inputs = PriceInputs {
            weight,
            gold_rate,
            making_charges,
            stone_value,
        };
        assert_eq!(calculate_total_price(&inputs), expected);
    }

    #[test]
    fn writes_two_decimal_price_into_form() {
        let mut form = ItemForm::default();
        let inputs = PriceInputs {
            weight: dec!(5),
            gold_rate: dec!(60),
            ..Default::default()
        };
        assert_eq!(apply_to_form(&mut form, &inputs), Some(dec!(300)));
        assert_eq!(form.total_price, "300.00");

        let mut untouched = ItemForm {
            total_price: "12".into(),
            ..Default::default()
        };
        assert_eq!(apply_to_form(&mut untouched, &PriceInputs::default()), None);
        assert_eq!(untouched.total_price, "12");
    }
}
