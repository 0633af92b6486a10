//! Property-based tests for pricing and recipe costing.

use cafe_fulfillment::services::{
    checkout::order_number,
    pricing::compute_pricing,
    recipe_cost::{RecipeGraph, RecipeLine},
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn cost_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn percent_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..5_000).prop_map(|basis| Decimal::new(basis, 2))
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000).prop_map(|milli| Decimal::new(milli, 3))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn suggested_price_never_undercuts_cost(
        cost in cost_strategy(),
        margin in percent_strategy(),
        tax in percent_strategy(),
    ) {
        // Both percentages stay below 50, so the divisor is always positive.
        let quote = compute_pricing(cost, margin, tax, dec!(1.2), dec!(2.5)).unwrap();
        prop_assert!(quote.suggested_price >= quote.ingredient_cost.round_dp(2));
        prop_assert!(quote.min_price <= quote.max_price);
        prop_assert!(quote.suggested_price.scale() <= 2);
    }

    #[test]
    fn margin_and_tax_reaching_one_hundred_are_rejected(
        cost in cost_strategy(),
        margin in 0i64..=100,
    ) {
        let tax = Decimal::from(100 - margin);
        prop_assert!(compute_pricing(cost, Decimal::from(margin), tax, dec!(1.2), dec!(2.5)).is_err());
    }

    #[test]
    fn recipe_cost_is_linear_in_material_cost(
        unit_cost in cost_strategy(),
        direct in quantity_strategy(),
        per_sub in quantity_strategy(),
        sub_units in quantity_strategy(),
    ) {
        let product = Uuid::new_v4();
        let material = Uuid::new_v4();
        let sub = Uuid::new_v4();

        let mut graph = RecipeGraph::default();
        graph.add_product_line(product, RecipeLine::material(material, direct));
        graph.add_product_line(product, RecipeLine::sub_recipe(sub, sub_units));
        graph.add_sub_recipe_line(sub, RecipeLine::material(material, per_sub));
        graph.set_material_cost(material, unit_cost);

        let expected = unit_cost * (direct + sub_units * per_sub);
        prop_assert_eq!(graph.ingredient_cost(product).unwrap(), expected);

        let needs = graph.material_requirements(product, Decimal::from(3)).unwrap();
        prop_assert_eq!(needs, vec![(material, (direct + sub_units * per_sub) * Decimal::from(3))]);
    }

    #[test]
    fn order_numbers_are_dated_and_upper_case(seed in any::<u128>(), day in 1u32..=28) {
        let id = Uuid::from_u128(seed);
        let at = Utc.with_ymd_and_hms(2024, 2, day, 12, 0, 0).unwrap();
        let number = order_number(id, at);

        prop_assert_eq!(number.len(), "ORD-20240201-".len() + 8);
        let expected_prefix = format!("ORD-202402{:02}-", day);
        prop_assert!(number.starts_with(&expected_prefix));
        prop_assert_eq!(number.to_uppercase(), number.clone());
    }
}
