use assert_matches::assert_matches;
use cafe_fulfillment::{
    entities::{
        order::{OrderType, PaymentStatus},
        product::ProductStatus,
    },
    errors::ServiceError,
    services::checkout::{validate_request, BuyerIdentity, CartLine, CheckoutRequest},
};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn request(order_type: &str) -> CheckoutRequest {
    CheckoutRequest {
        cafe_id: Uuid::new_v4(),
        buyer: BuyerIdentity {
            user_id: None,
            display_name: "Yudi".to_string(),
        },
        cart: vec![CartLine {
            id: Uuid::new_v4(),
            quantity: 1,
            price: dec!(18000),
            variations: vec![],
            addons: vec![],
        }],
        order_type: order_type.to_string(),
        payment_method: "Cash".to_string(),
        customer_notes: None,
        subtotal: dec!(18000),
        discount: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: dec!(18000),
    }
}

#[rstest]
#[case("dine-in", OrderType::DineIn)]
#[case("Dine In", OrderType::DineIn)]
#[case("dine_in", OrderType::DineIn)]
#[case("take-away", OrderType::TakeAway)]
#[case("TAKEAWAY", OrderType::TakeAway)]
fn order_type_spellings_are_accepted(#[case] raw: &str, #[case] expected: OrderType) {
    assert_eq!(validate_request(&request(raw)).unwrap(), expected);
}

#[rstest]
#[case("delivery")]
#[case("")]
#[case("dine")]
fn unknown_order_types_are_rejected(#[case] raw: &str) {
    assert_matches!(
        validate_request(&request(raw)),
        Err(ServiceError::ValidationError(_))
    );
}

#[rstest]
#[case("Cash", PaymentStatus::Unpaid)]
#[case("cash on pickup", PaymentStatus::Unpaid)]
#[case("QRIS", PaymentStatus::Paid)]
#[case("Card", PaymentStatus::Paid)]
#[case("e-wallet", PaymentStatus::Paid)]
fn payment_status_follows_method(#[case] method: &str, #[case] expected: PaymentStatus) {
    assert_eq!(PaymentStatus::for_method(method), expected);
}

#[rstest]
#[case(5, ProductStatus::Available)]
#[case(1, ProductStatus::Available)]
#[case(0, ProductStatus::Unavailable)]
#[case(-2, ProductStatus::Unavailable)]
fn product_status_tracks_stock(#[case] stock: i32, #[case] expected: ProductStatus) {
    assert_eq!(ProductStatus::for_stock(stock), expected);
}

#[rstest]
#[case(dec!(-1))]
#[case(Decimal::ZERO)]
fn non_positive_totals_are_rejected(#[case] total: Decimal) {
    let mut req = request("dine-in");
    req.total = total;
    assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
}

#[test]
fn negative_line_price_is_rejected() {
    let mut req = request("take-away");
    req.cart[0].price = dec!(-500);
    assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
}
