//! Purchasables

use rust_decimal::Decimal;

/// Line item kind that carries a shipping charge.
pub const SHIPMENT_KIND: &str = "shipment";

/// A single charge line on an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    kind: String,
    price: Decimal,
}

impl LineItem {
    /// Creates a line item of the given kind and price.
    pub fn new(kind: impl Into<String>, price: Decimal) -> Self {
        LineItem {
            kind: kind.into(),
            price,
        }
    }

    /// The line item kind, e.g. `"shipment"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The price this line contributes to the total.
    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Whether this line carries the shipping charge.
    pub fn is_shipment(&self) -> bool {
        self.kind == SHIPMENT_KIND
    }
}

/// A finalized purchase with materialized line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    subtotal: Decimal,
    line_items: Vec<LineItem>,
}

impl Order {
    /// Creates an order with the given subtotal and line items.
    pub fn new(subtotal: Decimal, line_items: impl Into<Vec<LineItem>>) -> Self {
        Order {
            subtotal,
            line_items: line_items.into(),
        }
    }

    /// The order subtotal, before adjustments.
    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    /// The order's line items, in order.
    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    /// The first shipment line item, if the order carries one.
    pub fn shipment_line_item(&self) -> Option<&LineItem> {
        self.line_items.iter().find(|line| line.is_shipment())
    }
}

/// An in-progress purchase.
///
/// Shipping is not yet materialized as a line item; callers supply the
/// quoted shipping cost separately when pricing free-shipping coupons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    subtotal: Decimal,
}

impl Cart {
    /// Creates a cart with the given subtotal.
    pub fn new(subtotal: Decimal) -> Self {
        Cart { subtotal }
    }

    /// The cart subtotal, before adjustments.
    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }
}

/// The cart or order a coupon is evaluated against.
///
/// A closed set of variants, so adding a third purchasable kind forces
/// every dispatch site to handle it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purchasable {
    /// A finalized purchase.
    Order(Order),

    /// An in-progress purchase.
    Cart(Cart),
}

impl Purchasable {
    /// The purchasable's subtotal, before adjustments.
    pub fn subtotal(&self) -> Decimal {
        match self {
            Purchasable::Order(order) => order.subtotal(),
            Purchasable::Cart(cart) => cart.subtotal(),
        }
    }

    /// The purchasable's line items; empty for carts, where they are not
    /// yet materialized.
    pub fn line_items(&self) -> &[LineItem] {
        match self {
            Purchasable::Order(order) => order.line_items(),
            Purchasable::Cart(_) => &[],
        }
    }
}

impl From<Order> for Purchasable {
    fn from(order: Order) -> Self {
        Purchasable::Order(order)
    }
}

impl From<Cart> for Purchasable {
    fn from(cart: Cart) -> Self {
        Purchasable::Cart(cart)
    }
}
