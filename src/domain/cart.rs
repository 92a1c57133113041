//! Cart snapshot as returned by the Store API
//!
//! A snapshot mirrors server state wholesale; nothing here mutates it.
//! Prices are integer strings in the currency's minor unit.

use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::domain::value_objects::{Money, MoneyError};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
    #[serde(default)]
    pub coupons: Vec<CartCoupon>,
    #[serde(default)]
    pub shipping_rates: Vec<ShippingPackage>,
    #[serde(default)]
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default)]
    pub items_count: u32,
    #[serde(default)]
    pub needs_shipping: bool,
    #[serde(default)]
    pub needs_payment: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyInfo {
    pub currency_code: String,
    pub currency_minor_unit: u32,
}

impl CurrencyInfo {
    pub fn money(&self, minor: &str) -> Result<Money, MoneyError> {
        Money::from_minor_units(minor, self.currency_minor_unit, &self.currency_code)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartItem {
    pub key: String,
    pub id: u64,
    pub quantity: u32,
    pub name: String,
    pub sku: String,
    pub prices: ItemPrices,
    pub totals: LineTotals,
}

impl CartItem {
    pub fn unit_price(&self) -> Result<Money, MoneyError> { self.prices.currency.money(&self.prices.price) }
    pub fn line_total(&self) -> Result<Money, MoneyError> { self.totals.currency.money(&self.totals.line_total) }
    pub fn is_on_sale(&self) -> bool {
        !self.prices.sale_price.is_empty() && self.prices.sale_price != self.prices.regular_price
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemPrices {
    pub price: String,
    pub regular_price: String,
    pub sale_price: String,
    #[serde(flatten)]
    pub currency: CurrencyInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineTotals {
    pub line_subtotal: String,
    pub line_subtotal_tax: String,
    pub line_total: String,
    pub line_total_tax: String,
    #[serde(flatten)]
    pub currency: CurrencyInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartTotals {
    pub total_items: String,
    pub total_items_tax: String,
    pub total_fees: String,
    pub total_discount: String,
    /// `null` until the customer address allows rates to be calculated.
    pub total_shipping: Option<String>,
    pub total_tax: String,
    pub total_price: String,
    #[serde(flatten)]
    pub currency: CurrencyInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartCoupon {
    pub code: String,
    pub discount_type: String,
    pub totals: CouponTotals,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouponTotals {
    pub total_discount: String,
    pub total_discount_tax: String,
    #[serde(flatten)]
    pub currency: CurrencyInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingPackage {
    pub package_id: u64,
    pub name: String,
    pub shipping_rates: Vec<ShippingRate>,
}

impl ShippingPackage {
    pub fn selected_rate(&self) -> Option<&ShippingRate> { self.shipping_rates.iter().find(|r| r.selected) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingRate {
    pub rate_id: String,
    pub name: String,
    pub description: String,
    pub method_id: String,
    pub price: String,
    pub selected: bool,
    #[serde(flatten)]
    pub currency: CurrencyInfo,
}

impl ShippingRate {
    pub fn price(&self) -> Result<Money, MoneyError> { self.currency.money(&self.price) }
}

/// Billing or shipping address. `email` only exists on billing addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    /// ISO 3166-1 alpha-2, or empty.
    #[validate(length(max = 2))]
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    pub phone: String,
}

impl Cart {
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Sum of item quantities.
    pub fn quantity(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    pub fn item(&self, key: &str) -> Option<&CartItem> { self.items.iter().find(|i| i.key == key) }

    pub fn item_for_product(&self, product_id: u64) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == product_id)
    }

    pub fn has_coupon(&self, code: &str) -> bool {
        self.coupons.iter().any(|c| c.code.eq_ignore_ascii_case(code))
    }

    pub fn total(&self) -> Result<Money, MoneyError> { self.totals.currency.money(&self.totals.total_price) }

    /// Sum of line totals after discounts, before shipping, fees and tax.
    pub fn items_total(&self) -> Result<Money, MoneyError> {
        let zero = Money::zero(&self.totals.currency.currency_code);
        self.items.iter().try_fold(zero, |acc, item| acc.add(&item.line_total()?))
    }
}
