//! Cart snapshot model
pub mod cart;
pub mod value_objects;

pub use cart::{Address, Cart, CartCoupon, CartItem, CartTotals, CurrencyInfo, ShippingPackage, ShippingRate};
pub use value_objects::{Money, MoneyError};
