//! Store API endpoints and typed request payloads

use reqwest::Method;
use serde::Serialize;
use validator::Validate;

use crate::domain::Address;
use crate::error::Result;

/// Cart routes, relative to the Store API base URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Cart,
    AddItem,
    UpdateItem,
    RemoveItem,
    Items,
    UpdateCustomer,
    ShippingRates,
    SelectShippingRate,
    ApplyCoupon,
    RemoveCoupon,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::AddItem => "cart/add-item",
            Self::UpdateItem => "cart/update-item",
            Self::RemoveItem => "cart/remove-item",
            Self::Items => "cart/items",
            Self::UpdateCustomer => "cart/update-customer",
            Self::ShippingRates => "cart/shipping-rates",
            Self::SelectShippingRate => "cart/select-shipping-rate",
            Self::ApplyCoupon => "cart/apply-coupon",
            Self::RemoveCoupon => "cart/remove-coupon",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AddItem {
    pub id: u64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variation: Vec<VariationAttribute>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VariationAttribute {
    pub attribute: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdateItem {
    pub key: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemoveItem {
    pub key: String,
}

/// Either address may be omitted; omitted addresses are left unchanged server-side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CustomerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
}

impl CustomerUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(billing) = &self.billing_address { billing.validate()?; }
        if let Some(shipping) = &self.shipping_address { shipping.validate()?; }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectShippingRate {
    pub package_id: u64,
    pub rate_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CouponCode {
    pub code: String,
}

/// A cart call: endpoint, method and payload travel together so a body
/// can never be sent to the wrong route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartRequest {
    GetCart,
    AddItem(AddItem),
    UpdateItem(UpdateItem),
    RemoveItem(RemoveItem),
    ClearItems,
    UpdateCustomer(CustomerUpdate),
    ShippingRates,
    SelectShippingRate(SelectShippingRate),
    ApplyCoupon(CouponCode),
    RemoveCoupon(CouponCode),
}

impl CartRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::GetCart => Endpoint::Cart,
            Self::AddItem(_) => Endpoint::AddItem,
            Self::UpdateItem(_) => Endpoint::UpdateItem,
            Self::RemoveItem(_) => Endpoint::RemoveItem,
            Self::ClearItems => Endpoint::Items,
            Self::UpdateCustomer(_) => Endpoint::UpdateCustomer,
            Self::ShippingRates => Endpoint::ShippingRates,
            Self::SelectShippingRate(_) => Endpoint::SelectShippingRate,
            Self::ApplyCoupon(_) => Endpoint::ApplyCoupon,
            Self::RemoveCoupon(_) => Endpoint::RemoveCoupon,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::GetCart | Self::ShippingRates => Method::GET,
            Self::ClearItems => Method::DELETE,
            _ => Method::POST,
        }
    }

    /// JSON body, if the route takes one.
    pub fn body(&self) -> Result<Option<Vec<u8>>> {
        let bytes = match self {
            Self::GetCart | Self::ClearItems | Self::ShippingRates => return Ok(None),
            Self::AddItem(p) => serde_json::to_vec(p)?,
            Self::UpdateItem(p) => serde_json::to_vec(p)?,
            Self::RemoveItem(p) => serde_json::to_vec(p)?,
            Self::UpdateCustomer(p) => serde_json::to_vec(p)?,
            Self::SelectShippingRate(p) => serde_json::to_vec(p)?,
            Self::ApplyCoupon(p) | Self::RemoveCoupon(p) => serde_json::to_vec(p)?,
        };
        Ok(Some(bytes))
    }
}
