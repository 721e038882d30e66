//! Payment session requests built from orders.

use domain::{Money, Order};
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::services::payment::{
    CustomerDetails, GatewayAddress, ItemDetail, SessionRequest, TransactionDetails,
};

/// Contact details of the paying customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// Outcome of a payment token request.
///
/// Gateway refusals are reported here rather than as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTokenResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentTokenResult {
    pub fn created(token: String, redirect_url: String) -> Self {
        Self {
            success: true,
            token: Some(token),
            redirect_url: Some(redirect_url),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            token: None,
            redirect_url: None,
            error: Some(error.into()),
        }
    }
}

/// First amount in `order` that whole-unit session fields cannot carry
/// exactly, if any.
pub fn fractional_amount(order: &Order) -> Option<Money> {
    order
        .items()
        .iter()
        .map(|item| item.unit_price)
        .chain([order.shipping_cost(), order.total_amount()])
        .find(|amount| !amount.is_whole())
}

/// Builds the session request for `order`: its frozen lines plus a
/// `SHIPPING` line when shipping is charged.
///
/// Amounts are sent in whole units; callers reject orders for which
/// [`fractional_amount`] returns an amount.
pub fn session_request(
    order: &Order,
    contact: &CustomerContact,
    config: &GatewayConfig,
) -> SessionRequest {
    let mut item_details: Vec<ItemDetail> = order
        .items()
        .iter()
        .map(|item| ItemDetail {
            id: item.product_id.to_string(),
            price: item.unit_price.major(),
            quantity: item.quantity,
            name: item.product_name.clone(),
        })
        .collect();

    if order.shipping_cost().is_positive() {
        item_details.push(ItemDetail {
            id: "SHIPPING".to_string(),
            price: order.shipping_cost().major(),
            quantity: 1,
            name: "Shipping Cost".to_string(),
        });
    }

    let address = order.shipping_address();
    SessionRequest {
        transaction_details: TransactionDetails {
            order_id: order.order_number().to_string(),
            gross_amount: order.total_amount().major(),
        },
        customer_details: CustomerDetails {
            first_name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            shipping_address: GatewayAddress {
                first_name: contact.name.clone(),
                phone: contact.phone.clone(),
                address: address.address.clone(),
                city: address.city.clone(),
                postal_code: address.postal_code.clone(),
                country_code: "IDN".to_string(),
            },
        },
        item_details,
        callbacks: config.callbacks(),
    }
}
