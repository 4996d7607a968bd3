use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Address;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAddressRequest {
    pub recipient: String,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressList {
    pub items: Vec<Address>,
}
