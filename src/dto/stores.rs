use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Store, StoreStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateStoreRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ModerateStoreRequest {
    /// `active` approves the store, `inactive` takes it off the storefront.
    pub status: StoreStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoreList {
    pub items: Vec<Store>,
}
