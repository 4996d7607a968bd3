use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub address_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub session_id: String,
    /// Where to send the buyer to complete payment.
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price captured at checkout time; reconciliation copies this
    /// value instead of re-reading the live product.
    pub unit_price: i64,
}

/// One future order: every line a single vendor will fulfil.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorGroup {
    pub store_id: Uuid,
    pub items: Vec<CheckoutLine>,
}

/// What the buyer agreed to purchase, carried through the hosted payment
/// flow as opaque session metadata. Never persisted locally; its lifetime
/// is bounded by the session's expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutIntent {
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub groups: Vec<VendorGroup>,
}

impl CheckoutIntent {
    /// Build an intent from per-product lines, grouping by vendor while
    /// preserving first-seen vendor order.
    pub fn group_by_store(
        user_id: Uuid,
        address_id: Uuid,
        lines: impl IntoIterator<Item = (Uuid, CheckoutLine)>,
    ) -> Self {
        let mut groups: Vec<VendorGroup> = Vec::new();
        for (store_id, line) in lines {
            match groups.iter_mut().find(|g| g.store_id == store_id) {
                Some(group) => group.items.push(line),
                None => groups.push(VendorGroup {
                    store_id,
                    items: vec![line],
                }),
            }
        }
        Self {
            user_id,
            address_id,
            groups,
        }
    }

    pub fn total(&self) -> i64 {
        self.groups
            .iter()
            .flat_map(|g| g.items.iter())
            .map(|line| line.unit_price * i64::from(line.quantity))
            .sum()
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price: i64) -> CheckoutLine {
        CheckoutLine {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn groups_lines_by_vendor_preserving_order() {
        let (store_a, store_b) = (Uuid::new_v4(), Uuid::new_v4());
        let intent = CheckoutIntent::group_by_store(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![
                (store_a, line(2, 1000)),
                (store_b, line(1, 2500)),
                (store_a, line(3, 400)),
            ],
        );

        assert_eq!(intent.groups.len(), 2);
        assert_eq!(intent.groups[0].store_id, store_a);
        assert_eq!(intent.groups[0].items.len(), 2);
        assert_eq!(intent.groups[1].store_id, store_b);
        assert_eq!(intent.groups[1].items.len(), 1);
    }

    #[test]
    fn total_sums_quantity_times_unit_price() {
        // Cart {p1: 2 @ 10, p2: 1 @ 25} totals 45.
        let store = Uuid::new_v4();
        let intent = CheckoutIntent::group_by_store(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![(store, line(2, 10)), (store, line(1, 25))],
        );
        assert_eq!(intent.total(), 45);
    }

    #[test]
    fn survives_the_metadata_round_trip() {
        let intent = CheckoutIntent::group_by_store(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![(Uuid::new_v4(), line(1, 999))],
        );
        let encoded = intent.encode().unwrap();
        assert_eq!(CheckoutIntent::decode(&encoded).unwrap(), intent);
    }

    #[test]
    fn rejects_garbage_metadata() {
        assert!(CheckoutIntent::decode("not json").is_err());
        assert!(CheckoutIntent::decode(r#"{"user_id": 7}"#).is_err());
    }
}
