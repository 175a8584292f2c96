//! Order lifecycle service.
//!
//! Orders are created once from a server-side snapshot of the catalog and
//! afterwards only move through the status and payment state machines. Every
//! state change is a compare-and-swap on the order version, so two concurrent
//! updates can never silently overwrite each other.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use toyshop_core::{
    Caller, DEFAULT_PAYMENT_METHOD, OrderId, OrderStatus, Payment, PaymentUpdate, Price,
    ProductId, Quantity, ShippingAddress, UserId,
};

use super::CommerceError;
use crate::models::{NewOrder, Order, OrderDetails, OrderItem};
use crate::store::Store;

/// Rules that vary per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPolicy {
    /// Whether owners may still delete an order once it has shipped.
    /// Administrators are never restricted.
    pub owner_cancel_after_shipment: bool,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            owner_cancel_after_shipment: true,
        }
    }
}

/// One requested order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A request to place an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaceOrder {
    pub order_items: Vec<OrderLineRequest>,
    pub shipping_address: ShippingAddress,
    /// Defaults to [`DEFAULT_PAYMENT_METHOD`].
    pub payment_method: Option<String>,
    /// Client's idea of the total. Checked against the computed total.
    pub total_price: Option<Price>,
}

impl PlaceOrder {
    /// Validate quantities and merge lines for the same product, keeping the
    /// order in which products first appear.
    fn merged_lines(&self) -> Result<Vec<(ProductId, Quantity)>, CommerceError> {
        if self.order_items.is_empty() {
            return Err(CommerceError::InvalidInput("No order items".to_owned()));
        }

        let mut lines: Vec<(ProductId, Quantity)> = Vec::with_capacity(self.order_items.len());
        let mut positions: BTreeMap<ProductId, usize> = BTreeMap::new();
        for item in &self.order_items {
            let quantity = Quantity::new(item.quantity)?;
            if let Some(&pos) = positions.get(&item.product_id) {
                lines[pos].1 = lines[pos].1.merge(quantity)?;
            } else {
                positions.insert(item.product_id, lines.len());
                lines.push((item.product_id, quantity));
            }
        }
        Ok(lines)
    }
}

/// Order operations.
pub struct OrderService<'a, S> {
    store: &'a S,
    policy: OrderPolicy,
}

impl<'a, S: Store> OrderService<'a, S> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(store: &'a S, policy: OrderPolicy) -> Self {
        Self { store, policy }
    }

    async fn fetch(&self, id: OrderId) -> Result<Order, CommerceError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Order"))
    }

    /// Explain a compare-and-swap that matched no row: the order was either
    /// deleted or moved to a newer version since it was read.
    async fn lost_update(&self, id: OrderId) -> CommerceError {
        match self.store.get_order(id).await {
            Ok(Some(_)) => CommerceError::Conflict(
                "Order was modified concurrently; reload and retry".to_owned(),
            ),
            Ok(None) => CommerceError::not_found("Order"),
            Err(err) => err.into(),
        }
    }

    /// Place an order for the caller.
    ///
    /// Names, brands and unit prices are copied from the catalog as it is
    /// now; later catalog edits never reach the order.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::InvalidInput` for an empty or malformed item
    /// list, an incomplete address, a blank payment method or a total that
    /// disagrees with the computed one, and `CommerceError::NotFound` if a
    /// product does not exist.
    #[instrument(skip(self, request), fields(user_id = %caller.user_id))]
    pub async fn create(&self, caller: &Caller, request: PlaceOrder) -> Result<Order, CommerceError> {
        let lines = request.merged_lines()?;
        let shipping_address = request.shipping_address.validated()?;
        let payment = Payment::pending(
            request
                .payment_method
                .as_deref()
                .unwrap_or(DEFAULT_PAYMENT_METHOD),
        )?;

        let ids: Vec<ProductId> = lines.iter().map(|(id, _)| *id).collect();
        let products = self.store.get_products(&ids).await?;
        let order_items = lines
            .into_iter()
            .map(|(product_id, quantity)| {
                products
                    .iter()
                    .find(|p| p.id == product_id)
                    .map(|p| OrderItem::snapshot(p, quantity))
                    .ok_or_else(|| {
                        CommerceError::NotFound(format!("Product {product_id} not found"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total_price = NewOrder::computed_total(&order_items)?;
        if let Some(claimed) = request.total_price
            && claimed != total_price
        {
            return Err(CommerceError::InvalidInput(format!(
                "totalPrice {} does not match computed total {}",
                claimed.amount(),
                total_price.amount()
            )));
        }

        let order = self
            .store
            .insert_order(&NewOrder {
                user_id: caller.user_id,
                order_items,
                shipping_address,
                payment,
                total_price,
            })
            .await?;
        tracing::info!(
            order_id = %order.id,
            total = %order.total_price.amount(),
            items = order.order_items.len(),
            "Order created"
        );
        Ok(order)
    }

    /// A single order, for its owner or an administrator.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the order does not exist and
    /// `CommerceError::Unauthorized` if the caller may not see it.
    #[instrument(skip(self), fields(user_id = %caller.user_id, order_id = %id))]
    pub async fn get(&self, caller: &Caller, id: OrderId) -> Result<Order, CommerceError> {
        let order = self.fetch(id).await?;
        if !caller.may_access(order.user_id) {
            return Err(CommerceError::Unauthorized(
                "Not authorized to view this order".to_owned(),
            ));
        }
        Ok(order)
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Internal` if storage fails.
    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn list_mine(&self, caller: &Caller) -> Result<Vec<Order>, CommerceError> {
        Ok(self.store.list_orders_for_user(caller.user_id).await?)
    }

    /// Every order with owner and product details, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Unauthorized` for non-administrators.
    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn list_all(&self, caller: &Caller) -> Result<Vec<OrderDetails>, CommerceError> {
        if !caller.is_admin() {
            return Err(CommerceError::admin_only());
        }

        let orders = self.store.list_orders().await?;
        let mut user_ids: Vec<UserId> = orders.iter().map(|o| o.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let mut product_ids: Vec<ProductId> = orders
            .iter()
            .flat_map(|o| o.order_items.iter().map(|i| i.product_id))
            .collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        let users = self.store.get_users(&user_ids).await?;
        let products = self.store.get_products(&product_ids).await?;
        Ok(OrderDetails::build_all(orders, &users, &products))
    }

    /// Move an order one step along the status machine.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the order does not exist,
    /// `CommerceError::Unauthorized` for non-administrators,
    /// `CommerceError::InvalidInput` for an illegal transition and
    /// `CommerceError::Conflict` if the order changed concurrently.
    #[instrument(skip(self), fields(user_id = %caller.user_id, order_id = %id, status = %status))]
    pub async fn update_status(
        &self,
        caller: &Caller,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, CommerceError> {
        let order = self.fetch(id).await?;
        if !caller.is_admin() {
            return Err(CommerceError::admin_only());
        }

        let next = order.status.transition(status)?;
        let updated = self
            .store
            .update_order_state(id, order.version, next, &order.payment)
            .await?;
        let Some(updated) = updated else {
            return Err(self.lost_update(id).await);
        };
        tracing::info!(order_id = %id, from = %order.status, to = %next, "Order status changed");
        Ok(updated)
    }

    /// Merge a partial payment update into the order's payment.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the order does not exist,
    /// `CommerceError::Unauthorized` if the caller is neither owner nor
    /// administrator, `CommerceError::InvalidInput` for an illegal payment
    /// transition or blank method and `CommerceError::Conflict` if the order
    /// changed concurrently.
    #[instrument(skip(self, update), fields(user_id = %caller.user_id, order_id = %id))]
    pub async fn update_payment(
        &self,
        caller: &Caller,
        id: OrderId,
        update: &PaymentUpdate,
    ) -> Result<Order, CommerceError> {
        let order = self.fetch(id).await?;
        if !caller.may_access(order.user_id) {
            return Err(CommerceError::Unauthorized(
                "Not authorized to update this order".to_owned(),
            ));
        }

        let payment = order.payment.apply(update, Utc::now())?;
        let updated = self
            .store
            .update_order_state(id, order.version, order.status, &payment)
            .await?;
        let Some(updated) = updated else {
            return Err(self.lost_update(id).await);
        };
        tracing::info!(order_id = %id, payment_status = %updated.payment.status, "Order payment updated");
        Ok(updated)
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the order does not exist,
    /// `CommerceError::Unauthorized` if the caller is neither owner nor
    /// administrator and `CommerceError::Conflict` if deployment policy
    /// forbids the owner deleting a shipped order.
    #[instrument(skip(self), fields(user_id = %caller.user_id, order_id = %id))]
    pub async fn delete(&self, caller: &Caller, id: OrderId) -> Result<(), CommerceError> {
        let order = self.fetch(id).await?;
        if !caller.may_access(order.user_id) {
            return Err(CommerceError::Unauthorized(
                "Not authorized to delete this order".to_owned(),
            ));
        }
        if !caller.is_admin()
            && !self.policy.owner_cancel_after_shipment
            && order.status.has_shipped()
        {
            return Err(CommerceError::Conflict(format!(
                "Order is {} and can no longer be deleted",
                order.status
            )));
        }

        if !self.store.delete_order(id).await? {
            return Err(CommerceError::not_found("Order"));
        }
        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use toyshop_core::PaymentStatus;

    use super::*;
    use crate::models::NewProduct;
    use crate::store::{CatalogStore, MemoryStore, OrderStore};

    fn address() -> ShippingAddress {
        ShippingAddress {
            address: "1 Lego Lane".to_string(),
            city: "Billund".to_string(),
            postal_code: "7190".to_string(),
            country: "DK".to_string(),
        }
    }

    async fn seeded() -> (MemoryStore, ProductId) {
        let store = MemoryStore::new();
        let id = store
            .insert_product(&NewProduct {
                name: "Train Set".to_string(),
                brand: "Brio".to_string(),
                category: "Wooden".to_string(),
                description: String::new(),
                price: Price::new(Decimal::new(4950, 2)).unwrap(),
                count_in_stock: 2,
                images: Vec::new(),
            })
            .await
            .unwrap()
            .id;
        (store, id)
    }

    fn request(product_id: ProductId, quantity: i64) -> PlaceOrder {
        PlaceOrder {
            order_items: vec![OrderLineRequest {
                product_id,
                quantity,
            }],
            shipping_address: address(),
            ..PlaceOrder::default()
        }
    }

    #[test]
    fn test_duplicate_lines_are_merged() {
        let mut req = request(ProductId::new(1), 2);
        req.order_items.push(OrderLineRequest {
            product_id: ProductId::new(2),
            quantity: 1,
        });
        req.order_items.push(OrderLineRequest {
            product_id: ProductId::new(1),
            quantity: 3,
        });
        let lines = req.merged_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], (ProductId::new(1), Quantity::new(5).unwrap()));
    }

    #[tokio::test]
    async fn test_create_snapshots_price_and_defaults() {
        let (store, product) = seeded().await;
        let order = OrderService::new(&store, OrderPolicy::default())
            .create(&Caller::customer(UserId::new(3)), request(product, 2))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment.status, PaymentStatus::Pending);
        assert_eq!(order.payment.method, DEFAULT_PAYMENT_METHOD);
        assert_eq!(order.total_price.amount(), Decimal::new(9900, 2));
        assert_eq!(order.order_items[0].name, "Train Set");
        assert_eq!(order.user_id, UserId::new(3));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_items() {
        let (store, _) = seeded().await;
        let err = OrderService::new(&store, OrderPolicy::default())
            .create(
                &Caller::customer(UserId::new(3)),
                PlaceOrder {
                    shipping_address: address(),
                    ..PlaceOrder::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_wrong_total() {
        let (store, product) = seeded().await;
        let mut req = request(product, 1);
        req.total_price = Some(Price::new(Decimal::ONE).unwrap());
        let err = OrderService::new(&store, OrderPolicy::default())
            .create(&Caller::customer(UserId::new(3)), req)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_product() {
        let (store, _) = seeded().await;
        let err = OrderService::new(&store, OrderPolicy::default())
            .create(&Caller::customer(UserId::new(3)), request(ProductId::new(999), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_same_value_rejected() {
        let (store, product) = seeded().await;
        let orders = OrderService::new(&store, OrderPolicy::default());
        let order = orders
            .create(&Caller::customer(UserId::new(3)), request(product, 1))
            .await
            .unwrap();
        let err = orders
            .update_status(&Caller::admin(UserId::new(1)), order.id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_owner_delete_after_shipment_policy() {
        let (store, product) = seeded().await;
        let owner = Caller::customer(UserId::new(3));
        let admin = Caller::admin(UserId::new(1));
        let strict = OrderPolicy {
            owner_cancel_after_shipment: false,
        };
        let orders = OrderService::new(&store, strict);

        let order = orders.create(&owner, request(product, 1)).await.unwrap();
        for status in [OrderStatus::Processing, OrderStatus::Shipped] {
            orders.update_status(&admin, order.id, status).await.unwrap();
        }

        let err = orders.delete(&owner, order.id).await.unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));
        orders.delete(&admin, order.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_stranger_delete_is_unauthorized() {
        let (store, product) = seeded().await;
        let orders = OrderService::new(&store, OrderPolicy::default());
        let order = orders
            .create(&Caller::customer(UserId::new(3)), request(product, 1))
            .await
            .unwrap();
        let err = orders
            .delete(&Caller::customer(UserId::new(4)), order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_lost_update_tells_deleted_from_stale() {
        let (store, product) = seeded().await;
        let orders = OrderService::new(&store, OrderPolicy::default());
        let order = orders
            .create(&Caller::customer(UserId::new(3)), request(product, 1))
            .await
            .unwrap();

        let stale = orders.lost_update(order.id).await;
        assert!(matches!(stale, CommerceError::Conflict(_)));

        assert!(store.delete_order(order.id).await.unwrap());
        let gone = orders.lost_update(order.id).await;
        assert!(matches!(gone, CommerceError::NotFound(_)));
    }
}
