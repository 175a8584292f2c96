//! Process-local [`Store`] for development and tests.
//!
//! # Locking
//!
//! - The catalog sits behind one `RwLock`. Rating updates take the write lock,
//!   so the read-modify-write of an aggregate is never interleaved.
//! - Carts and wishlists live in per-user `Mutex`es. The map lock is held
//!   only long enough to find or insert the user's entry, so two users never
//!   wait on each other.
//! - Locks are always taken in the order catalog, map, user entry. Cart and
//!   wishlist adds hold the catalog read lock while they run so a product
//!   cannot be deleted halfway through.
//!
//! No lock is ever held across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;

use toyshop_core::{
    CartId, OrderId, OrderStatus, Page, Payment, ProductId, ProductQuery, Quantity, RatingValue,
    SortField, SortOrder, UserId, WishlistId,
};

use super::{CartStore, CatalogStore, OrderStore, RepositoryError, Store, UserStore, WishlistStore};
use crate::models::{
    Cart, CartLine, NewOrder, NewProduct, NewUser, Order, Product, ProductPatch, User, Wishlist,
};

const DUPLICATE_PRODUCT: &str = "a product with this brand and name already exists";
const MISSING_PRODUCT: &str = "product no longer exists";

fn poisoned<T>(_: PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("a lock was poisoned by a panicking writer".to_owned())
}

#[derive(Default)]
struct Sequence(AtomicI32);

impl Sequence {
    fn next(&self) -> i32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Default)]
struct Inner {
    products: RwLock<BTreeMap<ProductId, Product>>,
    carts: RwLock<HashMap<UserId, Arc<Mutex<Cart>>>>,
    wishlists: RwLock<HashMap<UserId, Arc<Mutex<Wishlist>>>>,
    orders: RwLock<BTreeMap<OrderId, Order>>,
    users: RwLock<BTreeMap<UserId, User>>,
    product_ids: Sequence,
    cart_ids: Sequence,
    wishlist_ids: Sequence,
    order_ids: Sequence,
    user_ids: Sequence,
}

/// In-memory [`Store`]. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cart_entry(&self, user_id: UserId, create: bool) -> Result<Option<Arc<Mutex<Cart>>>, RepositoryError> {
        if let Some(entry) = self.inner.carts.read().map_err(poisoned)?.get(&user_id) {
            return Ok(Some(Arc::clone(entry)));
        }
        if !create {
            return Ok(None);
        }
        let mut carts = self.inner.carts.write().map_err(poisoned)?;
        let entry = carts.entry(user_id).or_insert_with(|| {
            let now = Utc::now();
            Arc::new(Mutex::new(Cart {
                id: CartId::new(self.inner.cart_ids.next()),
                user_id,
                items: Vec::new(),
                created_at: now,
                updated_at: now,
            }))
        });
        Ok(Some(Arc::clone(entry)))
    }

    fn wishlist_entry(&self, user_id: UserId) -> Result<Arc<Mutex<Wishlist>>, RepositoryError> {
        if let Some(entry) = self.inner.wishlists.read().map_err(poisoned)?.get(&user_id) {
            return Ok(Arc::clone(entry));
        }
        let mut wishlists = self.inner.wishlists.write().map_err(poisoned)?;
        let entry = wishlists.entry(user_id).or_insert_with(|| {
            let now = Utc::now();
            Arc::new(Mutex::new(Wishlist {
                id: WishlistId::new(self.inner.wishlist_ids.next()),
                user_id,
                products: Vec::new(),
                created_at: now,
                updated_at: now,
            }))
        });
        Ok(Arc::clone(entry))
    }

    fn is_duplicate(
        products: &BTreeMap<ProductId, Product>,
        brand: &str,
        name: &str,
        except: Option<ProductId>,
    ) -> bool {
        products
            .values()
            .any(|p| p.brand == brand && p.name == name && Some(p.id) != except)
    }
}

// =============================================================================
// Catalog
// =============================================================================

fn matches(product: &Product, query: &ProductQuery) -> bool {
    if let Some(keyword) = &query.keyword {
        let keyword = keyword.to_lowercase();
        if !product.name.to_lowercase().contains(&keyword)
            && !product.description.to_lowercase().contains(&keyword)
        {
            return false;
        }
    }
    if query.brand.as_ref().is_some_and(|b| *b != product.brand) {
        return false;
    }
    if query.category.as_ref().is_some_and(|c| *c != product.category) {
        return false;
    }
    let price = product.price.amount();
    if query.min_price.is_some_and(|min| price < min) {
        return false;
    }
    if query.max_price.is_some_and(|max| price > max) {
        return false;
    }
    if query.min_rating.is_some_and(|min| product.rating < min) {
        return false;
    }
    !query.in_stock_only || product.in_stock()
}

fn compare(a: &Product, b: &Product, sort: SortField, order: SortOrder) -> std::cmp::Ordering {
    let primary = match sort {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Price => a.price.cmp(&b.price),
        SortField::Rating => a.rating.cmp(&b.rating),
        SortField::Name => a.name.cmp(&b.name),
    };
    let primary = match order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

impl CatalogStore for MemoryStore {
    async fn query_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let mut found: Vec<Product> = {
            let products = self.inner.products.read().map_err(poisoned)?;
            products
                .values()
                .filter(|p| matches(p, query))
                .cloned()
                .collect()
        };
        found.sort_by(|a, b| compare(a, b, query.sort, query.order));

        let total = found.len() as u64;
        let pagination = query.pagination;
        let items = found
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.page_size() as usize)
            .collect();

        Ok(Page::new(items, total, pagination))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.inner.products.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let products = self.inner.products.read().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn find_product(
        &self,
        brand: &str,
        name: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let products = self.inner.products.read().map_err(poisoned)?;
        Ok(products
            .values()
            .find(|p| p.brand == brand && p.name == name)
            .cloned())
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut products = self.inner.products.write().map_err(poisoned)?;
        if Self::is_duplicate(&products, &product.brand, &product.name, None) {
            return Err(RepositoryError::Conflict(DUPLICATE_PRODUCT.to_owned()));
        }

        let now = Utc::now();
        let created = Product {
            id: ProductId::new(self.inner.product_ids.next()),
            name: product.name.clone(),
            brand: product.brand.clone(),
            category: product.category.clone(),
            description: product.description.clone(),
            price: product.price,
            count_in_stock: product.count_in_stock,
            images: product.images.clone(),
            rating: rust_decimal::Decimal::ZERO,
            num_reviews: 0,
            rating_sum: rust_decimal::Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.inner.products.write().map_err(poisoned)?;
        let Some(current) = products.get(&id).cloned() else {
            return Ok(None);
        };

        let updated = patch.apply_to(current, Utc::now());
        if Self::is_duplicate(&products, &updated.brand, &updated.name, Some(id)) {
            return Err(RepositoryError::Conflict(DUPLICATE_PRODUCT.to_owned()));
        }
        products.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.inner.products.write().map_err(poisoned)?;
        if products.remove(&id).is_none() {
            return Ok(false);
        }

        for cart in self.inner.carts.read().map_err(poisoned)?.values() {
            cart.lock()
                .map_err(poisoned)?
                .items
                .retain(|line| line.product_id != id);
        }
        for wishlist in self.inner.wishlists.read().map_err(poisoned)?.values() {
            wishlist.lock().map_err(poisoned)?.remove(id);
        }
        Ok(true)
    }

    async fn record_rating(
        &self,
        id: ProductId,
        value: RatingValue,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.inner.products.write().map_err(poisoned)?;
        let Some(product) = products.get_mut(&id) else {
            return Ok(None);
        };
        let summary = product.rating_summary().record(value);
        product.set_rating_summary(summary);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }
}

// =============================================================================
// Carts
// =============================================================================

impl CartStore for MemoryStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        match self.cart_entry(user_id, false)? {
            Some(entry) => Ok(Some(entry.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Cart, RepositoryError> {
        let products = self.inner.products.read().map_err(poisoned)?;
        if !products.contains_key(&product_id) {
            return Err(RepositoryError::Conflict(MISSING_PRODUCT.to_owned()));
        }

        let entry = self
            .cart_entry(user_id, true)?
            .ok_or_else(|| RepositoryError::Unavailable("cart was not created".to_owned()))?;
        let mut cart = entry.lock().map_err(poisoned)?;

        match cart.items.iter_mut().find(|line| line.product_id == product_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .merge(quantity)
                    .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
            }
            None => cart.items.push(CartLine {
                product_id,
                quantity,
            }),
        }
        cart.updated_at = Utc::now();
        Ok(cart.clone())
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Option<Cart>, RepositoryError> {
        let Some(entry) = self.cart_entry(user_id, false)? else {
            return Ok(None);
        };
        let mut cart = entry.lock().map_err(poisoned)?;

        let Some(line) = cart.items.iter_mut().find(|line| line.product_id == product_id) else {
            return Ok(None);
        };
        line.quantity = quantity;
        cart.updated_at = Utc::now();
        Ok(Some(cart.clone()))
    }

    async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let Some(entry) = self.cart_entry(user_id, false)? else {
            return Ok(None);
        };
        let mut cart = entry.lock().map_err(poisoned)?;

        let before = cart.items.len();
        cart.items.retain(|line| line.product_id != product_id);
        if cart.items.len() == before {
            return Ok(None);
        }
        cart.updated_at = Utc::now();
        Ok(Some(cart.clone()))
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let entry = self
            .cart_entry(user_id, true)?
            .ok_or_else(|| RepositoryError::Unavailable("cart was not created".to_owned()))?;
        let mut cart = entry.lock().map_err(poisoned)?;
        cart.items.clear();
        cart.updated_at = Utc::now();
        Ok(cart.clone())
    }
}

// =============================================================================
// Wishlists
// =============================================================================

impl WishlistStore for MemoryStore {
    async fn get_wishlist(&self, user_id: UserId) -> Result<Option<Wishlist>, RepositoryError> {
        let wishlists = self.inner.wishlists.read().map_err(poisoned)?;
        match wishlists.get(&user_id) {
            Some(entry) => Ok(Some(entry.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Wishlist, RepositoryError> {
        let products = self.inner.products.read().map_err(poisoned)?;
        if !products.contains_key(&product_id) {
            return Err(RepositoryError::Conflict(MISSING_PRODUCT.to_owned()));
        }

        let entry = self.wishlist_entry(user_id)?;
        let mut wishlist = entry.lock().map_err(poisoned)?;
        if wishlist.insert(product_id) {
            wishlist.updated_at = Utc::now();
        }
        Ok(wishlist.clone())
    }

    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Wishlist, RepositoryError> {
        let entry = self.wishlist_entry(user_id)?;
        let mut wishlist = entry.lock().map_err(poisoned)?;
        if wishlist.remove(product_id) {
            wishlist.updated_at = Utc::now();
        }
        Ok(wishlist.clone())
    }

    async fn clear_wishlist(&self, user_id: UserId) -> Result<Wishlist, RepositoryError> {
        let entry = self.wishlist_entry(user_id)?;
        let mut wishlist = entry.lock().map_err(poisoned)?;
        wishlist.products.clear();
        wishlist.updated_at = Utc::now();
        Ok(wishlist.clone())
    }
}

// =============================================================================
// Orders
// =============================================================================

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let now = Utc::now();
        let created = Order {
            id: OrderId::new(self.inner.order_ids.next()),
            user_id: order.user_id,
            order_items: order.order_items.clone(),
            shipping_address: order.shipping_address.clone(),
            payment: order.payment.clone(),
            total_price: order.total_price,
            status: OrderStatus::Pending,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .orders
            .write()
            .map_err(poisoned)?
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.inner.orders.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .inner
            .orders
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .inner
            .orders
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn update_order_state(
        &self,
        id: OrderId,
        expected_version: i32,
        status: OrderStatus,
        payment: &Payment,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut orders = self.inner.orders.write().map_err(poisoned)?;
        let Some(order) = orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.version != expected_version {
            return Ok(None);
        }
        order.status = status;
        order.payment = payment.clone();
        order.version += 1;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        Ok(self
            .inner
            .orders
            .write()
            .map_err(poisoned)?
            .remove(&id)
            .is_some())
    }
}

// =============================================================================
// Users
// =============================================================================

impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut users = self.inner.users.write().map_err(poisoned)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let created = User {
            id: UserId::new(self.inner.user_ids.next()),
            email: user.email.clone(),
            name: user.name.clone(),
            is_admin: user.is_admin,
            created_at: Utc::now(),
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let users = self.inner.users.read().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use toyshop_core::{Pagination, Price};

    use super::*;

    fn new_product(name: &str, brand: &str, cents: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            brand: brand.to_string(),
            category: "Toys".to_string(),
            description: format!("The {name}"),
            price: Price::new(Decimal::new(cents, 2)).unwrap(),
            count_in_stock: 1,
            images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_brand_and_name_conflicts() {
        let store = MemoryStore::new();
        store.insert_product(&new_product("Yoyo", "Duncan", 500)).await.unwrap();
        let err = store
            .insert_product(&new_product("Yoyo", "Duncan", 900))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sort_ties_break_on_id() {
        let store = MemoryStore::new();
        for name in ["A", "B", "C"] {
            store.insert_product(&new_product(name, "Same", 100)).await.unwrap();
        }
        let query = ProductQuery {
            sort: SortField::Price,
            order: SortOrder::Desc,
            pagination: Pagination::new(1, 10, 100).unwrap(),
            ..ProductQuery::default()
        };
        let page = store.query_products(&query).await.unwrap();
        let ids: Vec<i32> = page.items.iter().map(|p| p.id.as_i32()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_product_cascades_to_cart_and_wishlist() {
        let store = MemoryStore::new();
        let product = store.insert_product(&new_product("Kite", "Sky", 100)).await.unwrap();
        let user = UserId::new(1);
        store.add_to_cart(user, product.id, Quantity::ONE).await.unwrap();
        store.add_to_wishlist(user, product.id).await.unwrap();

        assert!(store.delete_product(product.id).await.unwrap());
        assert!(store.get_cart(user).await.unwrap().unwrap().items.is_empty());
        assert!(store.get_wishlist(user).await.unwrap().unwrap().products.is_empty());
    }

    #[tokio::test]
    async fn test_order_update_is_compare_and_swap() {
        let store = MemoryStore::new();
        let order = store
            .insert_order(&NewOrder {
                user_id: UserId::new(1),
                order_items: Vec::new(),
                shipping_address: toyshop_core::ShippingAddress::default(),
                payment: Payment::pending("Card").unwrap(),
                total_price: Price::ZERO,
            })
            .await
            .unwrap();

        let first = store
            .update_order_state(order.id, 0, OrderStatus::Processing, &order.payment)
            .await
            .unwrap();
        assert_eq!(first.unwrap().version, 1);

        let stale = store
            .update_order_state(order.id, 0, OrderStatus::Cancelled, &order.payment)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn test_get_cart_does_not_create() {
        let store = MemoryStore::new();
        assert!(store.get_cart(UserId::new(5)).await.unwrap().is_none());
        assert!(store.get_cart(UserId::new(5)).await.unwrap().is_none());
    }

    /// Run `op` on `threads` OS threads released together, each with its own runtime.
    fn race<F, Fut>(threads: usize, op: F)
    where
        F: Fn() -> Fut + Sync,
        Fut: std::future::Future<Output = ()>,
    {
        let start = std::sync::Barrier::new(threads);
        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .build()
                        .unwrap();
                    start.wait();
                    for _ in 0..25 {
                        runtime.block_on(op());
                    }
                });
            }
        });
    }

    #[test]
    fn test_parallel_ratings_are_all_counted() {
        let store = MemoryStore::new();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let product = runtime
            .block_on(store.insert_product(&new_product("Top", "Whirl", 400)))
            .unwrap();
        let five = RatingValue::new(Decimal::from(5)).unwrap();
        let (shared, id) = (&store, product.id);

        race(8, move || async move {
            shared.record_rating(id, five).await.unwrap().unwrap();
        });

        let rated = runtime.block_on(store.get_product(product.id)).unwrap().unwrap();
        assert_eq!(rated.num_reviews, 200);
        assert_eq!(rated.rating, Decimal::from(5));
    }

    #[test]
    fn test_parallel_cart_adds_are_all_counted() {
        let store = MemoryStore::new();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let product = runtime
            .block_on(store.insert_product(&new_product("Duck", "Quackers", 300)))
            .unwrap();
        let one = Quantity::new(1).unwrap();
        let (shared, id) = (&store, product.id);

        race(8, move || async move {
            shared.add_to_cart(UserId::new(9), id, one).await.unwrap();
        });

        let cart = runtime.block_on(store.get_cart(UserId::new(9))).unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity.get(), 200);
    }
}
