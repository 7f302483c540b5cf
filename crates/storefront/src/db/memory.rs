//! In-memory [`Store`] for tests and embedders.
//!
//! All state sits behind one async mutex, so every trait method is atomic.
//! `commit_order` and `settle_payment_intent` check and write under the same
//! guard, which gives the same guarantees as the conditional updates in the
//! `PostgreSQL` store.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use amyfairy_core::{
    AddressId, CartItemId, Email, OrderId, OrderStatus, PaymentIntentId, PaymentIntentStatus,
    PaymentMethod, ProductId, UserId, UserRole,
};

use super::{
    CartRepository, OrderRepository, PaymentRepository, ProductRepository, RepositoryError, Store,
    UserRepository,
};
use crate::models::page::offset;
use crate::models::{
    Address, CartItem, CartLine, NewAddress, NewCartItem, NewOrder, NewPaymentIntent, NewUser,
    Order, OrderQuery, OrderSort, Page, PaymentIntent, PaymentOutcome, Product, ProductDraft,
    ProductPatch, ProductQuery, ProductSort, ProfileUpdate, Settlement, SortOrder, StockShortfall,
    User,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    users: BTreeMap<UserId, (User, String)>,
    addresses: BTreeMap<AddressId, Address>,
    products: BTreeMap<ProductId, Product>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    intents: BTreeMap<PaymentIntentId, PaymentIntent>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn line(&self, item: &CartItem) -> Option<CartLine> {
        self.products
            .get(&item.product_id)
            .map(|product| CartLine::new(item, product))
    }

    fn intent_by_transaction(&self, transaction_id: &str) -> Option<&PaymentIntent> {
        self.intents
            .values()
            .find(|i| i.transaction_id == transaction_id)
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> Page<T> {
    let total = items.len() as u64;
    let skip = usize::try_from(offset(page, per_page)).unwrap_or(usize::MAX);
    Page {
        items: items
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .collect(),
        total,
        page,
        per_page,
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

const fn payment_method_rank(method: PaymentMethod) -> u8 {
    match method {
        PaymentMethod::Cash => 0,
        PaymentMethod::Card => 1,
    }
}

fn distinct(products: &BTreeMap<ProductId, Product>, field: fn(&Product) -> &String) -> Vec<String> {
    let mut values: Vec<String> = products
        .values()
        .filter(|p| !p.deleted)
        .map(|p| field(p).clone())
        .collect();
    values.sort();
    values.dedup();
    values
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut items: Vec<Product> = state
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            let primary = match query.sort {
                ProductSort::Price => a.discounted_price().cmp(&b.discounted_price()),
                ProductSort::Rating => a.rating.cmp(&b.rating),
                ProductSort::Title => a.title.cmp(&b.title),
                ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            directed(primary.then_with(|| a.id.cmp(&b.id)), query.order)
        });

        Ok(paginate(items, query.page, query.per_page))
    }

    async fn brands(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(distinct(&self.state.lock().await.products, |p| &p.brand))
    }

    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(distinct(&self.state.lock().await.products, |p| &p.category))
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(state.next_id()),
            title: draft.title.clone(),
            description: draft.description.clone(),
            price: draft.price,
            discount_percentage: draft.discount_percentage,
            rating: draft.rating,
            stock: draft.stock,
            brand: draft.brand.clone(),
            category: draft.category.clone(),
            colors: draft.colors.clone(),
            sizes: draft.sizes.clone(),
            thumbnail: draft.thumbnail.clone(),
            images: draft.images.clone(),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        patch.apply_to(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn soft_delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.products.get_mut(&id).is_some_and(|product| {
            product.deleted = true;
            product.updated_at = Utc::now();
            true
        }))
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .values()
            .filter(|item| item.user_id == user_id)
            .filter_map(|item| state.line(item))
            .collect())
    }

    async fn insert_cart_item(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.cart_items.values().any(|existing| item.same_key(existing)) {
            return Err(RepositoryError::Conflict("item already in cart".to_owned()));
        }
        if !state.products.contains_key(&item.product_id) {
            return Err(RepositoryError::NotFound);
        }

        let now = Utc::now();
        let created = CartItem {
            id: CartItemId::new(state.next_id()),
            user_id: item.user_id,
            product_id: item.product_id,
            quantity: 1,
            color: item.color.clone(),
            size: item.size.clone(),
            created_at: now,
            updated_at: now,
        };
        state.cart_items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn cart_line(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .get(&item_id)
            .filter(|item| item.user_id == user_id)
            .and_then(|item| state.line(item)))
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .cart_items
            .get_mut(&item_id)
            .filter(|item| item.user_id == user_id)
            .map(|item| {
                item.quantity = quantity;
                item.updated_at = Utc::now();
                item.clone()
            }))
    }

    async fn delete_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state
            .cart_items
            .get(&item_id)
            .is_some_and(|item| item.user_id == user_id)
        {
            state.cart_items.remove(&item_id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn commit_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let cart_intact = order.cart_item_ids.iter().all(|id| {
            state
                .cart_items
                .get(id)
                .is_some_and(|item| item.user_id == order.user_id)
        });
        if !cart_intact {
            return Err(RepositoryError::CartChanged);
        }

        let demand = order.demand();

        let shortfalls: Vec<StockShortfall> = demand
            .iter()
            .filter_map(|&(product_id, requested)| {
                let product = state.products.get(&product_id);
                let available = product.filter(|p| !p.deleted).map_or(0, |p| p.stock);
                (available < requested).then(|| StockShortfall {
                    product_id,
                    title: product.map_or_else(
                        || {
                            order
                                .items
                                .iter()
                                .find(|i| i.product_id == product_id)
                                .map(|i| i.title.clone())
                                .unwrap_or_default()
                        },
                        |p| p.title.clone(),
                    ),
                    requested,
                    available,
                })
            })
            .collect();
        if !shortfalls.is_empty() {
            return Err(RepositoryError::InsufficientStock(shortfalls));
        }

        let now = Utc::now();
        for (product_id, quantity) in demand {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock -= quantity;
                product.updated_at = now;
            }
        }

        let created = Order {
            id: OrderId::new(state.next_id()),
            user_id: order.user_id,
            items: order.items.clone(),
            total_amount: order.total_amount,
            total_items: order.total_items,
            shipping_address: order.shipping_address.clone(),
            payment_method: order.payment_method,
            status: OrderStatus::Pending,
            payment_confirmed: false,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(created.id, created.clone());

        for id in &order.cart_item_ids {
            state.cart_items.remove(id);
        }

        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| {
            let primary = match query.sort {
                OrderSort::TotalAmount => a.total_amount.cmp(&b.total_amount),
                OrderSort::PaymentMethod => payment_method_rank(a.payment_method)
                    .cmp(&payment_method_rank(b.payment_method)),
                OrderSort::CreatedAt => a.created_at.cmp(&b.created_at),
                OrderSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            directed(primary.then_with(|| a.id.cmp(&b.id)), query.order)
        });
        Ok(paginate(orders, query.page, query.per_page))
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .orders
            .get_mut(&id)
            .filter(|order| order.status == from)
            .map(|order| {
                order.status = to;
                order.updated_at = Utc::now();
                order.clone()
            }))
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert_payment_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> Result<PaymentIntent, RepositoryError> {
        let mut state = self.state.lock().await;
        let duplicate = state.intents.values().any(|existing| {
            existing.transaction_id == intent.transaction_id
                || existing.idempotency_key == intent.idempotency_key
                || (existing.order_id == intent.order_id
                    && existing.status == PaymentIntentStatus::Created)
        });
        if duplicate {
            return Err(RepositoryError::Conflict(
                "payment intent already exists".to_owned(),
            ));
        }

        let now = Utc::now();
        let created = PaymentIntent {
            id: PaymentIntentId::new(state.next_id()),
            order_id: intent.order_id,
            transaction_id: intent.transaction_id.clone(),
            gateway_payment_id: None,
            amount: intent.amount,
            currency: intent.currency,
            status: PaymentIntentStatus::Created,
            idempotency_key: intent.idempotency_key,
            created_at: now,
            updated_at: now,
        };
        state.intents.insert(created.id, created.clone());
        Ok(created)
    }

    async fn open_payment_intent(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentIntent>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .intents
            .values()
            .find(|i| i.order_id == order_id && i.status == PaymentIntentStatus::Created)
            .cloned())
    }

    async fn payment_intent_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentIntent>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.intent_by_transaction(transaction_id).cloned())
    }

    async fn settle_payment_intent(
        &self,
        transaction_id: &str,
        outcome: &PaymentOutcome,
    ) -> Result<Settlement, RepositoryError> {
        let mut state = self.state.lock().await;
        let intent = state
            .intent_by_transaction(transaction_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        if intent.status.is_settled() {
            return Ok(Settlement::AlreadySettled(intent));
        }

        let now = Utc::now();
        let settled = PaymentIntent {
            status: outcome.status,
            gateway_payment_id: Some(outcome.gateway_payment_id.clone()),
            updated_at: now,
            ..intent
        };
        state.intents.insert(settled.id, settled.clone());

        if outcome.status == PaymentIntentStatus::Confirmed
            && let Some(order) = state.orders.get_mut(&settled.order_id)
        {
            order.payment_confirmed = true;
            order.paid_at = Some(now);
            order.updated_at = now;
        }

        Ok(Settlement::Applied(settled))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|(u, _)| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let created = User {
            id: UserId::new(state.next_id()),
            email: user.email.clone(),
            name: user.name.clone(),
            phone: None,
            role: UserRole::User,
            created_at: now,
            updated_at: now,
        };
        state
            .users
            .insert(created.id, (created.clone(), user.password_hash.clone()));
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).map(|(user, _)| user.clone()))
    }

    async fn user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|(user, _)| &user.email == email)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let (user, _) = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(name) = &update.name {
            user.name.clone_from(name);
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_user_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let (user, _) = state
            .users
            .values_mut()
            .find(|(user, _)| &user.email == email)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .addresses
            .get(&id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn add_address(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Address, RepositoryError> {
        let mut state = self.state.lock().await;
        let created = Address {
            id: AddressId::new(state.next_id()),
            user_id,
            name: address.name.clone(),
            email: address.email.clone(),
            phone: address.phone.clone(),
            street: address.street.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            pin_code: address.pin_code.clone(),
            created_at: Utc::now(),
        };
        state.addresses.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state
            .addresses
            .get(&id)
            .is_some_and(|a| a.user_id == user_id)
        {
            state.addresses.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
