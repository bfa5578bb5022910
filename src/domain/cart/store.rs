use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::aggregate::Cart;
use super::errors::CartError;
use super::value_objects::{CartItem, CartLineKey, CartSnapshot};

// ============================================================================
// Cart Store
// ============================================================================
//
// Every operation is an atomic read-modify-write of one customer's cart.
// Carts of different customers never contend with each other.
//
// ============================================================================

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get(&self, owner: Uuid) -> Cart;

    async fn add_item(&self, owner: Uuid, item: CartItem) -> Cart;

    async fn update_quantity(&self, owner: Uuid, key: &CartLineKey, quantity: u32) -> Result<Cart, CartError>;

    async fn remove_item(&self, owner: Uuid, key: &CartLineKey) -> Result<Cart, CartError>;

    async fn clear(&self, owner: Uuid) -> Cart;

    async fn snapshot(&self, owner: Uuid) -> CartSnapshot;

    /// Take the snapshotted quantities out of the cart, provided nothing
    /// changed it since the snapshot. A snapshot can be consumed once.
    async fn consume(&self, snapshot: &CartSnapshot) -> Result<Cart, CartError>;

    /// Undo a `consume` whose order was never created.
    async fn restore(&self, snapshot: &CartSnapshot) -> Cart;
}

#[derive(Default)]
pub struct InMemoryCartStore {
    carts: Mutex<HashMap<Uuid, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutate<T>(&self, owner: Uuid, f: impl FnOnce(&mut Cart) -> T) -> T {
        let mut carts = self.carts.lock().await;
        let cart = carts.entry(owner).or_insert_with(|| Cart::new(owner));
        f(cart)
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get(&self, owner: Uuid) -> Cart {
        let carts = self.carts.lock().await;
        carts.get(&owner).cloned().unwrap_or_else(|| Cart::new(owner))
    }

    async fn add_item(&self, owner: Uuid, item: CartItem) -> Cart {
        self.mutate(owner, |cart| {
            cart.add_item(item);
            cart.clone()
        })
        .await
    }

    async fn update_quantity(&self, owner: Uuid, key: &CartLineKey, quantity: u32) -> Result<Cart, CartError> {
        self.mutate(owner, |cart| {
            cart.update_quantity(key, quantity)?;
            Ok(cart.clone())
        })
        .await
    }

    async fn remove_item(&self, owner: Uuid, key: &CartLineKey) -> Result<Cart, CartError> {
        self.mutate(owner, |cart| {
            cart.remove_item(key)?;
            Ok(cart.clone())
        })
        .await
    }

    async fn clear(&self, owner: Uuid) -> Cart {
        self.mutate(owner, |cart| {
            cart.clear();
            cart.clone()
        })
        .await
    }

    async fn snapshot(&self, owner: Uuid) -> CartSnapshot {
        let carts = self.carts.lock().await;
        carts
            .get(&owner)
            .map(Cart::snapshot)
            .unwrap_or_else(|| Cart::new(owner).snapshot())
    }

    async fn consume(&self, snapshot: &CartSnapshot) -> Result<Cart, CartError> {
        self.mutate(snapshot.owner, |cart| {
            if cart.revision != snapshot.revision {
                return Err(CartError::Changed {
                    expected: snapshot.revision,
                    actual: cart.revision,
                });
            }
            cart.remove_snapshot(snapshot);
            Ok(cart.clone())
        })
        .await
    }

    async fn restore(&self, snapshot: &CartSnapshot) -> Cart {
        self.mutate(snapshot.owner, |cart| {
            cart.restore(snapshot);
            cart.clone()
        })
        .await
    }
}
