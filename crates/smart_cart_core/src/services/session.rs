//! crates/smart_cart_core/src/services/session.rs
//!
//! Cart Session Manager: exclusive account <-> cart binding.
//!
//! The store offers no multi-record transactions, so `bind_cart` is a
//! check-then-set. Two shoppers racing for the same free cart can both pass
//! the check; the store keeps the last write. The re-read at the end of
//! `bind_cart` catches most losers immediately, and `watch_ownership` lets the
//! remaining ones detect the hijack afterwards.

use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{AccountId, Binding, CartLocation};
use crate::error::{CartError, CartResult};
use crate::ports::{AccountStore, CartStore, PortError, PortStream};

/// How a change to a cart record looks from one account's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipEvent {
    /// The viewer still owns the cart.
    Owned,
    /// Nobody owns the cart any more.
    Released,
    /// Another account took the cart.
    Hijacked { owner: AccountId },
    /// The cart record was deleted.
    Removed,
}

impl OwnershipEvent {
    pub fn classify(viewer: &str, binding: Option<&Binding>) -> Self {
        match binding {
            None => OwnershipEvent::Removed,
            Some(binding) => match &binding.owner_account_id {
                Some(owner) if binding.in_use && owner != viewer => OwnershipEvent::Hijacked {
                    owner: owner.clone(),
                },
                Some(_) => OwnershipEvent::Owned,
                None => OwnershipEvent::Released,
            },
        }
    }

    /// Hijack and removal both force the viewer's session to end.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            OwnershipEvent::Hijacked { .. } | OwnershipEvent::Removed
        )
    }
}

pub struct CartSessionManager {
    accounts: Arc<dyn AccountStore>,
    carts: Arc<dyn CartStore>,
}

impl CartSessionManager {
    pub fn new(accounts: Arc<dyn AccountStore>, carts: Arc<dyn CartStore>) -> Self {
        Self { accounts, carts }
    }

    pub async fn binding(&self, cart_id: &str) -> CartResult<Binding> {
        Ok(self.carts.get_cart(cart_id).await?.binding())
    }

    pub async fn bind_cart(&self, account_id: &str, cart_id: &str) -> CartResult<Binding> {
        let account = self.accounts.get_account(account_id).await?;

        // One cart per account. A stale binding to a cart someone else has since
        // taken (or that was released) does not block a new one.
        if let Some(current) = account.bound_cart_id.as_deref() {
            if current != cart_id {
                let still_held = match self.carts.get_cart(current).await {
                    Ok(cart) => cart.is_owned_by(account_id),
                    Err(PortError::NotFound(_)) => false,
                    Err(e) => return Err(e.into()),
                };
                if still_held {
                    return Err(CartError::validation(format!(
                        "account is already bound to cart {}; release it first",
                        current
                    )));
                }
            }
        }

        let cart = self.carts.get_cart(cart_id).await?;
        if cart.in_use() && !cart.is_owned_by(account_id) {
            warn!(cart_id, account_id, "Bind rejected: cart is in use by another account.");
            return Err(CartError::AlreadyBound {
                cart_id: cart_id.to_string(),
            });
        }

        self.carts.assign_owner(cart_id, account_id).await?;
        self.accounts.set_bound_cart(account_id, Some(cart_id)).await?;

        // Confirmation re-check: a racing writer may have overwritten us.
        let confirmed = self.carts.get_cart(cart_id).await?;
        if !confirmed.is_owned_by(account_id) {
            warn!(cart_id, account_id, "Lost the bind race; rolling back account binding.");
            self.accounts.set_bound_cart(account_id, None).await?;
            return Err(CartError::AlreadyBound {
                cart_id: cart_id.to_string(),
            });
        }

        info!(cart_id, account_id, "Cart bound.");
        Ok(confirmed.binding())
    }

    /// Releases a cart: items cleared, owner cleared, `released_at` stamped,
    /// and the former owner's `bound_cart_id` cleared.
    pub async fn release_cart(&self, cart_id: &str) -> CartResult<Binding> {
        let cart = self.carts.get_cart(cart_id).await?;

        self.carts.clear_items(cart_id).await?;
        let released = self.carts.release_owner(cart_id, Utc::now()).await?;

        if let Some(owner) = cart.owner_account_id.as_deref() {
            match self.accounts.get_account(owner).await {
                Ok(account) if account.bound_cart_id.as_deref() == Some(cart_id) => {
                    self.accounts.set_bound_cart(owner, None).await?;
                }
                Ok(_) => {}
                Err(PortError::NotFound(_)) => {
                    warn!(cart_id, owner, "Released cart referenced an unknown account.");
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(cart_id, "Cart released.");
        Ok(released.binding())
    }

    /// Best-effort cleanup when a shopper's session ends (logout or disconnect).
    /// Releases the account's cart only if the account still owns it.
    pub async fn end_session(&self, account_id: &str) -> CartResult<Option<Binding>> {
        let account = self.accounts.get_account(account_id).await?;
        let Some(cart_id) = account.bound_cart_id else {
            return Ok(None);
        };

        let cart = match self.carts.get_cart(&cart_id).await {
            Ok(cart) => cart,
            Err(PortError::NotFound(_)) => {
                self.accounts.set_bound_cart(account_id, None).await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if !cart.is_owned_by(account_id) {
            // Hijacked: the cart is someone else's now, only drop our pointer.
            self.accounts.set_bound_cart(account_id, None).await?;
            return Ok(None);
        }

        self.release_cart(&cart_id).await.map(Some)
    }

    /// Live stream of the cart's binding; `None` once the cart is deleted.
    pub async fn watch_ownership(&self, cart_id: &str) -> CartResult<PortStream<Option<Binding>>> {
        let stream = self.carts.watch_cart(cart_id).await?;
        Ok(Box::pin(stream.map(|snapshot| {
            snapshot.map(|cart| cart.map(|cart| cart.binding()))
        })))
    }

    /// The ownership stream, classified from `account_id`'s point of view.
    pub async fn watch_ownership_as(
        &self,
        account_id: &str,
        cart_id: &str,
    ) -> CartResult<PortStream<OwnershipEvent>> {
        let viewer = account_id.to_string();
        let stream = self.watch_ownership(cart_id).await?;
        Ok(Box::pin(stream.map(move |snapshot| {
            snapshot.map(|binding| OwnershipEvent::classify(&viewer, binding.as_ref()))
        })))
    }

    /// Records the cart position reported for the account's bound cart.
    pub async fn update_location(&self, account_id: &str, x: f64, y: f64) -> CartResult<CartLocation> {
        if !x.is_finite() || !y.is_finite() {
            return Err(CartError::validation("x and y must be finite numbers"));
        }
        let account = self.accounts.get_account(account_id).await?;
        let cart_id = account
            .bound_cart_id
            .ok_or_else(|| CartError::validation("no cart is bound to this account"))?;

        let location = CartLocation {
            x,
            y,
            recorded_at: Utc::now(),
        };
        self.carts.set_location(&cart_id, location.clone()).await?;
        Ok(location)
    }
}
