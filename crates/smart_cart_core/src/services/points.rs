//! crates/smart_cart_core/src/services/points.rs
//!
//! Points Ledger: append-only point grants and debits.
//!
//! Balances move through the store's atomic increment/decrement, and each move
//! is followed by one ledger entry. The two writes are independent, so the
//! balance equals the ledger sum only eventually; `audit` reports the gap.
//! Distance and location triggers are not deduplicated here.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{LedgerReason, PointLedgerEntry, PointRules, Position};
use crate::error::{CartError, CartResult};
use crate::ports::{AccountStore, LedgerStore, LocationEventStore};

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceAccrual {
    pub earned_points: u64,
    pub balance: u64,
    pub total_distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredEvent {
    pub event_id: String,
    pub name: String,
    pub points: u64,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerAudit {
    pub balance: u64,
    pub ledger_sum: i64,
    pub consistent: bool,
}

/// Whole points earned for a distance delta.
pub fn earned_points(distance_delta: f64, distance_per_point: f64) -> u64 {
    if distance_per_point <= 0.0 || distance_delta <= 0.0 {
        return 0;
    }
    (distance_delta / distance_per_point).floor() as u64
}

pub struct PointsLedger {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerStore>,
    events: Arc<dyn LocationEventStore>,
    rules: PointRules,
}

impl PointsLedger {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerStore>,
        events: Arc<dyn LocationEventStore>,
        rules: PointRules,
    ) -> Self {
        Self {
            accounts,
            ledger,
            events,
            rules,
        }
    }

    pub fn rules(&self) -> PointRules {
        self.rules
    }

    pub async fn balance(&self, account_id: &str) -> CartResult<u64> {
        Ok(self.accounts.get_account(account_id).await?.points)
    }

    pub async fn history(&self, account_id: &str) -> CartResult<Vec<PointLedgerEntry>> {
        self.accounts.get_account(account_id).await?;
        Ok(self.ledger.entries_for(account_id).await?)
    }

    pub async fn audit(&self, account_id: &str) -> CartResult<LedgerAudit> {
        let balance = self.balance(account_id).await?;
        let ledger_sum = self
            .ledger
            .entries_for(account_id)
            .await?
            .iter()
            .map(|entry| entry.amount)
            .sum::<i64>();
        let consistent = i64::try_from(balance).map_or(false, |b| b == ledger_sum);
        if !consistent {
            warn!(account_id, balance, ledger_sum, "Point balance diverges from ledger.");
        }
        Ok(LedgerAudit {
            balance,
            ledger_sum,
            consistent,
        })
    }

    /// Credits whole points for distance walked. The cumulative distance always
    /// grows by `distance_delta`, even when no point is earned.
    pub async fn accrue_distance(&self, account_id: &str, distance_delta: f64) -> CartResult<DistanceAccrual> {
        if !distance_delta.is_finite() || distance_delta < 0.0 {
            return Err(CartError::validation(
                "distance must be a non-negative finite number",
            ));
        }

        let account = self.accounts.get_account(account_id).await?;
        let total_distance = self.accounts.add_distance(account_id, distance_delta).await?;

        let earned = earned_points(distance_delta, self.rules.distance_per_point);
        if earned == 0 {
            return Ok(DistanceAccrual {
                earned_points: 0,
                balance: account.points,
                total_distance,
            });
        }

        let balance = self.credit(account_id, earned, LedgerReason::Distance, None).await?;
        info!(account_id, earned, balance, "Distance points credited.");
        Ok(DistanceAccrual {
            earned_points: earned,
            balance,
            total_distance,
        })
    }

    /// Fires the first enabled event, in key order, whose beacon lies within
    /// its radius of `position`. At most one event fires per call.
    pub async fn check_location_event(
        &self,
        account_id: &str,
        position: Position,
    ) -> CartResult<Option<TriggeredEvent>> {
        if !position.x.is_finite() || !position.y.is_finite() {
            return Err(CartError::validation("x and y must be finite numbers"));
        }
        self.accounts.get_account(account_id).await?;

        let mut events = self.events.list_events().await?;
        events.sort_by(|a, b| a.id.cmp(&b.id));

        for event in events.into_iter().filter(|event| event.enabled) {
            let Some(beacon) = self.events.get_beacon(&event.beacon_id).await? else {
                continue;
            };
            if position.distance_to(&beacon.position) > event.radius {
                continue;
            }

            let balance = self
                .credit(
                    account_id,
                    event.points,
                    LedgerReason::LocationEvent,
                    Some(event.name.clone()),
                )
                .await?;
            info!(account_id, event_id = %event.id, points = event.points, "Location event triggered.");
            return Ok(Some(TriggeredEvent {
                event_id: event.id,
                name: event.name,
                points: event.points,
                balance,
            }));
        }
        Ok(None)
    }

    /// Spends points. Fails without side effects when the balance is short.
    pub async fn debit(
        &self,
        account_id: &str,
        amount: u64,
        reason: LedgerReason,
        reference: Option<String>,
    ) -> CartResult<u64> {
        if amount == 0 {
            return Err(CartError::validation("debit amount must be positive"));
        }
        let signed = i64::try_from(amount)
            .map_err(|_| CartError::validation("debit amount is too large"))?;

        let Some(balance) = self.accounts.try_debit_points(account_id, amount).await? else {
            let available = self.balance(account_id).await?;
            return Err(CartError::InsufficientPoints {
                requested: amount,
                available,
            });
        };

        self.ledger
            .append(PointLedgerEntry::new(account_id, -signed, reason, reference))
            .await?;
        info!(account_id, amount, balance, reason = %reason, "Points debited.");
        Ok(balance)
    }

    async fn credit(
        &self,
        account_id: &str,
        amount: u64,
        reason: LedgerReason,
        reference: Option<String>,
    ) -> CartResult<u64> {
        let signed = i64::try_from(amount)
            .map_err(|_| CartError::validation("credit amount is too large"))?;
        let balance = self.accounts.add_points(account_id, amount).await?;
        self.ledger
            .append(PointLedgerEntry::new(account_id, signed, reason, reference))
            .await?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ninety_five_units_earn_nine_points() {
        assert_eq!(earned_points(95.0, 10.0), 9);
    }

    #[test]
    fn short_walks_earn_nothing() {
        assert_eq!(earned_points(5.0, 10.0), 0);
        assert_eq!(earned_points(0.0, 10.0), 0);
    }

    #[test]
    fn degenerate_rate_earns_nothing() {
        assert_eq!(earned_points(100.0, 0.0), 0);
    }
}
