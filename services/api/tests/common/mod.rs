//! Shared fixtures for the integration tests: an in-memory store seeded with
//! the demo catalog and a payment gateway that answers from a script.

#![allow(dead_code)]

use api_lib::adapters::MemoryStore;
use api_lib::config::{Config, StoreBackend};
use api_lib::web::AppState;
use async_trait::async_trait;
use smart_cart_core::domain::{Account, PaymentReceipt, PointRules};
use smart_cart_core::ports::{
    AccountStore, CancelReceipt, GatewayFailure, GatewayOutcome, PaymentGateway, PortError,
    PortResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const RAMYUN: &str = "8801234567890"; // 3500, stock 50
pub const COLA: &str = "8801234567892"; // 1500, stock 100
pub const MILK: &str = "8801234567894"; // 2500, stock 20

/// One scripted answer to a `confirm` call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Approve,
    Reject(GatewayFailure),
    Unreachable,
}

impl Scripted {
    pub fn duplicate() -> Self {
        Scripted::Reject(GatewayFailure {
            code: GatewayFailure::DUPLICATE_CODE.to_string(),
            message: "이미 처리된 결제 입니다.".to_string(),
        })
    }

    pub fn declined() -> Self {
        Scripted::Reject(GatewayFailure {
            code: "REJECT_CARD_PAYMENT".to_string(),
            message: "한도초과 혹은 잔액부족으로 결제에 실패했습니다.".to_string(),
        })
    }
}

/// A `PaymentGateway` that approves by default and otherwise follows a script.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Scripted>>,
    payments: Mutex<HashMap<String, PaymentReceipt>>,
    pub confirm_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn push(&self, answer: Scripted) {
        self.script.lock().unwrap().push_back(answer);
    }

    pub fn confirms(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Records a payment as the gateway would report it on lookup.
    pub fn record_payment(&self, receipt: PaymentReceipt) {
        self.payments
            .lock()
            .unwrap()
            .insert(receipt.payment_key.clone(), receipt);
    }

    /// Remembers the first capture for a key; later calls with the same key
    /// do not change what the gateway reports for it.
    fn capture(&self, order_id: &str, payment_key: &str, amount: u64) -> PaymentReceipt {
        self.payments
            .lock()
            .unwrap()
            .entry(payment_key.to_string())
            .or_insert_with(|| receipt(order_id, payment_key, PaymentReceipt::DONE, amount))
            .clone()
    }
}

pub fn receipt(order_id: &str, payment_key: &str, status: &str, amount: u64) -> PaymentReceipt {
    PaymentReceipt {
        payment_key: payment_key.to_string(),
        order_id: order_id.to_string(),
        status: status.to_string(),
        method: Some("카드".to_string()),
        approved_at: Some("2024-05-01T12:00:00+09:00".to_string()),
        total_amount: amount,
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn confirm(
        &self,
        order_id: &str,
        payment_key: &str,
        amount: u64,
    ) -> PortResult<GatewayOutcome<PaymentReceipt>> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Approve);
        match answer {
            Scripted::Approve => {
                // The real gateway is a network hop; let other tasks run.
                tokio::task::yield_now().await;
                let receipt = self.capture(order_id, payment_key, amount);
                Ok(GatewayOutcome::Approved(receipt))
            }
            Scripted::Reject(failure) => {
                if failure.is_duplicate_request() {
                    // A duplicate means the gateway did capture this payment.
                    self.capture(order_id, payment_key, amount);
                }
                Ok(GatewayOutcome::Rejected(failure))
            }
            Scripted::Unreachable => Err(PortError::Unexpected("connection refused".to_string())),
        }
    }

    async fn cancel(
        &self,
        payment_key: &str,
        _reason: &str,
    ) -> PortResult<GatewayOutcome<CancelReceipt>> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOutcome::Approved(CancelReceipt {
            payment_key: payment_key.to_string(),
            status: "CANCELED".to_string(),
        }))
    }

    async fn fetch(&self, payment_key: &str) -> PortResult<GatewayOutcome<PaymentReceipt>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.payments.lock().unwrap().get(payment_key) {
            Some(receipt) => Ok(GatewayOutcome::Approved(receipt.clone())),
            None => Ok(GatewayOutcome::Rejected(GatewayFailure {
                code: "NOT_FOUND_PAYMENT".to_string(),
                message: "존재하지 않는 결제 정보 입니다.".to_string(),
            })),
        }
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        store: StoreBackend::Memory,
        log_level: tracing::Level::DEBUG,
        toss_secret_key: "test_sk_placeholder".to_string(),
        toss_api_base: "http://127.0.0.1:9".to_string(),
        allowed_origin: "http://localhost:5173".to_string(),
        point_rules: PointRules::default(),
    }
}

/// Everything a test needs: the store, the gateway, and the wired services.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub state: Arc<AppState>,
}

impl Harness {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.seed_demo().await;
        let gateway = Arc::new(ScriptedGateway::default());
        let state = Arc::new(AppState::build(
            Arc::new(test_config()),
            store.clone(),
            gateway.clone(),
        ));
        Self {
            store,
            gateway,
            state,
        }
    }

    /// Registers an account and returns its id.
    pub async fn account(&self, id: &str) -> String {
        self.store.insert_account(Account::new(id)).await;
        id.to_string()
    }

    /// Registers an account holding `points`, earned through the ledger so the
    /// balance and ledger agree.
    pub async fn account_with_points(&self, id: &str, points: u64) -> String {
        let id = self.account(id).await;
        let per_point = self.state.points.rules().distance_per_point;
        self.state
            .points
            .accrue_distance(&id, points as f64 * per_point)
            .await
            .unwrap();
        id
    }

    pub async fn balance(&self, id: &str) -> u64 {
        self.store.get_account(id).await.unwrap().points
    }
}
