// File: tests/common/mod.rs
//
// Shared bank-account domain used by the integration tests

#![allow(dead_code)]

use std::any::{Any, TypeId};
use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use eventfold::{
    Aggregate, AggregateCell, AggregateRoot, AggregateRoutes, Command, Event, EventProcessor,
    EventRoutes, FrameworkError, FrameworkResult, Projection, Query, QueryEnvelope, QueryRoutes,
    QueryValue,
};

// ================================
// Commands
// ================================

#[derive(Debug)]
pub struct OpenAccount {
    pub account_id: Uuid,
    pub owner: String,
    pub correlation_id: Option<Uuid>,
}

impl Command for OpenAccount {
    fn aggregate_id(&self) -> Uuid {
        self.account_id
    }

    fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
}

#[derive(Debug)]
pub struct DepositMoney {
    pub account_id: Uuid,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

impl Command for DepositMoney {
    fn aggregate_id(&self) -> Uuid {
        self.account_id
    }

    fn idempotency_key(&self) -> Option<String> {
        self.idempotency_key.clone()
    }
}

// ================================
// Events
// ================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountOpened {
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyDeposited {
    pub amount: i64,
}

// ================================
// Aggregate
// ================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    root: AggregateRoot,
    pub owner: Option<String>,
    pub balance: i64,
}

impl Aggregate for BankAccount {
    fn aggregate_type() -> &'static str {
        "bank_account"
    }

    fn new(id: Uuid) -> Self {
        Self {
            root: AggregateRoot::new(id),
            owner: None,
            balance: 0,
        }
    }

    fn root(&self) -> &AggregateRoot {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot {
        &mut self.root
    }

    fn configure(routes: &mut AggregateRoutes<Self>) {
        routes.command(Self::open);
        routes.command(Self::deposit);
        routes.apply(Self::apply_opened);
        routes.apply(Self::apply_deposited);
    }
}

impl BankAccount {
    fn open(cell: &mut AggregateCell<'_, Self>, cmd: &OpenAccount) -> FrameworkResult<()> {
        if cell.owner.is_some() {
            return Err(FrameworkError::handler("account already open"));
        }
        cell.emit(AccountOpened {
            owner: cmd.owner.clone(),
        });
        Ok(())
    }

    fn deposit(cell: &mut AggregateCell<'_, Self>, cmd: &DepositMoney) -> FrameworkResult<()> {
        if cell.owner.is_none() {
            return Err(FrameworkError::handler("account not open"));
        }
        if cmd.amount <= 0 {
            return Err(FrameworkError::handler("amount must be positive"));
        }
        cell.emit(MoneyDeposited { amount: cmd.amount });
        Ok(())
    }

    fn apply_opened(&mut self, event: &AccountOpened) {
        self.owner = Some(event.owner.clone());
    }

    fn apply_deposited(&mut self, event: &MoneyDeposited) {
        self.balance += event.amount;
    }
}

// ================================
// Projection
// ================================

#[derive(Debug, Clone)]
pub struct GetBalance {
    pub account_id: Uuid,
}

impl Query for GetBalance {
    type Response = Option<i64>;
}

pub struct AccountBalances {
    balances: RwLock<HashMap<Uuid, i64>>,
    events: EventRoutes<Self>,
    queries: QueryRoutes<Self>,
}

impl AccountBalances {
    pub fn new() -> Self {
        let mut events = EventRoutes::new();
        events.on_event::<AccountOpened, _>(Self::on_opened);
        events.on_event::<MoneyDeposited, _>(Self::on_deposited);
        let mut queries = QueryRoutes::new();
        queries.on(Self::get_balance);
        Self {
            balances: RwLock::new(HashMap::new()),
            events,
            queries,
        }
    }

    pub async fn balance_of(&self, account_id: Uuid) -> Option<i64> {
        self.balances.read().await.get(&account_id).copied()
    }

    pub async fn insert(&self, account_id: Uuid, balance: i64) {
        self.balances.write().await.insert(account_id, balance);
    }

    async fn on_opened(&self, event: Event) -> FrameworkResult<()> {
        self.balances.write().await.insert(event.aggregate_id, 0);
        Ok(())
    }

    async fn on_deposited(&self, event: Event) -> FrameworkResult<()> {
        let amount = event
            .payload::<MoneyDeposited>()
            .map(|deposit| deposit.amount)
            .unwrap_or(0);
        *self
            .balances
            .write()
            .await
            .entry(event.aggregate_id)
            .or_insert(0) += amount;
        Ok(())
    }

    async fn get_balance(&self, query: GetBalance) -> FrameworkResult<Option<i64>> {
        Ok(self.balance_of(query.account_id).await)
    }
}

#[async_trait]
impl EventProcessor for AccountBalances {
    fn name(&self) -> &'static str {
        "account_balances"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn handle(&self, event: &Event) -> FrameworkResult<()> {
        self.events.dispatch(self, event).await
    }
}

#[async_trait]
impl Projection for AccountBalances {
    async fn query(&self, query: &QueryEnvelope) -> FrameworkResult<QueryValue> {
        self.queries.dispatch(self, query).await
    }

    fn handled_queries(&self) -> Vec<(TypeId, &'static str)> {
        self.queries.handled_queries()
    }
}

// ================================
// A processor that can be told to fail
// ================================

pub struct GrumpyProcessor {
    pub handled: RwLock<Vec<Uuid>>,
    pub fail_on_opened: bool,
}

impl GrumpyProcessor {
    pub fn new(fail_on_opened: bool) -> Self {
        Self {
            handled: RwLock::new(Vec::new()),
            fail_on_opened,
        }
    }
}

#[async_trait]
impl EventProcessor for GrumpyProcessor {
    fn name(&self) -> &'static str {
        "grumpy_processor"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn handle(&self, event: &Event) -> FrameworkResult<()> {
        if self.fail_on_opened && event.payload_is::<AccountOpened>() {
            return Err(FrameworkError::handler("grumpy about new accounts"));
        }
        self.handled.write().await.push(event.id);
        Ok(())
    }
}

pub fn open_account(account_id: Uuid, owner: &str) -> OpenAccount {
    OpenAccount {
        account_id,
        owner: owner.to_string(),
        correlation_id: None,
    }
}

pub fn deposit(account_id: Uuid, amount: i64) -> DepositMoney {
    DepositMoney {
        account_id,
        amount,
        idempotency_key: None,
    }
}
