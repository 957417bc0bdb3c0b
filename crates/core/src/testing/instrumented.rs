//! Instrumented store wrapper

use crate::batch::DeleteBatch;
use crate::entity::{Entity, EntityKey};
use crate::error::{StoreError, StoreResult};
use crate::store::{ContinuationToken, Page, Projection, TableStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A store call, as seen by the wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `list_tables`
    ListTables,
    /// `create_table_if_absent`
    CreateTable {
        /// Table name
        table: String,
    },
    /// `delete_table`
    DeleteTable {
        /// Table name
        table: String,
    },
    /// `query_entities`
    Query {
        /// Table name
        table: String,
        /// Requested projection
        projection: Projection,
    },
    /// `insert_entity`
    Insert {
        /// Table name
        table: String,
        /// Inserted key
        key: EntityKey,
    },
    /// `execute_batch`
    Batch {
        /// Table name
        table: String,
        /// Shared partition key of the batch
        partition_key: String,
        /// Number of operations
        size: usize,
        /// Number of distinct partition keys in the batch
        partitions: usize,
    },
}

impl StoreCall {
    /// Table this call addresses, if any
    pub fn table(&self) -> Option<&str> {
        match self {
            StoreCall::ListTables => None,
            StoreCall::CreateTable { table }
            | StoreCall::DeleteTable { table }
            | StoreCall::Query { table, .. }
            | StoreCall::Insert { table, .. }
            | StoreCall::Batch { table, .. } => Some(table),
        }
    }
}

/// Whether an event marks the start or the end of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// The call was issued
    Started,
    /// The call returned
    Finished {
        /// Whether it succeeded
        ok: bool,
    },
}

/// One entry of the call log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Call this event belongs to
    pub call: StoreCall,
    /// Start or end
    pub phase: CallPhase,
}

type FailurePredicate = Box<dyn Fn(&StoreCall) -> bool + Send + Sync>;

struct FailureRule {
    predicate: FailurePredicate,
    remaining: Option<usize>,
}

/// What a matching call does instead of reaching the inner store
#[derive(Clone, Copy, PartialEq, Eq)]
enum Injection {
    Fail,
    Stall,
    Panic,
}

/// A [`TableStore`] wrapper that records, delays and fails calls
pub struct InstrumentedStore<S> {
    inner: S,
    events: Mutex<Vec<StoreEvent>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    latency: Option<(Duration, Duration)>,
    rules: Mutex<Vec<FailureRule>>,
    stalls: Mutex<Vec<FailurePredicate>>,
    panics: Mutex<Vec<FailurePredicate>>,
}

impl<S: TableStore> InstrumentedStore<S> {
    /// Wrap a store
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            events: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            latency: None,
            rules: Mutex::new(Vec::new()),
            stalls: Mutex::new(Vec::new()),
            panics: Mutex::new(Vec::new()),
        }
    }

    /// Delay every call by a random duration in `min..=max`
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = Some((min, max.max(min)));
        self
    }

    /// Fail every call matching the predicate
    pub fn fail_when(&self, predicate: impl Fn(&StoreCall) -> bool + Send + Sync + 'static) {
        self.rules.lock().push(FailureRule {
            predicate: Box::new(predicate),
            remaining: None,
        });
    }

    /// Fail only the first call matching the predicate
    pub fn fail_once_when(&self, predicate: impl Fn(&StoreCall) -> bool + Send + Sync + 'static) {
        self.rules.lock().push(FailureRule {
            predicate: Box::new(predicate),
            remaining: Some(1),
        });
    }

    /// Never complete a call matching the predicate
    pub fn stall_when(&self, predicate: impl Fn(&StoreCall) -> bool + Send + Sync + 'static) {
        self.stalls.lock().push(Box::new(predicate));
    }

    /// Panic inside a call matching the predicate
    pub fn panic_when(&self, predicate: impl Fn(&StoreCall) -> bool + Send + Sync + 'static) {
        self.panics.lock().push(Box::new(predicate));
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Full call log, in order
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().clone()
    }

    /// Calls in the order they were issued
    pub fn calls(&self) -> Vec<StoreCall> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.phase == CallPhase::Started)
            .map(|e| e.call.clone())
            .collect()
    }

    /// Number of issued calls matching the predicate
    pub fn count(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    /// Highest number of calls outstanding at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Calls outstanding right now
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn log(&self, call: StoreCall, phase: CallPhase) {
        self.events.lock().push(StoreEvent { call, phase });
    }

    fn injection(&self, call: &StoreCall) -> Option<Injection> {
        if self.panics.lock().iter().any(|panic| panic(call)) {
            return Some(Injection::Panic);
        }
        if self.stalls.lock().iter().any(|stall| stall(call)) {
            return Some(Injection::Stall);
        }
        self.should_fail(call).then_some(Injection::Fail)
    }

    fn should_fail(&self, call: &StoreCall) -> bool {
        let mut rules = self.rules.lock();
        for rule in rules.iter_mut() {
            if rule.remaining == Some(0) || !(rule.predicate)(call) {
                continue;
            }
            if let Some(remaining) = rule.remaining.as_mut() {
                *remaining -= 1;
            }
            return true;
        }
        false
    }

    fn pause(&self) -> Option<Duration> {
        let (min, max) = self.latency?;
        if max <= min {
            return Some(min);
        }
        let micros = rand::thread_rng().gen_range(min.as_micros() as u64..=max.as_micros() as u64);
        Some(Duration::from_micros(micros))
    }

    async fn run<T, F>(&self, call: StoreCall, op: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
        T: Send,
    {
        self.log(call.clone(), CallPhase::Started);
        let _active = ActiveGuard::enter(&self.active, &self.peak);
        if let Some(pause) = self.pause() {
            tokio::time::sleep(pause).await;
        }
        let result = match self.injection(&call) {
            Some(Injection::Stall) => std::future::pending().await,
            Some(Injection::Panic) => panic!("injected panic on {:?}", call),
            Some(Injection::Fail) => Err(StoreError::Injected(format!("{:?}", call))),
            None => op.await,
        };
        self.log(
            call,
            CallPhase::Finished {
                ok: result.is_ok(),
            },
        );
        result
    }
}

struct ActiveGuard<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: TableStore> TableStore for InstrumentedStore<S> {
    async fn list_tables(&self, cursor: Option<&ContinuationToken>) -> StoreResult<Page<String>> {
        self.run(StoreCall::ListTables, self.inner.list_tables(cursor))
            .await
    }

    async fn create_table_if_absent(&self, table: &str) -> StoreResult<bool> {
        let call = StoreCall::CreateTable {
            table: table.to_string(),
        };
        self.run(call, self.inner.create_table_if_absent(table)).await
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        let call = StoreCall::DeleteTable {
            table: table.to_string(),
        };
        self.run(call, self.inner.delete_table(table)).await
    }

    async fn query_entities(
        &self,
        table: &str,
        projection: Projection,
        cursor: Option<&ContinuationToken>,
    ) -> StoreResult<Page<Entity>> {
        let call = StoreCall::Query {
            table: table.to_string(),
            projection,
        };
        self.run(call, self.inner.query_entities(table, projection, cursor))
            .await
    }

    async fn insert_entity(&self, table: &str, entity: Entity) -> StoreResult<()> {
        let call = StoreCall::Insert {
            table: table.to_string(),
            key: entity.key().clone(),
        };
        self.run(call, self.inner.insert_entity(table, entity)).await
    }

    async fn execute_batch(&self, table: &str, batch: &DeleteBatch) -> StoreResult<()> {
        let mut partitions: Vec<String> = batch.keys().map(|k| k.partition_key).collect();
        partitions.dedup();
        let call = StoreCall::Batch {
            table: table.to_string(),
            partition_key: batch.partition_key().to_string(),
            size: batch.len(),
            partitions: partitions.len(),
        };
        self.run(call, self.inner.execute_batch(table, batch)).await
    }
}
