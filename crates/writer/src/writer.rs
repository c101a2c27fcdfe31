// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction orchestration: locks, re-checks, append, notification

use crate::error::WriteError;
use crate::guard::LockGuard;
use crate::request::WriteRequest;
use crate::transaction::{build_events, check_declarations, check_preconditions, load_models};
use ds_coordinator::Coordinator;
use ds_core::{
    Collection, Config, FqField, Id, IdGen, Notification, Position, TransactionId, UuidIdGen,
};
use ds_storage::{AppendOutcome, AppendRequest, LogStore, Migrations, RejectReason};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Instrument};

/// Tunables of a [`Writer`]
#[derive(Clone, Debug, PartialEq)]
pub struct WriterOptions {
    pub lock_ttl: Duration,
    pub lock_acquire_timeout: Duration,
    pub commit_timeout: Duration,
    pub dev_mode: bool,
    pub default_migration_index: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl WriterOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lock_ttl: config.writer.lock_ttl,
            lock_acquire_timeout: config.writer.lock_acquire_timeout,
            commit_timeout: config.writer.commit_timeout,
            dev_mode: config.writer.dev_mode,
            default_migration_index: config.log_store.default_migration_index,
        }
    }
}

/// Accepts transactions against one log store
pub struct Writer<S: LogStore, C: Coordinator, G: IdGen = UuidIdGen> {
    store: Arc<S>,
    coordinator: Arc<C>,
    ids: G,
    migrations: Arc<Migrations>,
    options: WriterOptions,
}

impl<S: LogStore, C: Coordinator, G: IdGen> Clone for Writer<S, C, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            coordinator: Arc::clone(&self.coordinator),
            ids: self.ids.clone(),
            migrations: Arc::clone(&self.migrations),
            options: self.options.clone(),
        }
    }
}

impl<S: LogStore, C: Coordinator> Writer<S, C> {
    pub fn new(store: Arc<S>, coordinator: Arc<C>, options: WriterOptions) -> Self {
        Self::with_ids(store, coordinator, options, UuidIdGen)
    }
}

impl<S: LogStore, C: Coordinator, G: IdGen> Writer<S, C, G> {
    pub fn with_ids(store: Arc<S>, coordinator: Arc<C>, options: WriterOptions, ids: G) -> Self {
        Self {
            store,
            coordinator,
            ids,
            migrations: Arc::new(Migrations::none()),
            options,
        }
    }

    /// Events read back for DeleteModel and preconditions are brought up to
    /// the current migration index first
    pub fn with_migrations(mut self, migrations: Migrations) -> Self {
        self.migrations = Arc::new(migrations);
        self
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Commit one transaction and return its position
    pub async fn write(&self, request: WriteRequest) -> Result<Position, WriteError> {
        let tx = self.ids.next();
        let span = tracing::info_span!("write", %tx, mutations = request.mutations.len());
        self.write_as(tx, request).instrument(span).await
    }

    /// Commit several requests as one transaction at a single position
    pub async fn write_batch(&self, requests: Vec<WriteRequest>) -> Result<Position, WriteError> {
        let batch = requests.len();
        let request = WriteRequest::merge(requests)?;
        let tx = self.ids.next();
        let span = tracing::info_span!(
            "write",
            %tx,
            batch,
            mutations = request.mutations.len()
        );
        self.write_as(tx, request).instrument(span).await
    }

    async fn write_as(
        &self,
        tx: TransactionId,
        request: WriteRequest,
    ) -> Result<Position, WriteError> {
        let start = Instant::now();
        let head = self.blocking(|store| store.max_position()).await?;
        request.validate(head)?;

        let guard = LockGuard::acquire(
            Arc::clone(&self.coordinator),
            request.lock_keys(),
            tx.clone(),
            self.options.lock_ttl,
            self.options.lock_acquire_timeout,
        )
        .await?;

        let store = Arc::clone(&self.store);
        let migrations = Arc::clone(&self.migrations);
        let default_index = self.options.default_migration_index;
        let holder = tx.clone();
        let mut commit = tokio::task::spawn_blocking(move || {
            commit_transaction(&*store, &holder, request, &migrations, default_index)
        });

        let committed = match tokio::time::timeout(self.options.commit_timeout, &mut commit).await
        {
            Ok(joined) => {
                guard.release().await;
                joined.map_err(|e| WriteError::StorageUnavailable(format!("commit task: {}", e)))?
            }
            Err(_) => {
                // The append may still land; keep the locks until it settles.
                warn!("commit timed out, outcome unknown");
                tokio::spawn(async move {
                    let _ = commit.await;
                    guard.release().await;
                });
                return Err(WriteError::StorageUnavailable(
                    "commit timed out".to_string(),
                ));
            }
        };
        let (position, fields) = match committed {
            Ok(committed) => committed,
            Err(e) => {
                debug!(kind = e.kind(), "transaction rejected: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = self
            .coordinator
            .publish(Notification::new(position, fields))
            .await
        {
            error!(position, "failed to publish notification: {}", e);
        }
        info!(
            position,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "committed"
        );
        Ok(position)
    }

    /// Allocate `amount` fresh ids for a collection
    pub async fn reserve_ids(
        &self,
        collection: Collection,
        amount: u32,
    ) -> Result<Vec<Id>, WriteError> {
        if amount == 0 {
            return Err(WriteError::InvalidRequest(
                "amount must be at least 1".to_string(),
            ));
        }
        let ids = self
            .blocking(move |store| store.reserve_ids(&collection, amount))
            .await?;
        debug!(amount, first = ids.first().copied(), "reserved ids");
        Ok(ids)
    }

    /// Erase the free-form information of every position
    pub async fn delete_history_information(&self) -> Result<(), WriteError> {
        self.blocking(|store| store.delete_history_information())
            .await?;
        info!("deleted history information");
        Ok(())
    }

    /// Remove all data; refused unless running in dev mode
    pub async fn truncate_db(&self) -> Result<(), WriteError> {
        if !self.options.dev_mode {
            return Err(WriteError::DevModeOnly("truncate_db"));
        }
        self.blocking(|store| store.truncate()).await?;
        warn!("truncated the log store");
        Ok(())
    }

    /// Run a store call on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T, WriteError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, ds_storage::StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let joined = tokio::task::spawn_blocking(move || f(&*store)).await;
        match joined {
            Ok(result) => Ok(result?),
            Err(e) => Err(WriteError::StorageUnavailable(format!("store task: {}", e))),
        }
    }
}

/// Everything after the locks are held, up to and including the append
fn commit_transaction<S: LogStore + ?Sized>(
    store: &S,
    tx: &TransactionId,
    request: WriteRequest,
    migrations: &Migrations,
    default_migration_index: u32,
) -> Result<(Position, Vec<FqField>), WriteError> {
    let head = store.max_position()?;
    check_declarations(store, &request.locks, head, migrations)?;
    let state = load_models(store, &request, head, migrations)?;
    check_preconditions(&state, &request.preconditions)?;
    let events = build_events(store, &request.mutations, &state, default_migration_index)?;
    let fields: Vec<FqField> = events.iter().map(|e| e.fqfield.clone()).collect();

    let outcome = store.append(AppendRequest {
        transaction_id: tx.clone(),
        user_id: request.user_id,
        information: request.information,
        events,
    })?;
    match outcome {
        AppendOutcome::Committed { position } => Ok((position, fields)),
        AppendOutcome::Rejected(RejectReason::DuplicateTransaction { position }) => {
            debug!(position, "transaction already committed");
            Ok((position, fields))
        }
        AppendOutcome::Rejected(RejectReason::Empty) => Err(WriteError::InvalidRequest(
            "transaction produces no events".to_string(),
        )),
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
