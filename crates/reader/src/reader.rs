// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query serving under the consistency contract
//!
//! The reader tracks a *known position*: the highest log position it has
//! proved from the log store. It only ever advances by reconciling with the
//! store; notifications are hints to reconcile sooner.

use crate::error::ReadError;
use crate::projection::Projection;
use crate::query::{matching_models, Consistency, Query, QueryResult};
use ds_coordinator::{Coordinator, NotificationStream};
use ds_core::{CacheMode, Config, LaggingPolicy, Notification, Position};
use ds_storage::{replay, LogStore, Migrations};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument};

/// Tunables of a [`Reader`]
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderOptions {
    pub cache_mode: CacheMode,
    pub lagging_policy: LaggingPolicy,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ReaderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_mode: config.reader.cache_mode,
            lagging_policy: config.reader.lagging_policy,
            wait_timeout: config.reader.wait_timeout,
            poll_interval: config.reader.poll_interval,
        }
    }
}

struct Inner<S> {
    store: Arc<S>,
    projection: Option<RwLock<Projection>>,
    known: watch::Sender<Position>,
    migrations: Migrations,
    options: ReaderOptions,
}

/// Serves queries from one log store; clones share state
pub struct Reader<S: LogStore> {
    inner: Arc<Inner<S>>,
}

impl<S: LogStore> Clone for Reader<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: LogStore> Reader<S> {
    pub fn new(store: Arc<S>, options: ReaderOptions) -> Self {
        Self::with_migrations(store, options, Migrations::none())
    }

    pub fn with_migrations(store: Arc<S>, options: ReaderOptions, migrations: Migrations) -> Self {
        let projection = match options.cache_mode {
            CacheMode::Projection => Some(RwLock::new(Projection::new())),
            CacheMode::None => None,
        };
        let (known, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                store,
                projection,
                known,
                migrations,
                options,
            }),
        }
    }

    /// Highest position proved from the log store
    pub fn known_position(&self) -> Position {
        *self.inner.known.borrow()
    }

    /// Changes of the known position
    pub fn watch_position(&self) -> watch::Receiver<Position> {
        self.inner.known.subscribe()
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.inner.options
    }

    /// Reconcile with the log store and return the new known position
    pub async fn catch_up(&self) -> Result<Position, ReadError> {
        let inner = Arc::clone(&self.inner);
        let known = blocking(move || inner.catch_up()).await?;
        Ok(known)
    }

    /// Answer `query` at the position `consistency` asks for
    pub async fn query(
        &self,
        query: Query,
        consistency: Consistency,
    ) -> Result<QueryResult, ReadError> {
        query.validate()?;
        match consistency {
            Consistency::Pinned { position } => {
                self.wait_for(position).await?;
                self.replay_at(query, position).await
            }
            Consistency::Latest { min_position } => {
                let required = min_position.unwrap_or(0);
                if self.inner.projection.is_none() {
                    self.catch_up().await?;
                }
                if self.known_position() < required {
                    match self.inner.options.lagging_policy {
                        LaggingPolicy::ReadThrough => {
                            let store = Arc::clone(&self.inner.store);
                            let head = blocking(move || Ok(store.max_position()?)).await?;
                            if head >= required {
                                debug!(required, head, "reading through to the log store");
                                return self.replay_at(query, head).await;
                            }
                            self.wait_for(required).await?;
                        }
                        LaggingPolicy::Wait => {
                            self.wait_for(required).await?;
                        }
                    }
                }
                self.latest(query).await
            }
        }
    }

    /// Wait, bounded by the configured timeout, until the known position
    /// reaches `required`
    async fn wait_for(&self, required: Position) -> Result<Position, ReadError> {
        let known = self.known_position();
        if known >= required {
            return Ok(known);
        }
        let deadline = Instant::now() + self.inner.options.wait_timeout;
        let mut changes = self.watch_position();
        loop {
            let known = self.catch_up().await?;
            if known >= required {
                return Ok(known);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(required, known, "gave up waiting for position");
                return Err(ReadError::TimeoutWaitingForPosition { required, known });
            }
            let nap = remaining.min(self.inner.options.poll_interval);
            let _ = tokio::time::timeout(nap, changes.wait_for(|p| *p >= required)).await;
        }
    }

    /// Serve at the known position
    async fn latest(&self, query: Query) -> Result<QueryResult, ReadError> {
        if self.inner.projection.is_none() {
            return self.replay_at(query, self.known_position()).await;
        }
        let inner = Arc::clone(&self.inner);
        blocking(move || {
            let Some(projection) = inner.projection.as_ref() else {
                return Err(ReadError::InvalidRequest("projection disabled".to_string()));
            };
            let projection = projection.read().unwrap_or_else(|e| e.into_inner());
            let data = query.answer(projection.state(), |c, f| projection.matching(c, f));
            Ok(QueryResult {
                position: projection.position(),
                data,
            })
        })
        .await
    }

    /// Serve by folding the log up to `position`
    async fn replay_at(&self, query: Query, position: Position) -> Result<QueryResult, ReadError> {
        let inner = Arc::clone(&self.inner);
        blocking(move || {
            let state = replay(&*inner.store, query.selector(), position, &inner.migrations)?;
            let data = query.answer(&state, |c, f| matching_models(&state, c, f));
            Ok(QueryResult {
                position: state.position(),
                data,
            })
        })
        .await
    }

    /// Keep the known position moving: reconcile on every notification
    /// newer than it and on every poll tick
    ///
    /// The subscription is re-established when it ends or cannot be opened.
    pub fn follow<C: Coordinator>(&self, coordinator: Arc<C>) -> JoinHandle<()> {
        let reader = self.clone();
        tokio::spawn(
            async move { reader.follow_loop(coordinator).await }
                .instrument(tracing::info_span!("follow")),
        )
    }

    async fn follow_loop<C: Coordinator>(&self, coordinator: Arc<C>) {
        let mut ticker = tokio::time::interval(self.inner.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut notifications: Option<NotificationStream> = None;
        info!("following the log");

        loop {
            if notifications.is_none() {
                match coordinator.subscribe().await {
                    Ok(stream) => {
                        debug!("subscribed to notifications");
                        notifications = Some(stream);
                        self.reconcile().await;
                    }
                    Err(e) => warn!("subscribe failed, polling only: {}", e),
                }
            }

            tokio::select! {
                received = next_notification(&mut notifications) => match received {
                    Some(notification) => {
                        if notification.position > self.known_position() {
                            self.reconcile().await;
                        }
                    }
                    None => {
                        warn!("notification stream ended");
                        notifications = None;
                        ticker.tick().await;
                    }
                },
                _ = ticker.tick() => self.reconcile().await,
            }
        }
    }

    async fn reconcile(&self) {
        if let Err(e) = self.catch_up().await {
            warn!("catch-up failed: {}", e);
        }
    }
}

impl<S: LogStore> Inner<S> {
    fn catch_up(&self) -> Result<Position, ReadError> {
        let Some(projection) = self.projection.as_ref() else {
            let head = self.store.max_position()?;
            self.publish(head);
            return Ok(head);
        };
        // Catch-ups serialize on the write lock.
        let mut projection = projection.write().unwrap_or_else(|e| e.into_inner());
        let head = self.store.max_position()?;
        let result = projection.catch_up(&*self.store, head, &self.migrations);
        // Publish whatever was applied, even on a failure part way.
        self.publish(projection.position());
        Ok(result?)
    }

    fn publish(&self, position: Position) {
        self.known.send_if_modified(|known| {
            if *known == position {
                return false;
            }
            if position < *known {
                warn!(known = *known, position, "known position moved backwards");
            }
            *known = position;
            true
        });
    }
}

async fn next_notification(stream: &mut Option<NotificationStream>) -> Option<Notification> {
    match stream {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ReadError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ReadError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(ReadError::StorageUnavailable(format!("store task: {}", e))),
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
