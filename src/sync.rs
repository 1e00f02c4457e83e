//! Session orchestrator.
//!
//! Wires the three layers together for one authenticated session: the push
//! transport feeds events in, the REST client answers commands, and both
//! only ever touch the shared aggregate through store actions. Pushed
//! entries land as unconfirmed (local-id) records; a reconciliation fetch
//! shortly after replaces the list wholesale with the server-assigned ids,
//! so a second push racing the fetch can never be half-merged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ListQuery, NotificationApi};
use crate::auth::CredentialProvider;
use crate::config::Config;
use crate::errors::ClientError;
use crate::models::NotificationId;
use crate::store::{Action, NotificationStore, MAX_ITEMS};
use crate::transport::{PushTransport, ReconnectPolicy, TransportEvent};

pub struct SyncSession {
    store: Arc<NotificationStore>,
    api: Arc<NotificationApi>,
    transport: PushTransport,
    cancel: CancellationToken,
    reconcile_delay: Duration,
    reconcile_pending: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl SyncSession {
    pub fn new(config: &Config, credentials: Arc<dyn CredentialProvider>) -> Self {
        let api = Arc::new(NotificationApi::new(
            config.api_base_url.clone(),
            config.tenant_id.clone(),
            credentials.clone(),
        ));
        let transport = PushTransport::new(
            config.ws_url.clone(),
            config.tenant_id.clone(),
            credentials,
            ReconnectPolicy {
                base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
                max_attempts: config.max_reconnect_attempts,
            },
        );

        Self {
            store: Arc::new(NotificationStore::new()),
            api,
            transport,
            cancel: CancellationToken::new(),
            reconcile_delay: Duration::from_millis(config.reconcile_delay_ms),
            reconcile_pending: Arc::new(AtomicBool::new(false)),
            pump: None,
        }
    }

    pub fn store(&self) -> Arc<NotificationStore> {
        self.store.clone()
    }

    pub fn api(&self) -> Arc<NotificationApi> {
        self.api.clone()
    }

    pub fn transport(&self) -> &PushTransport {
        &self.transport
    }

    /// Initial load, then connect the push channel and start pumping
    /// transport events into the store.
    pub async fn start(&mut self) {
        self.refresh().await;

        let events = self.transport.subscribe();
        let store = self.store.clone();
        let api = self.api.clone();
        let cancel = self.cancel.clone();
        let reconcile_delay = self.reconcile_delay;
        let reconcile_pending = self.reconcile_pending.clone();

        self.pump = Some(tokio::spawn(Self::pump_events(
            events,
            store,
            api,
            cancel,
            reconcile_delay,
            reconcile_pending,
        )));

        self.transport.connect().await;
    }

    async fn pump_events(
        mut events: tokio::sync::broadcast::Receiver<TransportEvent>,
        store: Arc<NotificationStore>,
        api: Arc<NotificationApi>,
        cancel: CancellationToken,
        reconcile_delay: Duration,
        reconcile_pending: Arc<AtomicBool>,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = events.recv() => event,
            };

            match event {
                Ok(TransportEvent::Status(status)) => {
                    store.dispatch(Action::SetConnection(status));
                }
                Ok(TransportEvent::Push(push)) => {
                    debug!(kind = push.kind.as_str(), "push received");
                    store.dispatch(Action::PrependOne(push.into_unconfirmed()));

                    // One reconciliation at a time; a push arriving during
                    // the wait rides on the already-scheduled fetch.
                    if !reconcile_pending.swap(true, Ordering::AcqRel) {
                        let store = store.clone();
                        let api = api.clone();
                        let cancel = cancel.clone();
                        let pending = reconcile_pending.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = cancel.cancelled() => {}
                                _ = tokio::time::sleep(reconcile_delay) => {
                                    Self::reconcile(&store, &api, &cancel).await;
                                }
                            }
                            pending.store(false, Ordering::Release);
                        });
                    }
                }
                Ok(TransportEvent::SubscribeFailed(reason)) => {
                    warn!(%reason, "push subscription failed; feed will stay silent");
                    store.dispatch(Action::SetError(Some(format!(
                        "real-time updates unavailable: {}",
                        reason
                    ))));
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "event pump lagged; forcing a refresh");
                    Self::reconcile(&store, &api, &cancel).await;
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Authoritative fetch replacing unconfirmed entries and re-syncing the
    /// unread counter. Failures are logged; the feed stays approximate
    /// until the next refresh succeeds.
    async fn reconcile(
        store: &NotificationStore,
        api: &NotificationApi,
        cancel: &CancellationToken,
    ) {
        match api.recent(MAX_ITEMS as u32, cancel).await {
            Ok(items) => {
                store.dispatch(Action::ReplaceList(items));
            }
            Err(ClientError::Cancelled) => return,
            Err(e) => {
                warn!(error = %e, "reconciliation fetch failed");
                return;
            }
        }
        match api.unread_count(cancel).await {
            Ok(count) => {
                store.dispatch(Action::SetUnreadCount(count));
            }
            Err(ClientError::Cancelled) => {}
            Err(e) => warn!(error = %e, "unread-count fetch failed"),
        }
    }

    /// Full refresh: recent list plus unread count, with loading/error
    /// bookkeeping.
    pub async fn refresh(&self) {
        self.store.dispatch(Action::SetLoading(true));

        match self.api.recent(MAX_ITEMS as u32, &self.cancel).await {
            Ok(items) => {
                info!(count = items.len(), "notification list loaded");
                self.store.dispatch(Action::ReplaceList(items));
            }
            Err(ClientError::Cancelled) => return,
            Err(e) => {
                self.store.dispatch(Action::SetError(Some(e.to_string())));
                return;
            }
        }

        match self.api.unread_count(&self.cancel).await {
            Ok(count) => {
                self.store.dispatch(Action::SetUnreadCount(count));
            }
            Err(ClientError::Cancelled) => {}
            Err(e) => {
                self.store.dispatch(Action::SetError(Some(e.to_string())));
            }
        }
    }

    /// Mark one entry read. Unconfirmed (local-id) entries have no durable
    /// id to address yet; they resolve on the next reconciliation.
    pub async fn mark_read(&self, id: NotificationId) -> Result<(), ClientError> {
        let Some(server_id) = id.server_id() else {
            debug!(%id, "mark-read skipped for unconfirmed entry");
            return Ok(());
        };

        match self.api.mark_read(server_id, &self.cancel).await {
            Ok(updated) => {
                let read_at = updated.read_at.unwrap_or_else(Utc::now);
                self.store.dispatch(Action::MarkOneRead { id, read_at });
                Ok(())
            }
            Err(e) => {
                self.store.dispatch(Action::SetError(Some(e.to_string())));
                Err(e)
            }
        }
    }

    pub async fn mark_all_read(&self) -> Result<(), ClientError> {
        match self.api.mark_all_read(&self.cancel).await {
            Ok(()) => {
                self.store.dispatch(Action::MarkAllRead { read_at: Utc::now() });
                Ok(())
            }
            Err(e) => {
                self.store.dispatch(Action::SetError(Some(e.to_string())));
                Err(e)
            }
        }
    }

    pub async fn delete(&self, id: NotificationId) -> Result<(), ClientError> {
        let Some(server_id) = id.server_id() else {
            debug!(%id, "delete skipped for unconfirmed entry");
            return Ok(());
        };

        match self.api.delete(server_id, &self.cancel).await {
            Ok(()) => {
                self.store.dispatch(Action::RemoveOne(id));
                Ok(())
            }
            Err(e) => {
                self.store.dispatch(Action::SetError(Some(e.to_string())));
                Err(e)
            }
        }
    }

    /// Paginated list for browsing beyond the live window. Pass-through to
    /// the API; the live store keeps its own bounded view.
    pub async fn list_page(
        &self,
        query: &ListQuery,
    ) -> Result<(Vec<crate::models::Notification>, Option<crate::models::Pagination>), ClientError>
    {
        self.api.list(query, &self.cancel).await
    }

    /// Tear the session down: cancel in-flight requests, close the push
    /// channel, reset the aggregate to its zero value.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
        self.transport.disconnect().await;
        self.store.dispatch(Action::Reset);
        info!("notification session closed");
    }
}
