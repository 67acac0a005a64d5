//! Live order view for an authenticated surface: one snapshot fetch merged
//! with one feed subscription, owned explicitly and torn down whenever the
//! identity or the display filter changes.

use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::client::reconciler::ViewReconciler;
use crate::client::sse::FrameDecoder;
use crate::domain::order::{OrderStatus, OrderView};
use crate::feed::{ChangeEvent, ChangeKind};
use crate::handlers::identity::{RESTAURANT_HEADER, ROLE_HEADER, STAFF_HEADER};

/// Composite subscription identity: caller + active display filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionKey {
    pub identity: String,
    pub filter: Option<OrderStatus>,
}

struct FeedSubscription {
    key: SubscriptionKey,
    handle: JoinHandle<()>,
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Holds at most one live feed subscription. Installing a new one always
/// tears the previous one down first, so switching identity or filter can
/// never leave two overlapping subscriptions.
#[derive(Default)]
pub struct SubscriptionManager {
    active: Option<FeedSubscription>,
}

impl SubscriptionManager {
    pub fn active_key(&self) -> Option<&SubscriptionKey> {
        self.active.as_ref().map(|sub| &sub.key)
    }

    pub fn replace(&mut self, key: SubscriptionKey, handle: JoinHandle<()>) {
        self.teardown();
        self.active = Some(FeedSubscription { key, handle });
    }

    pub fn teardown(&mut self) {
        self.active.take();
    }
}

#[derive(Debug, Clone)]
pub struct SurfaceCredentials {
    pub restaurant_id: Uuid,
    pub role: String,
    pub staff_id: Option<Uuid>,
}

impl SurfaceCredentials {
    pub fn admin(restaurant_id: Uuid) -> Self {
        Self {
            restaurant_id,
            role: "admin".to_string(),
            staff_id: None,
        }
    }

    pub fn waiter(restaurant_id: Uuid, staff_id: Uuid) -> Self {
        Self {
            restaurant_id,
            role: "waiter".to_string(),
            staff_id: Some(staff_id),
        }
    }

    pub fn rider(restaurant_id: Uuid, staff_id: Uuid) -> Self {
        Self {
            restaurant_id,
            role: "rider".to_string(),
            staff_id: Some(staff_id),
        }
    }

    fn identity_token(&self) -> String {
        format!(
            "{}:{}:{}",
            self.restaurant_id,
            self.role,
            self.staff_id.map(|id| id.to_string()).unwrap_or_default()
        )
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header(RESTAURANT_HEADER, self.restaurant_id.to_string())
            .header(ROLE_HEADER, self.role.as_str());
        match self.staff_id {
            Some(staff) => request.header(STAFF_HEADER, staff.to_string()),
            None => request,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    items: Vec<OrderView>,
}

type SharedReconciler = Arc<Mutex<ViewReconciler>>;

fn lock(state: &SharedReconciler) -> std::sync::MutexGuard<'_, ViewReconciler> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SurfaceView {
    client: reqwest::Client,
    base_url: String,
    credentials: SurfaceCredentials,
    subscriptions: SubscriptionManager,
    state: SharedReconciler,
}

impl SurfaceView {
    pub fn new(base_url: impl Into<String>, credentials: SurfaceCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            credentials,
            subscriptions: SubscriptionManager::default(),
            state: Arc::new(Mutex::new(ViewReconciler::new(None))),
        }
    }

    /// Current local list, newest first.
    pub fn orders(&self) -> Vec<OrderView> {
        lock(&self.state).orders().to_vec()
    }

    pub fn subscription_key(&self) -> Option<SubscriptionKey> {
        self.subscriptions.active_key().cloned()
    }

    /// (Re)open the view for a display filter: tear down any previous
    /// subscription, open the push feed, then seed from one snapshot fetch.
    /// The feed is opened first so nothing committed during the snapshot
    /// request is missed; the insert-dedup rule absorbs the overlap.
    pub async fn open(&mut self, filter: Option<OrderStatus>) -> Result<(), reqwest::Error> {
        let key = SubscriptionKey {
            identity: self.credentials.identity_token(),
            filter,
        };
        self.subscriptions.teardown();

        let state = Arc::new(Mutex::new(ViewReconciler::new(filter)));
        self.state = Arc::clone(&state);

        let handle = tokio::spawn(run_feed(
            self.client.clone(),
            self.base_url.clone(),
            self.credentials.clone(),
            Arc::clone(&state),
        ));
        self.subscriptions.replace(key, handle);

        let snapshot = self.fetch_snapshot(filter).await?;
        lock(&self.state).seed(snapshot);
        Ok(())
    }

    pub fn close(&mut self) {
        self.subscriptions.teardown();
    }

    async fn fetch_snapshot(
        &self,
        filter: Option<OrderStatus>,
    ) -> Result<Vec<OrderView>, reqwest::Error> {
        let mut request = self.client.get(format!("{}/orders", self.base_url));
        if let Some(status) = filter {
            request = request.query(&[("status", status.as_str())]);
        }
        let snapshot: Snapshot = self
            .credentials
            .apply(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot.items)
    }
}

async fn run_feed(
    client: reqwest::Client,
    base_url: String,
    credentials: SurfaceCredentials,
    state: SharedReconciler,
) {
    let request = credentials.apply(client.get(format!("{base_url}/realtime/orders")));
    let response = match request.send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => response,
        Err(e) => {
            log::warn!("feed subscription failed to open: {e}");
            return;
        }
    };

    let mut body = response.bytes_stream();
    let mut decoder = FrameDecoder::default();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("feed connection dropped: {e}");
                return;
            }
        };
        for frame in decoder.push(&String::from_utf8_lossy(&chunk)) {
            match serde_json::from_str::<ChangeEvent>(&frame.data) {
                Ok(event) => {
                    handle_event(&client, &base_url, &credentials, &state, event).await;
                }
                Err(e) => log::warn!("undecodable feed frame '{}': {e}", frame.event),
            }
        }
    }
}

async fn handle_event(
    client: &reqwest::Client,
    base_url: &str,
    credentials: &SurfaceCredentials,
    state: &SharedReconciler,
    event: ChangeEvent,
) {
    match event.kind {
        ChangeKind::Insert => {
            // Feed payloads carry header columns only; fetch the full
            // projection so the merged row is shaped like the snapshot rows.
            match fetch_order(client, base_url, credentials, event.order_id).await {
                Ok(Some(order)) => lock(state).apply_insert(order),
                Ok(None) => {}
                Err(e) => {
                    // Stale list until the next refresh beats a partial row.
                    log::warn!(
                        "projection fetch for inserted order {} failed: {e}",
                        event.order_id
                    );
                }
            }
        }
        ChangeKind::Update => lock(state).apply_update(event.order_id, &event.columns),
        ChangeKind::Delete => lock(state).apply_delete(event.order_id),
    }
}

async fn fetch_order(
    client: &reqwest::Client,
    base_url: &str,
    credentials: &SurfaceCredentials,
    order_id: Uuid,
) -> Result<Option<OrderView>, reqwest::Error> {
    let request = credentials.apply(client.get(format!("{base_url}/orders/{order_id}")));
    let response = request.send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let order = response.error_for_status()?.json::<OrderView>().await?;
    Ok(Some(order))
}
