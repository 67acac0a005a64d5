//! Kitchen display surface: a fixed-interval poller over the
//! unauthenticated ticket endpoint, with local novelty detection driving a
//! single audio cue per batch of new tickets.

use std::collections::HashSet;
use std::time::Duration;

use uuid::Uuid;

use crate::domain::order::OrderView;

/// Receives the audio cue when a poll surfaces tickets not seen before.
pub trait AlertSink: Send + 'static {
    fn chime(&self);
}

/// Default sink for headless deployments.
pub struct LogAlert;

impl AlertSink for LogAlert {
    fn chime(&self) {
        log::info!("new kitchen tickets arrived");
    }
}

#[derive(Debug)]
pub struct Observation {
    /// Tickets to display, after locally dismissed ones are masked out.
    pub tickets: Vec<OrderView>,
    /// Whether this poll surfaced at least one previously unseen ticket.
    /// At most one cue per poll, however many tickets arrived.
    pub new_arrivals: bool,
}

/// Pure poll-to-poll state of the kitchen display.
///
/// `hidden_ids` masks tickets the operator dismissed until the matching
/// server-side status change propagates (or the operator hid a ticket
/// without completing it). It lives only in this process and resets with
/// it.
#[derive(Debug, Default)]
pub struct TicketBoard {
    previous_ids: HashSet<Uuid>,
    hidden_ids: HashSet<Uuid>,
    seeded: bool,
}

impl TicketBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one successful poll into the board. The very first poll seeds
    /// `previous_ids` silently.
    pub fn observe(&mut self, fetched: Vec<OrderView>) -> Observation {
        let tickets: Vec<OrderView> = fetched
            .into_iter()
            .filter(|ticket| !self.hidden_ids.contains(&ticket.id))
            .collect();
        let ids: HashSet<Uuid> = tickets.iter().map(|ticket| ticket.id).collect();

        let novel = ids.iter().any(|id| !self.previous_ids.contains(id));
        let new_arrivals = self.seeded && novel;

        self.previous_ids = ids;
        self.seeded = true;
        Observation {
            tickets,
            new_arrivals,
        }
    }

    /// Optimistically dismiss a ticket, independent of the next poll result.
    pub fn hide(&mut self, id: Uuid) {
        self.hidden_ids.insert(id);
    }

    pub fn is_hidden(&self, id: Uuid) -> bool {
        self.hidden_ids.contains(&id)
    }
}

pub struct KitchenPoller<A: AlertSink> {
    client: reqwest::Client,
    base_url: String,
    restaurant_id: Uuid,
    interval: Duration,
    board: TicketBoard,
    alert: A,
}

impl<A: AlertSink> KitchenPoller<A> {
    pub fn new(
        base_url: impl Into<String>,
        restaurant_id: Uuid,
        interval: Duration,
        alert: A,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            restaurant_id,
            interval,
            board: TicketBoard::new(),
            alert,
        }
    }

    /// One tick: fetch, mask, diff, maybe chime. A failed fetch leaves the
    /// board exactly as it was.
    pub async fn poll_once(&mut self) -> Result<Vec<OrderView>, reqwest::Error> {
        let fetched: Vec<OrderView> = self
            .client
            .get(format!("{}/kitchen/orders", self.base_url))
            .query(&[("restaurant_id", self.restaurant_id.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let observation = self.board.observe(fetched);
        if observation.new_arrivals {
            self.alert.chime();
        }
        Ok(observation.tickets)
    }

    /// Mark a ticket ready and hide it locally as soon as the call
    /// succeeds, without waiting for the next poll to confirm.
    pub async fn mark_ready(&mut self, order_id: Uuid) -> Result<(), reqwest::Error> {
        self.client
            .post(format!(
                "{}/kitchen/orders/{order_id}/ready",
                self.base_url
            ))
            .query(&[("restaurant_id", self.restaurant_id.to_string())])
            .send()
            .await?
            .error_for_status()?;
        self.board.hide(order_id);
        Ok(())
    }

    pub fn board(&self) -> &TicketBoard {
        &self.board
    }

    /// Fixed-interval loop; the interval does not adapt to load.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                log::warn!("kitchen poll failed: {e}");
            }
        }
    }
}
