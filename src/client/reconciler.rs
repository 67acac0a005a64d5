//! Merges one snapshot fetch with the live change feed into a coherent
//! local order list, without duplicating, losing or misordering entries.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::order::{OrderStatus, OrderView};

pub struct ViewReconciler {
    filter: Option<OrderStatus>,
    orders: Vec<OrderView>,
}

impl ViewReconciler {
    pub fn new(filter: Option<OrderStatus>) -> Self {
        Self {
            filter,
            orders: Vec::new(),
        }
    }

    pub fn filter(&self) -> Option<OrderStatus> {
        self.filter
    }

    pub fn orders(&self) -> &[OrderView] {
        &self.orders
    }

    fn matches_filter(&self, status: OrderStatus) -> bool {
        self.filter.map_or(true, |wanted| wanted == status)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.orders.iter().position(|order| order.id == id)
    }

    /// Seed from the snapshot fetch. Rows the feed already delivered stay
    /// where they are: there is no ordering guarantee between the snapshot
    /// and the first pushed event, and the pushed copy is the newer one.
    pub fn seed(&mut self, snapshot: Vec<OrderView>) {
        for order in snapshot {
            if self.position(order.id).is_some() {
                continue;
            }
            if !self.matches_filter(order.status) {
                continue;
            }
            self.orders.push(order);
        }
    }

    /// A pushed insert, after the caller fetched the full projection.
    pub fn apply_insert(&mut self, order: OrderView) {
        if self.position(order.id).is_some() {
            // Snapshot/feed overlap; the row is already known.
            return;
        }
        if !self.matches_filter(order.status) {
            return;
        }
        self.orders.insert(0, order);
    }

    /// A pushed update carrying only the changed columns.
    ///
    /// Known rows are shallow-merged in place, keeping their position, and
    /// evicted when they fall out of the active filter. Unknown rows are
    /// left alone; fabricating an entry from a partial payload would hand
    /// the surface a row shaped unlike everything else, so the next full
    /// refresh reconciles instead.
    pub fn apply_update(&mut self, order_id: Uuid, columns: &Map<String, Value>) {
        let Some(at) = self.position(order_id) else {
            return;
        };
        merge_columns(&mut self.orders[at], columns);
        if !self.matches_filter(self.orders[at].status) {
            self.orders.remove(at);
        }
    }

    pub fn apply_delete(&mut self, order_id: Uuid) {
        if let Some(at) = self.position(order_id) {
            self.orders.remove(at);
        }
    }
}

/// Shallow-merge changed columns into a typed row by going through the
/// row's JSON form. The id and the item set are never part of a column
/// payload and are kept as-is; an undecodable merge leaves the row
/// untouched rather than corrupting it.
fn merge_columns(order: &mut OrderView, columns: &Map<String, Value>) {
    let mut value = match serde_json::to_value(&*order) {
        Ok(Value::Object(map)) => map,
        _ => return,
    };
    for (column, new_value) in columns {
        if column == "id" || column == "items" {
            continue;
        }
        value.insert(column.clone(), new_value.clone());
    }
    match serde_json::from_value::<OrderView>(Value::Object(value)) {
        Ok(merged) => *order = merged,
        Err(e) => log::warn!("discarding unmergeable update for order {}: {e}", order.id),
    }
}
