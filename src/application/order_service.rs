use std::str::FromStr;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    CreateOrderInput, OrderEventView, OrderStatus, OrderType, OrderView, PaymentStatus,
    ReplaceItemsInput, RiderPatch, TransitionPatch,
};
use crate::domain::ports::{
    ListFilter, NewOrderEvent, NewOrderRecord, OrderRepository, ReplaceItemsRecord,
    TransitionRecord,
};
use crate::feed::{ChangeFeed, ColumnSet};

/// Floor applied to automation-sourced delivery orders that arrive with a
/// zero or absent total. The upstream parser does not always price the
/// order; the real amount is settled on hand-over.
const MIN_TOTAL_SENTINEL: &str = "0.01";

/// Who is asking to edit an order's item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCaller {
    Admin,
    Waiter(Uuid),
    Rider,
}

/// Result of a transition; `became_ready` tells the HTTP layer to fire the
/// best-effort ready notification after the response-independent commit.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: OrderView,
    pub became_ready: bool,
}

pub struct OrderLifecycleService<R> {
    repo: R,
    feed: ChangeFeed,
}

impl<R: OrderRepository> OrderLifecycleService<R> {
    pub fn new(repo: R, feed: ChangeFeed) -> Self {
        Self { repo, feed }
    }

    // ── Create ───────────────────────────────────────────────────────────────

    pub fn create(&self, input: CreateOrderInput) -> Result<OrderView, DomainError> {
        validate_customer(&input.customer_name, &input.customer_phone)?;
        validate_items(&input.items)?;

        // Unspecified order type is automation input and behaves as delivery.
        let order_type = input.order_type.unwrap_or(OrderType::Delivery);
        let needs_idempotency_key = input.order_type.is_none() || order_type == OrderType::Delivery;
        let external_id = input.external_id.filter(|e| !e.trim().is_empty());
        if needs_idempotency_key && external_id.is_none() {
            return Err(DomainError::MissingIdempotencyKey);
        }

        let total_amount = resolve_total(input.total_amount, needs_idempotency_key)?;
        let restaurant_id = self.resolve_tenant(
            input.waiter_id,
            input.items.first().and_then(|i| i.product_id),
            input.restaurant_id,
        )?;

        let record = NewOrderRecord {
            id: Uuid::new_v4(),
            external_id,
            restaurant_id,
            customer_name: input.customer_name.trim().to_string(),
            customer_phone: input.customer_phone.trim().to_string(),
            customer_address: input.customer_address,
            status: OrderStatus::Pendiente,
            payment_status: PaymentStatus::Pendiente,
            order_type,
            table_number: input.table_number,
            waiter_id: input.waiter_id,
            total_amount,
            payment_method: input.payment_method,
            scheduled_delivery_time: input.scheduled_delivery_time,
        };
        let event = NewOrderEvent::new(
            "created",
            format!("Pedido {} creado para {}", order_type, record.customer_name),
        );

        let order = self.repo.create(record, input.items, event)?;
        self.feed.publish_insert(&order);
        log::info!(
            "order {} created for restaurant {} ({})",
            order.id,
            order.restaurant_id,
            order.order_type
        );
        Ok(order)
    }

    /// Tenant priority: the waiter's restaurant wins over the first item's
    /// product, which wins over an explicitly supplied restaurant. Unknown
    /// waiter/product ids fall through to the next rule rather than failing.
    fn resolve_tenant(
        &self,
        waiter_id: Option<Uuid>,
        first_product_id: Option<Uuid>,
        explicit: Option<Uuid>,
    ) -> Result<Uuid, DomainError> {
        if let Some(waiter) = waiter_id {
            if let Some(restaurant) = self.repo.waiter_restaurant(waiter)? {
                return Ok(restaurant);
            }
        }
        if let Some(product) = first_product_id {
            if let Some(restaurant) = self.repo.product_restaurant(product)? {
                return Ok(restaurant);
            }
        }
        if let Some(restaurant) = explicit {
            if self.repo.restaurant_is_active(restaurant)? {
                return Ok(restaurant);
            }
        }
        Err(DomainError::TenantUnresolved)
    }

    // ── Transition ───────────────────────────────────────────────────────────

    pub fn transition(
        &self,
        order_id: Uuid,
        patch: TransitionPatch,
    ) -> Result<TransitionOutcome, DomainError> {
        if patch.is_empty() {
            return Err(DomainError::Validation(
                "transition patch contains no fields".to_string(),
            ));
        }

        let current = self
            .repo
            .find_by_id(order_id)?
            .ok_or(DomainError::NotFound)?;
        if let Some(expected) = patch.expected_version {
            if expected != current.version {
                return Err(DomainError::VersionConflict);
            }
        }

        // Re-stating the current value of a field is a no-op, not an error.
        let status = patch.status.filter(|s| *s != current.status);
        if let Some(target) = status {
            if !current.status.can_transition_to(target) {
                return Err(DomainError::IllegalTransition {
                    from: current.status,
                    to: target,
                });
            }
        }

        // Delivered orders are always settled: entregado overrides whatever
        // payment status arrived in the same patch.
        let payment_status = if status == Some(OrderStatus::Entregado) {
            Some(PaymentStatus::Pagado).filter(|p| *p != current.payment_status)
        } else {
            patch.payment_status.filter(|p| *p != current.payment_status)
        };

        let rider = match patch.rider {
            RiderPatch::Keep => None,
            RiderPatch::Clear => current.assigned_rider_id.is_some().then_some(None),
            RiderPatch::Assign(id) => {
                (current.assigned_rider_id != Some(id)).then_some(Some(id))
            }
        };

        let mut events = Vec::new();
        if let Some(target) = status {
            events.push(NewOrderEvent::new(
                "status_changed",
                format!("Estado actualizado a {target}"),
            ));
        }
        if let Some(payment) = payment_status {
            events.push(NewOrderEvent::new(
                "payment_changed",
                format!("Pago actualizado a {payment}"),
            ));
        }
        match rider {
            Some(Some(id)) => events.push(NewOrderEvent::new(
                "rider_assigned",
                format!("Repartidor {id} asignado"),
            )),
            Some(None) => events.push(NewOrderEvent::new("rider_cleared", "Repartidor liberado")),
            None => {}
        }

        if events.is_empty() {
            // Nothing to apply; hand back the row as read.
            return Ok(TransitionOutcome {
                order: current,
                became_ready: false,
            });
        }

        let order = self.repo.apply_transition(
            order_id,
            TransitionRecord {
                status,
                payment_status,
                rider,
                guard_version: current.version,
                events,
            },
        )?;

        let mut columns = ColumnSet::default();
        if let Some(target) = status {
            columns = columns.set("status", target);
        }
        if let Some(payment) = payment_status {
            columns = columns.set("payment_status", payment);
        }
        if rider.is_some() {
            columns = columns.set("assigned_rider_id", order.assigned_rider_id);
        }
        columns = columns
            .set("version", order.version)
            .set("updated_at", order.updated_at);
        self.feed.publish_update(&order, columns.into_map());

        let became_ready = status == Some(OrderStatus::Finalizado);
        log::info!("order {} transitioned to {}", order.id, order.status);
        Ok(TransitionOutcome { order, became_ready })
    }

    /// Kitchen surface: the one legal unauthenticated transition. The ticket
    /// must belong to the given restaurant; anything else reads as missing.
    pub fn mark_ready(
        &self,
        order_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<TransitionOutcome, DomainError> {
        self.transition_scoped(
            restaurant_id,
            order_id,
            TransitionPatch {
                status: Some(OrderStatus::Finalizado),
                ..Default::default()
            },
        )
    }

    /// Authenticated surfaces only see their own tenant; an order outside it
    /// does not exist as far as the caller can tell.
    pub fn transition_scoped(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
        patch: TransitionPatch,
    ) -> Result<TransitionOutcome, DomainError> {
        self.assert_tenant(restaurant_id, order_id)?;
        self.transition(order_id, patch)
    }

    fn assert_tenant(&self, restaurant_id: Uuid, order_id: Uuid) -> Result<(), DomainError> {
        let order = self
            .repo
            .find_by_id(order_id)?
            .ok_or(DomainError::NotFound)?;
        if order.restaurant_id != restaurant_id {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    // ── Replace items ────────────────────────────────────────────────────────

    pub fn replace_items_scoped(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
        caller: EditCaller,
        input: ReplaceItemsInput,
    ) -> Result<OrderView, DomainError> {
        self.assert_tenant(restaurant_id, order_id)?;
        self.replace_items(order_id, caller, input)
    }

    pub fn replace_items(
        &self,
        order_id: Uuid,
        caller: EditCaller,
        input: ReplaceItemsInput,
    ) -> Result<OrderView, DomainError> {
        validate_customer(&input.customer_name, &input.customer_phone)?;
        validate_items(&input.items)?;

        let current = self
            .repo
            .find_by_id(order_id)?
            .ok_or(DomainError::NotFound)?;
        match caller {
            EditCaller::Admin => {}
            EditCaller::Waiter(waiter) if current.waiter_id == Some(waiter) => {}
            _ => return Err(DomainError::Forbidden),
        }
        if !current.status.allows_item_edits() {
            return Err(DomainError::OrderLocked);
        }

        let item_count = input.items.len();
        let order = self.repo.replace_items(
            order_id,
            ReplaceItemsRecord {
                customer_name: input.customer_name.trim().to_string(),
                customer_phone: input.customer_phone.trim().to_string(),
                customer_address: input.customer_address,
                items: input.items,
                guard_version: current.version,
                event: NewOrderEvent::new(
                    "items_replaced",
                    format!("Artículos reemplazados ({item_count} líneas)"),
                ),
            },
        )?;

        let columns = ColumnSet::default()
            .set("customer_name", &order.customer_name)
            .set("customer_phone", &order.customer_phone)
            .set("customer_address", &order.customer_address)
            .set("total_amount", &order.total_amount)
            .set("version", order.version)
            .set("updated_at", order.updated_at)
            .into_map();
        self.feed.publish_update(&order, columns);
        Ok(order)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn get_order(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        self.repo.find_by_id(id)
    }

    pub fn list_orders(&self, filter: &ListFilter) -> Result<Vec<OrderView>, DomainError> {
        self.repo.list(filter)
    }

    pub fn pending_tickets(&self, restaurant_id: Uuid) -> Result<Vec<OrderView>, DomainError> {
        self.repo.pending_tickets(restaurant_id)
    }

    pub fn order_events(&self, order_id: Uuid) -> Result<Vec<OrderEventView>, DomainError> {
        if self.repo.find_by_id(order_id)?.is_none() {
            return Err(DomainError::NotFound);
        }
        self.repo.events_for(order_id)
    }
}

// ── Validation helpers ───────────────────────────────────────────────────────

fn validate_customer(name: &str, phone: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation(
            "customer_name must not be empty".to_string(),
        ));
    }
    if phone.trim().is_empty() {
        return Err(DomainError::Validation(
            "customer_phone must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_items(items: &[crate::domain::order::OrderItemInput]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    for item in items {
        if item.product_name.trim().is_empty() {
            return Err(DomainError::Validation(
                "item product_name must not be empty".to_string(),
            ));
        }
        if item.quantity < 1 {
            return Err(DomainError::Validation(
                "item quantity must be at least 1".to_string(),
            ));
        }
        if item.unit_price < BigDecimal::from(0) {
            return Err(DomainError::Validation(
                "item unit_price must not be negative".to_string(),
            ));
        }
    }
    Ok(())
}

fn resolve_total(
    total: Option<BigDecimal>,
    automation_input: bool,
) -> Result<BigDecimal, DomainError> {
    let zero = BigDecimal::from(0);
    match total {
        Some(t) if t > zero => Ok(t),
        Some(t) if t < zero => Err(DomainError::Validation(
            "total_amount must not be negative".to_string(),
        )),
        // Zero or absent: tolerated for automation-sourced delivery orders.
        _ if automation_input => Ok(BigDecimal::from_str(MIN_TOTAL_SENTINEL)
            .expect("sentinel total is a valid decimal")),
        _ => Err(DomainError::Validation(
            "total_amount must be greater than zero".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderItemInput;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory repository mirroring the store contracts the service
    /// relies on: external_id uniqueness and version-guarded updates.
    #[derive(Default)]
    struct MemoryRepo {
        orders: Mutex<HashMap<Uuid, OrderView>>,
        events: Mutex<Vec<(Uuid, NewOrderEvent)>>,
        waiters: HashMap<Uuid, Uuid>,
        products: HashMap<Uuid, Uuid>,
        restaurants: HashMap<Uuid, bool>,
    }

    impl OrderRepository for MemoryRepo {
        fn create(
            &self,
            order: NewOrderRecord,
            items: Vec<OrderItemInput>,
            event: NewOrderEvent,
        ) -> Result<OrderView, DomainError> {
            let mut orders = self.orders.lock().unwrap();
            if let Some(external) = &order.external_id {
                if orders
                    .values()
                    .any(|o| o.external_id.as_deref() == Some(external))
                {
                    return Err(DomainError::DuplicateOrder);
                }
            }
            let now = chrono::Utc::now();
            let view = OrderView {
                id: order.id,
                external_id: order.external_id,
                restaurant_id: order.restaurant_id,
                customer_name: order.customer_name,
                customer_phone: order.customer_phone,
                customer_address: order.customer_address,
                status: order.status,
                payment_status: order.payment_status,
                order_type: order.order_type,
                table_number: order.table_number,
                waiter_id: order.waiter_id,
                assigned_rider_id: None,
                total_amount: order.total_amount,
                payment_method: order.payment_method,
                scheduled_delivery_time: order.scheduled_delivery_time,
                version: 0,
                created_at: now,
                updated_at: now,
                items: items
                    .into_iter()
                    .map(|i| crate::domain::order::OrderItemView {
                        id: Uuid::new_v4(),
                        product_id: i.product_id,
                        product_name: i.product_name,
                        quantity: i.quantity,
                        unit_price: i.unit_price,
                    })
                    .collect(),
            };
            self.events.lock().unwrap().push((view.id, event));
            orders.insert(view.id, view.clone());
            Ok(view)
        }

        fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
            Ok(self.orders.lock().unwrap().get(&id).cloned())
        }

        fn list(&self, filter: &ListFilter) -> Result<Vec<OrderView>, DomainError> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .values()
                .filter(|o| o.restaurant_id == filter.restaurant_id)
                .cloned()
                .collect())
        }

        fn pending_tickets(&self, restaurant_id: Uuid) -> Result<Vec<OrderView>, DomainError> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .values()
                .filter(|o| {
                    o.restaurant_id == restaurant_id
                        && o.status == OrderStatus::Pendiente
                        && o.order_type.is_kitchen_ticket()
                })
                .cloned()
                .collect())
        }

        fn apply_transition(
            &self,
            id: Uuid,
            record: TransitionRecord,
        ) -> Result<OrderView, DomainError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders.get_mut(&id).ok_or(DomainError::NotFound)?;
            if order.version != record.guard_version {
                return Err(DomainError::VersionConflict);
            }
            if let Some(status) = record.status {
                order.status = status;
            }
            if let Some(payment) = record.payment_status {
                order.payment_status = payment;
            }
            if let Some(rider) = record.rider {
                order.assigned_rider_id = rider;
            }
            order.version += 1;
            order.updated_at = chrono::Utc::now();
            let mut events = self.events.lock().unwrap();
            events.extend(record.events.into_iter().map(|e| (id, e)));
            Ok(order.clone())
        }

        fn replace_items(
            &self,
            id: Uuid,
            record: ReplaceItemsRecord,
        ) -> Result<OrderView, DomainError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders.get_mut(&id).ok_or(DomainError::NotFound)?;
            if order.version != record.guard_version {
                return Err(DomainError::VersionConflict);
            }
            order.customer_name = record.customer_name;
            order.customer_phone = record.customer_phone;
            order.customer_address = record.customer_address;
            order.items = record
                .items
                .into_iter()
                .map(|i| crate::domain::order::OrderItemView {
                    id: Uuid::new_v4(),
                    product_id: i.product_id,
                    product_name: i.product_name,
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect();
            order.version += 1;
            self.events.lock().unwrap().push((id, record.event));
            Ok(order.clone())
        }

        fn events_for(&self, order_id: Uuid) -> Result<Vec<OrderEventView>, DomainError> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| *id == order_id)
                .map(|(id, e)| OrderEventView {
                    id: Uuid::new_v4(),
                    order_id: *id,
                    event_type: e.event_type.clone(),
                    description: e.description.clone(),
                    created_at: chrono::Utc::now(),
                })
                .collect())
        }

        fn waiter_restaurant(&self, waiter_id: Uuid) -> Result<Option<Uuid>, DomainError> {
            Ok(self.waiters.get(&waiter_id).copied())
        }

        fn product_restaurant(&self, product_id: Uuid) -> Result<Option<Uuid>, DomainError> {
            Ok(self.products.get(&product_id).copied())
        }

        fn restaurant_is_active(&self, restaurant_id: Uuid) -> Result<bool, DomainError> {
            Ok(*self.restaurants.get(&restaurant_id).unwrap_or(&false))
        }
    }

    fn burger(quantity: i32) -> OrderItemInput {
        OrderItemInput {
            product_id: None,
            product_name: "burger".to_string(),
            quantity,
            unit_price: BigDecimal::from(10),
        }
    }

    fn delivery_input(external_id: &str) -> CreateOrderInput {
        CreateOrderInput {
            external_id: Some(external_id.to_string()),
            customer_name: "Ana".to_string(),
            customer_phone: "555".to_string(),
            items: vec![burger(2)],
            total_amount: Some(BigDecimal::from(20)),
            ..Default::default()
        }
    }

    fn service_with(repo: MemoryRepo) -> OrderLifecycleService<MemoryRepo> {
        OrderLifecycleService::new(repo, ChangeFeed::new())
    }

    fn active_restaurant(repo: &mut MemoryRepo) -> Uuid {
        let id = Uuid::new_v4();
        repo.restaurants.insert(id, true);
        id
    }

    #[test]
    fn create_stores_items_and_defaults_to_pending() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);

        let mut input = delivery_input("555_1700000000");
        input.restaurant_id = Some(restaurant);
        let order = service.create(input).unwrap();

        assert_eq!(order.status, OrderStatus::Pendiente);
        assert_eq!(order.payment_status, PaymentStatus::Pendiente);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.total_amount, BigDecimal::from(20));
        assert_eq!(order.restaurant_id, restaurant);
    }

    #[test]
    fn create_publishes_insert_on_the_feed() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        let service = OrderLifecycleService::new(repo, feed);

        let mut input = delivery_input("555_1");
        input.restaurant_id = Some(restaurant);
        let order = service.create(input).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, crate::feed::ChangeKind::Insert);
        assert_eq!(event.order_id, order.id);
        assert_eq!(event.restaurant_id, restaurant);
    }

    #[test]
    fn duplicate_external_id_is_rejected() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);

        let mut input = delivery_input("555_1700000000");
        input.restaurant_id = Some(restaurant);
        service.create(input.clone()).unwrap();

        let err = service.create(input).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateOrder));
    }

    #[test]
    fn waiter_tenant_wins_over_product_tenant() {
        let mut repo = MemoryRepo::default();
        let tenant_one = Uuid::new_v4();
        let tenant_two = Uuid::new_v4();
        let waiter = Uuid::new_v4();
        let product = Uuid::new_v4();
        repo.waiters.insert(waiter, tenant_one);
        repo.products.insert(product, tenant_two);
        let service = service_with(repo);

        let mut input = delivery_input("555_2");
        input.waiter_id = Some(waiter);
        input.items[0].product_id = Some(product);
        let order = service.create(input).unwrap();

        assert_eq!(order.restaurant_id, tenant_one);
    }

    #[test]
    fn unknown_waiter_falls_through_to_product_tenant() {
        let mut repo = MemoryRepo::default();
        let tenant = Uuid::new_v4();
        let product = Uuid::new_v4();
        repo.products.insert(product, tenant);
        let service = service_with(repo);

        let mut input = delivery_input("555_3");
        input.waiter_id = Some(Uuid::new_v4());
        input.items[0].product_id = Some(product);
        let order = service.create(input).unwrap();

        assert_eq!(order.restaurant_id, tenant);
    }

    #[test]
    fn inactive_restaurant_leaves_tenant_unresolved() {
        let mut repo = MemoryRepo::default();
        let restaurant = Uuid::new_v4();
        repo.restaurants.insert(restaurant, false);
        let service = service_with(repo);

        let mut input = delivery_input("555_4");
        input.restaurant_id = Some(restaurant);
        let err = service.create(input).unwrap_err();

        assert!(matches!(err, DomainError::TenantUnresolved));
    }

    #[test]
    fn delivery_without_external_id_is_rejected() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);

        let mut input = delivery_input("ignored");
        input.external_id = None;
        input.restaurant_id = Some(restaurant);
        let err = service.create(input).unwrap_err();

        assert!(matches!(err, DomainError::MissingIdempotencyKey));
    }

    #[test]
    fn dine_in_does_not_require_external_id() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);

        let mut input = delivery_input("ignored");
        input.external_id = None;
        input.order_type = Some(OrderType::DineIn);
        input.table_number = Some("12".to_string());
        input.restaurant_id = Some(restaurant);

        assert!(service.create(input).is_ok());
    }

    #[test]
    fn zero_total_defaults_to_sentinel_for_delivery_only() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);

        let mut input = delivery_input("555_5");
        input.total_amount = Some(BigDecimal::from(0));
        input.restaurant_id = Some(restaurant);
        let order = service.create(input).unwrap();
        assert_eq!(
            order.total_amount,
            BigDecimal::from_str(MIN_TOTAL_SENTINEL).unwrap()
        );

        let mut input = delivery_input("ignored");
        input.external_id = None;
        input.order_type = Some(OrderType::DineIn);
        input.total_amount = None;
        input.restaurant_id = Some(restaurant);
        let err = service.create(input).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_items_are_rejected() {
        let service = service_with(MemoryRepo::default());
        let mut input = delivery_input("555_6");
        input.items.clear();
        assert!(matches!(
            service.create(input).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    fn created_order(service: &OrderLifecycleService<MemoryRepo>, restaurant: Uuid) -> OrderView {
        let mut input = delivery_input(&format!("555_{}", Uuid::new_v4()));
        input.restaurant_id = Some(restaurant);
        service.create(input).unwrap()
    }

    #[test]
    fn delivered_forces_paid_overriding_patch() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);
        let order = created_order(&service, restaurant);

        service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::EnProceso),
                    ..Default::default()
                },
            )
            .unwrap();
        service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::Finalizado),
                    ..Default::default()
                },
            )
            .unwrap();
        let outcome = service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::Entregado),
                    payment_status: Some(PaymentStatus::Pendiente),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(outcome.order.payment_status, PaymentStatus::Pagado);
        let events = service.order_events(order.id).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == "status_changed" && e.description.contains("entregado")));
        assert!(events.iter().any(|e| e.event_type == "payment_changed"));
    }

    #[test]
    fn illegal_edge_is_rejected_with_typed_error() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);
        let order = created_order(&service, restaurant);

        let err = service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::Entregado),
                    ..Default::default()
                },
            )
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::IllegalTransition {
                from: OrderStatus::Pendiente,
                to: OrderStatus::Entregado
            }
        ));
    }

    #[test]
    fn rider_empty_clears_and_omission_keeps() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);
        let order = created_order(&service, restaurant);
        let rider = Uuid::new_v4();

        let outcome = service
            .transition(
                order.id,
                TransitionPatch {
                    rider: RiderPatch::Assign(rider),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(outcome.order.assigned_rider_id, Some(rider));

        // Omitted rider field leaves the assignment alone.
        let outcome = service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::EnProceso),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(outcome.order.assigned_rider_id, Some(rider));

        let outcome = service
            .transition(
                order.id,
                TransitionPatch {
                    rider: RiderPatch::Clear,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(outcome.order.assigned_rider_id, None);
    }

    #[test]
    fn stale_expected_version_conflicts() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);
        let order = created_order(&service, restaurant);

        service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::EnProceso),
                    ..Default::default()
                },
            )
            .unwrap();

        let err = service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::Cancelado),
                    expected_version: Some(order.version),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict));
    }

    #[test]
    fn ready_transition_reports_became_ready() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);
        let order = created_order(&service, restaurant);

        let outcome = service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::EnProceso),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!outcome.became_ready);

        let outcome = service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::Finalizado),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(outcome.became_ready);
    }

    #[test]
    fn transition_publishes_only_changed_columns() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let feed = ChangeFeed::new();
        let service = OrderLifecycleService::new(repo, feed.clone());
        let order = created_order(&service, restaurant);

        let mut rx = feed.subscribe();
        service
            .transition(
                order.id,
                TransitionPatch {
                    status: Some(OrderStatus::EnProceso),
                    ..Default::default()
                },
            )
            .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, crate::feed::ChangeKind::Update);
        assert_eq!(event.columns["status"], "en_proceso");
        assert!(!event.columns.contains_key("payment_status"));
        assert!(event.columns.contains_key("version"));
    }

    #[test]
    fn mark_ready_checks_tenant_before_transitioning() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);
        let order = created_order(&service, restaurant);

        let err = service.mark_ready(order.id, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound));

        let outcome = service.mark_ready(order.id, restaurant).unwrap();
        assert_eq!(outcome.order.status, OrderStatus::Finalizado);
        assert!(outcome.became_ready);
    }

    // ── Replace items ────────────────────────────────────────────────────────

    #[test]
    fn waiter_can_only_edit_their_own_open_orders() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let waiter = Uuid::new_v4();
        repo.waiters.insert(waiter, restaurant);
        let service = service_with(repo);

        let mut input = delivery_input("555_7");
        input.order_type = Some(OrderType::DineIn);
        input.external_id = None;
        input.waiter_id = Some(waiter);
        let order = service.create(input).unwrap();

        let replacement = ReplaceItemsInput {
            customer_name: "Ana".to_string(),
            customer_phone: "555".to_string(),
            customer_address: None,
            items: vec![burger(3)],
        };

        let err = service
            .replace_items(order.id, EditCaller::Waiter(Uuid::new_v4()), replacement.clone())
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        let err = service
            .replace_items(order.id, EditCaller::Rider, replacement.clone())
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        let updated = service
            .replace_items(order.id, EditCaller::Waiter(waiter), replacement)
            .unwrap();
        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].quantity, 3);
    }

    #[test]
    fn items_lock_once_order_is_ready() {
        let mut repo = MemoryRepo::default();
        let restaurant = active_restaurant(&mut repo);
        let service = service_with(repo);
        let order = created_order(&service, restaurant);

        service.mark_ready(order.id, restaurant).unwrap();

        let err = service
            .replace_items(
                order.id,
                EditCaller::Admin,
                ReplaceItemsInput {
                    customer_name: "Ana".to_string(),
                    customer_phone: "555".to_string(),
                    customer_address: None,
                    items: vec![burger(1)],
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::OrderLocked));
    }
}
