use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::pricing::OrderTotals;
use crate::domain::warranty::{WarrantyStatus, WarrantyWindow};
use crate::event_sourcing::Aggregate;
use super::value_objects::{
    Address, OrderItem, OrderNumber, OrderStatus, PaymentIntentRecord, PaymentMethod, PaymentStatus,
};
use super::events::*;
use super::commands::OrderCommand;
use super::errors::OrderError;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,
    pub order_number: OrderNumber,

    // Current State (derived from events)
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_transaction_id: Option<String>,
    pub active_intent: Option<PaymentIntentRecord>,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub notes: Option<String>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,

    // Optional fields
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub cancelled_reason: Option<String>,
    pub failure_reason: Option<String>,
}

impl OrderAggregate {
    /// Validate a creation request before it becomes the first event
    fn validate_creation(
        items: &[OrderItem],
        totals: &OrderTotals,
        currency: &str,
        shipping_address: &Address,
        billing_address: &Address,
    ) -> Result<(), OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        for (line, item) in items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity(line));
            }
            if item.total_price != item.unit_price * Decimal::from(item.quantity) {
                return Err(OrderError::LineTotalMismatch(line));
            }
        }

        let line_sum: Decimal = items.iter().map(|item| item.total_price).sum();
        if !totals.is_consistent() || totals.subtotal != line_sum || currency.trim().is_empty() {
            return Err(OrderError::TotalsInconsistent);
        }

        if let Some(field) = shipping_address.missing_field() {
            return Err(OrderError::InvalidAddress { address: "Shipping", field });
        }
        if let Some(field) = billing_address.missing_field() {
            return Err(OrderError::InvalidAddress { address: "Billing", field });
        }

        Ok(())
    }

    /// Events for a brand new order stream
    pub fn create(command: &OrderCommand) -> Result<Vec<OrderEvent>, OrderError> {
        let OrderCommand::CreateOrder {
            order_number,
            customer_id,
            payment_method,
            items,
            totals,
            currency,
            coupon_code,
            shipping_address,
            billing_address,
            notes,
        } = command
        else {
            return Err(OrderError::NotInitialized);
        };

        Self::validate_creation(items, totals, currency, shipping_address, billing_address)?;

        Ok(vec![OrderEvent::Created(OrderCreated {
            order_number: order_number.clone(),
            customer_id: *customer_id,
            payment_method: *payment_method,
            items: items.clone(),
            totals: *totals,
            currency: currency.clone(),
            coupon_code: coupon_code.clone(),
            shipping_address: shipping_address.clone(),
            billing_address: billing_address.clone(),
            notes: notes.clone(),
        })])
    }

    /// Why the order cannot take an online payment right now, if it can't
    pub fn payability_problem(&self) -> Option<String> {
        if !self.payment_method.is_online() {
            return Some(format!("payment method is {}", self.payment_method));
        }
        if matches!(self.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded) {
            return Some(format!("payment is already {}", self.payment_status));
        }
        if !self.status.accepts_payment() {
            return Some(format!("order is {}", self.status));
        }
        None
    }

    pub fn is_paid_by(&self, gateway_intent_id: &str) -> bool {
        matches!(self.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded)
            && self.payment_transaction_id.as_deref() == Some(gateway_intent_id)
    }

    fn ensure_active_intent(&self, gateway_intent_id: &str) -> Result<&PaymentIntentRecord, OrderError> {
        self.active_intent
            .as_ref()
            .filter(|intent| intent.gateway_intent_id == gateway_intent_id)
            .ok_or_else(|| OrderError::StaleIntent(gateway_intent_id.to_string()))
    }

    /// Coverage windows for every line that carries a package but no warranty yet
    fn pending_warranties(&self, at: DateTime<Utc>) -> Result<Vec<LineWarranty>, OrderError> {
        let mut lines = Vec::new();

        for (line, item) in self.items.iter().enumerate() {
            let Some(package) = &item.warranty_package else {
                continue;
            };
            if item.warranty_status.is_some() {
                continue;
            }

            let window = WarrantyWindow::starting_at(at, package.duration_months)?;
            lines.push(LineWarranty {
                line,
                starts_at: window.starts_at,
                ends_at: window.ends_at,
            });
        }

        Ok(lines)
    }

    fn transition(
        &self,
        target: OrderStatus,
        reason: &Option<String>,
        changed_by: Option<Uuid>,
        tracking_number: &Option<String>,
        carrier: &Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if target == OrderStatus::Cancelled {
            return self.cancel(reason, changed_by, at);
        }

        if self.status.is_terminal() {
            return Err(OrderError::Terminal(self.status));
        }

        if target == OrderStatus::Failed {
            if self.status != OrderStatus::Pending {
                return Err(OrderError::InvalidTransition { from: self.status, to: target });
            }
            return Ok(vec![OrderEvent::Failed(OrderFailed {
                reason: reason.clone(),
                failed_at: at,
            })]);
        }

        if self.status.next() != Some(target) {
            return Err(OrderError::InvalidTransition { from: self.status, to: target });
        }

        let event = match target {
            OrderStatus::Confirmed => OrderEvent::Confirmed(OrderConfirmed { confirmed_at: at }),
            OrderStatus::Processing => OrderEvent::ProcessingStarted(OrderProcessingStarted { started_at: at }),
            OrderStatus::Shipping => OrderEvent::Shipped(OrderShipped {
                tracking_number: tracking_number.clone(),
                carrier: carrier.clone(),
                shipped_at: at,
            }),
            OrderStatus::Completed => {
                let mut events = vec![OrderEvent::Completed(OrderCompleted { completed_at: at })];
                let lines = self.pending_warranties(at)?;
                if !lines.is_empty() {
                    events.push(OrderEvent::WarrantyActivated(WarrantyActivated { lines }));
                }
                return Ok(events);
            }
            _ => return Err(OrderError::InvalidTransition { from: self.status, to: target }),
        };

        Ok(vec![event])
    }

    fn cancel(
        &self,
        reason: &Option<String>,
        cancelled_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::CannotCancel(self.status));
        }

        Ok(vec![OrderEvent::Cancelled(OrderCancelled {
            reason: reason.clone(),
            cancelled_by,
            cancelled_at: at,
        })])
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_first_event(
        aggregate_id: Uuid,
        event: &Self::Event,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Created(e) => Ok(Self {
                id: aggregate_id,
                version: 1,
                order_number: e.order_number.clone(),
                customer_id: e.customer_id,
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
                payment_method: e.payment_method,
                payment_transaction_id: None,
                active_intent: None,
                items: e.items.clone(),
                totals: e.totals,
                currency: e.currency.clone(),
                coupon_code: e.coupon_code.clone(),
                shipping_address: e.shipping_address.clone(),
                billing_address: e.billing_address.clone(),
                notes: e.notes.clone(),
                created_at: recorded_at,
                updated_at: recorded_at,
                paid_at: None,
                tracking_number: None,
                carrier: None,
                cancelled_reason: None,
                failure_reason: None,
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event, recorded_at: DateTime<Utc>) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Created(_) => return Err(OrderError::AlreadyCreated),
            OrderEvent::PaymentIntentIssued(e) => {
                self.active_intent = Some(e.intent.clone());
                self.payment_status = PaymentStatus::Pending;
            }
            OrderEvent::PaymentSucceeded(e) => {
                self.payment_status = PaymentStatus::Paid;
                self.payment_transaction_id = Some(e.transaction_id.clone());
                self.paid_at = Some(e.paid_at);
            }
            OrderEvent::PaymentFailed(e) => {
                self.payment_status = PaymentStatus::Failed;
                self.failure_reason = e.reason.clone();
            }
            OrderEvent::PaymentRefunded(_) => {
                self.payment_status = PaymentStatus::Refunded;
            }
            OrderEvent::Confirmed(_) => {
                self.status = OrderStatus::Confirmed;
            }
            OrderEvent::ProcessingStarted(_) => {
                self.status = OrderStatus::Processing;
            }
            OrderEvent::Shipped(e) => {
                self.status = OrderStatus::Shipping;
                self.tracking_number = e.tracking_number.clone();
                self.carrier = e.carrier.clone();
            }
            OrderEvent::Completed(_) => {
                self.status = OrderStatus::Completed;
            }
            OrderEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.cancelled_reason = e.reason.clone();
            }
            OrderEvent::Failed(e) => {
                self.status = OrderStatus::Failed;
                self.failure_reason = e.reason.clone();
            }
            OrderEvent::WarrantyActivated(e) => {
                for activation in &e.lines {
                    if let Some(item) = self.items.get_mut(activation.line) {
                        item.warranty_start_at = Some(activation.starts_at);
                        item.warranty_end_at = Some(activation.ends_at);
                        item.warranty_status = Some(WarrantyStatus::Active);
                    }
                }
            }
        }

        self.version += 1;
        self.updated_at = recorded_at;
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder { .. } => Err(OrderError::AlreadyCreated),

            OrderCommand::IssuePaymentIntent { intent } => {
                if let Some(problem) = self.payability_problem() {
                    return Err(OrderError::NotPayable(problem));
                }
                // A concurrent request already recorded this very intent
                let already_active = self
                    .active_intent
                    .as_ref()
                    .is_some_and(|active| active.gateway_intent_id == intent.gateway_intent_id);
                if already_active && self.payment_status == PaymentStatus::Pending {
                    return Ok(vec![]);
                }
                if intent.amount != self.totals.total_amount || intent.currency != self.currency {
                    return Err(OrderError::IntentAmountMismatch {
                        intent: intent.amount,
                        order: self.totals.total_amount,
                    });
                }

                Ok(vec![OrderEvent::PaymentIntentIssued(PaymentIntentIssued {
                    intent: intent.clone(),
                    superseded_intent_id: self
                        .active_intent
                        .as_ref()
                        .map(|active| active.gateway_intent_id.clone()),
                })])
            }

            OrderCommand::RecordPaymentSuccess { gateway_intent_id, transaction_id, amount, currency, at } => {
                // Replayed confirmation of the payment already on record
                if self.is_paid_by(gateway_intent_id) {
                    return Ok(vec![]);
                }

                let active = self.ensure_active_intent(gateway_intent_id)?;
                if self.payment_status == PaymentStatus::Paid
                    || *amount != active.amount
                    || *currency != active.currency
                    || active.amount != self.totals.total_amount
                {
                    return Err(OrderError::StaleIntent(gateway_intent_id.clone()));
                }

                let mut events = vec![OrderEvent::PaymentSucceeded(PaymentSucceeded {
                    gateway_intent_id: gateway_intent_id.clone(),
                    transaction_id: transaction_id.clone(),
                    amount: *amount,
                    paid_at: *at,
                })];
                if self.status == OrderStatus::Pending {
                    events.push(OrderEvent::Confirmed(OrderConfirmed { confirmed_at: *at }));
                }

                Ok(events)
            }

            OrderCommand::RecordPaymentFailure { gateway_intent_id, reason, at } => {
                if self.is_paid_by(gateway_intent_id) {
                    return Ok(vec![]);
                }

                self.ensure_active_intent(gateway_intent_id)?;
                if self.payment_status == PaymentStatus::Failed {
                    return Ok(vec![]);
                }

                Ok(vec![OrderEvent::PaymentFailed(PaymentFailed {
                    gateway_intent_id: gateway_intent_id.clone(),
                    reason: reason.clone(),
                    failed_at: *at,
                })])
            }

            OrderCommand::RefundPayment { reason, refunded_by, at } => {
                if self.payment_status != PaymentStatus::Paid {
                    return Err(OrderError::NotRefundable(self.payment_status));
                }

                Ok(vec![OrderEvent::PaymentRefunded(PaymentRefunded {
                    reason: reason.clone(),
                    refunded_by: *refunded_by,
                    refunded_at: *at,
                })])
            }

            OrderCommand::ChangeStatus { target, changed_by, reason, tracking_number, carrier, at } => {
                self.transition(*target, reason, *changed_by, tracking_number, carrier, *at)
            }

            OrderCommand::CancelOrder { reason, cancelled_by, at } => self.cancel(reason, *cancelled_by, *at),

            OrderCommand::ActivateWarranty { at } => {
                if self.status != OrderStatus::Completed {
                    return Err(OrderError::WarrantyRequiresCompletion(self.status));
                }

                let lines = self.pending_warranties(*at)?;
                if lines.is_empty() {
                    return Ok(vec![]);
                }

                Ok(vec![OrderEvent::WarrantyActivated(WarrantyActivated { lines })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::warranty::WarrantyPackage;
    use chrono::TimeZone;

    pub(crate) fn address() -> Address {
        Address {
            full_name: "Tran Thi B".to_string(),
            phone: "0912345678".to_string(),
            line1: "12 Nguyen Hue".to_string(),
            line2: None,
            ward: Some("Ben Nghe".to_string()),
            district: Some("District 1".to_string()),
            city: "Ho Chi Minh City".to_string(),
            country: "VN".to_string(),
            postal_code: None,
        }
    }

    pub(crate) fn item(unit_price: i64, quantity: u32, warranty_months: Option<u32>) -> OrderItem {
        let unit_price = Decimal::from(unit_price);
        OrderItem {
            product_id: Uuid::new_v4(),
            variant_id: None,
            name: "Phone".to_string(),
            sku: Some("PH-1".to_string()),
            unit_price,
            quantity,
            total_price: unit_price * Decimal::from(quantity),
            attribute_selection: Default::default(),
            warranty_package: warranty_months.map(|months| WarrantyPackage {
                id: Uuid::new_v4(),
                name: format!("{months}-month care"),
                duration_months: months,
            }),
            warranty_start_at: None,
            warranty_end_at: None,
            warranty_status: None,
            imei: None,
        }
    }

    pub(crate) fn create_command(method: PaymentMethod, items: Vec<OrderItem>) -> OrderCommand {
        let subtotal: Decimal = items.iter().map(|i| i.total_price).sum();
        OrderCommand::CreateOrder {
            order_number: OrderNumber("ORD-20240101-ABCDEF0123".to_string()),
            customer_id: Uuid::new_v4(),
            payment_method: method,
            items,
            totals: OrderTotals::new(subtotal, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            currency: "VND".to_string(),
            coupon_code: None,
            shipping_address: address(),
            billing_address: address(),
            notes: None,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn new_order(method: PaymentMethod, items: Vec<OrderItem>) -> OrderAggregate {
        let events = OrderAggregate::create(&create_command(method, items)).unwrap();
        OrderAggregate::apply_first_event(Uuid::new_v4(), &events[0], at()).unwrap()
    }

    fn run(order: &mut OrderAggregate, command: OrderCommand) -> Result<Vec<OrderEvent>, OrderError> {
        let events = order.handle_command(&command)?;
        for event in &events {
            order.apply_event(event, at()).unwrap();
        }
        Ok(events)
    }

    fn status(target: OrderStatus) -> OrderCommand {
        OrderCommand::ChangeStatus {
            target,
            changed_by: None,
            reason: None,
            tracking_number: None,
            carrier: None,
            at: at(),
        }
    }

    fn intent(id: &str, amount: Decimal) -> PaymentIntentRecord {
        PaymentIntentRecord {
            gateway_intent_id: id.to_string(),
            client_secret: format!("{id}_secret"),
            amount,
            currency: "VND".to_string(),
            issued_at: at(),
        }
    }

    fn success(id: &str, amount: Decimal) -> OrderCommand {
        OrderCommand::RecordPaymentSuccess {
            gateway_intent_id: id.to_string(),
            transaction_id: id.to_string(),
            amount,
            currency: "VND".to_string(),
            at: at(),
        }
    }

    #[test]
    fn test_create_order_starts_pending() {
        let order = new_order(PaymentMethod::Cod, vec![item(1_000, 2, None)]);

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.version, 1);
        assert_eq!(order.totals.total_amount, Decimal::from(2_000));
    }

    #[test]
    fn test_create_order_rejects_invalid_input() {
        assert_eq!(
            OrderAggregate::create(&create_command(PaymentMethod::Cod, vec![])).unwrap_err(),
            OrderError::EmptyItems
        );

        let mut bad_line = item(1_000, 2, None);
        bad_line.total_price = Decimal::from(1_500);
        assert_eq!(
            OrderAggregate::create(&create_command(PaymentMethod::Cod, vec![bad_line])).unwrap_err(),
            OrderError::LineTotalMismatch(0)
        );

        let mut command = create_command(PaymentMethod::Cod, vec![item(1_000, 1, None)]);
        if let OrderCommand::CreateOrder { shipping_address, .. } = &mut command {
            shipping_address.city.clear();
        }
        assert_eq!(
            OrderAggregate::create(&command).unwrap_err(),
            OrderError::InvalidAddress { address: "Shipping", field: "city" }
        );
    }

    #[test]
    fn test_forward_transitions_one_step_at_a_time() {
        let mut order = new_order(PaymentMethod::Cod, vec![item(1_000, 1, None)]);

        assert_eq!(
            run(&mut order, status(OrderStatus::Shipping)).unwrap_err(),
            OrderError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Shipping }
        );

        run(&mut order, status(OrderStatus::Confirmed)).unwrap();
        run(&mut order, status(OrderStatus::Processing)).unwrap();
        assert_eq!(
            run(&mut order, status(OrderStatus::Confirmed)).unwrap_err(),
            OrderError::InvalidTransition { from: OrderStatus::Processing, to: OrderStatus::Confirmed }
        );
        assert_eq!(order.version, 3);
    }

    #[test]
    fn test_cancel_only_before_processing() {
        let mut order = new_order(PaymentMethod::Cod, vec![item(1_000, 1, None)]);
        run(&mut order, status(OrderStatus::Confirmed)).unwrap();
        run(&mut order, status(OrderStatus::Processing)).unwrap();

        let cancel = OrderCommand::CancelOrder { reason: None, cancelled_by: None, at: at() };
        assert_eq!(
            run(&mut order, cancel).unwrap_err(),
            OrderError::CannotCancel(OrderStatus::Processing)
        );
        assert_eq!(order.status, OrderStatus::Processing);

        let mut fresh = new_order(PaymentMethod::Cod, vec![item(1_000, 1, None)]);
        run(&mut fresh, status(OrderStatus::Cancelled)).unwrap();
        assert_eq!(fresh.status, OrderStatus::Cancelled);
        assert_eq!(
            run(&mut fresh, status(OrderStatus::Confirmed)).unwrap_err(),
            OrderError::Terminal(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn test_cancel_rejected_after_confirmation_stage() {
        use OrderStatus as S;
        let paths: [(OrderStatus, &[OrderStatus]); 5] = [
            (S::Processing, &[S::Confirmed, S::Processing]),
            (S::Shipping, &[S::Confirmed, S::Processing, S::Shipping]),
            (S::Completed, &[S::Confirmed, S::Processing, S::Shipping, S::Completed]),
            (S::Cancelled, &[S::Cancelled]),
            (S::Failed, &[S::Failed]),
        ];

        for (blocking, path) in paths {
            let mut order = new_order(PaymentMethod::Cod, vec![item(1_000, 1, None)]);
            for target in path {
                run(&mut order, status(*target)).unwrap();
            }
            let version = order.version;

            let cancel = OrderCommand::CancelOrder { reason: None, cancelled_by: None, at: at() };
            assert_eq!(run(&mut order, cancel).unwrap_err(), OrderError::CannotCancel(blocking));
            assert_eq!(order.status, blocking);
            assert_eq!(order.version, version);
        }
    }

    #[test]
    fn test_failed_only_from_pending() {
        let mut order = new_order(PaymentMethod::Stripe, vec![item(1_000, 1, None)]);
        run(&mut order, status(OrderStatus::Confirmed)).unwrap();
        assert!(run(&mut order, status(OrderStatus::Failed)).is_err());

        let mut pending = new_order(PaymentMethod::Stripe, vec![item(1_000, 1, None)]);
        run(&mut pending, status(OrderStatus::Failed)).unwrap();
        assert_eq!(pending.status, OrderStatus::Failed);
    }

    #[test]
    fn test_completion_activates_warranty() {
        let mut order = new_order(
            PaymentMethod::Cod,
            vec![item(5_000, 1, Some(12)), item(100, 3, None)],
        );
        for target in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipping] {
            run(&mut order, status(target)).unwrap();
        }

        let events = run(&mut order, status(OrderStatus::Completed)).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], OrderEvent::WarrantyActivated(_)));

        let covered = &order.items[0];
        assert_eq!(covered.warranty_status, Some(WarrantyStatus::Active));
        assert_eq!(covered.warranty_start_at, Some(at()));
        assert_eq!(covered.warranty_end_at, Some(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()));
        assert_eq!(order.items[1].warranty_status, None);

        // Idempotent once every line is covered
        let again = run(&mut order, OrderCommand::ActivateWarranty { at: at() }).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_warranty_requires_completion() {
        let order = new_order(PaymentMethod::Cod, vec![item(5_000, 1, Some(6))]);

        assert_eq!(
            order.handle_command(&OrderCommand::ActivateWarranty { at: at() }).unwrap_err(),
            OrderError::WarrantyRequiresCompletion(OrderStatus::Pending)
        );
    }

    #[test]
    fn test_cod_order_is_not_payable() {
        let order = new_order(PaymentMethod::Cod, vec![item(1_000, 1, None)]);
        let command = OrderCommand::IssuePaymentIntent { intent: intent("pi_1", Decimal::from(1_000)) };

        assert!(matches!(order.handle_command(&command), Err(OrderError::NotPayable(_))));
    }

    #[test]
    fn test_payment_success_confirms_pending_order() {
        let mut order = new_order(PaymentMethod::Stripe, vec![item(1_000, 1, None)]);
        let amount = Decimal::from(1_000);
        run(&mut order, OrderCommand::IssuePaymentIntent { intent: intent("pi_1", amount) }).unwrap();

        let events = run(&mut order, success("pi_1", amount)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_transaction_id.as_deref(), Some("pi_1"));

        // Replay is a no-op
        assert!(run(&mut order, success("pi_1", amount)).unwrap().is_empty());
        assert!(matches!(
            order.handle_command(&OrderCommand::IssuePaymentIntent { intent: intent("pi_2", amount) }),
            Err(OrderError::NotPayable(_))
        ));
    }

    #[test]
    fn test_superseded_intent_is_stale() {
        let mut order = new_order(PaymentMethod::Stripe, vec![item(1_000, 1, None)]);
        let amount = Decimal::from(1_000);
        run(&mut order, OrderCommand::IssuePaymentIntent { intent: intent("pi_1", amount) }).unwrap();
        let events = run(&mut order, OrderCommand::IssuePaymentIntent { intent: intent("pi_2", amount) }).unwrap();

        match &events[0] {
            OrderEvent::PaymentIntentIssued(e) => assert_eq!(e.superseded_intent_id.as_deref(), Some("pi_1")),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(run(&mut order, OrderCommand::IssuePaymentIntent { intent: intent("pi_2", amount) })
            .unwrap()
            .is_empty());
        assert_eq!(
            run(&mut order, success("pi_1", amount)).unwrap_err(),
            OrderError::StaleIntent("pi_1".to_string())
        );
        assert_eq!(
            run(&mut order, success("pi_2", Decimal::from(999))).unwrap_err(),
            OrderError::StaleIntent("pi_2".to_string())
        );
    }

    #[test]
    fn test_payment_failure_keeps_status_and_allows_retry() {
        let mut order = new_order(PaymentMethod::Vnpay, vec![item(1_000, 1, None)]);
        let amount = Decimal::from(1_000);
        run(&mut order, OrderCommand::IssuePaymentIntent { intent: intent("pi_1", amount) }).unwrap();

        let failure = OrderCommand::RecordPaymentFailure {
            gateway_intent_id: "pi_1".to_string(),
            reason: Some("card_declined".to_string()),
            at: at(),
        };
        assert_eq!(run(&mut order, failure.clone()).unwrap().len(), 1);
        assert!(run(&mut order, failure).unwrap().is_empty());
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.payability_problem().is_none());
    }

    #[test]
    fn test_refund_requires_paid() {
        let mut order = new_order(PaymentMethod::Stripe, vec![item(1_000, 1, None)]);
        let refund = OrderCommand::RefundPayment { reason: None, refunded_by: None, at: at() };
        assert_eq!(
            run(&mut order, refund.clone()).unwrap_err(),
            OrderError::NotRefundable(PaymentStatus::Pending)
        );

        let amount = Decimal::from(1_000);
        run(&mut order, OrderCommand::IssuePaymentIntent { intent: intent("pi_1", amount) }).unwrap();
        run(&mut order, success("pi_1", amount)).unwrap();
        run(&mut order, refund).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert!(order.payability_problem().is_some());
    }
}
