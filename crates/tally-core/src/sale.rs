//! # Sale Aggregate
//!
//! State transitions for a [`Sale`] and the rules that derive its balance
//! and status. Everything here is pure: callers pass in `now` and persist
//! the result.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sale Lifecycle                                  │
//! │                                                                         │
//! │   Sale::create(NewSale)                                                 │
//! │        │   total = Σ price × quantity   (fixed from here on)            │
//! │        ▼                                                                │
//! │   ┌─────────┐  add_payment   ┌─────────┐  add_payment   ┌──────┐       │
//! │   │ PENDING │ ─────────────► │ PARTIAL │ ─────────────► │ PAID │       │
//! │   │ paid=0  │                │ 0<p<tot │                │p≥tot │       │
//! │   └────┬────┘ ──────────────────────────────────────────►└──┬───┘       │
//! │        │                                                    │           │
//! │        │ return_item (last remaining item)                  │           │
//! │        ▼                                                    ▼           │
//! │   ┌──────────────────────────────────────────────────────────────┐      │
//! │   │ RETURNED   every item returned, wins over any paid amount    │      │
//! │   └──────────────────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Derived Fields
//! After every mutation [`Sale::rederive`] recomputes:
//!
//! | Field            | Rule                                               |
//! |------------------|----------------------------------------------------|
//! | `paid`           | Σ payments                                         |
//! | `remaining`      | total − paid (negative when overpaid)              |
//! | `payment_status` | paid = 0 → pending, paid ≥ total → paid, else partial |
//! | `return_status`  | none / partial / all items returned                |
//! | `status`         | returned if all items returned, else payment status|

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Payment, PaymentStatus, ReturnStatus, Sale, SaleItem, SaleStatus};
use crate::validation::{
    normalize_optional, validate_customer_name, validate_payment_amount, validate_price_cents,
    validate_product_name, validate_quantity, validate_required, validate_serial_number,
};

/// Payment method recorded when the caller does not name one.
pub const DEFAULT_PAYMENT_METHOD: &str = "cash";

// =============================================================================
// Inputs
// =============================================================================

/// A line item as submitted by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSaleItem {
    pub product_id: Option<String>,
    pub serial_number: String,
    pub product_name: String,
    pub quantity: i64,
    pub price_cents: i64,
}

/// A payment as submitted by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub amount_cents: i64,
    pub method: Option<String>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn new(amount_cents: i64) -> Self {
        NewPayment {
            amount_cents,
            ..Default::default()
        }
    }
}

/// Everything needed to ring up a sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewSale {
    pub customer_id: String,
    pub customer_name: String,
    pub items: Vec<NewSaleItem>,
    pub payments: Vec<NewPayment>,
    pub notes: Option<String>,
    /// Defaults to the creation time.
    pub sale_date: Option<DateTime<Utc>>,
    pub created_by: String,
}

/// The editable, non-derived fields of a sale.
///
/// Items, payments, totals and statuses only change through `add_payment`
/// and `return_item`; a body naming any of them is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaleUpdate {
    pub customer_name: Option<String>,
    /// `Some("")` clears the notes.
    pub notes: Option<String>,
    pub sale_date: Option<DateTime<Utc>>,
}

impl SaleUpdate {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none() && self.notes.is_none() && self.sale_date.is_none()
    }
}

/// Whether a payment may push the balance below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPolicy {
    pub allow_overpayment: bool,
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        PaymentPolicy {
            allow_overpayment: true,
        }
    }
}

impl PaymentPolicy {
    pub fn strict() -> Self {
        PaymentPolicy {
            allow_overpayment: false,
        }
    }

    fn check(&self, remaining: Money, attempted: Money) -> CoreResult<()> {
        if !self.allow_overpayment && attempted > remaining {
            return Err(CoreError::Overpayment {
                remaining,
                attempted,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Derivation Rules
// =============================================================================

/// Payment status from the fixed total and the amount paid so far.
pub fn derive_payment_status(total: Money, paid: Money) -> PaymentStatus {
    if paid.cents() <= 0 {
        PaymentStatus::Pending
    } else if paid >= total {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

/// Return status from the item flags. A sale without items has nothing
/// returned.
pub fn derive_return_status(items: &[SaleItem]) -> ReturnStatus {
    let returned = items.iter().filter(|i| i.is_returned).count();
    match returned {
        0 => ReturnStatus::None,
        n if n == items.len() => ReturnStatus::All,
        _ => ReturnStatus::Partial,
    }
}

/// Combined status shown to users and used for filtering.
pub fn derive_sale_status(payment: PaymentStatus, returns: ReturnStatus) -> SaleStatus {
    if returns == ReturnStatus::All {
        return SaleStatus::Returned;
    }
    match payment {
        PaymentStatus::Pending => SaleStatus::Pending,
        PaymentStatus::Partial => SaleStatus::Partial,
        PaymentStatus::Paid => SaleStatus::Paid,
    }
}

// =============================================================================
// Sale Operations
// =============================================================================

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn amount_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "amount".to_string(),
        min: 1,
        max: i64::MAX,
    }
}

/// Sum of all payments, or a validation error if it leaves the `i64` range.
fn sum_payments(payments: &[Payment]) -> CoreResult<Money> {
    Money::checked_sum(payments.iter().map(Payment::amount))
        .ok_or_else(|| amount_out_of_range().into())
}

fn build_payment(
    sale_id: &str,
    position: usize,
    input: NewPayment,
    now: DateTime<Utc>,
) -> CoreResult<Payment> {
    validate_payment_amount(input.amount_cents)?;
    Ok(Payment {
        id: new_id(),
        sale_id: sale_id.to_string(),
        position: position as i64,
        amount_cents: input.amount_cents,
        method: normalize_optional(input.method.as_deref())
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
        notes: normalize_optional(input.notes.as_deref()),
        paid_at: now,
    })
}

impl Sale {
    /// Builds a new sale from client input.
    ///
    /// Validates every field, fixes the total, records any initial payments
    /// and derives the balance. Nothing is persisted here.
    ///
    /// ## Errors
    /// - `Validation` for blank customer/operator, no items, bad quantities,
    ///   prices or payment amounts
    /// - `Overpayment` if the policy forbids it and the initial payments
    ///   exceed the total
    pub fn create(input: NewSale, now: DateTime<Utc>, policy: PaymentPolicy) -> CoreResult<Sale> {
        let customer_id = validate_required("customerId", &input.customer_id)?;
        let customer_name = validate_customer_name(&input.customer_name)?;
        let created_by = validate_required("createdBy", &input.created_by)?;

        if input.items.is_empty() {
            return Err(ValidationError::required("items").into());
        }

        let id = new_id();
        let mut total = Money::zero();
        let mut items = Vec::with_capacity(input.items.len());

        for (position, item) in input.items.into_iter().enumerate() {
            let serial_number = validate_serial_number(&item.serial_number)?;
            let product_name = validate_product_name(&item.product_name)?;
            validate_quantity(item.quantity)?;
            validate_price_cents(item.price_cents)?;

            let line = Money::from_cents(item.price_cents)
                .checked_multiply_quantity(item.quantity)
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| ValidationError::OutOfRange {
                    field: "total".to_string(),
                    min: 0,
                    max: i64::MAX,
                })?;
            total = line;

            items.push(SaleItem {
                id: new_id(),
                sale_id: id.clone(),
                position: position as i64,
                product_id: normalize_optional(item.product_id.as_deref()),
                serial_number,
                product_name,
                quantity: item.quantity,
                price_cents: item.price_cents,
                is_returned: false,
                return_date: None,
                return_reason: None,
            });
        }

        let payments = input
            .payments
            .into_iter()
            .enumerate()
            .map(|(position, p)| build_payment(&id, position, p, now))
            .collect::<CoreResult<Vec<_>>>()?;

        let initial = sum_payments(&payments)?;
        policy.check(total, initial)?;

        let mut sale = Sale {
            id,
            customer_id,
            customer_name,
            items,
            payments,
            total_cents: total.cents(),
            paid_cents: 0,
            remaining_cents: total.cents(),
            status: SaleStatus::Pending,
            payment_status: PaymentStatus::Pending,
            return_status: ReturnStatus::None,
            notes: normalize_optional(input.notes.as_deref()),
            created_by,
            sale_date: input.sale_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
            version: 1,
        };
        sale.rederive()?;
        Ok(sale)
    }

    /// Appends a payment and re-derives the balance.
    ///
    /// Returns the appended payment.
    pub fn add_payment(
        &mut self,
        input: NewPayment,
        now: DateTime<Utc>,
        policy: PaymentPolicy,
    ) -> CoreResult<Payment> {
        let payment = build_payment(&self.id, self.payments.len(), input, now)?;
        // Checked before the push: a rejected payment leaves the sale unchanged.
        sum_payments(&self.payments)?
            .checked_add(payment.amount())
            .ok_or_else(amount_out_of_range)?;
        policy.check(self.remaining(), payment.amount())?;

        self.payments.push(payment.clone());
        self.updated_at = now;
        self.rederive()?;
        Ok(payment)
    }

    /// Marks the first item whose serial number matches exactly as returned.
    ///
    /// The serial is compared as given, without trimming. Returning an
    /// already returned item succeeds again and moves its `return_date` to
    /// `now`. Payments are untouched.
    pub fn return_item(
        &mut self,
        serial_number: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<SaleItem> {
        if serial_number.trim().is_empty() {
            return Err(ValidationError::required("serialNumber").into());
        }

        let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.serial_number == serial_number)
        else {
            return Err(CoreError::SaleItemNotFound {
                sale_id: self.id.clone(),
                serial_number: serial_number.to_string(),
            });
        };

        item.is_returned = true;
        item.return_date = Some(now);
        item.return_reason = normalize_optional(reason);
        let returned = item.clone();

        self.updated_at = now;
        self.rederive()?;
        Ok(returned)
    }

    /// Applies an edit to the non-derived fields.
    pub fn apply_update(&mut self, update: SaleUpdate, now: DateTime<Utc>) -> CoreResult<()> {
        if let Some(name) = update.customer_name.as_deref() {
            self.customer_name = validate_customer_name(name)?;
        }
        if let Some(notes) = update.notes.as_deref() {
            self.notes = normalize_optional(Some(notes));
        }
        if let Some(sale_date) = update.sale_date {
            self.sale_date = sale_date;
        }

        self.updated_at = now;
        self.rederive()
    }

    /// Recomputes paid, remaining and every status from items and payments.
    ///
    /// Fails without touching the sale if the payments overflow.
    pub fn rederive(&mut self) -> CoreResult<()> {
        let paid = sum_payments(&self.payments)?;
        let total = self.total();

        self.paid_cents = paid.cents();
        self.remaining_cents = (total - paid).cents();
        self.payment_status = derive_payment_status(total, paid);
        self.return_status = derive_return_status(&self.items);
        self.status = derive_sale_status(self.payment_status, self.return_status);
        Ok(())
    }

    /// True when the stored derived fields agree with items and payments.
    pub fn is_consistent(&self) -> bool {
        let mut derived = self.clone();
        if derived.rederive().is_err() {
            return false;
        }
        derived.paid_cents == self.paid_cents
            && derived.remaining_cents == self.remaining_cents
            && derived.status == self.status
            && derived.payment_status == self.payment_status
            && derived.return_status == self.return_status
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(serial: &str, price_cents: i64, quantity: i64) -> NewSaleItem {
        NewSaleItem {
            product_id: None,
            serial_number: serial.to_string(),
            product_name: format!("Product {serial}"),
            quantity,
            price_cents,
        }
    }

    fn new_sale(items: Vec<NewSaleItem>) -> NewSale {
        NewSale {
            customer_id: "cust-1".to_string(),
            customer_name: "Ana".to_string(),
            items,
            created_by: "op-1".to_string(),
            ..Default::default()
        }
    }

    fn sample_sale() -> Sale {
        Sale::create(
            new_sale(vec![item("SN-A", 100, 2), item("SN-B", 50, 1)]),
            Utc::now(),
            PaymentPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_computes_total() {
        let sale = sample_sale();
        assert_eq!(sale.total_cents, 250);
        assert_eq!(sale.paid_cents, 0);
        assert_eq!(sale.remaining_cents, 250);
        assert_eq!(sale.status, SaleStatus::Pending);
        assert_eq!(sale.return_status, ReturnStatus::None);
        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.items[1].position, 1);
        assert!(sale.items.iter().all(|i| i.sale_id == sale.id));
        assert!(sale.is_consistent());
    }

    #[test]
    fn test_create_with_initial_payments() {
        let mut input = new_sale(vec![item("SN-A", 12000, 2), item("SN-B", 8000, 3)]);
        input.payments = vec![NewPayment::new(30000)];
        let sale = Sale::create(input, Utc::now(), PaymentPolicy::default()).unwrap();

        assert_eq!(sale.total_cents, 48000);
        assert_eq!(sale.paid_cents, 30000);
        assert_eq!(sale.remaining_cents, 18000);
        assert_eq!(sale.status, SaleStatus::Partial);
        assert_eq!(sale.payments[0].method, DEFAULT_PAYMENT_METHOD);
    }

    #[test]
    fn test_create_defaults_sale_date_to_now() {
        let now = Utc::now();
        let sale = Sale::create(
            new_sale(vec![item("SN-A", 100, 1)]),
            now,
            PaymentPolicy::default(),
        )
        .unwrap();
        assert_eq!(sale.sale_date, now);

        let earlier = now - Duration::days(3);
        let mut input = new_sale(vec![item("SN-A", 100, 1)]);
        input.sale_date = Some(earlier);
        let sale = Sale::create(input, now, PaymentPolicy::default()).unwrap();
        assert_eq!(sale.sale_date, earlier);
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let policy = PaymentPolicy::default();
        let now = Utc::now();

        assert!(Sale::create(new_sale(vec![]), now, policy).is_err());

        let mut input = new_sale(vec![item("SN-A", 100, 1)]);
        input.customer_name = "  ".to_string();
        assert!(Sale::create(input, now, policy).is_err());

        let mut input = new_sale(vec![item("SN-A", 100, 1)]);
        input.customer_id = String::new();
        assert!(Sale::create(input, now, policy).is_err());

        assert!(Sale::create(new_sale(vec![item("SN-A", 100, 0)]), now, policy).is_err());
        assert!(Sale::create(new_sale(vec![item("SN-A", -1, 1)]), now, policy).is_err());
        assert!(Sale::create(new_sale(vec![item("", 100, 1)]), now, policy).is_err());

        let mut input = new_sale(vec![item("SN-A", 100, 1)]);
        input.payments = vec![NewPayment::new(0)];
        assert!(Sale::create(input, now, policy).is_err());
    }

    #[test]
    fn test_create_rejects_overflowing_total() {
        let result = Sale::create(
            new_sale(vec![item("SN-A", i64::MAX / 2, 3)]),
            Utc::now(),
            PaymentPolicy::default(),
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_payment_total_overflow_rejected() {
        let policy = PaymentPolicy::default();
        let mut sale = sample_sale();
        sale.add_payment(NewPayment::new(i64::MAX), Utc::now(), policy)
            .unwrap();
        assert_eq!(sale.status, SaleStatus::Paid);

        let err = sale
            .add_payment(NewPayment::new(1), Utc::now(), policy)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(sale.payments.len(), 1);
        assert_eq!(sale.paid_cents, i64::MAX);
        assert!(sale.is_consistent());

        let mut input = new_sale(vec![item("SN-A", 100, 1)]);
        input.payments = vec![NewPayment::new(i64::MAX), NewPayment::new(1)];
        assert!(matches!(
            Sale::create(input, Utc::now(), policy),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_zero_total_sale_is_pending_until_paid() {
        let sale = Sale::create(
            new_sale(vec![item("SN-FREE", 0, 1)]),
            Utc::now(),
            PaymentPolicy::default(),
        )
        .unwrap();
        assert_eq!(sale.total_cents, 0);
        assert_eq!(sale.status, SaleStatus::Pending);
    }

    #[test]
    fn test_full_payment_marks_paid() {
        let mut sale = sample_sale();
        sale.add_payment(NewPayment::new(250), Utc::now(), PaymentPolicy::default())
            .unwrap();

        assert_eq!(sale.paid_cents, 250);
        assert_eq!(sale.remaining_cents, 0);
        assert_eq!(sale.status, SaleStatus::Paid);
    }

    #[test]
    fn test_partial_payments_accumulate() {
        let mut sale = sample_sale();
        let policy = PaymentPolicy::default();
        sale.add_payment(NewPayment::new(100), Utc::now(), policy)
            .unwrap();
        let second = sale
            .add_payment(
                NewPayment {
                    amount_cents: 50,
                    method: Some("card".to_string()),
                    notes: Some(" deposit ".to_string()),
                },
                Utc::now(),
                policy,
            )
            .unwrap();

        assert_eq!(sale.paid_cents, 150);
        assert_eq!(sale.remaining_cents, 100);
        assert_eq!(sale.status, SaleStatus::Partial);
        assert_eq!(second.position, 1);
        assert_eq!(second.method, "card");
        assert_eq!(second.notes.as_deref(), Some("deposit"));
        assert!(sale.is_consistent());
    }

    #[test]
    fn test_non_positive_payment_rejected() {
        let mut sale = sample_sale();
        let before = sale.clone();
        assert!(sale
            .add_payment(NewPayment::new(0), Utc::now(), PaymentPolicy::default())
            .is_err());
        assert!(sale
            .add_payment(NewPayment::new(-10), Utc::now(), PaymentPolicy::default())
            .is_err());
        assert_eq!(sale.payments.len(), before.payments.len());
        assert_eq!(sale.paid_cents, before.paid_cents);
    }

    #[test]
    fn test_overpayment_allowed_by_default() {
        let mut sale = sample_sale();
        sale.add_payment(NewPayment::new(300), Utc::now(), PaymentPolicy::default())
            .unwrap();
        assert_eq!(sale.remaining_cents, -50);
        assert_eq!(sale.status, SaleStatus::Paid);
    }

    #[test]
    fn test_overpayment_rejected_by_strict_policy() {
        let mut sale = sample_sale();
        let err = sale
            .add_payment(NewPayment::new(300), Utc::now(), PaymentPolicy::strict())
            .unwrap_err();
        assert!(matches!(err, CoreError::Overpayment { .. }));
        assert!(sale.payments.is_empty());

        sale.add_payment(NewPayment::new(250), Utc::now(), PaymentPolicy::strict())
            .unwrap();
        assert_eq!(sale.remaining_cents, 0);
    }

    #[test]
    fn test_return_unknown_serial_leaves_sale_untouched() {
        let mut sale = sample_sale();
        let before = sale.clone();
        let err = sale.return_item("SN-404", None, Utc::now()).unwrap_err();

        assert!(matches!(err, CoreError::SaleItemNotFound { .. }));
        assert!(err.is_not_found());
        assert_eq!(sale.updated_at, before.updated_at);
        assert!(sale.items.iter().all(|i| !i.is_returned));
    }

    #[test]
    fn test_return_is_idempotent() {
        let mut sale = sample_sale();
        let first = Utc::now();
        let second = first + Duration::minutes(5);

        sale.return_item("SN-A", Some("damaged"), first).unwrap();
        let item = sale.return_item("SN-A", Some("damaged"), second).unwrap();

        assert!(item.is_returned);
        assert_eq!(item.return_date, Some(second));
        assert_eq!(sale.return_status, ReturnStatus::Partial);
        assert_eq!(sale.status, SaleStatus::Pending);
    }

    #[test]
    fn test_return_matches_serial_exactly() {
        let mut sale = sample_sale();
        let err = sale.return_item("SN-A ", None, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::SaleItemNotFound { .. }));
        let err = sale.return_item("sn-a", None, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::SaleItemNotFound { .. }));
        assert!(matches!(
            sale.return_item("  ", None, Utc::now()),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
        assert!(sale.items.iter().all(|i| !i.is_returned));
    }

    #[test]
    fn test_update_rejects_derived_fields() {
        let update: SaleUpdate = serde_json::from_str(r#"{"notes":"gift"}"#).unwrap();
        assert_eq!(update.notes.as_deref(), Some("gift"));

        for body in [
            r#"{"notes":"gift","totalCents":1}"#,
            r#"{"items":[]}"#,
            r#"{"payments":[]}"#,
            r#"{"status":"paid"}"#,
        ] {
            assert!(serde_json::from_str::<SaleUpdate>(body).is_err(), "{body}");
        }
    }

    #[test]
    fn test_return_marks_first_match_only() {
        let mut sale = Sale::create(
            new_sale(vec![item("SN-DUP", 100, 1), item("SN-DUP", 100, 1)]),
            Utc::now(),
            PaymentPolicy::default(),
        )
        .unwrap();
        sale.return_item("SN-DUP", None, Utc::now()).unwrap();

        assert!(sale.items[0].is_returned);
        assert!(!sale.items[1].is_returned);
    }

    #[test]
    fn test_all_returned_overrides_paid() {
        let mut sale = sample_sale();
        let now = Utc::now();
        sale.add_payment(NewPayment::new(250), now, PaymentPolicy::default())
            .unwrap();
        sale.return_item("SN-A", None, now).unwrap();
        assert_eq!(sale.status, SaleStatus::Paid);

        sale.return_item("SN-B", None, now).unwrap();
        assert_eq!(sale.status, SaleStatus::Returned);
        assert_eq!(sale.payment_status, PaymentStatus::Paid);
        assert_eq!(sale.return_status, ReturnStatus::All);
        assert_eq!(sale.paid_cents, 250);
        assert_eq!(sale.remaining_cents, 0);
    }

    #[test]
    fn test_payment_after_full_return_keeps_returned() {
        let mut sale = sample_sale();
        let now = Utc::now();
        sale.return_item("SN-A", None, now).unwrap();
        sale.return_item("SN-B", None, now).unwrap();
        sale.add_payment(NewPayment::new(100), now, PaymentPolicy::default())
            .unwrap();

        assert_eq!(sale.status, SaleStatus::Returned);
        assert_eq!(sale.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_update_touches_only_editable_fields() {
        let mut sale = sample_sale();
        let later = Utc::now() + Duration::hours(1);
        sale.apply_update(
            SaleUpdate {
                customer_name: Some(" Ana María ".to_string()),
                notes: Some("gift wrap".to_string()),
                sale_date: None,
            },
            later,
        )
        .unwrap();

        assert_eq!(sale.customer_name, "Ana María");
        assert_eq!(sale.notes.as_deref(), Some("gift wrap"));
        assert_eq!(sale.total_cents, 250);
        assert_eq!(sale.updated_at, later);

        sale.apply_update(
            SaleUpdate {
                notes: Some(String::new()),
                ..Default::default()
            },
            later,
        )
        .unwrap();
        assert!(sale.notes.is_none());

        assert!(sale
            .apply_update(
                SaleUpdate {
                    customer_name: Some(" ".to_string()),
                    ..Default::default()
                },
                later,
            )
            .is_err());
    }

    #[test]
    fn test_inconsistent_sale_detected() {
        let mut sale = sample_sale();
        sale.paid_cents = 10;
        assert!(!sale.is_consistent());
        sale.rederive().unwrap();
        assert!(sale.is_consistent());
    }

    #[test]
    fn test_derive_rules() {
        let total = Money::from_cents(100);
        assert_eq!(
            derive_payment_status(total, Money::zero()),
            PaymentStatus::Pending
        );
        assert_eq!(
            derive_payment_status(total, Money::from_cents(99)),
            PaymentStatus::Partial
        );
        assert_eq!(
            derive_payment_status(total, Money::from_cents(100)),
            PaymentStatus::Paid
        );
        assert_eq!(derive_return_status(&[]), ReturnStatus::None);
        assert_eq!(
            derive_sale_status(PaymentStatus::Partial, ReturnStatus::Partial),
            SaleStatus::Partial
        );
        assert_eq!(
            derive_sale_status(PaymentStatus::Pending, ReturnStatus::All),
            SaleStatus::Returned
        );
    }
}
