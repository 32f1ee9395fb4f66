use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::error::BackendError;
use crate::domain::models::*;
use crate::domain::settings::BillingSettings;
use crate::utils::parsing::{format_date, normalize_date, parse_date, range_bounds};

use super::records::numeric_suffix;
use super::{Backend, require};

/// Numbering and pricing terms for drafted invoices.
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceTerms {
    pub prefix: String,
    pub tax_rate: f64,
    pub payment_terms_days: i64,
}

impl Default for InvoiceTerms {
    fn default() -> Self {
        Self::from(&BillingSettings::default())
    }
}

impl From<&BillingSettings> for InvoiceTerms {
    fn from(settings: &BillingSettings) -> Self {
        Self {
            prefix: settings.invoice_prefix.trim().to_string(),
            tax_rate: settings.default_tax_rate,
            payment_terms_days: i64::from(settings.payment_terms_days),
        }
    }
}

impl Backend {
    pub fn get_invoices(&self) -> Result<Vec<Invoice>, BackendError> {
        self.list()
    }

    pub fn get_invoice(&self, id: &str) -> Result<Invoice, BackendError> {
        self.find(id)
    }

    /// A blank invoice number is generated with the default prefix.
    pub fn add_invoice(&self, invoice: Invoice) -> Result<Invoice, BackendError> {
        self.add_invoice_with_prefix(invoice, &InvoiceTerms::default().prefix)
    }

    fn add_invoice_with_prefix(&self, mut invoice: Invoice, prefix: &str) -> Result<Invoice, BackendError> {
        self.prepare_invoice(&mut invoice)?;
        if invoice.invoice_no.trim().is_empty() {
            invoice.invoice_no = self.next_invoice_no(prefix, &invoice.issue_date)?;
        }
        self.insert(invoice)
    }

    pub fn update_invoice(&self, mut invoice: Invoice) -> Result<Invoice, BackendError> {
        self.prepare_invoice(&mut invoice)?;
        self.replace(invoice)
    }

    pub fn delete_invoice(&self, id: &str) -> Result<Invoice, BackendError> {
        self.remove(id)
    }

    pub fn cancel_invoice(&self, id: &str) -> Result<Invoice, BackendError> {
        let mut invoice = self.get_invoice(id)?;
        require(
            invoice.payments.is_empty(),
            format!("invoice {} already has payments", invoice.invoice_no),
        )?;
        invoice.status = InvoiceStatus::Cancelled;
        self.replace(invoice)
    }

    /// Appends a payment; the invoice becomes PARTIAL or PAID.
    pub fn record_payment(&self, invoice_id: &str, mut payment: PaymentRecord) -> Result<Invoice, BackendError> {
        let mut invoice = self.get_invoice(invoice_id)?;
        require(
            !matches!(invoice.status, InvoiceStatus::Cancelled | InvoiceStatus::Draft),
            format!("invoice {} is not open for payment", invoice.invoice_no),
        )?;
        require(payment.amount > 0.0, "payment amount must be positive")?;
        require(
            round_cents(payment.amount) <= invoice.balance_amount,
            format!(
                "payment {:.2} exceeds balance {:.2}",
                payment.amount, invoice.balance_amount
            ),
        )?;
        payment.date = normalize_date(&payment.date)
            .ok_or_else(|| BackendError::invalid(format!("invalid date: {}", payment.date)))?;
        let next = invoice
            .payments
            .iter()
            .filter_map(|p| numeric_suffix(&p.id, "pay-"))
            .max()
            .unwrap_or(0)
            + 1;
        payment.id = format!("pay-{next}");
        invoice.payments.push(payment);
        invoice.recalculate();
        self.replace(invoice)
    }

    /// Marks sent or partially paid invoices past their due date.
    pub fn flag_overdue_invoices(&self, today: NaiveDate) -> Result<usize, BackendError> {
        let mut invoices = self.get_invoices()?;
        let mut flagged = 0;
        for invoice in invoices.iter_mut() {
            if !matches!(invoice.status, InvoiceStatus::Sent | InvoiceStatus::Partial) {
                continue;
            }
            if parse_date(&invoice.due_date).is_some_and(|due| due < today) {
                invoice.status = InvoiceStatus::Overdue;
                flagged += 1;
            }
        }
        if flagged > 0 {
            self.save(&invoices)?;
        }
        Ok(flagged)
    }

    /// Drafts an invoice from a project's billable entries in `range`, one
    /// line per employee priced at the project's rate for that employee.
    pub fn create_invoice_from_entries(
        &self,
        project_id: &str,
        range: &DateRange,
        terms: &InvoiceTerms,
    ) -> Result<Invoice, BackendError> {
        let project = self.get_project(project_id)?;
        require(
            project.billing_mode != BillingMode::NonBillable,
            format!("project {} is not billable", project.name),
        )?;
        let (start, end) = range_bounds(range)
            .ok_or_else(|| BackendError::invalid(format!("invalid range: {}", range.label())))?;

        let mut minutes_by_user: BTreeMap<String, i64> = BTreeMap::new();
        for entry in self.get_time_entries()? {
            if entry.project_id != project.id || !entry.is_billable {
                continue;
            }
            if parse_date(&entry.date).is_some_and(|date| date >= start && date <= end) {
                *minutes_by_user.entry(entry.user_id).or_default() += entry.duration_minutes;
            }
        }
        require(
            !minutes_by_user.is_empty(),
            format!("no billable entries for {} in {}", project.name, range.label()),
        )?;

        let users = self.get_users()?;
        let items = minutes_by_user
            .into_iter()
            .map(|(user_id, minutes)| {
                let name = users
                    .iter()
                    .find(|user| user.id == user_id)
                    .map(|user| user.name.clone())
                    .unwrap_or_else(|| user_id.clone());
                InvoiceItem {
                    description: format!("{} - {} ({})", project.name, name, range.label()),
                    quantity: round_cents(minutes as f64 / 60.0),
                    unit_price: project.rate_for(&user_id),
                    amount: 0.0,
                }
            })
            .collect();

        let issue = self.now().date_naive();
        let draft = Invoice {
            id: String::new(),
            invoice_no: String::new(),
            client_id: project.client_id.clone(),
            client_name: project.client_name.clone(),
            project_id: Some(project.id.clone()),
            project_name: project.name.clone(),
            issue_date: format_date(issue),
            due_date: format_date(issue + Duration::days(terms.payment_terms_days)),
            items,
            tax_rate: terms.tax_rate,
            subtotal: 0.0,
            tax_amount: 0.0,
            total_amount: 0.0,
            paid_amount: 0.0,
            balance_amount: 0.0,
            status: InvoiceStatus::Draft,
            payments: Vec::new(),
        };
        self.add_invoice_with_prefix(draft, &terms.prefix)
    }

    fn prepare_invoice(&self, invoice: &mut Invoice) -> Result<(), BackendError> {
        let client = self
            .get_client(&invoice.client_id)
            .map_err(|_| BackendError::invalid(format!("unknown client: {}", invoice.client_id)))?;
        invoice.client_name = client.name;
        if let Some(project_id) = &invoice.project_id {
            let project = self
                .get_project(project_id)
                .map_err(|_| BackendError::invalid(format!("unknown project: {project_id}")))?;
            invoice.project_name = project.name;
        }
        invoice.issue_date = normalize_date(&invoice.issue_date)
            .ok_or_else(|| BackendError::invalid(format!("invalid issue date: {}", invoice.issue_date)))?;
        if !invoice.due_date.trim().is_empty() {
            invoice.due_date = normalize_date(&invoice.due_date)
                .ok_or_else(|| BackendError::invalid(format!("invalid due date: {}", invoice.due_date)))?;
        }
        require(invoice.tax_rate >= 0.0, "tax rate cannot be negative")?;
        for item in &invoice.items {
            require(!item.description.trim().is_empty(), "line items need a description")?;
            require(
                item.quantity >= 0.0 && item.unit_price >= 0.0,
                format!("line item {} has a negative amount", item.description),
            )?;
        }
        invoice.recalculate();
        Ok(())
    }

    fn next_invoice_no(&self, prefix: &str, issue_date: &str) -> Result<String, BackendError> {
        let year = parse_date(issue_date)
            .map(|date| date.year())
            .unwrap_or_else(|| self.now().year());
        let prefix = if prefix.is_empty() {
            format!("INV-{year}-")
        } else {
            format!("{prefix}-{year}-")
        };
        let next = self
            .get_invoices()?
            .iter()
            .filter_map(|invoice| numeric_suffix(&invoice.invoice_no, &prefix))
            .max()
            .unwrap_or(0)
            + 1;
        Ok(format!("{prefix}{next:04}"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::seeded_backend;
    use super::*;

    fn payment(amount: f64) -> PaymentRecord {
        PaymentRecord {
            id: String::new(),
            date: "2024-06-12".into(),
            amount,
            method: "BANK_TRANSFER".into(),
            reference: String::new(),
        }
    }

    #[test]
    fn payments_move_invoice_to_partial_then_paid() {
        let backend = seeded_backend();
        let seeded = backend.get_invoice("inv-1").unwrap();
        assert_eq!(seeded.total_amount, 4484.0);
        let partial = backend.record_payment("inv-1", payment(1000.0)).unwrap();
        assert_eq!(partial.status, InvoiceStatus::Partial);
        assert_eq!(partial.balance_amount, 3484.0);
        assert!(backend.record_payment("inv-1", payment(5000.0)).is_err());
        let paid = backend.record_payment("inv-1", payment(3484.0)).unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.payments[1].id, "pay-2");
    }

    #[test]
    fn invoice_from_entries_prices_each_employee() {
        let backend = seeded_backend();
        let range = DateRange {
            start: "2024-06-01".into(),
            end: "2024-06-30".into(),
        };
        let terms = InvoiceTerms {
            tax_rate: 10.0,
            payment_terms_days: 30,
            ..InvoiceTerms::default()
        };
        let invoice = backend.create_invoice_from_entries("prj-1", &range, &terms).unwrap();
        assert_eq!(invoice.invoice_no, "INV-2024-0002");
        assert_eq!(invoice.items.len(), 2);
        // 8h + 4h billable at 95/h
        assert_eq!(invoice.subtotal, 1140.0);
        assert_eq!(invoice.total_amount, 1254.0);
        assert_eq!(invoice.due_date, "2024-07-10");
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn overdue_invoices_are_flagged() {
        let backend = seeded_backend();
        let today = parse_date("2024-07-02").unwrap();
        assert_eq!(backend.flag_overdue_invoices(today).unwrap(), 1);
        assert_eq!(backend.get_invoice("inv-1").unwrap().status, InvoiceStatus::Overdue);
    }

    #[test]
    fn billing_prefix_numbers_drafted_invoices() {
        let backend = seeded_backend();
        let range = DateRange {
            start: "2024-06-01".into(),
            end: "2024-06-30".into(),
        };
        let billing = BillingSettings {
            invoice_prefix: "CRD".into(),
            ..BillingSettings::default()
        };
        let terms = InvoiceTerms::from(&billing);
        let first = backend.create_invoice_from_entries("prj-1", &range, &terms).unwrap();
        let second = backend.create_invoice_from_entries("prj-2", &range, &terms).unwrap();
        assert_eq!(first.invoice_no, "CRD-2024-0001");
        assert_eq!(second.invoice_no, "CRD-2024-0002");
        assert_eq!(first.tax_rate, 18.0);
    }
}
