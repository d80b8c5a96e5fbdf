//! Live editing state for one invoice.
//!
//! Edits never touch the current value in place. Each one builds a new
//! [`Invoice`] and swaps it in, so callers holding the previous `Arc` can tell
//! that something changed by pointer comparison or by the revision counter.

use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

use crate::calc::{Totals, normalize_numeric_input};
use crate::codec::{self, DecodeError};
use crate::dates;
use crate::model::{Invoice, InvoiceField, LineItem, LineItemField};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    #[error("line {index} does not exist (invoice has {len} lines)")]
    NoSuchLine { index: usize, len: usize },
    #[error("logo width must be a finite, non-negative number, got {0}")]
    LogoWidth(f64),
}

impl Invoice {
    pub fn with_field(&self, field: InvoiceField, value: impl Into<String>) -> Invoice {
        let mut next = self.clone();
        *field.slot(&mut next) = value.into();
        next
    }

    pub fn with_logo_width(&self, width: f64) -> Result<Invoice, FormError> {
        if !width.is_finite() || width < 0.0 {
            return Err(FormError::LogoWidth(width));
        }
        Ok(Invoice {
            logo_width: width,
            ..self.clone()
        })
    }

    /// Copy with one line item cell changed. Quantity and rate go through
    /// [`normalize_numeric_input`].
    pub fn with_line_item_field(
        &self,
        index: usize,
        field: LineItemField,
        value: &str,
    ) -> Result<Invoice, FormError> {
        self.check_line(index)?;
        let value = if field.is_numeric() {
            normalize_numeric_input(value)
        } else {
            value.to_string()
        };
        let mut next = self.clone();
        *field.slot(&mut next.product_lines[index]) = value;
        Ok(next)
    }

    pub fn with_added_line(&self) -> Invoice {
        let mut next = self.clone();
        next.product_lines.push(LineItem::default());
        next
    }

    pub fn without_line(&self, index: usize) -> Result<Invoice, FormError> {
        self.check_line(index)?;
        let mut next = self.clone();
        next.product_lines.remove(index);
        Ok(next)
    }

    /// Copy whose due date is 30 days after the issue date.
    pub fn with_due_in_30_days(&self, today: NaiveDate) -> Invoice {
        let due = dates::thirty_days_after(dates::issue_date(self, today));
        self.with_field(InvoiceField::InvoiceDueDate, dates::format_date(due))
    }

    pub fn totals(&self) -> Totals {
        Totals::compute(&self.product_lines, &self.tax_label)
    }

    fn check_line(&self, index: usize) -> Result<(), FormError> {
        if index < self.product_lines.len() {
            Ok(())
        } else {
            Err(FormError::NoSuchLine {
                index,
                len: self.product_lines.len(),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormState {
    invoice: Arc<Invoice>,
    revision: u64,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(Invoice::default())
    }
}

impl FormState {
    pub fn new(invoice: Invoice) -> Self {
        Self {
            invoice: Arc::new(invoice),
            revision: 0,
        }
    }

    pub fn invoice(&self) -> &Arc<Invoice> {
        &self.invoice
    }

    /// Bumped once per applied change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Derived from the current invoice on every call.
    pub fn totals(&self) -> Totals {
        self.invoice.totals()
    }

    fn install(&mut self, next: Invoice) {
        self.invoice = Arc::new(next);
        self.revision += 1;
    }

    pub fn edit_field(&mut self, field: InvoiceField, value: impl Into<String>) {
        let next = self.invoice.with_field(field, value);
        tracing::debug!(field = field.name(), "field edited");
        self.install(next);
    }

    pub fn set_logo_width(&mut self, width: f64) -> Result<(), FormError> {
        let next = self.invoice.with_logo_width(width)?;
        self.install(next);
        Ok(())
    }

    pub fn edit_line_item(
        &mut self,
        index: usize,
        field: LineItemField,
        value: &str,
    ) -> Result<(), FormError> {
        let next = self.invoice.with_line_item_field(index, field, value)?;
        tracing::debug!(index, field = field.name(), "line item edited");
        self.install(next);
        Ok(())
    }

    pub fn add_line_item(&mut self) {
        let next = self.invoice.with_added_line();
        self.install(next);
    }

    pub fn remove_line_item(&mut self, index: usize) -> Result<(), FormError> {
        let next = self.invoice.without_line(index)?;
        self.install(next);
        Ok(())
    }

    pub fn set_due_in_30_days(&mut self, today: NaiveDate) {
        let next = self.invoice.with_due_in_30_days(today);
        self.install(next);
    }

    /// Replaces the whole invoice.
    pub fn replace(&mut self, invoice: Invoice) {
        self.install(invoice);
    }

    /// Decodes an uploaded template and, only if it is valid, replaces the
    /// current invoice with it.
    pub fn import(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        match codec::decode(bytes) {
            Ok(invoice) => {
                tracing::info!("template parsed correctly");
                self.replace(invoice);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "template rejected, keeping current invoice");
                Err(e)
            }
        }
    }
}
