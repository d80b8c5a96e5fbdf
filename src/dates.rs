//! Issue and due dates. Both are stored on the invoice as display strings.

use chrono::{Days, NaiveDate};

use crate::model::Invoice;

/// `MMM dd, yyyy`, e.g. `Jan 05, 2026`.
pub const DISPLAY_FORMAT: &str = "%b %d, %Y";

const ACCEPTED_FORMATS: &[&str] = &[DISPLAY_FORMAT, "%B %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];

pub const DEFAULT_TERM_DAYS: u64 = 30;

pub fn format_date(date: NaiveDate) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
}

pub fn thirty_days_after(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(DEFAULT_TERM_DAYS))
        .unwrap_or(date)
}

/// The invoice date, or `today` when blank or unreadable.
pub fn issue_date(invoice: &Invoice, today: NaiveDate) -> NaiveDate {
    parse_date(&invoice.invoice_date).unwrap_or(today)
}

/// The due date, or 30 days after the issue date when none is set.
pub fn due_date(invoice: &Invoice, today: NaiveDate) -> NaiveDate {
    parse_date(&invoice.invoice_due_date)
        .unwrap_or_else(|| thirty_days_after(issue_date(invoice, today)))
}
