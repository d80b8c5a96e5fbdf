use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One invoice row. Quantity and rate are kept as typed so that
/// half-entered input such as `"1."` is not lost between edits.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub quantity: String,
    pub rate: String,
}

impl Default for LineItem {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            quantity: "1".to_string(),
            rate: "0.00".to_string(),
        }
    }
}

/// The whole editable invoice. Field names on the wire are camelCase and the
/// set is closed: templates with missing or extra keys are rejected.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Invoice {
    pub logo: String,
    pub logo_width: f64,
    pub title: String,
    pub company_name: String,
    pub company_address: String,
    pub company_address2: String,
    pub company_phone: String,
    pub company_website: String,
    pub invoice_title_label: String,
    pub invoice_title: String,
    pub invoice_date_label: String,
    pub invoice_date: String,
    pub invoice_due_date_label: String,
    pub invoice_due_date: String,
    pub issued_to_label: String,
    pub client_name: String,
    pub client_address1: String,
    pub client_address2: String,
    pub product_line_description: String,
    pub product_line_quantity: String,
    pub product_line_quantity_rate: String,
    pub product_line_quantity_amount: String,
    pub product_lines: Vec<LineItem>,
    pub sub_total_label: String,
    pub tax_label: String,
    pub total_label: String,
    pub currency: String,
    pub bank: String,
    pub sort_code: String,
    pub account_number: String,
    pub iban: String,
    pub bic: String,
    pub notes_label: String,
    pub notes: String,
}

impl Default for Invoice {
    fn default() -> Self {
        Self {
            logo: String::new(),
            logo_width: 100.0,
            title: "INVOICE".into(),
            company_name: String::new(),
            company_address: String::new(),
            company_address2: String::new(),
            company_phone: String::new(),
            company_website: String::new(),
            invoice_title_label: "Invoice#".into(),
            invoice_title: String::new(),
            invoice_date_label: "Invoice Date".into(),
            invoice_date: String::new(),
            invoice_due_date_label: "Due Date".into(),
            invoice_due_date: String::new(),
            issued_to_label: "Bill To".into(),
            client_name: String::new(),
            client_address1: String::new(),
            client_address2: String::new(),
            product_line_description: "Item Description".into(),
            product_line_quantity: "Qty".into(),
            product_line_quantity_rate: "Rate".into(),
            product_line_quantity_amount: "Amount".into(),
            product_lines: vec![
                LineItem {
                    name: "Brochure".into(),
                    description: "Brochure Design".into(),
                    quantity: "2".into(),
                    rate: "100.00".into(),
                },
                LineItem::default(),
                LineItem::default(),
            ],
            sub_total_label: "Sub Total".into(),
            tax_label: "Sale Tax (10%)".into(),
            total_label: "TOTAL".into(),
            currency: "$".into(),
            bank: "Bank Name and Address".into(),
            sort_code: "Sort Code".into(),
            account_number: "Account Number".into(),
            iban: "IBAN".into(),
            bic: "BIC".into(),
            notes_label: "Notes".into(),
            notes: "It was great doing business with you.".into(),
        }
    }
}

/// Error returned when a field name does not match any known field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field: {0}")]
pub struct UnknownField(pub String);

macro_rules! invoice_fields {
    ($($variant:ident => $field:ident, $wire:literal;)+) => {
        /// Every free-text field of an [`Invoice`], addressable by its wire name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum InvoiceField {
            $($variant,)+
        }

        impl InvoiceField {
            pub const ALL: &'static [InvoiceField] = &[$(InvoiceField::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(InvoiceField::$variant => $wire,)+
                }
            }

            pub fn get(self, invoice: &Invoice) -> &str {
                match self {
                    $(InvoiceField::$variant => &invoice.$field,)+
                }
            }

            pub(crate) fn slot(self, invoice: &mut Invoice) -> &mut String {
                match self {
                    $(InvoiceField::$variant => &mut invoice.$field,)+
                }
            }
        }
    };
}

invoice_fields! {
    Logo => logo, "logo";
    Title => title, "title";
    CompanyName => company_name, "companyName";
    CompanyAddress => company_address, "companyAddress";
    CompanyAddress2 => company_address2, "companyAddress2";
    CompanyPhone => company_phone, "companyPhone";
    CompanyWebsite => company_website, "companyWebsite";
    InvoiceTitleLabel => invoice_title_label, "invoiceTitleLabel";
    InvoiceTitle => invoice_title, "invoiceTitle";
    InvoiceDateLabel => invoice_date_label, "invoiceDateLabel";
    InvoiceDate => invoice_date, "invoiceDate";
    InvoiceDueDateLabel => invoice_due_date_label, "invoiceDueDateLabel";
    InvoiceDueDate => invoice_due_date, "invoiceDueDate";
    IssuedToLabel => issued_to_label, "issuedToLabel";
    ClientName => client_name, "clientName";
    ClientAddress1 => client_address1, "clientAddress1";
    ClientAddress2 => client_address2, "clientAddress2";
    ProductLineDescription => product_line_description, "productLineDescription";
    ProductLineQuantity => product_line_quantity, "productLineQuantity";
    ProductLineQuantityRate => product_line_quantity_rate, "productLineQuantityRate";
    ProductLineQuantityAmount => product_line_quantity_amount, "productLineQuantityAmount";
    SubTotalLabel => sub_total_label, "subTotalLabel";
    TaxLabel => tax_label, "taxLabel";
    TotalLabel => total_label, "totalLabel";
    Currency => currency, "currency";
    Bank => bank, "bank";
    SortCode => sort_code, "sortCode";
    AccountNumber => account_number, "accountNumber";
    Iban => iban, "iban";
    Bic => bic, "bic";
    NotesLabel => notes_label, "notesLabel";
    Notes => notes, "notes";
}

impl fmt::Display for InvoiceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InvoiceField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceField::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Columns of a [`LineItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineItemField {
    Name,
    Description,
    Quantity,
    Rate,
}

impl LineItemField {
    pub const ALL: &'static [LineItemField] = &[
        LineItemField::Name,
        LineItemField::Description,
        LineItemField::Quantity,
        LineItemField::Rate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LineItemField::Name => "name",
            LineItemField::Description => "description",
            LineItemField::Quantity => "quantity",
            LineItemField::Rate => "rate",
        }
    }

    /// Quantity and rate hold numbers and go through the numeric edit policy.
    pub fn is_numeric(self) -> bool {
        matches!(self, LineItemField::Quantity | LineItemField::Rate)
    }

    pub fn get(self, item: &LineItem) -> &str {
        match self {
            LineItemField::Name => &item.name,
            LineItemField::Description => &item.description,
            LineItemField::Quantity => &item.quantity,
            LineItemField::Rate => &item.rate,
        }
    }

    pub(crate) fn slot(self, item: &mut LineItem) -> &mut String {
        match self {
            LineItemField::Name => &mut item.name,
            LineItemField::Description => &mut item.description,
            LineItemField::Quantity => &mut item.quantity,
            LineItemField::Rate => &mut item.rate,
        }
    }
}

impl fmt::Display for LineItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LineItemField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LineItemField::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_invoice_starts_with_brochure_line() {
        let invoice = Invoice::default();
        assert_eq!(invoice.product_lines.len(), 3);
        assert_eq!(invoice.product_lines[0].name, "Brochure");
        assert_eq!(invoice.product_lines[0].quantity, "2");
        assert_eq!(invoice.product_lines[1], LineItem::default());
        assert_eq!(invoice.tax_label, "Sale Tax (10%)");
        assert_eq!(invoice.logo_width, 100.0);
    }

    #[test]
    fn field_names_round_trip_through_from_str() {
        for field in InvoiceField::ALL {
            assert_eq!(field.name().parse::<InvoiceField>(), Ok(*field));
        }
        for field in LineItemField::ALL {
            assert_eq!(field.name().parse::<LineItemField>(), Ok(*field));
        }
        assert!("logoWidth".parse::<InvoiceField>().is_err());
        assert!("productLines".parse::<InvoiceField>().is_err());
    }

    #[test]
    fn field_names_match_serialized_keys() {
        let value = serde_json::to_value(Invoice::default()).unwrap();
        let object = value.as_object().unwrap();
        for field in InvoiceField::ALL {
            assert!(object.contains_key(field.name()), "missing key {}", field);
        }
        // every string field plus logoWidth and productLines
        assert_eq!(object.len(), InvoiceField::ALL.len() + 2);
    }

    #[test]
    fn get_reads_the_matching_field() {
        let invoice = Invoice::default();
        assert_eq!(InvoiceField::Title.get(&invoice), "INVOICE");
        assert_eq!(InvoiceField::Notes.get(&invoice), invoice.notes);
        assert_eq!(LineItemField::Rate.get(&invoice.product_lines[0]), "100.00");
    }
}
