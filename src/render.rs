//! Rendering an invoice for the terminal preview and for PDF export.
//!
//! Both renderers work from an [`InvoiceView`]: the invoice with dates resolved
//! and money values formatted. PDF export goes through a Typst document
//! produced from a Tera template and compiled with the `typst` binary.

use base64::Engine as _;
use base64::engine::general_purpose;
use chrono::NaiveDate;
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tera::{Context, Tera};
use thiserror::Error;

use crate::calc::{format_number, line_amount};
use crate::codec;
use crate::dates;
use crate::model::{Invoice, InvoiceField};

const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.typ.tera");
const TEMPLATE_NAME: &str = "invoice.typ.tera";

/// Placeholders shown for blank fields on screen.
const PLACEHOLDERS: &[(InvoiceField, &str)] = &[
    (InvoiceField::InvoiceTitle, "INV-12"),
    (InvoiceField::ClientName, "Client Name"),
    (InvoiceField::ClientAddress1, "Address Line 1"),
    (InvoiceField::ClientAddress2, "Address Line 2"),
    (InvoiceField::CompanyName, "Your Company"),
    (InvoiceField::CompanyAddress, "Address Line 1"),
    (InvoiceField::CompanyAddress2, "Address Line 2"),
    (InvoiceField::CompanyPhone, "Phone"),
    (InvoiceField::CompanyWebsite, "Website"),
    (InvoiceField::Bank, "Enter bank name and address"),
    (InvoiceField::SortCode, "Enter sort code"),
    (InvoiceField::AccountNumber, "Enter account number"),
    (InvoiceField::Iban, "Enter IBAN"),
    (InvoiceField::Bic, "Enter BIC"),
];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{0}' is not installed or not on PATH")]
    TypstMissing(String),
    #[error("typst failed to compile {0}")]
    Compile(PathBuf),
}

/// Where the invoice is going. The screen shows placeholders and every line;
/// the PDF leaves blanks blank and drops lines without a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Screen,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineView {
    /// Position in `productLines`, for remove/edit on screen.
    pub index: usize,
    pub name: String,
    pub description: String,
    pub quantity: String,
    pub rate: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceView {
    pub mode: RenderMode,
    pub invoice: Invoice,
    pub issue_date: String,
    pub due_date: String,
    pub lines: Vec<LineView>,
    pub sub_total: String,
    pub sale_tax: String,
    pub total: String,
    pub logo_file: Option<String>,
}

impl InvoiceView {
    pub fn build(invoice: &Invoice, mode: RenderMode, today: NaiveDate) -> Self {
        let totals = invoice.totals();

        let mut shown = invoice.clone();
        if mode == RenderMode::Screen {
            for (field, placeholder) in PLACEHOLDERS {
                if field.get(&shown).is_empty() {
                    shown = shown.with_field(*field, *placeholder);
                }
            }
        }

        let lines = invoice
            .product_lines
            .iter()
            .enumerate()
            .filter(|(_, line)| mode == RenderMode::Screen || !line.description.is_empty())
            .map(|(index, line)| LineView {
                index,
                name: line.name.clone(),
                description: line.description.clone(),
                quantity: line.quantity.clone(),
                rate: line.rate.clone(),
                amount: format_number(line_amount(&line.quantity, &line.rate)),
            })
            .collect();

        Self {
            mode,
            invoice: shown,
            issue_date: dates::format_date(dates::issue_date(invoice, today)),
            due_date: dates::format_date(dates::due_date(invoice, today)),
            lines,
            sub_total: format_number(totals.sub_total),
            sale_tax: format_number(totals.sale_tax),
            total: format_number(totals.total()),
            logo_file: None,
        }
    }
}

/// Terminal rendering of the line items and totals.
pub fn preview_table(view: &InvoiceView) -> Table {
    let inv = &view.invoice;
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("#"),
        Cell::new(&inv.product_line_description),
        Cell::new(""),
        Cell::new(&inv.product_line_quantity),
        Cell::new(&inv.product_line_quantity_rate),
        Cell::new(&inv.product_line_quantity_amount),
    ]);

    for line in &view.lines {
        table.add_row(vec![
            Cell::new(line.index + 1),
            Cell::new(&line.name),
            Cell::new(&line.description),
            Cell::new(&line.quantity).set_alignment(CellAlignment::Right),
            Cell::new(&line.rate).set_alignment(CellAlignment::Right),
            Cell::new(&line.amount).set_alignment(CellAlignment::Right),
        ]);
    }

    let summary = [
        (&inv.sub_total_label, &view.sub_total, false),
        (&inv.tax_label, &view.sale_tax, false),
        (&inv.total_label, &view.total, true),
    ];
    for (label, value, bold) in summary {
        let mut label_cell = Cell::new(label);
        let mut value_cell =
            Cell::new(format!("{}{}", inv.currency, value)).set_alignment(CellAlignment::Right);
        if bold {
            label_cell = label_cell.add_attribute(Attribute::Bold);
            value_cell = value_cell.add_attribute(Attribute::Bold);
        }
        table.add_row(vec![
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            label_cell,
            value_cell,
        ]);
    }

    table
}

/// Escapes a value for use inside a Typst string literal.
fn typst_str(value: &tera::Value, _: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let raw = match value {
        tera::Value::String(s) => s.clone(),
        tera::Value::Null => String::new(),
        other => other.to_string(),
    };
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    Ok(tera::Value::String(escaped))
}

/// Splits a `data:<mime>;base64,<payload>` logo into file extension and bytes.
pub fn decode_data_uri(uri: &str) -> Option<(&'static str, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let ext = match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        _ => return None,
    };
    let bytes = general_purpose::STANDARD.decode(payload.trim()).ok()?;
    Some((ext, bytes))
}

pub struct PdfRenderer {
    typst: String,
    tera: Tera,
}

impl PdfRenderer {
    /// Uses `invoice.typ.tera` from `template_dir` when present, otherwise
    /// the built-in template.
    pub fn new(typst: impl Into<String>, template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        let custom = template_dir
            .map(|dir| dir.join(TEMPLATE_NAME))
            .filter(|path| path.exists());
        match custom {
            Some(path) => {
                tracing::info!(path = %path.display(), "using custom invoice template");
                tera.add_template_file(&path, Some(TEMPLATE_NAME))?;
            }
            None => tera.add_raw_template(TEMPLATE_NAME, DEFAULT_TEMPLATE)?,
        }
        tera.register_filter("typst_str", typst_str);
        Ok(Self {
            typst: typst.into(),
            tera,
        })
    }

    pub fn render_source(&self, view: &InvoiceView) -> Result<String, RenderError> {
        let context = Context::from_serialize(view)?;
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }

    /// Writes `Invoice-{n}.typ` (and the logo, if any) into `out_dir` and
    /// compiles it to `Invoice-{n}.pdf`.
    pub fn export(
        &self,
        invoice: &Invoice,
        out_dir: &Path,
        today: NaiveDate,
    ) -> Result<PathBuf, RenderError> {
        if Command::new(&self.typst).arg("--version").output().is_err() {
            return Err(RenderError::TypstMissing(self.typst.clone()));
        }

        let pdf_path = out_dir.join(codec::pdf_file_name(invoice));
        let typ_path = pdf_path.with_extension("typ");

        let mut view = InvoiceView::build(invoice, RenderMode::Pdf, today);
        if !invoice.logo.is_empty() {
            view.logo_file = self.write_logo(&invoice.logo, &pdf_path)?;
        }

        let source = self.render_source(&view)?;
        fs::write(&typ_path, source).map_err(|source| RenderError::Io {
            path: typ_path.clone(),
            source,
        })?;

        let status = Command::new(&self.typst)
            .arg("compile")
            .arg(&typ_path)
            .arg(&pdf_path)
            .status()
            .map_err(|source| RenderError::Io {
                path: typ_path.clone(),
                source,
            })?;
        if !status.success() {
            tracing::error!(path = %typ_path.display(), %status, "typst compile failed");
            return Err(RenderError::Compile(typ_path));
        }

        tracing::info!(path = %pdf_path.display(), "pdf generated");
        Ok(pdf_path)
    }

    fn write_logo(&self, logo: &str, pdf_path: &Path) -> Result<Option<String>, RenderError> {
        let Some((ext, bytes)) = decode_data_uri(logo) else {
            tracing::warn!("logo is not a supported data URI, leaving it out of the pdf");
            return Ok(None);
        };
        let stem = pdf_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "invoice".to_string());
        let file_name = format!("{stem}-logo.{ext}");
        let path = pdf_path.with_file_name(&file_name);
        fs::write(&path, bytes).map_err(|source| RenderError::Io { path, source })?;
        Ok(Some(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineItem;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn screen_view_fills_placeholders_and_keeps_all_lines() {
        let view = InvoiceView::build(&Invoice::default(), RenderMode::Screen, today());
        assert_eq!(view.invoice.company_name, "Your Company");
        assert_eq!(view.invoice.invoice_title, "INV-12");
        assert_eq!(view.lines.len(), 3);
        assert_eq!(view.lines[0].amount, "200.00");
        assert_eq!(view.lines[1].amount, "0.00");
        assert_eq!(view.issue_date, "Oct 16, 2026");
        assert_eq!(view.due_date, "Nov 15, 2026");
        assert_eq!(view.total, "220.00");
    }

    #[test]
    fn pdf_view_leaves_blanks_and_drops_empty_lines() {
        let view = InvoiceView::build(&Invoice::default(), RenderMode::Pdf, today());
        assert_eq!(view.invoice.company_name, "");
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].index, 0);
        // dropped lines still count toward the totals
        let invoice = Invoice {
            product_lines: vec![LineItem {
                quantity: "2".into(),
                rate: "5".into(),
                ..LineItem::default()
            }],
            ..Invoice::default()
        };
        let view = InvoiceView::build(&invoice, RenderMode::Pdf, today());
        assert!(view.lines.is_empty());
        assert_eq!(view.sub_total, "10.00");
    }

    #[test]
    fn preview_table_lists_totals() {
        let view = InvoiceView::build(&Invoice::default(), RenderMode::Screen, today());
        let rendered = preview_table(&view).to_string();
        assert!(rendered.contains("Brochure Design"));
        assert!(rendered.contains("Sale Tax (10%)"));
        assert!(rendered.contains("$220.00"));
    }

    #[test]
    fn typst_source_escapes_strings() {
        let invoice = Invoice {
            company_name: "Quote \"Co\" \\ Sons".into(),
            ..Invoice::default()
        };
        let view = InvoiceView::build(&invoice, RenderMode::Pdf, today());
        let renderer = PdfRenderer::new("typst", None).unwrap();
        let source = renderer.render_source(&view).unwrap();
        assert!(source.contains(r#"Quote \"Co\" \\ Sons"#));
        assert!(source.contains("220.00"));
        assert!(!source.contains("#image("));
    }

    #[test]
    fn data_uri_logo_is_decoded() {
        let uri = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode([0x89, b'P', b'N', b'G'])
        );
        let (ext, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(ext, "png");
        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
        assert!(decode_data_uri("https://example.com/logo.png").is_none());
        assert!(decode_data_uri("data:text/plain;base64,aGk=").is_none());
    }
}
