//! Template files: the portable JSON form of an [`Invoice`].
//!
//! Templates are written as plain UTF-8 JSON. On the way in, base64-wrapped
//! JSON is also accepted for files produced by older exports.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::Invoice;

/// Extensions accepted by the template upload filter.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["json", "template"];

// Standard alphabet, padding optional and stray trailing bits ignored, like
// the browser `atob`.
const LEGACY_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a template file (expected .json or .template)")]
    UnsupportedFile(PathBuf),
    #[error("template is not UTF-8 text")]
    NotText(#[source] std::str::Utf8Error),
    #[error("template is neither JSON nor base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("template is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("template does not match the invoice schema: {0}")]
    Schema(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("logo width must be a finite number, got {0}")]
    LogoWidth(f64),
    #[error("failed to serialize invoice: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An encoded template ready to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// `invoiceTitle`, or `"invoice"` when the title is blank.
pub fn invoice_number(invoice: &Invoice) -> &str {
    if invoice.invoice_title.is_empty() {
        "invoice"
    } else {
        &invoice.invoice_title
    }
}

pub fn template_file_name(invoice: &Invoice) -> String {
    format!("Invoice-{}.template", invoice_number(invoice))
}

pub fn pdf_file_name(invoice: &Invoice) -> String {
    format!("Invoice-{}.pdf", invoice_number(invoice))
}

pub fn encode(invoice: &Invoice) -> Result<Template, EncodeError> {
    // serde_json would silently write NaN as null and the file could not be read back
    if !invoice.logo_width.is_finite() {
        return Err(EncodeError::LogoWidth(invoice.logo_width));
    }
    Ok(Template {
        file_name: template_file_name(invoice),
        bytes: serde_json::to_vec(invoice)?,
    })
}

/// Decodes and validates an uploaded template.
///
/// The input is either raw JSON or base64 of the same JSON. The result is a
/// complete invoice or an error; there is no partial result.
pub fn decode(bytes: &[u8]) -> Result<Invoice, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(DecodeError::NotText)?;
    let text = text.trim_start_matches('\u{feff}');
    let trimmed = text.trim();

    let json = if trimmed.starts_with('{') && trimmed.ends_with('}') {
        trimmed.to_string()
    } else {
        tracing::debug!("template is not raw JSON, trying base64");
        let compact: Vec<u8> = trimmed
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let raw = LEGACY_BASE64.decode(compact)?;
        String::from_utf8(raw).map_err(|e| DecodeError::NotText(e.utf8_error()))?
    };

    let value: serde_json::Value = serde_json::from_str(&json).map_err(DecodeError::Json)?;
    serde_json::from_value(value).map_err(DecodeError::Schema)
}

/// Whether a file passes the upload filter.
pub fn accepts_upload(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEMPLATE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

pub fn read_template(path: &Path) -> Result<Invoice, DecodeError> {
    if !accepts_upload(path) {
        return Err(DecodeError::UnsupportedFile(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes)
}

/// Encodes `invoice` and writes it into `dir` under its template file name.
pub fn write_template(invoice: &Invoice, dir: &Path) -> Result<PathBuf, EncodeError> {
    let template = encode(invoice)?;
    let path = dir.join(&template.file_name);
    fs::write(&path, &template.bytes).map_err(|source| EncodeError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "template saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose;
    use serde_json::json;

    #[test]
    fn file_names_fall_back_to_invoice() {
        let mut invoice = Invoice::default();
        assert_eq!(template_file_name(&invoice), "Invoice-invoice.template");
        assert_eq!(pdf_file_name(&invoice), "Invoice-invoice.pdf");

        invoice.invoice_title = "INV-12".into();
        assert_eq!(template_file_name(&invoice), "Invoice-INV-12.template");
        assert_eq!(pdf_file_name(&invoice), "Invoice-INV-12.pdf");
    }

    #[test]
    fn encode_writes_camel_case_json() {
        let template = encode(&Invoice::default()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&template.bytes).unwrap();
        assert_eq!(value["taxLabel"], "Sale Tax (10%)");
        assert_eq!(value["logoWidth"], 100.0);
        assert_eq!(value["productLines"][0]["rate"], "100.00");
    }

    #[test]
    fn encode_rejects_non_finite_logo_width() {
        let invoice = Invoice {
            logo_width: f64::NAN,
            ..Invoice::default()
        };
        assert!(matches!(encode(&invoice), Err(EncodeError::LogoWidth(_))));
    }

    #[test]
    fn decode_accepts_raw_and_base64() {
        let invoice = Invoice {
            invoice_title: "INV-7".into(),
            ..Invoice::default()
        };
        let bytes = encode(&invoice).unwrap().bytes;
        assert_eq!(decode(&bytes).unwrap(), invoice);

        let wrapped = general_purpose::STANDARD.encode(&bytes);
        assert_eq!(decode(wrapped.as_bytes()).unwrap(), invoice);

        let unpadded = general_purpose::STANDARD_NO_PAD.encode(&bytes);
        assert_eq!(decode(unpadded.as_bytes()).unwrap(), invoice);
    }

    #[test]
    fn logo_width_survives_round_trip_bit_for_bit() {
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut checked = 0;
        while checked < 10_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let width = f64::from_bits(state);
            if !width.is_finite() {
                continue;
            }
            let invoice = Invoice {
                logo_width: width,
                ..Invoice::default()
            };
            let decoded = decode(&encode(&invoice).unwrap().bytes).unwrap();
            assert_eq!(decoded.logo_width.to_bits(), width.to_bits(), "width {width:e}");
            checked += 1;
        }
    }

    #[test]
    fn logo_width_edge_values_round_trip() {
        for width in [
            1.0715660391465826e-75,
            -1.81996730402717e-179,
            -1.603964615428183e143,
            f64::MIN_POSITIVE,
            f64::MAX,
            5e-324,
        ] {
            let invoice = Invoice {
                logo_width: width,
                ..Invoice::default()
            };
            let decoded = decode(&encode(&invoice).unwrap().bytes).unwrap();
            assert_eq!(decoded.logo_width.to_bits(), width.to_bits());
        }
    }

    #[test]
    fn base64_ignores_non_canonical_trailing_bits() {
        assert_eq!(LEGACY_BASE64.decode("YR==").unwrap(), b"a");
        assert_eq!(LEGACY_BASE64.decode("YR").unwrap(), b"a");

        // pad the JSON so the base64 ends in a single-byte group, then set
        // the unused low bits of its second character
        let invoice = Invoice::default();
        let mut json = String::from_utf8(encode(&invoice).unwrap().bytes).unwrap();
        json.pop();
        while (json.len() + 1) % 3 != 1 {
            json.push(' ');
        }
        json.push('}');
        let mut wrapped = general_purpose::STANDARD.encode(json.as_bytes()).into_bytes();
        const ALPHABET: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        let pos = wrapped.len() - 3;
        let sextet = ALPHABET.iter().position(|&c| c == wrapped[pos]).unwrap();
        wrapped[pos] = ALPHABET[sextet | 0b1111];

        assert_eq!(decode(&wrapped).unwrap(), invoice);
    }

    #[test]
    fn decode_accepts_integer_logo_width() {
        let mut value = serde_json::to_value(Invoice::default()).unwrap();
        value["logoWidth"] = json!(120);
        let decoded = decode(value.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.logo_width, 120.0);
    }

    #[test]
    fn decode_classifies_failures() {
        assert!(matches!(decode(&[0xff, 0xfe, 0x00]), Err(DecodeError::NotText(_))));
        assert!(matches!(decode(b"not base64!"), Err(DecodeError::Base64(_))));
        assert!(matches!(decode(b"{\"logo\": }"), Err(DecodeError::Json(_))));
        assert!(matches!(decode(b"{}"), Err(DecodeError::Schema(_))));
    }

    #[test]
    fn decode_rejects_wrong_types_and_extra_keys() {
        let mut value = serde_json::to_value(Invoice::default()).unwrap();
        value["logoWidth"] = json!("100");
        assert!(matches!(
            decode(value.to_string().as_bytes()),
            Err(DecodeError::Schema(_))
        ));

        let mut value = serde_json::to_value(Invoice::default()).unwrap();
        value["productLines"][0]["quantity"] = json!(2);
        assert!(matches!(
            decode(value.to_string().as_bytes()),
            Err(DecodeError::Schema(_))
        ));

        let mut value = serde_json::to_value(Invoice::default()).unwrap();
        value["discount"] = json!("5%");
        assert!(matches!(
            decode(value.to_string().as_bytes()),
            Err(DecodeError::Schema(_))
        ));

        let mut value = serde_json::to_value(Invoice::default()).unwrap();
        value.as_object_mut().unwrap().remove("issuedToLabel");
        assert!(matches!(
            decode(value.to_string().as_bytes()),
            Err(DecodeError::Schema(_))
        ));
    }

    #[test]
    fn upload_filter_checks_extension() {
        assert!(accepts_upload(Path::new("Invoice-1.template")));
        assert!(accepts_upload(Path::new("backup.JSON")));
        assert!(!accepts_upload(Path::new("Invoice-1.pdf")));
        assert!(!accepts_upload(Path::new("template")));
    }
}
