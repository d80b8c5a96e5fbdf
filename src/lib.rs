//! Invoice editing core: the invoice model, total calculation, the portable
//! template format and rendering for preview and PDF export.

pub mod calc;
pub mod codec;
pub mod dates;
pub mod form;
pub mod model;
pub mod render;
pub mod settings;

pub use calc::{Totals, format_number};
pub use codec::{DecodeError, EncodeError, Template};
pub use form::{FormError, FormState};
pub use model::{Invoice, InvoiceField, LineItem, LineItemField};
pub use render::{InvoiceView, PdfRenderer, RenderMode};
pub use settings::Settings;
