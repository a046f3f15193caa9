//! Wire encoding of finalized field sets.
//!
//! The gateway accepts a flat XML document: one `<name>value</name>` element per field,
//! optionally wrapped in a single root element, with no declaration, attributes or
//! escaping. The document is sent as ISO-8859-1 bytes.
//!
//! # Examples
//!
//! ```
//! use wxpay_order::{
//!     codec::xml,
//!     order::{FieldSet, FieldValue},
//! };
//!
//! # fn example() -> wxpay_order::error::Result<()> {
//! let mut fields = FieldSet::new();
//! fields.insert("appid".to_owned(), FieldValue::Text("wx1".to_owned()));
//!
//! assert_eq!(xml::encode(&fields, Some("xml"))?, b"<xml><appid>wx1</appid></xml>");
//! assert_eq!(xml::encode(&fields, None)?, b"<appid>wx1</appid>");
//! # Ok(())
//! # }
//! ```

pub mod xml;

/// Root element the gateway expects around request fields.
pub const DEFAULT_ROOT: &str = "xml";
