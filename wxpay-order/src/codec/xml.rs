//! Flat XML rendering with ISO-8859-1 output.

use tracing::instrument;

use crate::{
    error::{OrderError, Result},
    order::FieldSet,
};

/// Renders `fields` as `<name>value</name>` elements in iteration order.
///
/// A non-empty `root` wraps the elements in one more element; `None` or an empty name
/// yields the bare concatenation. Values are written verbatim.
///
/// # Errors
///
/// Returns [`OrderError::EncodingError`] if a field name, value or the root name holds a
/// character outside ISO-8859-1. No partial output is returned.
#[instrument(skip(fields), fields(field_count = fields.len()))]
pub fn encode(fields: &FieldSet, root: Option<&str>) -> Result<Vec<u8>> {
    let root = root.filter(|r| !r.is_empty());
    let mut out = Vec::with_capacity(estimate_len(fields, root));

    if let Some(root) = root {
        open_tag(&mut out, root, "root element")?;
    }

    for (name, value) in fields {
        open_tag(&mut out, name, name)?;
        push_latin1(&mut out, &value.to_string(), name)?;
        close_tag(&mut out, name, name)?;
    }

    if let Some(root) = root {
        close_tag(&mut out, root, "root element")?;
    }

    Ok(out)
}

/// Converts `text` to ISO-8859-1 bytes.
///
/// # Errors
///
/// Returns [`OrderError::EncodingError`] naming the first character above U+00FF.
pub fn to_latin1(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    push_latin1(&mut out, text, "text")?;
    Ok(out)
}

fn open_tag(out: &mut Vec<u8>, name: &str, context: &str) -> Result<()> {
    out.push(b'<');
    push_latin1(out, name, context)?;
    out.push(b'>');
    Ok(())
}

fn close_tag(out: &mut Vec<u8>, name: &str, context: &str) -> Result<()> {
    out.extend_from_slice(b"</");
    push_latin1(out, name, context)?;
    out.push(b'>');
    Ok(())
}

fn push_latin1(out: &mut Vec<u8>, text: &str, context: &str) -> Result<()> {
    for c in text.chars() {
        let byte = u8::try_from(u32::from(c)).map_err(|_| {
            OrderError::EncodingError(format!(
                "{context}: character {c:?} (U+{:04X}) is not representable in ISO-8859-1",
                u32::from(c)
            ))
        })?;
        out.push(byte);
    }
    Ok(())
}

fn estimate_len(fields: &FieldSet, root: Option<&str>) -> usize {
    let root_len = root.map_or(0, |r| 2 * r.len() + 5);
    fields.iter().map(|(name, _)| 2 * name.len() + 5 + 16).sum::<usize>() + root_len
}

#[cfg(test)]
#[allow(
    clippy::unreachable,
    reason = "test code uses unreachable for expected-path assertions"
)]
mod tests {
    use super::*;
    use crate::order::FieldValue;

    fn fields(pairs: &[(&str, FieldValue)]) -> FieldSet {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn test_encode_with_root() {
        let set = fields(&[("appid", FieldValue::from("wx1"))]);
        assert_eq!(encode(&set, Some("xml")).unwrap(), b"<xml><appid>wx1</appid></xml>");
    }

    #[test]
    fn test_encode_without_root() {
        let set = fields(&[("appid", FieldValue::from("wx1"))]);
        assert_eq!(encode(&set, None).unwrap(), b"<appid>wx1</appid>");
        assert_eq!(encode(&set, Some("")).unwrap(), b"<appid>wx1</appid>");
    }

    #[test]
    fn test_encode_sorted_order_and_integers() {
        let set = fields(&[
            ("total_fee", FieldValue::Int(888)),
            ("appid", FieldValue::from("wx1")),
            ("body", FieldValue::from("Ipad mini")),
        ]);
        assert_eq!(
            encode(&set, Some("xml")).unwrap(),
            b"<xml><appid>wx1</appid><body>Ipad mini</body><total_fee>888</total_fee></xml>"
        );
    }

    #[test]
    fn test_encode_empty_set() {
        assert_eq!(encode(&FieldSet::new(), Some("xml")).unwrap(), b"<xml></xml>");
        assert!(encode(&FieldSet::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_encode_does_not_escape() {
        let set = fields(&[("attach", FieldValue::from("a<b&c"))]);
        assert_eq!(encode(&set, None).unwrap(), b"<attach>a<b&c</attach>");
    }

    #[test]
    fn test_encode_latin1_single_byte() {
        let set = fields(&[("body", FieldValue::from("caf\u{e9}"))]);
        assert_eq!(encode(&set, None).unwrap(), b"<body>caf\xe9</body>");
    }

    #[test]
    fn test_encode_rejects_multibyte() {
        let set = fields(&[("body", FieldValue::from("深圳分店"))]);

        let Err(OrderError::EncodingError(msg)) = encode(&set, Some("xml")) else {
            unreachable!("expected EncodingError")
        };
        assert!(msg.starts_with("body:"), "message should name the field: {msg}");
        assert!(msg.contains("U+6DF1"));
    }

    #[test]
    fn test_encode_rejects_multibyte_root() {
        let set = fields(&[("appid", FieldValue::from("wx1"))]);
        assert!(matches!(encode(&set, Some("根")), Err(OrderError::EncodingError(_))));
    }

    #[test]
    fn test_to_latin1() {
        assert_eq!(to_latin1("\u{ff}A").unwrap(), vec![0xff, b'A']);
        assert!(to_latin1("\u{100}").is_err());
    }
}
