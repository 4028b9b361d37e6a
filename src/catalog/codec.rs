//! Bit-addressed value codec
//!
//! Encodes a [`Value`] of a given [`Type`] at an arbitrary bit offset of a byte
//! buffer. Booleans occupy a single bit; every other type is byte aligned and
//! stored little-endian.

use super::errors::{CatalogError, CatalogResult};
use super::types::{Type, Value};

/// Check that `value` is storable as `ty` without writing anything
pub fn check_value(ty: Type, value: &Value) -> CatalogResult<()> {
    match (ty, value) {
        (Type::Integer(width), Value::Int(v)) => check_int_range(*v, u32::from(width)),
        (Type::Date, Value::Int(v)) => check_int_range(*v, 4),
        (Type::Char(len), Value::Char(s)) if s.len() > len as usize => Err(
            CatalogError::ValueOutOfRange(format!("{} bytes do not fit CHAR({})", s.len(), len)),
        ),
        (Type::Char(_), Value::Char(s)) if s.contains('\0') => Err(CatalogError::ValueOutOfRange(
            "CHAR values must not contain NUL".into(),
        )),
        _ if ty.accepts(value) => Ok(()),
        _ => Err(CatalogError::ValueOutOfRange(format!(
            "{} value is not storable as {}",
            value.kind(),
            ty
        ))),
    }
}

fn check_int_range(v: i64, width: u32) -> CatalogResult<()> {
    if width >= 8 {
        return Ok(());
    }
    let bits = width * 8;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    if v < min || v > max {
        return Err(CatalogError::ValueOutOfRange(format!(
            "{} does not fit a {}-byte integer",
            v, width
        )));
    }
    Ok(())
}

fn byte_span<'a>(buf: &'a mut [u8], ty: Type, bit_offset: u64) -> CatalogResult<&'a mut [u8]> {
    let start = usize::try_from(bit_offset / 8).map_err(|_| CatalogError::Truncated { ty, bit_offset })?;
    let len = ty.size_in_bits().div_ceil(8) as usize;
    buf.get_mut(start..start + len)
        .ok_or(CatalogError::Truncated { ty, bit_offset })
}

/// Write `value` as `ty` at `bit_offset` of `dst`
pub fn encode(ty: Type, value: &Value, dst: &mut [u8], bit_offset: u64) -> CatalogResult<()> {
    check_value(ty, value)?;
    if ty != Type::Boolean && bit_offset % 8 != 0 {
        return Err(CatalogError::Corrupt(format!(
            "{} cannot be stored at unaligned bit {}",
            ty, bit_offset
        )));
    }

    let span = byte_span(dst, ty, bit_offset)?;
    match (ty, value) {
        (Type::Boolean, Value::Bool(b)) => {
            let mask = 1u8 << (bit_offset % 8);
            if *b {
                span[0] |= mask;
            } else {
                span[0] &= !mask;
            }
        }
        (_, Value::Int(v)) => {
            let width = span.len();
            span.copy_from_slice(&v.to_le_bytes()[..width]);
        }
        (Type::Float, Value::Float(v)) => span.copy_from_slice(&v.to_le_bytes()),
        (Type::Double, Value::Double(v)) => span.copy_from_slice(&v.to_le_bytes()),
        (Type::Char(_), Value::Char(s)) => {
            let bytes = s.as_bytes();
            span[..bytes.len()].copy_from_slice(bytes);
            span[bytes.len()..].fill(0);
        }
        _ => {
            return Err(CatalogError::Corrupt(format!(
                "{} value is not storable as {}",
                value.kind(),
                ty
            )))
        }
    }
    Ok(())
}

/// Read a value of type `ty` at `bit_offset` of `src`
pub fn decode(ty: Type, src: &[u8], bit_offset: u64) -> CatalogResult<Value> {
    let start = usize::try_from(bit_offset / 8).map_err(|_| CatalogError::Truncated { ty, bit_offset })?;
    let len = ty.size_in_bits().div_ceil(8) as usize;
    let span = src
        .get(start..start + len)
        .ok_or(CatalogError::Truncated { ty, bit_offset })?;

    let value = match ty {
        Type::Boolean => Value::Bool(span[0] & (1u8 << (bit_offset % 8)) != 0),
        Type::Integer(_) | Type::Date | Type::DateTime => {
            let negative = span[len - 1] & 0x80 != 0;
            let mut buf = if negative { [0xffu8; 8] } else { [0u8; 8] };
            buf[..len].copy_from_slice(span);
            Value::Int(i64::from_le_bytes(buf))
        }
        Type::Float => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(span);
            Value::Float(f32::from_le_bytes(buf))
        }
        Type::Double => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(span);
            Value::Double(f64::from_le_bytes(buf))
        }
        Type::Char(_) => {
            let end = span.iter().position(|b| *b == 0).unwrap_or(span.len());
            let s = std::str::from_utf8(&span[..end])
                .map_err(|e| CatalogError::Corrupt(format!("invalid UTF-8 in CHAR: {}", e)))?;
            Value::Char(s.to_string())
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_bits_are_independent() {
        let mut buf = [0u8; 1];
        encode(Type::Boolean, &Value::Bool(true), &mut buf, 3).unwrap();
        encode(Type::Boolean, &Value::Bool(true), &mut buf, 5).unwrap();
        encode(Type::Boolean, &Value::Bool(false), &mut buf, 3).unwrap();
        assert_eq!(buf[0], 0b0010_0000);
        assert_eq!(decode(Type::Boolean, &buf, 5).unwrap(), Value::Bool(true));
        assert_eq!(decode(Type::Boolean, &buf, 3).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_negative_narrow_integer_sign_extends() {
        let mut buf = [0u8; 4];
        encode(Type::Integer(2), &Value::Int(-300), &mut buf, 16).unwrap();
        assert_eq!(decode(Type::Integer(2), &buf, 16).unwrap(), Value::Int(-300));
        assert_eq!(&buf[..2], &[0, 0]);
    }

    #[test]
    fn test_integer_range_checked() {
        let mut buf = [0u8; 1];
        let err = encode(Type::Integer(1), &Value::Int(200), &mut buf, 0).unwrap_err();
        assert!(matches!(err, CatalogError::ValueOutOfRange(_)));
        assert_eq!(buf, [0]);
    }

    #[test]
    fn test_char_is_zero_padded() {
        let mut buf = [0xAAu8; 6];
        encode(Type::Char(6), &Value::Char("Eve".into()), &mut buf, 0).unwrap();
        assert_eq!(&buf, b"Eve\0\0\0");
        assert_eq!(decode(Type::Char(6), &buf, 0).unwrap(), Value::Char("Eve".into()));
    }

    #[test]
    fn test_char_too_long() {
        let mut buf = [0u8; 2];
        assert!(encode(Type::Char(2), &Value::Char("abc".into()), &mut buf, 0).is_err());
    }

    #[test]
    fn test_double_little_endian() {
        let mut buf = [0u8; 16];
        encode(Type::Double, &Value::Double(75000.5), &mut buf, 64).unwrap();
        assert_eq!(&buf[8..], &75000.5f64.to_le_bytes());
    }

    #[test]
    fn test_unaligned_scalar_rejected() {
        let mut buf = [0u8; 8];
        assert!(encode(Type::Integer(4), &Value::Int(1), &mut buf, 4).is_err());
    }

    #[test]
    fn test_truncated_buffer() {
        let buf = [0u8; 3];
        let err = decode(Type::Integer(4), &buf, 0).unwrap_err();
        assert!(matches!(err, CatalogError::Truncated { .. }));
    }
}
