//! Column file binary format and file-naming helpers.
//!
//! A column file is a plain concatenation of entries, one per row that
//! supplied the attribute, in strictly ascending row-id order:
//!
//! ```text
//! bool     row_id (u64 LE) | flag (u8, 0/1)                    9 bytes
//! int64    row_id (u64 LE) | value (i64 LE)                   16 bytes
//! float64  row_id (u64 LE) | IEEE-754 bits (u64 LE)           16 bytes
//! str      row_id (u64 LE) | len (u16 LE) | bytes[len]   10 + len bytes
//! ```
//!
//! There is no header, footer or checksum; the file name carries the type.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::value::{ColumnType, Value};
use crate::{ColumnError, RowId};

/// Extension shared by every file in a store directory.
pub const EXTENSION: &str = "dat";

/// Size of the row-id prefix of every entry.
pub const ROW_ID_BYTES: usize = 8;

/// Longest string the 16-bit length field can describe.
pub const MAX_STR_BYTES: usize = u16::MAX as usize;

/// Returns the encoded size of `value`, including the row-id prefix.
pub fn encoded_len(value: &Value) -> usize {
    ROW_ID_BYTES
        + match value {
            Value::Bool(_) => 1,
            Value::Int64(_) | Value::Float64(_) => 8,
            Value::Str(s) => 2 + s.len(),
        }
}

/// Encodes one `(row_id, value)` entry for a column of type `column_type`.
///
/// No widening happens here: a value whose kind differs from the column
/// type is rejected with [`ColumnError::TypeMismatch`].
pub fn encode_entry<W: Write>(
    w: &mut W,
    row_id: RowId,
    value: &Value,
    column_type: ColumnType,
) -> Result<(), ColumnError> {
    if value.column_type() != column_type {
        return Err(ColumnError::TypeMismatch {
            expected: column_type,
            found: value.column_type(),
        });
    }
    if let Value::Str(s) = value {
        if s.len() > MAX_STR_BYTES {
            return Err(ColumnError::ValueTooLarge { len: s.len() });
        }
    }

    w.write_u64::<LittleEndian>(row_id)?;
    match value {
        Value::Bool(b) => w.write_u8(u8::from(*b))?,
        Value::Int64(i) => w.write_i64::<LittleEndian>(*i)?,
        Value::Float64(f) => w.write_u64::<LittleEndian>(f.to_bits())?,
        Value::Str(s) => {
            w.write_u16::<LittleEndian>(s.len() as u16)?;
            w.write_all(s.as_bytes())?;
        }
    }
    Ok(())
}

/// Encodes one entry into a freshly allocated buffer.
pub fn encode_entry_to_vec(
    row_id: RowId,
    value: &Value,
    column_type: ColumnType,
) -> Result<Vec<u8>, ColumnError> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    encode_entry(&mut buf, row_id, value, column_type)?;
    Ok(buf)
}

/// Decodes the next entry from `r`.
///
/// Returns `Ok(None)` on a clean end of stream (no bytes left at an entry
/// boundary) and [`ColumnError::Truncated`] when the stream ends inside an
/// entry.
pub fn decode_entry<R: Read>(
    r: &mut R,
    column_type: ColumnType,
) -> Result<Option<(RowId, Value)>, ColumnError> {
    let mut head = [0u8; ROW_ID_BYTES];
    match read_full(r, &mut head)? {
        0 => return Ok(None),
        ROW_ID_BYTES => {}
        _ => return Err(ColumnError::Truncated),
    }
    let row_id = LittleEndian::read_u64(&head);

    let value = match column_type {
        ColumnType::Bool => match r.read_u8().map_err(truncated)? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            byte => return Err(ColumnError::InvalidBool { row_id, byte }),
        },
        ColumnType::Int64 => Value::Int64(r.read_i64::<LittleEndian>().map_err(truncated)?),
        ColumnType::Float64 => Value::Float64(f64::from_bits(
            r.read_u64::<LittleEndian>().map_err(truncated)?,
        )),
        ColumnType::Str => {
            let len = r.read_u16::<LittleEndian>().map_err(truncated)? as usize;
            let mut bytes = vec![0u8; len];
            r.read_exact(&mut bytes).map_err(truncated)?;
            Value::Str(String::from_utf8(bytes).map_err(|_| ColumnError::InvalidUtf8 { row_id })?)
        }
    };
    Ok(Some((row_id, value)))
}

/// Like `read_exact`, but reports how many bytes were available before EOF
/// instead of failing.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn truncated(e: io::Error) -> ColumnError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ColumnError::Truncated
    } else {
        ColumnError::Io(e)
    }
}

/// Builds the on-disk file name for a column: `<name>.<suffix>.dat`.
pub fn file_name(column: &str, column_type: ColumnType) -> String {
    format!("{}.{}.{}", column, column_type.suffix(), EXTENSION)
}

/// Parses a directory entry name back into `(column, type)`.
///
/// Names without the `.dat` extension are not ours and yield `Ok(None)`.
/// A `.dat` name that does not follow `<name>.<suffix>.dat`, or whose suffix
/// is unknown, is an error: the directory is corrupt or foreign.
pub fn parse_file_name(file: &str) -> Result<Option<(String, ColumnType)>, ColumnError> {
    let Some(stem) = file.strip_suffix(EXTENSION).and_then(|s| s.strip_suffix('.')) else {
        return Ok(None);
    };
    let (column, suffix) = match stem.split_once('.') {
        Some((column, suffix)) if !column.is_empty() && !suffix.contains('.') => (column, suffix),
        _ => {
            return Err(ColumnError::InvalidFileName {
                file: file.to_owned(),
            })
        }
    };
    let column_type = ColumnType::from_suffix(suffix).ok_or_else(|| ColumnError::UnknownSuffix {
        file: file.to_owned(),
        suffix: suffix.to_owned(),
    })?;
    Ok(Some((column.to_owned(), column_type)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode_one(bytes: &[u8], t: ColumnType) -> Result<Option<(RowId, Value)>, ColumnError> {
        decode_entry(&mut Cursor::new(bytes), t)
    }

    // -------------------- Layout --------------------

    #[test]
    fn bool_layout() {
        let buf = encode_entry_to_vec(3, &Value::Bool(true), ColumnType::Bool).unwrap();
        assert_eq!(buf, vec![3, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn int64_layout_is_twos_complement() {
        let buf = encode_entry_to_vec(1, &Value::Int64(-2), ColumnType::Int64).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[..8], &1u64.to_le_bytes());
        assert_eq!(&buf[8..], &(-2i64).to_le_bytes());
    }

    #[test]
    fn float64_layout_is_ieee_bits() {
        let buf = encode_entry_to_vec(0, &Value::Float64(1.5), ColumnType::Float64).unwrap();
        assert_eq!(&buf[8..], &1.5f64.to_bits().to_le_bytes());
    }

    #[test]
    fn str_layout_has_u16_length_prefix() {
        let buf = encode_entry_to_vec(9, &Value::from("abc"), ColumnType::Str).unwrap();
        assert_eq!(buf.len(), 13);
        assert_eq!(&buf[8..10], &[3, 0]);
        assert_eq!(&buf[10..], b"abc");
        assert_eq!(encoded_len(&Value::from("abc")), 13);
    }

    // -------------------- Round trips --------------------

    #[test]
    fn decode_inverts_encode() {
        let cases = [
            (0, Value::Bool(false)),
            (1, Value::Bool(true)),
            (2, Value::Int64(i64::MIN)),
            (3, Value::Int64(i64::MAX)),
            (4, Value::Float64(-0.25)),
            (5, Value::Float64(f64::INFINITY)),
            (6, Value::from("")),
            (7, Value::from("héllo")),
            (u64::MAX, Value::Int64(42)),
        ];
        for (row_id, value) in cases {
            let t = value.column_type();
            let buf = encode_entry_to_vec(row_id, &value, t).unwrap();
            assert_eq!(decode_one(&buf, t).unwrap(), Some((row_id, value)));
        }
    }

    #[test]
    fn max_length_string_fits() {
        let s = "x".repeat(MAX_STR_BYTES);
        let buf = encode_entry_to_vec(0, &Value::from(s.clone()), ColumnType::Str).unwrap();
        assert_eq!(decode_one(&buf, ColumnType::Str).unwrap(), Some((0, Value::Str(s))));
    }

    #[test]
    fn consecutive_entries_decode_in_order() {
        let mut buf = Vec::new();
        for i in 0..3u64 {
            encode_entry(&mut buf, i * 2, &Value::Int64(i as i64), ColumnType::Int64).unwrap();
        }
        let mut cur = Cursor::new(buf);
        for i in 0..3u64 {
            let (row, v) = decode_entry(&mut cur, ColumnType::Int64).unwrap().unwrap();
            assert_eq!(row, i * 2);
            assert_eq!(v, Value::Int64(i as i64));
        }
        assert!(decode_entry(&mut cur, ColumnType::Int64).unwrap().is_none());
    }

    // -------------------- Encode errors --------------------

    #[test]
    fn string_over_u16_is_too_large() {
        let s = "x".repeat(MAX_STR_BYTES + 1);
        let err = encode_entry_to_vec(0, &Value::Str(s), ColumnType::Str).unwrap_err();
        assert!(matches!(err, ColumnError::ValueTooLarge { len } if len == MAX_STR_BYTES + 1));
    }

    #[test]
    fn no_widening_at_encode_time() {
        let err = encode_entry_to_vec(0, &Value::Int64(1), ColumnType::Float64).unwrap_err();
        assert!(matches!(
            err,
            ColumnError::TypeMismatch {
                expected: ColumnType::Float64,
                found: ColumnType::Int64
            }
        ));
    }

    // -------------------- Decode edge cases --------------------

    #[test]
    fn empty_stream_is_clean_eof() {
        assert!(decode_one(&[], ColumnType::Bool).unwrap().is_none());
    }

    #[test]
    fn partial_row_id_is_truncated() {
        let err = decode_one(&[1, 2, 3], ColumnType::Int64).unwrap_err();
        assert!(matches!(err, ColumnError::Truncated));
    }

    #[test]
    fn partial_string_body_is_truncated() {
        let mut buf = encode_entry_to_vec(0, &Value::from("abcdef"), ColumnType::Str).unwrap();
        buf.truncate(buf.len() - 2);
        let err = decode_one(&buf, ColumnType::Str).unwrap_err();
        assert!(matches!(err, ColumnError::Truncated));
    }

    #[test]
    fn non_utf8_string_is_rejected() {
        let mut buf = 4u64.to_le_bytes().to_vec();
        buf.extend_from_slice(&[2, 0, 0xff, 0xfe]);
        let err = decode_one(&buf, ColumnType::Str).unwrap_err();
        assert!(matches!(err, ColumnError::InvalidUtf8 { row_id: 4 }));
    }

    #[test]
    fn bool_flag_other_than_zero_or_one_is_rejected() {
        let mut buf = 7u64.to_le_bytes().to_vec();
        buf.push(2);
        let err = decode_one(&buf, ColumnType::Bool).unwrap_err();
        assert!(matches!(err, ColumnError::InvalidBool { row_id: 7, byte: 2 }));
    }

    // -------------------- File names --------------------

    #[test]
    fn file_name_round_trip() {
        for t in ColumnType::ALL {
            let name = file_name("temp", t);
            assert_eq!(parse_file_name(&name).unwrap(), Some(("temp".to_owned(), t)));
        }
        assert_eq!(file_name("val", ColumnType::Str), "val.str.dat");
    }

    #[test]
    fn foreign_extension_is_ignored() {
        assert_eq!(parse_file_name("notes.txt").unwrap(), None);
        assert_eq!(parse_file_name("val.int64.dat.tmp").unwrap(), None);
    }

    #[test]
    fn unknown_suffix_is_an_error() {
        let err = parse_file_name("val.uint8.dat").unwrap_err();
        assert!(matches!(err, ColumnError::UnknownSuffix { suffix, .. } if suffix == "uint8"));
    }

    #[test]
    fn malformed_dat_name_is_an_error() {
        for bad in ["val.dat", "a.b.int64.dat", ".int64.dat"] {
            assert!(
                matches!(parse_file_name(bad), Err(ColumnError::InvalidFileName { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
