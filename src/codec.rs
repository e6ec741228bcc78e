//! Row-buffer codec.
//!
//! Each column of a row message is described by a [`ColumnDescriptor`]
//! (type tag, payload length, value offset, null-indicator offset). All
//! conversions between buffer bytes and application scalars live here,
//! dispatched on the type tag, so the statement's field and parameter
//! accessors stay thin.
//!
//! Reads are infallible by design: a set null indicator yields the getter's
//! sentinel (0 / 0.0 / empty string), malformed numeric text in a character
//! column reads as zero, and a read that falls outside the buffer behaves
//! like NULL. Writes validate the type pairing and report
//! [`Error::InvalidBinding`] on a mismatch.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ember_engine::{ColumnMetadata, SqlType};

use crate::error::{Error, Result};

/// Days between 0001-01-01 (chrono's day 1) and the engine's calendar
/// epoch, 1858-11-17 (modified Julian day 0).
const EPOCH_DAYS_FROM_CE: i32 = 678_576;

/// Time-of-day fractions per second in a timestamp payload.
const FRACTIONS_PER_SECOND: u32 = 10_000;

/// Binary layout of one field or parameter.
///
/// Pure metadata: descriptors never own memory; reads and writes go through
/// the owning statement's buffers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnDescriptor {
   pub sql_type: SqlType,
   pub length: usize,
   pub offset: usize,
   pub null_offset: usize,
}

impl ColumnDescriptor {
   /// Builds a descriptor from engine metadata, masking the nullability
   /// bit off the raw type. Codes this driver does not marshal degrade to
   /// [`SqlType::Null`] (reads yield sentinels, writes are rejected).
   pub(crate) fn from_metadata(column: &ColumnMetadata) -> Self {
      Self {
         sql_type: SqlType::from_raw(column.raw_type).unwrap_or(SqlType::Null),
         length: column.length,
         offset: column.offset,
         null_offset: column.null_offset,
      }
   }
}

fn read_bytes<const N: usize>(buffer: &[u8], offset: usize) -> [u8; N] {
   let mut out = [0u8; N];
   if let Some(src) = buffer.get(offset..offset + N) {
      out.copy_from_slice(src);
   }
   out
}

fn write_bytes(buffer: &mut [u8], offset: usize, bytes: &[u8]) {
   if let Some(dst) = buffer.get_mut(offset..offset + bytes.len()) {
      dst.copy_from_slice(bytes);
   }
}

fn read_i16(buffer: &[u8], offset: usize) -> i16 {
   i16::from_le_bytes(read_bytes(buffer, offset))
}

fn read_i32(buffer: &[u8], offset: usize) -> i32 {
   i32::from_le_bytes(read_bytes(buffer, offset))
}

fn read_i64(buffer: &[u8], offset: usize) -> i64 {
   i64::from_le_bytes(read_bytes(buffer, offset))
}

fn read_f32(buffer: &[u8], offset: usize) -> f32 {
   f32::from_le_bytes(read_bytes(buffer, offset))
}

fn read_f64(buffer: &[u8], offset: usize) -> f64 {
   f64::from_le_bytes(read_bytes(buffer, offset))
}

/// Raw character payload of a Text or Varying column.
///
/// Varying columns honor the stored 2-byte length prefix, clamped to the
/// declared length.
fn character_payload<'a>(descriptor: &ColumnDescriptor, buffer: &'a [u8]) -> &'a [u8] {
   let (start, len) = match descriptor.sql_type {
      SqlType::Text => (descriptor.offset, descriptor.length),
      SqlType::Varying => {
         let stored = u16::from_le_bytes(read_bytes(buffer, descriptor.offset)) as usize;
         (descriptor.offset + 2, stored.min(descriptor.length))
      }
      _ => return &[],
   };
   buffer.get(start..start + len).unwrap_or(&[])
}

/// Permissive text-to-integer conversion: malformed text reads as zero.
fn parse_integer(text: &str) -> i64 {
   text.trim().parse().unwrap_or(0)
}

/// Permissive text-to-double conversion: malformed text reads as zero.
fn parse_double(text: &str) -> f64 {
   text.trim().parse().unwrap_or(0.0)
}

/// True when the column's null indicator is set.
pub(crate) fn is_null(descriptor: &ColumnDescriptor, buffer: &[u8]) -> bool {
   read_i16(buffer, descriptor.null_offset) != 0
}

/// Reads the column as a 64-bit integer. NULL reads as 0; floating values
/// truncate; character values parse permissively.
pub(crate) fn read_integer(descriptor: &ColumnDescriptor, buffer: &[u8]) -> i64 {
   if is_null(descriptor, buffer) {
      return 0;
   }

   match descriptor.sql_type {
      SqlType::Short => read_i16(buffer, descriptor.offset) as i64,
      SqlType::Long => read_i32(buffer, descriptor.offset) as i64,
      SqlType::Int64 => read_i64(buffer, descriptor.offset),
      SqlType::Float => read_f32(buffer, descriptor.offset) as i64,
      SqlType::Double => read_f64(buffer, descriptor.offset) as i64,
      SqlType::Text | SqlType::Varying => {
         parse_integer(&String::from_utf8_lossy(character_payload(descriptor, buffer)))
      }
      SqlType::Date | SqlType::Timestamp | SqlType::Null => 0,
   }
}

/// Reads the column as a double. NULL reads as 0.0.
pub(crate) fn read_double(descriptor: &ColumnDescriptor, buffer: &[u8]) -> f64 {
   if is_null(descriptor, buffer) {
      return 0.0;
   }

   match descriptor.sql_type {
      SqlType::Short => read_i16(buffer, descriptor.offset) as f64,
      SqlType::Long => read_i32(buffer, descriptor.offset) as f64,
      SqlType::Int64 => read_i64(buffer, descriptor.offset) as f64,
      SqlType::Float => read_f32(buffer, descriptor.offset) as f64,
      SqlType::Double => read_f64(buffer, descriptor.offset),
      SqlType::Text | SqlType::Varying => {
         parse_double(&String::from_utf8_lossy(character_payload(descriptor, buffer)))
      }
      SqlType::Date | SqlType::Timestamp | SqlType::Null => 0.0,
   }
}

/// Reads the column as a string. NULL reads as an empty string; numeric
/// values render in decimal; Text columns keep their space padding.
pub(crate) fn read_string(descriptor: &ColumnDescriptor, buffer: &[u8]) -> String {
   if is_null(descriptor, buffer) {
      return String::new();
   }

   match descriptor.sql_type {
      SqlType::Text | SqlType::Varying => {
         String::from_utf8_lossy(character_payload(descriptor, buffer)).into_owned()
      }
      SqlType::Short => read_i16(buffer, descriptor.offset).to_string(),
      SqlType::Long => read_i32(buffer, descriptor.offset).to_string(),
      SqlType::Int64 => read_i64(buffer, descriptor.offset).to_string(),
      SqlType::Float => read_f32(buffer, descriptor.offset).to_string(),
      SqlType::Double => read_f64(buffer, descriptor.offset).to_string(),
      SqlType::Date | SqlType::Timestamp | SqlType::Null => String::new(),
   }
}

/// Decodes a Date or Timestamp column and renders it with a strftime-style
/// format string. Non-temporal columns, undecodable payloads, and format
/// patterns the value cannot satisfy all yield an empty string.
pub(crate) fn format_temporal(
   descriptor: &ColumnDescriptor,
   buffer: &[u8],
   format: &str,
) -> String {
   if is_null(descriptor, buffer) {
      return String::new();
   }

   match descriptor.sql_type {
      SqlType::Date => match decode_date(read_i32(buffer, descriptor.offset)) {
         Some(date) => render(date.format(format)),
         None => String::new(),
      },
      SqlType::Timestamp => {
         let days = read_i32(buffer, descriptor.offset);
         let fractions = u32::from_le_bytes(read_bytes(buffer, descriptor.offset + 4));
         match decode_timestamp(days, fractions) {
            Some(timestamp) => render(timestamp.format(format)),
            None => String::new(),
         }
      }
      _ => String::new(),
   }
}

/// Renders a delayed chrono format. Formatting fails on an invalid pattern
/// or on a field the value does not carry (time-of-day on a plain date);
/// both read as empty rather than panicking through `Display`.
fn render(value: impl std::fmt::Display) -> String {
   use std::fmt::Write;

   let mut out = String::new();
   match write!(out, "{value}") {
      Ok(()) => out,
      Err(_) => String::new(),
   }
}

/// Modified Julian day to calendar date.
fn decode_date(days: i32) -> Option<NaiveDate> {
   NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
}

/// Day-plus-fraction timestamp to a broken-down date and time.
fn decode_timestamp(days: i32, fractions: u32) -> Option<NaiveDateTime> {
   let date = decode_date(days)?;
   let seconds = fractions / FRACTIONS_PER_SECOND;
   let nanos = (fractions % FRACTIONS_PER_SECOND) * 100_000;
   let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos)?;
   Some(NaiveDateTime::new(date, time))
}

/// Writes an integer parameter, clearing the null indicator.
pub(crate) fn write_integer(
   descriptor: &ColumnDescriptor,
   buffer: &mut [u8],
   value: i64,
) -> Result<()> {
   match descriptor.sql_type {
      SqlType::Short => write_bytes(buffer, descriptor.offset, &(value as i16).to_le_bytes()),
      SqlType::Long => write_bytes(buffer, descriptor.offset, &(value as i32).to_le_bytes()),
      SqlType::Int64 => write_bytes(buffer, descriptor.offset, &value.to_le_bytes()),
      other => {
         return Err(Error::InvalidBinding {
            value_kind: "integer",
            column: other,
         });
      }
   }
   write_bytes(buffer, descriptor.null_offset, &0i16.to_le_bytes());
   Ok(())
}

/// Writes a floating-point parameter, clearing the null indicator.
///
/// Integer targets round halves toward positive infinity, matching the
/// engine client's historical `floor(v + 0.5)` coercion.
pub(crate) fn write_double(
   descriptor: &ColumnDescriptor,
   buffer: &mut [u8],
   value: f64,
) -> Result<()> {
   let rounded = (value + 0.5).floor();
   match descriptor.sql_type {
      SqlType::Float => write_bytes(buffer, descriptor.offset, &(value as f32).to_le_bytes()),
      SqlType::Double => write_bytes(buffer, descriptor.offset, &value.to_le_bytes()),
      SqlType::Short => write_bytes(buffer, descriptor.offset, &(rounded as i16).to_le_bytes()),
      SqlType::Long => write_bytes(buffer, descriptor.offset, &(rounded as i32).to_le_bytes()),
      SqlType::Int64 => write_bytes(buffer, descriptor.offset, &(rounded as i64).to_le_bytes()),
      other => {
         return Err(Error::InvalidBinding {
            value_kind: "floating-point",
            column: other,
         });
      }
   }
   write_bytes(buffer, descriptor.null_offset, &0i16.to_le_bytes());
   Ok(())
}

/// Writes a text parameter, clearing the null indicator.
///
/// Text columns are space-padded to the declared length; Varying columns
/// store the byte length as the 2-byte prefix. A value longer than the
/// declared length is a caller contract violation.
pub(crate) fn write_text(
   descriptor: &ColumnDescriptor,
   buffer: &mut [u8],
   value: &str,
) -> Result<()> {
   let bytes = value.as_bytes();
   assert!(
      bytes.len() <= descriptor.length,
      "text parameter of {} bytes exceeds declared column length {}",
      bytes.len(),
      descriptor.length
   );

   match descriptor.sql_type {
      SqlType::Text => {
         write_bytes(buffer, descriptor.offset, bytes);
         let padding = descriptor.length - bytes.len();
         if padding > 0 {
            write_bytes(
               buffer,
               descriptor.offset + bytes.len(),
               &vec![b' '; padding],
            );
         }
      }
      SqlType::Varying => {
         write_bytes(buffer, descriptor.offset, &(bytes.len() as u16).to_le_bytes());
         write_bytes(buffer, descriptor.offset + 2, bytes);
      }
      other => {
         return Err(Error::InvalidBinding {
            value_kind: "text",
            column: other,
         });
      }
   }
   write_bytes(buffer, descriptor.null_offset, &0i16.to_le_bytes());
   Ok(())
}

/// Sets the null indicator; the payload bytes are left untouched and must
/// not be interpreted by the engine.
pub(crate) fn write_null(descriptor: &ColumnDescriptor, buffer: &mut [u8]) {
   write_bytes(buffer, descriptor.null_offset, &1i16.to_le_bytes());
}

#[cfg(test)]
mod tests {
   use super::*;

   fn descriptor(sql_type: SqlType, length: usize) -> ColumnDescriptor {
      // Payload at 0, null indicator after it.
      ColumnDescriptor {
         sql_type,
         length,
         offset: 0,
         null_offset: length.max(8),
      }
   }

   fn buffer_for(descriptor: &ColumnDescriptor) -> Vec<u8> {
      vec![0u8; descriptor.null_offset + 2]
   }

   #[test]
   fn integer_round_trips_per_width() {
      for (sql_type, length, value) in [
         (SqlType::Short, 2, -1234i64),
         (SqlType::Long, 4, 1_000_000i64),
         (SqlType::Int64, 8, -9_000_000_000i64),
      ] {
         let d = descriptor(sql_type, length);
         let mut buf = buffer_for(&d);
         write_integer(&d, &mut buf, value).unwrap();
         assert_eq!(read_integer(&d, &buf), value);
         assert!(!is_null(&d, &buf));
      }
   }

   #[test]
   fn double_round_trips_per_width() {
      let d = descriptor(SqlType::Double, 8);
      let mut buf = buffer_for(&d);
      write_double(&d, &mut buf, 3.5).unwrap();
      assert_eq!(read_double(&d, &buf), 3.5);

      let d = descriptor(SqlType::Float, 4);
      let mut buf = buffer_for(&d);
      write_double(&d, &mut buf, 2.25).unwrap();
      assert_eq!(read_double(&d, &buf), 2.25);
   }

   #[test]
   fn double_to_integer_column_rounds_halves_up() {
      let d = descriptor(SqlType::Long, 4);
      let mut buf = buffer_for(&d);
      write_double(&d, &mut buf, 2.5).unwrap();
      assert_eq!(read_integer(&d, &buf), 3);
      write_double(&d, &mut buf, 2.4).unwrap();
      assert_eq!(read_integer(&d, &buf), 2);
      // floor(v + 0.5): negative halves go up too, -2.5 lands on -2.
      write_double(&d, &mut buf, -2.5).unwrap();
      assert_eq!(read_integer(&d, &buf), -2);
   }

   #[test]
   fn fixed_text_is_space_padded() {
      let d = descriptor(SqlType::Text, 6);
      let mut buf = buffer_for(&d);
      write_text(&d, &mut buf, "AB").unwrap();
      assert_eq!(read_string(&d, &buf), "AB    ");
   }

   #[test]
   fn varying_text_respects_the_stored_prefix() {
      let d = descriptor(SqlType::Varying, 10);
      let mut buf = buffer_for(&d);
      write_text(&d, &mut buf, "hello").unwrap();
      assert_eq!(read_string(&d, &buf), "hello");
      assert_eq!(u16::from_le_bytes([buf[0], buf[1]]), 5);
   }

   #[test]
   fn varying_prefix_is_clamped_to_declared_length() {
      let d = descriptor(SqlType::Varying, 4);
      let mut buf = buffer_for(&d);
      // Corrupt prefix claiming more than the declared length.
      buf[0..2].copy_from_slice(&100u16.to_le_bytes());
      buf[2..6].copy_from_slice(b"abcd");
      assert_eq!(read_string(&d, &buf), "abcd");
   }

   #[test]
   #[should_panic(expected = "exceeds declared column length")]
   fn over_long_text_write_is_a_contract_violation() {
      let d = descriptor(SqlType::Text, 2);
      let mut buf = buffer_for(&d);
      let _ = write_text(&d, &mut buf, "toolong");
   }

   #[test]
   fn null_indicator_dominates_prior_contents() {
      let d = descriptor(SqlType::Long, 4);
      let mut buf = buffer_for(&d);
      write_integer(&d, &mut buf, 42).unwrap();
      write_null(&d, &mut buf);
      assert!(is_null(&d, &buf));
      assert_eq!(read_integer(&d, &buf), 0);
      assert_eq!(read_double(&d, &buf), 0.0);
      assert_eq!(read_string(&d, &buf), "");
      // Payload bytes stay untouched.
      assert_eq!(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 42);
   }

   #[test]
   fn setters_clear_a_previous_null() {
      let d = descriptor(SqlType::Long, 4);
      let mut buf = buffer_for(&d);
      write_null(&d, &mut buf);
      write_integer(&d, &mut buf, 7).unwrap();
      assert!(!is_null(&d, &buf));
      assert_eq!(read_integer(&d, &buf), 7);
   }

   #[test]
   fn numeric_text_parses_permissively() {
      let d = descriptor(SqlType::Varying, 16);
      let mut buf = buffer_for(&d);
      write_text(&d, &mut buf, " 123 ").unwrap();
      assert_eq!(read_integer(&d, &buf), 123);
      assert_eq!(read_double(&d, &buf), 123.0);

      write_text(&d, &mut buf, "not a number").unwrap();
      assert_eq!(read_integer(&d, &buf), 0);
      assert_eq!(read_double(&d, &buf), 0.0);
   }

   #[test]
   fn numeric_columns_render_as_strings() {
      let d = descriptor(SqlType::Int64, 8);
      let mut buf = buffer_for(&d);
      write_integer(&d, &mut buf, -99).unwrap();
      assert_eq!(read_string(&d, &buf), "-99");
   }

   #[test]
   fn float_column_reads_as_integer_by_truncation() {
      let d = descriptor(SqlType::Double, 8);
      let mut buf = buffer_for(&d);
      write_double(&d, &mut buf, 9.9).unwrap();
      assert_eq!(read_integer(&d, &buf), 9);
   }

   #[test]
   fn type_mismatched_writes_are_invalid_bindings() {
      let d = descriptor(SqlType::Text, 8);
      let mut buf = buffer_for(&d);
      assert!(matches!(
         write_integer(&d, &mut buf, 1),
         Err(Error::InvalidBinding { value_kind: "integer", .. })
      ));
      assert!(matches!(
         write_double(&d, &mut buf, 1.0),
         Err(Error::InvalidBinding { value_kind: "floating-point", .. })
      ));

      let d = descriptor(SqlType::Long, 4);
      assert!(matches!(
         write_text(&d, &mut buf, "x"),
         Err(Error::InvalidBinding { value_kind: "text", .. })
      ));
   }

   #[test]
   fn date_decodes_from_modified_julian_day() {
      // MJD 58849 = 2020-01-01.
      let d = descriptor(SqlType::Date, 4);
      let mut buf = buffer_for(&d);
      buf[0..4].copy_from_slice(&58849i32.to_le_bytes());
      assert_eq!(format_temporal(&d, &buf, "%Y-%m-%d"), "2020-01-01");
   }

   #[test]
   fn timestamp_decodes_day_and_fraction_parts() {
      let d = descriptor(SqlType::Timestamp, 8);
      let mut buf = buffer_for(&d);
      buf[0..4].copy_from_slice(&58849i32.to_le_bytes());
      // 13:30:05 = 48605 seconds since midnight.
      buf[4..8].copy_from_slice(&(48_605u32 * FRACTIONS_PER_SECOND).to_le_bytes());
      assert_eq!(
         format_temporal(&d, &buf, "%Y-%m-%d %H:%M:%S"),
         "2020-01-01 13:30:05"
      );
   }

   #[test]
   fn unusable_format_patterns_yield_empty_strings() {
      let d = descriptor(SqlType::Date, 4);
      let mut buf = buffer_for(&d);
      buf[0..4].copy_from_slice(&58849i32.to_le_bytes());
      assert_eq!(format_temporal(&d, &buf, "%Q"), "");
      // Time-of-day fields do not exist on a plain date.
      assert_eq!(format_temporal(&d, &buf, "%H:%M"), "");
      assert_eq!(format_temporal(&d, &buf, "%Y-%m-%d"), "2020-01-01");
   }

   #[test]
   fn format_date_on_non_temporal_column_is_empty() {
      let d = descriptor(SqlType::Long, 4);
      let mut buf = buffer_for(&d);
      write_integer(&d, &mut buf, 1).unwrap();
      assert_eq!(format_temporal(&d, &buf, "%Y-%m-%d"), "");
   }
}
