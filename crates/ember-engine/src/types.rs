//! Wire type tags for row-message columns.

/// Column type as classified from the engine's raw wire code.
///
/// The engine reports each column's type as a raw code whose lowest bit is
/// the nullability flag; [`SqlType::from_raw`] masks that bit off before
/// classification, so a descriptor's tag never carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
   /// Fixed-width character data, space-padded to the declared length.
   Text,
   /// Variable-width character data with a 2-byte length prefix.
   Varying,
   /// 16-bit signed integer.
   Short,
   /// 32-bit signed integer.
   Long,
   /// 64-bit signed integer.
   Int64,
   /// 32-bit IEEE float.
   Float,
   /// 64-bit IEEE float.
   Double,
   /// Calendar date (modified Julian day).
   Date,
   /// Date plus time-of-day in 100-microsecond fractions.
   Timestamp,
   /// The engine's explicit NULL type.
   Null,
}

impl SqlType {
   pub const RAW_TEXT: u16 = 452;
   pub const RAW_VARYING: u16 = 448;
   pub const RAW_SHORT: u16 = 500;
   pub const RAW_LONG: u16 = 496;
   pub const RAW_FLOAT: u16 = 482;
   pub const RAW_DOUBLE: u16 = 480;
   pub const RAW_TIMESTAMP: u16 = 510;
   pub const RAW_DATE: u16 = 570;
   pub const RAW_INT64: u16 = 580;
   pub const RAW_NULL: u16 = 32766;

   /// Classifies a raw wire code, masking off the nullability bit.
   ///
   /// Returns `None` for codes this driver does not marshal.
   pub fn from_raw(raw: u16) -> Option<Self> {
      match raw & !1 {
         Self::RAW_TEXT => Some(Self::Text),
         Self::RAW_VARYING => Some(Self::Varying),
         Self::RAW_SHORT => Some(Self::Short),
         Self::RAW_LONG => Some(Self::Long),
         Self::RAW_INT64 => Some(Self::Int64),
         Self::RAW_FLOAT => Some(Self::Float),
         Self::RAW_DOUBLE => Some(Self::Double),
         Self::RAW_DATE => Some(Self::Date),
         Self::RAW_TIMESTAMP => Some(Self::Timestamp),
         Self::RAW_NULL => Some(Self::Null),
         _ => None,
      }
   }

   /// The raw wire code without the nullability bit.
   pub fn raw(self) -> u16 {
      match self {
         Self::Text => Self::RAW_TEXT,
         Self::Varying => Self::RAW_VARYING,
         Self::Short => Self::RAW_SHORT,
         Self::Long => Self::RAW_LONG,
         Self::Int64 => Self::RAW_INT64,
         Self::Float => Self::RAW_FLOAT,
         Self::Double => Self::RAW_DOUBLE,
         Self::Date => Self::RAW_DATE,
         Self::Timestamp => Self::RAW_TIMESTAMP,
         Self::Null => Self::RAW_NULL,
      }
   }

   pub fn is_integer(self) -> bool {
      matches!(self, Self::Short | Self::Long | Self::Int64)
   }

   pub fn is_floating(self) -> bool {
      matches!(self, Self::Float | Self::Double)
   }

   pub fn is_character(self) -> bool {
      matches!(self, Self::Text | Self::Varying)
   }

   pub fn is_temporal(self) -> bool {
      matches!(self, Self::Date | Self::Timestamp)
   }
}
