//! # Parameter Conversion Module
//!
//! Coerces the flat string multi-map of a request into whatever parameter
//! type a capability declares. The conversion is a serde [`Deserializer`]
//! over [`Parameters`], so any `Deserialize` type works:
//!
//! - records: named fields are looked up by parameter name, unknown names ignored
//! - scalars: numbers, booleans and chars are parsed from their string form
//! - `Option<T>`: absent (or empty) parameters become `None`
//! - sequences: repeated names (`?tag=a&tag=b`) or a comma separated value (`?tag=a,b`)
//! - unit `()`: accepts any parameters
//! - enums: unit variants by name
//! - nested records: a parameter holding JSON text (`?filter={"age":3}`)
//!
//! A lone parameter also converts directly into a scalar (`?id=7` into `u64`).
//!
//! ```rust
//! use brrtrest::convert::from_parameters;
//! use brrtrest::metadata::Parameters;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Paging {
//!     limit: u32,
//!     offset: Option<u32>,
//! }
//!
//! let params = Parameters::new().with("limit", "10");
//! let paging: Paging = from_parameters(&params).unwrap();
//! assert_eq!(paging.limit, 10);
//! assert_eq!(paging.offset, None);
//! ```

use crate::metadata::Parameters;
use crate::result::Failure;
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::Deserializer;
use std::fmt;

/// Parameters could not be converted into the declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertError {
    message: String,
}

impl ConvertError {
    fn invalid(name: &str, value: &str, expected: &str) -> Self {
        Self {
            message: format!("parameter '{name}': cannot convert '{value}' to {expected}"),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `BadRequest` failure reported for this conversion error.
    #[must_use]
    pub fn to_failure(&self) -> Failure {
        Failure::bad_request(serde_json::json!({
            "error": "invalid parameters",
            "message": self.message,
        }))
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConvertError {}

impl de::Error for ConvertError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self {
            message: msg.to_string(),
        }
    }
}

/// Convert request parameters into `T`.
pub fn from_parameters<T: DeserializeOwned>(params: &Parameters) -> Result<T, ConvertError> {
    T::deserialize(ParametersDeserializer::new(params))
}

/// Parameters grouped by name, in order of first appearance.
fn group(params: &Parameters) -> Vec<(&str, Vec<&str>)> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for (name, value) in params.iter() {
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => groups.push((name, vec![value])),
        }
    }
    groups
}

struct ParametersDeserializer<'a> {
    groups: Vec<(&'a str, Vec<&'a str>)>,
}

impl<'a> ParametersDeserializer<'a> {
    fn new(params: &'a Parameters) -> Self {
        Self {
            groups: group(params),
        }
    }

    fn single(mut self) -> Result<ValuesDeserializer<'a>, ConvertError> {
        if self.groups.len() != 1 {
            return Err(de::Error::custom(format!(
                "expected exactly one parameter, found {}",
                self.groups.len()
            )));
        }
        let (name, values) = self.groups.remove(0);
        Ok(ValuesDeserializer { name, values })
    }

    fn into_map(self) -> GroupedMap<'a> {
        GroupedMap {
            iter: self.groups.into_iter(),
            pending: None,
        }
    }
}

macro_rules! forward_to_single {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                self.single()?.$method(visitor)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ParametersDeserializer<'de> {
    type Error = ConvertError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_map(self.into_map())
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_map(self.into_map())
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_map(self.into_map())
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.groups.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.single()?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.single()?.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.single()?.deserialize_seq(visitor)
    }

    forward_to_single! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_seq deserialize_identifier
    }
}

struct GroupedMap<'a> {
    iter: std::vec::IntoIter<(&'a str, Vec<&'a str>)>,
    pending: Option<ValuesDeserializer<'a>>,
}

impl<'de> MapAccess<'de> for GroupedMap<'de> {
    type Error = ConvertError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.iter.next() {
            Some((name, values)) => {
                self.pending = Some(ValuesDeserializer { name, values });
                seed.deserialize(BorrowedStrDeserializer::new(name)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        match self.pending.take() {
            Some(values) => seed.deserialize(values),
            None => Err(de::Error::custom("value requested before key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// All values given for one parameter name.
struct ValuesDeserializer<'a> {
    name: &'a str,
    values: Vec<&'a str>,
}

impl<'a> ValuesDeserializer<'a> {
    /// Last value wins for scalar targets, matching `Parameters::get`.
    fn last(&self) -> ValueDeserializer<'a> {
        ValueDeserializer {
            name: self.name,
            value: self.values.last().copied().unwrap_or_default(),
        }
    }

    fn items(self) -> ValueSeq<'a> {
        let items: Vec<&'a str> = if self.values.len() == 1 {
            split_list(self.values[0])
        } else {
            self.values
        };
        ValueSeq {
            name: self.name,
            iter: items.into_iter(),
        }
    }
}

fn split_list(value: &str) -> Vec<&str> {
    if value.is_empty() {
        Vec::new()
    } else {
        value.split(',').map(str::trim).collect()
    }
}

macro_rules! forward_to_last {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                self.last().$method(visitor)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ValuesDeserializer<'de> {
    type Error = ConvertError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.values.len() == 1 {
            self.last().deserialize_any(visitor)
        } else {
            visitor.visit_seq(ValueSeq {
                name: self.name,
                iter: self.values.into_iter(),
            })
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self.items())
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self.items())
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self.items())
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.last().deserialize_enum(name, variants, visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.last().deserialize_struct(name, fields, visitor)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    forward_to_last! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_option deserialize_unit
        deserialize_map deserialize_identifier deserialize_ignored_any
    }
}

struct ValueSeq<'a> {
    name: &'a str,
    iter: std::vec::IntoIter<&'a str>,
}

impl<'de> SeqAccess<'de> for ValueSeq<'de> {
    type Error = ConvertError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        match self.iter.next() {
            Some(value) => seed
                .deserialize(ValueDeserializer {
                    name: self.name,
                    value,
                })
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// One string value, parsed on demand into the requested type.
struct ValueDeserializer<'a> {
    name: &'a str,
    value: &'a str,
}

impl<'a> ValueDeserializer<'a> {
    fn parse<T: std::str::FromStr>(&self, expected: &str) -> Result<T, ConvertError> {
        self.value
            .trim()
            .parse::<T>()
            .map_err(|_| ConvertError::invalid(self.name, self.value, expected))
    }

    fn json(&self) -> serde_json::Deserializer<serde_json::de::StrRead<'a>> {
        serde_json::Deserializer::from_str(self.value)
    }

    fn json_error(&self, err: serde_json::Error) -> ConvertError {
        de::Error::custom(format!("parameter '{}': {}", self.name, err))
    }
}

macro_rules! parse_number {
    ($($method:ident => $visit:ident : $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                visitor.$visit(self.parse::<$ty>(stringify!($ty))?)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ValueDeserializer<'de> {
    type Error = ConvertError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.value)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => visitor.visit_bool(true),
            "false" | "0" | "no" | "off" => visitor.visit_bool(false),
            _ => Err(ConvertError::invalid(self.name, self.value, "bool")),
        }
    }

    parse_number! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
        deserialize_char => visit_char: char,
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.value)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.value)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.value)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_bytes(self.value.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_bytes(self.value.as_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.value.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(ValueSeq {
            name: self.name,
            iter: split_list(self.value).into_iter(),
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let mut json = self.json();
        (&mut json)
            .deserialize_map(visitor)
            .map_err(|e| self.json_error(e))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let mut json = self.json();
        (&mut json)
            .deserialize_struct(name, fields, visitor)
            .map_err(|e| self.json_error(e))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        BorrowedStrDeserializer::<ConvertError>::new(self.value)
            .deserialize_enum(name, variants, visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}
