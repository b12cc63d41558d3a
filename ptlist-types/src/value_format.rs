//! Rendering of raw debuggee bytes
//!
//! Converts little-endian bytes read from the inspected process into scalars
//! and into the generic textual form a debugger shows for a value.

use crate::type_info::TypeInfo;
use gimli::constants as dw;

/// Scalar view of a value: raw bits plus how to widen them
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Scalar {
    pub fn as_signed(self) -> i64 {
        match self {
            Scalar::Signed(v) => v,
            Scalar::Unsigned(v) => v as i64,
            Scalar::Float(v) => v as i64,
        }
    }

    pub fn as_unsigned(self) -> u64 {
        match self {
            Scalar::Signed(v) => v as u64,
            Scalar::Unsigned(v) => v,
            Scalar::Float(v) => v as u64,
        }
    }
}

pub struct ValueFormatter;

impl ValueFormatter {
    /// Read `size` little-endian bytes as an unsigned integer (up to 8 bytes)
    pub fn read_unsigned(data: &[u8], size: usize) -> Option<u64> {
        if size == 0 || size > 8 || data.len() < size {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..size].copy_from_slice(&data[..size]);
        Some(u64::from_le_bytes(buf))
    }

    /// Read `size` little-endian bytes as a sign-extended integer
    pub fn read_signed(data: &[u8], size: usize) -> Option<i64> {
        let raw = Self::read_unsigned(data, size)?;
        Some(Self::sign_extend(raw, (size * 8) as u32))
    }

    fn sign_extend(raw: u64, bits: u32) -> i64 {
        if bits == 0 || bits >= 64 {
            return raw as i64;
        }
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }

    /// Extract `bit_size` bits starting at `bit_offset` (little-endian order)
    pub fn extract_bits_le(data: &[u8], bit_offset: u32, bit_size: u32) -> Option<u64> {
        if bit_size == 0 || bit_size > 64 {
            return None;
        }
        let bytes_needed = (bit_offset + bit_size).div_ceil(8) as usize;
        if bytes_needed > data.len() || bytes_needed > 16 {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[..bytes_needed].copy_from_slice(&data[..bytes_needed]);
        let wide = u128::from_le_bytes(buf);
        let mask: u128 = if bit_size == 64 {
            u64::MAX as u128
        } else {
            (1u128 << bit_size) - 1
        };
        Some(((wide >> bit_offset) & mask) as u64)
    }

    /// Scalar interpretation of `data` as `ty`, if the type is scalar
    pub fn scalar(data: &[u8], ty: &TypeInfo) -> Option<Scalar> {
        match ty.canonical() {
            TypeInfo::BaseType { size, encoding, .. } => {
                let size = *size as usize;
                let enc = gimli::DwAte(*encoding as u8);
                if enc == dw::DW_ATE_float {
                    return Self::read_float(data, size).map(Scalar::Float);
                }
                if ty.is_signed_int() {
                    Self::read_signed(data, size).map(Scalar::Signed)
                } else {
                    Self::read_unsigned(data, size).map(Scalar::Unsigned)
                }
            }
            TypeInfo::PointerType { size, .. } => {
                Self::read_unsigned(data, *size as usize).map(Scalar::Unsigned)
            }
            TypeInfo::EnumType {
                size, base_type, ..
            } => {
                if base_type.is_signed_int() {
                    Self::read_signed(data, *size as usize).map(Scalar::Signed)
                } else {
                    Self::read_unsigned(data, *size as usize).map(Scalar::Unsigned)
                }
            }
            TypeInfo::BitfieldType {
                underlying_type,
                bit_offset,
                bit_size,
            } => {
                let raw = Self::extract_bits_le(data, *bit_offset as u32, *bit_size as u32)?;
                if underlying_type.is_signed_int() {
                    Some(Scalar::Signed(Self::sign_extend(raw, *bit_size as u32)))
                } else {
                    Some(Scalar::Unsigned(raw))
                }
            }
            _ => None,
        }
    }

    fn read_float(data: &[u8], size: usize) -> Option<f64> {
        match size {
            4 if data.len() >= 4 => {
                let bytes: [u8; 4] = [data[0], data[1], data[2], data[3]];
                Some(f32::from_le_bytes(bytes) as f64)
            }
            8 if data.len() >= 8 => {
                let bytes: [u8; 8] = [
                    data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
                ];
                Some(f64::from_le_bytes(bytes))
            }
            _ => None,
        }
    }

    /// Generic textual value of `data` interpreted as `ty`.
    ///
    /// Aggregates, functions and unresolved types have no textual value.
    pub fn value_text(data: &[u8], ty: &TypeInfo) -> Option<String> {
        match ty.canonical() {
            TypeInfo::BaseType { size, encoding, .. } => {
                Self::format_base_type_data(data, *size, *encoding)
            }
            TypeInfo::PointerType { size, .. } => {
                Self::read_unsigned(data, *size as usize).map(|addr| format!("0x{addr:016x}"))
            }
            TypeInfo::EnumType { variants, .. } => {
                let value = Self::scalar(data, ty)?.as_signed();
                match variants.iter().find(|v| v.value == value) {
                    Some(variant) => Some(variant.name.clone()),
                    None => Some(value.to_string()),
                }
            }
            TypeInfo::BitfieldType {
                underlying_type, ..
            } => {
                let scalar = Self::scalar(data, ty)?;
                match underlying_type.canonical() {
                    TypeInfo::BaseType { encoding, .. }
                        if gimli::DwAte(*encoding as u8) == dw::DW_ATE_boolean =>
                    {
                        Some((scalar.as_unsigned() != 0).to_string())
                    }
                    _ => match scalar {
                        Scalar::Signed(v) => Some(v.to_string()),
                        Scalar::Unsigned(v) => Some(v.to_string()),
                        Scalar::Float(v) => Some(v.to_string()),
                    },
                }
            }
            _ => None,
        }
    }

    /// Format base type data using DWARF encoding information
    fn format_base_type_data(data: &[u8], size: u64, encoding: u16) -> Option<String> {
        let enc = gimli::DwAte(encoding as u8);
        let size = size as usize;
        if enc == dw::DW_ATE_boolean {
            let raw = Self::read_unsigned(data, size)?;
            Some((raw != 0).to_string())
        } else if enc == dw::DW_ATE_float {
            match size {
                4 if data.len() >= 4 => {
                    let bytes: [u8; 4] = [data[0], data[1], data[2], data[3]];
                    Some(f32::from_le_bytes(bytes).to_string())
                }
                8 => Self::read_float(data, 8).map(|v| v.to_string()),
                _ => None,
            }
        } else if enc == dw::DW_ATE_signed_char || enc == dw::DW_ATE_unsigned_char {
            if size == 1 {
                data.first().map(|b| Self::format_char(*b))
            } else if enc == dw::DW_ATE_signed_char {
                Self::read_signed(data, size).map(|v| v.to_string())
            } else {
                Self::read_unsigned(data, size).map(|v| v.to_string())
            }
        } else if enc == dw::DW_ATE_signed {
            Self::read_signed(data, size).map(|v| v.to_string())
        } else if enc == dw::DW_ATE_unsigned || enc == dw::DW_ATE_UTF || enc == dw::DW_ATE_address
        {
            Self::read_unsigned(data, size).map(|v| v.to_string())
        } else {
            None
        }
    }

    /// Render a single byte as a quoted C character literal
    pub fn format_char(byte: u8) -> String {
        match byte {
            b'\0' => "'\\0'".to_string(),
            b'\n' => "'\\n'".to_string(),
            b'\r' => "'\\r'".to_string(),
            b'\t' => "'\\t'".to_string(),
            b'\'' => "'\\''".to_string(),
            b'\\' => "'\\\\'".to_string(),
            0x20..=0x7e => format!("'{}'", byte as char),
            _ => format!("'\\x{byte:02x}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::{EnumVariant, TypeInfo};

    fn base(name: &str, size: u64, enc: gimli::DwAte) -> TypeInfo {
        TypeInfo::BaseType {
            name: name.to_string(),
            size,
            encoding: enc.0 as u16,
        }
    }

    #[test]
    fn integers_widen_by_signedness() {
        let int = base("int", 4, dw::DW_ATE_signed);
        let uint = base("unsigned int", 4, dw::DW_ATE_unsigned);
        let data = (-7i32).to_le_bytes();
        assert_eq!(
            ValueFormatter::scalar(&data, &int),
            Some(Scalar::Signed(-7))
        );
        assert_eq!(
            ValueFormatter::scalar(&data, &uint).map(Scalar::as_signed),
            Some(4294967289)
        );
        let ulong = base("long unsigned int", 8, dw::DW_ATE_unsigned);
        let max = u64::MAX.to_le_bytes();
        assert_eq!(
            ValueFormatter::scalar(&max, &ulong).map(Scalar::as_signed),
            Some(-1)
        );
    }

    #[test]
    fn value_text_for_common_kinds() {
        let ch = base("char", 1, dw::DW_ATE_signed_char);
        assert_eq!(
            ValueFormatter::value_text(b"a", &ch).as_deref(),
            Some("'a'")
        );
        assert_eq!(
            ValueFormatter::value_text(b"\n", &ch).as_deref(),
            Some("'\\n'")
        );

        let boolean = base("_Bool", 1, dw::DW_ATE_boolean);
        assert_eq!(
            ValueFormatter::value_text(&[1], &boolean).as_deref(),
            Some("true")
        );

        let float = base("float", 4, dw::DW_ATE_float);
        let data = 1.5f32.to_le_bytes();
        assert_eq!(
            ValueFormatter::value_text(&data, &float).as_deref(),
            Some("1.5")
        );

        let ptr = base("char", 1, dw::DW_ATE_signed_char).pointer_to();
        let data = 0x4010u64.to_le_bytes();
        assert_eq!(
            ValueFormatter::value_text(&data, &ptr).as_deref(),
            Some("0x0000000000004010")
        );
    }

    #[test]
    fn enum_text_prefers_variant_name() {
        let color = TypeInfo::EnumType {
            name: "e_color".to_string(),
            size: 4,
            base_type: Box::new(base("unsigned int", 4, dw::DW_ATE_unsigned)),
            variants: vec![
                EnumVariant {
                    name: "RED".to_string(),
                    value: 0,
                },
                EnumVariant {
                    name: "BLUE".to_string(),
                    value: 2,
                },
            ],
        };
        assert_eq!(
            ValueFormatter::value_text(&2u32.to_le_bytes(), &color).as_deref(),
            Some("BLUE")
        );
        assert_eq!(
            ValueFormatter::value_text(&5u32.to_le_bytes(), &color).as_deref(),
            Some("5")
        );
    }

    #[test]
    fn aggregates_have_no_text() {
        let s = TypeInfo::StructType {
            name: "s".to_string(),
            size: 4,
            members: Vec::new(),
        };
        assert_eq!(ValueFormatter::value_text(&[0; 4], &s), None);
    }

    #[test]
    fn signed_bitfield_sign_extends() {
        let bf = TypeInfo::BitfieldType {
            underlying_type: Box::new(base("int", 4, dw::DW_ATE_signed)),
            bit_offset: 1,
            bit_size: 3,
        };
        // bits 1..=3 hold 0b111
        let data = [0b0000_1110u8, 0, 0, 0];
        assert_eq!(
            ValueFormatter::value_text(&data, &bf).as_deref(),
            Some("-1")
        );
    }
}
