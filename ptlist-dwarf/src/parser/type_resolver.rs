//! DWARF type resolution utilities

use crate::core::DwarfReader;
use crate::module::{attr_udata, is_declaration, DwarfSections, Entry};
use gimli::{AttributeValue, Operation, UnitOffset};
use ptlist_types::{EnumVariant, StructMember, TypeInfo, TypeQualifier, TypeRef};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// DWARF type resolver for parsing and caching type information.
///
/// A type that is reached again while it is still being resolved (the
/// `next` pointer of a list node) becomes a `TypeInfo::DeferredType`, as does
/// an aggregate that is only declared in its unit. Callers expand deferred
/// types on demand.
#[derive(Debug, Default)]
pub struct TypeResolver {
    type_cache: HashMap<TypeRef, Option<TypeInfo>>,
    in_progress: HashSet<TypeRef>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_count(&self) -> usize {
        self.type_cache.len()
    }

    /// Resolve the type DIE at `offset` in unit `unit`
    pub fn resolve(
        &mut self,
        sections: &DwarfSections,
        unit: usize,
        offset: UnitOffset,
    ) -> Option<TypeInfo> {
        let key = sections.type_ref(unit, offset)?;
        if let Some(cached) = self.type_cache.get(&key) {
            return cached.clone();
        }

        let entry = match sections.unit(unit)?.entry(offset) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Failed to read type entry at {:?}: {}", offset, e);
                self.type_cache.insert(key, None);
                return None;
            }
        };

        let is_aggregate = matches!(
            entry.tag(),
            gimli::DW_TAG_structure_type
                | gimli::DW_TAG_class_type
                | gimli::DW_TAG_union_type
                | gimli::DW_TAG_enumeration_type
        );
        if self.in_progress.contains(&key) || (is_aggregate && is_declaration(&entry)) {
            return Some(TypeInfo::DeferredType {
                name: Self::display_name(sections, unit, &entry),
                type_ref: key,
            });
        }

        self.in_progress.insert(key);
        let resolved = match entry.tag() {
            gimli::DW_TAG_base_type => Self::parse_base_type(sections, unit, &entry),
            gimli::DW_TAG_pointer_type
            | gimli::DW_TAG_reference_type
            | gimli::DW_TAG_rvalue_reference_type => {
                Some(self.parse_pointer_type(sections, unit, &entry))
            }
            gimli::DW_TAG_array_type => Some(self.parse_array_type(sections, unit, &entry)),
            gimli::DW_TAG_structure_type | gimli::DW_TAG_class_type => {
                Some(self.parse_aggregate(sections, unit, &entry, false))
            }
            gimli::DW_TAG_union_type => Some(self.parse_aggregate(sections, unit, &entry, true)),
            gimli::DW_TAG_enumeration_type => Some(self.parse_enum_type(sections, unit, &entry)),
            gimli::DW_TAG_typedef => Some(TypeInfo::TypedefType {
                name: sections.entry_name(unit, &entry).unwrap_or_default(),
                underlying_type: Box::new(self.referenced_type(sections, unit, &entry)),
            }),
            gimli::DW_TAG_const_type
            | gimli::DW_TAG_volatile_type
            | gimli::DW_TAG_restrict_type => {
                let qualifier = match entry.tag() {
                    gimli::DW_TAG_const_type => TypeQualifier::Const,
                    gimli::DW_TAG_volatile_type => TypeQualifier::Volatile,
                    _ => TypeQualifier::Restrict,
                };
                Some(TypeInfo::QualifiedType {
                    qualifier,
                    underlying_type: Box::new(self.referenced_type(sections, unit, &entry)),
                })
            }
            gimli::DW_TAG_subroutine_type => Some(self.parse_function_type(sections, unit, &entry)),
            gimli::DW_TAG_unspecified_type => Some(TypeInfo::UnknownType {
                name: sections
                    .entry_name(unit, &entry)
                    .unwrap_or_else(|| "void".to_string()),
            }),
            other => {
                debug!("Unsupported type tag: {:?}", other);
                None
            }
        };
        self.in_progress.remove(&key);
        self.type_cache.insert(key, resolved.clone());
        resolved
    }

    /// Type named by `DW_AT_type` of `entry`; a missing attribute means `void`
    pub fn referenced_type(
        &mut self,
        sections: &DwarfSections,
        unit: usize,
        entry: &Entry<'_, '_>,
    ) -> TypeInfo {
        match sections.attr_target(unit, entry, gimli::DW_AT_type) {
            Some((target_unit, offset)) => self
                .resolve(sections, target_unit, offset)
                .unwrap_or(TypeInfo::UnknownType {
                    name: "unknown".to_string(),
                }),
            None if entry.attr_value(gimli::DW_AT_type).ok().flatten().is_some() => {
                TypeInfo::UnknownType {
                    name: "unknown".to_string(),
                }
            }
            None => TypeInfo::UnknownType {
                name: "void".to_string(),
            },
        }
    }

    /// Name a debugger would print for the type at `entry`
    pub fn display_name(sections: &DwarfSections, unit: usize, entry: &Entry<'_, '_>) -> String {
        let name = sections
            .entry_name(unit, entry)
            .unwrap_or_else(|| "<anonymous>".to_string());
        match entry.tag() {
            gimli::DW_TAG_structure_type | gimli::DW_TAG_class_type => format!("struct {name}"),
            gimli::DW_TAG_union_type => format!("union {name}"),
            gimli::DW_TAG_enumeration_type => format!("enum {name}"),
            _ => name,
        }
    }

    fn parse_base_type(
        sections: &DwarfSections,
        unit: usize,
        entry: &Entry<'_, '_>,
    ) -> Option<TypeInfo> {
        let size = attr_udata(entry, gimli::DW_AT_byte_size).unwrap_or(0);
        let encoding = match entry.attr_value(gimli::DW_AT_encoding).ok().flatten() {
            Some(AttributeValue::Encoding(enc)) => enc,
            _ => gimli::DW_ATE_signed,
        };
        let name = sections
            .entry_name(unit, entry)
            .unwrap_or_else(|| format!("unknown_base_type_{size}"));
        Some(TypeInfo::BaseType {
            name,
            size,
            encoding: encoding.0 as u16,
        })
    }

    fn parse_pointer_type(
        &mut self,
        sections: &DwarfSections,
        unit: usize,
        entry: &Entry<'_, '_>,
    ) -> TypeInfo {
        let size = attr_udata(entry, gimli::DW_AT_byte_size)
            .or_else(|| sections.unit(unit).map(|u| u.header.address_size() as u64))
            .unwrap_or(ptlist_types::DEFAULT_POINTER_SIZE);
        TypeInfo::PointerType {
            target_type: Box::new(self.referenced_type(sections, unit, entry)),
            size,
        }
    }

    fn parse_array_type(
        &mut self,
        sections: &DwarfSections,
        unit: usize,
        entry: &Entry<'_, '_>,
    ) -> TypeInfo {
        let element = self.referenced_type(sections, unit, entry);
        let mut element_count = None;

        // Only the outermost dimension is counted; inner ones stay in element_type
        let unit_ref = sections.unit(unit);
        for child in sections.children(unit, entry.offset()) {
            let Some(child) = unit_ref.and_then(|u| u.entry(child).ok()) else {
                continue;
            };
            if child.tag() != gimli::DW_TAG_subrange_type {
                continue;
            }
            if let Some(count) = attr_udata(&child, gimli::DW_AT_count) {
                element_count = Some(count);
            } else if let Some(upper) = child
                .attr(gimli::DW_AT_upper_bound)
                .ok()
                .flatten()
                .and_then(|a| a.sdata_value().or(a.udata_value().map(|v| v as i64)))
            {
                let lower = child
                    .attr(gimli::DW_AT_lower_bound)
                    .ok()
                    .flatten()
                    .and_then(|a| a.sdata_value())
                    .unwrap_or(0);
                element_count = Some(upper.saturating_sub(lower).saturating_add(1).max(0) as u64);
            }
            break;
        }

        let total_size = attr_udata(entry, gimli::DW_AT_byte_size)
            .or_else(|| element_count.map(|n| n.saturating_mul(element.size())));
        TypeInfo::ArrayType {
            element_type: Box::new(element),
            element_count,
            total_size,
        }
    }

    fn parse_aggregate(
        &mut self,
        sections: &DwarfSections,
        unit: usize,
        entry: &Entry<'_, '_>,
        is_union: bool,
    ) -> TypeInfo {
        let size = attr_udata(entry, gimli::DW_AT_byte_size).unwrap_or(0);
        let name = sections
            .entry_name(unit, entry)
            .unwrap_or_else(|| format!("<anonymous_{size}>"));

        let mut members = Vec::new();
        let unit_ref = sections.unit(unit);
        for child in sections.children(unit, entry.offset()) {
            let Some(child) = unit_ref.and_then(|u| u.entry(child).ok()) else {
                continue;
            };
            if child.tag() == gimli::DW_TAG_member {
                members.push(self.parse_member(sections, unit, &child));
            }
        }

        if is_union {
            TypeInfo::UnionType {
                name,
                size,
                members,
            }
        } else {
            TypeInfo::StructType {
                name,
                size,
                members,
            }
        }
    }

    fn parse_member(
        &mut self,
        sections: &DwarfSections,
        unit: usize,
        entry: &Entry<'_, '_>,
    ) -> StructMember {
        let name = sections.entry_name(unit, entry).unwrap_or_default();
        let member_type = self.referenced_type(sections, unit, entry);

        let mut offset = match entry.attr_value(gimli::DW_AT_data_member_location) {
            Ok(Some(AttributeValue::Exprloc(expr))) => sections
                .unit(unit)
                .and_then(|u| Self::eval_member_offset(expr, u.encoding()))
                .unwrap_or(0),
            Ok(Some(value)) => value.udata_value().unwrap_or(0),
            _ => 0,
        };

        let bit_size = attr_udata(entry, gimli::DW_AT_bit_size).and_then(|v| u8::try_from(v).ok());
        let mut bit_offset = None;
        if let Some(bits) = bit_size {
            let data_bits = attr_udata(entry, gimli::DW_AT_data_bit_offset);
            let msb_bits = attr_udata(entry, gimli::DW_AT_bit_offset);
            let total_bits = match (data_bits, msb_bits) {
                (Some(data_bits), _) => Some(data_bits),
                (None, Some(msb_bits)) => {
                    // Counted from the most significant bit of the storage unit
                    let storage_bytes = attr_udata(entry, gimli::DW_AT_byte_size)
                        .unwrap_or_else(|| member_type.size());
                    (storage_bytes * 8)
                        .checked_sub(msb_bits + bits as u64)
                        .map(|lsb| offset * 8 + lsb)
                }
                (None, None) => None,
            };
            let total_bits = total_bits.unwrap_or(offset * 8);
            offset = total_bits / 8;
            bit_offset = Some((total_bits % 8) as u8);
        }

        let member_type = match (bit_size, bit_offset) {
            (Some(bit_size), Some(bit_offset)) => TypeInfo::BitfieldType {
                underlying_type: Box::new(member_type),
                bit_offset,
                bit_size,
            },
            _ => member_type,
        };

        StructMember {
            name,
            member_type,
            offset,
            bit_offset,
            bit_size,
        }
    }

    fn parse_enum_type(
        &mut self,
        sections: &DwarfSections,
        unit: usize,
        entry: &Entry<'_, '_>,
    ) -> TypeInfo {
        let size = attr_udata(entry, gimli::DW_AT_byte_size).unwrap_or(4);
        let name = sections
            .entry_name(unit, entry)
            .unwrap_or_else(|| format!("<anonymous_{size}>"));
        let base_type = match sections.attr_target(unit, entry, gimli::DW_AT_type) {
            Some((target_unit, offset)) => self.resolve(sections, target_unit, offset),
            None => None,
        }
        .unwrap_or(TypeInfo::BaseType {
            name: "int".to_string(),
            size,
            encoding: gimli::DW_ATE_signed.0 as u16,
        });

        let mut variants = Vec::new();
        let mut last_value: Option<i64> = None;
        let unit_ref = sections.unit(unit);
        for child in sections.children(unit, entry.offset()) {
            let Some(child) = unit_ref.and_then(|u| u.entry(child).ok()) else {
                continue;
            };
            if child.tag() != gimli::DW_TAG_enumerator {
                continue;
            }
            let value = match child.attr_value(gimli::DW_AT_const_value).ok().flatten() {
                Some(AttributeValue::Sdata(v)) => Some(v),
                Some(AttributeValue::Udata(v)) => Some(v as i64),
                Some(AttributeValue::Data1(v)) => Some(v as i8 as i64),
                Some(AttributeValue::Data2(v)) => Some(v as i16 as i64),
                Some(AttributeValue::Data4(v)) => Some(v as i32 as i64),
                Some(AttributeValue::Data8(v)) => Some(v as i64),
                _ => None,
            }
            .unwrap_or_else(|| last_value.map(|v| v + 1).unwrap_or(0));
            last_value = Some(value);
            variants.push(EnumVariant {
                name: sections
                    .entry_name(unit, &child)
                    .unwrap_or_else(|| format!("variant_{}", variants.len())),
                value,
            });
        }

        TypeInfo::EnumType {
            name,
            size,
            base_type: Box::new(base_type),
            variants,
        }
    }

    fn parse_function_type(
        &mut self,
        sections: &DwarfSections,
        unit: usize,
        entry: &Entry<'_, '_>,
    ) -> TypeInfo {
        let return_type = sections
            .attr_target(unit, entry, gimli::DW_AT_type)
            .and_then(|(target_unit, offset)| self.resolve(sections, target_unit, offset))
            .map(Box::new);

        let mut parameters = Vec::new();
        let unit_ref = sections.unit(unit);
        for child in sections.children(unit, entry.offset()) {
            let Some(child) = unit_ref.and_then(|u| u.entry(child).ok()) else {
                continue;
            };
            if child.tag() == gimli::DW_TAG_formal_parameter {
                parameters.push(self.referenced_type(sections, unit, &child));
            }
        }
        TypeInfo::FunctionType {
            return_type,
            parameters,
        }
    }

    /// Evaluate a `DW_AT_data_member_location` expression to a constant offset
    fn eval_member_offset(
        expr: gimli::Expression<DwarfReader>,
        encoding: gimli::Encoding,
    ) -> Option<u64> {
        let mut ops = expr.operations(encoding);
        let mut offset = 0u64;
        while let Ok(Some(op)) = ops.next() {
            match op {
                Operation::PlusConstant { value } => offset = offset.wrapping_add(value),
                Operation::UnsignedConstant { value } => offset = value,
                Operation::SignedConstant { value } => offset = value as u64,
                _ => return None,
            }
        }
        Some(offset)
    }
}
