//! Loaded DWARF sections and parsed unit headers of one module

use crate::core::{DwarfReader, Result};
use gimli::{
    AttributeValue, DebugInfoOffset, DebuggingInformationEntry, Reader, RunTimeEndian, UnitOffset,
};
use object::{Object, ObjectSection};
use ptlist_types::TypeRef;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, warn};

pub type Unit = gimli::Unit<DwarfReader>;
pub type Entry<'abbrev, 'unit> = DebuggingInformationEntry<'abbrev, 'unit, DwarfReader>;

/// DWARF of one module with all compilation units parsed up front
pub struct DwarfSections {
    dwarf: gimli::Dwarf<DwarfReader>,
    units: Vec<Unit>,
    /// `.debug_info` offset of each unit header, ascending
    unit_offsets: Vec<u64>,
}

impl std::fmt::Debug for DwarfSections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DwarfSections")
            .field("units", &self.units.len())
            .finish()
    }
}

impl DwarfSections {
    /// Load DWARF sections from a parsed object file
    pub fn load(object: &object::File<'_>) -> Result<Self> {
        let endian = if object.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        Self::from_loader(endian, |name| {
            object
                .section_by_name(name)
                .and_then(|section| section.uncompressed_data().ok())
        })
    }

    /// Load DWARF sections through `section_data`, which maps a section name
    /// (`.debug_info`, ...) to its bytes. Missing sections are empty.
    pub fn from_loader<'data, F>(endian: RunTimeEndian, mut section_data: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<Cow<'data, [u8]>>,
    {
        let load_section = |id: gimli::SectionId| -> gimli::Result<DwarfReader> {
            let data = section_data(id.name()).unwrap_or(Cow::Borrowed(&[]));
            Ok(gimli::EndianArcSlice::new(Arc::from(data.as_ref()), endian))
        };
        let dwarf = gimli::Dwarf::load(load_section)?;

        let mut units = Vec::new();
        let mut unit_offsets = Vec::new();
        let mut headers = dwarf.units();
        while let Some(header) = headers.next()? {
            let Some(offset) = header.offset().as_debug_info_offset() else {
                continue;
            };
            match dwarf.unit(header) {
                Ok(unit) => {
                    unit_offsets.push(offset.0 as u64);
                    units.push(unit);
                }
                Err(e) => warn!("Skipping unit at 0x{:x}: {}", offset.0, e),
            }
        }
        debug!("Loaded {} compilation units", units.len());

        Ok(Self {
            dwarf,
            units,
            unit_offsets,
        })
    }

    pub fn dwarf(&self) -> &gimli::Dwarf<DwarfReader> {
        &self.dwarf
    }

    pub fn unit(&self, index: usize) -> Option<&Unit> {
        self.units.get(index)
    }

    pub fn units(&self) -> impl Iterator<Item = (usize, &Unit)> {
        self.units.iter().enumerate()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Stable reference to a DIE, usable as a cache key
    pub fn type_ref(&self, unit: usize, die: UnitOffset) -> Option<TypeRef> {
        Some(TypeRef {
            unit: *self.unit_offsets.get(unit)?,
            die: die.0 as u64,
        })
    }

    /// Unit index and DIE offset behind a `TypeRef`
    pub fn resolve_ref(&self, type_ref: TypeRef) -> Option<(usize, UnitOffset)> {
        let index = self.unit_offsets.binary_search(&type_ref.unit).ok()?;
        Some((index, UnitOffset(type_ref.die as usize)))
    }

    /// Unit index and unit-relative offset of a section offset
    pub fn locate(&self, offset: DebugInfoOffset) -> Option<(usize, UnitOffset)> {
        let index = match self.unit_offsets.binary_search(&(offset.0 as u64)) {
            Ok(i) => i,
            Err(0) => return None,
            Err(i) => i - 1,
        };
        let unit = self.units.get(index)?;
        offset
            .to_unit_offset(&unit.header)
            .map(|unit_offset| (index, unit_offset))
    }

    /// Target of a reference attribute (`DW_AT_type`, `DW_AT_specification`, ...)
    pub fn reference_target(
        &self,
        unit: usize,
        value: AttributeValue<DwarfReader>,
    ) -> Option<(usize, UnitOffset)> {
        match value {
            AttributeValue::UnitRef(offset) => Some((unit, offset)),
            AttributeValue::DebugInfoRef(offset) => self.locate(offset),
            _ => None,
        }
    }

    /// Target of `attr` on `entry`
    pub fn attr_target(
        &self,
        unit: usize,
        entry: &Entry<'_, '_>,
        attr: gimli::DwAt,
    ) -> Option<(usize, UnitOffset)> {
        let value = entry.attr_value(attr).ok().flatten()?;
        self.reference_target(unit, value)
    }

    /// String value of `DW_AT_name`
    pub fn entry_name(&self, unit: usize, entry: &Entry<'_, '_>) -> Option<String> {
        let unit_ref = self.unit(unit)?;
        let value = entry.attr_value(gimli::DW_AT_name).ok().flatten()?;
        let name = self.dwarf.attr_string(unit_ref, value).ok()?;
        let name = name.to_string_lossy().ok()?.into_owned();
        Some(name)
    }

    /// Name of `entry`, following `DW_AT_specification` / `DW_AT_abstract_origin`
    pub fn entry_name_with_origin(&self, unit: usize, entry: &Entry<'_, '_>) -> Option<String> {
        if let Some(name) = self.entry_name(unit, entry) {
            return Some(name);
        }
        let (origin_unit, origin) = self.origin_of(unit, entry)?;
        let origin_entry = self.unit(origin_unit)?.entry(origin).ok()?;
        self.entry_name(origin_unit, &origin_entry)
    }

    /// Declaration this DIE completes or instantiates
    pub fn origin_of(&self, unit: usize, entry: &Entry<'_, '_>) -> Option<(usize, UnitOffset)> {
        self.attr_target(unit, entry, gimli::DW_AT_specification)
            .or_else(|| self.attr_target(unit, entry, gimli::DW_AT_abstract_origin))
    }

    /// Offsets of the direct children of the DIE at `offset`
    pub fn children(&self, unit: usize, offset: UnitOffset) -> Vec<UnitOffset> {
        let mut out = Vec::new();
        let Some(unit) = self.unit(unit) else {
            return out;
        };
        let Ok(mut tree) = unit.entries_tree(Some(offset)) else {
            return out;
        };
        let Ok(root) = tree.root() else {
            return out;
        };
        let mut children = root.children();
        while let Ok(Some(child)) = children.next() {
            out.push(child.entry().offset());
        }
        out
    }

    /// Address ranges covered by `entry` (low/high pc or `DW_AT_ranges`)
    pub fn entry_ranges(&self, unit: usize, entry: &Entry<'_, '_>) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        let Some(unit) = self.unit(unit) else {
            return out;
        };
        if let Ok(mut ranges) = self.dwarf.die_ranges(unit, entry) {
            while let Ok(Some(range)) = ranges.next() {
                if range.begin < range.end {
                    out.push((range.begin, range.end));
                }
            }
        }
        out
    }
}

pub fn is_declaration(entry: &Entry<'_, '_>) -> bool {
    matches!(
        entry.attr_value(gimli::DW_AT_declaration),
        Ok(Some(AttributeValue::Flag(true)))
    )
}

pub fn attr_udata(entry: &Entry<'_, '_>, attr: gimli::DwAt) -> Option<u64> {
    entry.attr(attr).ok().flatten()?.udata_value()
}
