//! Name indexes over all compilation units of a module
//!
//! Built with one pass over every unit:
//! - named types (struct/class/union/enum tags, typedefs, base types)
//! - file-scope variables
//! - functions with their code ranges

use crate::module::{is_declaration, DwarfSections};
use gimli::{DwTag, UnitOffset};
use std::collections::HashMap;
use tracing::{debug, info};

/// Location of a DIE inside the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DieLoc {
    pub unit: usize,
    pub die: UnitOffset,
    pub tag: DwTag,
    pub is_declaration: bool,
}

/// A function with code in this module
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub name: String,
    pub loc: DieLoc,
    /// Link-time `[begin, end)` ranges
    pub ranges: Vec<(u64, u64)>,
}

impl FunctionEntry {
    pub fn contains(&self, pc: u64) -> bool {
        self.ranges.iter().any(|(lo, hi)| pc >= *lo && pc < *hi)
    }
}

/// Tag keyword a type name may be spelled with (`struct s_list`)
fn split_tag_keyword(name: &str) -> (Option<&'static [DwTag]>, &str) {
    const STRUCT: &[DwTag] = &[gimli::DW_TAG_structure_type, gimli::DW_TAG_class_type];
    const UNION: &[DwTag] = &[gimli::DW_TAG_union_type];
    const ENUM: &[DwTag] = &[gimli::DW_TAG_enumeration_type];
    let name = name.trim();
    for (keyword, tags) in [("struct ", STRUCT), ("union ", UNION), ("enum ", ENUM)] {
        if let Some(rest) = name.strip_prefix(keyword) {
            return (Some(tags), rest.trim());
        }
    }
    (None, name)
}

#[derive(Debug, Default)]
pub struct NameIndex {
    types: HashMap<String, Vec<DieLoc>>,
    globals: HashMap<String, Vec<DieLoc>>,
    functions: Vec<FunctionEntry>,
}

impl NameIndex {
    pub fn build(sections: &DwarfSections) -> Self {
        let mut index = Self::default();
        for (unit_index, unit) in sections.units() {
            let mut entries = unit.entries();
            let mut depth: isize = 0;
            while let Ok(Some((delta, entry))) = entries.next_dfs() {
                depth += delta;
                let tag = entry.tag();
                match tag {
                    gimli::DW_TAG_structure_type
                    | gimli::DW_TAG_class_type
                    | gimli::DW_TAG_union_type
                    | gimli::DW_TAG_enumeration_type
                    | gimli::DW_TAG_typedef
                    | gimli::DW_TAG_base_type => {
                        if let Some(name) = sections.entry_name(unit_index, entry) {
                            let loc = DieLoc {
                                unit: unit_index,
                                die: entry.offset(),
                                tag,
                                is_declaration: is_declaration(entry),
                            };
                            index.types.entry(name).or_default().push(loc);
                        }
                    }
                    gimli::DW_TAG_variable if depth == 1 => {
                        if let Some(name) = sections.entry_name_with_origin(unit_index, entry) {
                            let has_location = entry
                                .attr_value(gimli::DW_AT_location)
                                .ok()
                                .flatten()
                                .is_some();
                            let loc = DieLoc {
                                unit: unit_index,
                                die: entry.offset(),
                                tag,
                                is_declaration: !has_location,
                            };
                            index.globals.entry(name).or_default().push(loc);
                        }
                    }
                    gimli::DW_TAG_subprogram => {
                        let ranges = sections.entry_ranges(unit_index, entry);
                        if ranges.is_empty() {
                            continue;
                        }
                        let name = sections
                            .entry_name_with_origin(unit_index, entry)
                            .unwrap_or_else(|| "<anonymous>".to_string());
                        index.functions.push(FunctionEntry {
                            name,
                            loc: DieLoc {
                                unit: unit_index,
                                die: entry.offset(),
                                tag,
                                is_declaration: false,
                            },
                            ranges,
                        });
                    }
                    _ => {}
                }
            }
        }
        info!(
            "Indexed {} type names, {} globals, {} functions",
            index.types.len(),
            index.globals.len(),
            index.functions.len()
        );
        index
    }

    /// Find a type by name, preferring complete definitions.
    ///
    /// `struct x`, `union x` and `enum x` restrict the lookup to that tag.
    pub fn find_type(&self, name: &str) -> Option<DieLoc> {
        let (tags, bare) = split_tag_keyword(name);
        let candidates = self.types.get(bare)?;
        let wanted = |loc: &&DieLoc| tags.map(|t| t.contains(&loc.tag)).unwrap_or(true);
        let found = candidates
            .iter()
            .filter(wanted)
            .find(|loc| !loc.is_declaration)
            .or_else(|| candidates.iter().find(wanted))
            .copied();
        match found {
            Some(loc) => debug!("NameIndex: HIT type '{}' -> {:?}", name, loc),
            None => debug!("NameIndex: MISS type '{}'", name),
        }
        found
    }

    /// Find the definition of an aggregate by tag and name
    pub fn find_definition(&self, name: &str, tag: DwTag) -> Option<DieLoc> {
        self.types
            .get(name)?
            .iter()
            .find(|loc| loc.tag == tag && !loc.is_declaration)
            .copied()
    }

    /// Find a file-scope variable, preferring one with a location
    pub fn find_global(&self, name: &str) -> Option<DieLoc> {
        let candidates = self.globals.get(name)?;
        candidates
            .iter()
            .find(|loc| !loc.is_declaration)
            .or_else(|| candidates.first())
            .copied()
    }

    /// Innermost function whose code covers `pc` (link-time address)
    pub fn function_at(&self, pc: u64) -> Option<&FunctionEntry> {
        self.functions
            .iter()
            .filter(|f| f.contains(pc))
            .min_by_key(|f| f.ranges.iter().map(|(lo, hi)| hi - lo).sum::<u64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_keywords_are_split_off() {
        let (tags, name) = split_tag_keyword("struct s_list");
        assert_eq!(name, "s_list");
        assert_eq!(
            tags.map(|t| t.contains(&gimli::DW_TAG_structure_type)),
            Some(true)
        );
        let (tags, name) = split_tag_keyword(" t_content ");
        assert!(tags.is_none());
        assert_eq!(name, "t_content");
    }
}
