//! Symbol queries over one module's DWARF: types by name, variables visible
//! at a pc, and functions covering a pc.

use crate::core::Result;
use crate::data::{DieLoc, FunctionEntry, NameIndex};
use crate::module::{self, is_declaration, DwarfSections, Entry, LoadOptions};
use crate::parser::{FrameBase, TypeResolver, VariableLocation};
use gimli::{AttributeValue, UnitOffset};
use ptlist_types::{TypeInfo, TypeRef};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A variable found in the debug information
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub type_info: TypeInfo,
    pub location: VariableLocation,
    /// Frame base of the enclosing function, for frame-relative locations
    pub frame_base: FrameBase,
}

/// A function covering some pc
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    pub unit: usize,
    pub die: UnitOffset,
    pub frame_base: FrameBase,
}

/// DWARF analyzer for one module
pub struct DwarfAnalyzer {
    binary_path: PathBuf,
    debug_path: PathBuf,
    sections: DwarfSections,
    index: NameIndex,
    resolver: RefCell<TypeResolver>,
}

impl std::fmt::Debug for DwarfAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DwarfAnalyzer")
            .field("binary_path", &self.binary_path)
            .field("debug_path", &self.debug_path)
            .finish()
    }
}

impl DwarfAnalyzer {
    /// Load and index the DWARF of `binary_path`
    pub fn load(binary_path: &Path, options: &LoadOptions) -> Result<Self> {
        let loaded = module::load_dwarf(binary_path, options)?;
        let mut analyzer = Self::from_sections(loaded.sections);
        analyzer.binary_path = loaded.binary_path;
        analyzer.debug_path = loaded.debug_path;
        info!(
            "Loaded DWARF for {} from {}",
            analyzer.binary_path.display(),
            analyzer.debug_path.display()
        );
        Ok(analyzer)
    }

    /// Index already loaded sections
    pub fn from_sections(sections: DwarfSections) -> Self {
        let index = NameIndex::build(&sections);
        Self {
            binary_path: PathBuf::new(),
            debug_path: PathBuf::new(),
            sections,
            index,
            resolver: RefCell::new(TypeResolver::new()),
        }
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn debug_path(&self) -> &Path {
        &self.debug_path
    }

    pub fn sections(&self) -> &DwarfSections {
        &self.sections
    }

    fn resolve(&self, unit: usize, die: UnitOffset) -> Option<TypeInfo> {
        self.resolver
            .borrow_mut()
            .resolve(&self.sections, unit, die)
    }

    fn entry(&self, unit: usize, die: UnitOffset) -> Option<Entry<'_, '_>> {
        self.sections.unit(unit)?.entry(die).ok()
    }

    /// Find a type by name (`t_content`, `struct s_list`, `int`, ...)
    pub fn find_type(&self, name: &str) -> Option<TypeInfo> {
        let loc = self.index.find_type(name)?;
        let ty = self.resolve(loc.unit, loc.die)?;
        match ty {
            TypeInfo::DeferredType { type_ref, .. } => self.complete_type(type_ref),
            other => Some(other),
        }
    }

    /// Expand a deferred type.
    ///
    /// Declarations are completed from a definition of the same name anywhere
    /// in the module.
    pub fn complete_type(&self, type_ref: TypeRef) -> Option<TypeInfo> {
        let (unit, die) = self.sections.resolve_ref(type_ref)?;
        let entry = self.entry(unit, die)?;
        if is_declaration(&entry) {
            let name = self.sections.entry_name(unit, &entry)?;
            let def = self.index.find_definition(&name, entry.tag())?;
            debug!("Completing declaration of '{}' from {:?}", name, def);
            return self.resolve(def.unit, def.die);
        }
        self.resolve(unit, die)
    }

    /// Function covering the link-time `pc`
    pub fn function_at(&self, pc: u64) -> Option<FunctionInfo> {
        let entry = self.index.function_at(pc)?;
        Some(self.function_info(entry))
    }

    fn function_info(&self, function: &FunctionEntry) -> FunctionInfo {
        let DieLoc { unit, die, .. } = function.loc;
        let frame_base = self
            .entry(unit, die)
            .and_then(|entry| entry.attr_value(gimli::DW_AT_frame_base).ok().flatten())
            .and_then(|value| match value {
                AttributeValue::Exprloc(expr) => {
                    Some(FrameBase::parse(self.sections.unit(unit)?, expr))
                }
                _ => None,
            })
            .unwrap_or_default();
        FunctionInfo {
            name: function.name.clone(),
            unit,
            die,
            frame_base,
        }
    }

    /// File-scope variable by name
    pub fn find_global(&self, name: &str) -> Option<VariableInfo> {
        let loc = self.index.find_global(name)?;
        self.variable_info(loc.unit, loc.die, name, None, FrameBase::Unknown)
    }

    /// Local variable or parameter of `function` visible at the link-time
    /// `pc`. The innermost enclosing lexical block wins.
    pub fn find_local(&self, function: &FunctionInfo, pc: u64, name: &str) -> Option<VariableInfo> {
        let mut best: Option<(usize, UnitOffset)> = None;
        self.visit_scope(function.unit, function.die, pc, 0, name, &mut |depth, die| {
            if best.map(|(d, _)| depth >= d).unwrap_or(true) {
                best = Some((depth, die));
            }
        });
        let (_, die) = best?;
        self.variable_info(function.unit, die, name, Some(pc), function.frame_base)
    }

    /// Names of the locals visible at `pc` in `function`, outermost first
    pub fn local_names(&self, function: &FunctionInfo, pc: u64) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(function.unit, function.die, pc, &mut names);
        names
    }

    fn collect_names(&self, unit: usize, scope: UnitOffset, pc: u64, out: &mut Vec<String>) {
        for child in self.sections.children(unit, scope) {
            let Some(entry) = self.entry(unit, child) else {
                continue;
            };
            match entry.tag() {
                gimli::DW_TAG_formal_parameter | gimli::DW_TAG_variable => {
                    if let Some(name) = self.sections.entry_name_with_origin(unit, &entry) {
                        out.push(name);
                    }
                }
                gimli::DW_TAG_lexical_block if self.block_covers(unit, &entry, pc) => {
                    self.collect_names(unit, child, pc, out)
                }
                _ => {}
            }
        }
    }

    fn block_covers(&self, unit: usize, entry: &Entry<'_, '_>, pc: u64) -> bool {
        let ranges = self.sections.entry_ranges(unit, entry);
        ranges.is_empty() || ranges.iter().any(|(lo, hi)| pc >= *lo && pc < *hi)
    }

    fn visit_scope(
        &self,
        unit: usize,
        scope: UnitOffset,
        pc: u64,
        depth: usize,
        name: &str,
        found: &mut dyn FnMut(usize, UnitOffset),
    ) {
        for child in self.sections.children(unit, scope) {
            let Some(entry) = self.entry(unit, child) else {
                continue;
            };
            match entry.tag() {
                gimli::DW_TAG_formal_parameter | gimli::DW_TAG_variable
                    if self.is_named(unit, &entry, name) =>
                {
                    found(depth, child)
                }
                gimli::DW_TAG_lexical_block if self.block_covers(unit, &entry, pc) => {
                    self.visit_scope(unit, child, pc, depth + 1, name, found)
                }
                _ => {}
            }
        }
    }

    fn is_named(&self, unit: usize, entry: &Entry<'_, '_>, name: &str) -> bool {
        let entry_name = self.sections.entry_name_with_origin(unit, entry);
        entry_name.as_deref() == Some(name)
    }

    fn variable_info(
        &self,
        unit: usize,
        die: UnitOffset,
        name: &str,
        pc: Option<u64>,
        frame_base: FrameBase,
    ) -> Option<VariableInfo> {
        let entry = self.entry(unit, die)?;
        let unit_ref = self.sections.unit(unit)?;

        // Type may live on the declaration this DIE completes
        let type_info = match self.sections.attr_target(unit, &entry, gimli::DW_AT_type) {
            Some((type_unit, type_die)) => self.resolve(type_unit, type_die)?,
            None => {
                let (origin_unit, origin) = self.sections.origin_of(unit, &entry)?;
                let origin_entry = self.entry(origin_unit, origin)?;
                let (type_unit, type_die) = self
                    .sections
                    .attr_target(origin_unit, &origin_entry, gimli::DW_AT_type)?;
                self.resolve(type_unit, type_die)?
            }
        };

        let location = match entry.attr_value(gimli::DW_AT_location).ok().flatten() {
            Some(AttributeValue::Exprloc(expr)) => {
                VariableLocation::parse(&self.sections, unit_ref, expr)
            }
            Some(value) => self.location_from_list(unit, value, pc),
            None => VariableLocation::OptimizedOut,
        };
        debug!("Variable '{}' at {:?}", name, location);

        Some(VariableInfo {
            name: name.to_string(),
            type_info,
            location,
            frame_base,
        })
    }

    fn location_from_list(
        &self,
        unit: usize,
        value: AttributeValue<crate::core::DwarfReader>,
        pc: Option<u64>,
    ) -> VariableLocation {
        let (Some(unit_ref), Some(pc)) = (self.sections.unit(unit), pc) else {
            return VariableLocation::Unsupported("location list without pc".to_string());
        };
        let mut locations = match self.sections.dwarf().attr_locations(unit_ref, value) {
            Ok(Some(iter)) => iter,
            _ => return VariableLocation::Unsupported("unreadable location list".to_string()),
        };
        while let Ok(Some(entry)) = locations.next() {
            if pc >= entry.range.begin && pc < entry.range.end {
                return VariableLocation::parse(&self.sections, unit_ref, entry.data);
            }
        }
        VariableLocation::OptimizedOut
    }

    /// Number of resolved types held in the cache
    pub fn cached_type_count(&self) -> usize {
        self.resolver.borrow().cached_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        build_tlist_program, TLIST_FUNCTION_PC, TLIST_HEAD_ADDR, TLIST_TAIL_ADDR,
    };

    fn analyzer() -> DwarfAnalyzer {
        DwarfAnalyzer::from_sections(build_tlist_program())
    }

    #[test]
    fn finds_typedef_and_struct_types() {
        let analyzer = analyzer();
        let content = analyzer.find_type("t_content").unwrap();
        assert!(matches!(content, TypeInfo::TypedefType { .. }));
        let names: Vec<&str> = content
            .members()
            .unwrap()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "name"]);

        let tagged = analyzer.find_type("struct s_content").unwrap();
        assert_eq!(tagged.type_name(), "struct s_content");
        assert_eq!(tagged.member("name").map(|m| m.offset), Some(8));
        assert!(analyzer.find_type("t_missing").is_none());
    }

    #[test]
    fn self_referential_list_defers_its_next_pointer() {
        let analyzer = analyzer();
        let list = analyzer.find_type("t_list").unwrap();
        let next = list.member("next").unwrap();
        let TypeInfo::DeferredType { type_ref, name } = next.member_type.pointee().unwrap() else {
            panic!("next should point to a deferred type");
        };
        assert_eq!(name, "struct s_list");
        let completed = analyzer.complete_type(*type_ref).unwrap();
        assert_eq!(completed.member("content").map(|m| m.offset), Some(0));
        assert_eq!(completed.member("next").map(|m| m.offset), Some(8));
    }

    #[test]
    fn forward_declaration_completes_from_definition() {
        let analyzer = analyzer();
        let tail = analyzer.find_global("tail").unwrap();
        assert_eq!(tail.location, VariableLocation::Address(TLIST_TAIL_ADDR));
        let TypeInfo::DeferredType { type_ref, .. } = tail.type_info.pointee().unwrap() else {
            panic!("declaration-only pointee should be deferred");
        };
        let completed = analyzer.complete_type(*type_ref).unwrap();
        assert_eq!(completed.size(), 16);
        assert!(completed.member("next").is_some());
        assert!(analyzer.cached_type_count() > 0);
    }

    #[test]
    fn globals_and_locals_resolve_locations() {
        let analyzer = analyzer();
        let head = analyzer.find_global("head").unwrap();
        assert_eq!(head.location, VariableLocation::Address(TLIST_HEAD_ADDR));
        assert!(head.type_info.is_pointer());

        let function = analyzer.function_at(TLIST_FUNCTION_PC).unwrap();
        assert_eq!(function.name, "main");
        assert_eq!(function.frame_base, FrameBase::CallFrameCfa);
        let local = analyzer
            .find_local(&function, TLIST_FUNCTION_PC, "list")
            .unwrap();
        assert_eq!(local.location, VariableLocation::FrameBaseOffset(-24));
        assert_eq!(
            analyzer.local_names(&function, TLIST_FUNCTION_PC),
            vec!["list"]
        );
        assert!(analyzer
            .find_local(&function, TLIST_FUNCTION_PC, "head")
            .is_none());
        assert!(analyzer.function_at(0x10).is_none());
    }
}
