#![allow(dead_code)]

//! Common test utilities shared across integration tests
//!
//! `FakeTarget` is an in-memory debuggee: a sparse memory image plus the
//! variables and types a symbol provider would report for
//!
//! ```c
//! typedef struct s_content { int id; char *name; } t_content;
//! typedef struct s_list { void *content; struct s_list *next; } t_list;
//! t_list *head;
//! ```

use ptlist::{DebugContext, VariableRecord};
use ptlist_process::{MemoryReader, ProcessError};
use ptlist_types::{EnumVariant, StructMember, TypeInfo, TypeRef};
use std::collections::{BTreeMap, HashMap};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests (call once per test)
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("off")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const S_LIST_REF: TypeRef = TypeRef { unit: 0, die: 0x40 };
pub const UNRESOLVABLE_REF: TypeRef = TypeRef {
    unit: 0,
    die: 0x9999,
};

pub fn base(name: &str, size: u64, encoding: gimli::DwAte) -> TypeInfo {
    TypeInfo::BaseType {
        name: name.to_string(),
        size,
        encoding: encoding.0 as u16,
    }
}

pub fn int() -> TypeInfo {
    base("int", 4, gimli::DW_ATE_signed)
}

pub fn char_ptr() -> TypeInfo {
    base("char", 1, gimli::DW_ATE_signed_char).pointer_to()
}

pub fn member(name: &str, member_type: TypeInfo, offset: u64) -> StructMember {
    StructMember {
        name: name.to_string(),
        member_type,
        offset,
        bit_offset: None,
        bit_size: None,
    }
}

pub fn s_content() -> TypeInfo {
    TypeInfo::StructType {
        name: "s_content".to_string(),
        size: 16,
        members: vec![member("id", int(), 0), member("name", char_ptr(), 8)],
    }
}

pub fn t_content() -> TypeInfo {
    TypeInfo::TypedefType {
        name: "t_content".to_string(),
        underlying_type: Box::new(s_content()),
    }
}

/// `struct s_list` with its `next` pointer deferred, as a DWARF reader
/// resolves a self-referential struct
pub fn s_list() -> TypeInfo {
    let deferred = TypeInfo::DeferredType {
        name: "struct s_list".to_string(),
        type_ref: S_LIST_REF,
    };
    TypeInfo::StructType {
        name: "s_list".to_string(),
        size: 16,
        members: vec![
            member(
                "content",
                TypeInfo::UnknownType {
                    name: "void".to_string(),
                }
                .pointer_to(),
                0,
            ),
            member("next", deferred.pointer_to(), 8),
        ],
    }
}

pub fn t_list_ptr() -> TypeInfo {
    TypeInfo::TypedefType {
        name: "t_list".to_string(),
        underlying_type: Box::new(s_list()),
    }
    .pointer_to()
}

/// Struct with one field of every rendering kind
pub fn s_rich() -> TypeInfo {
    let color = TypeInfo::EnumType {
        name: "color".to_string(),
        size: 4,
        base_type: Box::new(base("unsigned int", 4, gimli::DW_ATE_unsigned)),
        variants: vec![
            EnumVariant {
                name: "RED".to_string(),
                value: 0,
            },
            EnumVariant {
                name: "GREEN".to_string(),
                value: 1,
            },
        ],
    };
    TypeInfo::StructType {
        name: "s_rich".to_string(),
        size: 64,
        members: vec![
            member("i", int(), 0),
            member("u", base("unsigned int", 4, gimli::DW_ATE_unsigned), 4),
            member("l", base("long int", 8, gimli::DW_ATE_signed), 8),
            member("f", base("float", 4, gimli::DW_ATE_float), 16),
            member("c", base("char", 1, gimli::DW_ATE_signed_char), 20),
            member("sh", base("short int", 2, gimli::DW_ATE_signed), 22),
            member("d", base("double", 8, gimli::DW_ATE_float), 24),
            member("s", char_ptr(), 32),
            member("p", int().pointer_to(), 40),
            member("e", color, 48),
            member("none", char_ptr(), 56),
        ],
    }
}

const PAGE_SIZE: u64 = 4096;

/// Sparse, page-granular memory image
#[derive(Debug, Default)]
pub struct MemoryImage {
    pages: BTreeMap<u64, Vec<u8>>,
    next: u64,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            next: 0x10000,
        }
    }

    /// Map `bytes` at a fresh address and return it
    pub fn alloc(&mut self, bytes: Vec<u8>) -> u64 {
        let addr = self.next;
        self.next += (bytes.len() as u64).max(1).div_ceil(16) * 16 + 16;
        let mut page = addr & !(PAGE_SIZE - 1);
        while page < addr + bytes.len() as u64 {
            self.pages
                .entry(page)
                .or_insert_with(|| vec![0; PAGE_SIZE as usize]);
            page += PAGE_SIZE;
        }
        self.write(addr, &bytes);
        addr
    }

    pub fn alloc_str(&mut self, s: &str) -> u64 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.alloc(bytes)
    }

    pub fn alloc_u64(&mut self, value: u64) -> u64 {
        self.alloc(value.to_le_bytes().to_vec())
    }

    pub fn write_u64(&mut self, addr: u64, value: u64) {
        self.write(addr, &value.to_le_bytes());
    }

    pub fn write(&mut self, addr: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let at = addr + i as u64;
            let page = self
                .pages
                .get_mut(&(at & !(PAGE_SIZE - 1)))
                .unwrap_or_else(|| panic!("write to unmapped 0x{at:x}"));
            page[(at % PAGE_SIZE) as usize] = *byte;
        }
    }
}

impl MemoryReader for MemoryImage {
    fn read_memory(&self, addr: u64, len: usize) -> ptlist_process::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        for i in 0..len as u64 {
            let at = addr.wrapping_add(i);
            match self.pages.get(&(at & !(PAGE_SIZE - 1))) {
                Some(page) => out.push(page[(at % PAGE_SIZE) as usize]),
                None => {
                    return Err(ProcessError::MemoryRead {
                        addr,
                        len,
                        source: std::io::Error::from_raw_os_error(5),
                    })
                }
            }
        }
        Ok(out)
    }
}

/// In-memory debuggee with the `t_list` program's symbols
pub struct FakeTarget {
    pub memory: MemoryImage,
    pub variables: HashMap<String, VariableRecord>,
    pub types: HashMap<String, TypeInfo>,
}

impl FakeTarget {
    pub fn new() -> Self {
        let mut types = HashMap::new();
        types.insert("t_content".to_string(), t_content());
        types.insert("struct s_content".to_string(), s_content());
        let t_list = t_list_ptr().pointee().cloned().unwrap();
        types.insert("t_list".to_string(), t_list);
        types.insert("struct s_rich".to_string(), s_rich());
        types.insert("int".to_string(), int());
        types.insert(
            "t_opaque".to_string(),
            TypeInfo::DeferredType {
                name: "struct s_opaque".to_string(),
                type_ref: UNRESOLVABLE_REF,
            },
        );
        Self {
            memory: MemoryImage::new(),
            variables: HashMap::new(),
            types,
        }
    }

    /// Lay out `s_content` nodes and bind the list to variable `name`
    pub fn with_list(mut self, name: &str, items: &[(i32, &str)]) -> Self {
        let contents: Vec<u64> = items
            .iter()
            .map(|(id, label)| {
                let label = self.memory.alloc_str(label);
                let mut bytes = vec![0u8; 16];
                bytes[..4].copy_from_slice(&id.to_le_bytes());
                bytes[8..].copy_from_slice(&label.to_le_bytes());
                self.memory.alloc(bytes)
            })
            .collect();
        self.with_nodes(name, &contents)
    }

    /// Link one node per content pointer and bind the list to `name`
    pub fn with_nodes(mut self, name: &str, contents: &[u64]) -> Self {
        let nodes: Vec<u64> = contents
            .iter()
            .map(|content| {
                let mut bytes = vec![0u8; 16];
                bytes[..8].copy_from_slice(&content.to_le_bytes());
                self.memory.alloc(bytes)
            })
            .collect();
        for pair in nodes.windows(2) {
            self.memory.write_u64(pair[0] + 8, pair[1]);
        }
        let first = nodes.first().copied().unwrap_or(0);
        self.bind_pointer(name, first)
    }

    /// Bind `name` to a `t_list *` holding `value`
    pub fn bind_pointer(mut self, name: &str, value: u64) -> Self {
        let storage = self.memory.alloc_u64(value);
        self.variables.insert(
            name.to_string(),
            VariableRecord {
                name: name.to_string(),
                address: storage,
                type_info: t_list_ptr(),
            },
        );
        self
    }
}

impl DebugContext for FakeTarget {
    fn find_variable(&self, name: &str) -> Option<VariableRecord> {
        self.variables.get(name).cloned()
    }

    fn find_first_type(&self, name: &str) -> Option<TypeInfo> {
        self.types.get(name).cloned()
    }

    fn complete_type(&self, type_ref: TypeRef) -> Option<TypeInfo> {
        (type_ref == S_LIST_REF).then(s_list)
    }

    fn memory(&self) -> &dyn MemoryReader {
        &self.memory
    }
}
