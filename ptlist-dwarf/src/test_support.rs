//! Synthetic DWARF for unit tests, written with `gimli::write`

use crate::module::DwarfSections;
use gimli::write::{
    Address, AttributeValue, DwarfUnit, EndianVec, Expression, Sections, UnitEntryId,
};
use std::borrow::Cow;
use std::collections::HashMap;

pub const TLIST_HEAD_ADDR: u64 = 0x4010;
pub const TLIST_TAIL_ADDR: u64 = 0x4018;
pub const TLIST_FUNCTION_LOW_PC: u64 = 0x1139;
pub const TLIST_FUNCTION_PC: u64 = 0x1150;

fn add_named(
    dwarf: &mut DwarfUnit,
    parent: UnitEntryId,
    tag: gimli::DwTag,
    name: &str,
) -> UnitEntryId {
    let id = dwarf.unit.add(parent, tag);
    let name = AttributeValue::String(name.as_bytes().to_vec());
    dwarf.unit.get_mut(id).set(gimli::DW_AT_name, name);
    id
}

fn set_udata(dwarf: &mut DwarfUnit, id: UnitEntryId, attr: gimli::DwAt, value: u64) {
    let entry = dwarf.unit.get_mut(id);
    entry.set(attr, AttributeValue::Udata(value));
}

fn set_ref(dwarf: &mut DwarfUnit, id: UnitEntryId, attr: gimli::DwAt, target: UnitEntryId) {
    let entry = dwarf.unit.get_mut(id);
    entry.set(attr, AttributeValue::UnitRef(target));
}

fn add_base(dwarf: &mut DwarfUnit, name: &str, size: u64, encoding: gimli::DwAte) -> UnitEntryId {
    let root = dwarf.unit.root();
    let id = add_named(dwarf, root, gimli::DW_TAG_base_type, name);
    set_udata(dwarf, id, gimli::DW_AT_byte_size, size);
    let entry = dwarf.unit.get_mut(id);
    entry.set(gimli::DW_AT_encoding, AttributeValue::Encoding(encoding));
    id
}

fn add_member(
    dwarf: &mut DwarfUnit,
    parent: UnitEntryId,
    name: &str,
    ty: UnitEntryId,
    offset: u64,
) {
    let id = add_named(dwarf, parent, gimli::DW_TAG_member, name);
    set_ref(dwarf, id, gimli::DW_AT_type, ty);
    set_udata(dwarf, id, gimli::DW_AT_data_member_location, offset);
}

fn add_pointer(dwarf: &mut DwarfUnit, target: Option<UnitEntryId>) -> UnitEntryId {
    let root = dwarf.unit.root();
    let id = dwarf.unit.add(root, gimli::DW_TAG_pointer_type);
    set_udata(dwarf, id, gimli::DW_AT_byte_size, 8);
    if let Some(target) = target {
        set_ref(dwarf, id, gimli::DW_AT_type, target);
    }
    id
}

/// One unit describing:
///
/// ```c
/// typedef struct s_content { int id; char *name; } t_content;
/// struct s_list;
/// typedef struct s_list { void *content; struct s_list *next; } t_list;
/// t_list *head;
/// struct s_list *tail;   /* typed through the forward declaration */
/// int main(void) { t_list *list; ... }
/// ```
pub fn build_tlist_program() -> DwarfSections {
    let encoding = gimli::Encoding {
        format: gimli::Format::Dwarf32,
        version: 4,
        address_size: 8,
    };
    let mut dwarf = DwarfUnit::new(encoding);
    let root = dwarf.unit.root();
    let name = AttributeValue::String(b"tlist.c".to_vec());
    dwarf.unit.get_mut(root).set(gimli::DW_AT_name, name);

    let int = add_base(&mut dwarf, "int", 4, gimli::DW_ATE_signed);
    let char_ty = add_base(&mut dwarf, "char", 1, gimli::DW_ATE_signed_char);
    let char_ptr = add_pointer(&mut dwarf, Some(char_ty));
    let void_ptr = add_pointer(&mut dwarf, None);

    let s_content = add_named(&mut dwarf, root, gimli::DW_TAG_structure_type, "s_content");
    set_udata(&mut dwarf, s_content, gimli::DW_AT_byte_size, 16);
    add_member(&mut dwarf, s_content, "id", int, 0);
    add_member(&mut dwarf, s_content, "name", char_ptr, 8);
    let t_content = add_named(&mut dwarf, root, gimli::DW_TAG_typedef, "t_content");
    set_ref(&mut dwarf, t_content, gimli::DW_AT_type, s_content);

    let s_list_decl = add_named(&mut dwarf, root, gimli::DW_TAG_structure_type, "s_list");
    let decl = dwarf.unit.get_mut(s_list_decl);
    decl.set(gimli::DW_AT_declaration, AttributeValue::Flag(true));
    let decl_ptr = add_pointer(&mut dwarf, Some(s_list_decl));

    let s_list = add_named(&mut dwarf, root, gimli::DW_TAG_structure_type, "s_list");
    set_udata(&mut dwarf, s_list, gimli::DW_AT_byte_size, 16);
    let next_ptr = add_pointer(&mut dwarf, Some(s_list));
    add_member(&mut dwarf, s_list, "content", void_ptr, 0);
    add_member(&mut dwarf, s_list, "next", next_ptr, 8);
    let t_list = add_named(&mut dwarf, root, gimli::DW_TAG_typedef, "t_list");
    set_ref(&mut dwarf, t_list, gimli::DW_AT_type, s_list);
    let t_list_ptr = add_pointer(&mut dwarf, Some(t_list));

    for (name, ty, addr) in [
        ("head", t_list_ptr, TLIST_HEAD_ADDR),
        ("tail", decl_ptr, TLIST_TAIL_ADDR),
    ] {
        let var = add_named(&mut dwarf, root, gimli::DW_TAG_variable, name);
        let mut location = Expression::new();
        location.op_addr(Address::Constant(addr));
        let entry = dwarf.unit.get_mut(var);
        entry.set(gimli::DW_AT_type, AttributeValue::UnitRef(ty));
        entry.set(gimli::DW_AT_external, AttributeValue::Flag(true));
        entry.set(gimli::DW_AT_location, AttributeValue::Exprloc(location));
    }

    let main = add_named(&mut dwarf, root, gimli::DW_TAG_subprogram, "main");
    let mut cfa = Expression::new();
    cfa.op(gimli::DW_OP_call_frame_cfa);
    let entry = dwarf.unit.get_mut(main);
    entry.set(gimli::DW_AT_type, AttributeValue::UnitRef(int));
    entry.set(
        gimli::DW_AT_low_pc,
        AttributeValue::Address(Address::Constant(TLIST_FUNCTION_LOW_PC)),
    );
    entry.set(gimli::DW_AT_high_pc, AttributeValue::Udata(0x80));
    entry.set(gimli::DW_AT_frame_base, AttributeValue::Exprloc(cfa));

    let list = add_named(&mut dwarf, main, gimli::DW_TAG_variable, "list");
    let mut location = Expression::new();
    location.op_fbreg(-24);
    let entry = dwarf.unit.get_mut(list);
    entry.set(gimli::DW_AT_type, AttributeValue::UnitRef(t_list_ptr));
    entry.set(gimli::DW_AT_location, AttributeValue::Exprloc(location));

    let mut sections = Sections::new(EndianVec::new(gimli::LittleEndian));
    dwarf.write(&mut sections).expect("write synthetic DWARF");
    let mut data: HashMap<&'static str, Vec<u8>> = HashMap::new();
    sections
        .for_each(|id, section| -> gimli::write::Result<()> {
            data.insert(id.name(), section.slice().to_vec());
            Ok(())
        })
        .expect("collect synthetic sections");

    DwarfSections::from_loader(gimli::RunTimeEndian::Little, |name| {
        data.get(name).map(|bytes| Cow::Owned(bytes.clone()))
    })
    .expect("load synthetic DWARF")
}
