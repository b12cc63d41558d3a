//! Typed views of debuggee memory

use crate::target::{DebugContext, VariableRecord};
use ptlist_types::{BasicType, TypeInfo, ValueFormatter};
use tracing::{debug, trace};

/// A typed location in the debuggee.
///
/// Reads go through the context every time; nothing is cached, so a value
/// always reflects the memory of the stopped process.
#[derive(Clone)]
pub struct ValueObject<'a> {
    ctx: &'a dyn DebugContext,
    name: String,
    address: u64,
    ty: TypeInfo,
}

impl std::fmt::Debug for ValueObject<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueObject")
            .field("name", &self.name)
            .field("address", &format_args!("0x{:x}", self.address))
            .field("type", &self.ty.type_name())
            .finish()
    }
}

impl<'a> ValueObject<'a> {
    pub fn new(
        ctx: &'a dyn DebugContext,
        name: impl Into<String>,
        address: u64,
        ty: TypeInfo,
    ) -> Self {
        Self {
            ctx,
            name: name.into(),
            address,
            ty,
        }
    }

    pub fn from_variable(ctx: &'a dyn DebugContext, variable: VariableRecord) -> Self {
        Self::new(ctx, variable.name, variable.address, variable.type_info)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.ty
    }

    pub fn is_pointer(&self) -> bool {
        self.ty.is_pointer()
    }

    pub fn basic_type(&self) -> BasicType {
        BasicType::of(&self.ty)
    }

    /// Same storage viewed as `ty`
    pub fn cast(&self, ty: TypeInfo) -> ValueObject<'a> {
        ValueObject {
            ctx: self.ctx,
            name: self.name.clone(),
            address: self.address,
            ty,
        }
    }

    /// Look through typedefs and qualifiers, expanding deferred types
    fn complete(&self, ty: &TypeInfo) -> Option<TypeInfo> {
        match ty.canonical() {
            TypeInfo::DeferredType { name, type_ref } => {
                let completed = self.ctx.complete_type(*type_ref);
                if completed.is_none() {
                    debug!("Type '{}' has no definition", name);
                }
                completed
            }
            other => Some(other.clone()),
        }
    }

    /// Member `name` of this aggregate, or of the aggregate this pointer
    /// points to. `None` if there is no such member or the pointer is null
    /// or unreadable.
    pub fn child_member(&self, name: &str) -> Option<ValueObject<'a>> {
        let (container, base) = match self.ty.pointee() {
            Some(pointee) => {
                let target = self.read_pointer()?;
                if target == 0 {
                    trace!("'{}' is null, no member '{}'", self.name, name);
                    return None;
                }
                (self.complete(pointee)?, target)
            }
            None => (self.complete(&self.ty)?, self.address),
        };
        let member = container.member(name)?;
        Some(ValueObject {
            ctx: self.ctx,
            name: name.to_string(),
            address: base.wrapping_add(member.offset),
            ty: member.member_type.clone(),
        })
    }

    fn read_pointer(&self) -> Option<u64> {
        let bytes = self.read_bytes()?;
        ValueFormatter::read_unsigned(&bytes, self.ty.size() as usize)
    }

    /// Raw bytes of the value; bitfields read every byte their bits touch
    fn read_bytes(&self) -> Option<Vec<u8>> {
        let ty = self.complete(&self.ty)?;
        let len = match &ty {
            TypeInfo::BitfieldType {
                bit_offset,
                bit_size,
                ..
            } => (*bit_offset as usize + *bit_size as usize).div_ceil(8),
            other => other.size() as usize,
        };
        if len == 0 {
            return None;
        }
        match self.ctx.memory().read_memory(self.address, len) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("Failed to read '{}': {}", self.name, e);
                None
            }
        }
    }

    /// Integer value, zero-extended; 0 when the value cannot be read
    pub fn value_as_unsigned(&self) -> u64 {
        self.scalar().map(|s| s.as_unsigned()).unwrap_or(0)
    }

    /// Integer value, sign-extended by the type; 0 when the value cannot be read
    pub fn value_as_signed(&self) -> i64 {
        self.scalar().map(|s| s.as_signed()).unwrap_or(0)
    }

    fn scalar(&self) -> Option<ptlist_types::Scalar> {
        let ty = self.complete(&self.ty)?;
        ValueFormatter::scalar(&self.read_bytes()?, &ty)
    }

    /// Generic textual rendering (`42`, `'a'`, `true`, `0x...`, enumerator
    /// names); aggregates have none
    pub fn value_text(&self) -> Option<String> {
        let ty = self.complete(&self.ty)?;
        ValueFormatter::value_text(&self.read_bytes()?, &ty)
    }

    /// Summary of a character pointer: the C string it points to
    pub fn summary(&self) -> Option<String> {
        let pointee = self.ty.pointee()?;
        if !BasicType::of(pointee).is_char_like() {
            return None;
        }
        let target = self.read_pointer().filter(|addr| *addr != 0)?;
        let bytes = self
            .ctx
            .memory()
            .read_c_string(target, self.ctx.max_string_length())
            .ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}
