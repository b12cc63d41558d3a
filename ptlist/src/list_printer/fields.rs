use crate::target::DebugContext;
use ptlist_types::TypeInfo;

/// Member names of the struct `content_ptr` points to, in declaration order.
///
/// Anything other than a pointer to a (possibly typedef'd) struct or union
/// has no fields.
pub fn content_fields(ctx: &dyn DebugContext, content_ptr: &TypeInfo) -> Vec<String> {
    let Some(pointee) = content_ptr.pointee() else {
        return Vec::new();
    };
    let completed;
    let target = match pointee.canonical() {
        TypeInfo::DeferredType { type_ref, .. } => match ctx.complete_type(*type_ref) {
            Some(ty) => {
                completed = ty;
                &completed
            }
            None => return Vec::new(),
        },
        other => other,
    };
    target
        .members()
        .map(|members| members.iter().map(|m| m.name.clone()).collect())
        .unwrap_or_default()
}
