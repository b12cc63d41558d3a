use super::formatter::format_node;
use crate::value::ValueObject;
use ptlist_types::TypeInfo;
use tracing::{debug, trace};

/// Walk the list starting at `head`, one formatted line per node with
/// non-empty content.
///
/// The list is trusted to be finite: a cycle never terminates.
pub fn walk(head: ValueObject<'_>, content_ptr: &TypeInfo, fields: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut node = head;
    let mut visited = 0usize;
    loop {
        let address = node.value_as_unsigned();
        if address == 0 {
            break;
        }
        visited += 1;
        trace!("node #{} at 0x{:x}", visited, address);

        if let Some(content) = node.child_member("content") {
            let line = format_node(&content.cast(content_ptr.clone()), fields);
            if !line.is_empty() {
                lines.push(line);
            }
        }

        match node.child_member("next") {
            Some(next) => node = next,
            None => {
                debug!("next of node at 0x{:x} is unreadable, stopping", address);
                break;
            }
        }
    }
    debug!("Visited {} nodes, {} lines", visited, lines.len());
    lines
}
