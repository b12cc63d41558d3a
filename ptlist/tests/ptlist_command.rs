//! `ptlist` against an in-memory debuggee
//! - walks lists head to tail, one line per node
//! - reports invalid head / content type without output
//! - renders every field kind

mod common;

use common::{init, FakeTarget};
use ptlist::list_printer::PtlistDefaults;
use ptlist::{register_ptlist, CommandInterpreter, CommandReturn, ReturnStatus};

fn run(target: &FakeTarget, line: &str) -> CommandReturn {
    init();
    let mut interpreter = CommandInterpreter::new();
    register_ptlist(&mut interpreter, PtlistDefaults::default());
    interpreter.handle_command(line, target)
}

#[test]
fn two_node_list_prints_each_content() {
    let target = FakeTarget::new().with_list("head", &[(1, "a"), (2, "b")]);
    let result = run(&target, "ptlist");
    assert_eq!(result.status(), ReturnStatus::SuccessFinishResult);
    assert_eq!(result.lines(), vec!["[id:1][name:a]", "[id:2][name:b]"]);
    assert_eq!(result.error(), None);
}

#[test]
fn long_list_keeps_order() {
    let items: Vec<(i32, String)> = (0..50).map(|i| (i, format!("item{i}"))).collect();
    let borrowed: Vec<(i32, &str)> = items.iter().map(|(i, s)| (*i, s.as_str())).collect();
    let target = FakeTarget::new().with_list("head", &borrowed);
    let result = run(&target, "ptlist");
    let lines = result.lines();
    assert_eq!(lines.len(), 50);
    assert_eq!(lines[0], "[id:0][name:item0]");
    assert_eq!(lines[49], "[id:49][name:item49]");
}

#[test]
fn explicit_head_and_type_names() {
    let target = FakeTarget::new()
        .with_list("head", &[(1, "ignored")])
        .with_list("people", &[(-7, "neg")]);
    let result = run(&target, "ptlist -l people -n 'struct s_content'");
    assert!(result.succeeded());
    assert_eq!(result.lines(), vec!["[id:-7][name:neg]"]);

    let result = run(&target, "ptlist --list-head people --name t_content");
    assert_eq!(result.lines(), vec!["[id:-7][name:neg]"]);
}

#[test]
fn empty_list_succeeds_without_output() {
    let target = FakeTarget::new().with_list("head", &[]);
    let result = run(&target, "ptlist");
    assert_eq!(result.status(), ReturnStatus::SuccessFinishResult);
    assert!(result.output().is_empty());
}

#[test]
fn invalid_head_names_the_variable() {
    let target = FakeTarget::new().with_list("head", &[(1, "a")]);
    let result = run(&target, "ptlist -l missing");
    assert_eq!(result.status(), ReturnStatus::Failed);
    assert_eq!(result.error(), Some("t_list head \"missing\" is not valid"));
    assert!(result.output().is_empty());
}

#[test]
fn invalid_content_type_names_the_type() {
    let target = FakeTarget::new().with_list("head", &[(1, "a")]);
    let result = run(&target, "ptlist -n t_nothing");
    assert_eq!(result.status(), ReturnStatus::Failed);
    assert_eq!(
        result.error(),
        Some("content type \"t_nothing\" is not valid")
    );
    assert!(result.output().is_empty());
}

#[test]
fn head_is_checked_before_type() {
    let target = FakeTarget::new();
    let result = run(&target, "ptlist -l nope -n t_nothing");
    assert_eq!(result.error(), Some("t_list head \"nope\" is not valid"));
}

#[test]
fn non_struct_content_gives_no_lines() {
    let target = FakeTarget::new().with_list("head", &[(1, "a"), (2, "b")]);
    let result = run(&target, "ptlist -n int");
    assert_eq!(result.status(), ReturnStatus::SuccessFinishResult);
    assert!(result.output().is_empty());

    // Declared but never defined
    let result = run(&target, "ptlist -n t_opaque");
    assert_eq!(result.status(), ReturnStatus::SuccessFinishResult);
    assert!(result.output().is_empty());
}

#[test]
fn null_content_is_skipped() {
    let mut target = FakeTarget::new();
    let label = target.memory.alloc_str("kept");
    let mut content = vec![0u8; 16];
    content[..4].copy_from_slice(&3i32.to_le_bytes());
    content[8..].copy_from_slice(&label.to_le_bytes());
    let content = target.memory.alloc(content);
    let target = target.with_nodes("head", &[0, content]);

    let result = run(&target, "ptlist");
    assert_eq!(result.lines(), vec!["[id:3][name:kept]"]);
}

#[test]
fn unreadable_next_stops_silently() {
    let target = FakeTarget::new().with_list("head", &[(1, "a"), (2, "b")]);
    // Point the second node's next into unmapped memory
    let head = target.variables["head"].address;
    let first = ptlist_process::MemoryReader::read_u64(&target.memory, head).unwrap();
    let second = ptlist_process::MemoryReader::read_u64(&target.memory, first + 8).unwrap();
    let mut target = target;
    target.memory.write_u64(second + 8, 0xdead_0000);

    let result = run(&target, "ptlist");
    assert_eq!(result.status(), ReturnStatus::SuccessFinishResult);
    assert_eq!(result.lines(), vec!["[id:1][name:a]", "[id:2][name:b]"]);
    assert_eq!(result.error(), None);
}

#[test]
fn every_field_kind_renders() {
    let mut target = FakeTarget::new();
    let text = target.memory.alloc_str("hello");
    let mut rich = vec![0u8; 64];
    rich[0..4].copy_from_slice(&(-5i32).to_le_bytes());
    rich[4..8].copy_from_slice(&7u32.to_le_bytes());
    rich[8..16].copy_from_slice(&(-9_000_000_000i64).to_le_bytes());
    rich[16..20].copy_from_slice(&1.5f32.to_le_bytes());
    rich[20] = b'x';
    rich[22..24].copy_from_slice(&3i16.to_le_bytes());
    rich[24..32].copy_from_slice(&2.0f64.to_le_bytes());
    rich[32..40].copy_from_slice(&text.to_le_bytes());
    rich[40..48].copy_from_slice(&0x1000u64.to_le_bytes());
    rich[48..52].copy_from_slice(&1u32.to_le_bytes());
    let rich = target.memory.alloc(rich);
    let target = target.with_nodes("head", &[rich]);

    let result = run(&target, "ptlist -n 'struct s_rich'");
    assert_eq!(
        result.lines(),
        vec![
            "[i:-5][u:7][l:-9000000000][f:1.5][c:'x'][sh:3][d:2.0][s:hello]\
             [p:][e:GREEN][none:]"
        ]
    );
}

#[test]
fn pointers_without_summary_render_empty() {
    let mut target = FakeTarget::new();
    let mut rich = vec![0u8; 64];
    rich[24..32].copy_from_slice(&1e16f64.to_le_bytes());
    rich[40..48].copy_from_slice(&0x2000u64.to_le_bytes());
    let rich = target.memory.alloc(rich);
    let target = target.with_nodes("head", &[rich]);

    let result = run(&target, "ptlist -n 'struct s_rich'");
    let line = &result.lines()[0];
    assert!(line.contains("[d:1e+16]"), "{line}");
    assert!(line.contains("[s:]"), "{line}");
    assert!(line.contains("[p:]"), "{line}");
    assert!(line.contains("[none:]"), "{line}");
}

#[test]
fn self_referential_next_walks_past_first_node() {
    let target = FakeTarget::new().with_list("head", &[(1, "a"), (2, "b"), (3, "c")]);
    let result = run(&target, "ptlist");
    assert_eq!(result.lines().len(), 3);
    assert_eq!(result.lines()[2], "[id:3][name:c]");
}

#[test]
fn option_errors_fail_the_command() {
    let target = FakeTarget::new().with_list("head", &[(1, "a")]);
    let result = run(&target, "ptlist -n 'oops");
    assert_eq!(result.status(), ReturnStatus::Failed);
    assert_eq!(result.error(), Some("No closing quotation"));

    let result = run(&target, "ptlist --frobnicate");
    assert_eq!(result.status(), ReturnStatus::Failed);
    assert!(result.output().is_empty());
}

#[test]
fn help_flag_succeeds() {
    let target = FakeTarget::new();
    let result = run(&target, "ptlist --help");
    assert!(result.succeeded());
    assert!(result.output().contains("--list-head"));
}

#[test]
fn configured_defaults_are_used() {
    init();
    let target = FakeTarget::new().with_list("items", &[(9, "z")]);
    let mut interpreter = CommandInterpreter::new();
    register_ptlist(
        &mut interpreter,
        PtlistDefaults {
            list_head: "items".to_string(),
            content_type: "struct s_content".to_string(),
        },
    );
    let result = interpreter.handle_command("ptlist", &target);
    assert_eq!(result.lines(), vec!["[id:9][name:z]"]);
}
