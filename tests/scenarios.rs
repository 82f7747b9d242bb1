use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;

use mdsync::engine::{Editor, NodeData, NodeKey, NodeKind, Point, RangeSelection, Teardown};
use mdsync::export::ExportPipeline;
use mdsync::import::{ImportContext, ImportVisitor};
use mdsync::markdown::{MdKind, MdNode};
use mdsync::plugin::{FnPlugin, Plugin};
use mdsync::plugins::{CorePluginParams, HeadingsPlugin, QuotePlugin, content_plugins};
use mdsync::session::{Subscription, ViewMode};
use mdsync::{ImportError, Session};

fn session_with(markdown: &str, plugins: Vec<Box<dyn Plugin>>) -> Session {
    Session::with_core(CorePluginParams::with_markdown(markdown), plugins).unwrap()
}

fn root_kinds(session: &Session) -> Vec<NodeKind> {
    let root = session.root_editor().unwrap();
    root.state().root().children.iter().map(|n| n.kind()).collect()
}

#[test]
fn test_heading_then_quote_round_trips() {
    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(QuotePlugin), Box::new(HeadingsPlugin::default())];
    let session = session_with("", plugins);
    session.set_markdown("# Title\n> quoted\n").unwrap();

    let root = session.root_editor().unwrap();
    let state = root.state();
    assert!(matches!(
        state.root().children[0].data,
        NodeData::Heading { level: 1 }
    ));
    assert_eq!(root_kinds(&session), [NodeKind::HEADING, NodeKind::QUOTE]);

    let pipeline = ExportPipeline::from_registries(session.registries(), session.to_markdown_options());
    assert_eq!(pipeline.run(state.root()).unwrap(), "# Title\n\n> quoted\n");
}

#[test]
fn test_reimporting_snapshot_changes_nothing() {
    let calls = Rc::new(RefCell::new(0));
    let params = {
        let on_change = Rc::clone(&calls);
        let on_error = Rc::clone(&calls);
        CorePluginParams::with_markdown("* one\n* two")
            .on_change(move |_| *on_change.borrow_mut() += 1)
            .on_error(move |_| *on_error.borrow_mut() += 1)
    };
    let session = Session::with_core(params, content_plugins()).unwrap();
    let root = session.root_editor().unwrap();
    let before = root.state();

    session.set_markdown("* one\n* two\n").unwrap();

    assert_eq!(*calls.borrow(), 0);
    assert!(Rc::ptr_eq(&before, &root.state()));
}

#[test]
fn test_unknown_directive_becomes_error_state() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let params = {
        let errors = Rc::clone(&errors);
        CorePluginParams::with_markdown("before").on_error(move |e| errors.borrow_mut().push(e.clone()))
    };
    let session = Session::with_core(params, Vec::new()).unwrap();
    let root = session.root_editor().unwrap();
    let before = root.state();

    session.set_markdown("::: badDirective\n").unwrap();

    let error = session.error().unwrap();
    assert!(error.error.starts_with("Unsupported markdown syntax"));
    assert_eq!(error.source, "::: badDirective\n");
    assert_eq!(errors.borrow().len(), 1);
    assert_eq!(*before, *root.state());
    assert_eq!(session.markdown(), "::: badDirective\n");
}

#[test]
fn test_source_edits_are_imported_when_leaving_source_view() {
    let session = session_with("old", content_plugins());
    session.set_view_mode(ViewMode::Source).unwrap();
    session.edit_source("new text");
    session.set_view_mode(ViewMode::RichText).unwrap();

    let root = session.root_editor().unwrap();
    assert_eq!(root.state().root().text_content(), "new text");
    assert_eq!(session.markdown(), "new text");
}

#[test]
fn test_escaped_directive_markers_stay_text() {
    for plugins in [Vec::new(), content_plugins()] {
        let first = session_with("\\:::note\n\n\\::leaf\n", plugins);
        assert!(first.error().is_none());
        let exported = first.markdown();
        assert_eq!(exported, "\\:::note\n\n\\::leaf");

        let second = session_with(&exported, Vec::new());
        assert!(second.error().is_none());
        assert_eq!(second.markdown(), exported);
        assert_eq!(root_kinds(&second), [NodeKind::PARAGRAPH, NodeKind::PARAGRAPH]);
    }
}

#[test]
fn test_heading_ending_in_hashes_round_trips() {
    let first = session_with("# C \\#\n", content_plugins());
    assert_eq!(first.markdown(), "# C \\#");
    let second = session_with(&first.markdown(), content_plugins());
    assert_eq!(second.markdown(), "# C \\#");
    let root = second.root_editor().unwrap();
    assert_eq!(root.state().root().text_content(), "C #");
}

struct FlatHeadings;

static FLAT_HEADINGS: FlatHeadings = FlatHeadings;

impl ImportVisitor for FlatHeadings {
    fn name(&self) -> &'static str {
        "flat-heading"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Heading { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let heading = ctx.create(NodeData::Heading { level: 1 })?;
        ctx.add_and_step_into(heading, node)
    }
}

fn flat_headings() -> Box<dyn Plugin> {
    Box::new(FnPlugin::new("flat-headings").on_init(|session| {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::HEADING);
        registries.import_visitors.append(&FLAT_HEADINGS);
        Ok(())
    }))
}

#[test]
fn test_first_registered_visitor_wins() {
    let flat_first = session_with("### Deep", vec![flat_headings(), Box::new(HeadingsPlugin::default())]);
    assert_eq!(flat_first.markdown(), "# Deep");

    let headings_first =
        session_with("### Deep", vec![Box::new(HeadingsPlugin::default()), flat_headings()]);
    assert_eq!(headings_first.markdown(), "### Deep");
}

fn counting_subscription(log: &Rc<RefCell<Vec<String>>>) -> Subscription {
    let log = Rc::clone(log);
    Rc::new(move |editor: &Editor| {
        let id = editor.id();
        log.borrow_mut().push(format!("install {id}"));
        let log = Rc::clone(&log);
        Teardown::new(move || log.borrow_mut().push(format!("teardown {id}")))
    })
}

#[test]
fn test_each_active_editor_change_rebinds_once() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let plugin = {
        let log = Rc::clone(&log);
        FnPlugin::new("counter").on_init(move |session| {
            session
                .registries()
                .active_subscriptions
                .append(counting_subscription(&log));
            Ok(())
        })
    };
    let session = session_with("text", vec![Box::new(plugin)]);
    let root = session.root_editor().unwrap();
    let first = root.nested();
    let second = root.nested();
    log.borrow_mut().clear();

    let caret = Some(RangeSelection::collapsed(Point {
        key: NodeKey::ROOT,
        offset: 0,
    }));
    let changes = 6;
    for i in 0..changes {
        let target = if i % 2 == 0 { &first } else { &second };
        target.select(caret).unwrap();
    }

    let log = log.borrow();
    let installs = log.iter().filter(|l| l.starts_with("install")).count();
    let teardowns = log.iter().filter(|l| l.starts_with("teardown")).count();
    assert_eq!(installs, changes);
    assert_eq!(teardowns, changes);
    for pair in log.chunks(2) {
        assert!(pair[0].starts_with("teardown"));
        assert!(pair[1].starts_with("install"));
    }
}

#[derive(Debug, Clone)]
enum Block {
    Heading(u8, Vec<String>),
    Paragraph(Vec<String>, Option<String>),
    Quote(Vec<String>),
    List(bool, Vec<Vec<String>>),
}

fn words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}", 1..5)
}

fn block() -> impl Strategy<Value = Block> {
    prop_oneof![
        (1u8..=6, words()).prop_map(|(level, w)| Block::Heading(level, w)),
        (words(), prop::option::of("[a-z]{1,8}")).prop_map(|(w, s)| Block::Paragraph(w, s)),
        words().prop_map(Block::Quote),
        (any::<bool>(), prop::collection::vec(words(), 1..4))
            .prop_map(|(ordered, items)| Block::List(ordered, items)),
    ]
}

fn render(blocks: &[Block]) -> String {
    let rendered: Vec<String> = blocks
        .iter()
        .map(|block| match block {
            Block::Heading(level, w) => format!("{} {}", "#".repeat(usize::from(*level)), w.join(" ")),
            Block::Paragraph(w, strong) => match strong {
                Some(s) => format!("{} **{s}** end", w.join(" ")),
                None => w.join(" "),
            },
            Block::Quote(w) => format!("> {}", w.join(" ")),
            Block::List(ordered, items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    if *ordered {
                        format!("{}. {}", i + 1, item.join(" "))
                    } else {
                        format!("* {}", item.join(" "))
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect();
    rendered.join("\n\n")
}

proptest! {
    #[test]
    fn prop_export_then_import_preserves_tree(blocks in prop::collection::vec(block(), 1..6)) {
        let first = session_with(&render(&blocks), content_plugins());
        prop_assert!(first.error().is_none());
        let exported = first.markdown();

        let second = session_with(&exported, content_plugins());
        prop_assert!(second.error().is_none());
        prop_assert_eq!(second.markdown(), exported);

        let a = first.root_editor().unwrap().state();
        let b = second.root_editor().unwrap().state();
        prop_assert!(a.root().same_shape(b.root()));
    }

    #[test]
    fn prop_failed_import_leaves_tree_unchanged(blocks in prop::collection::vec(block(), 1..4)) {
        let valid = render(&blocks);
        let session = session_with(&valid, vec![
            Box::new(HeadingsPlugin::default()),
            Box::new(QuotePlugin),
            Box::new(mdsync::plugins::ListsPlugin),
        ]);
        let root = session.root_editor().unwrap();
        let before = root.state();

        let broken = format!("{valid}\n\n::: note\nbody\n:::\n");
        session.set_markdown(&broken).unwrap();

        let error = session.error().unwrap();
        prop_assert_eq!(error.source, broken);
        let after = root.state();
        prop_assert_eq!(&*before, &*after);
    }
}
