mod common;

use std::sync::Arc;

use astdiff::{Action, Diff, DiffConfig, DiffInput, MultiMappingStore, ParentRef};
use common::{Shape, build, find, identity_mappings};
use facet_testhelpers::test;

fn if_block(stmts: Vec<Shape>) -> Shape {
    Shape(
        "If",
        "",
        vec![Shape("Name", "a", vec![]), Shape("Block", "", stmts)],
    )
}

fn diff(src: Shape, dst: Shape) -> Diff {
    let src = build(&src);
    let dst = build(&dst);
    let m = identity_mappings(&src, &dst);
    Diff::compute(
        DiffInput::new("A.java", "A.java", Arc::new(src), Arc::new(dst), m),
        &DiffConfig::default(),
    )
}

#[test]
fn test_appended_statement_is_single_insert() {
    // if (a) { x = 1; }  ->  if (a) { x = 1; y = 2; }
    let d = diff(
        if_block(vec![Shape("ExpressionStatement", "x=1", vec![])]),
        if_block(vec![
            Shape("ExpressionStatement", "x=1", vec![]),
            Shape("ExpressionStatement", "y=2", vec![]),
        ]),
    );
    let y = find(d.dst_tree(), "ExpressionStatement", "y=2");
    let block = find(d.src_tree(), "Block", "");

    assert_eq!(
        d.edit_script().actions(),
        &[Action::Insert {
            node_b: y,
            parent: ParentRef::Src(block),
            position: 1,
        }]
    );
    let c = d.classifier();
    assert_eq!(c.inserted_dsts().len(), 1);
    assert!(c.inserted_dsts().contains(&y));
    assert!(c.deleted_srcs().is_empty());
    assert!(c.updated_srcs().is_empty());
    assert!(c.moved_srcs().is_empty());
    assert!(d.replay().unwrap().structurally_eq(d.dst_tree()));
}

#[test]
fn test_appended_compound_statement_is_tree_insert() {
    let d = diff(
        if_block(vec![Shape("ExpressionStatement", "x=1", vec![])]),
        if_block(vec![
            Shape("ExpressionStatement", "x=1", vec![]),
            Shape(
                "Assignment",
                "=",
                vec![Shape("Name", "y", vec![]), Shape("Literal", "2", vec![])],
            ),
        ]),
    );
    let assign = find(d.dst_tree(), "Assignment", "=");
    let block = find(d.src_tree(), "Block", "");

    assert_eq!(
        d.edit_script().actions(),
        &[Action::TreeInsert {
            node_b: assign,
            parent: ParentRef::Src(block),
            position: 1,
        }]
    );
    let inserted: Vec<_> = d.classifier().inserted_dsts().iter().copied().collect();
    assert_eq!(inserted, vec![assign]);
    assert!(d.replay().unwrap().structurally_eq(d.dst_tree()));
}

#[test]
fn test_raw_inserts_report_only_the_top() {
    let src = build(&if_block(vec![]));
    let dst = build(&if_block(vec![Shape(
        "Call",
        "",
        vec![Shape("Name", "foo", vec![]), Shape("Literal", "1", vec![])],
    )]));
    let m = identity_mappings(&src, &dst);
    let d = Diff::compute(
        DiffInput::new("A.java", "A.java", Arc::new(src), Arc::new(dst), m),
        &DiffConfig {
            simplify: false,
            ..Default::default()
        },
    );
    assert_eq!(d.edit_script().len(), 3);
    assert!(
        d.edit_script()
            .iter()
            .all(|a| matches!(a, Action::Insert { .. }))
    );
    let call = find(d.dst_tree(), "Call", "");
    let inserted: Vec<_> = d.classifier().inserted_dsts().iter().copied().collect();
    assert_eq!(inserted, vec![call]);
}

#[test]
fn test_swapped_statements_are_one_move() {
    // foo(); bar();  ->  bar(); foo();
    let d = diff(
        Shape(
            "Block",
            "",
            vec![Shape("Call", "foo", vec![]), Shape("Call", "bar", vec![])],
        ),
        Shape(
            "Block",
            "",
            vec![Shape("Call", "bar", vec![]), Shape("Call", "foo", vec![])],
        ),
    );
    let bar = find(d.src_tree(), "Call", "bar");
    let bar_b = find(d.dst_tree(), "Call", "bar");
    let block = d.src_tree().root();

    // `foo` stays in the longest common subsequence; `bar` moves to the front.
    assert_eq!(
        d.edit_script().actions(),
        &[Action::Move {
            node_a: bar,
            node_b: bar_b,
            parent: ParentRef::Src(block),
            position: 0,
        }],
        "{}",
        d.edit_script()
    );
    let moved: Vec<_> = d.classifier().moved_srcs().iter().copied().collect();
    assert_eq!(moved, vec![bar]);
    let moved_b: Vec<_> = d.classifier().moved_dsts().iter().copied().collect();
    assert_eq!(moved_b, vec![bar_b]);
    assert!(d.classifier().inserted_dsts().is_empty());
    assert!(d.classifier().deleted_srcs().is_empty());
    assert!(d.replay().unwrap().structurally_eq(d.dst_tree()));
}

#[test]
fn test_merged_statements_are_one_multi_move() {
    // a = 1; b = 2;  ->  c = a + b;
    let src = build(&Shape(
        "Block",
        "",
        vec![
            Shape("ExpressionStatement", "a=1", vec![]),
            Shape("ExpressionStatement", "b=2", vec![]),
        ],
    ));
    let dst = build(&Shape(
        "Block",
        "",
        vec![Shape("ExpressionStatement", "c=a+b", vec![])],
    ));
    let a = find(&src, "ExpressionStatement", "a=1");
    let b = find(&src, "ExpressionStatement", "b=2");
    let c = find(&dst, "ExpressionStatement", "c=a+b");

    let mut m = MultiMappingStore::new();
    m.add_mapping(src.root(), dst.root());
    m.add_mapping(a, c);
    m.add_mapping(b, c);

    let multis: Vec<_> = m.dst_to_src_multis().collect();
    assert_eq!(multis, vec![(c, &[a, b][..])]);

    let d = Diff::compute(
        DiffInput::new("A.java", "A.java", Arc::new(src), Arc::new(dst), m),
        &DiffConfig::default(),
    );
    let groups: Vec<_> = d
        .edit_script()
        .enumerate()
        .filter(|(_, a)| matches!(a, Action::MultiMove { .. }))
        .collect();
    assert_eq!(groups.len(), 1, "{}", d.edit_script());
    let (group_id, group) = groups[0];
    assert_eq!(
        group,
        &Action::MultiMove {
            srcs: vec![a, b],
            dsts: vec![c],
        }
    );

    let cl = d.classifier();
    for n in [a, b] {
        assert!(cl.multi_map_src()[&n].contains(&group_id));
    }
    assert!(cl.multi_map_dst()[&c].contains(&group_id));
    assert!(cl.updated_srcs().contains(&a));
    assert!(cl.updated_dsts().contains(&c));
    assert!(d.replay().unwrap().structurally_eq(d.dst_tree()));
}

#[test]
fn test_identical_trees_have_empty_script() {
    let shape = || {
        if_block(vec![Shape(
            "Call",
            "",
            vec![Shape("Name", "foo", vec![])],
        )])
    };
    let d = diff(shape(), shape());
    assert!(d.edit_script().is_empty());
    assert_eq!(d.classifier(), &astdiff::TreeClassifier::default());
}
