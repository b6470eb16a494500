use assert_fs::prelude::*;
use assert_fs::TempDir;

use pathZoom::fs_op::LocalFs;
use pathZoom::graph::{collect, Filters, Graph, MemoryGraph, Scene, SceneNode, SceneParm};
use pathZoom::plan::plan;
use pathZoom::resolve::{ChangeNote, ChangeStatus, FileOp, Method, RewriteRule};

fn node(path: &str, value: &str) -> SceneNode {
    SceneNode {
        path: path.into(),
        type_name: "file".into(),
        parameters: vec![SceneParm {
            name: "file".into(),
            type_tag: "image".into(),
            value: value.into(),
            locked: false,
        }],
    }
}

fn graph(root: &str, values: &[&str]) -> MemoryGraph {
    MemoryGraph::new(Scene {
        variables: [("HIP".to_string(), root.to_string())].into_iter().collect(),
        nodes: values
            .iter()
            .enumerate()
            .map(|(i, v)| node(&format!("/obj/tex{}", i), v))
            .collect(),
        ..Scene::default()
    })
}

#[test]
fn renaming_two_files_to_one_name_is_a_conflict() {
    let graph = graph("/proj", &["$HIP/tex/a.exr", "$HIP/tex/b.exr", "$HIP/tex/d.exr"]);
    let refs = collect(&graph, &Filters::default(), &LocalFs).unwrap();
    let rule = RewriteRule {
        pattern: r"[ab]\.exr$".into(),
        replacement: "c.exr".into(),
        ..RewriteRule::new(Method::ReplaceRegex)
    }
    .validate()
    .unwrap();

    let mut p = plan(&refs, &rule, &graph.context(), &LocalFs);
    let statuses: Vec<ChangeStatus> = p.changes().iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![ChangeStatus::Conflict, ChangeStatus::Conflict, ChangeStatus::NoOp]
    );
    assert!(p.changes()[0].notes.contains(&ChangeNote::SharedDestination));
    assert_eq!(p.changes()[0].new_raw, "$HIP/tex/c.exr");
    assert!(p.steps().is_empty());

    let summary = p.summary();
    assert_eq!(summary.conflicts, 2);
    assert_eq!(summary.unchanged, 1);

    assert!(p.force(0));
    let steps = p.steps();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].members, vec![0]);
}

#[test]
fn copies_sharing_a_source_collapse_into_one_step() {
    let tmp = TempDir::new().unwrap();
    tmp.child("src/plate.exr").touch().unwrap();
    let root = tmp.path().display().to_string();
    let graph = graph(&root, &["$HIP/src/plate.exr", "$HIP/src/plate.exr"]);
    let refs = collect(&graph, &Filters::default(), &LocalFs).unwrap();
    let rule = RewriteRule {
        destination_root: Some("$HIP/out".into()),
        ..RewriteRule::new(Method::Copy)
    }
    .validate()
    .unwrap();

    let p = plan(&refs, &rule, &graph.context(), &LocalFs);
    assert!(p
        .changes()
        .iter()
        .all(|c| c.status == ChangeStatus::Pending && c.file_op == FileOp::Copy));
    assert_eq!(p.changes()[0].new_raw, "$HIP/out/plate.exr");
    let steps = p.steps();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].members, vec![0, 1]);
    assert_eq!(steps[0].destination, format!("{root}/out/plate.exr"));
}

#[test]
fn preserved_structure_keeps_the_relative_tail() {
    let tmp = TempDir::new().unwrap();
    tmp.child("assets/wood/diffuse.exr").touch().unwrap();
    tmp.child("elsewhere/grid.exr").touch().unwrap();
    let root = tmp.path().display().to_string();
    let graph = graph(&root, &["$HIP/assets/wood/diffuse.exr", "$HIP/elsewhere/grid.exr"]);
    let refs = collect(&graph, &Filters::default(), &LocalFs).unwrap();
    let rule = RewriteRule {
        destination_root: Some("$HIP/publish".into()),
        preserve_relative_structure: true,
        relative_root: Some("$HIP/assets".into()),
        ..RewriteRule::new(Method::Move)
    }
    .validate()
    .unwrap();

    let p = plan(&refs, &rule, &graph.context(), &LocalFs);
    assert_eq!(p.changes()[0].new_raw, "$HIP/publish/wood/diffuse.exr");
    // Outside the relative root only the file name is kept.
    assert_eq!(p.changes()[1].new_raw, "$HIP/publish/grid.exr");
}

#[test]
fn missing_copy_sources_are_unchanged() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().display().to_string();
    let graph = graph(&root, &["$HIP/gone.exr"]);
    let refs = collect(&graph, &Filters::default(), &LocalFs).unwrap();
    assert!(refs[0].missing);
    let rule = RewriteRule {
        destination_root: Some("$HIP/out".into()),
        ..RewriteRule::new(Method::Copy)
    }
    .validate()
    .unwrap();
    let p = plan(&refs, &rule, &graph.context(), &LocalFs);
    assert!(p.changes()[0].is_noop());
    assert_eq!(p.changes()[0].notes, vec![ChangeNote::SourceMissing]);
}

#[test]
fn moving_onto_an_existing_file_needs_force() {
    let tmp = TempDir::new().unwrap();
    tmp.child("a.exr").touch().unwrap();
    tmp.child("out/a.exr").touch().unwrap();
    let root = tmp.path().display().to_string();
    let graph = graph(&root, &["$HIP/a.exr"]);
    let refs = collect(&graph, &Filters::default(), &LocalFs).unwrap();
    let rule = RewriteRule {
        destination_root: Some("$HIP/out".into()),
        ..RewriteRule::new(Method::Move)
    }
    .validate()
    .unwrap();

    let mut p = plan(&refs, &rule, &graph.context(), &LocalFs);
    assert_eq!(p.changes()[0].status, ChangeStatus::WouldOverwrite);
    assert!(p.steps().is_empty());
    assert_eq!(p.force_all(), 1);
    let steps = p.steps();
    assert_eq!(steps.len(), 1);
    assert!(steps[0].overwrite);
}
