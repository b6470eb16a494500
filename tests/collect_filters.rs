use assert_fs::prelude::*;
use assert_fs::TempDir;

use pathZoom::fs_op::LocalFs;
use pathZoom::graph::{collect, Filters, MemoryGraph, ParmType, Scene};

const SCENE: &str = r#"{
    "variables": { "HIP": "@ROOT@" },
    "frame": 1001,
    "nodes": [
        { "path": "/obj/geo1/file1", "type": "file", "parameters": [
            { "name": "file", "type": "geometry", "value": "$HIP/geo/cube.bgeo.sc" },
            { "name": "tx", "type": "float", "value": "0" }
        ] },
        { "path": "/obj/geo1/file2", "type": "file", "parameters": [
            { "name": "file", "type": "geometry", "value": "$HIP/geo/gone.bgeo.sc" }
        ] },
        { "path": "/out/render", "type": "karma", "parameters": [
            { "name": "picture", "type": "image-sequence", "value": "$HIP/render/beauty.$F4.exr" },
            { "name": "backup", "type": "image", "value": "  " }
        ] }
    ]
}"#;

fn fixture() -> (TempDir, MemoryGraph) {
    let tmp = TempDir::new().unwrap();
    tmp.child("geo/cube.bgeo.sc").touch().unwrap();
    tmp.child("render/beauty.1002.exr").touch().unwrap();
    let text = SCENE.replace("@ROOT@", &tmp.path().display().to_string());
    let scene: Scene = serde_json::from_str(&text).unwrap();
    (tmp, MemoryGraph::new(scene))
}

#[test]
fn missing_is_judged_on_the_whole_sequence() {
    let (_tmp, graph) = fixture();
    let refs = collect(&graph, &Filters::default(), &LocalFs).unwrap();
    let flags: Vec<(&str, bool)> = refs.iter().map(|r| (r.node.as_str(), r.missing)).collect();
    // Frame 1001 is not on disk, but another member of the sequence is.
    assert_eq!(
        flags,
        vec![
            ("/obj/geo1/file1", false),
            ("/obj/geo1/file2", true),
            ("/out/render", false),
        ]
    );
}

#[test]
fn show_missing_keeps_only_missing_files() {
    let (_tmp, graph) = fixture();
    let filters = Filters {
        show_missing: true,
        ..Filters::default()
    };
    let refs = collect(&graph, &filters, &LocalFs).unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].node, "/obj/geo1/file2");
    assert_eq!(refs[0].index, 0);
}

#[test]
fn type_and_name_filters_combine() {
    let (_tmp, graph) = fixture();
    let filters = Filters {
        parm_types: [ParmType::ImageSequence, ParmType::Image].into_iter().collect(),
        show_empty: true,
        ..Filters::default()
    };
    let refs = collect(&graph, &filters, &LocalFs).unwrap();
    let parms: Vec<&str> = refs.iter().map(|r| r.parm.as_str()).collect();
    assert_eq!(parms, vec!["picture", "backup"]);
    assert!(refs[1].empty);

    let filters = Filters {
        node_paths: vec!["/obj/**".into()],
        parm_names: vec!["fi*".into()],
        ..Filters::default()
    };
    assert_eq!(collect(&graph, &filters, &LocalFs).unwrap().len(), 2);
}
