//! Integration tests for model loading.

use std::fs;
use std::path::Path;

use glam::Vec3;
use showcase_resources::{Model, ResourceError};

/// One triangle: three float positions followed by three u16 indices.
const TRIANGLE_BUFFER: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA=";

/// Same triangle with indices `0, 1, 7`.
const BAD_INDEX_BUFFER: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAcAAAA=";

fn triangle_gltf(translation: [f32; 3]) -> String {
    triangle_gltf_with(translation, TRIANGLE_BUFFER)
}

fn triangle_gltf_with(translation: [f32; 3], buffer: &str) -> String {
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0, "translation": [{}, {}, {}] }}],
  "meshes": [{{ "name": "triangle", "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }}] }}],
  "buffers": [{{ "byteLength": 44, "uri": "data:application/octet-stream;base64,{}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
        translation[0], translation[1], translation[2], buffer
    )
}

#[test]
fn test_load_embedded_triangle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("triangle.gltf");
    fs::write(&path, triangle_gltf([0.0, 0.0, 0.0])).expect("write gltf");

    let model = Model::load(&path).expect("load triangle");
    assert_eq!(model.meshes.len(), 1);

    let mesh = &model.meshes[0];
    assert_eq!(mesh.positions, vec![Vec3::ZERO, Vec3::X, Vec3::Y]);
    assert_eq!(mesh.indices, vec![0, 1, 2]);
    // No normals or colors in the file: defaults fill every vertex.
    assert_eq!(mesh.normals, vec![Vec3::Y; 3]);
    assert_eq!(mesh.colors, vec![Vec3::ONE; 3]);
    assert_eq!(model.aabb_min, Vec3::ZERO);
    assert_eq!(model.aabb_max, Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn test_node_translation_is_baked_in() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("moved.gltf");
    fs::write(&path, triangle_gltf([0.0, 0.0, 5.0])).expect("write gltf");

    let model = Model::load(&path).expect("load moved triangle");
    assert!(model.meshes[0].positions.iter().all(|p| p.z == 5.0));
    assert_eq!(model.aabb_min.z, 5.0);
}

#[test]
fn test_malformed_gltf_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.gltf");
    fs::write(&path, "{ not json").expect("write gltf");

    match Model::load(&path) {
        Err(ResourceError::GltfLoad { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected GltfLoad error, got {:?}", other),
    }
}

#[test]
fn test_out_of_range_index_fails_to_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad_index.gltf");
    fs::write(&path, triangle_gltf_with([0.0, 0.0, 0.0], BAD_INDEX_BUFFER)).expect("write gltf");

    match Model::load(&path) {
        Err(ResourceError::IndexOutOfRange {
            mesh,
            index,
            vertex_count,
        }) => {
            assert_eq!(mesh, "triangle");
            assert_eq!(index, 7);
            assert_eq!(vertex_count, 3);
        }
        other => panic!("expected IndexOutOfRange, got {:?}", other),
    }
}

#[test]
fn test_load_asset_models() {
    for name in ["sphere.gltf", "monkey.gltf", "scene.gltf"] {
        let path = Path::new("../../assets/models").join(name);
        if !path.exists() {
            eprintln!("Skipping {}: asset not found at {:?}", name, path);
            continue;
        }

        let model = Model::load(&path).expect("load asset model");
        assert!(model.vertex_count() > 0);
        assert_eq!(model.index_count() % 3, 0);
        for mesh in &model.meshes {
            assert_eq!(mesh.normals.len(), mesh.positions.len());
            assert_eq!(mesh.colors.len(), mesh.positions.len());
        }
    }
}
