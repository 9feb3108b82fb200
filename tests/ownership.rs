mod common;

use common::{FIELD_DROPS, MESH_DROPS, ProbeField, ProbeMesh};
use mesh_restart::collection::Ownership;
use mesh_restart::comm::NoComm;
use mesh_restart::indexed::IndexedCollection;
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::Ordering::Relaxed;

// These tests account for fixture drops through global counters, so they
// must not run concurrently with each other.

fn saved_checkpoint(tmp: &tempfile::TempDir) {
    let mut writer = IndexedCollection::with_mesh(
        "run",
        Arc::new(ProbeMesh::unit_triangle()),
        Arc::new(NoComm),
    );
    writer.set_prefix_path(tmp.path().to_str().expect("utf-8 tempdir"));
    writer.set_cycle(0);
    writer.register_field("pressure", Arc::new(ProbeField::scalar(&[1.0, 2.0, 3.0])));
    writer.save().expect("save");
}

#[test]
#[serial]
fn borrowed_data_is_never_released_by_the_collection() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mesh = Arc::new(ProbeMesh::unit_triangle());
    let field = Arc::new(ProbeField::scalar(&[1.0, 2.0, 3.0]));

    let mesh_drops = MESH_DROPS.load(Relaxed);
    let field_drops = FIELD_DROPS.load(Relaxed);
    {
        let mut collection =
            IndexedCollection::with_mesh("run", mesh.clone(), Arc::new(NoComm));
        collection.set_prefix_path(tmp.path().to_str().expect("utf-8"));
        collection.register_field("pressure", field.clone());
        assert_eq!(collection.ownership(), Ownership::Borrowed);
        assert_eq!(Arc::strong_count(&mesh), 2);
        assert_eq!(Arc::strong_count(&field), 2);

        collection.delete_data();
        assert_eq!(Arc::strong_count(&mesh), 1);
        assert_eq!(Arc::strong_count(&field), 1);
    }
    // Dropping the collection released nothing the caller still holds.
    assert_eq!(MESH_DROPS.load(Relaxed), mesh_drops);
    assert_eq!(FIELD_DROPS.load(Relaxed), field_drops);
    assert_eq!(mesh.vertices.len(), 3);
    assert_eq!(field.values.len(), 3);
}

#[test]
#[serial]
fn loaded_data_is_released_exactly_once() {
    let tmp = tempfile::tempdir().expect("tempdir");
    saved_checkpoint(&tmp);

    let mesh_drops = MESH_DROPS.load(Relaxed);
    let field_drops = FIELD_DROPS.load(Relaxed);

    let mut reader: IndexedCollection<ProbeMesh, ProbeField> =
        IndexedCollection::new("run", Arc::new(NoComm));
    reader.set_prefix_path(tmp.path().to_str().expect("utf-8"));
    reader.load(0).expect("load");
    assert_eq!(reader.ownership(), Ownership::Owned);
    assert_eq!(MESH_DROPS.load(Relaxed), mesh_drops);
    assert_eq!(FIELD_DROPS.load(Relaxed), field_drops);

    // delete_all releases exactly the loaded mesh and field.
    reader.delete_all();
    assert_eq!(MESH_DROPS.load(Relaxed), mesh_drops + 1);
    assert_eq!(FIELD_DROPS.load(Relaxed), field_drops + 1);
    assert_eq!(reader.ownership(), Ownership::Borrowed);

    // Destruction afterwards releases nothing further.
    drop(reader);
    assert_eq!(MESH_DROPS.load(Relaxed), mesh_drops + 1);
    assert_eq!(FIELD_DROPS.load(Relaxed), field_drops + 1);
}

#[test]
#[serial]
fn a_fresh_load_releases_previously_owned_data() {
    let tmp = tempfile::tempdir().expect("tempdir");
    saved_checkpoint(&tmp);

    let mut reader: IndexedCollection<ProbeMesh, ProbeField> =
        IndexedCollection::new("run", Arc::new(NoComm));
    reader.set_prefix_path(tmp.path().to_str().expect("utf-8"));
    reader.load(0).expect("first load");

    let mesh_drops = MESH_DROPS.load(Relaxed);
    let field_drops = FIELD_DROPS.load(Relaxed);
    reader.load(0).expect("second load");
    // The second load first released the mesh and field the first one
    // produced, then loaded fresh ones.
    assert_eq!(MESH_DROPS.load(Relaxed), mesh_drops + 1);
    assert_eq!(FIELD_DROPS.load(Relaxed), field_drops + 1);
    assert_eq!(reader.ownership(), Ownership::Owned);
}

#[test]
#[serial]
fn reregistering_an_owned_field_does_not_leak_it() {
    let tmp = tempfile::tempdir().expect("tempdir");
    saved_checkpoint(&tmp);

    let mut reader: IndexedCollection<ProbeMesh, ProbeField> =
        IndexedCollection::new("run", Arc::new(NoComm));
    reader.set_prefix_path(tmp.path().to_str().expect("utf-8"));
    reader.load(0).expect("load");

    let field_drops = FIELD_DROPS.load(Relaxed);
    reader.register_field("pressure", Arc::new(ProbeField::scalar(&[9.0])));
    // The loaded value under that name was released on overwrite.
    assert_eq!(FIELD_DROPS.load(Relaxed), field_drops + 1);
}
