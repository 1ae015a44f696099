//! SubLink and LHaloTree loads, offset caching and merger analytics on
//! trees read from disk.

mod common;

use common::{build, SNAP};
use rustyillustris::{
    max_past_mass, num_mergers, CachePolicy, Config, Error, Fields, OffsetCache, PartType,
    Simulation, TreeOptions,
};

fn id_column(tree: &rustyillustris::FieldSet, field: &str) -> Vec<i64> {
    tree.require(field).unwrap().to_i64_vec().unwrap()
}

// ---------------------------------------------------------------------------
// SubLink
// ---------------------------------------------------------------------------

#[test]
fn full_progenitor_tree() {
    let fx = build();
    for base in [&fx.legacy, &fx.tng] {
        let sim = Simulation::new(base);
        let tree = sim
            .load_sublink_tree(SNAP, 0, ["SubhaloID", "SnapNum"], &TreeOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(tree.count, 6);
        assert_eq!(id_column(&tree, "SubhaloID"), [1000, 1001, 1002, 1003, 1004, 1005]);
        assert_eq!(id_column(&tree, "SnapNum"), [99, 98, 97, 96, 98, 97]);
    }
}

#[test]
fn main_progenitor_branch() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    let tree = sim
        .load_sublink_tree(SNAP, 0, "SubhaloID", &TreeOptions::main_branch())
        .unwrap()
        .unwrap();
    assert_eq!(id_column(&tree, "SubhaloID"), [1000, 1001, 1002, 1003]);

    // branch starting inside the tree file
    let tree = sim
        .load_sublink_tree(SNAP, 1, "SubhaloID", &TreeOptions::main_branch())
        .unwrap()
        .unwrap();
    assert_eq!(id_column(&tree, "SubhaloID"), [1002, 1003]);
}

#[test]
fn main_descendant_branch() {
    let fx = build();
    let sim = Simulation::new(&fx.tng);
    let tree = sim
        .load_sublink_tree(
            SNAP,
            1,
            ["SubhaloID", "DescendantID"],
            &TreeOptions::main_descendant_branch(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(tree.count, 3);
    assert_eq!(id_column(&tree, "SubhaloID"), [1002, 1001, 1000]);
    assert_eq!(id_column(&tree, "DescendantID"), [1001, 1000, -1]);
}

#[test]
fn exclusive_branch_options() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    let opts = TreeOptions {
        only_main_branch: true,
        only_main_descendant_branch: true,
        ..TreeOptions::default()
    };
    assert!(matches!(
        sim.load_sublink_tree(SNAP, 0, Fields::All, &opts),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn untracked_subhalo_has_no_tree() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    assert!(sim
        .load_sublink_tree(SNAP, 2, Fields::All, &TreeOptions::default())
        .unwrap()
        .is_none());
}

#[test]
fn tree_spanning_files() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    assert!(matches!(
        sim.load_sublink_tree(SNAP, 3, "SubhaloID", &TreeOptions::default()),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn missing_tree_field() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    assert!(matches!(
        sim.load_sublink_tree(SNAP, 0, ["SubhaloID", "GroupMass"], &TreeOptions::default()),
        Err(Error::MissingField(f)) if f == "GroupMass"
    ));
}

#[test]
fn missing_tree_files() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    // no such tree directory
    let renamed = TreeOptions::default().tree_name("SubLink_dm");
    assert!(matches!(
        sim.load_sublink_tree(SNAP, 0, "SubhaloID", &renamed),
        Err(Error::NotFound(_))
    ));
    // galaxy trees need the offsets file, which this run lacks
    let gal = TreeOptions::default().tree_name("SubLink_gal");
    assert!(matches!(
        sim.load_sublink_tree(SNAP, 0, "SubhaloID", &gal),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn offset_cache_policies() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    let dir = fx.legacy.join("trees").join("SubLink");

    sim.load_sublink_tree(SNAP, 0, "SubhaloID", &TreeOptions::default().cache(CachePolicy::Disabled))
        .unwrap();
    assert!(!sim.offset_cache().contains(&dir));

    let own = OffsetCache::new();
    sim.load_sublink_tree(SNAP, 0, "SubhaloID", &TreeOptions::default().cache(CachePolicy::Custom(&own)))
        .unwrap();
    assert!(own.contains(&dir));
    assert!(!sim.offset_cache().contains(&dir));

    sim.load_sublink_tree(SNAP, 0, "SubhaloID", &TreeOptions::default())
        .unwrap();
    assert!(sim.offset_cache().contains(&dir));
}

#[test]
fn mergers_on_a_loaded_tree() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    let fields = [
        "SubhaloID",
        "NextProgenitorID",
        "MainLeafProgenitorID",
        "FirstProgenitorID",
        "SubhaloMassType",
    ];
    let tree = sim
        .load_sublink_tree(SNAP, 0, fields, &TreeOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(max_past_mass(&tree, 0, PartType::STARS).unwrap(), 10.0);
    assert_eq!(max_past_mass(&tree, 4, PartType::STARS).unwrap(), 2.0);
    // side branch 2 against main branch 8
    assert_eq!(num_mergers(&tree, 0.1, PartType::STARS, 0).unwrap(), 1);
    assert_eq!(num_mergers(&tree, 0.3, PartType::STARS, 0).unwrap(), 0);

    let partial = sim
        .load_sublink_tree(SNAP, 0, ["SubhaloID", "SubhaloMassType"], &TreeOptions::default())
        .unwrap()
        .unwrap();
    assert!(matches!(
        num_mergers(&partial, 0.1, PartType::STARS, 0),
        Err(Error::MissingField(_))
    ));
}

// ---------------------------------------------------------------------------
// LHaloTree
// ---------------------------------------------------------------------------

#[test]
fn lhalo_tree_depth_first() {
    let fx = build();
    for base in [&fx.legacy, &fx.tng] {
        let sim = Simulation::new(base);
        let tree = sim
            .load_lhalo_tree(SNAP, 0, ["SubhaloMass", "SubhaloPos"], &TreeOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(tree.count, 8);
        let rows: Vec<f64> = tree
            .require("SubhaloMass")
            .unwrap()
            .to_f64_vec()
            .iter()
            .map(|m| m / 1.5)
            .collect();
        assert_eq!(rows, [0.0, 1.0, 2.0, 5.0, 3.0, 4.0, 6.0, 7.0]);
        assert_eq!(tree.require("SubhaloPos").unwrap().shape(), &[8, 3]);
    }
}

#[test]
fn lhalo_main_branch_is_prefix() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    let full = sim
        .load_lhalo_tree(SNAP, 0, "SubhaloMass", &TreeOptions::default())
        .unwrap()
        .unwrap();
    let main = sim
        .load_lhalo_tree(SNAP, 0, "SubhaloMass", &TreeOptions::main_branch())
        .unwrap()
        .unwrap();
    assert_eq!(main.count, 4);
    assert_eq!(
        main.require("SubhaloMass").unwrap(),
        &full.require("SubhaloMass").unwrap().slice_rows(0..4).unwrap()
    );
}

#[test]
fn lhalo_subtrees() {
    let fx = build();
    let sim = Simulation::new(&fx.tng);
    let masses = |id| -> Vec<f64> {
        sim.load_lhalo_tree(SNAP, id, "SubhaloMass", &TreeOptions::default())
            .unwrap()
            .unwrap()
            .require("SubhaloMass")
            .unwrap()
            .to_f64_vec()
    };
    assert_eq!(masses(1), [1.5, 3.0, 7.5, 4.5]);
    assert_eq!(masses(3), [9.0, 10.5]);
    assert!(sim
        .load_lhalo_tree(SNAP, 2, Fields::All, &TreeOptions::default())
        .unwrap()
        .is_none());
}

#[test]
fn lhalo_per_row_and_preloaded_reads_agree() {
    let fx = build();
    let per_row = Simulation::new(&fx.legacy);
    let preload = Simulation::open(Config {
        small_tree_rows: 1,
        ..Config::new(&fx.legacy)
    });
    let opts = TreeOptions::default();
    let a = per_row.load_lhalo_tree(SNAP, 0, Fields::All, &opts).unwrap().unwrap();
    let b = preload.load_lhalo_tree(SNAP, 0, Fields::All, &opts).unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(
        a.names().collect::<Vec<_>>(),
        ["FirstProgenitor", "NextProgenitor", "SubhaloMass", "SubhaloPos"]
    );
}

#[test]
fn lhalo_missing_field() {
    let fx = build();
    let sim = Simulation::new(&fx.legacy);
    assert!(matches!(
        sim.load_lhalo_tree(SNAP, 0, "SubhaloVel", &TreeOptions::default()),
        Err(Error::MissingField(f)) if f == "Tree0/SubhaloVel"
    ));
}
