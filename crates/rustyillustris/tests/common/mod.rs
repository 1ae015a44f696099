//! A small synthetic simulation written to disk as real HDF5 chunk files.
//!
//! Two runs share the same particles and objects:
//! - `legacy`: Illustris-style `groups_NNN` catalogs carrying `Offsets/*`
//!   datasets and `FileOffsets_*` header attributes.
//! - `tng`: TNG-style `fof_subhalo_tab_NNN` catalogs with a separate
//!   `postprocessing/offsets/offsets_NNN.hdf5` file.
//!
//! Snapshot 99 has 11 gas cells over chunks of [5, 0, 6] rows and 5 stars
//! over [2, 3, 0]. Gas `ParticleIDs` are `100 + index`, star IDs `500 + index`.
//!
//! | halo | gas (len, offset) | stars (len, offset) | subhalos |
//! |------|-------------------|---------------------|----------|
//! | 0    | 4, 0              | 2, 0                | 0, 1     |
//! | 1    | 3, 4              | 2, 2                | 2        |
//! | 2    | 2, 7              | 1, 4                | 3        |
//!
//! Gas 9 and 10 are outer fuzz (bound to no halo).

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rustyillustris_format::file_writer::{AttrValue, FileWriter};
use tempfile::TempDir;

pub const SNAP: u32 = 99;
pub const GAS_PER_CHUNK: [u32; 3] = [5, 0, 6];
pub const STARS_PER_CHUNK: [u32; 3] = [2, 3, 0];
pub const NUM_GAS: u32 = 11;
pub const NUM_STARS: u32 = 5;

pub const GROUP_LEN: [[i32; 6]; 3] = [[4, 0, 0, 0, 2, 0], [3, 0, 0, 0, 2, 0], [2, 0, 0, 0, 1, 0]];
pub const GROUP_OFF: [[i64; 6]; 3] = [[0, 0, 0, 0, 0, 0], [4, 0, 0, 0, 2, 0], [7, 0, 0, 0, 4, 0]];
pub const SUB_LEN: [[i32; 6]; 4] = [
    [3, 0, 0, 0, 1, 0],
    [1, 0, 0, 0, 1, 0],
    [2, 0, 0, 0, 2, 0],
    [2, 0, 0, 0, 1, 0],
];
pub const SUB_OFF: [[i64; 6]; 4] = [
    [0, 0, 0, 0, 0, 0],
    [3, 0, 0, 0, 1, 0],
    [4, 0, 0, 0, 2, 0],
    [7, 0, 0, 0, 4, 0],
];
/// Catalog chunk of each halo and each subhalo.
pub const GROUP_CHUNKS: [std::ops::Range<usize>; 2] = [0..2, 2..3];
pub const SUB_CHUNKS: [std::ops::Range<usize>; 2] = [0..3, 3..4];

/// SubLink offsets per subhalo: (RowNum, LastProgenitorID, SubhaloID).
/// Subhalo 2 is untracked; subhalo 3's tree runs past the end of its file.
pub const SUBLINK: [(i64, i64, i64); 4] = [(3, 1005, 1000), (5, 1003, 1002), (-1, -1, -1), (1, 4, 1)];

/// LHaloTree offsets per subhalo: (File, Index, Num).
pub const LHALO: [(i32, i32, i32); 4] = [(0, 0, 0), (0, 1, 0), (0, 0, -1), (0, 6, 0)];

pub struct Fixture {
    _dir: TempDir,
    pub legacy: PathBuf,
    pub tng: PathBuf,
}

pub fn build() -> Fixture {
    let dir = TempDir::new().unwrap();
    let legacy = dir.path().join("Illustris-3").join("output");
    let tng = dir.path().join("TNG-Cluster").join("output");

    for base in [&legacy, &tng] {
        snapshot(base, SNAP, 3, true);
    }
    legacy_catalog(&legacy);
    tng_catalog(&tng);
    offsets_file(&tng);

    sublink_chunks(&legacy.join("trees").join("SubLink"));
    sublink_chunks(&tng.join("..").join("postprocessing").join("trees").join("SubLink"));
    lhalo_chunk(&legacy.join("trees").join("treedata").join("trees_sf1_135.0.hdf5"));
    lhalo_chunk(
        &tng.join("..")
            .join("postprocessing")
            .join("trees")
            .join("LHaloTree")
            .join("trees_sf1_099.0.hdf5"),
    );
    cartesian(&legacy, 5);

    Fixture {
        _dir: dir,
        legacy,
        tng,
    }
}

pub fn put(path: &Path, w: FileWriter) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, w.finish().unwrap()).unwrap();
}

fn flat<T: Copy, const N: usize>(rows: &[[T; N]]) -> Vec<T> {
    rows.iter().flat_map(|r| r.iter().copied()).collect()
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Write snapshot `snap` with `declared_files` in its header.
pub fn snapshot(base: &Path, snap: u32, declared_files: i32, high_word: bool) {
    let mut gas_start = 0u32;
    let mut star_start = 0u32;
    for chunk in 0..3 {
        let (ng, ns) = (GAS_PER_CHUNK[chunk], STARS_PER_CHUNK[chunk]);
        let mut w = FileWriter::new();
        w.create_group("Header").unwrap();
        let this_file = [ng, 0, 0, 0, ns, 0];
        w.set_attr("Header", "NumPart_ThisFile", AttrValue::array(&this_file.map(|v| v as i32)))
            .unwrap();
        w.set_attr("Header", "NumPart_Total", AttrValue::array(&[NUM_GAS, 0, 0, 0, NUM_STARS, 0]))
            .unwrap();
        if high_word {
            w.set_attr("Header", "NumPart_Total_HighWord", AttrValue::array(&[0u32; 6]))
                .unwrap();
        }
        w.set_attr("Header", "NumFilesPerSnapshot", AttrValue::scalar(declared_files))
            .unwrap();

        if ng > 0 {
            let idx: Vec<u32> = (gas_start..gas_start + ng).collect();
            let ids: Vec<u64> = idx.iter().map(|&i| 100 + i as u64).collect();
            let masses: Vec<f32> = idx.iter().map(|&i| i as f32 * 0.5).collect();
            let coords: Vec<f64> = idx
                .iter()
                .flat_map(|&i| [i as f64, 2.0 * i as f64, 3.0 * i as f64])
                .collect();
            w.write("PartType0/ParticleIDs", &[ng as u64], &ids).unwrap();
            w.write("PartType0/Masses", &[ng as u64], &masses).unwrap();
            w.write("PartType0/Coordinates", &[ng as u64, 3], &coords).unwrap();
        }
        if ns > 0 {
            let idx: Vec<u32> = (star_start..star_start + ns).collect();
            let ids: Vec<u64> = idx.iter().map(|&i| 500 + i as u64).collect();
            let masses: Vec<f64> = idx.iter().map(|&i| 1.0 + i as f64).collect();
            w.write("PartType4/ParticleIDs", &[ns as u64], &ids).unwrap();
            w.write("PartType4/Masses", &[ns as u64], &masses).unwrap();
        }
        gas_start += ng;
        star_start += ns;

        let path = base
            .join(format!("snapdir_{snap:03}"))
            .join(format!("snap_{snap:03}.{chunk}.hdf5"));
        put(&path, w);
    }
}

/// First particle of each type in each snapshot chunk, type-major.
fn snap_offsets() -> [[i64; 3]; 6] {
    let mut out = [[0i64; 3]; 6];
    for c in 1..3 {
        out[0][c] = out[0][c - 1] + GAS_PER_CHUNK[c - 1] as i64;
        out[4][c] = out[4][c - 1] + STARS_PER_CHUNK[c - 1] as i64;
    }
    out
}

// ---------------------------------------------------------------------------
// Group catalogs
// ---------------------------------------------------------------------------

fn catalog_objects(w: &mut FileWriter, chunk: usize) {
    let halos = GROUP_CHUNKS[chunk].clone();
    let subs = SUB_CHUNKS[chunk].clone();
    let nh = halos.len() as u64;
    let ns = subs.len() as u64;

    if nh > 0 {
        w.write("Group/GroupLenType", &[nh, 6], &flat(&GROUP_LEN[halos.clone()])).unwrap();
        let mass: Vec<f32> = halos.clone().map(|h| 10.0 * (h + 1) as f32).collect();
        w.write("Group/GroupMass", &[nh], &mass).unwrap();
        let pos: Vec<f32> = halos
            .clone()
            .flat_map(|h| [h as f32, h as f32 + 0.5, h as f32 + 0.25])
            .collect();
        w.write("Group/GroupPos", &[nh, 3], &pos).unwrap();
    }
    if ns > 0 {
        w.write("Subhalo/SubhaloLenType", &[ns, 6], &flat(&SUB_LEN[subs.clone()])).unwrap();
        let mass: Vec<f32> = subs.clone().map(|s| (s + 1) as f32).collect();
        w.write("Subhalo/SubhaloMass", &[ns], &mass).unwrap();
        let grnr: Vec<i32> = subs.clone().map(|s| [0, 0, 1, 2][s]).collect();
        w.write("Subhalo/SubhaloGrNr", &[ns], &grnr).unwrap();
    }
}

fn legacy_catalog(base: &Path) {
    for chunk in 0..2 {
        let halos = GROUP_CHUNKS[chunk].clone();
        let subs = SUB_CHUNKS[chunk].clone();
        let mut w = FileWriter::new();
        w.create_group("Header").unwrap();
        w.set_attr("Header", "Ngroups_ThisFile", AttrValue::scalar(halos.len() as i32)).unwrap();
        w.set_attr("Header", "Ngroups_Total", AttrValue::scalar(3i32)).unwrap();
        w.set_attr("Header", "Nsubgroups_ThisFile", AttrValue::scalar(subs.len() as i32)).unwrap();
        w.set_attr("Header", "Nsubgroups_Total", AttrValue::scalar(4i32)).unwrap();
        w.set_attr("Header", "NumFiles", AttrValue::scalar(2i32)).unwrap();
        w.set_attr("Header", "FileOffsets_Group", AttrValue::array(&[0i64, 2])).unwrap();
        w.set_attr("Header", "FileOffsets_Subhalo", AttrValue::array(&[0i64, 3])).unwrap();
        w.set_attr("Header", "FileOffsets_Snap", AttrValue::array_2d(6, 3, &flat(&snap_offsets())))
            .unwrap();
        catalog_objects(&mut w, chunk);

        let nh = halos.len() as u64;
        let ns = subs.len() as u64;
        w.write("Offsets/Group_SnapByType", &[nh, 6], &flat(&GROUP_OFF[halos])).unwrap();
        w.write("Offsets/Subhalo_SnapByType", &[ns, 6], &flat(&SUB_OFF[subs.clone()])).unwrap();
        let pick = |f: fn(&(i64, i64, i64)) -> i64| -> Vec<i64> { SUBLINK[subs.clone()].iter().map(f).collect() };
        w.write("Offsets/Subhalo_SublinkRowNum", &[ns], &pick(|s| s.0)).unwrap();
        w.write("Offsets/Subhalo_SublinkLastProgenitorID", &[ns], &pick(|s| s.1)).unwrap();
        w.write("Offsets/Subhalo_SublinkSubhaloID", &[ns], &pick(|s| s.2)).unwrap();
        let lhalo = |f: fn(&(i32, i32, i32)) -> i32| -> Vec<i32> { LHALO[subs.clone()].iter().map(f).collect() };
        w.write("Offsets/Subhalo_LHaloTreeFile", &[ns], &lhalo(|s| s.0)).unwrap();
        w.write("Offsets/Subhalo_LHaloTreeIndex", &[ns], &lhalo(|s| s.1)).unwrap();
        w.write("Offsets/Subhalo_LHaloTreeNum", &[ns], &lhalo(|s| s.2)).unwrap();

        let path = base
            .join(format!("groups_{SNAP:03}"))
            .join(format!("groups_{SNAP:03}.{chunk}.hdf5"));
        put(&path, w);
    }
}

fn tng_catalog(base: &Path) {
    for chunk in 0..2 {
        let halos = GROUP_CHUNKS[chunk].clone();
        let subs = SUB_CHUNKS[chunk].clone();
        let mut w = FileWriter::new();
        w.create_group("Header").unwrap();
        w.set_attr("Header", "Ngroups_ThisFile", AttrValue::scalar(halos.len() as i32)).unwrap();
        w.set_attr("Header", "Ngroups_Total", AttrValue::scalar(3i32)).unwrap();
        w.set_attr("Header", "Nsubhalos_ThisFile", AttrValue::scalar(subs.len() as i32)).unwrap();
        w.set_attr("Header", "Nsubhalos_Total", AttrValue::scalar(4i32)).unwrap();
        w.set_attr("Header", "NumFiles", AttrValue::scalar(2i32)).unwrap();
        catalog_objects(&mut w, chunk);
        // original zoom halo IDs: halo 0 came from zoom 8
        let orig: Vec<i64> = halos.clone().map(|h| [8, 7, 9][h]).collect();
        w.write("Group/GroupOrigHaloID", &[halos.len() as u64], &orig).unwrap();

        let path = base
            .join(format!("groups_{SNAP:03}"))
            .join(format!("fof_subhalo_tab_{SNAP:03}.{chunk}.hdf5"));
        put(&path, w);
    }
}

fn offsets_file(base: &Path) {
    let mut w = FileWriter::new();
    w.write("FileOffsets/Group", &[2], &[0i64, 2]).unwrap();
    w.write("FileOffsets/Subhalo", &[2], &[0i64, 3]).unwrap();
    // chunk-major
    let by_type = snap_offsets();
    let chunk_major: Vec<i64> = (0..3).flat_map(|c| (0..6).map(move |t| by_type[t][c])).collect();
    w.write("FileOffsets/SnapByType", &[3, 6], &chunk_major).unwrap();
    w.write("Group/SnapByType", &[3, 6], &flat(&GROUP_OFF)).unwrap();
    w.write("Subhalo/SnapByType", &[4, 6], &flat(&SUB_OFF)).unwrap();

    let sublink: Vec<[i64; 3]> = SUBLINK.iter().map(|s| [s.0, s.1, s.2]).collect();
    w.write("Subhalo/SubLink/RowNum", &[4], &sublink.iter().map(|s| s[0]).collect::<Vec<_>>()).unwrap();
    w.write("Subhalo/SubLink/LastProgenitorID", &[4], &sublink.iter().map(|s| s[1]).collect::<Vec<_>>())
        .unwrap();
    w.write("Subhalo/SubLink/SubhaloID", &[4], &sublink.iter().map(|s| s[2]).collect::<Vec<_>>()).unwrap();
    w.write("Subhalo/LHaloTree/File", &[4], &LHALO.map(|s| s.0)).unwrap();
    w.write("Subhalo/LHaloTree/Index", &[4], &LHALO.map(|s| s.1)).unwrap();
    w.write("Subhalo/LHaloTree/Num", &[4], &LHALO.map(|s| s.2)).unwrap();

    // zoom 7 is halo 1's region, zoom 8 covers halo 0 plus the two fuzz cells
    w.write("OriginalZooms/HaloIDs", &[2], &[7i64, 8]).unwrap();
    w.write("OriginalZooms/GroupsTotalLengthByType", &[2, 6], &[3i64, 0, 0, 0, 2, 0, 4, 0, 0, 0, 2, 0])
        .unwrap();
    w.write("OriginalZooms/GroupsSnapOffsetByType", &[2, 6], &[4i64, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    w.write("OriginalZooms/OuterFuzzTotalLengthByType", &[2, 6], &[0i64, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0])
        .unwrap();
    w.write("OriginalZooms/OuterFuzzSnapOffsetByType", &[2, 6], &[0i64, 0, 0, 0, 0, 0, 9, 0, 0, 0, 5, 0])
        .unwrap();

    let path = base
        .join("..")
        .join("postprocessing")
        .join("offsets")
        .join(format!("offsets_{SNAP:03}.hdf5"));
    put(&path, w);
}

// ---------------------------------------------------------------------------
// Merger trees
// ---------------------------------------------------------------------------

/// Columns of a SubLink chunk, one row per entry:
/// (SubhaloID, FirstProg, NextProg, Desc, RootDesc, MainLeafProg, LastProg, SnapNum, stellar mass).
type SublinkRow = (i64, i64, i64, i64, i64, i64, i64, i32, f32);

/// Tree rooted at subhalo 1000 (chunk 1):
///
/// ```text
/// 1000 (99) ─┬─ 1001 (98) ── 1002 (97) ── 1003 (96)
///            └─ 1004 (98) ── 1005 (97)
/// ```
pub const SUBLINK_TREE: [SublinkRow; 6] = [
    (1000, 1001, -1, -1, 1000, 1003, 1005, 99, 10.0),
    (1001, 1002, 1004, 1000, 1000, 1003, 1003, 98, 8.0),
    (1002, 1003, -1, 1001, 1000, 1003, 1003, 97, 6.0),
    (1003, -1, -1, 1002, 1000, 1003, 1003, 96, 4.0),
    (1004, 1005, -1, 1000, 1000, 1005, 1005, 98, 2.0),
    (1005, -1, -1, 1004, 1000, 1005, 1005, 97, 1.0),
];

/// A three-row chain (chunk 0).
const SUBLINK_FILLER: [SublinkRow; 3] = [
    (0, 1, -1, -1, 0, 2, 2, 99, 3.0),
    (1, 2, -1, 0, 0, 2, 2, 98, 2.0),
    (2, -1, -1, 1, 0, 2, 2, 97, 1.0),
];

fn sublink_chunk(path: &Path, rows: &[SublinkRow]) {
    let n = rows.len() as u64;
    let col = |f: fn(&SublinkRow) -> i64| -> Vec<i64> { rows.iter().map(f).collect() };
    let mut w = FileWriter::new();
    w.write("SubhaloID", &[n], &col(|r| r.0)).unwrap();
    w.write("FirstProgenitorID", &[n], &col(|r| r.1)).unwrap();
    w.write("NextProgenitorID", &[n], &col(|r| r.2)).unwrap();
    w.write("DescendantID", &[n], &col(|r| r.3)).unwrap();
    w.write("RootDescendantID", &[n], &col(|r| r.4)).unwrap();
    w.write("MainLeafProgenitorID", &[n], &col(|r| r.5)).unwrap();
    w.write("LastProgenitorID", &[n], &col(|r| r.6)).unwrap();
    let snaps: Vec<i32> = rows.iter().map(|r| r.7).collect();
    w.write("SnapNum", &[n], &snaps).unwrap();
    let masses: Vec<f32> = rows.iter().flat_map(|r| [0.0, 0.0, 0.0, 0.0, r.8, 0.0]).collect();
    w.write("SubhaloMassType", &[n, 6], &masses).unwrap();
    put(path, w);
}

pub fn sublink_chunks(dir: &Path) {
    sublink_chunk(&dir.join("tree_extended.0.hdf5"), &SUBLINK_FILLER);
    sublink_chunk(&dir.join("tree_extended.1.hdf5"), &SUBLINK_TREE);
}

/// ```text
///        0
///      / | \
///     1  4  6
///    / \     \
///   2   3     7
///   |
///   5
/// ```
pub const LHALO_FIRST: [i32; 8] = [1, 2, 5, -1, -1, -1, 7, -1];
pub const LHALO_NEXT: [i32; 8] = [-1, 4, 3, -1, 6, -1, -1, -1];

fn lhalo_chunk(path: &Path) {
    let mut w = FileWriter::new();
    w.write("Tree0/FirstProgenitor", &[8], &LHALO_FIRST).unwrap();
    w.write("Tree0/NextProgenitor", &[8], &LHALO_NEXT).unwrap();
    let mass: Vec<f32> = (0..8).map(|r| r as f32 * 1.5).collect();
    w.write("Tree0/SubhaloMass", &[8], &mass).unwrap();
    let pos: Vec<f32> = (0..8).flat_map(|r| [r as f32, -(r as f32), 0.5]).collect();
    w.write("Tree0/SubhaloPos", &[8, 3], &pos).unwrap();
    w.write("Tree1/FirstProgenitor", &[1], &[-1i32]).unwrap();
    w.write("Tree1/NextProgenitor", &[1], &[-1i32]).unwrap();
    w.write("Tree1/SubhaloMass", &[1], &[99.0f32]).unwrap();
    w.write("Tree1/SubhaloPos", &[1, 3], &[0.0f32; 3]).unwrap();
    put(path, w);
}

// ---------------------------------------------------------------------------
// Cartesian grids
// ---------------------------------------------------------------------------

pub const CART_PIXELS: u64 = 4;
pub const CART_SPLIT: u64 = 30;

/// A 4³ grid split 30 / 34 over two chunks; `Density[p] = p`,
/// `Temperature[p] = 2p`.
fn cartesian(base: &Path, snap: u32) {
    let total = CART_PIXELS.pow(3);
    for (chunk, range) in [(0, 0..CART_SPLIT), (1, CART_SPLIT..total)] {
        let n = range.end - range.start;
        let mut w = FileWriter::new();
        w.create_group("Header").unwrap();
        w.set_attr("Header", "NumPixels", AttrValue::scalar(CART_PIXELS as i32)).unwrap();
        let density: Vec<f32> = range.clone().map(|p| p as f32).collect();
        let temperature: Vec<f64> = range.map(|p| 2.0 * p as f64).collect();
        w.write("Density", &[n], &density).unwrap();
        w.write("Temperature", &[n], &temperature).unwrap();
        let path = base
            .join(format!("cartesian_{snap:03}"))
            .join(format!("cartesian_{snap:03}.{chunk}.hdf5"));
        put(&path, w);
    }
}
