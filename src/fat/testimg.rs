//! In-memory volume images for the unit tests, built with the `fatfs`
//! crate. `fatfs` doubles as the reference implementation: fixtures are
//! written through it, and this driver's mutations are verified by
//! reading the image back through it.

use std::io::{Cursor, Read, Write};

/// Format a blank image. 512-byte clusters keep the cluster counts (and
/// so the variant detection) easy to reason about.
pub fn format(bytes: usize, fat_type: fatfs::FatType, root_entries: Option<u16>) -> Cursor<Vec<u8>> {
    let mut cursor = Cursor::new(vec![0u8; bytes]);
    let mut opts = fatfs::FormatVolumeOptions::new()
        .fat_type(fat_type)
        .bytes_per_cluster(512);
    if let Some(n) = root_entries {
        opts = opts.max_root_dir_entries(n);
    }
    fatfs::format_volume(&mut cursor, opts).expect("format_volume failed");
    cursor
}

/// ~2000 clusters: FAT12 territory.
pub fn fat12() -> Cursor<Vec<u8>> {
    format(1 << 20, fatfs::FatType::Fat12, None)
}

/// ~16k clusters: FAT16.
pub fn fat16() -> Cursor<Vec<u8>> {
    format(8 << 20, fatfs::FatType::Fat16, None)
}

/// FAT32 needs at least 65 525 data clusters; 40 MB of 512-byte clusters
/// clears that comfortably.
pub fn fat32() -> Cursor<Vec<u8>> {
    format(40 << 20, fatfs::FatType::Fat32, None)
}

/// Create a root-level file through the reference implementation.
pub fn add_file(image: &mut Vec<u8>, name: &str, content: &[u8]) {
    let fs = fatfs::FileSystem::new(Cursor::new(&mut *image), fatfs::FsOptions::new())
        .expect("FileSystem::new failed");
    {
        let root = fs.root_dir();
        let mut file = root.create_file(name).expect("create_file failed");
        file.truncate().unwrap();
        file.write_all(content).unwrap();
    }
    fs.unmount().unwrap();
}

/// Read a file back through the reference implementation. `path` may
/// contain `/` separators.
pub fn read_file(image: &mut Vec<u8>, path: &str) -> Vec<u8> {
    let fs = fatfs::FileSystem::new(Cursor::new(&mut *image), fatfs::FsOptions::new())
        .expect("FileSystem::new failed");
    let mut buf = Vec::new();
    {
        let root = fs.root_dir();
        let mut file = root.open_file(path).expect("open_file failed");
        file.read_to_end(&mut buf).unwrap();
    }
    fs.unmount().unwrap();
    buf
}

/// Long names of everything in the root directory.
pub fn root_names(image: &mut Vec<u8>) -> Vec<String> {
    let fs = fatfs::FileSystem::new(Cursor::new(&mut *image), fatfs::FsOptions::new())
        .expect("FileSystem::new failed");
    let names = fs
        .root_dir()
        .iter()
        .map(|r| r.unwrap().file_name())
        .collect();
    fs.unmount().unwrap();
    names
}

/// Long names of everything in a subdirectory, dot entries excluded.
pub fn dir_names(image: &mut Vec<u8>, path: &str) -> Vec<String> {
    let fs = fatfs::FileSystem::new(Cursor::new(&mut *image), fatfs::FsOptions::new())
        .expect("FileSystem::new failed");
    let names = {
        let dir = fs.root_dir().open_dir(path).expect("open_dir failed");
        dir.iter()
            .map(|r| r.unwrap().file_name())
            .filter(|n| n != "." && n != "..")
            .collect()
    };
    fs.unmount().unwrap();
    names
}

/// A small two-level tree for the recursive-delete tests:
/// `TREE/{X.TXT, SUB/{Y.TXT}}`.
pub fn build_tree(image: &mut Vec<u8>) {
    let fs = fatfs::FileSystem::new(Cursor::new(&mut *image), fatfs::FsOptions::new())
        .expect("FileSystem::new failed");
    {
        let root = fs.root_dir();
        let tree = root.create_dir("TREE").unwrap();
        tree.create_file("X.TXT")
            .unwrap()
            .write_all(&[0x58; 1500])
            .unwrap();
        let sub = tree.create_dir("SUB").unwrap();
        sub.create_file("Y.TXT")
            .unwrap()
            .write_all(&[0x59; 600])
            .unwrap();
    }
    fs.unmount().unwrap();
}
