//! The FAT volume engine. [`Volume`] owns the disk handle and the parsed
//! boot sector for its whole lifetime and exposes the user-level
//! operations the shell drives: listing, cd, get, put, mkdir, delete.

pub mod bpb;
pub mod dir;
pub mod disk;
pub mod scan;
pub mod stream;
pub mod table;

#[cfg(test)]
pub(crate) mod testimg;

pub use bpb::{BootSector, FatType};
pub use dir::Attributes;
pub use disk::Disk;
pub use scan::Entry;

use std::io::{Read, Write};

use log::debug;

use crate::FatError;
use dir::{DIR_ENTRY_SIZE, ShortEntry};

/// Directory handle naming the volume root. Matches the on-disk
/// convention: a `..` entry whose cluster is 0 points at the root, on
/// every variant.
pub const ROOT_DIR: u32 = 0;

/// Where a directory's slots live: the fixed FAT12/16 root region is the
/// one directory not reachable through the FAT.
pub(crate) enum DirLocation {
    Region { first_sector: u64, sectors: u32 },
    Chain(u32),
}

/// A mounted volume: the boot sector plus the layout constants derived
/// from it once, and exclusive ownership of the backing store.
pub struct Volume<D> {
    disk: D,
    boot: BootSector,
    fat_type: FatType,
    fat_size: u32,
    total_sectors: u32,
    total_bytes: u64,
    root_dir_sectors: u32,
    data_start_sector: u64,
    count_of_clusters: u64,
    root_dir: u32,
}

impl<D: Disk> Volume<D> {
    /// Parse the boot sector and compute the volume layout. The variant
    /// is re-derived from the cluster count; the type string in the BPB
    /// is never trusted.
    pub fn mount(mut disk: D) -> Result<Self, FatError> {
        let mut sector = [0u8; bpb::BOOT_SECTOR_LEN];
        disk.read_at(0, &mut sector)
            .map_err(|_| FatError::VolumeOpen("cannot read the boot sector"))?;
        let boot = BootSector::parse(&sector)?;

        let fat_size = boot.fat_size();
        if fat_size == 0 {
            return Err(FatError::VolumeOpen("zero FAT size"));
        }
        let total_sectors = boot.total_sectors();
        let bps = boot.bytes_per_sector as u32;
        let root_dir_sectors = (boot.root_entry_count as u32 * DIR_ENTRY_SIZE as u32)
            .div_ceil(bps);
        let data_start_sector = boot.reserved_sectors as u64
            + boot.num_fats as u64 * fat_size as u64
            + root_dir_sectors as u64;
        if (total_sectors as u64) < data_start_sector {
            return Err(FatError::VolumeOpen("data region lies past the volume end"));
        }
        let count_of_clusters =
            (total_sectors as u64 - data_start_sector) / boot.sectors_per_cluster as u64;
        let fat_type = FatType::from_cluster_count(count_of_clusters);

        let root_dir = match fat_type {
            FatType::Fat32 => match boot.root_cluster() {
                Some(c) if c >= 2 => c,
                _ => {
                    return Err(FatError::VolumeOpen(
                        "FAT32-sized volume without a usable FAT32 BPB",
                    ));
                }
            },
            _ => ROOT_DIR,
        };

        debug!(
            "mounted {} volume: {total_sectors} sectors, {count_of_clusters} clusters, data region at sector {data_start_sector}",
            fat_type.name()
        );

        Ok(Volume {
            disk,
            total_bytes: total_sectors as u64 * bps as u64,
            boot,
            fat_type,
            fat_size,
            total_sectors,
            root_dir_sectors,
            data_start_sector,
            count_of_clusters,
            root_dir,
        })
    }

    // ─── Derived geometry ──────────────────────────────────────────────────────

    pub fn boot(&self) -> &BootSector {
        &self.boot
    }

    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    /// FAT size in sectors.
    pub fn fat_size(&self) -> u32 {
        self.fat_size
    }

    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn root_dir_sectors(&self) -> u32 {
        self.root_dir_sectors
    }

    pub fn count_of_clusters(&self) -> u64 {
        self.count_of_clusters
    }

    /// The directory handle of the volume root.
    pub fn root_dir(&self) -> u32 {
        self.root_dir
    }

    /// Hand the backing store back (tests re-read it through a reference
    /// implementation).
    pub fn into_disk(self) -> D {
        self.disk
    }

    pub(crate) fn cluster_bytes(&self) -> usize {
        self.boot.bytes_per_sector as usize * self.boot.sectors_per_cluster as usize
    }

    pub(crate) fn is_root(&self, dir: u32) -> bool {
        dir == ROOT_DIR || (self.fat_type == FatType::Fat32 && dir == self.root_dir)
    }

    pub(crate) fn location(&self, dir: u32) -> DirLocation {
        if dir == ROOT_DIR {
            match self.fat_type {
                FatType::Fat32 => DirLocation::Chain(self.root_dir),
                _ => DirLocation::Region {
                    first_sector: self.data_start_sector - self.root_dir_sectors as u64,
                    sectors: self.root_dir_sectors,
                },
            }
        } else {
            DirLocation::Chain(dir)
        }
    }

    // ─── Sector and cluster I/O ────────────────────────────────────────────────

    pub(crate) fn first_sector_of_cluster(&self, cluster: u32) -> u64 {
        (cluster as u64 - 2) * self.boot.sectors_per_cluster as u64 + self.data_start_sector
    }

    pub(crate) fn read_sectors(&mut self, first_sector: u64, buf: &mut [u8]) -> Result<(), FatError> {
        let offset = first_sector * self.boot.bytes_per_sector as u64;
        self.disk.read_at(offset, buf)?;
        Ok(())
    }

    pub(crate) fn write_sectors(&mut self, first_sector: u64, buf: &[u8]) -> Result<(), FatError> {
        let offset = first_sector * self.boot.bytes_per_sector as u64;
        self.disk.write_at(offset, buf)?;
        Ok(())
    }

    pub(crate) fn read_cluster(&mut self, cluster: u32) -> Result<Vec<u8>, FatError> {
        let mut buf = vec![0u8; self.cluster_bytes()];
        self.read_sectors(self.first_sector_of_cluster(cluster), &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn zero_cluster(&mut self, cluster: u32) -> Result<(), FatError> {
        let buf = vec![0u8; self.cluster_bytes()];
        self.write_sectors(self.first_sector_of_cluster(cluster), &buf)
    }

    // ─── Free-space accounting ─────────────────────────────────────────────────

    /// Count free clusters by scanning the whole table. Linear, like the
    /// allocator; nothing is cached.
    pub fn free_cluster_count(&mut self) -> Result<u64, FatError> {
        let mut free = 0u64;
        for cluster in 2..self.count_of_clusters as u32 + 2 {
            if self.fat_entry(cluster)? == table::FAT_FREE {
                free += 1;
            }
        }
        Ok(free)
    }

    pub fn free_bytes(&mut self) -> Result<u64, FatError> {
        Ok(self.free_cluster_count()? * self.cluster_bytes() as u64)
    }

    // ─── User-level operations ─────────────────────────────────────────────────

    /// Resolve a `/`- or `\`-separated path of directory names starting
    /// at `current`. Any component missing leaves the caller's directory
    /// untouched.
    pub fn change_dir(&mut self, current: u32, path: &str) -> Result<u32, FatError> {
        let mut dir = current;
        for component in path.split(['/', '\\']).filter(|c| !c.is_empty()) {
            let entries = self.list_dir(dir)?;
            let next = entries
                .iter()
                .filter(|e| e.is_directory())
                .find(|e| e.matches(component))
                .ok_or(FatError::NotFound)?;
            dir = next.first_cluster();
        }
        Ok(dir)
    }

    /// Look a single name up in one directory.
    pub fn find_entry(&mut self, dir: u32, name: &str) -> Result<Entry, FatError> {
        self.list_dir(dir)?
            .into_iter()
            .find(|e| e.matches(name))
            .ok_or(FatError::NotFound)
    }

    /// Stream a file's contents into `sink`. Returns the bytes copied.
    pub fn get_file<W: Write + ?Sized>(
        &mut self,
        dir: u32,
        name: &str,
        sink: &mut W,
    ) -> Result<u64, FatError> {
        let entry = self.find_entry(dir, name)?;
        if entry.is_directory() || entry.short.is_volume_label() {
            return Err(FatError::NotFound);
        }
        self.read_file_into(entry.first_cluster(), entry.size(), sink)
    }

    /// Create `name` in `dir` with `size` bytes drawn from `source`. The
    /// cluster chain and the directory entry are in place before any
    /// content is streamed; a failed entry write rolls the chain back.
    pub fn put_file<R: Read + ?Sized>(
        &mut self,
        dir: u32,
        name: &str,
        size: u64,
        source: &mut R,
    ) -> Result<(), FatError> {
        if size > u32::MAX as u64 {
            return Err(FatError::FileTooLarge);
        }
        let clusters = (size as usize).div_ceil(self.cluster_bytes());
        let chain = self.allocate_chain(clusters)?;
        let first_cluster = chain.first().copied().unwrap_or(0);

        let entry = ShortEntry::new_file(*b"           ", first_cluster, size as u32);
        if let Err(e) = self.add_directory_entry(dir, name, entry) {
            self.release_clusters(&chain);
            return Err(e);
        }
        if size > 0 {
            self.write_file_from(first_cluster, size as u32, source)?;
        }
        Ok(())
    }

    /// Create a subdirectory: one zeroed cluster, the entry in the
    /// parent, then the new directory's own `.` and `..` entries. A `..`
    /// cluster of 0 denotes a root parent.
    pub fn make_dir(&mut self, dir: u32, name: &str) -> Result<(), FatError> {
        let chain = self.allocate_chain(1)?;
        let cluster = chain[0];
        if let Err(e) = self.zero_cluster(cluster) {
            self.release_clusters(&chain);
            return Err(e);
        }
        let entry = ShortEntry::new_directory(*b"           ", cluster);
        if let Err(e) = self.add_directory_entry(dir, name, entry) {
            self.release_clusters(&chain);
            return Err(e);
        }

        let parent = if self.is_root(dir) { ROOT_DIR } else { dir };
        let dot = ShortEntry::new_directory(*b".          ", cluster);
        let dotdot = ShortEntry::new_directory(*b"..         ", parent);
        let base = self.first_sector_of_cluster(cluster) * self.boot.bytes_per_sector as u64;
        self.disk.write_at(base, &dot.encode())?;
        self.disk
            .write_at(base + DIR_ENTRY_SIZE as u64, &dotdot.encode())?;
        Ok(())
    }

    /// Delete a file, or a directory and everything below it. `.` and
    /// `..` are refused outright.
    pub fn delete(&mut self, dir: u32, name: &str) -> Result<(), FatError> {
        if name == "." || name == ".." {
            return Err(FatError::DeleteSpecialDir);
        }
        let entry = self.find_entry(dir, name)?;
        self.delete_entry(&entry)
    }

    fn delete_entry(&mut self, entry: &Entry) -> Result<(), FatError> {
        if entry.is_directory() && entry.first_cluster() >= 2 {
            for child in self.list_dir(entry.first_cluster())? {
                if child.is_dot() || child.short.is_volume_label() {
                    continue;
                }
                self.delete_entry(&child)?;
            }
        }
        if entry.first_cluster() >= 2 {
            self.free_chain(entry.first_cluster())?;
        }
        self.mark_slots_deleted(&entry.slots)?;
        debug!("deleted {}", entry.name());
        Ok(())
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
