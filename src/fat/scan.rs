//! Directory scanning and slot management: walking a directory's cluster
//! chain (or the fixed FAT12/16 root region), joining long-name
//! fragments to their short entries, and finding/reserving the slot runs
//! new entries are written into.

use log::{debug, warn};

use super::dir::{
    self, DIR_ENTRY_SIZE, DirSlot, LongEntry, LongNameBuilder, SLOT_DELETED, SLOT_END, ShortEntry,
};
use super::disk::Disk;
use super::{DirLocation, Volume};
use crate::FatError;

// ─── Positions and entries ─────────────────────────────────────────────────────

/// Write cursor into a directory: which slot of the fixed root region or
/// of a chain cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotPos {
    Root { index: u32 },
    Cluster { cluster: u32, index: u32 },
}

/// One logical directory entry: the short record joined with its
/// reconstructed long name, plus the slots the pair occupies on disk.
/// Produced by [`Volume::list_dir`], never persisted.
#[derive(Debug, Clone)]
pub struct Entry {
    pub short: ShortEntry,
    pub long_name: Option<String>,
    pub(crate) slots: Vec<SlotPos>,
}

impl Entry {
    /// The rendered 8.3 name ("HELLO.TXT").
    pub fn short_name(&self) -> String {
        self.short.name()
    }

    /// Long name when one exists, short name otherwise.
    pub fn name(&self) -> String {
        self.long_name
            .clone()
            .unwrap_or_else(|| self.short.name())
    }

    pub fn is_directory(&self) -> bool {
        self.short.is_directory()
    }

    pub fn is_dot(&self) -> bool {
        matches!(self.short.name().as_str(), "." | "..")
    }

    pub fn first_cluster(&self) -> u32 {
        self.short.first_cluster
    }

    pub fn size(&self) -> u32 {
        self.short.size
    }

    /// Lookup match: case-folded against the short name, exact against
    /// the long name.
    pub fn matches(&self, query: &str) -> bool {
        dir::names_match(&self.short.name(), query) || self.long_name.as_deref() == Some(query)
    }
}

// ─── Scanner ───────────────────────────────────────────────────────────────────

/// Streaming state while decoding slot runs: pending long-name fragments
/// attach to the next short entry; a 0x00 slot ends the directory.
struct DirWalker {
    builder: LongNameBuilder,
    pending: Vec<SlotPos>,
    entries: Vec<Entry>,
    done: bool,
}

impl DirWalker {
    fn new() -> Self {
        DirWalker {
            builder: LongNameBuilder::new(),
            pending: Vec::new(),
            entries: Vec::new(),
            done: false,
        }
    }

    fn feed(&mut self, data: &[u8], mut pos_of: impl FnMut(u32) -> SlotPos) {
        for (i, slot) in data.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
            match DirSlot::parse(slot) {
                DirSlot::End => {
                    self.done = true;
                    return;
                }
                DirSlot::Free => {
                    self.builder.reset();
                    self.pending.clear();
                }
                DirSlot::Long(frag) => {
                    if frag.is_last() {
                        self.pending.clear();
                    }
                    if self.builder.push(&frag) {
                        self.pending.push(pos_of(i as u32));
                    } else {
                        self.pending.clear();
                    }
                }
                DirSlot::Short(short) => {
                    if !short.is_valid() {
                        warn!("skipping directory slot with unprintable name bytes");
                        self.builder.reset();
                        self.pending.clear();
                        continue;
                    }
                    let long_name = self.builder.take(&short);
                    let mut slots = std::mem::take(&mut self.pending);
                    if long_name.is_none() {
                        // Orphaned fragments stay behind; they are not
                        // part of this entry.
                        slots.clear();
                    }
                    slots.push(pos_of(i as u32));
                    self.entries.push(Entry {
                        short,
                        long_name,
                        slots,
                    });
                }
            }
        }
    }
}

impl<D: Disk> Volume<D> {
    /// Ordered (on-disk order) listing of a directory. Free and corrupt
    /// slots are skipped, never fatal; the listing stops at the 0x00
    /// terminator without touching later clusters.
    pub fn list_dir(&mut self, dir: u32) -> Result<Vec<Entry>, FatError> {
        let mut walker = DirWalker::new();
        match self.location(dir) {
            DirLocation::Region {
                first_sector,
                sectors,
            } => {
                let bps = self.boot.bytes_per_sector as usize;
                let slots_per_sector = (bps / DIR_ENTRY_SIZE) as u32;
                let mut buf = vec![0u8; bps];
                for s in 0..sectors as u64 {
                    self.read_sectors(first_sector + s, &mut buf)?;
                    let base = s as u32 * slots_per_sector;
                    walker.feed(&buf, |i| SlotPos::Root { index: base + i });
                    if walker.done {
                        break;
                    }
                }
            }
            DirLocation::Chain(start) => {
                let mut cluster = start;
                for _ in 0..=self.count_of_clusters {
                    if cluster < 2 {
                        break;
                    }
                    let data = self.read_cluster(cluster)?;
                    walker.feed(&data, |i| SlotPos::Cluster { cluster, index: i });
                    if walker.done {
                        break;
                    }
                    match self.next_cluster(cluster)? {
                        Some(next) => cluster = next,
                        None => break,
                    }
                }
            }
        }
        Ok(walker.entries)
    }

    // ─── Slot-level access ─────────────────────────────────────────────────────

    pub(crate) fn slot_offset(&self, pos: SlotPos) -> u64 {
        let bps = self.boot.bytes_per_sector as u64;
        match pos {
            SlotPos::Root { index } => {
                let first = self.data_start_sector - self.root_dir_sectors as u64;
                first * bps + index as u64 * DIR_ENTRY_SIZE as u64
            }
            SlotPos::Cluster { cluster, index } => {
                self.first_sector_of_cluster(cluster) * bps + index as u64 * DIR_ENTRY_SIZE as u64
            }
        }
    }

    /// Flag every slot of an entry (long fragments and short record) as
    /// deleted and reusable.
    pub(crate) fn mark_slots_deleted(&mut self, slots: &[SlotPos]) -> Result<(), FatError> {
        for &pos in slots {
            let offset = self.slot_offset(pos);
            let mut slot = [0u8; DIR_ENTRY_SIZE];
            self.disk.read_at(offset, &mut slot)?;
            slot[0] = SLOT_DELETED;
            self.disk.write_at(offset, &slot)?;
        }
        Ok(())
    }

    /// One scan pass: the first run of `needed` consecutive free slots
    /// (deleted, or at/after the 0x00 terminator), plus the chain's tail
    /// cluster (`None` for the fixed root region).
    fn scan_free_slots(
        &mut self,
        dir: u32,
        needed: usize,
    ) -> Result<(Option<Vec<SlotPos>>, Option<u32>), FatError> {
        let mut run: Vec<SlotPos> = Vec::new();
        let mut seen_end = false;
        let mut push = |run: &mut Vec<SlotPos>, slot0: u8, pos: SlotPos| {
            if slot0 == SLOT_END {
                seen_end = true;
            }
            if seen_end || slot0 == SLOT_DELETED {
                run.push(pos);
            } else {
                run.clear();
            }
        };

        match self.location(dir) {
            DirLocation::Region {
                first_sector,
                sectors,
            } => {
                let bps = self.boot.bytes_per_sector as usize;
                let slots_per_sector = (bps / DIR_ENTRY_SIZE) as u32;
                let mut buf = vec![0u8; bps];
                'region: for s in 0..sectors as u64 {
                    self.read_sectors(first_sector + s, &mut buf)?;
                    for i in 0..slots_per_sector {
                        let pos = SlotPos::Root {
                            index: s as u32 * slots_per_sector + i,
                        };
                        push(&mut run, buf[i as usize * DIR_ENTRY_SIZE], pos);
                        if run.len() >= needed {
                            break 'region;
                        }
                    }
                }
                Ok((if run.len() >= needed { Some(run) } else { None }, None))
            }
            DirLocation::Chain(start) => {
                let mut cluster = start;
                let mut tail = start;
                for _ in 0..=self.count_of_clusters {
                    if cluster < 2 {
                        break;
                    }
                    tail = cluster;
                    let data = self.read_cluster(cluster)?;
                    for (i, slot) in data.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
                        let pos = SlotPos::Cluster {
                            cluster,
                            index: i as u32,
                        };
                        push(&mut run, slot[0], pos);
                        if run.len() >= needed {
                            return Ok((Some(run), Some(tail)));
                        }
                    }
                    match self.next_cluster(cluster)? {
                        Some(next) => cluster = next,
                        None => break,
                    }
                }
                Ok((None, Some(tail)))
            }
        }
    }

    /// Reserve `needed` contiguous slots, growing the directory by
    /// zeroed clusters when it is chain-backed. The fixed FAT12/16 root
    /// cannot grow.
    pub(crate) fn find_or_extend_free_slots(
        &mut self,
        dir: u32,
        needed: usize,
    ) -> Result<Vec<SlotPos>, FatError> {
        let slots_per_cluster = self.cluster_bytes() / DIR_ENTRY_SIZE;
        for _ in 0..needed / slots_per_cluster + 2 {
            let (run, tail) = self.scan_free_slots(dir, needed)?;
            if let Some(run) = run {
                return Ok(run);
            }
            let Some(tail) = tail else {
                return Err(FatError::RootDirFull);
            };
            let new = self.allocate_chain(1)?[0];
            if let Err(e) = self.zero_cluster(new) {
                self.release_clusters(&[new]);
                return Err(e);
            }
            if let Err(e) = self.set_fat_entry(tail, new) {
                self.release_clusters(&[new]);
                return Err(e);
            }
            debug!("extended directory {dir} with cluster {new}");
        }
        Err(FatError::NoFreeSpace)
    }

    /// Write a long+short entry group into previously reserved slots:
    /// fragments in descending ordinal order, short record last.
    pub(crate) fn write_entry_group(
        &mut self,
        slots: &[SlotPos],
        fragments: &[LongEntry],
        short: &ShortEntry,
    ) -> Result<(), FatError> {
        for (pos, frag) in slots.iter().zip(fragments.iter()) {
            let offset = self.slot_offset(*pos);
            self.disk.write_at(offset, &frag.encode())?;
        }
        let offset = self.slot_offset(slots[fragments.len()]);
        self.disk.write_at(offset, &short.encode())?;
        Ok(())
    }

    /// Add an entry under `name`: synthesize a unique short name, encode
    /// the long-name fragments when the name does not fit 8.3, reserve a
    /// slot run and write the group. An entry already answering to the
    /// name is a hard conflict.
    pub fn add_directory_entry(
        &mut self,
        dir: u32,
        name: &str,
        mut entry: ShortEntry,
    ) -> Result<(), FatError> {
        let existing = self.list_dir(dir)?;
        if existing.iter().any(|e| e.matches(name)) {
            return Err(FatError::FilenameExists);
        }
        let shorts: Vec<[u8; 11]> = existing.iter().map(|e| e.short.raw_name).collect();
        entry.raw_name = dir::synthesize_short_name(name, |cand| shorts.iter().any(|s| s == cand))?;

        let fragments = if dir::number_of_long_entries(name) > 0 {
            dir::encode_long_entries(name, entry.checksum())
        } else {
            Vec::new()
        };
        let slots = self.find_or_extend_free_slots(dir, fragments.len() + 1)?;
        self.write_entry_group(&slots, &fragments, &entry)?;
        debug!(
            "added '{name}' as {} ({} long fragments)",
            entry.name(),
            fragments.len()
        );
        Ok(())
    }
}
