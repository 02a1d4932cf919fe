//! Content streaming: copying file bytes between the volume and an
//! opaque byte sink/source, one cluster buffer at a time along the FAT
//! chain. Chains are never grown here; the caller allocates first.

use std::io::{Read, Write};

use super::Volume;
use super::disk::Disk;
use crate::FatError;

impl<D: Disk> Volume<D> {
    /// Drain a file into `sink`, following the chain from
    /// `first_cluster` until `size` bytes are out or the chain ends.
    /// Returns the bytes actually copied.
    pub fn read_file_into<W: Write + ?Sized>(
        &mut self,
        first_cluster: u32,
        size: u32,
        sink: &mut W,
    ) -> Result<u64, FatError> {
        let cluster_bytes = self.cluster_bytes();
        let mut buf = vec![0u8; cluster_bytes];
        let mut remaining = size as u64;
        let mut cluster = first_cluster;
        let mut copied = 0u64;

        while remaining > 0 && cluster >= 2 {
            let take = (cluster_bytes as u64).min(remaining) as usize;
            let sector = self.first_sector_of_cluster(cluster);
            self.read_sectors(sector, &mut buf[..take])?;
            sink.write_all(&buf[..take])?;
            copied += take as u64;
            remaining -= take as u64;
            if remaining == 0 {
                break;
            }
            match self.next_cluster(cluster)? {
                Some(next) => cluster = next,
                None => break,
            }
        }
        Ok(copied)
    }

    /// Fill an already-allocated chain with `size` bytes from `source`.
    /// The final cluster's tail is zero-filled rather than left as
    /// whatever the cluster held before.
    pub fn write_file_from<R: Read + ?Sized>(
        &mut self,
        first_cluster: u32,
        size: u32,
        source: &mut R,
    ) -> Result<(), FatError> {
        let cluster_bytes = self.cluster_bytes();
        let mut buf = vec![0u8; cluster_bytes];
        let mut remaining = size as u64;
        let mut cluster = first_cluster;

        while remaining > 0 && cluster >= 2 {
            let take = (cluster_bytes as u64).min(remaining) as usize;
            if take < cluster_bytes {
                buf[take..].fill(0);
            }
            source.read_exact(&mut buf[..take])?;
            let sector = self.first_sector_of_cluster(cluster);
            self.write_sectors(sector, &buf)?;
            remaining -= take as u64;
            if remaining == 0 {
                break;
            }
            match self.next_cluster(cluster)? {
                Some(next) => cluster = next,
                None => break,
            }
        }
        Ok(())
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
