use std::io::{Read, Seek, SeekFrom, Write};

// ─── Backing store abstraction ─────────────────────────────────────────────────

/// Byte-addressed access to the volume image.
///
/// The driver only ever issues absolute-offset reads and writes of fixed
/// length (`sector * bytes_per_sector`, optionally `+ slot * 32`), so this
/// is the whole surface. The blanket impl covers `std::fs::File` in
/// production and `std::io::Cursor<Vec<u8>>` in tests.
pub trait Disk {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()>;
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> std::io::Result<()>;
}

impl<T: Read + Write + Seek> Disk for T {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)?;
        // Every mutation hits the image immediately; there is no cache layer.
        self.flush()
    }
}
