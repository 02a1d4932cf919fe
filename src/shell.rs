//! The interactive command loop: eight verbs, each mapping onto one
//! volume operation, with the rendering of listings, volume info and
//! error lines. Driver errors never end the session; only `EXIT` or EOF
//! do.

use std::fs::File;
use std::io::{self, BufRead, Write as _};

use humansize::{BINARY, SizeFormatter};
use log::debug;

use crate::FatError;
use crate::fat::bpb::MEDIA_FIXED;
use crate::fat::dir::{Attributes, decode_date, decode_time};
use crate::fat::{Disk, Volume};

// ─── Command parsing ───────────────────────────────────────────────────────────

/// One parsed input line. Verbs are case-insensitive; arguments pass
/// through untouched (long filenames are case-significant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Info,
    Dir,
    Cd(String),
    Get(String, String),
    Put(String, String),
    Md(String),
    Del(String),
    Exit,
}

/// `None` for anything that is not a well-formed command; the caller
/// prints the unknown-command line.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?.to_ascii_uppercase();
    let arg1 = parts.next();
    let arg2 = parts.next();
    if parts.next().is_some() {
        return None;
    }
    match (verb.as_str(), arg1, arg2) {
        ("INFO", None, None) => Some(Command::Info),
        ("DIR", None, None) => Some(Command::Dir),
        ("CD", Some(path), None) => Some(Command::Cd(path.into())),
        ("GET", Some(name), Some(local)) => Some(Command::Get(name.into(), local.into())),
        ("PUT", Some(local), Some(name)) => Some(Command::Put(local.into(), name.into())),
        ("MD", Some(name), None) => Some(Command::Md(name.into())),
        ("DEL", Some(name), None) => Some(Command::Del(name.into())),
        ("EXIT", None, None) => Some(Command::Exit),
        _ => None,
    }
}

// ─── Shell ─────────────────────────────────────────────────────────────────────

pub struct Shell<D> {
    volume: Volume<D>,
    current_dir: u32,
}

impl<D: Disk> Shell<D> {
    pub fn new(volume: Volume<D>) -> Self {
        let current_dir = volume.root_dir();
        Shell {
            volume,
            current_dir,
        }
    }

    /// Prompt/dispatch loop until `EXIT` or end of input.
    pub fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        loop {
            print!("> ");
            io::stdout().flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_command(line) {
                None => println!("\nUnknown command {line}."),
                Some(Command::Exit) => break,
                Some(cmd) => {
                    debug!("executing {cmd:?}");
                    if let Err(e) = self.execute(cmd) {
                        println!("{e}");
                    }
                }
            }
        }
        println!("\nExiting...");
        Ok(())
    }

    fn execute(&mut self, cmd: Command) -> Result<(), FatError> {
        match cmd {
            Command::Info => self.print_info(),
            Command::Dir => self.print_dir(),
            Command::Cd(path) => {
                self.current_dir = self.volume.change_dir(self.current_dir, &path)?;
                Ok(())
            }
            Command::Get(name, local) => self.get(&name, &local),
            Command::Put(local, name) => self.put(&local, &name),
            Command::Md(name) => self.volume.make_dir(self.current_dir, &name),
            Command::Del(name) => self.volume.delete(self.current_dir, &name),
            Command::Exit => Ok(()),
        }
    }

    // ─── get / put ─────────────────────────────────────────────────────────────

    fn get(&mut self, name: &str, local: &str) -> Result<(), FatError> {
        let mut sink = match File::create(local) {
            Ok(f) => f,
            Err(e) => {
                println!("Cannot open local file {local} for writing: {e}.");
                return Ok(());
            }
        };
        let copied = self.volume.get_file(self.current_dir, name, &mut sink)?;
        println!("Copied {copied} bytes to {local}.");
        Ok(())
    }

    fn put(&mut self, local: &str, name: &str) -> Result<(), FatError> {
        let mut source = match File::open(local) {
            Ok(f) => f,
            Err(e) => {
                println!("Cannot open local file {local} for reading: {e}.");
                return Ok(());
            }
        };
        let size = match source.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                println!("Cannot open local file {local} for reading: {e}.");
                return Ok(());
            }
        };
        self.volume.put_file(self.current_dir, name, size, &mut source)?;
        println!("Copied {size} bytes from {local}.");
        Ok(())
    }

    // ─── INFO ──────────────────────────────────────────────────────────────────

    fn print_info(&mut self) -> Result<(), FatError> {
        let boot = self.volume.boot().clone();
        let total = self.volume.total_bytes();
        println!();
        println!("Disk information:");
        println!("-----------------");
        println!("OEM Name: {}", printable(&boot.oem_name));
        println!("Volume Label: {}", printable(boot.volume_label()));
        println!("File System Type (read): {}", printable(boot.fs_type_label()));
        println!(
            "Media Type: {:#04X} ({}removable)",
            boot.media,
            if boot.media == MEDIA_FIXED { "non-" } else { "" }
        );
        println!("Size: {total} bytes ({})", SizeFormatter::new(total, BINARY));
        println!();
        println!("Disk geometry:");
        println!("--------------");
        println!("Bytes Per Sector: {}", boot.bytes_per_sector);
        println!("Sectors Per Cluster: {}", boot.sectors_per_cluster);
        println!("Total Sectors: {}", self.volume.total_sectors());
        println!("Physical - Sectors per Track: {}", boot.sectors_per_track);
        println!("Physical - Heads: {}", boot.num_heads);
        println!();
        println!("File system info:");
        println!("-----------------");
        println!("Volume ID: {}", boot.volume_id());
        println!(
            "File System Type (computed): {}",
            self.volume.fat_type().name()
        );
        println!("FAT Size (sectors): {}", self.volume.fat_size());
        println!("Number of FATs: {}", boot.num_fats);
        println!("Reserved sectors: {}", boot.reserved_sectors);
        println!("Root directory sectors: {}", self.volume.root_dir_sectors());
        println!("Data clusters: {}", self.volume.count_of_clusters());
        let free = self.volume.free_bytes()?;
        println!("Free space: {free} bytes ({})", SizeFormatter::new(free, BINARY));
        println!();
        Ok(())
    }

    // ─── DIR ───────────────────────────────────────────────────────────────────

    fn print_dir(&mut self) -> Result<(), FatError> {
        let entries = self.volume.list_dir(self.current_dir)?;
        let mut file_count = 0u32;
        let mut dir_count = 0u32;

        println!(
            "{:>12}{:>25}{:>7}{:>20}",
            "Name    ", "Size         ", "Flags ", "Modified Date   "
        );
        println!("----------------------------------------------------------------");
        for entry in &entries {
            print!("{:<12}", entry.short_name());
            let attr = entry.short.attr;
            if attr.contains(Attributes::DIRECTORY) || attr.contains(Attributes::VOLUME_ID) {
                if attr.contains(Attributes::DIRECTORY) && !entry.is_dot() {
                    dir_count += 1;
                }
                print!("{:>25}", "");
            } else {
                file_count += 1;
                let size = entry.size();
                print!(
                    "{:>12} ({:>10})",
                    size,
                    SizeFormatter::new(size as u64, BINARY).to_string()
                );
            }
            let flag = |on: bool, c: char| if on { c } else { '-' };
            print!(
                " {}{}{}{}{}{}",
                flag(attr.contains(Attributes::VOLUME_ID), 'V'),
                flag(attr.contains(Attributes::DIRECTORY), 'D'),
                flag(attr.contains(Attributes::ARCHIVE), 'A'),
                flag(attr.contains(Attributes::SYSTEM), 'S'),
                flag(attr.contains(Attributes::HIDDEN), 'H'),
                flag(attr.contains(Attributes::READ_ONLY), 'R'),
            );
            let (year, month, day) = decode_date(entry.short.write_date);
            let (hour, minute, second) =
                decode_time(entry.short.write_time, entry.short.creation_tenths);
            print!(" {year:04}/{month:02}/{day:02} {hour:02}:{minute:02}:{second:02}");
            if let Some(long) = &entry.long_name {
                print!(" ( {long} )");
            }
            println!();
        }
        println!("\t{file_count} file(s), {dir_count} folder(s)");
        Ok(())
    }
}

fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { ' ' })
        .collect()
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
