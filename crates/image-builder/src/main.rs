//! Packs a bootblock, a kernel, and zero or more user-process ELF images
//! into a flat, sector-aligned disk image the bootblock can load purely by
//! sector number (there is no filesystem on the image).
//!
//! Grounded on `original_source/createimage.c`: same sector-layout rules
//! (bootblock at sector 0 with virtual address 0, kernel segments placed
//! by the non-VM/VM offset math, an optional process directory sector, one
//! directory entry per process), same OS-size patch at byte offset 2, same
//! error conditions (missing ELF magic, backward-travel, directory
//! overflow). The C original seeks back and forth within one `FILE*`; this
//! port builds the image in memory (`Vec<u8>`) and writes it once at the
//! end, which is equivalent but avoids re-deriving C's seek/ftell dance.
//! ELF parsing itself is grounded on `oxidecomputer-hubris`'s `packager`
//! tool, which walks `goblin::elf::Elf::program_headers` the same way to
//! place `PT_LOAD` segments at their physical load address.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use goblin::elf::program_header::{PF_X, PT_LOAD};
use goblin::elf::Elf;

const SECTOR_SIZE: usize = 512;
const OS_SIZE_LOC: usize = 2;
const KERNEL_PADDR: i64 = 0x8000;
const IMAGE_FILE: &str = "image";
/// Directory entries are 8 bytes (`{start_sector: i32, sector_count: i32}`);
/// one sector holds 64 of them, and the last slot is reserved for the
/// `{0,0}` terminator record, leaving 63 usable.
const MAX_DIRECTORY_ENTRIES: usize = SECTOR_SIZE / 8 - 1;

/// Pack a bootblock, kernel, and process images into a flat disk image.
#[derive(Parser, Debug)]
#[command(
    name = "image-builder",
    about = "Pack bootblock, kernel, and process ELF images into a flat, sector-aligned disk image"
)]
struct Cli {
    /// Print verbose segment-placement trace to stdout.
    #[arg(long)]
    extended: bool,

    /// Build a VM-mode image: patch the OS size before the process images,
    /// reserve a process directory sector, and record a (start_sector,
    /// sector_count) entry for each process argument.
    #[arg(long)]
    vm: bool,

    bootblock: PathBuf,
    kernel: PathBuf,
    processes: Vec<PathBuf>,
}

/// In-progress directory entry for whichever file `add_file` is currently
/// writing, in sectors.
#[derive(Default, Clone, Copy)]
struct DirEntry {
    start_sector: u32,
    sector_count: u32,
}

struct Image {
    buf: Vec<u8>,
    /// Signed displacement between an ELF segment's virtual address and its
    /// byte offset in `buf`, recomputed by `process_start` for each file.
    offset: i64,
    dir: DirEntry,
    /// Byte offset of the next free process-directory slot, and the offset
    /// one past the end of the reserved directory sector. Both zero until
    /// `reserve_process_dir` runs (non-VM images never touch these).
    pd_loc: usize,
    pd_lim: usize,
    verbose: bool,
    vm: bool,
}

impl Image {
    fn new(vm: bool, verbose: bool) -> Self {
        Self {
            buf: Vec::new(),
            offset: 0,
            dir: DirEntry::default(),
            pd_loc: 0,
            pd_lim: 0,
            verbose,
            vm,
        }
    }

    fn trace(&self, args: std::fmt::Arguments<'_>) {
        if self.verbose {
            println!("{args}");
        }
    }

    /// Called once per file, on its first program header (`ph == 0`,
    /// whatever type that header happens to be — the original indexes by
    /// position, not by `PT_LOAD`). Establishes `offset` for every
    /// `write_segment` call that follows for this file.
    fn process_start(&mut self, vaddr: u32) -> Result<()> {
        if self.buf.len() % SECTOR_SIZE != 0 {
            bail!("internal error: image offset not sector-aligned before starting a new file");
        }
        self.dir.start_sector = (self.buf.len() / SECTOR_SIZE) as u32;

        self.offset = if self.buf.is_empty() {
            // First file written is the bootblock; it must load at vaddr 0.
            if vaddr != 0 {
                bail!("bootblock's first segment must load at virtual address 0, got {vaddr:#x}");
            }
            0
        } else if !self.vm {
            SECTOR_SIZE as i64 - KERNEL_PADDR
        } else {
            self.buf.len() as i64 - (vaddr as i64 & !0xfff)
        };
        Ok(())
    }

    /// Called once per file, after every program header has been visited.
    /// Pads to a sector boundary and finalizes the directory entry size.
    fn process_end(&mut self) {
        while self.buf.len() % SECTOR_SIZE != 0 {
            self.buf.push(0);
        }
        self.dir.sector_count = (self.buf.len() / SECTOR_SIZE) as u32 - self.dir.start_sector;
        self.trace(format_args!(
            "\tfile starts at sector {}, spans {} sectors",
            self.dir.start_sector, self.dir.sector_count
        ));
    }

    /// Write one loadable segment's bytes at its computed physical address,
    /// padding with zeros both before it (to reach that address) and after
    /// its file-backed bytes (out to `p_memsz`, for .bss).
    fn write_segment(
        &mut self,
        file_bytes: &[u8],
        p_offset: usize,
        p_vaddr: u32,
        p_filesz: usize,
        p_memsz: usize,
    ) -> Result<()> {
        if p_memsz == 0 {
            return Ok(());
        }

        let phyaddr = p_vaddr as i64 + self.offset;
        if phyaddr < 0 {
            bail!("segment physical address computed as negative ({p_vaddr:#x} + {})", self.offset);
        }
        let phyaddr = phyaddr as usize;

        if phyaddr < self.buf.len() {
            bail!(
                "memory conflict: write would backtrack in image\n\
                 \tdesired segment offset: {phyaddr:08x}\n\
                 \t  current image offset: {:08x}",
                self.buf.len()
            );
        }
        if self.buf.len() < phyaddr {
            self.buf.resize(phyaddr, 0);
            self.trace(format_args!("\t\tpadding up to {phyaddr:#06x}"));
        }

        self.trace(format_args!("\t\twriting {p_memsz:#x} bytes"));
        self.buf.extend_from_slice(&file_bytes[p_offset..p_offset + p_filesz]);
        let target_len = self.buf.len() + (p_memsz - p_filesz);
        self.buf.resize(target_len, 0);
        Ok(())
    }

    /// Patch the bootblock's OS-size field (a little-endian `i16` at byte
    /// offset 2) with the total image size so far, in sectors, minus one
    /// for the bootblock itself.
    fn write_os_size(&mut self) -> Result<()> {
        if self.buf.len() % SECTOR_SIZE != 0 {
            bail!("internal error: image not sector-aligned when writing os_size");
        }
        let os_size = (self.buf.len() / SECTOR_SIZE) as i16 - 1;
        self.trace(format_args!(
            "writing os_size to bootblock: {os_size:#06x} ({os_size}) at byte offset {OS_SIZE_LOC:#06x}"
        ));
        self.buf[OS_SIZE_LOC..OS_SIZE_LOC + 2].copy_from_slice(&os_size.to_le_bytes());
        Ok(())
    }

    /// Reserve the next full sector for the process directory.
    fn reserve_process_dir(&mut self) -> Result<()> {
        if self.buf.len() % SECTOR_SIZE != 0 {
            bail!("internal error: image not sector-aligned when reserving the process directory");
        }
        self.pd_loc = self.buf.len();
        self.pd_lim = self.pd_loc + SECTOR_SIZE;
        self.trace(format_args!(
            "reserving process directory: {:#06x} to {:#06x}",
            self.pd_loc, self.pd_lim
        ));
        self.buf.resize(self.pd_lim, 0);
        Ok(())
    }

    /// Record the directory entry the last `add_file` call computed into
    /// the next free directory slot.
    fn add_process_to_dir(&mut self) -> Result<()> {
        if self.pd_loc + 8 >= self.pd_lim {
            bail!("too many processes: process directory sector holds at most {MAX_DIRECTORY_ENTRIES} entries");
        }
        self.trace(format_args!(
            "\tadding process to directory: slot {:#06x}, start sector {:#06x}, sector count {:#06x}",
            self.pd_loc, self.dir.start_sector, self.dir.sector_count
        ));
        self.buf[self.pd_loc..self.pd_loc + 4].copy_from_slice(&self.dir.start_sector.to_le_bytes());
        self.buf[self.pd_loc + 4..self.pd_loc + 8].copy_from_slice(&self.dir.sector_count.to_le_bytes());
        self.pd_loc += 8;
        Ok(())
    }
}

/// Parse one ELF file and copy its loadable, executable segments into the
/// image at the physical addresses `Image::process_start`/`write_segment`
/// compute.
fn add_file(image: &mut Image, path: &Path) -> Result<()> {
    let file_bytes = fs::read(path).with_context(|| format!("{}: could not open file", path.display()))?;
    let elf = Elf::parse(&file_bytes).with_context(|| format!("{}: not a valid ELF file", path.display()))?;

    println!("{:#06x}: {}", elf.header.e_entry, path.display());

    for (ph, phdr) in elf.program_headers.iter().enumerate() {
        if ph == 0 {
            image.process_start(phdr.p_vaddr as u32)?;
        }

        image.trace(format_args!(
            "\tsegment {ph}\n\t\toffset {:#06x}\t\tvaddr {:#06x}\n\t\tfilesz {:#06x}\t\tmemsz {:#06x}",
            phdr.p_offset, phdr.p_vaddr, phdr.p_filesz, phdr.p_memsz
        ));

        if phdr.p_type != PT_LOAD || phdr.p_flags & PF_X == 0 {
            image.trace(format_args!("\t\tskipping non-loadable segment"));
            continue;
        }

        image.write_segment(
            &file_bytes,
            phdr.p_offset as usize,
            phdr.p_vaddr as u32,
            phdr.p_filesz as usize,
            phdr.p_memsz as usize,
        )?;
    }
    image.process_end();
    Ok(())
}

fn create_image(cli: &Cli) -> Result<()> {
    let mut image = Image::new(cli.vm, cli.extended);

    add_file(&mut image, &cli.bootblock)?;
    add_file(&mut image, &cli.kernel)?;

    if cli.vm {
        image.write_os_size()?;
        image.reserve_process_dir()?;
    } else if cli.processes.len() > 1 {
        // `process_start`'s non-VM offset math assumes at most one file
        // follows the kernel; mirror the original builder's offset
        // calculation exactly and warn instead of refusing.
        eprintln!(
            "warning: non-VM image with {} process arguments; process placement after the \
             first is unreliable without --vm",
            cli.processes.len()
        );
    }

    for process in &cli.processes {
        add_file(&mut image, process)?;
        if cli.vm {
            image.add_process_to_dir()?;
        }
    }

    if !cli.vm {
        image.write_os_size()?;
    }

    if image.buf.len() % SECTOR_SIZE != 0 {
        bail!("internal error: final image size {} is not sector-aligned", image.buf.len());
    }

    fs::write(IMAGE_FILE, &image.buf).context("writing image file")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    create_image(&cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elf32_bytes(entry: u32, segments: &[(u32, u32, &[u8], usize)]) -> Vec<u8> {
        // Hand-assembled minimal 32-bit little-endian ELF: header + one
        // program header per segment + the segment bytes themselves,
        // laid out back to back starting right after the headers.
        use std::convert::TryInto;

        let ehsize = 52usize;
        let phentsize = 32usize;
        let phnum = segments.len();
        let phoff = ehsize;
        let mut data_off = phoff + phentsize * phnum;

        let mut phdrs = Vec::new();
        let mut bodies = Vec::new();
        for &(p_type, vaddr, bytes, memsz) in segments {
            phdrs.push((p_type, data_off as u32, vaddr, bytes.len() as u32, memsz as u32));
            bodies.extend_from_slice(bytes);
            data_off += bytes.len();
        }

        let mut out = vec![0u8; data_off];
        out[0..4].copy_from_slice(b"\x7fELF");
        out[4] = 1; // ELFCLASS32
        out[5] = 1; // little endian
        out[6] = 1; // EI_VERSION
        out[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out[18..20].copy_from_slice(&3u16.to_le_bytes()); // EM_386
        out[20..24].copy_from_slice(&1u32.to_le_bytes());
        out[24..28].copy_from_slice(&entry.to_le_bytes());
        out[28..32].copy_from_slice(&(phoff as u32).to_le_bytes());
        out[40..42].copy_from_slice(&(ehsize as u16).to_le_bytes());
        out[42..44].copy_from_slice(&(phentsize as u16).to_le_bytes());
        out[44..46].copy_from_slice(&(phnum as u16).to_le_bytes());

        for (i, (p_type, p_offset, p_vaddr, p_filesz, p_memsz)) in phdrs.iter().enumerate() {
            let base = phoff + i * phentsize;
            out[base..base + 4].copy_from_slice(&p_type.to_le_bytes());
            out[base + 4..base + 8].copy_from_slice(&p_offset.to_le_bytes());
            out[base + 8..base + 12].copy_from_slice(&p_vaddr.to_le_bytes());
            out[base + 12..base + 16].copy_from_slice(&p_vaddr.to_le_bytes()); // p_paddr
            out[base + 16..base + 20].copy_from_slice(&p_filesz.to_le_bytes());
            out[base + 20..base + 24].copy_from_slice(&p_memsz.to_le_bytes());
            out[base + 24..base + 28].copy_from_slice(&(PF_X | 0x1 | 0x2).to_le_bytes());
        }

        let body_start = data_off - bodies.len();
        out[body_start..].copy_from_slice(&bodies);
        let _: usize = body_start.try_into().unwrap();
        out
    }

    #[test]
    fn non_vm_bootblock_plus_kernel_layout() {
        // 512-byte bootblock (vaddr 0), a 1024-byte kernel segment at vaddr
        // KERNEL_PADDR, no processes.
        let bootblock = elf32_bytes(0, &[(PT_LOAD, 0, &[0xAAu8; 512], 512)]);
        let kernel_bytes = vec![0xBBu8; 1024];
        let kernel = elf32_bytes(KERNEL_PADDR as u32, &[(PT_LOAD, KERNEL_PADDR as u32, &kernel_bytes, 1024)]);

        let mut image = Image::new(false, false);
        let tmp_boot = std::env::temp_dir().join("image_builder_test_bootblock.elf");
        let tmp_kernel = std::env::temp_dir().join("image_builder_test_kernel.elf");
        std::fs::write(&tmp_boot, &bootblock).unwrap();
        std::fs::write(&tmp_kernel, &kernel).unwrap();

        add_file(&mut image, &tmp_boot).unwrap();
        add_file(&mut image, &tmp_kernel).unwrap();
        image.write_os_size().unwrap();

        assert_eq!(image.buf.len(), 1536);
        assert_eq!(&image.buf[2..4], &2u16.to_le_bytes());
        assert_eq!(&image.buf[512..1536], &kernel_bytes[..]);

        let _ = std::fs::remove_file(&tmp_boot);
        let _ = std::fs::remove_file(&tmp_kernel);
    }

    #[test]
    fn directory_overflow_is_rejected() {
        let mut image = Image::new(true, false);
        image.reserve_process_dir().unwrap();
        for _ in 0..MAX_DIRECTORY_ENTRIES {
            image.add_process_to_dir().unwrap();
        }
        assert!(image.add_process_to_dir().is_err());
    }

    #[test]
    fn backward_travel_is_rejected() {
        let mut image = Image::new(true, false);
        image.buf = vec![0u8; 4096];
        image.offset = 0;
        // A segment landing before the current write cursor must error.
        let result = image.write_segment(&[0u8; 16], 0, 0, 16, 16);
        assert!(result.is_err());
    }
}
