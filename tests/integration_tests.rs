//! Integration tests for boot0img

use boot0img::checksum;
use boot0img::header::{DRAM_ENTRY, SRAM_ENTRY};
use boot0img::{
    Boot0ImageBuilder, Boot0ImgError, ImageHeader, OutputSink, BOOT0_OFFSET, HEADER_SIZE,
    SECTOR_SIZE, UBOOT_OFFSET_KB,
};
use byteorder::{ByteOrder, LittleEndian};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

fn write_temp(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

fn build_to(path: &Path, builder: Boot0ImageBuilder) -> boot0img::Result<Vec<u8>> {
    builder.quiet(true).write(OutputSink::create(path)?)?;
    Ok(fs::read(path).unwrap())
}

fn word_at(image: &[u8], index: usize) -> u32 {
    LittleEndian::read_u32(&image[index * 4..index * 4 + 4])
}

/// Smallest possible image: header plus an SRAM payload.
#[test]
fn test_sram_only_image() {
    let sram = write_temp(&[0x5Au8; 1000]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("boot.img");

    let image = build_to(&out, Boot0ImageBuilder::new().sram(sram.path())).unwrap();

    // header + SRAM padded to a sector, cut at the true end of content
    assert_eq!(image.len(), HEADER_SIZE + 1024);
    assert!(checksum::verify(&image).matches);

    // SRAM section recorded right behind the header
    assert_eq!(word_at(&image, 0x140 + 8), HEADER_SIZE as u32);
    assert_eq!(word_at(&image, 0x140 + 9), 1024);
    // primary size is the content length, total is 0x4000-aligned
    assert_eq!(word_at(&image, 6), (HEADER_SIZE + 1024) as u32);
    assert_eq!(word_at(&image, 5), 0x4000);
    assert_eq!(&image[4..9], b"uboot");

    // payload follows unmodified, zero-padded
    assert_eq!(image[HEADER_SIZE], 0x5A);
    assert_eq!(image[HEADER_SIZE + 999], 0x5A);
    assert_eq!(image[HEADER_SIZE + 1000], 0);
}

/// A synthesized AArch64 trampoline occupies the DRAM section and shifts
/// the SRAM section behind it.
#[test]
fn test_trampoline_dram_image() {
    let sram = write_temp(&[0x11u8; 512]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("boot.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new()
            .dram("trampoline64:0x40000000")
            .sram(sram.path()),
    )
    .unwrap();

    assert_eq!(image.len(), HEADER_SIZE + 512 + 512);
    assert!(checksum::verify(&image).matches);

    // DRAM at 1536 for exactly one sector, SRAM immediately after
    assert_eq!(word_at(&image, 0x140 + 0), HEADER_SIZE as u32);
    assert_eq!(word_at(&image, 0x140 + 1), SECTOR_SIZE as u32);
    assert_eq!(word_at(&image, 0x140 + 8), (HEADER_SIZE + SECTOR_SIZE) as u32);
    assert_eq!(word_at(&image, 0x140 + 9), SECTOR_SIZE as u32);

    // the trampoline instructions land at the recorded offset
    let dram = &image[HEADER_SIZE..HEADER_SIZE + 16];
    assert_eq!(LittleEndian::read_u32(&dram[0..4]), 0x5800_0050);
    assert_eq!(LittleEndian::read_u32(&dram[4..8]), 0xD61F_0200);
    assert_eq!(LittleEndian::read_u32(&dram[8..12]), 0x4000_0000);
}

/// U-Boot rides between the header and the sections.
#[test]
fn test_uboot_image() {
    let uboot = write_temp(&[0xB0u8; 3000]);
    let sram = write_temp(&[0x22u8; 256]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("boot.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new().uboot(uboot.path()).sram(sram.path()),
    )
    .unwrap();

    // uboot padded to 3072; sections start behind header + uboot
    assert_eq!(image.len(), HEADER_SIZE + 3072 + 512);
    assert!(checksum::verify(&image).matches);
    assert_eq!(image[HEADER_SIZE], 0xB0);
    assert_eq!(word_at(&image, 0x140 + 8), (3072 + HEADER_SIZE) as u32);
    assert_eq!(image[HEADER_SIZE + 3072], 0x22);
}

/// With an embedded header the U-Boot binary carries the header region
/// itself and no separate header is emitted.
#[test]
fn test_embedded_header_image() {
    let mut uboot = vec![0u8; HEADER_SIZE + 700];
    // a pre-existing branch instruction the tool must not touch
    uboot[0..4].copy_from_slice(&0xEA00_0176u32.to_le_bytes());
    uboot[HEADER_SIZE..].fill(0xBB);
    let uboot_file = write_temp(&uboot);
    let sram = write_temp(&[0x33u8; 100]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("boot.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new()
            .uboot(uboot_file.path())
            .embedded_header(true)
            .sram(sram.path()),
    )
    .unwrap();

    // uboot (header included) padded to 2560, then one SRAM sector
    assert_eq!(image.len(), 2560 + 512);
    assert!(checksum::verify(&image).matches);
    assert_eq!(word_at(&image, 0), 0xEA00_0176);
    assert_eq!(&image[4..9], b"uboot");
    assert_eq!(image[HEADER_SIZE], 0xBB);
    // SRAM offset counts from the start of the U-Boot binary
    assert_eq!(word_at(&image, 0x140 + 8), 2560);
}

#[test]
fn test_embedded_header_requires_uboot() {
    let sram = write_temp(&[0u8; 64]);
    let err = Boot0ImageBuilder::new()
        .sram(sram.path())
        .embedded_header(true)
        .validate()
        .unwrap_err();
    assert!(matches!(err, Boot0ImgError::EmbeddedHeaderNeedsUboot));
}

/// A boot0 prefix turns the output into a raw SD image: boot0 at 8 KiB,
/// firmware blob at the legacy 19096 KiB offset.
#[test]
fn test_raw_sd_image_layout() {
    let boot0 = write_temp(&[0xC3u8; 2048]);
    let sram = write_temp(&[0x44u8; 128]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sd.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new().boot0(boot0.path()).sram(sram.path()),
    )
    .unwrap();

    let firmware = UBOOT_OFFSET_KB * 1024;
    assert_eq!(image.len(), firmware + HEADER_SIZE + 512);

    // nothing before the boot0 carve-out, boot0 bytes inside it
    assert!(image[..BOOT0_OFFSET].iter().all(|&b| b == 0));
    assert_eq!(image[BOOT0_OFFSET], 0xC3);
    assert_eq!(image[BOOT0_OFFSET + 2047], 0xC3);
    assert!(image[BOOT0_OFFSET + 2048..firmware].iter().all(|&b| b == 0));

    // the firmware blob itself verifies in place
    assert_eq!(&image[firmware + 4..firmware + 9], b"uboot");
    assert!(checksum::verify(&image[firmware..]).matches);
}

/// The partition table precedes the boot0 prefix in sector 0.
#[test]
fn test_partition_table_prefix() {
    let boot0 = write_temp(&[0xC3u8; 512]);
    let sram = write_temp(&[0x55u8; 64]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sd.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new()
            .boot0(boot0.path())
            .partition(boot0img::mbr::PartitionKind::Fat, 16)
            .sram(sram.path()),
    )
    .unwrap();

    assert_eq!(&image[510..512], &[0x55, 0xAA]);
    let entry = &image[446..462];
    assert_eq!(entry[0], 0x80);
    assert_eq!(entry[4], 0x0C);
    assert_eq!(LittleEndian::read_u32(&entry[8..12]), 2048);
    assert_eq!(LittleEndian::read_u32(&entry[12..16]), 16 * 2048);
    assert_eq!(image[BOOT0_OFFSET], 0xC3);
}

/// Thumb-2 movw halfwords loading `imm` into r1.
fn movw_r1(imm: u16) -> [u8; 4] {
    let hw1 = 0xF240 | ((imm >> 12) & 0xF) | (((imm >> 11) & 1) << 10);
    let hw2 = (((imm >> 8) & 0x7) << 12) | (1 << 8) | (imm & 0xFF);
    let mut bytes = [0u8; 4];
    LittleEndian::write_u16(&mut bytes[0..2], hw1);
    LittleEndian::write_u16(&mut bytes[2..4], hw2);
    bytes
}

/// A fake boot0 with the two firmware-offset load sites a real one has,
/// carrying a valid checksum.
fn fake_boot0(sector: u16) -> Vec<u8> {
    let mut buf = vec![0u8; 1024];
    buf[0x40..0x44].copy_from_slice(&movw_r1(sector));
    buf[0x80..0x84].copy_from_slice(&movw_r1(sector));
    checksum::refresh(&mut buf);
    buf
}

/// Patching moves the firmware blob right behind the boot0 carve-out
/// and rewrites both load sites, re-checksumming the boot0.
#[test]
fn test_patched_raw_sd_image() {
    let boot0 = write_temp(&fake_boot0(38192));
    let sram = write_temp(&[0x66u8; 64]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sd.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new()
            .boot0(boot0.path())
            .patch_boot0(true)
            .sram(sram.path()),
    )
    .unwrap();

    // firmware right behind the 8 KiB + 32 KiB carve-out
    let firmware = BOOT0_OFFSET + boot0img::BOOT0_SIZE;
    assert_eq!(&image[firmware + 4..firmware + 9], b"uboot");
    assert!(checksum::verify(&image[firmware..]).matches);

    // both sites now load sector 80, and the boot0 checksum still holds
    let patched = &image[BOOT0_OFFSET..BOOT0_OFFSET + 1024];
    assert_eq!(&patched[0x40..0x44], &movw_r1(80));
    assert_eq!(&patched[0x80..0x84], &movw_r1(80));
    assert!(checksum::verify(patched).matches);
}

/// An unknown boot0 passes through byte-identical.
#[test]
fn test_patch_unknown_boot0_passthrough() {
    let pristine = fake_boot0(0x1234);
    let boot0 = write_temp(&pristine);
    let sram = write_temp(&[0x77u8; 64]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sd.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new()
            .boot0(boot0.path())
            .patch_boot0(true)
            .sram(sram.path()),
    )
    .unwrap();

    assert_eq!(&image[BOOT0_OFFSET..BOOT0_OFFSET + 1024], &pristine[..]);
}

#[test]
fn test_oversized_boot0_rejected() {
    let boot0 = write_temp(&vec![0u8; boot0img::BOOT0_SIZE + 1]);
    let sram = write_temp(&[0u8; 64]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sd.img");

    let err = build_to(
        &out,
        Boot0ImageBuilder::new().boot0(boot0.path()).sram(sram.path()),
    )
    .unwrap_err();
    assert!(matches!(err, Boot0ImgError::Boot0TooBig { .. }));
    assert_eq!(err.exit_code(), 3);
}

/// The arisc rearrangement shows up in the final image: payload shifted
/// behind the vector area, reset vector populated.
#[test]
fn test_arisc_entry_image() {
    let sram = write_temp(&[0x88u8; 300]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("boot.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new().sram(sram.path()).arisc_entry(0x44008),
    )
    .unwrap();

    assert!(checksum::verify(&image).matches);
    let sram_off = HEADER_SIZE;
    // l.j to the entry, l.nop in the delay slot
    assert_eq!(word_at(&image, sram_off / 4 + 64), (0x44008 - 0x40100) / 4);
    assert_eq!(word_at(&image, sram_off / 4 + 65), 0x1500_0000);
    assert_eq!(image[sram_off + 0x4000], 0x88);
}

/// Tampering with any byte breaks checksum verification.
#[test]
fn test_tampered_image_fails_verification() {
    let sram = write_temp(&[0x99u8; 200]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("boot.img");

    let mut image = build_to(&out, Boot0ImageBuilder::new().sram(sram.path())).unwrap();
    assert!(checksum::verify(&image).matches);

    image[HEADER_SIZE + 10] ^= 0x01;
    let report = checksum::verify(&image);
    assert!(!report.matches);
    assert_ne!(report.stored, report.computed);
}

/// All recorded offsets and sizes are sector multiples.
#[test]
fn test_alignment_invariants() {
    let dram = write_temp(&[1u8; 777]);
    let sram = write_temp(&[2u8; 333]);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("boot.img");

    let image = build_to(
        &out,
        Boot0ImageBuilder::new()
            .dram(dram.path().to_str().unwrap())
            .sram(sram.path()),
    )
    .unwrap();

    let header = ImageHeader::from_embedded(&image).unwrap();
    for entry in [DRAM_ENTRY, SRAM_ENTRY] {
        let (offset, size) = header.section_entry(entry);
        assert_eq!(offset % SECTOR_SIZE as u32, 0);
        assert_eq!(size % SECTOR_SIZE as u32, 0);
        assert_ne!(size, 0);
    }
    assert_eq!(word_at(&image, 5) % 0x4000, 0);
}
