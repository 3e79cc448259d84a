#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// Kind of synthetic PE image to write.
#[derive(Clone, Copy)]
pub enum Image {
    /// Managed module with an assembly manifest.
    Assembly,
    /// Managed module without a manifest.
    NetModule,
    /// Plain native PE, no CLI header.
    Native,
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

/// Build a minimal PE32 image.
///
/// Layout: headers at 0x80, one `.text` section (RVA 0x2000, file 0x200)
/// holding the CLI header at 0x200 and the metadata root at 0x248.
pub fn pe_image(kind: Image) -> Vec<u8> {
    let mut buf = vec![0u8; 0x400];

    buf[0..2].copy_from_slice(b"MZ");
    put_u32(&mut buf, 0x3c, 0x80);

    buf[0x80..0x84].copy_from_slice(b"PE\0\0");
    put_u16(&mut buf, 0x84, 0x14c); // i386
    put_u16(&mut buf, 0x86, 1); // sections
    put_u16(&mut buf, 0x94, 0xe0); // optional header size
    put_u16(&mut buf, 0x96, 0x2102);

    let optional = 0x98;
    put_u16(&mut buf, optional, 0x10b);
    put_u32(&mut buf, optional + 92, 16);

    let section = optional + 0xe0;
    buf[section..section + 5].copy_from_slice(b".text");
    put_u32(&mut buf, section + 8, 0x1000);
    put_u32(&mut buf, section + 12, 0x2000);
    put_u32(&mut buf, section + 16, 0x200);
    put_u32(&mut buf, section + 20, 0x200);

    if let Image::Native = kind {
        return buf;
    }

    let cli_directory = optional + 96 + 14 * 8;
    put_u32(&mut buf, cli_directory, 0x2000);
    put_u32(&mut buf, cli_directory + 4, 72);

    let cli = 0x200;
    put_u32(&mut buf, cli, 72);
    put_u16(&mut buf, cli + 4, 2);
    put_u16(&mut buf, cli + 6, 5);
    put_u32(&mut buf, cli + 8, 0x2048);
    put_u32(&mut buf, cli + 12, 68);

    let metadata = 0x248;
    buf[metadata..metadata + 4].copy_from_slice(b"BSJB");
    put_u16(&mut buf, metadata + 4, 1);
    put_u16(&mut buf, metadata + 6, 1);
    put_u32(&mut buf, metadata + 12, 12);
    buf[metadata + 16..metadata + 26].copy_from_slice(b"v4.0.30319");
    put_u16(&mut buf, metadata + 30, 1); // streams

    // Stream header: offset, size, "#~"
    put_u32(&mut buf, metadata + 32, 44);
    put_u32(&mut buf, metadata + 36, 24);
    buf[metadata + 40..metadata + 42].copy_from_slice(b"#~");

    let tables = metadata + 44;
    buf[tables + 4] = 2;
    let valid = match kind {
        Image::Assembly => 0x1 | (1u64 << 0x20),
        _ => 0x1,
    };
    put_u64(&mut buf, tables + 8, valid);

    buf
}

pub fn write_image(path: &Path, kind: Image) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, pe_image(kind)).unwrap();
}

pub fn write_assembly(path: &Path) {
    write_image(path, Image::Assembly);
}
