//! Decide whether a file on disk is a managed assembly worth disassembling.
//!
//! Only the headers are read: DOS stub, PE/COFF headers, the section table,
//! the CLI header and the metadata root. A file is an assembly when its
//! metadata tables carry an Assembly row, i.e. the module has a manifest.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

const DOS_SIGNATURE: &[u8; 2] = b"MZ";
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
const METADATA_SIGNATURE: u32 = 0x424A_5342; // "BSJB"

const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;

const CLI_HEADER_DIRECTORY: u32 = 14;
const COFF_HEADER_SIZE: u64 = 20;
const SECTION_HEADER_SIZE: u64 = 40;
const MAX_STREAMS: u16 = 16;

/// Bit of the Assembly table (0x20) in the `#~` valid mask.
const ASSEMBLY_TABLE_BIT: u64 = 1 << 0x20;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("missing MZ signature")]
    NoDosSignature,

    #[error("missing PE signature")]
    NoPeSignature,

    #[error("unknown optional header magic {0:#x}")]
    BadOptionalHeader(u16),

    #[error("no CLI header (native image)")]
    NotManaged,

    #[error("RVA {0:#x} is not mapped by any section")]
    UnmappedRva(u32),

    #[error("bad metadata signature {0:#x}")]
    BadMetadataSignature(u32),

    #[error("no metadata table stream")]
    NoTableStream,

    #[error("module has no assembly manifest")]
    NoManifest,

    #[error("image is truncated")]
    Truncated,

    #[error("unreadable: {0}")]
    Unreadable(io::Error),
}

impl From<io::Error> for ImageError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ImageError::Truncated
        } else {
            ImageError::Unreadable(err)
        }
    }
}

/// Result of probing one file.
#[derive(Debug)]
pub enum Probe {
    Assembly,
    NotAssembly(ImageError),
    /// The file is held open by someone else. A load conflict means the
    /// module is valid, just busy.
    Busy,
    /// The file disappeared between listing and probing.
    Missing,
}

impl Probe {
    pub fn is_assembly(&self) -> bool {
        matches!(self, Probe::Assembly | Probe::Busy)
    }
}

/// Probe `path`. Never fails; every outcome is a classification.
pub fn probe(path: &Path) -> Probe {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Probe::Missing,
        Err(err) if is_lock_violation(&err) => return Probe::Busy,
        Err(err) => return Probe::NotAssembly(ImageError::Unreadable(err)),
    };

    match read_manifest(BufReader::new(file)) {
        Ok(()) => Probe::Assembly,
        Err(ImageError::Unreadable(err)) if is_lock_violation(&err) => Probe::Busy,
        Err(err) => Probe::NotAssembly(err),
    }
}

pub fn is_assembly(path: &Path) -> bool {
    probe(path).is_assembly()
}

fn is_lock_violation(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    #[cfg(windows)]
    {
        use winapi::shared::winerror::{ERROR_LOCK_VIOLATION, ERROR_SHARING_VIOLATION};
        if let Some(code) = err.raw_os_error() {
            let code = code as u32;
            return code == ERROR_SHARING_VIOLATION || code == ERROR_LOCK_VIOLATION;
        }
    }

    false
}

struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_offset: u32,
}

struct ImageReader<R> {
    inner: R,
}

impl<R: Read + Seek> ImageReader<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ImageError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.read_exact(buf)?;
        Ok(())
    }

    fn u16_at(&mut self, offset: u64) -> Result<u16, ImageError> {
        let mut buf = [0u8; 2];
        self.read_at(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn u32_at(&mut self, offset: u64) -> Result<u32, ImageError> {
        let mut buf = [0u8; 4];
        self.read_at(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn u64_at(&mut self, offset: u64) -> Result<u64, ImageError> {
        let mut buf = [0u8; 8];
        self.read_at(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// Walk the headers down to the metadata tables and check for a manifest.
fn read_manifest<R: Read + Seek>(inner: R) -> Result<(), ImageError> {
    let mut reader = ImageReader { inner };

    let mut dos = [0u8; 2];
    reader
        .read_at(0, &mut dos)
        .map_err(|_| ImageError::NoDosSignature)?;
    if &dos != DOS_SIGNATURE {
        return Err(ImageError::NoDosSignature);
    }

    let pe_offset = u64::from(reader.u32_at(0x3c)?);
    let mut pe = [0u8; 4];
    reader
        .read_at(pe_offset, &mut pe)
        .map_err(|_| ImageError::NoPeSignature)?;
    if &pe != PE_SIGNATURE {
        return Err(ImageError::NoPeSignature);
    }

    let coff = pe_offset + 4;
    let section_count = reader.u16_at(coff + 2)?;
    let optional_size = u64::from(reader.u16_at(coff + 16)?);
    let optional = coff + COFF_HEADER_SIZE;

    let (count_offset, directories) = match reader.u16_at(optional)? {
        PE32_MAGIC => (92, 96),
        PE32_PLUS_MAGIC => (108, 112),
        magic => return Err(ImageError::BadOptionalHeader(magic)),
    };

    let directory_count = reader.u32_at(optional + count_offset)?;
    let cli_entry = directories + u64::from(CLI_HEADER_DIRECTORY) * 8;
    if directory_count <= CLI_HEADER_DIRECTORY || cli_entry + 8 > optional_size {
        return Err(ImageError::NotManaged);
    }
    let cli_rva = reader.u32_at(optional + cli_entry)?;
    let cli_size = reader.u32_at(optional + cli_entry + 4)?;
    if cli_rva == 0 || cli_size == 0 {
        return Err(ImageError::NotManaged);
    }

    let sections = read_sections(&mut reader, optional + optional_size, section_count)?;

    let cli_header = rva_to_offset(&sections, cli_rva)?;
    let metadata_rva = reader.u32_at(cli_header + 8)?;
    let metadata = rva_to_offset(&sections, metadata_rva)?;

    let signature = reader.u32_at(metadata)?;
    if signature != METADATA_SIGNATURE {
        return Err(ImageError::BadMetadataSignature(signature));
    }

    let version_length = u64::from(reader.u32_at(metadata + 12)?);
    let stream_count = reader.u16_at(metadata + 16 + version_length + 2)?;
    let mut header = metadata + 16 + version_length + 4;

    for _ in 0..stream_count.min(MAX_STREAMS) {
        let offset = u64::from(reader.u32_at(header)?);
        let mut name = [0u8; 32];
        let name_len = read_stream_name(&mut reader, header + 8, &mut name)?;

        if &name[..name_len] == b"#~" || &name[..name_len] == b"#-" {
            let valid = reader.u64_at(metadata + offset + 8)?;
            return if valid & ASSEMBLY_TABLE_BIT != 0 {
                Ok(())
            } else {
                Err(ImageError::NoManifest)
            };
        }

        // Names are null terminated and padded to four bytes.
        header += 8 + ((name_len as u64 + 4) & !3);
    }

    Err(ImageError::NoTableStream)
}

fn read_sections<R: Read + Seek>(
    reader: &mut ImageReader<R>,
    table: u64,
    count: u16,
) -> Result<Vec<Section>, ImageError> {
    (0..u64::from(count))
        .map(|index| {
            let entry = table + index * SECTION_HEADER_SIZE;
            Ok(Section {
                virtual_size: reader.u32_at(entry + 8)?,
                virtual_address: reader.u32_at(entry + 12)?,
                raw_size: reader.u32_at(entry + 16)?,
                raw_offset: reader.u32_at(entry + 20)?,
            })
        })
        .collect()
}

fn rva_to_offset(sections: &[Section], rva: u32) -> Result<u64, ImageError> {
    sections
        .iter()
        .find(|s| {
            let extent = s.virtual_size.max(s.raw_size);
            rva >= s.virtual_address && u64::from(rva) < u64::from(s.virtual_address) + u64::from(extent)
        })
        .map(|s| u64::from(rva - s.virtual_address) + u64::from(s.raw_offset))
        .ok_or(ImageError::UnmappedRva(rva))
}

fn read_stream_name<R: Read + Seek>(
    reader: &mut ImageReader<R>,
    offset: u64,
    name: &mut [u8; 32],
) -> Result<usize, ImageError> {
    for (i, slot) in name.iter_mut().enumerate() {
        let mut byte = [0u8; 1];
        reader.read_at(offset + i as u64, &mut byte)?;
        if byte[0] == 0 {
            return Ok(i);
        }
        *slot = byte[0];
    }
    Err(ImageError::NoTableStream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn put_u16(buf: &mut [u8], at: usize, v: u16) {
        buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put_u32(buf: &mut [u8], at: usize, v: u32) {
        buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// PE32 headers with one section and an optional CLI directory.
    fn pe_headers(cli_rva: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 0x400];
        buf[0..2].copy_from_slice(b"MZ");
        put_u32(&mut buf, 0x3c, 0x80);
        buf[0x80..0x84].copy_from_slice(b"PE\0\0");
        put_u16(&mut buf, 0x86, 1);
        put_u16(&mut buf, 0x94, 0xe0);
        put_u16(&mut buf, 0x98, PE32_MAGIC);
        put_u32(&mut buf, 0x98 + 92, 16);
        put_u32(&mut buf, 0x98 + 96 + 14 * 8, cli_rva);
        put_u32(&mut buf, 0x98 + 96 + 14 * 8 + 4, if cli_rva == 0 { 0 } else { 72 });
        let section = 0x98 + 0xe0;
        put_u32(&mut buf, section + 8, 0x1000);
        put_u32(&mut buf, section + 12, 0x2000);
        put_u32(&mut buf, section + 16, 0x200);
        put_u32(&mut buf, section + 20, 0x200);
        buf
    }

    #[test]
    fn test_text_file_is_not_an_image() {
        let err = read_manifest(Cursor::new(b"hello, world".to_vec())).unwrap_err();
        assert!(matches!(err, ImageError::NoDosSignature));
    }

    #[test]
    fn test_empty_file_is_not_an_image() {
        let err = read_manifest(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ImageError::NoDosSignature));
    }

    #[test]
    fn test_dos_stub_without_pe_header() {
        let mut buf = vec![0u8; 0x100];
        buf[0..2].copy_from_slice(b"MZ");
        put_u32(&mut buf, 0x3c, 0x40);
        let err = read_manifest(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ImageError::NoPeSignature));
    }

    #[test]
    fn test_native_image_has_no_cli_header() {
        let err = read_manifest(Cursor::new(pe_headers(0))).unwrap_err();
        assert!(matches!(err, ImageError::NotManaged));
    }

    #[test]
    fn test_bad_optional_header_magic() {
        let mut buf = pe_headers(0);
        put_u16(&mut buf, 0x98, 0x1234);
        let err = read_manifest(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ImageError::BadOptionalHeader(0x1234)));
    }

    #[test]
    fn test_cli_header_outside_sections() {
        let err = read_manifest(Cursor::new(pe_headers(0x9000))).unwrap_err();
        assert!(matches!(err, ImageError::UnmappedRva(0x9000)));
    }

    #[test]
    fn test_bad_metadata_signature() {
        let mut buf = pe_headers(0x2000);
        put_u32(&mut buf, 0x200 + 8, 0x2048);
        put_u32(&mut buf, 0x248, 0xdead_beef);
        let err = read_manifest(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ImageError::BadMetadataSignature(0xdead_beef)));
    }

    #[test]
    fn test_rva_mapping_uses_raw_offset() {
        let sections = vec![Section {
            virtual_address: 0x2000,
            virtual_size: 0x100,
            raw_size: 0x200,
            raw_offset: 0x400,
        }];
        assert_eq!(rva_to_offset(&sections, 0x2010).unwrap(), 0x410);
        assert_eq!(rva_to_offset(&sections, 0x21ff).unwrap(), 0x5ff);
        assert!(rva_to_offset(&sections, 0x2200).is_err());
        assert!(rva_to_offset(&sections, 0x1fff).is_err());
    }

    #[test]
    fn test_missing_file_probe() {
        let probe = probe(Path::new("/definitely/not/here/a.dll"));
        assert!(matches!(probe, Probe::Missing));
        assert!(!probe.is_assembly());
    }

    #[test]
    fn test_busy_counts_as_assembly() {
        assert!(Probe::Busy.is_assembly());
        assert!(!Probe::NotAssembly(ImageError::NotManaged).is_assembly());
    }
}
