/*!
 * Zip container of a `.docx` file.
 *
 * Every entry is kept in memory with its compression settings so the package
 * can be written back with only the translated XML parts replaced.
 */

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::DocumentError;

/// Main document part of a WordprocessingML package
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

/// One file inside the package
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

/// In-memory copy of a `.docx` zip archive
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    pub entries: Vec<PackageEntry>,
}

impl DocxPackage {
    /// Read every entry of the archive at `path`
    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        let file = File::open(path).map_err(|source| DocumentError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Read every entry of an archive from any seekable reader
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, DocumentError> {
        let mut zip = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(zip.len());

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| DocumentError::Archive(format!("{}: {}", file.name(), e)))?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }

        debug!("Read package with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Bytes of the entry called `name`
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name && !e.is_dir)
            .map(|e| e.data.as_slice())
    }

    /// Names of all entries, in archive order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|e| !e.is_dir).map(|e| e.name.as_str())
    }

    /// Write the archive, substituting the data of every entry named in `replacements`
    pub fn write_with_replacements<W: Write + Seek>(
        &self,
        writer: W,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> Result<W, DocumentError> {
        let mut zout = ZipWriter::new(writer);

        for entry in &self.entries {
            let data = replacements.get(&entry.name).unwrap_or(&entry.data);
            let mut options = SimpleFileOptions::default()
                .compression_method(entry.compression)
                .last_modified_time(entry.last_modified);
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }

            if entry.is_dir || entry.name.ends_with('/') {
                zout.add_directory(entry.name.as_str(), options)?;
            } else {
                zout.start_file(entry.name.as_str(), options)?;
                zout.write_all(data)
                    .map_err(|e| DocumentError::Archive(format!("{}: {}", entry.name, e)))?;
            }
        }

        Ok(zout.finish()?)
    }
}
