//! ZIP assembly for rendered diagrams.

use std::{
    collections::HashSet,
    io::{self, Cursor, Seek, Write},
};

use thiserror::Error;
use zip::{CompressionMethod, DateTime, ZipWriter, result::ZipError, write::SimpleFileOptions};

use crate::domain::ImageFormat;

use super::types::RenderedDiagram;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("duplicate archive entry `{path}`")]
    DuplicateEntry { path: String },
    #[error("failed to start archive entry `{path}`: {source}")]
    Entry {
        path: String,
        #[source]
        source: ZipError,
    },
    #[error("failed to write archive entry `{path}`: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to finalize archive: {0}")]
    Finish(#[source] ZipError),
}

/// Build an in-memory ZIP archive. An empty slice yields a valid archive with
/// no entries.
pub fn build_archive(
    diagrams: &[RenderedDiagram],
    format: ImageFormat,
) -> Result<Vec<u8>, ArchiveError> {
    write_archive(Cursor::new(Vec::new()), diagrams, format).map(Cursor::into_inner)
}

/// Write diagrams into `sink` as ZIP entries at their archive paths.
///
/// Entries are sorted by path and stamped with a fixed timestamp, so equal
/// input produces byte-identical archives regardless of render completion
/// order. On error the sink is dropped; callers never see a partial archive.
pub fn write_archive<W: Write + Seek>(
    sink: W,
    diagrams: &[RenderedDiagram],
    format: ImageFormat,
) -> Result<W, ArchiveError> {
    let mut ordered: Vec<&RenderedDiagram> = diagrams.iter().collect();
    ordered.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));

    let mut seen = HashSet::with_capacity(ordered.len());
    if let Some(duplicate) = ordered
        .iter()
        .find(|diagram| !seen.insert(diagram.archive_path.as_str()))
    {
        return Err(ArchiveError::DuplicateEntry {
            path: duplicate.archive_path.clone(),
        });
    }

    let compression = if format.is_precompressed() {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };
    let options = SimpleFileOptions::default()
        .compression_method(compression)
        .last_modified_time(DateTime::default());

    let mut writer = ZipWriter::new(sink);
    for diagram in ordered {
        writer
            .start_file(diagram.archive_path.as_str(), options)
            .map_err(|source| ArchiveError::Entry {
                path: diagram.archive_path.clone(),
                source,
            })?;
        writer
            .write_all(&diagram.bytes)
            .map_err(|source| ArchiveError::Write {
                path: diagram.archive_path.clone(),
                source,
            })?;
    }

    writer.finish().map_err(ArchiveError::Finish)
}
