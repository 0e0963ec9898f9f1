//! # Report Assembly
//!
//! Collects the report's sections in an explicit [`ReportBuilder`] and turns
//! the finished [`Report`] into a plain-text document plus one PNG per
//! annotated map tile.
//!
//! ## Layout
//! 1. Title
//! 2. Filesystem facts
//! 3. Location (only for geotagged photos): place caption, mosaic, credits
//! 4. EXIF tags as `key | name | value` rows
//! 5. Maker notes, kept apart because they are usually long vendor blobs

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::annotator::Location;
use crate::photo::{ExifRecord, FileFacts, ImageSummary};
use crate::{AnnotatedTileSet, GeoPoint, ZoomLevel};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("cannot write report: {0}")]
    Io(#[from] io::Error),

    #[error("cannot encode map tile: {0}")]
    Image(#[from] image::ImageError),
}

/// One block of the report, in display order.
#[derive(Clone, Debug)]
pub enum Section {
    Title(String),
    FileFacts {
        facts: FileFacts,
        image: ImageSummary,
    },
    Location {
        point: GeoPoint,
        place: Option<String>,
        mosaic: Option<AnnotatedTileSet>,
        attribution: String,
    },
    ExifTags(Vec<ExifRecord>),
    MakerNotes(Vec<ExifRecord>),
}

/// Accumulates sections until [`ReportBuilder::build`] seals them.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    sections: Vec<Section>,
}

impl ReportBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            sections: vec![Section::Title(title.into())],
        }
    }

    pub fn file_facts(&mut self, facts: FileFacts, image: ImageSummary) -> &mut Self {
        self.sections.push(Section::FileFacts { facts, image });
        self
    }

    pub fn location(&mut self, location: Location, attribution: impl Into<String>) -> &mut Self {
        self.sections.push(Section::Location {
            point: location.point,
            place: location.place,
            mosaic: location.mosaic,
            attribution: attribution.into(),
        });
        self
    }

    pub fn exif_tags(&mut self, records: Vec<ExifRecord>) -> &mut Self {
        self.sections.push(Section::ExifTags(records));
        self
    }

    /// Adds the maker note section; nothing is added for an empty list.
    pub fn maker_notes(&mut self, records: Vec<ExifRecord>) -> &mut Self {
        if !records.is_empty() {
            self.sections.push(Section::MakerNotes(records));
        }
        self
    }

    pub fn build(self) -> Report {
        Report {
            sections: self.sections,
        }
    }
}

/// A finished report.
#[derive(Clone, Debug)]
pub struct Report {
    sections: Vec<Section>,
}

impl Report {
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The mosaic of the location section, if one was built.
    pub fn mosaic(&self) -> Option<&AnnotatedTileSet> {
        self.sections.iter().find_map(|section| match section {
            Section::Location { mosaic, .. } => mosaic.as_ref(),
            _ => None,
        })
    }

    pub fn render_text(&self) -> String {
        self.to_string()
    }

    /// Write the text report to `output` and every map tile next to it as
    /// `<stem>-z<zoom>.png`. Returns the paths written, report first.
    pub fn write<P: AsRef<Path>>(&self, output: P) -> Result<Vec<PathBuf>, ReportError> {
        let output = output.as_ref();
        fs::write(output, self.render_text())?;
        let mut written = vec![output.to_path_buf()];

        if let Some(mosaic) = self.mosaic() {
            for tile in mosaic {
                let path = tile_path(output, tile.zoom);
                tile.image.save(&path)?;
                debug!("tile {} saved to {}", tile.address, path.display());
                written.push(path);
            }
        }

        info!(
            "report written to {} ({} files)",
            output.display(),
            written.len()
        );
        Ok(written)
    }
}

/// `report.txt` at zoom 7 gives `report-z7.png` in the same directory.
fn tile_path(output: &Path, zoom: ZoomLevel) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output.with_file_name(format!("{stem}-z{zoom}.png"))
}

fn heading(f: &mut fmt::Formatter<'_>, text: &str, underline: char) -> fmt::Result {
    writeln!(f, "{text}")?;
    writeln!(f, "{}", underline.to_string().repeat(text.chars().count()))
}

/// Image rows for whatever the header revealed.
fn image_rows(image: &ImageSummary) -> Vec<(&'static str, String)> {
    let mut rows = Vec::new();
    if let Some(format) = &image.format {
        rows.push(("Image format", format.clone()));
    }
    if let Some(mode) = &image.mode {
        rows.push(("Image mode", mode.clone()));
    }
    if let Some((w, h)) = image.dimensions {
        rows.push(("Image size", format!("{w}x{h} px")));
    }
    rows
}

fn exif_rows(f: &mut fmt::Formatter<'_>, records: &[ExifRecord]) -> fmt::Result {
    let width = records.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
    writeln!(f, "{:>5} | {:<width$} | Content", "Key", "Name")?;
    for record in records {
        writeln!(f, "{:>5} | {:<width$} | {}", record.tag, record.name, record.value)?;
    }
    Ok(())
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Title(title) => heading(f, title, '='),

            Section::FileFacts { facts, image } => {
                heading(f, "FileSystem data", '-')?;
                let mut rows = facts.rows();
                // Image rows follow the digest
                let at = rows
                    .iter()
                    .position(|(label, _)| *label == "File MD5")
                    .map_or(rows.len(), |i| i + 1);
                rows.splice(at..at, image_rows(image));
                let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
                for (label, value) in rows {
                    writeln!(f, "{label:<width$} : {value}")?;
                }
                Ok(())
            }

            Section::Location {
                point,
                place,
                mosaic,
                attribution,
            } => {
                heading(f, "EXIF Location data", '-')?;
                writeln!(f, "Coordinates: {point}")?;
                if let Some(place) = place {
                    writeln!(f, "The photo seems to have been shot in: \"{place}\"")?;
                }
                if let Some(mosaic) = mosaic.as_ref().filter(|m| !m.is_empty()) {
                    writeln!(f)?;
                    for tile in mosaic {
                        writeln!(f, "Map at zoom {:>2}: tile {}", tile.zoom, tile.address)?;
                    }
                    writeln!(f, "{attribution}")?;
                }
                Ok(())
            }

            Section::ExifTags(records) => {
                heading(f, "EXIF tags", '-')?;
                exif_rows(f, records)
            }

            Section::MakerNotes(records) => {
                heading(f, "Maker Notes", '-')?;
                exif_rows(f, records)
            }
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{section}")?;
        }
        Ok(())
    }
}
