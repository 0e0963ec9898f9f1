//! # Photo Metadata
//!
//! Reads what the report says about the input file: the filesystem facts and
//! every EXIF tag, with the GPS position decoded to signed decimal degrees.
//!
//! ## GPS Decoding
//! EXIF stores each coordinate as three rationals (degrees, minutes,
//! seconds) plus a one-letter hemisphere reference. Southern latitudes and
//! western longitudes are negated. A photo with a missing or malformed
//! coordinate has no position at all: the location section is skipped.
//!
//! ## Image Header
//! Format, colour mode and pixel size come from the image decoder's header,
//! independently of EXIF. The format is sniffed from the file's magic bytes
//! and only falls back to the extension, so a PNG named `.jpg` reports
//! `PNG`. EXIF pixel dimensions win over the header's when both exist.

use chrono::{DateTime, Local, TimeZone};
use exif::{Exif, Field, In, Reader, Tag, Value};
use image::codecs::jpeg::JpegDecoder;
use image::codecs::png::PngDecoder;
use image::{ColorType, ImageDecoder, ImageFormat, ImageResult};
use md5::{Digest, Md5};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

use crate::GeoPoint;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("cannot read photo: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt EXIF block: {0}")]
    Exif(#[from] exif::Error),
}

/// One decoded EXIF tag, in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct ExifRecord {
    pub tag: u16,
    pub name: String,
    pub value: String,
}

/// Everything extracted from the photo's EXIF block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhotoMetadata {
    pub records: Vec<ExifRecord>,
    /// Maker notes are vendor blobs; the report prints them on their own.
    pub maker_notes: Vec<ExifRecord>,
    pub gps: Option<GeoPoint>,
    pub image: ImageSummary,
}

/// What the image itself says about its encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageSummary {
    /// Upper-case format name, e.g. `JPEG`
    pub format: Option<String>,
    /// Colour mode, e.g. `RGB` or `L`
    pub mode: Option<String>,
    /// Width and height in pixels
    pub dimensions: Option<(u32, u32)>,
}

impl ImageSummary {
    /// Sniff the format of the file at `path` and read its decoder header.
    ///
    /// Every field stays `None` when it cannot be determined; the file
    /// itself is never rejected here.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let format = image::io::Reader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .ok()
            .and_then(|reader| reader.format())
            .or_else(|| ImageFormat::from_path(path).ok());

        let header = match format.map(|format| read_header(path, format)) {
            Some(Ok(header)) => header,
            Some(Err(e)) => {
                debug!("no image header in {}: {}", path.display(), e);
                None
            }
            None => None,
        };

        Self {
            format: format.map(|format| format!("{format:?}").to_uppercase()),
            mode: header.map(|(color, _)| mode_name(color)),
            dimensions: header.map(|(_, dimensions)| dimensions),
        }
    }
}

fn read_header(path: &Path, format: ImageFormat) -> ImageResult<Option<(ColorType, (u32, u32))>> {
    let file = BufReader::new(File::open(path)?);
    Ok(match format {
        ImageFormat::Jpeg => {
            let decoder = JpegDecoder::new(file)?;
            Some((decoder.color_type(), decoder.dimensions()))
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(file)?;
            Some((decoder.color_type(), decoder.dimensions()))
        }
        _ => None,
    })
}

/// Short colour mode name, as image tools usually print it.
fn mode_name(color: ColorType) -> String {
    let name = match color {
        ColorType::L8 | ColorType::L16 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        other => return format!("{other:?}"),
    };
    name.to_string()
}

/// Read the EXIF block of the photo at `path`.
///
/// A photo without EXIF is not an error: the result is simply empty.
pub fn read_photo<P: AsRef<Path>>(path: P) -> Result<PhotoMetadata, PhotoError> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);

    let mut metadata = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => metadata_from_exif(&exif),
        Err(exif::Error::NotFound(_)) => {
            info!("{} carries no EXIF data", path.display());
            PhotoMetadata::default()
        }
        Err(e) => return Err(e.into()),
    };

    let header = ImageSummary::inspect(path);
    metadata.image = ImageSummary {
        dimensions: metadata.image.dimensions.or(header.dimensions),
        ..header
    };

    debug!(
        "{}: {} EXIF tags, {} maker notes, GPS {}",
        path.display(),
        metadata.records.len(),
        metadata.maker_notes.len(),
        metadata
            .gps
            .map_or_else(|| "absent".to_string(), |p| p.to_string())
    );
    Ok(metadata)
}

/// Decode an already parsed EXIF block.
pub fn metadata_from_exif(exif: &Exif) -> PhotoMetadata {
    let mut records = Vec::new();
    let mut maker_notes = Vec::new();

    for field in exif.fields() {
        let record = ExifRecord {
            tag: field.tag.number(),
            name: field.tag.to_string(),
            value: field.display_value().with_unit(exif).to_string(),
        };
        if field.tag == Tag::MakerNote {
            maker_notes.push(record);
        } else {
            records.push(record);
        }
    }

    let dimensions = match (
        uint_field(exif, Tag::PixelXDimension),
        uint_field(exif, Tag::PixelYDimension),
    ) {
        (Some(width), Some(height)) => Some((width, height)),
        _ => None,
    };

    PhotoMetadata {
        records,
        maker_notes,
        gps: gps_position(exif),
        image: ImageSummary {
            dimensions,
            ..ImageSummary::default()
        },
    }
}

/// Decimal degrees from degrees, minutes and seconds.
///
/// `reference` is the EXIF hemisphere letter; `S` and `W` give a negative
/// result.
///
/// # Example
/// ```
/// use photo_locator::photo::dms_to_degrees;
///
/// assert_eq!(dms_to_degrees(45.0, 30.0, 0.0, 'N'), 45.5);
/// assert_eq!(dms_to_degrees(10.0, 15.0, 0.0, 'W'), -10.25);
/// ```
pub fn dms_to_degrees(degrees: f64, minutes: f64, seconds: f64, reference: char) -> f64 {
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    match reference.to_ascii_uppercase() {
        'S' | 'W' => -value,
        _ => value,
    }
}

fn gps_position(exif: &Exif) -> Option<GeoPoint> {
    let latitude = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let longitude = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
    Some(GeoPoint::new(latitude, longitude))
}

fn coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(reference_letter)?;

    match field.value {
        Value::Rational(ref dms) if dms.len() == 3 => {
            let [d, m, s] = [dms[0], dms[1], dms[2]].map(|r| r.to_f64());
            let degrees = dms_to_degrees(d, m, s, reference);
            degrees.is_finite().then_some(degrees)
        }
        _ => None,
    }
}

fn reference_letter(field: &Field) -> Option<char> {
    match field.value {
        Value::Ascii(ref strings) => strings
            .first()
            .and_then(|s| s.first())
            .map(|&b| char::from(b)),
        _ => None,
    }
}

fn uint_field(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

/// Filesystem facts about the input file.
#[derive(Clone, Debug, PartialEq)]
pub struct FileFacts {
    pub name: String,
    pub size_kb: u64,
    /// Lower-case hex digest of the whole file
    pub md5: String,
    pub modified: Option<String>,
    pub accessed: Option<String>,
    pub read_only: bool,
    /// Only filled in on Unix
    pub stat: Option<UnixStat>,
}

/// The `stat(2)` fields with no portable counterpart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnixStat {
    pub mode: u32,
    pub inode: u64,
    pub device: u64,
    pub rdev: u64,
    pub links: u64,
    pub uid: u32,
    pub gid: u32,
    /// Last status change
    pub changed: Option<String>,
    pub blocks: u64,
    pub block_size: u64,
}

impl FileFacts {
    pub fn collect<P: AsRef<Path>>(path: P) -> Result<Self, PhotoError> {
        let path = path.as_ref();
        let meta = fs::metadata(path)?;

        Ok(Self {
            name: path.display().to_string(),
            size_kb: meta.len() / 1024,
            md5: file_md5(path)?,
            modified: meta.modified().ok().map(format_time),
            accessed: meta.accessed().ok().map(format_time),
            read_only: meta.permissions().readonly(),
            stat: unix_stat(&meta),
        })
    }

    /// Label/value rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let unknown = || "unknown".to_string();
        let mut rows = vec![
            ("File name", self.name.clone()),
            ("File size", format!("{} kB", self.size_kb)),
            ("File MD5", self.md5.clone()),
            ("Last modified", self.modified.clone().unwrap_or_else(unknown)),
            ("Last accessed", self.accessed.clone().unwrap_or_else(unknown)),
            ("Read only", if self.read_only { "yes" } else { "no" }.to_string()),
        ];

        if let Some(stat) = &self.stat {
            rows.extend([
                ("Protection bits", format!("{:#b}", stat.mode)),
                ("Inode number", stat.inode.to_string()),
                ("Device", stat.device.to_string()),
                ("Type of device", stat.rdev.to_string()),
                ("Hard links", stat.links.to_string()),
                ("Owner UID", stat.uid.to_string()),
                ("Owner GID", stat.gid.to_string()),
                ("Status changed", stat.changed.clone().unwrap_or_else(unknown)),
                ("Blocks allocated", stat.blocks.to_string()),
                ("Block size", stat.block_size.to_string()),
            ]);
        }
        rows
    }
}

fn file_md5(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(unix)]
fn unix_stat(meta: &fs::Metadata) -> Option<UnixStat> {
    use std::os::unix::fs::MetadataExt;

    Some(UnixStat {
        mode: meta.mode(),
        inode: meta.ino(),
        device: meta.dev(),
        rdev: meta.rdev(),
        links: meta.nlink(),
        uid: meta.uid(),
        gid: meta.gid(),
        changed: Local
            .timestamp_opt(meta.ctime(), 0)
            .single()
            .map(format_local),
        blocks: meta.blocks(),
        block_size: meta.blksize(),
    })
}

#[cfg(not(unix))]
fn unix_stat(_meta: &fs::Metadata) -> Option<UnixStat> {
    None
}

fn format_time(time: SystemTime) -> String {
    format_local(DateTime::<Local>::from(time))
}

fn format_local(time: DateTime<Local>) -> String {
    time.format("%a %b %e %H:%M:%S %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use exif::experimental::Writer;
    use exif::Rational;
    use image::{Luma, GrayImage, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn rational(num: u32, denom: u32) -> Rational {
        Rational { num, denom }
    }

    fn ascii(s: &str) -> Value {
        Value::Ascii(vec![s.as_bytes().to_vec()])
    }

    fn field(tag: Tag, value: Value) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        }
    }

    fn encode(fields: &[Field]) -> Exif {
        let mut writer = Writer::new();
        for f in fields {
            writer.push_field(f);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();
        Reader::new().read_raw(buf.into_inner()).unwrap()
    }

    fn geotagged() -> Vec<Field> {
        vec![
            field(Tag::Make, ascii("ACME")),
            field(Tag::PixelXDimension, Value::Long(vec![4000])),
            field(Tag::PixelYDimension, Value::Long(vec![3000])),
            field(Tag::MakerNote, Value::Undefined(vec![1, 2, 3, 4], 0)),
            field(
                Tag::GPSLatitude,
                Value::Rational(vec![rational(33, 1), rational(52, 1), rational(776, 100)]),
            ),
            field(Tag::GPSLatitudeRef, ascii("S")),
            field(
                Tag::GPSLongitude,
                Value::Rational(vec![rational(151, 1), rational(12, 1), rational(3348, 100)]),
            ),
            field(Tag::GPSLongitudeRef, ascii("E")),
        ]
    }

    #[test]
    fn test_dms_to_degrees_hemispheres() {
        assert_abs_diff_eq!(dms_to_degrees(40.0, 42.0, 46.08, 'N'), 40.7128, epsilon = 1e-9);
        assert_abs_diff_eq!(dms_to_degrees(74.0, 0.0, 21.6, 'W'), -74.006, epsilon = 1e-9);
        assert_abs_diff_eq!(dms_to_degrees(33.0, 52.0, 7.76, 's'), -33.868_822, epsilon = 1e-6);
        assert_abs_diff_eq!(dms_to_degrees(151.0, 12.0, 33.48, 'E'), 151.2093, epsilon = 1e-9);
    }

    #[test]
    fn test_gps_position_is_signed() {
        let meta = metadata_from_exif(&encode(&geotagged()));
        let gps = meta.gps.unwrap();
        assert_abs_diff_eq!(gps.latitude, -33.868_822, epsilon = 1e-6);
        assert_abs_diff_eq!(gps.longitude, 151.2093, epsilon = 1e-6);
    }

    #[test]
    fn test_maker_notes_are_split_out() {
        let meta = metadata_from_exif(&encode(&geotagged()));
        assert_eq!(meta.maker_notes.len(), 1);
        assert_eq!(meta.maker_notes[0].tag, 37500);
        assert!(meta.records.iter().all(|r| r.tag != 37500));
        assert!(meta.records.iter().any(|r| r.name == "Make"));
    }

    #[test]
    fn test_dimensions_from_exif() {
        let meta = metadata_from_exif(&encode(&geotagged()));
        assert_eq!(meta.image.dimensions, Some((4000, 3000)));
    }

    #[test]
    fn test_missing_reference_means_no_gps() {
        let fields: Vec<Field> = geotagged()
            .into_iter()
            .filter(|f| f.tag != Tag::GPSLongitudeRef)
            .collect();
        let meta = metadata_from_exif(&encode(&fields));
        assert!(meta.gps.is_none());
        assert!(!meta.records.is_empty());
    }

    #[test]
    fn test_jpeg_without_exif_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.jpg");
        RgbImage::from_pixel(32, 24, Rgb([90, 120, 200]))
            .save(&path)
            .unwrap();

        let meta = read_photo(&path).unwrap();
        assert!(meta.records.is_empty());
        assert!(meta.gps.is_none());
        assert_eq!(
            meta.image,
            ImageSummary {
                format: Some("JPEG".to_string()),
                mode: Some("RGB".to_string()),
                dimensions: Some((32, 24)),
            }
        );
    }

    #[test]
    fn test_image_mode_of_greyscale_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grey.jpg");
        GrayImage::from_pixel(16, 8, Luma([128])).save(&path).unwrap();

        let summary = ImageSummary::inspect(&path);
        assert_eq!(summary.format.as_deref(), Some("JPEG"));
        assert_eq!(summary.mode.as_deref(), Some("L"));
        assert_eq!(summary.dimensions, Some((16, 8)));
    }

    #[test]
    fn test_image_format_is_sniffed_not_taken_from_extension() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("tile.png");
        RgbaImage::from_pixel(10, 20, Rgba([0, 0, 0, 255]))
            .save(&png)
            .unwrap();
        let disguised = dir.path().join("disguised.jpg");
        fs::copy(&png, &disguised).unwrap();

        let summary = ImageSummary::inspect(&disguised);
        assert_eq!(summary.format.as_deref(), Some("PNG"));
        assert_eq!(summary.mode.as_deref(), Some("RGBA"));
        assert_eq!(summary.dimensions, Some((10, 20)));
    }

    #[test]
    fn test_unreadable_image_keeps_extension_format_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("truncated.jpg");
        fs::write(&path, b"not really a picture").unwrap();

        let summary = ImageSummary::inspect(&path);
        assert_eq!(summary.format.as_deref(), Some("JPEG"));
        assert_eq!(summary.mode, None);
        assert_eq!(summary.dimensions, None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            read_photo("/nonexistent/photo.jpg"),
            Err(PhotoError::Io(_))
        ));
    }

    #[test]
    fn test_file_facts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        fs::write(&path, vec![0u8; 5 * 1024 + 100]).unwrap();

        let facts = FileFacts::collect(&path).unwrap();
        assert_eq!(facts.size_kb, 5);
        assert!(facts.name.ends_with("photo.jpg"));
        assert!(facts.modified.is_some());
        assert!(!facts.read_only);

        let rows = facts.rows();
        assert_eq!(rows[1], ("File size", "5 kB".to_string()));
        assert_eq!(rows[2].0, "File MD5");
    }

    #[test]
    fn test_file_md5_matches_known_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.jpg");
        fs::write(&path, b"abc").unwrap();

        let facts = FileFacts::collect(&path).unwrap();
        assert_eq!(facts.md5, "900150983cd24fb0d6963f7d28e17f72");

        fs::write(&path, b"").unwrap();
        let facts = FileFacts::collect(&path).unwrap();
        assert_eq!(facts.md5, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_stat_rows() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        fs::write(&path, vec![7u8; 3000]).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let facts = FileFacts::collect(&path).unwrap();
        let stat = facts.stat.clone().unwrap();
        assert_eq!(stat.mode, 0o100644);
        assert_eq!(stat.links, 1);
        assert!(stat.inode > 0);
        assert!(stat.block_size > 0);
        assert!(stat.changed.is_some());

        let rows = facts.rows();
        let value = |label: &str| {
            rows.iter()
                .find(|(l, _)| *l == label)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(value("Protection bits"), "0b1000000110100100");
        assert_eq!(value("Hard links"), "1");
        assert_eq!(value("Inode number"), stat.inode.to_string());
        assert_eq!(value("Owner UID"), stat.uid.to_string());
        assert_eq!(rows.last().unwrap().0, "Block size");
    }
}
