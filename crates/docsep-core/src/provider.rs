//! External asset collaborators: image and transcription providers.
//!
//! The core treats both as opaque contracts. Image absence is data, not
//! an error: a provider never fails for a missing or undecodable file,
//! it signals [`ImagePayload::Absent`] so downstream code can
//! distinguish "no image" from a genuinely blank page. Transcription
//! parsing, by contrast, fails loudly on malformed markup; skipping or
//! aborting is the caller's call.
//!
//! Two concrete implementations are provided: [`FsImageProvider`] with
//! the thumbnail-then-original fallback chain, and
//! [`PageXmlTextProvider`] for PAGE-XML transcriptions.

use image::RgbImage;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{DocsepError, Result};

/// Decoded image data, or its explicit absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Decoded RGB pixel buffer.
    Rgb(RgbImage),
    /// The image could not be loaded. Recoverable, expected, and
    /// distinguishable from a blank image.
    Absent,
}

impl ImagePayload {
    /// Whether this payload holds real pixels.
    pub fn is_present(&self) -> bool {
        matches!(self, ImagePayload::Rgb(_))
    }
}

/// Axis-aligned bounding box of a text line, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

/// One transcribed text line of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRecord {
    /// Line identifier from the source markup.
    pub id: String,
    /// Transcribed text, empty if the line carries none.
    pub text: String,
    /// Outline polygon of the line, in page pixels.
    pub coords: Vec<(i32, i32)>,
    /// Bounding box derived from the outline, if any points exist.
    pub bbox: Option<BoundingBox>,
    /// Baseline polyline of the line.
    pub baseline: Vec<(i32, i32)>,
}

/// Parsed transcription of one page: its lines in document order plus
/// the page size as (height, width).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTranscription {
    pub lines: Vec<LineRecord>,
    pub size: (u32, u32),
}

impl PageTranscription {
    /// The empty transcription attached to missing window positions.
    pub fn empty() -> Self {
        Self {
            lines: Vec::new(),
            size: (0, 0),
        }
    }
}

/// Loads pixel data for a scan path. Never fails; absence is data.
pub trait ImageProvider: Send + Sync {
    /// Load the image at `path`, or signal its absence.
    fn load(&self, path: &Path) -> ImagePayload;
}

/// Parses the transcription belonging to a scan path.
pub trait TextProvider: Send + Sync {
    /// Parse the transcription for the scan at `path`.
    ///
    /// Fails with [`DocsepError::Parse`] on malformed markup; the
    /// caller decides whether that skips the sample or aborts the run.
    fn parse(&self, path: &Path) -> Result<PageTranscription>;
}

/// Filesystem image provider with a thumbnail fast path.
///
/// Resolution order: pre-generated thumbnail (if a thumbnail root is
/// configured), then the original full-resolution file, then
/// [`ImagePayload::Absent`]. Failures along the chain are logged as
/// recoverable events, never raised.
#[derive(Debug, Clone)]
pub struct FsImageProvider {
    thumbnail_root: Option<PathBuf>,
}

impl FsImageProvider {
    /// Provider without a thumbnail root: originals only.
    pub fn new() -> Self {
        Self {
            thumbnail_root: None,
        }
    }

    /// Provider that tries `<root>/<scan path>.thumbnail.jpg` first.
    pub fn with_thumbnail_root(root: impl Into<PathBuf>) -> Self {
        Self {
            thumbnail_root: Some(root.into()),
        }
    }

    /// Thumbnail location for a scan path: the scan's absolute path
    /// re-rooted under the thumbnail root, with `.thumbnail.jpg`
    /// appended.
    pub fn thumbnail_path(&self, path: &Path) -> Option<PathBuf> {
        let root = self.thumbnail_root.as_ref()?;
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                std::path::Component::RootDir | std::path::Component::Prefix(_) => {}
                other => relative.push(other),
            }
        }
        let mut name = relative.into_os_string();
        name.push(".thumbnail.jpg");
        Some(root.join(name))
    }
}

impl Default for FsImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProvider for FsImageProvider {
    fn load(&self, path: &Path) -> ImagePayload {
        if let Some(thumbnail) = self.thumbnail_path(path) {
            match image::open(&thumbnail) {
                Ok(img) => return ImagePayload::Rgb(img.to_rgb8()),
                Err(err) => {
                    tracing::debug!(
                        thumbnail = %thumbnail.display(),
                        %err,
                        "thumbnail unavailable, falling back to original"
                    );
                }
            }
        }
        match image::open(path) {
            Ok(img) => ImagePayload::Rgb(img.to_rgb8()),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not open image");
                ImagePayload::Absent
            }
        }
    }
}

/// PAGE-XML transcription provider.
///
/// Expects the transcription of `<dir>/<name>.jpg` at
/// `<dir>/page/<name>.xml`, the layout produced by common HTR
/// pipelines. Extracts `TextLine` elements with their `Coords`,
/// `Baseline` and `TextEquiv/Unicode` children and the page size from
/// the `Page` element.
#[derive(Debug, Clone, Default)]
pub struct PageXmlTextProvider;

impl PageXmlTextProvider {
    pub fn new() -> Self {
        Self
    }

    /// Map a scan image path to its PAGE-XML sibling.
    pub fn xml_path(image_path: &Path) -> PathBuf {
        let stem = image_path.file_stem().unwrap_or_default();
        let mut name = stem.to_os_string();
        name.push(".xml");
        match image_path.parent() {
            Some(parent) => parent.join("page").join(name),
            None => PathBuf::from("page").join(name),
        }
    }
}

impl TextProvider for PageXmlTextProvider {
    fn parse(&self, image_path: &Path) -> Result<PageTranscription> {
        let xml_path = Self::xml_path(image_path);
        parse_page_xml(&xml_path)
    }
}

fn parse_error(path: &Path, message: impl Into<String>) -> DocsepError {
    DocsepError::Parse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Parse one PAGE-XML file.
pub fn parse_page_xml(path: &Path) -> Result<PageTranscription> {
    let mut reader =
        Reader::from_file(path).map_err(|e| parse_error(path, format!("cannot open: {e}")))?;
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut size: Option<(u32, u32)> = None;

    // Parser state for the TextLine currently open, if any.
    let mut current: Option<LineRecord> = None;
    let mut in_unicode = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| parse_error(path, format!("malformed XML: {e}")))?;
        // Self-closing elements emit no End event, so they must not
        // set parser state that only an End would clear.
        let is_start = matches!(event, Event::Start(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                b"Page" => {
                    let mut width = None;
                    let mut height = None;
                    for attr in e.attributes() {
                        let attr =
                            attr.map_err(|e| parse_error(path, format!("bad attribute: {e}")))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| parse_error(path, format!("bad attribute: {e}")))?;
                        match attr.key.as_ref() {
                            b"imageWidth" => width = value.parse::<u32>().ok(),
                            b"imageHeight" => height = value.parse::<u32>().ok(),
                            _ => {}
                        }
                    }
                    match (height, width) {
                        (Some(h), Some(w)) => size = Some((h, w)),
                        _ => {
                            return Err(parse_error(
                                path,
                                "Page element without imageWidth/imageHeight",
                            ))
                        }
                    }
                }
                b"TextLine" => {
                    let id = attribute_value(e, b"id", path)?
                        .ok_or_else(|| parse_error(path, "TextLine without id"))?;
                    current = Some(LineRecord {
                        id,
                        text: String::new(),
                        coords: Vec::new(),
                        bbox: None,
                        baseline: Vec::new(),
                    });
                }
                b"Coords" => {
                    if let Some(line) = current.as_mut() {
                        if let Some(points) = attribute_value(e, b"points", path)? {
                            line.coords = parse_points(&points, path)?;
                        }
                    }
                }
                b"Baseline" => {
                    if let Some(line) = current.as_mut() {
                        if let Some(points) = attribute_value(e, b"points", path)? {
                            line.baseline = parse_points(&points, path)?;
                        }
                    }
                }
                b"Unicode" => {
                    in_unicode = is_start && current.is_some();
                }
                _ => {}
            },
            Event::Text(ref t) => {
                if in_unicode {
                    if let Some(line) = current.as_mut() {
                        let text = t
                            .unescape()
                            .map_err(|e| parse_error(path, format!("bad text content: {e}")))?;
                        line.text.push_str(&text);
                    }
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"TextLine" => {
                    if let Some(mut line) = current.take() {
                        line.bbox = bounding_box(&line.coords);
                        lines.push(line);
                    }
                    in_unicode = false;
                }
                b"Unicode" => in_unicode = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let size = size.ok_or_else(|| parse_error(path, "missing Page element"))?;
    Ok(PageTranscription { lines, size })
}

fn attribute_value(
    e: &quick_xml::events::BytesStart<'_>,
    key: &[u8],
    path: &Path,
) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| parse_error(path, format!("bad attribute: {err}")))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|err| parse_error(path, format!("bad attribute: {err}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parse a PAGE points attribute: whitespace-separated `x,y` pairs.
fn parse_points(points: &str, path: &Path) -> Result<Vec<(i32, i32)>> {
    points
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| parse_error(path, format!("malformed point '{pair}'")))?;
            let x = x
                .parse::<i32>()
                .map_err(|_| parse_error(path, format!("malformed point '{pair}'")))?;
            let y = y
                .parse::<i32>()
                .map_err(|_| parse_error(path, format!("malformed point '{pair}'")))?;
            Ok((x, y))
        })
        .collect()
}

fn bounding_box(coords: &[(i32, i32)]) -> Option<BoundingBox> {
    let (first, rest) = coords.split_first()?;
    let mut bbox = BoundingBox {
        x_min: first.0,
        y_min: first.1,
        x_max: first.0,
        y_max: first.1,
    };
    for &(x, y) in rest {
        bbox.x_min = bbox.x_min.min(x);
        bbox.y_min = bbox.y_min.min(y);
        bbox.x_max = bbox.x_max.max(x);
        bbox.y_max = bbox.y_max.max(y);
    }
    Some(bbox)
}
