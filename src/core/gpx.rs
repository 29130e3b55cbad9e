//! GPX track log parsing.
//!
//! Extracts `<trkpt>` and `<rtept>` fixes from a GPX document. Fixes
//! without a usable position or `<time>` cannot become GPS positions and are
//! counted as skipped instead of failing the whole import.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::models::{GpsPosition, GpsSource, Point};

/// Errors raised while reading a GPX document
#[derive(Debug, Error)]
pub enum GpxError {
    #[error("malformed GPX document: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("document contains no <gpx> root element")]
    NotGpx,
}

/// A timestamped fix read from a track or route
#[derive(Debug, Clone, PartialEq)]
pub struct GpxPoint {
    pub timestamp: DateTime<Utc>,
    pub point: Point,
    pub elevation: Option<f64>,
}

impl GpxPoint {
    pub fn into_position(self) -> GpsPosition {
        GpsPosition {
            timestamp: self.timestamp,
            point: self.point,
            altitude: self.elevation,
            accuracy: None,
            speed: None,
            bearing: None,
            provider: None,
            source: GpsSource::GpxImport,
        }
    }
}

/// Result of parsing a GPX document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpxTrack {
    pub points: Vec<GpxPoint>,
    pub skipped: usize,
}

#[derive(Default)]
struct PendingPoint {
    point: Option<Point>,
    elevation: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
}

impl PendingPoint {
    fn from_attributes(element: &BytesStart<'_>) -> Self {
        let mut latitude = None;
        let mut longitude = None;

        for attr in element.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value);
            match attr.key.local_name().as_ref() {
                b"lat" => latitude = value.trim().parse::<f64>().ok(),
                b"lon" => longitude = value.trim().parse::<f64>().ok(),
                _ => {}
            }
        }

        let point = match (latitude, longitude) {
            (Some(lat), Some(lon)) => Point::new(lat, lon).ok(),
            _ => None,
        };

        Self { point, ..Self::default() }
    }

    fn finish(self) -> Option<GpxPoint> {
        Some(GpxPoint {
            timestamp: self.timestamp?,
            point: self.point?,
            elevation: self.elevation,
        })
    }
}

fn is_fix(name: &[u8]) -> bool {
    name == b"trkpt" || name == b"rtept"
}

/// Parse a GPX document into timestamped fixes
pub fn parse_gpx(xml: &str) -> Result<GpxTrack, GpxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut track = GpxTrack::default();
    let mut saw_root = false;
    let mut pending: Option<PendingPoint> = None;
    let mut current_tag: Vec<u8> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"gpx" {
                    saw_root = true;
                } else if is_fix(&name) {
                    pending = Some(PendingPoint::from_attributes(&e));
                }
                current_tag = name;
            }
            Event::Empty(e) => {
                let name = e.local_name();
                if name.as_ref() == b"gpx" {
                    saw_root = true;
                } else if is_fix(name.as_ref()) {
                    // A self-closing fix cannot carry a <time>
                    track.skipped += 1;
                }
            }
            Event::Text(e) => {
                if let Some(point) = pending.as_mut() {
                    let text = e.unescape().unwrap_or_default();
                    match current_tag.as_slice() {
                        b"ele" => point.elevation = text.trim().parse::<f64>().ok(),
                        b"time" => {
                            point.timestamp = DateTime::parse_from_rfc3339(text.trim())
                                .ok()
                                .map(|dt| dt.with_timezone(&Utc));
                        }
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                if is_fix(e.local_name().as_ref()) {
                    if let Some(point) = pending.take() {
                        match point.finish() {
                            Some(fix) => track.points.push(fix),
                            None => track.skipped += 1,
                        }
                    }
                }
                current_tag.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(GpxError::NotGpx);
    }

    Ok(track)
}
