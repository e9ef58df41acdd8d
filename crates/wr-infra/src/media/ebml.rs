//! Minimal EBML reader for WebM documents.
//!
//! Walks one `EBML` header followed by one `Segment` and pulls duration and video
//! dimensions out of `Info` and `Tracks`. A second header inside the segment (what naive
//! concatenation of complete files produces) is reported as a decode failure.

use wr_core::media::MediaMetadata;

const ID_EBML: u64 = 0x1A45_DFA3;
const ID_SEGMENT: u64 = 0x1853_8067;

const ID_SEEK_HEAD: u64 = 0x114D_9B74;
const ID_INFO: u64 = 0x1549_A966;
const ID_TRACKS: u64 = 0x1654_AE6B;
const ID_CLUSTER: u64 = 0x1F43_B675;
const ID_CUES: u64 = 0x1C53_BB6B;
const ID_CHAPTERS: u64 = 0x1043_A770;
const ID_TAGS: u64 = 0x1254_C367;
const ID_ATTACHMENTS: u64 = 0x1941_A469;
const ID_VOID: u64 = 0xEC;
const ID_CRC32: u64 = 0xBF;

const ID_TIMECODE_SCALE: u64 = 0x2A_D7B1;
const ID_DURATION: u64 = 0x4489;
const ID_TRACK_ENTRY: u64 = 0xAE;
const ID_VIDEO: u64 = 0xE0;
const ID_PIXEL_WIDTH: u64 = 0xB0;
const ID_PIXEL_HEIGHT: u64 = 0xBA;

const DEFAULT_TIMECODE_SCALE_NS: u64 = 1_000_000;

const SEGMENT_CHILDREN: [u64; 10] = [
    ID_SEEK_HEAD,
    ID_INFO,
    ID_TRACKS,
    ID_CLUSTER,
    ID_CUES,
    ID_CHAPTERS,
    ID_TAGS,
    ID_ATTACHMENTS,
    ID_VOID,
    ID_CRC32,
];

#[derive(Debug, Clone, Copy)]
struct Header {
    id: u64,
    /// `None` for the reserved "unknown size" encoding.
    size: Option<u64>,
    /// Length of id + size fields.
    len: usize,
}

fn read_id(buf: &[u8], pos: usize) -> Result<(u64, usize), String> {
    let first = *buf
        .get(pos)
        .ok_or_else(|| format!("truncated element id at {pos}"))?;
    let len = first.leading_zeros() as usize + 1;
    if len > 4 {
        return Err(format!("invalid element id 0x{first:02X} at {pos}"));
    }
    let bytes = buf
        .get(pos..pos + len)
        .ok_or_else(|| format!("truncated element id at {pos}"))?;
    let id = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Ok((id, len))
}

fn read_size(buf: &[u8], pos: usize) -> Result<(Option<u64>, usize), String> {
    let first = *buf
        .get(pos)
        .ok_or_else(|| format!("truncated element size at {pos}"))?;
    let len = first.leading_zeros() as usize + 1;
    if len > 8 {
        return Err(format!("invalid element size 0x{first:02X} at {pos}"));
    }
    let bytes = buf
        .get(pos..pos + len)
        .ok_or_else(|| format!("truncated element size at {pos}"))?;

    let marker_mask = if len == 8 { 0 } else { 0xFFu8 >> len };
    let mut value = u64::from(first & marker_mask);
    for b in &bytes[1..] {
        value = (value << 8) | u64::from(*b);
    }

    let all_ones = (1u64 << (7 * len)) - 1;
    if value == all_ones {
        Ok((None, len))
    } else {
        Ok((Some(value), len))
    }
}

fn read_header(buf: &[u8], pos: usize) -> Result<Header, String> {
    let (id, id_len) = read_id(buf, pos)?;
    let (size, size_len) = read_size(buf, pos + id_len)?;
    Ok(Header {
        id,
        size,
        len: id_len + size_len,
    })
}

fn known_size(header: &Header, pos: usize) -> Result<usize, String> {
    let size = header
        .size
        .ok_or_else(|| format!("element 0x{:X} at {pos} has unknown size", header.id))?;
    usize::try_from(size).map_err(|_| format!("element 0x{:X} at {pos} is too large", header.id))
}

/// End offset of an element, or an error when it does not fit in `buf`.
fn element_end(
    buf: &[u8],
    start: usize,
    size: usize,
    pos: usize,
    id: u64,
) -> Result<usize, String> {
    start
        .checked_add(size)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| format!("element 0x{id:X} at {pos} exceeds the data"))
}

fn body<'a>(buf: &'a [u8], pos: usize, header: &Header) -> Result<&'a [u8], String> {
    let size = known_size(header, pos)?;
    let start = pos
        .checked_add(header.len)
        .ok_or_else(|| format!("element 0x{:X} at {pos} exceeds the data", header.id))?;
    let end = element_end(buf, start, size, pos, header.id)?;
    Ok(&buf[start..end])
}

fn read_uint(data: &[u8]) -> Result<u64, String> {
    if data.len() > 8 {
        return Err("unsigned integer wider than 8 bytes".to_string());
    }
    Ok(data.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn read_float(data: &[u8]) -> Result<f64, String> {
    match data.len() {
        0 => Ok(0.0),
        4 => Ok(f64::from(f32::from_be_bytes([
            data[0], data[1], data[2], data[3],
        ]))),
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(data);
            Ok(f64::from_be_bytes(raw))
        }
        other => Err(format!("invalid float width {other}")),
    }
}

/// Iterate the direct children of a master element body with known size.
fn for_each_child(
    data: &[u8],
    mut visit: impl FnMut(u64, &[u8]) -> Result<(), String>,
) -> Result<(), String> {
    let mut pos = 0;
    while pos < data.len() {
        let header = read_header(data, pos)?;
        let child = body(data, pos, &header)?;
        visit(header.id, child)?;
        pos += header.len + child.len();
    }
    Ok(())
}

#[derive(Default)]
struct SegmentInfo {
    timecode_scale: Option<u64>,
    duration: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
    has_tracks: bool,
}

fn parse_info(data: &[u8], info: &mut SegmentInfo) -> Result<(), String> {
    for_each_child(data, |id, child| {
        match id {
            ID_TIMECODE_SCALE => info.timecode_scale = Some(read_uint(child)?),
            ID_DURATION => info.duration = Some(read_float(child)?),
            _ => {}
        }
        Ok(())
    })
}

fn parse_tracks(data: &[u8], info: &mut SegmentInfo) -> Result<(), String> {
    info.has_tracks = true;
    for_each_child(data, |id, entry| {
        if id != ID_TRACK_ENTRY {
            return Ok(());
        }
        for_each_child(entry, |id, video| {
            if id != ID_VIDEO || info.width.is_some() {
                return Ok(());
            }
            for_each_child(video, |id, value| {
                match id {
                    ID_PIXEL_WIDTH => info.width = Some(read_uint(value)? as u32),
                    ID_PIXEL_HEIGHT => info.height = Some(read_uint(value)? as u32),
                    _ => {}
                }
                Ok(())
            })
        })
    })
}

/// Skip over an unknown-size cluster, returning the offset of the next level-1 element.
fn skip_open_cluster(buf: &[u8], mut pos: usize) -> Result<usize, String> {
    while pos < buf.len() {
        let (id, _) = read_id(buf, pos)?;
        let level_one = SEGMENT_CHILDREN.contains(&id) && id != ID_VOID && id != ID_CRC32;
        if id == ID_EBML || level_one {
            return Ok(pos);
        }
        let header = read_header(buf, pos)?;
        let size = known_size(&header, pos)?;
        pos = element_end(buf, pos + header.len, size, pos, header.id)?;
    }
    Ok(pos)
}

/// Parse a complete WebM document.
pub fn inspect(buf: &[u8]) -> Result<MediaMetadata, String> {
    let header = read_header(buf, 0)?;
    if header.id != ID_EBML {
        return Err("missing EBML header".to_string());
    }
    let ebml_body = body(buf, 0, &header)?;
    let mut pos = header.len + ebml_body.len();

    let segment = read_header(buf, pos)?;
    if segment.id != ID_SEGMENT {
        return Err(format!("expected Segment at {pos}, found 0x{:X}", segment.id));
    }
    let segment_start = pos + segment.len;
    let segment_end = match segment.size {
        Some(_) => {
            let size = known_size(&segment, pos)?;
            element_end(buf, segment_start, size, pos, ID_SEGMENT)?
        }
        None => buf.len(),
    };

    let mut info = SegmentInfo::default();
    pos = segment_start;
    while pos < segment_end {
        let child = read_header(buf, pos)?;
        if child.id == ID_EBML {
            return Err(format!("unexpected EBML header inside Segment at {pos}"));
        }
        if !SEGMENT_CHILDREN.contains(&child.id) {
            return Err(format!("unexpected element 0x{:X} at {pos}", child.id));
        }

        if child.id == ID_CLUSTER && child.size.is_none() {
            pos = skip_open_cluster(&buf[..segment_end], pos + child.len)?;
            continue;
        }

        let data = body(buf, pos, &child)?;
        match child.id {
            ID_INFO => parse_info(data, &mut info)?,
            ID_TRACKS => parse_tracks(data, &mut info)?,
            _ => {}
        }
        pos += child.len + data.len();
    }

    if segment_end < buf.len() {
        return Err(format!("trailing data after Segment at {segment_end}"));
    }
    if !info.has_tracks {
        return Err("Segment has no Tracks".to_string());
    }

    let scale = info.timecode_scale.unwrap_or(DEFAULT_TIMECODE_SCALE_NS) as f64;
    let duration_secs = info
        .duration
        .filter(|ticks| *ticks > 0.0)
        .map(|ticks| ticks * scale / 1_000_000_000.0);

    Ok(MediaMetadata {
        duration_secs,
        width: info.width,
        height: info.height,
    })
}
