//! ISO base media (MP4) box walker.
//!
//! Fragmented recordings repeat `ftyp`/`moov`/`moof`/`mdat` freely, so the walker only
//! requires that every box is well-sized, that the file opens with `ftyp` and that a
//! `moov` exists somewhere.

use wr_core::media::MediaMetadata;

#[derive(Debug, Clone, Copy)]
struct BoxHeader {
    kind: [u8; 4],
    header_len: usize,
    total_len: usize,
}

fn read_u32(buf: &[u8], pos: usize) -> Option<u32> {
    buf.get(pos..pos + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(buf: &[u8], pos: usize) -> Option<u64> {
    buf.get(pos..pos + 8).map(|b| {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        u64::from_be_bytes(raw)
    })
}

fn read_box_header(buf: &[u8], pos: usize) -> Result<BoxHeader, String> {
    let size = read_u32(buf, pos).ok_or_else(|| format!("truncated box header at {pos}"))?;
    let kind_bytes = buf
        .get(pos + 4..pos + 8)
        .ok_or_else(|| format!("truncated box header at {pos}"))?;
    let mut kind = [0u8; 4];
    kind.copy_from_slice(kind_bytes);

    let (header_len, total_len) = match size {
        0 => (8, buf.len() - pos),
        1 => {
            let large =
                read_u64(buf, pos + 8).ok_or_else(|| format!("truncated largesize at {pos}"))?;
            let large = usize::try_from(large)
                .map_err(|_| format!("largesize {large} at {pos} is out of range"))?;
            (16, large)
        }
        n => (8, n as usize),
    };

    if total_len < header_len {
        return Err(format!(
            "box '{}' at {pos} is smaller than its header",
            String::from_utf8_lossy(&kind)
        ));
    }
    if pos.checked_add(total_len).map_or(true, |end| end > buf.len()) {
        return Err(format!(
            "box '{}' at {pos} exceeds the data",
            String::from_utf8_lossy(&kind)
        ));
    }

    Ok(BoxHeader {
        kind,
        header_len,
        total_len,
    })
}

fn for_each_box(
    data: &[u8],
    mut visit: impl FnMut(&[u8; 4], &[u8]) -> Result<(), String>,
) -> Result<(), String> {
    let mut pos = 0;
    while pos < data.len() {
        let header = read_box_header(data, pos)?;
        let body = &data[pos + header.header_len..pos + header.total_len];
        visit(&header.kind, body)?;
        pos += header.total_len;
    }
    Ok(())
}

/// `(timescale, duration)` from an `mvhd` body.
fn parse_mvhd(body: &[u8]) -> Option<(u32, u64)> {
    match body.first()? {
        0 => Some((read_u32(body, 12)?, u64::from(read_u32(body, 16)?))),
        1 => Some((read_u32(body, 20)?, read_u64(body, 24)?)),
        _ => None,
    }
}

/// `(width, height)` in pixels from a `tkhd` body.
fn parse_tkhd(body: &[u8]) -> Option<(u32, u32)> {
    let offset = match body.first()? {
        0 => 76,
        1 => 88,
        _ => return None,
    };
    let width = read_u32(body, offset)? >> 16;
    let height = read_u32(body, offset + 4)? >> 16;
    Some((width, height))
}

#[derive(Default)]
struct MovieInfo {
    timescale: u32,
    duration: u64,
    width: Option<u32>,
    height: Option<u32>,
}

fn parse_moov(body: &[u8], info: &mut MovieInfo) -> Result<(), String> {
    for_each_box(body, |kind, child| {
        match kind {
            b"mvhd" if info.timescale == 0 => {
                if let Some((timescale, duration)) = parse_mvhd(child) {
                    info.timescale = timescale;
                    info.duration = duration;
                }
            }
            b"trak" if info.width.is_none() => {
                for_each_box(child, |kind, tkhd| {
                    if kind == b"tkhd" {
                        if let Some((w, h)) = parse_tkhd(tkhd).filter(|(w, _)| *w > 0) {
                            info.width = Some(w);
                            info.height = Some(h);
                        }
                    }
                    Ok(())
                })?;
            }
            _ => {}
        }
        Ok(())
    })
}

/// Parse an MP4 file, fragmented or not.
pub fn inspect(buf: &[u8]) -> Result<MediaMetadata, String> {
    let first = read_box_header(buf, 0)?;
    if &first.kind != b"ftyp" {
        return Err(format!(
            "expected 'ftyp' first, found '{}'",
            String::from_utf8_lossy(&first.kind)
        ));
    }

    let mut info = MovieInfo::default();
    let mut has_moov = false;
    for_each_box(buf, |kind, body| {
        if kind == b"moov" {
            if !has_moov {
                parse_moov(body, &mut info)?;
            }
            has_moov = true;
        }
        Ok(())
    })?;

    if !has_moov {
        return Err("no 'moov' box".to_string());
    }

    let duration_secs = (info.timescale > 0 && info.duration > 0)
        .then(|| info.duration as f64 / f64::from(info.timescale));

    Ok(MediaMetadata {
        duration_secs,
        width: info.width,
        height: info.height,
    })
}
