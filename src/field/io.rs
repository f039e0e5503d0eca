//! Readers and writers for the two field file formats the core consumes: the binary
//! APF format (length-prefixed, endianness-portable) and the legacy whitespace-token
//! INIT text format.

use crate::error::FieldError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, BufRead, Read, Write};

/// Raw field data as read from disk, before being wrapped in a [`crate::field::FieldGrid`].
#[derive(Debug)]
pub struct FieldData {
    pub dims: (usize, usize, usize),
    pub size: (f64, f64, f64),
    pub components: usize,
    pub values: Vec<f64>,
}

impl FieldData {
    fn validate(self) -> Result<Self, FieldError> {
        let expected = self.dims.0 * self.dims.1 * self.dims.2 * self.components;
        if self.values.len() != expected {
            return Err(FieldError::InvalidSize { expected, got: self.values.len() });
        }
        Ok(self)
    }
}

/// Writes `data` as a binary APF file: a fixed header (dims, size, components, element
/// count) followed by the flat sample array, all little-endian so the format round-trips
/// across architectures.
pub fn write_apf<W: Write>(mut w: W, data: &FieldData) -> Result<(), FieldError> {
    w.write_u64::<LittleEndian>(data.dims.0 as u64)?;
    w.write_u64::<LittleEndian>(data.dims.1 as u64)?;
    w.write_u64::<LittleEndian>(data.dims.2 as u64)?;
    w.write_f64::<LittleEndian>(data.size.0)?;
    w.write_f64::<LittleEndian>(data.size.1)?;
    w.write_f64::<LittleEndian>(data.size.2)?;
    w.write_u64::<LittleEndian>(data.components as u64)?;
    w.write_u64::<LittleEndian>(data.values.len() as u64)?;
    for v in &data.values {
        w.write_f64::<LittleEndian>(*v)?;
    }
    Ok(())
}

/// Parses a binary APF file, validating that the trailing sample count matches the
/// header-declared `dims * components`.
pub fn parse_apf<R: Read>(mut r: R) -> Result<FieldData, FieldError> {
    let nx = r.read_u64::<LittleEndian>()? as usize;
    let ny = r.read_u64::<LittleEndian>()? as usize;
    let nz = r.read_u64::<LittleEndian>()? as usize;
    let sx = r.read_f64::<LittleEndian>()?;
    let sy = r.read_f64::<LittleEndian>()?;
    let sz = r.read_f64::<LittleEndian>()?;
    let components = r.read_u64::<LittleEndian>()? as usize;
    let count = r.read_u64::<LittleEndian>()? as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(r.read_f64::<LittleEndian>()?);
    }
    FieldData { dims: (nx, ny, nz), size: (sx, sy, sz), components, values }.validate()
}

/// Parses the legacy INIT text format: a free-text header line (discarded whole, not
/// tokenized — it may contain any number of words), then 8 ignored tokens (init seed,
/// cluster length, the 3-component incident pion direction, the 3-component magnetic
/// field), sensor thickness and pixel pitch in um, 4 further ignored tokens (temperature,
/// flux, rhe, new_drde), the grid dimensions, one more ignored token, then `nx*ny*nz`
/// records of `ix iy iz` followed by `components` values, all 1-indexed. The component
/// count isn't recoverable from the file itself (a scalar weighting-potential file and a
/// vector field file are lexically indistinguishable), so the caller states it, matching
/// the original format's per-field-type parser instantiation.
pub fn parse_init<R: BufRead>(mut r: R, components: usize) -> Result<FieldData, FieldError> {
    let mut header = String::new();
    r.read_line(&mut header)?;

    let mut tokens = r.lines().collect::<io::Result<Vec<_>>>()?.join(" ").split_whitespace().map(str::to_owned).collect::<Vec<_>>().into_iter();

    let mut next = || -> Result<String, FieldError> { tokens.next().ok_or_else(|| FieldError::MalformedFile("unexpected end of INIT file".into())) };
    let next_f64 = |tok: String| -> Result<f64, FieldError> { tok.parse().map_err(|_| FieldError::MalformedFile(format!("expected number, got '{tok}'"))) };

    // Init seed, cluster length (2), incident pion direction (3), magnetic field (3):
    // none of these are this core's responsibility, but all 8 tokens must be consumed to
    // position the cursor at the start of the geometry block.
    for _ in 0..8 {
        next()?;
    }

    let thickness_um = next_f64(next()?)?;
    let xpixsz_um = next_f64(next()?)?;
    let ypixsz_um = next_f64(next()?)?;

    for _ in 0..4 {
        next()?;
    }

    let nx = next_f64(next()?)? as usize;
    let ny = next_f64(next()?)? as usize;
    let nz = next_f64(next()?)? as usize;
    next()?;

    if components == 0 {
        return Err(FieldError::MalformedFile("INIT component count must be >= 1".into()));
    }
    let mut values = vec![0.0f64; nx * ny * nz * components];
    for _ in 0..(nx * ny * nz) {
        let ix = next_f64(next()?)? as usize;
        let iy = next_f64(next()?)? as usize;
        let iz = next_f64(next()?)? as usize;
        if ix == 0 || iy == 0 || iz == 0 || ix > nx || iy > ny || iz > nz {
            return Err(FieldError::IndexOutOfBounds { ix: ix as i64, iy: iy as i64, iz: iz as i64, nx, ny, nz });
        }
        let base = (((ix - 1) * ny + (iy - 1)) * nz + (iz - 1)) * components;
        for c in 0..components {
            values[base + c] = next_f64(next()?)?;
        }
    }

    FieldData {
        dims: (nx, ny, nz),
        size: (xpixsz_um * 1e-3, ypixsz_um * 1e-3, thickness_um * 1e-3),
        components,
        values,
    }
    .validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn apf_round_trips() {
        let data = FieldData { dims: (1, 1, 2), size: (1.0, 1.0, 2.0), components: 1, values: vec![1.5, 2.5] };
        let mut buf = Vec::new();
        write_apf(&mut buf, &data).unwrap();
        let parsed = parse_apf(Cursor::new(buf)).unwrap();
        assert_eq!(parsed.dims, (1, 1, 2));
        assert_eq!(parsed.values, vec![1.5, 2.5]);
    }

    #[test]
    fn apf_rejects_truncated_payload() {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_f64::<LittleEndian>(1.0).unwrap();
        buf.write_f64::<LittleEndian>(1.0).unwrap();
        buf.write_f64::<LittleEndian>(1.0).unwrap();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_u64::<LittleEndian>(3).unwrap();
        buf.write_f64::<LittleEndian>(9.0).unwrap();
        assert!(parse_apf(Cursor::new(buf)).is_err());
    }

    #[test]
    fn init_parses_scalar_grid() {
        // 1x1x2 scalar grid, thickness 300um, pitch 55x55um. Header line is free text
        // and must be discarded whole, including its own whitespace-separated words.
        let text = "this header line has several words and is discarded whole\n\
                    seed clusterlen px py pz bx by bz \
                    300.0 55.0 55.0 \
                    temp flux rhe new_drde \
                    1 1 2 ign \
                    1 1 1 10.0 \
                    1 1 2 20.0";
        let data = parse_init(Cursor::new(text.as_bytes()), 1).unwrap();
        assert_eq!(data.dims, (1, 1, 2));
        assert_eq!(data.components, 1);
        assert_eq!(data.values, vec![10.0, 20.0]);
        assert!((data.size.2 - 0.3).abs() < 1e-9);
    }

    #[test]
    fn init_rejects_index_beyond_declared_grid_size() {
        let text = "header\n\
                    seed clusterlen px py pz bx by bz \
                    300.0 55.0 55.0 \
                    temp flux rhe new_drde \
                    1 1 1 ign \
                    1 1 2 10.0";
        let err = parse_init(Cursor::new(text.as_bytes()), 1).unwrap_err();
        assert!(matches!(err, FieldError::IndexOutOfBounds { iz: 2, nz: 1, .. }));
    }
}
