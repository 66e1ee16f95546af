use crate::types::{Coordinate, GeoPatchError, GeoResult, RgbPatch};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::s;
use std::io::{Cursor, Read};

/// One serialized training example: lossless-encoded before/after
/// patches plus the coordinate, its join key, and the label.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRecord {
    pub before_png: Vec<u8>,
    pub after_png: Vec<u8>,
    pub longitude: f64,
    pub latitude: f64,
    pub encoded_coordinates: String,
    pub label: f64,
}

/// Side-by-side before/after visualization handed to human labelers,
/// keyed by the same encoded coordinate as the training record.
#[derive(Debug, Clone)]
pub struct LabelingImage {
    pub name: String,
    pub png: Vec<u8>,
}

/// Deterministic join key for a coordinate, shared between training
/// records and labeling images across pipeline stages.
///
/// Both floats are hex-encoded losslessly (little-endian IEEE-754), so
/// distinct coordinates can never collide and the original position is
/// recoverable from the key.
pub fn encode_coordinates(longitude: f64, latitude: f64) -> String {
    let mut key = String::with_capacity(32);
    for byte in longitude
        .to_le_bytes()
        .iter()
        .chain(latitude.to_le_bytes().iter())
    {
        key.push_str(&format!("{:02x}", byte));
    }
    key
}

/// Losslessly encode an RGB patch as PNG bytes.
pub fn encode_png(patch: &RgbPatch) -> GeoResult<Vec<u8>> {
    let (rows, cols, _) = patch.dim();
    let raw: Vec<u8> = patch.iter().copied().collect();
    let img = image::RgbImage::from_raw(cols as u32, rows as u32, raw).ok_or_else(|| {
        GeoPatchError::Validation(format!("patch shape {}x{} has no raw layout", rows, cols))
    })?;
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

impl TrainingRecord {
    /// Package an aligned before/after crop pair into a record.
    pub fn build(before: &RgbPatch, after: &RgbPatch, coordinate: &Coordinate) -> GeoResult<Self> {
        Ok(Self {
            before_png: encode_png(before)?,
            after_png: encode_png(after)?,
            longitude: coordinate.longitude(),
            latitude: coordinate.latitude(),
            encoded_coordinates: encode_coordinates(
                coordinate.longitude(),
                coordinate.latitude(),
            ),
            label: coordinate.label(),
        })
    }

    /// Serialize with the fixed record schema: three little-endian f64s
    /// (longitude, latitude, label), then the length-prefixed key, before
    /// image, and after image.
    pub fn to_bytes(&self) -> GeoResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(
            3 * 8 + 2 + self.encoded_coordinates.len() + 8 + self.before_png.len()
                + self.after_png.len(),
        );
        buf.write_f64::<LittleEndian>(self.longitude)?;
        buf.write_f64::<LittleEndian>(self.latitude)?;
        buf.write_f64::<LittleEndian>(self.label)?;
        buf.write_u16::<LittleEndian>(self.encoded_coordinates.len() as u16)?;
        buf.extend_from_slice(self.encoded_coordinates.as_bytes());
        buf.write_u32::<LittleEndian>(self.before_png.len() as u32)?;
        buf.extend_from_slice(&self.before_png);
        buf.write_u32::<LittleEndian>(self.after_png.len() as u32)?;
        buf.extend_from_slice(&self.after_png);
        Ok(buf)
    }

    /// Inverse of `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> GeoResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let longitude = cursor.read_f64::<LittleEndian>()?;
        let latitude = cursor.read_f64::<LittleEndian>()?;
        let label = cursor.read_f64::<LittleEndian>()?;

        let key_len = cursor.read_u16::<LittleEndian>()? as usize;
        let mut key = vec![0u8; key_len];
        cursor.read_exact(&mut key)?;
        let encoded_coordinates = String::from_utf8(key)
            .map_err(|e| GeoPatchError::Validation(format!("bad coordinate key: {}", e)))?;

        let before_len = cursor.read_u32::<LittleEndian>()? as usize;
        let mut before_png = vec![0u8; before_len];
        cursor.read_exact(&mut before_png)?;

        let after_len = cursor.read_u32::<LittleEndian>()? as usize;
        let mut after_png = vec![0u8; after_len];
        cursor.read_exact(&mut after_png)?;

        Ok(Self {
            before_png,
            after_png,
            longitude,
            latitude,
            encoded_coordinates,
            label,
        })
    }
}

impl LabelingImage {
    /// Build the side-by-side labeling visualization from the same
    /// aligned crop pair that produced the training record.
    pub fn build(before: &RgbPatch, after: &RgbPatch, coordinate: &Coordinate) -> GeoResult<Self> {
        let (rows, cols, _) = before.dim();
        let mut combined = RgbPatch::zeros((rows, cols * 2, 3));
        combined.slice_mut(s![.., ..cols, ..]).assign(before);
        combined.slice_mut(s![.., cols.., ..]).assign(after);

        let key = encode_coordinates(coordinate.longitude(), coordinate.latitude());
        Ok(Self {
            name: format!("{}.png", key),
            png: encode_png(&combined)?,
        })
    }
}
