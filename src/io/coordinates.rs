use crate::types::{Coordinate, GeoPatchError, GeoResult};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Parse one feed line: `lon,lat` (unlabeled) or `lon,lat,label`.
pub fn parse_coordinate_line(line: &str) -> GeoResult<Coordinate> {
    let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
    if fields.len() != 2 && fields.len() != 3 {
        return Err(GeoPatchError::Validation(format!(
            "expected 2 or 3 comma-separated fields, got {}: '{}'",
            fields.len(),
            line
        )));
    }

    let mut values = Vec::with_capacity(3);
    for field in &fields {
        let value: f64 = field.parse().map_err(|e| {
            GeoPatchError::Validation(format!("bad float '{}' in line '{}': {}", field, line, e))
        })?;
        values.push(value);
    }

    let label = if values.len() == 3 {
        values[2]
    } else {
        Coordinate::UNLABELED
    };
    Coordinate::new(values[0], values[1], label)
}

/// Read a line-oriented coordinate file, skipping empty lines.
pub fn read_coordinates_file<P: AsRef<Path>>(path: P) -> GeoResult<Vec<Coordinate>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut coordinates = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        coordinates.push(parse_coordinate_line(&line)?);
    }
    log::info!(
        "Read {} coordinates from {}",
        coordinates.len(),
        path.as_ref().display()
    );
    Ok(coordinates)
}

/// Write coordinates with fixed 12-decimal-place floats, the format the
/// distributed workers re-read. Unlabeled coordinates get two fields,
/// labeled ones three.
pub fn write_coordinates_file<P: AsRef<Path>>(
    path: P,
    coordinates: &[Coordinate],
) -> GeoResult<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    for coordinate in coordinates {
        if coordinate.label() == Coordinate::UNLABELED {
            writeln!(
                writer,
                "{:.12},{:.12}",
                coordinate.longitude(),
                coordinate.latitude()
            )?;
        } else {
            writeln!(
                writer,
                "{:.12},{:.12},{:.12}",
                coordinate.longitude(),
                coordinate.latitude(),
                coordinate.label()
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_two_fields_unlabeled() {
        let c = parse_coordinate_line("30.123456789012,-10.500000000000").unwrap();
        assert_eq!(c.longitude(), 30.123456789012);
        assert_eq!(c.latitude(), -10.5);
        assert_eq!(c.label(), Coordinate::UNLABELED);
    }

    #[test]
    fn test_parse_three_fields_labeled() {
        let c = parse_coordinate_line("30.0, -10.0, 2.0").unwrap();
        assert_eq!(c.label(), 2.0);
    }

    #[test]
    fn test_parse_malformed_lines() {
        assert!(parse_coordinate_line("30.0").is_err());
        assert!(parse_coordinate_line("30.0,abc").is_err());
        assert!(parse_coordinate_line("1,2,3,4").is_err());
        // Out-of-range longitude is a validation error, not a parse error
        assert!(parse_coordinate_line("200.0,45.0").is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coords.csv");
        let coords = vec![
            Coordinate::unlabeled(30.123456789012, -10.5).unwrap(),
            Coordinate::new(12.0, 48.0, 1.0).unwrap(),
        ];
        write_coordinates_file(&path, &coords).unwrap();
        let restored = read_coordinates_file(&path).unwrap();
        assert_eq!(restored, coords);
    }
}
