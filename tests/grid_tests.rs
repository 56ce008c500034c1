use pixflow::Grid;
use pixflow::error::GridError;
use pixflow::grid::ppm::{encode_ppm, parse_ppm};
use pixflow::grid::{Mismatch, first_interior_mismatch, read_ppm, write_ppm};
use tempfile::TempDir;

fn gradient(width: usize, height: usize) -> Grid {
    Grid::from_fn(width, height, |r, c| {
        [(r * 10) as u8, (c * 10) as u8, ((r + c) * 3) as u8]
    })
}

// --- Grid ---

#[test]
fn test_grid_layout_is_row_major() {
    let g = gradient(4, 3);
    assert_eq!(g.as_bytes().len(), 4 * 3 * 3);
    assert_eq!(g.pixel(2, 1), [20, 10, 9]);
    assert_eq!(g.channel(2, 1, 2), 9);
    let i = (2 * 4 + 1) * 3;
    assert_eq!(&g.as_bytes()[i..i + 3], &[20, 10, 9]);
}

#[test]
fn test_grid_interior() {
    let g = gradient(5, 4);
    assert!(g.has_interior());
    assert_eq!(g.interior_cols(), 3);
    assert_eq!(g.interior_rows(), 2);
    assert!(!gradient(2, 9).has_interior());
    assert!(!gradient(9, 2).has_interior());
    assert_eq!(gradient(1, 1).interior_cols(), 0);
}

#[test]
fn test_interior_row_mut_skips_border() {
    let mut g = Grid::filled(4, 3, [0, 0, 0]);
    g.interior_row_mut(1).fill(9);
    assert_eq!(g.pixel(1, 0), [0, 0, 0]);
    assert_eq!(g.pixel(1, 1), [9, 9, 9]);
    assert_eq!(g.pixel(1, 2), [9, 9, 9]);
    assert_eq!(g.pixel(1, 3), [0, 0, 0]);
}

#[test]
fn test_from_raw_checks_length() {
    assert!(Grid::from_raw(2, 2, vec![0; 12]).is_some());
    assert!(Grid::from_raw(2, 2, vec![0; 11]).is_none());
}

// --- PPM ---

#[test]
fn test_parse_p6_with_comment() {
    let mut bytes = b"P6\n# made by hand\n2 1\n255\n".to_vec();
    bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
    let g = parse_ppm(&bytes).unwrap();
    assert_eq!((g.width(), g.height()), (2, 1));
    assert_eq!(g.pixel(0, 1), [4, 5, 6]);
}

#[test]
fn test_parse_p3() {
    let text = "P3\n2 2\n255\n0 0 0  255 0 0\n0 255 0  0 0 255\n";
    let g = parse_ppm(text.as_bytes()).unwrap();
    assert_eq!(g.pixel(0, 1), [255, 0, 0]);
    assert_eq!(g.pixel(1, 1), [0, 0, 255]);
}

#[test]
fn test_parse_rejects_other_formats() {
    assert!(matches!(
        parse_ppm(b"P5\n1 1\n255\n\0"),
        Err(GridError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_parse_rejects_wide_samples() {
    assert!(matches!(
        parse_ppm(b"P6\n1 1\n65535\n\0\0\0\0\0\0"),
        Err(GridError::MaxValue(65535))
    ));
}

#[test]
fn test_parse_truncated_raster() {
    assert!(matches!(
        parse_ppm(b"P6\n2 2\n255\n\x01\x02\x03"),
        Err(GridError::Truncated { .. })
    ));
}

#[test]
fn test_encode_then_parse_keeps_pixels() {
    let g = gradient(7, 5);
    assert_eq!(parse_ppm(&encode_ppm(&g)).unwrap(), g);
}

#[test]
fn test_write_and_read_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.ppm");
    let g = gradient(6, 4);
    write_ppm(&path, &g).unwrap();
    assert_eq!(read_ppm(&path).unwrap(), g);
}

#[test]
fn test_read_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        read_ppm(&dir.path().join("nope.ppm")),
        Err(GridError::Io(_))
    ));
}

// --- compare ---

#[test]
fn test_compare_identical() {
    assert_eq!(first_interior_mismatch(&gradient(5, 5), &gradient(5, 5)), None);
}

#[test]
fn test_compare_ignores_border() {
    let a = gradient(5, 5);
    let mut b = a.clone();
    b.set_pixel(0, 2, [1, 1, 1]);
    b.set_pixel(4, 4, [1, 1, 1]);
    b.set_pixel(2, 0, [1, 1, 1]);
    assert_eq!(first_interior_mismatch(&a, &b), None);
}

#[test]
fn test_compare_reports_first_interior_difference() {
    let a = Grid::filled(5, 5, [10, 10, 10]);
    let mut b = a.clone();
    b.set_pixel(3, 1, [10, 99, 10]);
    b.set_pixel(3, 2, [0, 0, 0]);
    assert_eq!(
        first_interior_mismatch(&a, &b),
        Some(Mismatch::Pixel {
            row: 3,
            col: 1,
            channel: 1,
            left: 10,
            right: 99
        })
    );
}

#[test]
fn test_compare_dimension_mismatch() {
    assert!(matches!(
        first_interior_mismatch(&gradient(5, 5), &gradient(5, 6)),
        Some(Mismatch::Dimensions { .. })
    ));
}
