use super::*;

#[test]
fn garbage_bytes_are_not_a_font() {
    let err = load_font_bytes(b"definitely not a font".to_vec()).err();
    assert!(matches!(err, Some(FontError::Invalid)));
}

#[test]
fn missing_font_file_reports_io() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_font_file(&dir.path().join("nope.ttf")).err();
    assert!(matches!(err, Some(FontError::Io(_))));
}

#[test]
fn register_file_propagates_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ttf");
    std::fs::write(&path, b"\0\x01\0\0garbage").unwrap();
    let mut book = FontBook::new();
    assert!(book.register_file("Broken", &path).is_err());
    assert!(!book.contains("Broken"));
}

#[test]
fn registered_only_book_never_touches_the_system() {
    let mut book = FontBook { registered_only: true, ..FontBook::default() };
    assert!(book.resolve("IBM Plex Mono").is_none());
    assert!(book.resolve("Anything").is_none());
}

#[test]
fn empty_raster_reports_empty() {
    let r = RasterizedText::empty();
    assert!(r.is_empty());
    assert!(r.buf.is_empty());
}

// =============================================================
// Placement (needs any system font; skipped when there is none)
// =============================================================

fn system_font() -> Option<FontArc> {
    load_system_font("DejaVu Sans")
}

fn inked(raster: &RasterizedText) -> usize {
    raster.buf.chunks_exact(4).filter(|px| px[3] > 0).count()
}

#[test]
fn layout_advances_left_to_right() {
    let Some(font) = system_font() else { return };
    let (one, w1) = layout_line(&font, "a", 20.0);
    let (two, w2) = layout_line(&font, "ab", 20.0);
    assert_eq!((one.len(), two.len()), (1, 2));
    assert_eq!(two[0].1, 0.0);
    assert!(two[1].1 > 0.0);
    assert!(w1 > 0.0 && w2 > w1);
    // Every glyph shares the ascent baseline
    assert_eq!(two[0].2, two[1].2);
}

#[test]
fn rasterized_text_sits_at_origin_in_colour() {
    let Some(font) = system_font() else { return };
    let color = Rgba([200, 10, 20, 255]);
    let raster = rasterize_text(&font, "Hi", 24.0, 10.0, 10.0, color, 100, 60);
    assert!(!raster.is_empty());
    assert!(inked(&raster) > 0);
    assert!(raster.off_x >= 0 && raster.off_x <= 12, "off_x {}", raster.off_x);
    assert!(raster.off_y >= 8, "off_y {}", raster.off_y);
    assert!(raster.off_x as u32 + raster.buf_w <= 100);
    for px in raster.buf.chunks_exact(4).filter(|px| px[3] > 0) {
        assert_eq!(&px[..3], &color.0[..3]);
    }
}

#[test]
fn second_line_makes_text_taller() {
    let Some(font) = system_font() else { return };
    let color = Rgba([0, 0, 0, 255]);
    let one = rasterize_text(&font, "H", 16.0, 0.0, 0.0, color, 200, 200);
    let two = rasterize_text(&font, "H\nH", 16.0, 0.0, 0.0, color, 200, 200);
    assert!(two.buf_h > one.buf_h);
}

#[test]
fn text_outside_canvas_is_clipped_away() {
    let Some(font) = system_font() else { return };
    let raster = rasterize_text(&font, "Hi", 24.0, 500.0, 10.0, Rgba([0, 0, 0, 255]), 100, 60);
    assert!(raster.is_empty());
    assert!(rasterize_text(&font, "Hi", 0.0, 0.0, 0.0, Rgba([0, 0, 0, 255]), 100, 60).is_empty());
}

#[test]
fn draw_text_blends_into_surface() {
    let Some(font) = system_font() else { return };
    let mut s = PixelSurface::new(100, 60);
    assert!(draw_text(&mut s, &font, "Hi", 24.0, 10.0, 10.0, Rgba([0, 0, 255, 255]), 1.0));
    let hit = (10..50).any(|y| (10..50).any(|x| s.get_pixel(x, y)[3] > 0));
    assert!(hit);
    assert_eq!(s.get_pixel(99, 59)[3], 0);
    assert!(!draw_text(&mut s, &font, "", 24.0, 10.0, 10.0, Rgba([0, 0, 255, 255]), 1.0));
}
