use super::*;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn style(width: f32) -> StrokeStyle {
    StrokeStyle::new(BLACK, width, 1.0)
}

#[test]
fn stroke_line_covers_centre_of_segment() {
    let mut s = PixelSurface::new(20, 20);
    s.stroke_line((2.5, 10.5), (17.5, 10.5), &style(3.0));
    assert_eq!(s.get_pixel(10, 10), BLACK);
    assert_eq!(s.get_pixel(10, 2), TRANSPARENT);
}

#[test]
fn stroke_line_has_round_caps() {
    let mut s = PixelSurface::new(20, 20);
    s.stroke_line((5.5, 10.5), (10.5, 10.5), &style(6.0));
    // Just past the end point, inside the cap radius
    assert!(s.get_pixel(12, 10)[3] > 0);
    // Beyond the cap
    assert_eq!(s.get_pixel(15, 10), TRANSPARENT);
}

#[test]
fn zero_length_line_draws_a_dot() {
    let mut s = PixelSurface::new(10, 10);
    s.stroke_line((5.5, 5.5), (5.5, 5.5), &style(4.0));
    assert_eq!(s.get_pixel(5, 5), BLACK);
}

#[test]
fn stroke_applies_opacity_once_per_call() {
    let mut s = PixelSurface::new(20, 5);
    s.stroke_line((1.5, 2.5), (18.5, 2.5), &StrokeStyle::new(BLACK, 3.0, 0.5));
    assert_eq!(s.get_pixel(10, 2)[3], 128);
}

#[test]
fn erase_line_clears_alpha() {
    let mut s = PixelSurface::new_filled(20, 20, RED);
    s.erase_line((0.5, 10.5), (19.5, 10.5), 4.0);
    assert_eq!(s.get_pixel(10, 10), TRANSPARENT);
    assert_eq!(s.get_pixel(10, 0), RED);
}

#[test]
fn stroke_rect_leaves_interior_untouched() {
    let mut s = PixelSurface::new(20, 20);
    s.stroke_rect((2.5, 2.5), (17.5, 17.5), &style(1.0));
    assert_eq!(s.get_pixel(2, 10), BLACK);
    assert_eq!(s.get_pixel(10, 17), BLACK);
    assert_eq!(s.get_pixel(10, 10), TRANSPARENT);
}

#[test]
fn fill_rect_is_clipped_to_surface() {
    let mut s = PixelSurface::new(5, 5);
    s.fill_rect(-3, 3, 100, 100, RED, 1.0);
    assert_eq!(s.get_pixel(0, 4), RED);
    assert_eq!(s.get_pixel(4, 3), RED);
    assert_eq!(s.get_pixel(0, 2), TRANSPARENT);
}

#[test]
fn fill_ellipse_covers_centre_not_corners() {
    let mut s = PixelSurface::new(21, 21);
    s.fill_ellipse((10.5, 10.5), 8.0, 8.0, RED, 1.0);
    assert_eq!(s.get_pixel(10, 10), RED);
    assert_eq!(s.get_pixel(0, 0), TRANSPARENT);
}

#[test]
fn stroke_ellipse_is_a_ring() {
    let mut s = PixelSurface::new(21, 21);
    s.stroke_ellipse((10.5, 10.5), 8.0, 8.0, &style(2.0));
    assert_eq!(s.get_pixel(10, 10), TRANSPARENT);
    assert!(s.get_pixel(18, 10)[3] > 0);
}

#[test]
fn clear_rect_resets_region() {
    let mut s = PixelSurface::new_filled(6, 6, RED);
    s.clear_rect(1, 1, 2, 2);
    assert_eq!(s.get_pixel(1, 1), TRANSPARENT);
    assert_eq!(s.get_pixel(2, 2), TRANSPARENT);
    assert_eq!(s.get_pixel(3, 3), RED);
}

#[test]
fn blit_surface_with_offset() {
    let src = PixelSurface::new_filled(2, 2, RED);
    let mut dst = PixelSurface::new(5, 5);
    dst.blit_surface(&src, 4, -1, 1.0);
    assert_eq!(dst.get_pixel(4, 0), RED);
    assert_eq!(dst.get_pixel(4, 1), TRANSPARENT);
    assert_eq!(dst.get_pixel(3, 0), TRANSPARENT);
}

#[test]
fn blit_rgba_rejects_mismatched_buffer() {
    let mut dst = PixelSurface::new(4, 4);
    dst.blit_rgba(0, 0, 2, 2, &[255; 12], 1.0);
    assert!(dst.is_fully_transparent());
}

#[test]
fn stamp_square_paints_size_by_size_block() {
    let mut s = PixelSurface::new(10, 10);
    s.stamp_square(2, 3, 3, RED);
    assert_eq!(s.get_pixel(2, 3), RED);
    assert_eq!(s.get_pixel(4, 5), RED);
    assert_eq!(s.get_pixel(5, 5), TRANSPARENT);
    assert_eq!(s.get_pixel(1, 3), TRANSPARENT);
}

#[test]
fn stamp_square_minimum_one_pixel() {
    let mut s = PixelSurface::new(4, 4);
    s.stamp_square(1, 1, 0, RED);
    assert_eq!(s.get_pixel(1, 1), RED);
    assert_eq!(s.get_pixel(2, 1), TRANSPARENT);
}

#[test]
fn dashed_rect_has_gaps() {
    let mut s = PixelSurface::new(30, 10);
    s.stroke_dashed_rect(0, 0, 25, 5, BLACK, (6, 4));
    assert_eq!(s.get_pixel(0, 0), BLACK);
    assert_eq!(s.get_pixel(5, 0), BLACK);
    assert_eq!(s.get_pixel(6, 0), TRANSPARENT);
    assert_eq!(s.get_pixel(10, 0), BLACK);
    assert_eq!(s.get_pixel(12, 3), TRANSPARENT);
}

#[test]
fn grid_lines_every_step() {
    let mut s = PixelSurface::new(70, 70);
    s.draw_grid(32, Rgba([0, 0, 0, 15]));
    assert_eq!(s.get_pixel(32, 5)[3], 15);
    assert_eq!(s.get_pixel(5, 64)[3], 15);
    // Crossing painted once, not twice
    assert_eq!(s.get_pixel(32, 32)[3], 15);
    assert_eq!(s.get_pixel(5, 5), TRANSPARENT);
}

#[test]
fn draw_shape_circle_uses_drag_length_as_radius() {
    let mut s = PixelSurface::new(40, 40);
    s.draw_shape(
        ShapeKind::Ellipse,
        (20.5, 20.5),
        (30.5, 20.5),
        &style(2.0),
        ShapeFillMode::Outline,
    );
    // Ring at radius 10 in every direction from the start point
    assert!(s.get_pixel(10, 20)[3] > 0);
    assert!(s.get_pixel(20, 30)[3] > 0);
    assert_eq!(s.get_pixel(20, 20), TRANSPARENT);
}

#[test]
fn draw_shape_filled_rect() {
    let mut s = PixelSurface::new(20, 20);
    s.draw_shape(
        ShapeKind::Rectangle,
        (4.5, 4.5),
        (14.5, 14.5),
        &StrokeStyle::new(RED, 1.0, 1.0),
        ShapeFillMode::Filled,
    );
    assert_eq!(s.get_pixel(9, 9), RED);
}
