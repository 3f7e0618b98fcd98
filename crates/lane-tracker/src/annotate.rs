//! Visual outputs: annotated camera frame and bird's-eye diagnostics

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::fit::{LaneSide, Polynomial};
use crate::mask::BinaryMask;
use crate::rectify::Rectifier;
use crate::search::LanePair;

const LANE_AREA: Rgb<u8> = Rgb([0, 255, 0]);
const LEFT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const RIGHT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const WINDOW_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CURVE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const MASK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Weight of the lane area when blended over the frame
const AREA_WEIGHT: f32 = 0.3;

/// Half-width of the boundary strokes on the canvas (pixels)
const STROKE_HALF_WIDTH: i32 = 4;

/// Rows between polygon vertices along a curve
const CURVE_STEP: u32 = 8;

/// Keeps far-off curve samples inside i32 drawing coordinates
const COORD_LIMIT: f64 = 1.0e5;

/// Overlay the lane area and boundaries on a camera frame.
///
/// Drawing happens on the bird's-eye canvas; the result is projected back
/// through the inverse homography and blended over `frame`.
pub fn lane_overlay(
    frame: &RgbImage,
    left: &Polynomial,
    right: &Polynomial,
    rectifier: &Rectifier,
) -> RgbImage {
    let (canvas_w, canvas_h) = rectifier.canvas_size();
    let (width, height) = frame.dimensions();

    let mut area = RgbImage::new(canvas_w, canvas_h);
    let left_pts = curve_points(left, canvas_h);
    let right_pts = curve_points(right, canvas_h);

    let mut polygon: Vec<Point<i32>> = left_pts.clone();
    polygon.extend(right_pts.iter().rev());
    polygon.dedup();
    if polygon.len() >= 3 && polygon.first() != polygon.last() {
        draw_polygon_mut(&mut area, &polygon, LANE_AREA);
    }

    let mut strokes = RgbImage::new(canvas_w, canvas_h);
    draw_thick_polyline(&mut strokes, &left_pts, side_color(LaneSide::Left));
    draw_thick_polyline(&mut strokes, &right_pts, side_color(LaneSide::Right));

    let area = rectifier.unwarp_rgb(&area, width, height);
    let strokes = rectifier.unwarp_rgb(&strokes, width, height);

    let mut out = frame.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let stroke = strokes.get_pixel(x, y);
        if stroke.0 != [0, 0, 0] {
            *pixel = *stroke;
            continue;
        }
        let overlay = area.get_pixel(x, y);
        for c in 0..3 {
            let v = pixel[c] as f32 + AREA_WEIGHT * overlay[c] as f32;
            pixel[c] = v.round().min(255.0) as u8;
        }
    }
    out
}

/// Bird's-eye diagnostic image: rectified mask, support pixels, windows, curves
pub fn birdseye_view(mask: &BinaryMask, pair: &LanePair) -> RgbImage {
    let (width, height) = mask.dimensions();
    let mut view = RgbImage::new(width, height);

    for (x, y) in mask.lane_pixels() {
        view.put_pixel(x, y, MASK_COLOR);
    }
    for (fit, side) in [(&pair.left, LaneSide::Left), (&pair.right, LaneSide::Right)] {
        for &(x, y) in &fit.pixels {
            if x < width && y < height {
                view.put_pixel(x, y, side_color(side));
            }
        }
    }

    for window in &pair.windows {
        let w = (window.x_high - window.x_low).max(0) as u32;
        let h = window.y_high.saturating_sub(window.y_low);
        if w == 0 || h == 0 {
            continue;
        }
        let x = window.x_low.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        let rect = Rect::at(x, window.y_low as i32).of_size(w, h);
        draw_hollow_rect_mut(&mut view, rect, WINDOW_COLOR);
    }

    for polynomial in [&pair.left.polynomial, &pair.right.polynomial] {
        let points = curve_points(polynomial, height);
        for segment in points.windows(2) {
            draw_line_segment_mut(
                &mut view,
                (segment[0].x as f32, segment[0].y as f32),
                (segment[1].x as f32, segment[1].y as f32),
                CURVE_COLOR,
            );
        }
    }
    view
}

/// Color used for a side's support pixels and stroke
pub fn side_color(side: LaneSide) -> Rgb<u8> {
    match side {
        LaneSide::Left => LEFT_COLOR,
        LaneSide::Right => RIGHT_COLOR,
    }
}

/// Curve sampled top to bottom, always including the last row
fn curve_points(polynomial: &Polynomial, height: u32) -> Vec<Point<i32>> {
    if height == 0 {
        return Vec::new();
    }
    let last = height - 1;
    let mut rows: Vec<u32> = (0..last).step_by(CURVE_STEP as usize).collect();
    rows.push(last);

    rows.into_iter()
        .map(|y| {
            let x = polynomial.eval(y as f64);
            let x = if x.is_finite() { x.clamp(-COORD_LIMIT, COORD_LIMIT) } else { 0.0 };
            Point::new(x.round() as i32, y as i32)
        })
        .collect()
}

fn draw_thick_polyline(canvas: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
    for segment in points.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        for dx in -STROKE_HALF_WIDTH..=STROKE_HALF_WIDTH {
            draw_line_segment_mut(
                canvas,
                ((a.x + dx) as f32, a.y as f32),
                ((b.x + dx) as f32, b.y as f32),
                color,
            );
        }
    }
}
