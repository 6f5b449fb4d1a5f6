#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

// --- Point ---

#[test]
fn point_new() {
    let p = Point::new(3.0, 4.0);
    assert_eq!(p.x, 3.0);
    assert_eq!(p.y, 4.0);
}

#[test]
fn point_distance() {
    let a = Point::new(0.0, 0.0);
    let b = Point::new(3.0, 4.0);
    assert!(approx_eq(a.distance_to(b), 5.0));
}

#[test]
fn point_distance_zero() {
    let a = Point::new(7.0, -2.0);
    assert!(approx_eq(a.distance_to(a), 0.0));
}

// --- Camera defaults ---

#[test]
fn camera_default_pan_is_zero() {
    let cam = Camera::default();
    assert_eq!(cam.pan_x, 0.0);
    assert_eq!(cam.pan_y, 0.0);
}

#[test]
fn camera_default_zoom_is_one() {
    let cam = Camera::default();
    assert_eq!(cam.zoom, 1.0);
}

// --- screen_to_world ---

#[test]
fn screen_to_world_identity() {
    let cam = Camera::default();
    let world = cam.screen_to_world(Point::new(50.0, 75.0));
    assert!(point_approx_eq(world, Point::new(50.0, 75.0)));
}

#[test]
fn screen_to_world_with_zoom() {
    let cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 4.0 };
    let world = cam.screen_to_world(Point::new(40.0, 80.0));
    assert!(approx_eq(world.x, 10.0));
    assert!(approx_eq(world.y, 20.0));
}

#[test]
fn screen_to_world_with_pan_and_zoom() {
    let cam = Camera { pan_x: 20.0, pan_y: 10.0, zoom: 2.0 };
    let world = cam.screen_to_world(Point::new(20.0, 10.0));
    assert!(point_approx_eq(world, Point::new(0.0, 0.0)));
}

// --- world_to_screen ---

#[test]
fn world_to_screen_with_zoom() {
    let cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 2.0 };
    let screen = cam.world_to_screen(Point::new(10.0, 20.0));
    assert!(approx_eq(screen.x, 20.0));
    assert!(approx_eq(screen.y, 40.0));
}

#[test]
fn world_to_screen_with_pan_and_zoom() {
    let cam = Camera { pan_x: 20.0, pan_y: 10.0, zoom: 3.0 };
    let screen = cam.world_to_screen(Point::new(5.0, 5.0));
    assert!(approx_eq(screen.x, 35.0));
    assert!(approx_eq(screen.y, 25.0));
}

// --- Round trips ---

#[test]
fn round_trip_with_pan_and_zoom() {
    let cam = Camera { pan_x: 50.0, pan_y: -30.0, zoom: 2.0 };
    let world = Point::new(100.0, 200.0);
    let back = cam.screen_to_world(cam.world_to_screen(world));
    assert!(point_approx_eq(world, back));
}

#[test]
fn round_trip_fractional_zoom() {
    let cam = Camera { pan_x: 13.7, pan_y: -42.3, zoom: 0.75 };
    let world = Point::new(333.3, -999.9);
    let back = cam.screen_to_world(cam.world_to_screen(world));
    assert!(point_approx_eq(world, back));
}

// --- screen_dist_to_world ---

#[test]
fn screen_dist_to_world_with_zoom() {
    let cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 2.0 };
    assert!(approx_eq(cam.screen_dist_to_world(10.0), 5.0));
}

#[test]
fn screen_dist_to_world_ignores_pan() {
    let cam = Camera { pan_x: 999.0, pan_y: -999.0, zoom: 4.0 };
    assert!(approx_eq(cam.screen_dist_to_world(8.0), 2.0));
}

// --- zoom_about ---

#[test]
fn zoom_about_keeps_cursor_world_point_fixed() {
    let mut cam = Camera { pan_x: 37.0, pan_y: -12.0, zoom: 1.5 };
    let cursor = Point::new(400.0, 300.0);
    let before = cam.screen_to_world(cursor);

    cam.zoom_about(cursor, 1.0);
    let after = cam.screen_to_world(cursor);
    assert!(point_approx_eq(before, after));

    cam.zoom_about(cursor, -3.0);
    let after = cam.screen_to_world(cursor);
    assert!(point_approx_eq(before, after));
}

#[test]
fn zoom_about_one_notch_is_ten_percent() {
    let mut cam = Camera::default();
    cam.zoom_about(Point::new(0.0, 0.0), 1.0);
    assert!(approx_eq(cam.zoom, 1.1));
}

#[test]
fn zoom_about_clamps_at_max() {
    let mut cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 9.9 };
    cam.zoom_about(Point::new(100.0, 100.0), 5.0);
    assert_eq!(cam.zoom, ZOOM_MAX);
}

#[test]
fn zoom_about_clamps_at_min() {
    let mut cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 0.11 };
    cam.zoom_about(Point::new(100.0, 100.0), -5.0);
    assert_eq!(cam.zoom, ZOOM_MIN);
}

#[test]
fn zoom_about_clamped_step_still_fixes_cursor() {
    let mut cam = Camera { pan_x: 5.0, pan_y: 5.0, zoom: 9.5 };
    let cursor = Point::new(250.0, 125.0);
    let before = cam.screen_to_world(cursor);
    cam.zoom_about(cursor, 10.0);
    assert_eq!(cam.zoom, ZOOM_MAX);
    let after = cam.screen_to_world(cursor);
    assert!(point_approx_eq(before, after));
}
