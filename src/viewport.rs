//! Web-Mercator viewport maths shared by clustering and click resolution.

use std::f64::consts::PI;

use crate::data::GeoPoint;

pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 20.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Pixel position in world space at a given zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    pub fn distance(&self, other: &Pixel) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Per-axis tolerance in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub lat: f64,
    pub lng: f64,
}

impl Tolerance {
    pub fn uniform(epsilon: f64) -> Self {
        Self {
            lat: epsilon,
            lng: epsilon,
        }
    }
}

fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// Project a coordinate to world pixels at `zoom`.
pub fn project(point: GeoPoint, zoom: f64) -> Pixel {
    let size = world_size(zoom);
    let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (point.lng + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    Pixel { x, y }
}

/// Inverse of [`project`].
pub fn unproject(pixel: Pixel, zoom: f64) -> GeoPoint {
    let size = world_size(zoom);
    let lng = pixel.x / size * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * pixel.y / size);
    let lat = n.sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(center: GeoPoint, zoom: f64, width: u32, height: u32) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Geographic position under a screen pixel, relative to the top-left of
    /// the surface.
    pub fn screen_to_geo(&self, x: f64, y: f64) -> GeoPoint {
        let center = project(self.center, self.zoom);
        let world = Pixel {
            x: center.x + x - f64::from(self.width) / 2.0,
            y: center.y + y - f64::from(self.height) / 2.0,
        };
        unproject(world, self.zoom)
    }

    pub fn geo_to_screen(&self, point: GeoPoint) -> Pixel {
        let center = project(self.center, self.zoom);
        let world = project(point, self.zoom);
        Pixel {
            x: world.x - center.x + f64::from(self.width) / 2.0,
            y: world.y - center.y + f64::from(self.height) / 2.0,
        }
    }

    /// Degrees spanned by one screen pixel around the viewport centre.
    pub fn degrees_per_pixel(&self) -> Tolerance {
        let center = project(self.center, self.zoom);
        let above = unproject(Pixel { x: center.x, y: center.y - 0.5 }, self.zoom);
        let below = unproject(Pixel { x: center.x, y: center.y + 0.5 }, self.zoom);
        Tolerance {
            lat: (above.lat - below.lat).abs(),
            lng: 360.0 / world_size(self.zoom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_round_trips_within_rounding() {
        let beijing = GeoPoint::new(39.9042, 116.4074);
        let back = unproject(project(beijing, 7.0), 7.0);
        assert!((back.lat - beijing.lat).abs() < 1e-9);
        assert!((back.lng - beijing.lng).abs() < 1e-9);
    }

    #[test]
    fn origin_projects_to_world_centre() {
        let pixel = project(GeoPoint::new(0.0, 0.0), 1.0);
        assert!((pixel.x - 256.0).abs() < 1e-9);
        assert!((pixel.y - 256.0).abs() < 1e-9);
    }

    #[test]
    fn screen_centre_maps_to_viewport_centre() {
        let viewport = Viewport::new(GeoPoint::new(31.2304, 121.4737), 9.0, 800, 400);
        let geo = viewport.screen_to_geo(400.0, 200.0);
        assert!((geo.lat - 31.2304).abs() < 1e-9);
        assert!((geo.lng - 121.4737).abs() < 1e-9);

        let pixel = viewport.geo_to_screen(GeoPoint::new(31.2304, 121.4737));
        assert!((pixel.x - 400.0).abs() < 1e-6);
        assert!((pixel.y - 200.0).abs() < 1e-6);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut viewport = Viewport::new(GeoPoint::new(0.0, 0.0), 42.0, 10, 10);
        assert_eq!(viewport.zoom, MAX_ZOOM);
        viewport.set_zoom(-3.0);
        assert_eq!(viewport.zoom, MIN_ZOOM);
    }

    #[test]
    fn pixels_shrink_as_zoom_grows() {
        let mut viewport = Viewport::new(GeoPoint::new(35.0, 105.0), 4.0, 10, 10);
        let coarse = viewport.degrees_per_pixel();
        viewport.set_zoom(8.0);
        let fine = viewport.degrees_per_pixel();
        assert!(fine.lng < coarse.lng);
        assert!(fine.lat < coarse.lat);
    }
}
