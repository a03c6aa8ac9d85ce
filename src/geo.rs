/*!
 * Geographic calculations.
 *
 * Only the simple (approximate) calculations needed for clustering markers on a web map live
 * here. Everything is in degrees of latitude and longitude unless noted otherwise.
 */
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// The Web Mercator projection is undefined at the poles, so it is cut off at this latitude.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// The edge length, in pixels, of the whole world at zoom level 0.
const TILE_SIZE: f64 = 256.0;

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    /// Are these coordinates usable on a map?
    ///
    /// Both values must be finite and in the range -90 to 90 for latitude and -180 to 180 for
    /// longitude.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Check if these coordinates are within `eps` of each other in both dimensions.
    pub fn is_close(&self, other: Coord, eps: f64) -> bool {
        (self.lat - other.lat).abs() < eps && (self.lon - other.lon).abs() < eps
    }

    /// Project onto the Web Mercator plane at the given zoom level.
    ///
    /// The origin is the north west corner of the world and y increases to the south, so the
    /// result matches the pixel layout of a slippy map.
    pub fn to_world_pixel(&self, zoom: f64) -> WorldPixel {
        let world_size = TILE_SIZE * f64::powf(2.0, zoom);

        let lat = self.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        let sin_lat = f64::sin(lat.to_radians());

        let x = (self.lon + 180.0) / 360.0;
        let y = 0.5 - f64::ln((1.0 + sin_lat) / (1.0 - sin_lat)) / (4.0 * std::f64::consts::PI);

        WorldPixel {
            x: x * world_size,
            y: y * world_size,
        }
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// A position on the Web Mercator plane in pixels for a specific zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPixel {
    pub x: f64,
    pub y: f64,
}

impl WorldPixel {
    /// Euclidian distance in pixels.
    pub fn distance(&self, other: WorldPixel) -> f64 {
        f64::hypot(self.x - other.x, self.y - other.y)
    }
}

/// A latitude-longitude aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The lower left (south west) corner.
    pub ll: Coord,
    /// The upper right (north east) corner.
    pub ur: Coord,
}

impl BoundingBox {
    /// The whole (projectable) world.
    pub const WORLD: BoundingBox = BoundingBox {
        ll: Coord {
            lat: -90.0,
            lon: -180.0,
        },
        ur: Coord {
            lat: 90.0,
            lon: 180.0,
        },
    };

    /// A box that contains nothing. Extending it with a coordinate yields a box around just that
    /// coordinate.
    pub fn empty() -> Self {
        BoundingBox {
            ll: Coord {
                lat: f64::INFINITY,
                lon: f64::INFINITY,
            },
            ur: Coord {
                lat: -f64::INFINITY,
                lon: -f64::INFINITY,
            },
        }
    }

    /// Build the minimal box around all of the coordinates, `None` if there are none.
    pub fn around<I: IntoIterator<Item = Coord>>(coords: I) -> Option<Self> {
        let mut bbox = Self::empty();
        for coord in coords {
            bbox.extend(coord);
        }

        if bbox.is_empty() {
            None
        } else {
            Some(bbox)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ll.lat > self.ur.lat || self.ll.lon > self.ur.lon
    }

    /// Grow the box, if necessary, so it includes `coord`.
    pub fn extend(&mut self, coord: Coord) {
        self.ll.lat = self.ll.lat.min(coord.lat);
        self.ll.lon = self.ll.lon.min(coord.lon);
        self.ur.lat = self.ur.lat.max(coord.lat);
        self.ur.lon = self.ur.lon.max(coord.lon);
    }

    /// The smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut res = *self;
        res.extend(other.ll);
        res.extend(other.ur);
        res
    }

    /// Is the coordinate inside or on the edge of this box?
    pub fn contains(&self, coord: Coord) -> bool {
        coord.lat >= self.ll.lat
            && coord.lat <= self.ur.lat
            && coord.lon >= self.ll.lon
            && coord.lon <= self.ur.lon
    }

    /// Do these boxes share any area (or an edge)?
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        !(self.ur.lat < other.ll.lat
            || self.ll.lat > other.ur.lat
            || self.ur.lon < other.ll.lon
            || self.ll.lon > other.ur.lon)
    }

    /// Enlarge the box on every side by `ratio` times its height or width.
    pub fn pad(&self, ratio: f64) -> BoundingBox {
        let dlat = (self.ur.lat - self.ll.lat) * ratio;
        let dlon = (self.ur.lon - self.ll.lon) * ratio;

        BoundingBox {
            ll: Coord {
                lat: self.ll.lat - dlat,
                lon: self.ll.lon - dlon,
            },
            ur: Coord {
                lat: self.ur.lat + dlat,
                lon: self.ur.lon + dlon,
            },
        }
    }

    pub fn center(&self) -> Coord {
        Coord {
            lat: (self.ll.lat + self.ur.lat) / 2.0,
            lon: (self.ll.lon + self.ur.lon) / 2.0,
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{} <---> {}", self.ll, self.ur)
    }
}

/**
 * the simple great circle distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in kilometers.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const DEG2RAD: f64 = 2.0 * std::f64::consts::PI / 360.0;
    const EARTH_RADIUS_KM: f64 = 6371.0090;

    let lat1_r = lat1 * DEG2RAD;
    let lon1_r = lon1 * DEG2RAD;
    let lat2_r = lat2 * DEG2RAD;
    let lon2_r = lon2 * DEG2RAD;

    let dlat2 = (lat2_r - lat1_r) / 2.0;
    let dlon2 = (lon2_r - lon1_r) / 2.0;

    let sin2_dlat = f64::powf(f64::sin(dlat2), 2.0);
    let sin2_dlon = f64::powf(f64::sin(dlon2), 2.0);

    let arc = 2.0
        * f64::asin(f64::sqrt(
            sin2_dlat + sin2_dlon * f64::cos(lat1_r) * f64::cos(lat2_r),
        ));

    arc * EARTH_RADIUS_KM
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_great_circle_distance() {
        // One degree of latitude is about 111.2 km everywhere.
        let d = great_circle_distance(45.0, -120.0, 46.0, -120.0);
        assert!((d - 111.19).abs() < 0.1);

        assert_eq!(great_circle_distance(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn test_world_pixel_projection() {
        let origin = Coord { lat: 0.0, lon: 0.0 }.to_world_pixel(0.0);
        assert!((origin.x - 128.0).abs() < 1.0e-9);
        assert!((origin.y - 128.0).abs() < 1.0e-9);

        let nw = Coord {
            lat: 89.0,
            lon: -180.0,
        }
        .to_world_pixel(1.0);
        assert!(nw.x.abs() < 1.0e-9);
        assert!(nw.y.abs() < 1.0e-6);

        // Each zoom level doubles the pixel distances.
        let a = Coord { lat: 10.0, lon: 10.0 };
        let b = Coord { lat: 11.0, lon: 12.0 };
        let d3 = a.to_world_pixel(3.0).distance(b.to_world_pixel(3.0));
        let d4 = a.to_world_pixel(4.0).distance(b.to_world_pixel(4.0));
        assert!((d4 - 2.0 * d3).abs() < 1.0e-9);
    }

    #[test]
    fn test_bounding_box() {
        assert!(BoundingBox::around(std::iter::empty()).is_none());

        let bbox = BoundingBox::around([
            Coord { lat: 1.0, lon: 5.0 },
            Coord {
                lat: -1.0,
                lon: 2.0,
            },
        ])
        .unwrap();

        assert_eq!(bbox.ll, Coord { lat: -1.0, lon: 2.0 });
        assert_eq!(bbox.ur, Coord { lat: 1.0, lon: 5.0 });
        assert!(bbox.contains(Coord { lat: 0.0, lon: 3.0 }));
        assert!(bbox.contains(bbox.ll));
        assert!(!bbox.contains(Coord { lat: 0.0, lon: 6.0 }));

        let padded = bbox.pad(0.5);
        assert_eq!(padded.ll, Coord { lat: -2.0, lon: 0.5 });
        assert!(padded.overlaps(&bbox));
        assert_eq!(bbox.center(), Coord { lat: 0.0, lon: 3.5 });
    }

    #[test]
    fn test_coord_validity() {
        assert!(Coord { lat: 45.0, lon: -120.0 }.is_valid());
        assert!(!Coord { lat: 91.0, lon: 0.0 }.is_valid());
        assert!(!Coord {
            lat: f64::NAN,
            lon: 0.0
        }
        .is_valid());
    }
}
