//! Synthetic two-state geography shared by the integration tests.
//!
//! ```text
//!  y=2 +--------+--------+-----------------+
//!      | 36001  | 36003  |      34001      |
//!      | tract  |        |                 |
//!      | 000200 |  tract |      tract      |
//!  y=1 +--------+ 000100 |      000100     |
//!      | tract  |        |                 |
//!      | 000100 |        |                 |
//!  y=0 +--------+--------+-----------------+
//!     x=0      x=1      x=2               x=4
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use geo::{polygon, Geometry, Point};
use georelate::store::{Feature, MemoryStore};
use georelate::{Config, LevelRegistry};

pub const LEVELS: &str = r#"
    srid = 4269

    [root]
    id = "01000US"
    name = "United States"
    level = "nation"

    [[shapes]]
    name = "state"
    schema = "shapes"
    table = "states"

    [[shapes]]
    name = "county"
    schema = "shapes"
    table = "counties"
    name_column = "namelsad"
    parent = "state"

    [[shapes]]
    name = "place"
    schema = "shapes"
    table = "places"
    parent = "county"

    [[shapes]]
    name = "tract"
    schema = "shapes"
    table = "tracts"
    parent = "county"
    ignore_by_default = true

    [[points]]
    name = "university"
    schema = "ipeds"
    table = "universities"
    id = "university"
    name_column = "university_name"
    longitude = "lng"
    latitude = "lat"
    srid = 4326
    ignore_by_default = true

    [classifier]
    prefix_length = 3
    codes = { "040" = "state", "050" = "county", "160" = "place", "140" = "tract" }

    [[shortcuts]]
    source = "state"
    levels = ["county", "tract"]
    retain_length = 9
    skip_length = 7
    mode = "children"

    [[shortcuts]]
    source = "county"
    levels = ["tract"]
    retain_length = 12
    skip_length = 7
    mode = "children"
"#;

pub fn registry() -> Arc<LevelRegistry> {
    let config = Config::from_toml_str(LEVELS).expect("fixture config parses");
    Arc::new(LevelRegistry::from_config(config).expect("fixture config validates"))
}

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)
    ])
}

fn feature(id: &str, name: &str, geometry: Geometry<f64>) -> Feature {
    Feature::new(id, Some(name.to_string()), geometry)
}

pub fn store(registry: &LevelRegistry) -> MemoryStore {
    let mut builder = MemoryStore::builder(registry).expect("lon/lat srids");

    let data = [
        ("state", feature("04000US36", "New York", rect(0.0, 0.0, 2.0, 2.0))),
        ("state", feature("04000US34", "New Jersey", rect(2.0, 0.0, 4.0, 2.0))),
        ("county", feature("05000US36001", "Albany County", rect(0.0, 0.0, 1.0, 2.0))),
        ("county", feature("05000US36003", "Allegany County", rect(1.0, 0.0, 2.0, 2.0))),
        ("county", feature("05000US34001", "Atlantic County", rect(2.0, 0.0, 4.0, 2.0))),
        ("tract", feature("14000US36001000100", "Tract 1", rect(0.0, 0.0, 1.0, 1.0))),
        ("tract", feature("14000US36001000200", "Tract 2", rect(0.0, 1.0, 1.0, 2.0))),
        ("tract", feature("14000US36003000100", "Tract 1", rect(1.0, 0.0, 2.0, 2.0))),
        ("tract", feature("14000US34001000100", "Tract 1", rect(2.0, 0.0, 4.0, 2.0))),
        ("place", feature("16000US3601000", "Albany", rect(0.2, 0.2, 0.4, 0.4))),
        ("place", feature("16000US3602000", "Borderville", rect(0.8, 0.4, 1.2, 0.8))),
        (
            "university",
            feature("190150", "State University", Geometry::Point(Point::new(0.5, 1.5))),
        ),
    ];

    for (level, feature) in data {
        builder.insert(level, feature).expect("fixture level exists");
    }
    builder.build()
}
