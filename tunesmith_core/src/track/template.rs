// Track-piece template catalog.
//
// Every track piece the optimizers can place is a `TrackTemplate`: a solid
// footprint in local tile coordinates, two attachment points (local offset
// plus outward compass direction), a traversal duration in frames, and the
// interpolation the game uses to move a rider along it. The attachment
// whitelist of each point is derived when the catalog is built: two points
// are compatible when their outward directions are exactly opposite, or
// opposite give or take 45 degrees.
//
// An air template has no second solid end. Placing it also places a
// supporting template at a fixed offset, linked to the air piece's attach 1.
//
// The catalog is immutable after construction and indexed by `TemplateId`
// (a position in `templates`).
//
// See also: `map.rs` which places instances of these templates,
// `legality.rs` which consults the whitelists.

use crate::error::{BuildError, Result};
use crate::types::{Dir8, TilePos};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Index into `TrackCatalog::templates`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrackCategory {
    Straight,
    Diagonal,
    Curve,
    Air,
}

/// How a rider's position is interpolated along a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Linear,
    Curved,
    Falling,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachPoint {
    pub offset: TilePos,
    pub outward: Dir8,
    /// `(template, attach index)` pairs that may connect here.
    pub whitelist: Vec<(TemplateId, u8)>,
}

/// The supporting piece an air template brings along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirSupport {
    pub template: TemplateId,
    /// Local offset of the support's `via_attach` point.
    pub offset: TilePos,
    pub via_attach: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTemplate {
    pub id: TemplateId,
    pub name: String,
    pub category: TrackCategory,
    pub footprint: SmallVec<[TilePos; 4]>,
    pub attach: [AttachPoint; 2],
    /// Frames to traverse from one end to the other.
    pub duration: u32,
    pub interpolation: Interpolation,
    pub air_support: Option<AirSupport>,
}

impl TrackTemplate {
    pub fn accepts(&self, attach: u8, other: TemplateId, other_attach: u8) -> bool {
        self.attach[attach as usize]
            .whitelist
            .contains(&(other, other_attach))
    }

    /// Outward direction of the point a curve's vertical end sits on, if any.
    pub fn vertical_end(&self) -> Option<Dir8> {
        self.attach
            .iter()
            .map(|a| a.outward)
            .find(|d| d.is_vertical())
    }

    /// Heading change (in octants) when traversed entering at `entry`.
    pub fn turn(&self, entry: u8) -> i32 {
        let heading_in = self.attach[entry as usize].outward.opposite();
        let heading_out = self.attach[1 - entry as usize].outward;
        heading_in.turn_to(heading_out)
    }
}

/// Whether two outward directions can meet at a shared attach tile.
pub fn directions_compatible(a: Dir8, b: Dir8) -> bool {
    let turn = a.opposite().turn_to(b).abs();
    turn <= 1
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct TrackCatalog {
    templates: Vec<TrackTemplate>,
}

pub const STRAIGHT_COST: u32 = 21;
pub const DIAGONAL_COST: u32 = 30;
pub const CURVE_COST: u32 = 36;

struct Shape {
    name: &'static str,
    category: TrackCategory,
    attach: [((i32, i32), Dir8); 2],
    footprint: &'static [(i32, i32)],
    air_support: Option<(&'static str, (i32, i32), u8)>,
}

const STANDARD_SHAPES: &[Shape] = &[
    Shape {
        name: "straight-h",
        category: TrackCategory::Straight,
        attach: [((0, 0), Dir8::W), ((2, 0), Dir8::E)],
        footprint: &[(0, 0), (1, 0), (2, 0)],
        air_support: None,
    },
    Shape {
        name: "straight-v",
        category: TrackCategory::Straight,
        attach: [((0, 0), Dir8::S), ((0, 2), Dir8::N)],
        footprint: &[(0, 0), (0, 1), (0, 2)],
        air_support: None,
    },
    Shape {
        name: "diagonal-up",
        category: TrackCategory::Diagonal,
        attach: [((0, 0), Dir8::SW), ((2, 2), Dir8::NE)],
        footprint: &[(0, 0), (1, 1), (2, 2)],
        air_support: None,
    },
    Shape {
        name: "diagonal-down",
        category: TrackCategory::Diagonal,
        attach: [((0, 2), Dir8::NW), ((2, 0), Dir8::SE)],
        footprint: &[(0, 2), (1, 1), (2, 0)],
        air_support: None,
    },
    Shape {
        name: "curve-bottom-right",
        category: TrackCategory::Curve,
        attach: [((0, 0), Dir8::W), ((2, 2), Dir8::N)],
        footprint: &[(0, 0), (1, 0), (2, 1), (2, 2)],
        air_support: None,
    },
    Shape {
        name: "curve-top-left",
        category: TrackCategory::Curve,
        attach: [((0, 0), Dir8::S), ((2, 2), Dir8::E)],
        footprint: &[(0, 0), (0, 1), (1, 2), (2, 2)],
        air_support: None,
    },
    Shape {
        name: "curve-top-right",
        category: TrackCategory::Curve,
        attach: [((0, 2), Dir8::W), ((2, 0), Dir8::S)],
        footprint: &[(0, 2), (1, 2), (2, 1), (2, 0)],
        air_support: None,
    },
    Shape {
        name: "curve-bottom-left",
        category: TrackCategory::Curve,
        attach: [((0, 2), Dir8::N), ((2, 0), Dir8::E)],
        footprint: &[(0, 2), (0, 1), (1, 0), (2, 0)],
        air_support: None,
    },
    Shape {
        name: "air-drop",
        category: TrackCategory::Air,
        attach: [((0, 0), Dir8::W), ((2, -2), Dir8::E)],
        footprint: &[(0, 0)],
        air_support: Some(("straight-h", (2, -2), 0)),
    },
];

/// Frames an air-drop rider spends falling two tiles.
const AIR_DROP_FRAMES: u32 = 9;

impl TrackCatalog {
    /// The built-in catalog with derived whitelists.
    pub fn standard() -> Self {
        let mut templates: Vec<TrackTemplate> = STANDARD_SHAPES
            .iter()
            .enumerate()
            .map(|(i, shape)| {
                let (duration, interpolation) = match shape.category {
                    TrackCategory::Straight => (STRAIGHT_COST, Interpolation::Linear),
                    TrackCategory::Diagonal => (DIAGONAL_COST, Interpolation::Linear),
                    TrackCategory::Curve => (CURVE_COST, Interpolation::Curved),
                    TrackCategory::Air => (AIR_DROP_FRAMES, Interpolation::Falling),
                };
                TrackTemplate {
                    id: TemplateId(i as u16),
                    name: shape.name.to_string(),
                    category: shape.category,
                    footprint: shape
                        .footprint
                        .iter()
                        .map(|&(x, y)| TilePos::new(x, y))
                        .collect(),
                    attach: shape.attach.map(|((x, y), outward)| AttachPoint {
                        offset: TilePos::new(x, y),
                        outward,
                        whitelist: Vec::new(),
                    }),
                    duration,
                    interpolation,
                    air_support: None,
                }
            })
            .collect();

        // Resolve air supports by name now that every id is known.
        for (i, shape) in STANDARD_SHAPES.iter().enumerate() {
            if let Some((support_name, (x, y), via_attach)) = shape.air_support {
                let support = templates
                    .iter()
                    .find(|t| t.name == support_name)
                    .map(|t| t.id);
                templates[i].air_support = support.map(|template| AirSupport {
                    template,
                    offset: TilePos::new(x, y),
                    via_attach,
                });
            }
        }

        derive_whitelists(&mut templates);
        Self { templates }
    }

    pub fn templates(&self) -> &[TrackTemplate] {
        &self.templates
    }

    pub fn get(&self, id: TemplateId) -> Option<&TrackTemplate> {
        self.templates.get(id.0 as usize)
    }

    pub fn template(&self, id: TemplateId) -> Result<&TrackTemplate> {
        self.get(id)
            .ok_or_else(|| BuildError::UnknownTemplate(format!("#{}", id.0)))
    }

    pub fn by_name(&self, name: &str) -> Result<TemplateId> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
            .ok_or_else(|| BuildError::UnknownTemplate(name.to_string()))
    }

    /// Traversal cost of each buildable category: straight, diagonal, curve.
    pub fn unit_costs(&self) -> [u32; 3] {
        let cost = |category, fallback| {
            self.templates
                .iter()
                .find(|t| t.category == category)
                .map_or(fallback, |t| t.duration)
        };
        [
            cost(TrackCategory::Straight, STRAIGHT_COST),
            cost(TrackCategory::Diagonal, DIAGONAL_COST),
            cost(TrackCategory::Curve, CURVE_COST),
        ]
    }

    /// Ids of every non-air template, in catalog order.
    pub fn buildable(&self) -> Vec<TemplateId> {
        self.templates
            .iter()
            .filter(|t| t.category != TrackCategory::Air)
            .map(|t| t.id)
            .collect()
    }
}

/// Fill every attach point's whitelist. An air template's attach 1 is owned
/// by its support, so nothing else may connect there.
fn derive_whitelists(templates: &mut [TrackTemplate]) {
    let endpoints: Vec<(TemplateId, u8, Dir8, bool)> = templates
        .iter()
        .flat_map(|t| {
            let air = t.air_support.is_some();
            (0..2u8).map(move |a| (t.id, a, t.attach[a as usize].outward, air && a == 1))
        })
        .collect();

    for template in templates.iter_mut() {
        let is_air = template.air_support.is_some();
        for (a, point) in template.attach.iter_mut().enumerate() {
            if is_air && a == 1 {
                continue;
            }
            point.whitelist = endpoints
                .iter()
                .filter(|(_, _, dir, internal)| !internal && directions_compatible(point.outward, *dir))
                .map(|&(id, attach, _, _)| (id, attach))
                .collect();
        }
    }
}
