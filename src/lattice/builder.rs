//! Lattice topology builder.
//!
//! Turns a parsed [`ScenarioConfig`] into a [`Lattice`] through a
//! [`CellRegistry`]. The build is all-or-nothing: on any error no lattice
//! exists and the registry is the only thing that was touched.
//!
//! Resolution for every cell, lowest precedence first:
//!
//! 1. scenario defaults (`default_cell_type`, `default_state`, delay)
//! 2. every region containing the cell, in declaration order
//! 3. the cell's own entry in `cells`
//!
//! `state` and `config` objects are merged key by key; everything else is
//! replaced. The parameter block starts from `default_config[cell_type]`.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::cell::{CellId, CellRegistry, CellState, Coord, LinkId, SharedModel};
use crate::error::ConfigError;
use crate::lattice::neighborhood::{self, Offset};
use crate::lattice::{coord_of_index, linear_index, Cell, DelaySpec, Lattice, Link};
use crate::scenario::{CellConfig, CellOverrides, LatticeConfig, ScenarioConfig};
use crate::time::VirtualTime;

/// Build the lattice described by `config`.
pub fn build<S: CellState>(
    config: &ScenarioConfig,
    registry: &CellRegistry<S>,
) -> Result<Lattice<S>, ConfigError> {
    let lattice_cfg = &config.scenario;
    let shape = validate_shape(&lattice_cfg.shape)?;
    let dims = shape.len();
    let total: usize = shape.iter().product();

    let offsets = neighborhood::expand_all(&lattice_cfg.neighborhood, dims)?;
    let regions = resolve_regions(config, &shape)?;
    let overrides = index_cell_overrides(&config.cells, &shape)?;

    // ── Cells ─────────────────────────────────────────────────────
    let mut models: BTreeMap<(String, String), SharedModel<S>> = BTreeMap::new();
    let mut cells = Vec::with_capacity(total);

    for index in 0..total {
        let coord = coord_of_index(&shape, index);
        let own = overrides.get(&index).copied();

        let mut layers: Vec<&CellOverrides> = regions
            .iter()
            .filter(|(lo, hi, _)| contains(lo, hi, coord.components()))
            .map(|(_, _, o)| *o)
            .collect();
        if let Some(cell_cfg) = own {
            layers.push(&cell_cfg.overrides);
        }

        let location = format!("cell {}", coord);
        let resolved = resolve_cell(lattice_cfg, &layers);

        let key = (resolved.cell_type.clone(), resolved.config.to_string());
        let model = match models.get(&key) {
            Some(model) => model.clone(),
            None => {
                let model = registry.create(&resolved.cell_type, &resolved.config, &location)?;
                models.insert(key, model.clone());
                model
            }
        };

        let state: S = serde_json::from_value(resolved.state).map_err(|e| {
            ConfigError::InvalidState {
                location: location.clone(),
                message: e.to_string(),
            }
        })?;

        cells.push(Cell {
            id: CellId::new(index as u32),
            coord,
            cell_type: resolved.cell_type,
            model,
            state,
            config: resolved.config,
            delay: resolved.delay,
            inbound: Vec::new(),
            outbound: Vec::new(),
        });
    }

    // ── Links ─────────────────────────────────────────────────────
    let mut links: Vec<Link> = Vec::new();
    for index in 0..total {
        let sources = match overrides.get(&index).and_then(|c| c.neighborhood.as_ref()) {
            Some(absolute) => absolute_sources(absolute, &shape, &cells[index].coord)?,
            None => pattern_sources(&offsets, &shape, lattice_cfg.wrapped, &cells[index].coord),
        };

        let dest = CellId::new(index as u32);
        let mut seen = BTreeSet::new();
        for (source_index, weight) in sources {
            if !seen.insert(source_index) {
                continue;
            }
            let id = LinkId::new(links.len() as u32);
            let source = &cells[source_index];
            links.push(Link {
                id,
                source: source.id,
                dest,
                weight,
                delay: source.delay.ticks,
                policy: source.delay.policy,
            });
            cells[source_index].outbound.push(id);
            cells[index].inbound.push(id);
        }
        debug!(cell = %dest, neighbors = cells[index].inbound.len(), "cell linked");
    }

    info!(
        shape = ?shape,
        wrapped = lattice_cfg.wrapped,
        cells = cells.len(),
        links = links.len(),
        models = models.len(),
        "lattice built"
    );

    Ok(Lattice {
        shape,
        wrapped: lattice_cfg.wrapped,
        cells,
        links,
    })
}

// ── Shape ─────────────────────────────────────────────────────────────

fn validate_shape(raw: &[i64]) -> Result<Vec<usize>, ConfigError> {
    let shape_err = |reason: &str| ConfigError::Shape {
        shape: raw.to_vec(),
        reason: reason.to_string(),
    };
    if raw.is_empty() {
        return Err(shape_err("a lattice needs at least one dimension"));
    }
    let mut shape = Vec::with_capacity(raw.len());
    let mut total: u64 = 1;
    for &extent in raw {
        if extent <= 0 {
            return Err(shape_err("every dimension must be positive"));
        }
        total = total
            .checked_mul(extent as u64)
            .filter(|&n| n <= u64::from(u32::MAX))
            .ok_or_else(|| shape_err("too many cells"))?;
        shape.push(extent as usize);
    }
    Ok(shape)
}

/// Check a scenario coordinate against the shape.
fn checked_coord(raw: &[i64], shape: &[usize], context: &str) -> Result<Vec<usize>, ConfigError> {
    if raw.len() != shape.len() {
        return Err(ConfigError::DimensionMismatch {
            expected: shape.len(),
            found: raw.len(),
            context: context.to_string(),
        });
    }
    raw.iter()
        .zip(shape)
        .map(|(&c, &extent)| {
            if c >= 0 && (c as u64) < extent as u64 {
                Ok(c as usize)
            } else {
                Err(ConfigError::OutOfRange {
                    coord: raw.to_vec(),
                    shape: shape.to_vec(),
                    context: context.to_string(),
                })
            }
        })
        .collect()
}

// ── Overrides ─────────────────────────────────────────────────────────

type Region<'a> = (Vec<usize>, Vec<usize>, &'a CellOverrides);

fn resolve_regions<'a>(
    config: &'a ScenarioConfig,
    shape: &[usize],
) -> Result<Vec<Region<'a>>, ConfigError> {
    config
        .regions
        .iter()
        .enumerate()
        .map(|(index, region)| {
            let context = format!("region {}", index);
            let lo = checked_coord(&region.from, shape, &context)?;
            let hi = checked_coord(&region.to, shape, &context)?;
            if lo.iter().zip(&hi).any(|(l, h)| l > h) {
                return Err(ConfigError::InvalidRegion {
                    index,
                    reason: format!("from {:?} is past to {:?}", region.from, region.to),
                });
            }
            Ok((lo, hi, &region.overrides))
        })
        .collect()
}

fn index_cell_overrides<'a>(
    cells: &'a [CellConfig],
    shape: &[usize],
) -> Result<BTreeMap<usize, &'a CellConfig>, ConfigError> {
    let mut by_index = BTreeMap::new();
    for cell in cells {
        let coord = checked_coord(&cell.cell_id, shape, "cells entry")?;
        let index = linear_index(shape, &coord).ok_or_else(|| ConfigError::OutOfRange {
            coord: cell.cell_id.clone(),
            shape: shape.to_vec(),
            context: "cells entry".to_string(),
        })?;
        if by_index.insert(index, cell).is_some() {
            return Err(ConfigError::DuplicateCell(Coord::new(coord)));
        }
    }
    Ok(by_index)
}

fn contains(lo: &[usize], hi: &[usize], coord: &[usize]) -> bool {
    coord
        .iter()
        .zip(lo.iter().zip(hi))
        .all(|(c, (l, h))| l <= c && c <= h)
}

struct Resolved {
    cell_type: String,
    state: Value,
    config: Value,
    delay: DelaySpec,
}

fn resolve_cell(defaults: &LatticeConfig, layers: &[&CellOverrides]) -> Resolved {
    let mut cell_type = defaults.default_cell_type.clone();
    let mut state = defaults.default_state.clone();
    let mut policy = defaults.default_delay;
    let mut ticks = defaults.default_delay_ticks;

    for layer in layers {
        if let Some(t) = &layer.cell_type {
            cell_type = t.clone();
        }
        if let Some(s) = &layer.state {
            merge(&mut state, s);
        }
        if let Some(p) = layer.delay {
            policy = p;
        }
        if let Some(t) = layer.delay_ticks {
            ticks = t;
        }
    }

    // The parameter block depends on the final cell type.
    let mut config = defaults
        .default_config
        .get(&cell_type)
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    for layer in layers {
        if let Some(c) = &layer.config {
            merge(&mut config, c);
        }
    }

    Resolved {
        cell_type,
        state,
        config,
        delay: DelaySpec {
            policy,
            ticks: VirtualTime::new(ticks),
        },
    }
}

/// Shallow merge: object keys from `over` win, any other value replaces.
fn merge(base: &mut Value, over: &Value) {
    if let (Value::Object(b), Value::Object(o)) = (&mut *base, over) {
        for (k, v) in o {
            b.insert(k.clone(), v.clone());
        }
        return;
    }
    *base = over.clone();
}

// ── Neighbors ─────────────────────────────────────────────────────────

fn pattern_sources(
    offsets: &[Offset],
    shape: &[usize],
    wrapped: bool,
    origin: &Coord,
) -> Vec<(usize, f64)> {
    offsets
        .iter()
        .filter_map(|offset| {
            let target = neighborhood::resolve(origin.components(), &offset.delta, shape, wrapped)?;
            // A wrapped offset that lands back on the origin is not a self-link.
            if target == origin.components() && !offset.is_zero() {
                return None;
            }
            linear_index(shape, &target).map(|i| (i, offset.weight))
        })
        .collect()
}

fn absolute_sources(
    neighbors: &[Vec<i64>],
    shape: &[usize],
    origin: &Coord,
) -> Result<Vec<(usize, f64)>, ConfigError> {
    let context = format!("neighborhood of cell {}", origin);
    neighbors
        .iter()
        .map(|raw| {
            let coord = checked_coord(raw, shape, &context)?;
            let index = linear_index(shape, &coord).ok_or_else(|| ConfigError::OutOfRange {
                coord: raw.clone(),
                shape: shape.to_vec(),
                context: context.clone(),
            })?;
            Ok((index, 1.0))
        })
        .collect()
}
