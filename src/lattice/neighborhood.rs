//! Neighborhood patterns → relative offsets → neighbor coordinates.

use crate::error::ConfigError;
use crate::scenario::NeighborhoodConfig;

/// Upper bound on offsets a single pattern may generate.
const MAX_OFFSETS: usize = 1 << 20;

/// No lattice axis is longer than this, so no offset component may be.
const MAX_COMPONENT: u64 = u32::MAX as u64;

/// A relative offset together with its coupling weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Offset {
    pub delta: Vec<i64>,
    pub weight: f64,
}

impl Offset {
    pub fn is_zero(&self) -> bool {
        self.delta.iter().all(|&d| d == 0)
    }
}

/// Expand every pattern for a `dims`-dimensional lattice, concatenated in
/// declaration order.
pub fn expand_all(patterns: &[NeighborhoodConfig], dims: usize) -> Result<Vec<Offset>, ConfigError> {
    let mut all = Vec::new();
    for pattern in patterns {
        all.extend(expand(pattern, dims)?);
    }
    Ok(all)
}

/// Expand one pattern.
///
/// Moore and von Neumann offsets come out in lexicographic order and never
/// include the zero vector. Relative offsets keep the listed order.
pub fn expand(pattern: &NeighborhoodConfig, dims: usize) -> Result<Vec<Offset>, ConfigError> {
    match pattern {
        NeighborhoodConfig::Moore { range, vicinity } => {
            let r = check_range(*range, "moore")?;
            let weight = check_vicinity(*vicinity)?;
            Ok(cube(r, dims)?
                .into_iter()
                .filter(|d| d.iter().any(|&c| c != 0))
                .map(|delta| Offset { delta, weight })
                .collect())
        }
        NeighborhoodConfig::VonNeumann { range, vicinity } => {
            let r = check_range(*range, "von_neumann")?;
            let weight = check_vicinity(*vicinity)?;
            Ok(cube(r, dims)?
                .into_iter()
                .filter(|d| {
                    let manhattan: i64 = d.iter().map(|c| c.abs()).sum();
                    manhattan >= 1 && manhattan <= r
                })
                .map(|delta| Offset { delta, weight })
                .collect())
        }
        NeighborhoodConfig::Relative {
            neighbors,
            vicinity,
        } => {
            let weight = check_vicinity(*vicinity)?;
            neighbors
                .iter()
                .map(|delta| {
                    if delta.len() != dims {
                        return Err(ConfigError::DimensionMismatch {
                            expected: dims,
                            found: delta.len(),
                            context: format!("relative neighbor offset {:?}", delta),
                        });
                    }
                    if delta.iter().any(|d| d.unsigned_abs() > MAX_COMPONENT) {
                        return Err(ConfigError::Neighborhood(format!(
                            "relative neighbor offset {:?} exceeds any lattice extent",
                            delta
                        )));
                    }
                    Ok(Offset {
                        delta: delta.clone(),
                        weight,
                    })
                })
                .collect()
        }
    }
}

/// Apply `delta` to `origin`.
///
/// On a wrapped lattice every component wraps modulo its extent; on a
/// clipped one, `None` is returned when the result falls outside or is not
/// representable.
pub fn resolve(origin: &[usize], delta: &[i64], shape: &[usize], wrapped: bool) -> Option<Vec<usize>> {
    origin
        .iter()
        .zip(delta)
        .zip(shape)
        .map(|((&o, &d), &extent)| {
            let extent = i64::try_from(extent).ok()?;
            let v = i64::try_from(o).ok()?.checked_add(d)?;
            if wrapped {
                Some(v.rem_euclid(extent) as usize)
            } else if (0..extent).contains(&v) {
                Some(v as usize)
            } else {
                None
            }
        })
        .collect()
}

fn check_range(range: i64, kind: &str) -> Result<i64, ConfigError> {
    if range < 1 {
        return Err(ConfigError::Neighborhood(format!(
            "{} range must be at least 1, got {}",
            kind, range
        )));
    }
    Ok(range)
}

fn check_vicinity(vicinity: f64) -> Result<f64, ConfigError> {
    if !vicinity.is_finite() {
        return Err(ConfigError::Neighborhood(format!(
            "vicinity must be finite, got {}",
            vicinity
        )));
    }
    Ok(vicinity)
}

/// Every vector in `[-r, r]^dims`, lexicographic, first axis slowest.
fn cube(r: i64, dims: usize) -> Result<Vec<Vec<i64>>, ConfigError> {
    let count = r
        .checked_mul(2)
        .and_then(|w| w.checked_add(1))
        .and_then(|w| usize::try_from(w).ok())
        .zip(u32::try_from(dims).ok())
        .and_then(|(side, d)| side.checked_pow(d))
        .filter(|&n| n <= MAX_OFFSETS)
        .ok_or_else(|| {
            ConfigError::Neighborhood(format!(
                "range {} in {} dimensions generates too many offsets",
                r, dims
            ))
        })?;

    let mut out = Vec::with_capacity(count);
    let mut current = vec![-r; dims];
    for _ in 0..count {
        out.push(current.clone());
        // Odometer increment, last axis fastest.
        for axis in (0..dims).rev() {
            if current[axis] < r {
                current[axis] += 1;
                break;
            }
            current[axis] = -r;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(offsets: &[Offset]) -> Vec<Vec<i64>> {
        offsets.iter().map(|o| o.delta.clone()).collect()
    }

    #[test]
    fn test_moore_2d_order() {
        let offs = expand(&NeighborhoodConfig::moore(1), 2).unwrap();
        assert_eq!(
            deltas(&offs),
            vec![
                vec![-1, -1],
                vec![-1, 0],
                vec![-1, 1],
                vec![0, -1],
                vec![0, 1],
                vec![1, -1],
                vec![1, 0],
                vec![1, 1],
            ]
        );
        assert!(offs.iter().all(|o| o.weight == 1.0));
    }

    #[test]
    fn test_von_neumann_2d() {
        let offs = expand(&NeighborhoodConfig::von_neumann(1), 2).unwrap();
        assert_eq!(
            deltas(&offs),
            vec![vec![-1, 0], vec![0, -1], vec![0, 1], vec![1, 0]]
        );
        let r2 = expand(&NeighborhoodConfig::von_neumann(2), 2).unwrap();
        assert_eq!(r2.len(), 12);
    }

    #[test]
    fn test_moore_counts_by_dimension() {
        for dims in 1..=3 {
            let offs = expand(&NeighborhoodConfig::moore(2), dims).unwrap();
            assert_eq!(offs.len(), 5usize.pow(dims as u32) - 1);
        }
    }

    #[test]
    fn test_relative_keeps_order_and_zero() {
        let pattern = NeighborhoodConfig::Relative {
            neighbors: vec![vec![1, 0], vec![0, 0], vec![-1, 0]],
            vicinity: 0.25,
        };
        let offs = expand(&pattern, 2).unwrap();
        assert_eq!(deltas(&offs), vec![vec![1, 0], vec![0, 0], vec![-1, 0]]);
        assert!(offs[1].is_zero());
        assert_eq!(offs[0].weight, 0.25);
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            expand(&NeighborhoodConfig::moore(0), 2),
            Err(ConfigError::Neighborhood(_))
        ));
        assert!(matches!(
            expand(
                &NeighborhoodConfig::VonNeumann { range: 1, vicinity: f64::NAN },
                2
            ),
            Err(ConfigError::Neighborhood(_))
        ));
        assert!(matches!(
            expand(&NeighborhoodConfig::relative(vec![vec![1]]), 2),
            Err(ConfigError::DimensionMismatch { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            expand(&NeighborhoodConfig::moore(100), 4),
            Err(ConfigError::Neighborhood(_))
        ));
        assert!(matches!(
            expand(&NeighborhoodConfig::relative(vec![vec![0, i64::MIN]]), 2),
            Err(ConfigError::Neighborhood(_))
        ));
    }

    #[test]
    fn test_resolve_wrapped_and_clipped() {
        let shape = [3, 4];
        assert_eq!(resolve(&[0, 0], &[-1, -1], &shape, true), Some(vec![2, 3]));
        assert_eq!(resolve(&[2, 3], &[1, 1], &shape, true), Some(vec![0, 0]));
        assert_eq!(resolve(&[0, 0], &[-1, 0], &shape, false), None);
        assert_eq!(resolve(&[1, 1], &[1, 2], &shape, false), Some(vec![2, 3]));
        // Wrapping by a multiple of the extent lands back on the origin.
        assert_eq!(resolve(&[1, 1], &[3, 0], &shape, true), Some(vec![1, 1]));
        assert_eq!(resolve(&[1, 1], &[i64::MAX, 0], &shape, false), None);
        assert_eq!(resolve(&[1, 1], &[0, i64::MAX], &shape, true), None);
    }
}
