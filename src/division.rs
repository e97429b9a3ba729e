//! Division-property trails of lookup tables and greedy inequality
//! reduction.

use std::rc::Rc;

use bit_vec::BitVec;
use fnv::FnvHashSet;

use crate::error::{Error, Result};
use crate::lookup_table::LookupTable;
use crate::polyhedron::{Inequality, Vertex};

/// Returns `x^u`: the product of the bits of `x` selected by `u`.
fn bit_power(x: u64, u: u64) -> u64 {
    (x & u == u) as u64
}

/// ANF coefficients of the product of the output bits selected by `mask`.
fn product_anf(sbox: &LookupTable, mask: u64) -> Result<BitVec> {
    let out_mask = sbox.output_mask();
    let bits: Vec<u64> = sbox
        .table_data()
        .iter()
        .map(|&value| bit_power(value & out_mask, mask))
        .collect();
    let product_table = LookupTable::create("", sbox.input_width(), 1, bits)?;
    Ok(product_table.anf_of(0)?.clone())
}

/// Enumerates the admissible division-property trails `(u, v)` of an S-box
/// as 0/1 vertices of dimension `n + m` (input mask bits first).
///
/// An output mask `v` is coverable from `u` when the ANF of the product of
/// the output bits selected by `v` contains a monomial whose variable set is
/// a superset of `u`; only the minimal coverable masks under the subset
/// order are emitted, besides the trivial trail `0 -> 0`.
pub fn division_property_trail(sbox: &Rc<LookupTable>) -> Result<Vec<Vertex>> {
    let input_width = sbox.input_width();
    let output_width = sbox.output_width();
    let input_masks = 1u64 << input_width;
    let output_masks = 1u64 << output_width;

    let anfs = (0..output_masks)
        .map(|mask| product_anf(sbox, mask))
        .collect::<Result<Vec<_>>>()?;

    let mut trails = vec![Vertex::from_int_bits(0, input_width + output_width)];

    for u in 1..input_masks {
        let mut minimal_masks: Vec<u64> = Vec::new();

        for v in 1..output_masks {
            let anf = &anfs[v as usize];
            let covered = (0..anf.len()).any(|index| anf[index] && (index as u64 | u) == index as u64);
            if !covered {
                continue;
            }

            let mut should_add = true;
            let mut to_remove = Vec::new();
            for (idx, &existing) in minimal_masks.iter().enumerate() {
                if existing | v == v {
                    should_add = false;
                    break;
                }
                if existing | v == existing {
                    to_remove.push(idx);
                }
            }
            if !should_add {
                continue;
            }
            for &idx in to_remove.iter().rev() {
                minimal_masks.remove(idx);
            }
            minimal_masks.push(v);
        }

        for &mask in &minimal_masks {
            let coordinates = Vertex::from_int_bits(u, input_width)
                .iter()
                .chain(Vertex::from_int_bits(mask, output_width).iter())
                .collect();
            trails.push(Vertex::new(coordinates));
        }
    }

    Ok(trails)
}

/// Reduces an over-approximating inequality set to a minimal subset whose
/// feasible 0/1 points are exactly `points`.
///
/// Greedy covering: while excluded points remain, pick the inequality
/// violated by the most of them (lowest index on ties), keep it, and drop
/// the points it separates. Fails when no remaining inequality separates a
/// remaining point.
pub fn reduce_inequalities(
    inequalities: &[Inequality],
    points: &[Vertex],
) -> Result<Vec<Inequality>> {
    if points.is_empty() || inequalities.is_empty() {
        return Err(Error::EmptyReduction);
    }

    let dimension = points[0].dimension();
    for point in points {
        if point.dimension() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                got: point.dimension(),
            });
        }
    }
    for inequality in inequalities {
        if inequality.dimension() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                got: inequality.dimension(),
            });
        }
    }

    let point_set: FnvHashSet<&Vertex> = points.iter().collect();
    let mut complement: Vec<Vertex> = (0..1u64 << dimension)
        .map(|value| Vertex::from_int_bits(value, dimension))
        .filter(|candidate| !point_set.contains(candidate))
        .collect();

    let mut remaining = inequalities.to_vec();
    let mut result = Vec::new();

    while !complement.is_empty() {
        let mut best_index = None;
        let mut violated_indices: Vec<usize> = Vec::new();

        for (idx, inequality) in remaining.iter().enumerate() {
            let current: Vec<usize> = complement
                .iter()
                .enumerate()
                .filter(|(_, point)| inequality.evaluate(point).unwrap_or(0) < 0)
                .map(|(point_idx, _)| point_idx)
                .collect();
            if current.len() > violated_indices.len() {
                best_index = Some(idx);
                violated_indices = current;
            }
        }

        let best_index = match best_index {
            Some(idx) if !violated_indices.is_empty() => idx,
            _ => return Err(Error::InsufficientSeparatingPower),
        };

        result.push(remaining.remove(best_index));

        let removed: FnvHashSet<usize> = violated_indices.into_iter().collect();
        complement = complement
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !removed.contains(idx))
            .map(|(_, point)| point)
            .collect();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedron::vertices_to_inequalities;

    fn identity_table(width: usize) -> Rc<LookupTable> {
        let values = (0..1u64 << width).collect();
        LookupTable::create("id", width, width, values).unwrap()
    }

    #[test]
    fn identity_trails_are_diagonal() {
        let trails = division_property_trail(&identity_table(2)).unwrap();

        let expected: Vec<Vertex> = vec![
            Vertex::new(vec![0, 0, 0, 0]),
            Vertex::new(vec![1, 0, 1, 0]),
            Vertex::new(vec![0, 1, 0, 1]),
            Vertex::new(vec![1, 1, 1, 1]),
        ];
        assert_eq!(trails.len(), expected.len());
        for vertex in &expected {
            assert!(trails.contains(vertex), "missing {:?}", vertex);
        }
    }

    #[test]
    fn identity_trails_for_wider_tables() {
        let width = 3;
        let trails = division_property_trail(&identity_table(width)).unwrap();

        assert_eq!(trails.len(), 1 << width);
        for u in 0..1u64 << width {
            let diagonal = Vertex::from_int_bits(u | (u << width), 2 * width);
            assert!(trails.contains(&diagonal), "missing {:?}", diagonal);
        }
    }

    #[test]
    fn reduction_keeps_the_strongest_inequality() {
        // P = {(0,0), (0,1), (1,0)}; of the three inequalities only
        // x1 + x2 <= 1 separates (1,1).
        let points = vec![
            Vertex::new(vec![0, 0]),
            Vertex::new(vec![0, 1]),
            Vertex::new(vec![1, 0]),
        ];
        let inequalities = vec![
            Inequality {
                coefficients: vec![-1, -1],
                constant_term: 1,
            },
            Inequality {
                coefficients: vec![-1, 0],
                constant_term: 1,
            },
            Inequality {
                coefficients: vec![0, -1],
                constant_term: 1,
            },
        ];

        let reduced = reduce_inequalities(&inequalities, &points).unwrap();
        assert_eq!(reduced, vec![inequalities[0].clone()]);
    }

    #[test]
    fn reduction_fails_without_separating_power() {
        let points = vec![Vertex::new(vec![0, 0])];
        let inequalities = vec![Inequality {
            coefficients: vec![1, 1],
            constant_term: 0,
        }];

        assert!(matches!(
            reduce_inequalities(&inequalities, &points),
            Err(Error::InsufficientSeparatingPower)
        ));
    }

    #[test]
    fn reduced_cuts_describe_exactly_the_trail_set() {
        // End to end over the PRESENT S-box: trails -> cuts -> reduction,
        // then check the feasible 0/1 points are exactly the trails.
        let table = LookupTable::create(
            "present",
            4,
            4,
            vec![
                0xc, 0x5, 0x6, 0xb, 0x9, 0x0, 0xa, 0xd, 0x3, 0xe, 0xf, 0x8, 0x4, 0x7, 0x1, 0x2,
            ],
        )
        .unwrap();

        let trails = division_property_trail(&table).unwrap();
        let cuts = vertices_to_inequalities(&trails).unwrap();
        let reduced = reduce_inequalities(&cuts, &trails).unwrap();

        assert!(reduced.len() <= cuts.len());
        for value in 0..1u64 << 8 {
            let vertex = Vertex::from_int_bits(value, 8);
            let feasible = reduced
                .iter()
                .all(|cut| cut.satisfied_by(&vertex).unwrap());
            assert_eq!(feasible, trails.contains(&vertex), "point {:08b}", value);
        }
    }
}
