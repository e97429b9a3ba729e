//! Vertices and inequalities of 0/1 polytopes.

use crate::error::{Error, Result};
use crate::logic::{complement, Cube, CubeBit};

/// An integer point of fixed dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Vertex {
    coordinates: Vec<i64>,
}

impl Vertex {
    pub fn new(coordinates: Vec<i64>) -> Vertex {
        Vertex { coordinates }
    }

    /// Builds the 0/1 point whose coordinate `i` is bit `i` of `value`.
    pub fn from_int_bits(value: u64, bit_count: usize) -> Vertex {
        Vertex {
            coordinates: (0..bit_count).map(|i| ((value >> i) & 1) as i64).collect(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }

    pub fn at(&self, index: usize) -> i64 {
        self.coordinates[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.coordinates.iter().copied()
    }

    /// Packs a 0/1 vertex back into the integer whose bit `i` is coordinate
    /// `i`.
    fn as_int_bits(&self) -> Option<u64> {
        let mut value = 0;
        for (i, coordinate) in self.coordinates.iter().enumerate() {
            match coordinate {
                0 => {}
                1 => value |= 1 << i,
                _ => return None,
            }
        }
        Some(value)
    }
}

/// A halfspace `c·x + c0 >= 0` with integer coefficients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inequality {
    pub coefficients: Vec<i64>,
    pub constant_term: i64,
}

impl Inequality {
    pub fn dimension(&self) -> usize {
        self.coefficients.len()
    }

    /// Evaluates `c·x + c0` at the given point.
    pub fn evaluate(&self, point: &Vertex) -> Result<i64> {
        if point.dimension() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                got: point.dimension(),
            });
        }
        let mut sum = self.constant_term;
        for (coefficient, coordinate) in self.coefficients.iter().zip(point.iter()) {
            sum += coefficient * coordinate;
        }
        Ok(sum)
    }

    pub fn satisfied_by(&self, point: &Vertex) -> Result<bool> {
        Ok(self.evaluate(point)? >= 0)
    }
}

/// Converts one complement cube into the cut that forbids exactly the 0/1
/// points inside it: with fixed-zero set `Z` and fixed-one set `O`, the cut
/// is `sum_{i in Z} x_i - sum_{i in O} x_i + |O| - 1 >= 0`.
fn cube_to_cut(cube: &Cube) -> Inequality {
    let mut coefficients = vec![0; cube.width()];
    let mut ones = 0;
    for (i, bit) in cube.iter().enumerate() {
        match bit {
            CubeBit::Zero => coefficients[i] = 1,
            CubeBit::One => {
                coefficients[i] = -1;
                ones += 1;
            }
            CubeBit::Free => {}
        }
    }
    Inequality {
        coefficients,
        constant_term: ones - 1,
    }
}

/// Computes an inequality description of a set of 0/1 points: one cut per
/// cube of the merged complement cover. Every point of the set satisfies
/// every cut, and every 0/1 point outside the set violates at least one, so
/// the set always has full separating power for the greedy reduction.
pub fn vertices_to_inequalities(vertices: &[Vertex]) -> Result<Vec<Inequality>> {
    let dimension = match vertices.first() {
        Some(vertex) => vertex.dimension(),
        None => return Err(Error::EmptyReduction),
    };

    let mut minterms = Vec::with_capacity(vertices.len());
    for vertex in vertices {
        if vertex.dimension() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                got: vertex.dimension(),
            });
        }
        let value = vertex.as_int_bits().ok_or(Error::DimensionMismatch {
            expected: dimension,
            got: vertex.dimension(),
        })?;
        minterms.push(Cube::minterm(value, dimension));
    }

    Ok(complement(&minterms, dimension)
        .iter()
        .map(cube_to_cut)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_checks_dimensions() {
        let ineq = Inequality {
            coefficients: vec![1, -1],
            constant_term: 0,
        };
        assert!(ineq.evaluate(&Vertex::from_int_bits(0, 3)).is_err());
        assert_eq!(ineq.evaluate(&Vertex::new(vec![1, 0])).unwrap(), 1);
        assert_eq!(ineq.evaluate(&Vertex::new(vec![0, 1])).unwrap(), -1);
    }

    #[test]
    fn cuts_separate_exactly_the_complement() {
        // P = {00, 01, 10}: the cuts must admit P and reject 11.
        let points: Vec<Vertex> = [0b00u64, 0b01, 0b10]
            .iter()
            .map(|&value| Vertex::from_int_bits(value, 2))
            .collect();

        let cuts = vertices_to_inequalities(&points).unwrap();

        for point in &points {
            for cut in &cuts {
                assert!(cut.satisfied_by(point).unwrap());
            }
        }
        let excluded = Vertex::from_int_bits(0b11, 2);
        assert!(cuts.iter().any(|cut| !cut.satisfied_by(&excluded).unwrap()));
    }

    #[test]
    fn full_separating_power_on_sparse_sets() {
        // Only two points of a 4-dimensional cube are admissible.
        let points: Vec<Vertex> = [0b0000u64, 0b1111]
            .iter()
            .map(|&value| Vertex::from_int_bits(value, 4))
            .collect();
        let cuts = vertices_to_inequalities(&points).unwrap();

        for value in 0..16u64 {
            let vertex = Vertex::from_int_bits(value, 4);
            let admitted = cuts
                .iter()
                .all(|cut| cut.satisfied_by(&vertex).unwrap());
            assert_eq!(admitted, value == 0 || value == 15, "point {:04b}", value);
        }
    }

    #[test]
    fn empty_point_sets_are_rejected() {
        assert!(matches!(
            vertices_to_inequalities(&[]),
            Err(Error::EmptyReduction)
        ));
    }
}
