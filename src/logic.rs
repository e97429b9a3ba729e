//! Two-level covers of boolean functions: cubes, cover complement and a
//! merge pass.
//!
//! A cover is a list of cubes whose union is the ON-set of a function over
//! `{0,1}^width`. The complement of a cover, minimised by merging adjacent
//! cubes, is what both the CNF table templates and the polytope cuts of the
//! division-property modeller are built from: each complement cube forbids
//! exactly the assignments inside it.

/// The value of one position of a cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeBit {
    Zero,
    One,
    Free,
}

/// A subcube of `{0,1}^width`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cube {
    bits: Vec<CubeBit>,
}

impl Cube {
    /// The cube covering the whole space.
    pub fn free(width: usize) -> Cube {
        Cube {
            bits: vec![CubeBit::Free; width],
        }
    }

    /// The cube covering exactly one point, taking position `i` from bit `i`
    /// of `value`.
    pub fn minterm(value: u64, width: usize) -> Cube {
        Cube {
            bits: (0..width)
                .map(|i| {
                    if (value >> i) & 1 == 1 {
                        CubeBit::One
                    } else {
                        CubeBit::Zero
                    }
                })
                .collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn get(&self, position: usize) -> CubeBit {
        self.bits[position]
    }

    pub fn set(&mut self, position: usize, value: CubeBit) {
        self.bits[position] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = CubeBit> + '_ {
        self.bits.iter().copied()
    }

    pub fn is_tautology(&self) -> bool {
        self.bits.iter().all(|&bit| bit == CubeBit::Free)
    }

    /// Tests whether the point, read bit `i` from bit `i` of `value`, lies
    /// inside the cube.
    pub fn contains_point(&self, value: u64) -> bool {
        self.bits.iter().enumerate().all(|(i, &bit)| match bit {
            CubeBit::Zero => (value >> i) & 1 == 0,
            CubeBit::One => (value >> i) & 1 == 1,
            CubeBit::Free => true,
        })
    }

    /// Tests whether every point of `other` is inside `self`.
    pub fn covers(&self, other: &Cube) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .all(|(&a, &b)| a == CubeBit::Free || a == b)
    }

    /// If the cubes agree everywhere except a single position where both are
    /// fixed to opposite values, returns their union.
    fn merge(&self, other: &Cube) -> Option<Cube> {
        let mut differing = None;
        for (i, (&a, &b)) in self.bits.iter().zip(other.bits.iter()).enumerate() {
            if a == b {
                continue;
            }
            if a == CubeBit::Free || b == CubeBit::Free || differing.is_some() {
                return None;
            }
            differing = Some(i);
        }
        differing.map(|i| {
            let mut merged = self.clone();
            merged.bits[i] = CubeBit::Free;
            merged
        })
    }
}

/// The cofactor of a cover with respect to fixing one position: cubes
/// excluded by the fixed value are dropped, the position becomes free in the
/// rest.
fn cofactor(cover: &[Cube], position: usize, value: CubeBit) -> Vec<Cube> {
    let opposite = match value {
        CubeBit::Zero => CubeBit::One,
        CubeBit::One => CubeBit::Zero,
        CubeBit::Free => unreachable!("cofactor against a fixed value"),
    };

    cover
        .iter()
        .filter(|cube| cube.get(position) != opposite)
        .map(|cube| {
            let mut cube = cube.clone();
            cube.set(position, CubeBit::Free);
            cube
        })
        .collect()
}

/// Position fixed in the largest number of cubes; splitting there shrinks
/// both cofactors fastest.
fn splitting_position(cover: &[Cube], width: usize) -> usize {
    let mut best = 0;
    let mut best_count = 0;
    for position in 0..width {
        let count = cover
            .iter()
            .filter(|cube| cube.get(position) != CubeBit::Free)
            .count();
        if count > best_count {
            best = position;
            best_count = count;
        }
    }
    best
}

/// Returns a merged cube cover of the complement of `cover` within
/// `{0,1}^width`, by Shannon expansion on the most-bound position.
pub fn complement(cover: &[Cube], width: usize) -> Vec<Cube> {
    merge_cover(complement_rec(cover, width))
}

fn complement_rec(cover: &[Cube], width: usize) -> Vec<Cube> {
    if cover.is_empty() {
        return vec![Cube::free(width)];
    }
    if cover.iter().any(Cube::is_tautology) {
        return Vec::new();
    }

    let position = splitting_position(cover, width);
    let mut result = Vec::new();

    for &value in &[CubeBit::Zero, CubeBit::One] {
        let sub = cofactor(cover, position, value);
        for mut cube in complement_rec(&sub, width) {
            cube.set(position, value);
            result.push(cube);
        }
    }

    result
}

/// Repeatedly joins adjacent cubes and drops cubes covered by another until
/// a fixpoint is reached. The result covers the same point set.
pub fn merge_cover(mut cover: Vec<Cube>) -> Vec<Cube> {
    loop {
        let mut changed = false;

        // Absorption.
        let mut kept: Vec<Cube> = Vec::with_capacity(cover.len());
        for cube in cover.drain(..) {
            if kept.iter().any(|other| other.covers(&cube)) {
                changed = true;
                continue;
            }
            kept.retain(|other| {
                let absorbed = cube.covers(other);
                changed |= absorbed;
                !absorbed
            });
            kept.push(cube);
        }
        cover = kept;

        // Adjacent joins.
        'outer: for i in 0..cover.len() {
            for j in (i + 1)..cover.len() {
                if let Some(merged) = cover[i].merge(&cover[j]) {
                    cover.swap_remove(j);
                    cover.swap_remove(i);
                    cover.push(merged);
                    changed = true;
                    break 'outer;
                }
            }
        }

        if !changed {
            return cover;
        }
    }
}
