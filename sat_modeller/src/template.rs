//! CNF templates of weighted propagation tables.
//!
//! A DDT or LAT cell `(a, b, value)` is admissible with a unary weight
//! pattern derived from the value; everything else is forbidden. The
//! template is a two-level cover of the forbidden combinations over
//! `input bits ++ output bits ++ weight bits`, so each cover cube directly
//! yields one CNF clause, instantiable against any block of the same table.

use cryptamodel::logic::{complement, Cube, CubeBit};
use cryptamodel::utility::floor_log2;

use crate::{Error, SatModel, Variable};

/// A position entry of a template clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    Unknown,
    Positive,
    Negative,
    NotTaken,
}

/// Clause patterns over `inputs ++ outputs ++ weights`.
#[derive(Clone, Debug)]
pub struct TableTemplate {
    clauses: Vec<Vec<Entry>>,
    input_width: usize,
    output_width: usize,
}

impl TableTemplate {
    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn output_width(&self) -> usize {
        self.output_width
    }

    /// The number of unary weight positions, equal to the output width.
    pub fn weight_width(&self) -> usize {
        self.output_width
    }

    pub fn clauses(&self) -> &[Vec<Entry>] {
        &self.clauses
    }
}

/// The probability weight of a DDT cell: `n - floor(log2 v)`.
pub fn ddt_weight(input_width: usize, value: i64) -> usize {
    input_width - floor_log2(value as u64)
}

/// The correlation weight of a LAT cell: `n - floor(log2 |v|) - 1`.
pub fn lat_weight(input_width: usize, value: i64) -> usize {
    input_width - floor_log2(value.abs() as u64) - 1
}

fn power_of_two_width(len: usize) -> Option<usize> {
    if len.is_power_of_two() && len > 1 {
        Some(floor_log2(len as u64))
    } else {
        None
    }
}

/// Builds the template of a table under a weight function. Positions follow
/// the wire order of the lookup: position `i` is bit `i` of the row index,
/// position `n + j` bit `j` of the column index; the trailing `m` weight
/// positions hold `m - w` zeros followed by `w` ones.
pub fn build_table_template<F>(table: &[Vec<i64>], weight_fn: F) -> Result<TableTemplate, Error>
where
    F: Fn(i64) -> usize,
{
    let rows = table.len();
    let cols = table.first().map(|row| row.len()).unwrap_or(0);
    let (input_width, output_width) = match (power_of_two_width(rows), power_of_two_width(cols)) {
        (Some(n), Some(m)) => (n, m),
        _ => return Err(Error::TableShape { rows, cols }),
    };
    let width = input_width + 2 * output_width;

    let mut minterms = Vec::new();
    for (a, row) in table.iter().enumerate() {
        for (b, &value) in row.iter().enumerate() {
            if value == 0 {
                continue;
            }
            let weight = weight_fn(value);
            if weight > output_width {
                return Err(Error::WeightOutOfRange {
                    weight,
                    positions: output_width,
                });
            }

            let mut cube = Cube::minterm(a as u64 | ((b as u64) << input_width), width);
            for k in 0..output_width {
                let position = input_width + output_width + k;
                if k >= output_width - weight {
                    cube.set(position, CubeBit::One);
                } else {
                    cube.set(position, CubeBit::Zero);
                }
            }
            minterms.push(cube);
        }
    }

    let clauses = complement(&minterms, width)
        .iter()
        .map(|cube| {
            cube.iter()
                .map(|bit| match bit {
                    CubeBit::Zero => Entry::Positive,
                    CubeBit::One => Entry::Negative,
                    CubeBit::Free => Entry::Unknown,
                })
                .collect()
        })
        .collect();

    Ok(TableTemplate {
        clauses,
        input_width,
        output_width,
    })
}

impl SatModel {
    /// Instantiates a template against concrete input and output variables.
    /// Fresh weight variables are allocated, one per weight position, and
    /// returned; one clause is emitted per template row.
    pub fn add_weight_table_clauses(
        &mut self,
        template: &TableTemplate,
        inputs: &[Variable],
        outputs: &[Variable],
    ) -> Result<Vec<Variable>, Error> {
        if inputs.len() != template.input_width() {
            return Err(Error::TemplateArity {
                expected: template.input_width(),
                got: inputs.len(),
            });
        }
        if outputs.len() != template.output_width() {
            return Err(Error::TemplateArity {
                expected: template.output_width(),
                got: outputs.len(),
            });
        }

        let n = template.input_width();
        let m = template.output_width();
        let weights = self.create_variables(template.weight_width(), "w");

        for row in template.clauses() {
            let mut clause = Vec::new();
            for (i, &entry) in row.iter().enumerate() {
                let var = if i < n {
                    inputs[i]
                } else if i < n + m {
                    outputs[i - n]
                } else {
                    weights[i - n - m]
                };
                match entry {
                    Entry::Positive => clause.push(var.into()),
                    Entry::Negative => clause.push(-var),
                    Entry::Unknown | Entry::NotTaken => {}
                }
            }
            self.add_clause(clause);
        }

        Ok(weights)
    }
}
