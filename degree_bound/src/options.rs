//! Command line options of the degree bounder.

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Clone, StructOpt)]
#[structopt(
    name = "degree_bound",
    about = "Bound the algebraic degree of circuit output bits by numeric mapping."
)]
pub struct BoundOptions {
    /**
    Input file containing the circuit description in JSON format.
    */
    #[structopt(parse(from_os_str))]
    pub input: PathBuf,

    #[structopt(short = "d", long = "input-degree", default_value = "")]
    /**
    Known degrees of the input registers, given as
    "name1=value1,name2=value2,...".
    */
    pub input_degree: String,

    #[structopt(short = "D", long = "default-input-degree", default_value = "0")]
    /**
    Degree assumed for input registers not listed in --input-degree.
    */
    pub default_input_degree: i64,

    #[structopt(long = "expand", default_value = "1")]
    /**
    Number of times state reads inside high-degree monomials are substituted
    by their update expressions before a bound is taken.
    */
    pub expand: usize,
}
