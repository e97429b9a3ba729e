//! Command line options of the CNF trail generator.

use std::path::PathBuf;

use structopt::StructOpt;

use crate::property::PropertyType;

#[derive(Clone, StructOpt)]
#[structopt(
    name = "cnf_generator",
    about = "Generate CNF models of differential and linear trails of bit-level cipher circuits."
)]
pub struct GeneratorOptions {
    /**
    Input file containing the circuit description in JSON format.
    */
    #[structopt(parse(from_os_str))]
    pub input: PathBuf,

    #[structopt(short = "t", long = "type")]
    /**
    The type of property to model. Currently supported are:
    linear, differential
    */
    pub property_type: PropertyType,

    #[structopt(short = "I", long = "active-bits", default_value = "")]
    /**
    Input registers modelled as free variables, given as
    "name1=range;name2=range;...". A range is a comma separated list of bit
    indices or spans, e.g. "0,2,4-7"; an empty range selects the whole
    register. Unlisted registers carry no difference or mask.
    */
    pub active_bits: String,

    #[structopt(short = "O", long = "output-bits")]
    /**
    Output bits to model, in the same format as --active-bits. Defaults to
    every bit of every output.
    */
    pub output_bits: Option<String>,

    #[structopt(short = "w", long = "max-weight", default_value = "63")]
    /**
    Upper bound on the total propagation weight of the trail.
    */
    pub max_weight: usize,

    #[structopt(short = "o", long = "output", default_value = "output.cnf", parse(from_os_str))]
    /**
    Path of the generated DIMACS file.
    */
    pub output: PathBuf,
}
