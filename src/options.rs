//! Command line options of the division-property model generator.

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Clone, StructOpt)]
#[structopt(
    name = "cryptamodel",
    about = "Generate division property MILP models of bit-level cipher circuits."
)]
pub struct ModelOptions {
    /**
    Input file containing the circuit description in JSON format.
    */
    #[structopt(parse(from_os_str))]
    pub input: PathBuf,

    #[structopt(short = "I", long = "active-bits", default_value = "")]
    /**
    Initial division property, given as "name1=range;name2=range;...". A range is a
    comma separated list of bit indices or spans, e.g. "0,2,4-7". Bits of listed
    registers that are not in the range start with property 0; unlisted registers
    are left unconstrained.
    */
    pub active_bits: String,

    #[structopt(short = "O", long = "output-bits")]
    /**
    Output bits to model, in the same format as --active-bits. Defaults to every
    bit of every output.
    */
    pub output_bits: Option<String>,

    #[structopt(short = "o", long = "output", default_value = "output.lp", parse(from_os_str))]
    /**
    Path of the generated LP file.
    */
    pub output: PathBuf,
}
