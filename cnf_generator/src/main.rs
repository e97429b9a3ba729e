//! Generates CNF models of differential and linear trails through a cipher
//! circuit.

mod modeller;
mod options;
mod property;

use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use structopt::StructOpt;
use tracing::info;

use cryptamodel::parser::ArtifactParser;
use cryptamodel::utility::parse_bit_assignments;

use crate::modeller::TrailModeller;
use crate::options::GeneratorOptions;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let options = GeneratorOptions::from_args();

    let json = std::fs::read_to_string(&options.input)
        .with_context(|| format!("could not read {}", options.input.display()))?;
    let (_parser, artifact) = ArtifactParser::parse(&json)?;

    let mut modeller = TrailModeller::new(options.property_type)?;
    for (name, bits) in parse_bit_assignments(&options.active_bits).map_err(anyhow::Error::msg)? {
        modeller.add_active_bits(name, bits);
    }

    let output_bits = match &options.output_bits {
        Some(text) => Some(parse_bit_assignments(text).map_err(anyhow::Error::msg)?),
        None => None,
    };

    for output in &artifact.outputs {
        info!(output = output.name.as_str(), size = output.size, "traversing output");
        for (offset, expr) in output.expressions.iter().enumerate() {
            let selected = match &output_bits {
                Some(map) => map
                    .get(&output.name)
                    .map(|bits| bits.is_empty() || bits.contains(&offset))
                    .unwrap_or(false),
                None => true,
            };
            if selected {
                modeller.traverse(expr)?;
            }
        }
    }

    modeller.assure_input_active();
    modeller.bound_weight(options.max_weight)?;

    info!(
        variables = modeller.model().num_variables(),
        clauses = modeller.model().num_clauses(),
        inputs = modeller.num_input_vars(),
        weights = modeller.num_weight_vars(),
        "model built"
    );

    let file = File::create(&options.output)
        .with_context(|| format!("could not write {}", options.output.display()))?;
    modeller
        .into_model()
        .write_dimacs(&mut BufWriter::new(file))?;
    info!(path = %options.output.display(), "wrote DIMACS model");

    Ok(())
}
