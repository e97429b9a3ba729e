//! Generates MILP models of bit-based division property propagation through
//! a cipher circuit.

use std::fs;

use anyhow::{Context, Result};
use structopt::StructOpt;
use tracing::info;

use cryptamodel::modeller::DivisionPropertyModeller;
use cryptamodel::options::ModelOptions;
use cryptamodel::parser::ArtifactParser;
use cryptamodel::utility::parse_bit_assignments;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let options = ModelOptions::from_args();

    let json = fs::read_to_string(&options.input)
        .with_context(|| format!("could not read {}", options.input.display()))?;
    let (_parser, artifact) = ArtifactParser::parse(&json)?;

    let mut modeller = DivisionPropertyModeller::new();
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
                let result = modeller.traverse(expr)?;
                modeller.mark_output(&result);
            }
        }
    }

    info!(
        variables = modeller.model().num_variables(),
        constraints = modeller.model().num_constraints(),
        outputs = modeller.num_outputs(),
        "model built"
    );

    let (lp, output_names) = modeller.finalize();
    fs::write(&options.output, lp)
        .with_context(|| format!("could not write {}", options.output.display()))?;
    info!(
        path = %options.output.display(),
        outputs = output_names.join(" ").as_str(),
        "wrote LP model"
    );

    Ok(())
}
