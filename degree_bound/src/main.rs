//! Prints an upper bound on the algebraic degree of every output bit of a
//! cipher circuit.

mod mapping;
mod options;

use anyhow::{Context, Result};
use fnv::FnvHashMap;
use structopt::StructOpt;
use tracing::info;

use cryptamodel::parser::ArtifactParser;

use crate::mapping::DegreeMapper;
use crate::options::BoundOptions;

/// Parses "name1=value1,name2=value2,...".
fn parse_input_degrees(text: &str) -> Result<FnvHashMap<String, i64>> {
    let mut result = FnvHashMap::default();
    for item in text.split(',').filter(|item| !item.is_empty()) {
        let pos = item
            .find('=')
            .with_context(|| format!("expected name=value, got '{}'", item))?;
        let value = item[pos + 1..]
            .parse()
            .with_context(|| format!("invalid degree in '{}'", item))?;
        result.insert(item[..pos].to_string(), value);
    }
    Ok(result)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let options = BoundOptions::from_args();

    let json = std::fs::read_to_string(&options.input)
        .with_context(|| format!("could not read {}", options.input.display()))?;
    let (_parser, artifact) = ArtifactParser::parse(&json)?;

    let input_degrees = parse_input_degrees(&options.input_degree)?;
    let mut mapper = DegreeMapper::new(input_degrees, options.default_input_degree, options.expand);

    let mut bounds = Vec::new();
    for output in &artifact.outputs {
        info!(output = output.name.as_str(), size = output.size, "bounding output");
        for expr in &output.expressions {
            // The zero polynomial is reported as -1.
            bounds.push(mapper.output_bound(expr)?.max(-1));
        }
    }

    let rendered: Vec<String> = bounds.iter().map(|bound| bound.to_string()).collect();
    println!("{}", rendered.join(","));

    Ok(())
}
