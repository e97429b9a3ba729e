//! Types of propagation properties the generator can model.

use std::str::FromStr;

/// Types of properties currently representable.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum PropertyType {
    /// Linear approximations.
    Linear,
    /// Differentials.
    Differential,
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(PropertyType::Linear),
            "differential" => Ok(PropertyType::Differential),
            _ => Err(String::from("Unknown property type.")),
        }
    }
}
