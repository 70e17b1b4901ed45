use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment environment of a stack. `lve` is accepted as an alias of `prod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Stg,
    #[serde(alias = "lve")]
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Stg => "stg",
            Self::Prod => "prod",
        }
    }

    /// Context name understood by the spec store CLI.
    pub fn store_context(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Stg => "stg",
            Self::Prod => "lve",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "stg" => Ok(Self::Stg),
            "prod" | "lve" => Ok(Self::Prod),
            other => Err(format!("unknown environment '{other}', expected dev, stg or prod")),
        }
    }
}
