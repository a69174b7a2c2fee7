use serde::{Deserialize, Serialize};

/// A parsed access chain, e.g. `user?.emails[0]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One step of an access chain. The first step is always an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Identifier {
        identifier: String,
    },
    /// `.property`; `safe` propagates null from a null base.
    Member {
        property: String,
        #[serde(default)]
        safe: bool,
    },
    /// `[index]`; `safe` also propagates null when the base is too short.
    Index {
        index: usize,
        #[serde(default)]
        safe: bool,
    },
}

impl Step {
    pub fn is_safe(&self) -> bool {
        match self {
            Step::Identifier { .. } => false,
            Step::Member { safe, .. } | Step::Index { safe, .. } => *safe,
        }
    }
}

impl Expression {
    /// Build an expression that is a single identifier.
    pub fn ident(name: impl Into<String>) -> Self {
        Self {
            steps: vec![Step::Identifier {
                identifier: name.into(),
            }],
        }
    }

    /// Append a member step.
    pub fn member(mut self, property: impl Into<String>, safe: bool) -> Self {
        self.steps.push(Step::Member {
            property: property.into(),
            safe,
        });
        self
    }

    /// Append an index step.
    pub fn index(mut self, index: usize, safe: bool) -> Self {
        self.steps.push(Step::Index { index, safe });
        self
    }

    /// Root identifier, if the chain is well formed.
    pub fn root(&self) -> Option<&str> {
        match self.steps.first() {
            Some(Step::Identifier { identifier }) => Some(identifier),
            _ => None,
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for step in &self.steps {
            match step {
                Step::Identifier { identifier } => write!(f, "{}", identifier)?,
                Step::Member { property, safe } => {
                    if *safe {
                        write!(f, "?")?;
                    }
                    write!(f, ".{}", property)?;
                }
                Step::Index { index, safe } => {
                    if *safe {
                        write!(f, "?")?;
                    }
                    write!(f, "[{}]", index)?;
                }
            }
        }
        Ok(())
    }
}
