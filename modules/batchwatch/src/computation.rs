//! Computation Registry: computed-property rules evaluated during a commit.
//!
//! Two kinds of rule exist:
//! - derive-from: one computed property recomputed when any of its sources change.
//! - derive-to: one triggering property producing a batch of derived properties.
//!
//! Rules run in registration order. Each rule sees the outputs of the rules
//! before it, so a rule may only depend on properties computed by rules
//! registered earlier.

use serde_json::Value;
use tracing::trace;

use crate::error::{Result, StoreError};
use crate::value::{merge, PropertyMap, ValueStore};

pub type DeriveFromFn = Box<dyn Fn(&PropertyMap) -> anyhow::Result<Value>>;
pub type DeriveToFn = Box<dyn Fn(&PropertyMap) -> anyhow::Result<Option<PropertyMap>>>;

enum Rule {
    From {
        computed: String,
        sources: Vec<String>,
        derive: DeriveFromFn,
    },
    To {
        trigger: String,
        derive: DeriveToFn,
    },
}

impl Rule {
    fn is_derive_from(&self, name: &str) -> bool {
        matches!(self, Rule::From { computed, .. } if computed == name)
    }

    fn is_derive_to(&self, name: &str) -> bool {
        matches!(self, Rule::To { trigger, .. } if trigger == name)
    }
}

/// Ordered set of computation rules.
#[derive(Default)]
pub struct ComputationRegistry {
    rules: Vec<Rule>,
}

impl ComputationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a derive-from rule. Replaces any existing rule for `computed`;
    /// the new rule takes the last position in evaluation order.
    pub fn register_derive_from(
        &mut self,
        computed: impl Into<String>,
        sources: Vec<String>,
        derive: DeriveFromFn,
    ) {
        let computed = computed.into();
        self.rules.retain(|rule| !rule.is_derive_from(&computed));
        self.rules.push(Rule::From {
            computed,
            sources,
            derive,
        });
    }

    /// Register a derive-to rule. Replaces any existing rule for `trigger`;
    /// the new rule takes the last position in evaluation order.
    pub fn register_derive_to(&mut self, trigger: impl Into<String>, derive: DeriveToFn) {
        let trigger = trigger.into();
        self.rules.retain(|rule| !rule.is_derive_to(&trigger));
        self.rules.push(Rule::To { trigger, derive });
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule against `proposed` and return only the derived entries.
    ///
    /// A source or trigger counts as changed when it is a key of the proposed
    /// data (explicit or derived earlier in this pass) and its value differs
    /// from `current`. Derive functions receive the stored snapshot overlaid
    /// with everything proposed so far.
    pub fn evaluate(&self, proposed: &PropertyMap, current: &ValueStore) -> Result<PropertyMap> {
        let mut data = proposed.clone();
        let mut working = current.snapshot();
        merge(&mut working, &data);
        let mut derived = PropertyMap::new();

        let changed = |data: &PropertyMap, name: &str| -> bool {
            data.get(name).is_some_and(|value| current.differs(name, value))
        };

        for rule in &self.rules {
            match rule {
                Rule::From {
                    computed,
                    sources,
                    derive,
                } => {
                    if data.contains_key(computed) {
                        trace!(
                            computed = computed.as_str(),
                            "Computed property committed directly, skipping"
                        );
                        continue;
                    }
                    let Some(cause) = sources
                        .iter()
                        .find(|source| changed(&data, source.as_str()))
                    else {
                        continue;
                    };
                    trace!(
                        computed = computed.as_str(),
                        source = cause.as_str(),
                        "Deriving computed property"
                    );
                    let value = derive(&working).map_err(|source| StoreError::Derivation {
                        property: computed.clone(),
                        source,
                    })?;
                    derived.insert(computed.clone(), value.clone());
                    data.insert(computed.clone(), value.clone());
                    working.insert(computed.clone(), value);
                }
                Rule::To { trigger, derive } => {
                    if !changed(&data, trigger.as_str()) {
                        continue;
                    }
                    let output = derive(&working).map_err(|source| StoreError::Derivation {
                        property: trigger.clone(),
                        source,
                    })?;
                    let Some(output) = output.filter(|output| !output.is_empty()) else {
                        continue;
                    };
                    trace!(
                        trigger = trigger.as_str(),
                        derived = output.len(),
                        "Derived properties from trigger"
                    );
                    merge(&mut derived, &output);
                    merge(&mut data, &output);
                    merge(&mut working, &output);
                }
            }
        }

        Ok(derived)
    }
}
