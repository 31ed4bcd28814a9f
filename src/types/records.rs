//! Typed pipeline records carried on the bus.
//!
//! Topic names and payload types are a contract between producer and
//! consumer pairs: the `objectives` topic carries [`Objective`] records,
//! consumed by the planning stage to emit [`Blueprint`] records onto the
//! `blueprints` topic. The business logic that maps one to the other is
//! not part of this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::envelope::Record;

/// A high-level goal injected at the top of the pipeline.
///
/// # Examples
///
/// ```
/// use swarmlink::types::{Objective, Record};
///
/// let objective = Objective {
///     id: "OBJ-1".to_string(),
///     description: "expand into new markets".to_string(),
/// };
/// assert_eq!(objective.record_id(), "OBJ-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    /// Producer-assigned unique id, stable across retries.
    pub id: String,

    /// Human-readable goal description.
    #[serde(default)]
    pub description: String,
}

impl Record for Objective {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// A technical plan derived from an [`Objective`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    /// Producer-assigned unique id, stable across retries.
    pub id: String,

    /// Id of the objective this blueprint was derived from.
    #[serde(default)]
    pub objective_id: String,

    /// Free-form plan document (task list, parameters).
    #[serde(default)]
    pub doc: Value,
}

impl Record for Blueprint {
    fn record_id(&self) -> &str {
        &self.id
    }
}
