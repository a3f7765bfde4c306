//! Validation nodes
//!
//! Example:
//! ```yaml
//! - id: kyc
//!   type: validation
//!   validation:
//!     type: schema
//!     schema:
//!       required: [applicant.name, applicant.dateOfBirth]
//!       fields:
//!         income: { type: number, min: 0 }
//! ```

use tracing::warn;

use super::NodeRuntime;
use crate::engine::error::EngineError;
use crate::engine::result::{NodeResult, ValidationOutcome};
use crate::workflow::ValidationRule;

pub async fn execute_validation(
    node_id: &str,
    rule: Option<&ValidationRule>,
    runtime: &NodeRuntime<'_>,
) -> Result<NodeResult, EngineError> {
    let rule = rule.ok_or_else(|| EngineError::MissingConfiguration {
        node_id: node_id.to_string(),
        field: "validation",
    })?;

    // unknown validation never passes, whatever the validator
    if let ValidationRule::Unknown = rule {
        warn!("Node '{}' has an unrecognized validation type", node_id);
        return Ok(NodeResult::Validation(ValidationOutcome { is_valid: false }));
    }

    let validator = &runtime.collaborators.validator;
    let is_valid = runtime
        .call(node_id, validator.validate(rule, runtime.context))
        .await?;
    Ok(NodeResult::Validation(ValidationOutcome { is_valid }))
}
