//! Data source nodes
//!
//! Fetch a key/value payload through the data fetcher and merge it into the
//! shared output data. Concurrent branches writing the same key resolve
//! last-write-wins; each merge is atomic under the context lock.
//!
//! Example:
//! ```yaml
//! - id: bureau
//!   type: data_source
//!   data_source:
//!     type: api
//!     endpoint: /bureau/score
//!     method: GET
//! ```

use std::time::Instant;
use tracing::{debug, warn};

use super::NodeRuntime;
use crate::engine::error::EngineError;
use crate::engine::result::{DataOutcome, NodeResult};
use crate::workflow::DataSource;

pub async fn execute_data_source(
    node_id: &str,
    source: Option<&DataSource>,
    runtime: &NodeRuntime<'_>,
) -> Result<NodeResult, EngineError> {
    let source = source.ok_or_else(|| EngineError::MissingConfiguration {
        node_id: node_id.to_string(),
        field: "data_source",
    })?;

    if let DataSource::Unknown = source {
        warn!("Node '{}' has an unrecognized data source type", node_id);
        return Ok(NodeResult::DataSource(DataOutcome::Unknown));
    }

    let fetcher = &runtime.collaborators.fetcher;
    let started = Instant::now();
    let fetched = runtime.call(node_id, fetcher.fetch(source, runtime.context)).await;
    runtime
        .context
        .record_data_source_time(node_id, started.elapsed());
    let data = fetched?;

    debug!(
        "Node '{}' fetched {} field(s) from {} source",
        node_id,
        data.len(),
        source.type_name()
    );
    runtime.context.merge_output(&data);
    Ok(NodeResult::DataSource(DataOutcome::Fetched(data)))
}
