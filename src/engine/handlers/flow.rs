//! Start and end nodes
//!
//! Both return the application payload verbatim. An end node additionally
//! stops its branch; that is decided by the traversal, not here.
//!
//! Example:
//! ```yaml
//! - id: start
//!   type: start
//! - id: done
//!   type: end
//!   label: Decision made
//! ```

use crate::engine::context::ExecutionContext;
use crate::engine::result::NodeResult;

pub fn execute_start(context: &ExecutionContext) -> NodeResult {
    NodeResult::Start(context.input().clone())
}

pub fn execute_end(context: &ExecutionContext) -> NodeResult {
    NodeResult::End(context.input().clone())
}
