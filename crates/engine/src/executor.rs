//! The execution engine.
//!
//! `FlowEngine` is the central orchestrator and the sole writer of execution
//! state:
//! 1. Creates the execution record, then snapshots the flow graph.
//! 2. Walks the graph depth-first from the start node, dispatching each step
//!    through the node executors.
//! 3. Appends one audit log row per step and persists the step pointer and
//!    merged context before the next node runs.
//! 4. Bounds every executor invocation with a timeout, retries retryable
//!    adapter failures with exponential back-off, and enforces a step
//!    ceiling so authored cycles cannot run forever.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use nodes::{executor as node_executor, mock, AdapterSet, Context, ExecutionScope, NodeOutcome};

use crate::graph::FlowGraph;
use crate::models::{ExecutionLog, ExecutionStatus, FlowExecution, FlowNode, LogStatus};
use crate::store::{ExecutionLogStore, ExecutionStore, FlowStore};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ceiling on executed steps per run; trips `MaxStepsExceeded` on
    /// authored cycles.
    pub max_steps: usize,
    /// Deadline for a single node executor invocation.
    pub node_timeout: Duration,
    /// Maximum number of times a retryable adapter failure is retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            node_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of a dry run: the final execution record plus its full step trail.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub execution: FlowExecution,
    pub logs: Vec<ExecutionLog>,
}

/// One pending branch during traversal. Sibling branches each start from the
/// parent's merged context snapshot.
struct Frame {
    node_id: String,
    context: Context,
}

// ---------------------------------------------------------------------------
// FlowEngine
// ---------------------------------------------------------------------------

/// Orchestrator for flow executions.
///
/// Construct once at startup and share; per-execution state lives entirely
/// in the stores, so concurrent runs of different executions are fine.
pub struct FlowEngine {
    flows: Arc<dyn FlowStore>,
    executions: Arc<dyn ExecutionStore>,
    logs: Arc<dyn ExecutionLogStore>,
    adapters: AdapterSet,
    test_adapters: AdapterSet,
    config: EngineConfig,
}

impl FlowEngine {
    pub fn new(
        flows: Arc<dyn FlowStore>,
        executions: Arc<dyn ExecutionStore>,
        logs: Arc<dyn ExecutionLogStore>,
        adapters: AdapterSet,
        config: EngineConfig,
    ) -> Self {
        Self {
            flows,
            executions,
            logs,
            adapters,
            test_adapters: mock::mock_adapters(),
            config,
        }
    }

    /// Swap the adapter set used by [`FlowEngine::test_execution`].
    pub fn with_test_adapters(mut self, adapters: AdapterSet) -> Self {
        self.test_adapters = adapters;
        self
    }

    /// Snapshot a flow's structure into an immutable graph.
    pub async fn load_graph(&self, flow_id: Uuid) -> Result<FlowGraph, EngineError> {
        let nodes = self.flows.get_nodes(flow_id).await?;
        let edges = self.flows.get_edges(flow_id).await?;
        FlowGraph::new(flow_id, nodes, edges)
    }

    /// Create the execution record and locate the start node, without
    /// running anything yet.
    ///
    /// The record is created before the graph loads (so a malformed graph
    /// leaves a `failed` row rather than nothing), and the returned
    /// execution points at the start node. Callers that want an immediate
    /// response hand the pair to [`FlowEngine::run`] in a spawned task.
    pub async fn initiate(
        &self,
        flow_id: Uuid,
        whatsapp_number_id: &str,
        contact_number: &str,
        initial_context: Context,
    ) -> Result<(FlowGraph, FlowExecution), EngineError> {
        let execution =
            FlowExecution::new(flow_id, whatsapp_number_id, contact_number, initial_context);
        self.initiate_execution(execution).await
    }

    async fn initiate_execution(
        &self,
        execution: FlowExecution,
    ) -> Result<(FlowGraph, FlowExecution), EngineError> {
        let mut execution = self.executions.create(execution).await?;

        let graph = match self.load_graph(execution.flow_id).await {
            Ok(graph) => graph,
            Err(err) => {
                // Don't leave the row dangling in `running`.
                let _ = self
                    .executions
                    .update_status(execution.id, ExecutionStatus::Failed)
                    .await;
                return Err(err);
            }
        };

        let start_id = graph.start_node().node_id.clone();
        self.executions
            .update_step(execution.id, &start_id, &execution.context)
            .await?;
        execution.current_node_id = Some(start_id);
        Ok((graph, execution))
    }

    /// Create an execution and run it to completion.
    #[instrument(skip(self, initial_context), fields(flow_id = %flow_id))]
    pub async fn start_execution(
        &self,
        flow_id: Uuid,
        whatsapp_number_id: &str,
        contact_number: &str,
        initial_context: Context,
    ) -> Result<FlowExecution, EngineError> {
        let (graph, execution) = self
            .initiate(flow_id, whatsapp_number_id, contact_number, initial_context)
            .await?;
        self.run(&graph, execution, None).await
    }

    /// Dry run: same traversal, mock adapters, synchronous, and the step
    /// trail is returned even when the run fails.
    #[instrument(skip(self, context), fields(flow_id = %flow_id))]
    pub async fn test_execution(
        &self,
        flow_id: Uuid,
        input_message: &str,
        contact_number: &str,
        context: Context,
    ) -> Result<TestResult, EngineError> {
        let mut context = context;
        context.insert("message".into(), json!(input_message));

        let mut execution = FlowExecution::new(flow_id, "test", contact_number, context);
        execution.metadata.insert("test".into(), json!(true));

        let (graph, execution) = self.initiate_execution(execution).await?;
        let execution_id = execution.id;

        let adapters = self.test_adapters.clone();
        let execution = match self.run(&graph, execution, Some(&adapters)).await {
            Ok(execution) => execution,
            // Node failures still produce a report; the record is failed and
            // the trail shows where.
            Err(EngineError::Store(err)) => return Err(EngineError::Store(err)),
            Err(_) => self.executions.get(execution_id).await?,
        };

        let logs = self.logs.list(execution_id).await?;
        Ok(TestResult { execution, logs })
    }

    /// Flip a running execution to paused. Takes effect at the next step
    /// boundary; the traversal re-reads persisted status before every step.
    pub async fn pause_execution(&self, id: Uuid) -> Result<FlowExecution, EngineError> {
        let mut execution = self.executions.get(id).await?;
        if execution.status != ExecutionStatus::Running {
            return Err(EngineError::InvalidTransition {
                execution_id: id,
                status: execution.status,
                operation: "pause",
            });
        }
        self.executions
            .update_status(id, ExecutionStatus::Paused)
            .await?;
        execution.status = ExecutionStatus::Paused;
        info!(execution_id = %id, "execution paused");
        Ok(execution)
    }

    /// Resume a paused execution: back to running, re-entering the traversal
    /// at `current_node_id` with the persisted context.
    ///
    /// The current node is executed again, so side effects there are
    /// at-least-once across a pause/resume pair.
    pub async fn resume_execution(&self, id: Uuid) -> Result<FlowExecution, EngineError> {
        let mut execution = self.executions.get(id).await?;
        if execution.status != ExecutionStatus::Paused {
            return Err(EngineError::InvalidTransition {
                execution_id: id,
                status: execution.status,
                operation: "resume",
            });
        }

        let graph = self.load_graph(execution.flow_id).await?;
        self.executions
            .update_status(id, ExecutionStatus::Running)
            .await?;
        execution.status = ExecutionStatus::Running;
        info!(execution_id = %id, "execution resumed");
        self.run(&graph, execution, None).await
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Walk the graph depth-first from the execution's current node.
    ///
    /// Each iteration executes one node, logs it, persists state, and pushes
    /// the resolved next nodes. Fan-out runs branches sequentially, first
    /// edge first; the first terminal node completes the whole execution.
    #[instrument(skip_all, fields(execution_id = %execution.id, flow_id = %execution.flow_id))]
    pub async fn run(
        &self,
        graph: &FlowGraph,
        mut execution: FlowExecution,
        adapters: Option<&AdapterSet>,
    ) -> Result<FlowExecution, EngineError> {
        let adapters = adapters.unwrap_or(&self.adapters);
        let scope = ExecutionScope {
            flow_id: execution.flow_id,
            execution_id: execution.id,
            channel_id: execution.whatsapp_number_id.clone(),
            contact: execution.contact_number.clone(),
        };

        let entry = execution
            .current_node_id
            .clone()
            .unwrap_or_else(|| graph.start_node().node_id.clone());
        let mut stack = vec![Frame {
            node_id: entry,
            context: execution.context.clone(),
        }];
        let mut steps = 0usize;

        while let Some(frame) = stack.pop() {
            // External state wins: a pause or terminal status written by
            // another actor stops the traversal at this step boundary.
            let persisted = self.executions.get(execution.id).await?;
            if persisted.status != ExecutionStatus::Running {
                info!(status = %persisted.status, "traversal stopped by external status change");
                return Ok(persisted);
            }

            if steps >= self.config.max_steps {
                let err = EngineError::MaxStepsExceeded {
                    limit: self.config.max_steps,
                };
                self.fail_step(&mut execution, &frame.node_id, "max_steps", &frame.context, &err, 0)
                    .await?;
                return Err(err);
            }
            steps += 1;

            let node = match graph.node(&frame.node_id) {
                Ok(node) => node,
                Err(err) => {
                    self.fail_step(
                        &mut execution,
                        &frame.node_id,
                        "resolve_node",
                        &frame.context,
                        &err,
                        0,
                    )
                    .await?;
                    return Err(err);
                }
            };

            execution.current_node_id = Some(node.node_id.clone());
            self.executions
                .update_step(execution.id, &node.node_id, &frame.context)
                .await?;

            let action = format!("execute_{}", node.kind.tag());
            let started = Instant::now();
            let attempt = self
                .execute_with_retry(node, &scope, &frame.context, adapters)
                .await;
            let duration_ms = started.elapsed().as_millis() as i64;

            let (outcome, retries) = match attempt {
                Ok(pair) => pair,
                Err(err) => {
                    self.fail_step(
                        &mut execution,
                        &node.node_id,
                        &action,
                        &frame.context,
                        &err,
                        duration_ms,
                    )
                    .await?;
                    return Err(err);
                }
            };

            let mut output = outcome.output.clone();
            if retries > 0 {
                output.insert("retries".into(), json!(retries));
            }

            let status = if outcome.warning.is_some() {
                LogStatus::Warning
            } else {
                LogStatus::Success
            };
            if let Some(warning) = &outcome.warning {
                warn!(node_id = %node.node_id, warning = %warning, "step degraded");
            }
            self.logs
                .append(ExecutionLog::step(
                    execution.id,
                    &node.node_id,
                    &action,
                    &frame.context,
                    Some(output.clone()),
                    status,
                    outcome.warning.clone(),
                    duration_ms,
                ))
                .await?;

            // Shallow merge, later keys win.
            let mut merged = frame.context;
            for (key, value) in output {
                merged.insert(key, value);
            }
            execution.context = merged.clone();
            self.executions
                .update_step(execution.id, &node.node_id, &merged)
                .await?;

            if outcome.terminal {
                self.executions
                    .update_status(execution.id, ExecutionStatus::Completed)
                    .await?;
                execution.status = ExecutionStatus::Completed;
                info!(steps, "execution completed");
                return Ok(execution);
            }

            let handle = outcome.selected_handle.as_deref();
            let next = graph.matching_edges(&node.node_id, handle);
            if next.is_empty() {
                let err = EngineError::NoMatchingEdge {
                    node_id: node.node_id.clone(),
                    handle: handle.map(str::to_string),
                };
                self.fail_step(&mut execution, &node.node_id, "resolve_edge", &merged, &err, 0)
                    .await?;
                return Err(err);
            }
            for edge in next.iter().rev() {
                stack.push(Frame {
                    node_id: edge.target.clone(),
                    context: merged.clone(),
                });
            }
        }

        // Every loop iteration either returns or pushes a frame, so draining
        // the stack means the graph produced no terminal node at all.
        let err = EngineError::InvalidGraph("traversal ended without an end node".into());
        self.executions
            .update_status(execution.id, ExecutionStatus::Failed)
            .await?;
        Err(err)
    }

    /// Execute one node, bounding each invocation by the configured timeout
    /// and retrying retryable adapter failures with exponential back-off.
    /// Returns the outcome together with the number of retries it took.
    async fn execute_with_retry(
        &self,
        node: &FlowNode,
        scope: &ExecutionScope,
        context: &Context,
        adapters: &AdapterSet,
    ) -> Result<(NodeOutcome, u32), EngineError> {
        let mut attempts = 0u32;

        loop {
            let call = node_executor::execute(&node.kind, scope, context, adapters);
            let result = match tokio::time::timeout(self.config.node_timeout, call).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(EngineError::NodeTimeout {
                        node_id: node.node_id.clone(),
                        timeout: self.config.node_timeout,
                    })
                }
            };

            match result {
                Ok(outcome) => return Ok((outcome, attempts)),

                Err(err) if err.is_retryable() => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(EngineError::Node {
                            node_id: node.node_id.clone(),
                            source: err,
                        });
                    }

                    let delay =
                        self.config.retry_base_delay * 2u32.pow(attempts.saturating_sub(1));
                    warn!(
                        node_id = %node.node_id,
                        attempt = attempts,
                        max = self.config.max_retries,
                        ?delay,
                        error = %err,
                        "retryable node error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }

                Err(err) => {
                    return Err(EngineError::Node {
                        node_id: node.node_id.clone(),
                        source: err,
                    })
                }
            }
        }
    }

    /// Record a failed step: error log row first, then the terminal status,
    /// so the trail is consistent if anything crashes in between.
    async fn fail_step(
        &self,
        execution: &mut FlowExecution,
        node_id: &str,
        action: &str,
        input: &Context,
        err: &EngineError,
        duration_ms: i64,
    ) -> Result<(), EngineError> {
        error!(node_id, error = %err, "flow step failed");
        self.logs
            .append(ExecutionLog::step(
                execution.id,
                node_id,
                action,
                input,
                None,
                LogStatus::Error,
                Some(err.to_string()),
                duration_ms,
            ))
            .await?;
        self.executions
            .update_status(execution.id, ExecutionStatus::Failed)
            .await?;
        execution.status = ExecutionStatus::Failed;
        Ok(())
    }
}
