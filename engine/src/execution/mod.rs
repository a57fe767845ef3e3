//! Graph execution.
//!
//! An [`Execution`] walks the operation graph depth-first from the root,
//! running one [`Operation`] per node. Children are visited in `out` order.
//! Two things can grow the graph while it is walked:
//!
//! - **Unroll**: when a node extracts several records, its subtree is copied
//!   once per extra record and the copy carries that record.
//! - **Result mapping**: when the target hands records back from `load` and
//!   the node declares a `resultMapping`, a reversed node is added and run
//!   right away for every returned record.
//!
//! `begin`/`end` on the target bracket the whole run. When an operation
//! fails, `end` is never called.

pub mod formula;
pub mod operation;

pub use formula::{
    FormulaEvaluator, LocaleGuard, LocaleScope, LocaleSettings, SubstitutionEvaluator, Variables,
};
pub use operation::{Operation, OperationConfig, OperationOutcome};

use std::collections::HashMap;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{ExecutionError, ExecutionResult, OperationError, PlanResult};
use crate::graph::{Graph, NodeId, ROOT};
use crate::integration::Integration;
use crate::logs::OperationLog;
use crate::models::{Record, RecordKey, RecordLocators};

pub struct Execution<'a> {
    id: Uuid,
    graph: Graph,
    source: &'a mut dyn Integration,
    target: &'a mut dyn Integration,
    evaluator: Box<dyn FormulaEvaluator + 'a>,
    locale: LocaleScope,
    /// Records handed to unrolled copies, by node id
    pending: HashMap<NodeId, Record>,
    log: OperationLog,
}

impl<'a> Execution<'a> {
    pub fn new(
        graph: Graph,
        source: &'a mut dyn Integration,
        target: &'a mut dyn Integration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            graph,
            source,
            target,
            evaluator: Box::new(SubstitutionEvaluator),
            locale: LocaleScope::default(),
            pending: HashMap::new(),
            log: OperationLog::new(),
        }
    }

    /// Parse `plan` (or start from an empty graph) and set up an execution.
    pub fn from_plan(
        plan: Option<&str>,
        source: &'a mut dyn Integration,
        target: &'a mut dyn Integration,
    ) -> PlanResult<Self> {
        Ok(Self::new(Graph::parse(plan)?, source, target))
    }

    pub fn with_evaluator(mut self, evaluator: impl FormulaEvaluator + 'a) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Use the configured locale and timezone as the formula defaults.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.locale = LocaleScope::new(LocaleSettings::new(
            config.default_locale.clone(),
            config.default_time_zone.clone(),
        ));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Everything logged so far, including entries of a failed operation.
    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Run the whole graph inside one target transaction.
    pub fn run(&mut self, source_scope: Option<RecordKey>) -> ExecutionResult<()> {
        let span = tracing::info_span!("execution", id = %self.id);
        let _enter = span.enter();

        tracing::info!(nodes = self.graph.len(), "Execution started");
        self.target.begin()?;
        self.run_transaction(ROOT, source_scope, None)?;
        self.target.end()?;
        tracing::info!(nodes = self.graph.len(), "Execution finished");
        Ok(())
    }

    fn run_transaction(
        &mut self,
        id: NodeId,
        source_scope: Option<RecordKey>,
        target_scope: Option<RecordKey>,
    ) -> ExecutionResult<()> {
        if self.graph.is_visited(id) {
            return Ok(());
        }

        let (source_scope, target_scope) = if id == ROOT {
            self.graph.mark_visited(id);
            (source_scope, target_scope)
        } else {
            let config = OperationConfig::from_node(self.graph.node(id)?);
            let pre_extracted = self.pending.remove(&id);

            let mut operation = Operation::new(
                config,
                &mut *self.source,
                &mut *self.target,
                &*self.evaluator,
                &self.locale,
            );
            let result = operation.run(source_scope.as_ref(), target_scope.as_ref(), pre_extracted);
            self.log.append(&mut operation.take_log());

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(OperationError::EmptyRecord) => return Ok(()),
                Err(source) => {
                    self.log.error(id, source.to_string());
                    return Err(ExecutionError::Operation { node: id, source });
                }
            };
            // nodes that extracted nothing stay open for their other parents
            self.graph.mark_visited(id);

            self.process_result(&outcome, id)?;
            (outcome.extracted_key().cloned(), outcome.loaded_key)
        };

        let mut index = 0;
        while let Some(child) = self.graph.node(id)?.out.get(index).copied() {
            self.run_transaction(child, source_scope.clone(), target_scope.clone())?;
            index += 1;
        }
        Ok(())
    }

    fn process_result(&mut self, outcome: &OperationOutcome, id: NodeId) -> ExecutionResult<()> {
        // unroll: one subtree copy per extra record
        for (index, record) in outcome.extracted.iter().enumerate().skip(1) {
            let copy = self.graph.copy(id, None)?;
            if let Some(target) = self
                .graph
                .node_mut(copy)?
                .record_locators
                .as_mut()
                .and_then(|locators| locators.target.as_mut())
            {
                target.set_index(index as i64);
            }
            self.pending.insert(copy, record.clone());
        }
        if outcome.extracted.len() > 1 {
            self.log.info(
                id,
                format!("Unrolled {} extra record(s)", outcome.extracted.len() - 1),
            );
        }

        let node = self.graph.node(id)?;
        let returned = outcome.returned.as_deref().unwrap_or_default();
        if node.result_mapping.is_empty() || returned.is_empty() {
            return Ok(());
        }

        let record_locators = node.record_locators.as_ref().map(RecordLocators::reversed);
        let result_mapping = node.result_mapping.clone();
        let reversed_id = self.graph.add_node_after(id)?;
        {
            let reversed = self.graph.node_mut(reversed_id)?;
            reversed.record_locators = record_locators;
            reversed.mapping = result_mapping;
        }
        self.graph.mark_visited(reversed_id);

        let config = OperationConfig::from_node(self.graph.node(reversed_id)?);
        for record in returned {
            let mut operation = Operation::new(
                config.clone(),
                &mut *self.target,
                &mut *self.source,
                &*self.evaluator,
                &self.locale,
            );
            let result = operation.run(
                outcome.loaded_key.as_ref(),
                outcome.extracted_key(),
                Some(record.clone()),
            );
            self.log.append(&mut operation.take_log());

            if let Err(source) = result {
                self.log.error(reversed_id, source.to_string());
                return Err(ExecutionError::Operation {
                    node: reversed_id,
                    source,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::MemoryIntegration;
    use crate::models::Value;
    use serde_json::json;

    const PLAN: &str = r#"{
        "operations": [
            {"id": 0, "in": [], "out": [1]},
            {
                "id": 1, "in": [0], "out": [],
                "recordLocators": {
                    "source": {"recordType": "grades"},
                    "target": {"recordType": "transcript"}
                },
                "mapping": [{"source": {"id": "full_name"}, "target": {"id": "name"}}]
            }
        ]
    }"#;

    fn integrations() -> (MemoryIntegration, MemoryIntegration) {
        let source = MemoryIntegration::new("en_US", "UTC")
            .with_table("grades", json!({"full_name": {"type": "string"}}));
        let target = MemoryIntegration::new("en_US", "UTC")
            .with_table("transcript", json!({"name": {"type": "string"}}));
        (source, target)
    }

    #[test]
    fn test_empty_plan_runs() {
        let (mut source, mut target) = integrations();
        let mut execution = Execution::from_plan(None, &mut source, &mut target).unwrap();
        execution.run(None).unwrap();
        assert_eq!(execution.graph().len(), 1);
        assert!(execution.log().is_empty());
    }

    #[test]
    fn test_empty_extraction_skips_node() {
        let (mut source, mut target) = integrations();
        let mut execution = Execution::from_plan(Some(PLAN), &mut source, &mut target).unwrap();
        execution.run(None).unwrap();
        assert_eq!(execution.log().len(), 1);
        drop(execution);
        assert!(target.rows("transcript").is_empty());
        assert!(!target.in_transaction());
    }

    #[test]
    fn test_unroll_sets_target_index() {
        let (mut source, mut target) = integrations();
        for name in ["Ada", "Grace", "Alan"] {
            source.insert("grades", [("full_name", name)]).unwrap();
        }

        let mut execution = Execution::from_plan(Some(PLAN), &mut source, &mut target).unwrap();
        execution.run(None).unwrap();

        let graph = execution.into_graph();
        assert_eq!(graph.len(), 4);
        let indexes: Vec<Option<i64>> = graph.nodes()[2..]
            .iter()
            .map(|n| {
                n.record_locators
                    .as_ref()
                    .and_then(|l| l.target.as_ref())
                    .and_then(|t| t.index())
            })
            .collect();
        assert_eq!(indexes, vec![Some(1), Some(2)]);

        let names: Vec<&Value> = target
            .rows("transcript")
            .iter()
            .filter_map(|r| r.get("name"))
            .collect();
        assert_eq!(names, vec![&Value::from("Ada"), &Value::from("Grace"), &Value::from("Alan")]);
    }

    #[test]
    fn test_with_config_sets_formula_defaults() {
        let (mut source, mut target) = integrations();
        let config = EngineConfig {
            default_locale: "de_DE".into(),
            default_time_zone: "Europe/Berlin".into(),
            ..EngineConfig::default()
        };
        let execution = Execution::from_plan(None, &mut source, &mut target)
            .unwrap()
            .with_config(&config);
        assert_eq!(execution.locale.current().locale, "de_DE");
        assert_eq!(execution.locale.default_settings().time_zone, "Europe/Berlin");
    }
}
