//! Scenario orchestrator
//!
//! The smoke run is a fixed sequence of [`Phase`]s executed one after the
//! other. Each phase declares a [`Severity`]: an advisory phase that fails is
//! logged and the run moves on; a required phase that fails ends the run, after
//! every test resource created so far has been deleted.

use serde_json::Value;

use crate::common::{Config, Error, Result};
use crate::http::{ApiRequest, EndpointResult, Transport};

use super::cleanup::{CleanupLedger, ResourceKind};
use super::executor::{AdaptiveExecutor, AttachKind, BatchOutcome, Collection, ExecutionPath};
use super::fixtures;
use super::readiness::wait_ready;
use super::routes;
use super::step::StepRunner;

/// Failure policy of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Failure is logged, the run continues
    Advisory,
    /// Failure ends the run
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Liveness,
    Discovery,
    ModelPresence,
    Elements,
    Relations,
    AttachToView,
    TempProbe,
    Teardown,
    CleanupVerification,
    ScriptingRecheck,
    Persist,
}

impl Phase {
    /// The complete smoke run
    pub const ALL: &'static [Phase] = &[
        Phase::Liveness,
        Phase::Discovery,
        Phase::ModelPresence,
        Phase::Elements,
        Phase::Relations,
        Phase::AttachToView,
        Phase::TempProbe,
        Phase::Teardown,
        Phase::CleanupVerification,
        Phase::ScriptingRecheck,
        Phase::Persist,
    ];

    /// Read-only subset: readiness and static discovery
    pub const DISCOVERY: &'static [Phase] = &[Phase::Liveness, Phase::Discovery];

    pub const WAIT: &'static [Phase] = &[Phase::Liveness];

    pub fn severity(&self) -> Severity {
        match self {
            Phase::Discovery
            | Phase::CleanupVerification
            | Phase::ScriptingRecheck
            | Phase::Persist => Severity::Advisory,
            _ => Severity::Required,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Liveness => "liveness",
            Phase::Discovery => "discovery",
            Phase::ModelPresence => "model-presence",
            Phase::Elements => "elements",
            Phase::Relations => "relations",
            Phase::AttachToView => "attach-to-view",
            Phase::TempProbe => "temp-probe",
            Phase::Teardown => "teardown",
            Phase::CleanupVerification => "cleanup-verification",
            Phase::ScriptingRecheck => "scripting-recheck",
            Phase::Persist => "persist",
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// `/folders` answered 409: nothing model-dependent was attempted
    NoActiveModel,
    NotReady,
    /// A required phase failed
    Aborted(String),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed | RunOutcome::NoActiveModel => 0,
            RunOutcome::NotReady => 1,
            RunOutcome::Aborted(_) => 2,
        }
    }
}

impl From<Error> for RunOutcome {
    fn from(e: Error) -> Self {
        match e {
            Error::NotReady { .. } => RunOutcome::NotReady,
            Error::Precondition(reason) => RunOutcome::Aborted(reason),
            other => RunOutcome::Aborted(other.to_string()),
        }
    }
}

enum PhaseOutcome {
    Continue,
    Finish(RunOutcome),
}

/// One smoke run against a live server
pub struct Scenario<'a, T: ?Sized> {
    config: &'a Config,
    steps: &'a StepRunner,
    exec: AdaptiveExecutor<'a, T>,
    ledger: CleanupLedger,
    element_ids: Vec<String>,
    relation_ids: Vec<String>,
    view_id: Option<String>,
}

impl<'a, T> Scenario<'a, T>
where
    T: Transport + ?Sized,
{
    pub fn new(transport: &'a T, steps: &'a StepRunner, config: &'a Config) -> Self {
        Self {
            config,
            steps,
            exec: AdaptiveExecutor::new(transport, steps),
            ledger: CleanupLedger::new(),
            element_ids: Vec::new(),
            relation_ids: Vec::new(),
            view_id: None,
        }
    }

    /// Run every phase
    pub async fn run(&mut self) -> RunOutcome {
        self.run_phases(Phase::ALL).await
    }

    /// Run the given phases in order
    pub async fn run_phases(&mut self, phases: &[Phase]) -> RunOutcome {
        self.steps
            .note(&format!("Base: {}", self.exec.transport().base_url()));

        for &phase in phases {
            tracing::debug!(phase = phase.name(), "entering phase");
            match self.execute(phase).await {
                Ok(PhaseOutcome::Continue) => {}
                Ok(PhaseOutcome::Finish(outcome)) => return outcome,
                Err(e) => match phase.severity() {
                    Severity::Advisory => {
                        tracing::warn!(phase = phase.name(), error = %e, "advisory phase failed");
                        self.steps.problem(&e.to_string());
                    }
                    Severity::Required => {
                        self.steps.problem(&e.to_string());
                        if !self.ledger.is_empty() {
                            self.steps
                                .note("Removing test resources before aborting");
                            self.ledger.drain(&mut self.exec).await;
                        }
                        return RunOutcome::from(e);
                    }
                },
            }
        }

        tracing::info!(steps = self.steps.steps_run(), "smoke run completed");
        self.steps.note("Flow completed.");
        RunOutcome::Completed
    }

    /// Resources created and not yet deleted
    pub fn ledger(&self) -> &CleanupLedger {
        &self.ledger
    }

    /// View the bulk entities were attached to
    pub fn view_id(&self) -> Option<&str> {
        self.view_id.as_deref()
    }

    async fn execute(&mut self, phase: Phase) -> Result<PhaseOutcome> {
        match phase {
            Phase::Liveness => self.liveness().await,
            Phase::Discovery => self.discovery().await,
            Phase::ModelPresence => self.model_presence().await,
            Phase::Elements => self.elements().await,
            Phase::Relations => self.relations().await,
            Phase::AttachToView => self.attach_to_view().await,
            Phase::TempProbe => self.temp_probe().await,
            Phase::Teardown => self.teardown().await,
            Phase::CleanupVerification => self.verify_cleanup().await,
            Phase::ScriptingRecheck => self.scripting_recheck().await,
            Phase::Persist => self.persist().await,
        }
    }

    async fn request(&self, description: &str, request: ApiRequest) -> EndpointResult {
        self.exec.request(description, request).await
    }

    async fn get(&self, route: &str) -> EndpointResult {
        self.request(&format!("GET {route}"), ApiRequest::get(route))
            .await
    }

    fn expect_ok(&self, result: &EndpointResult, what: &str) {
        if !result.is_success() {
            self.steps
                .problem(&format!("{what} answered HTTP {}", result.status));
        }
    }

    fn expect_all_ok(&self, outcome: &BatchOutcome, what: &str) {
        if !outcome.all_succeeded() {
            let failed = outcome.results.iter().filter(|r| !r.is_success()).count();
            self.steps.problem(&format!(
                "{what}: {failed} of {} items failed ({})",
                outcome.len(),
                match outcome.path {
                    ExecutionPath::Batch => "batch",
                    ExecutionPath::PerItem => "per-item",
                }
            ));
        }
    }

    async fn liveness(&mut self) -> Result<PhaseOutcome> {
        let transport = self.exec.transport();
        let readiness = &self.config.readiness;
        if wait_ready(transport, readiness, self.config.timeouts.probe()).await {
            Ok(PhaseOutcome::Continue)
        } else {
            Err(Error::not_ready(transport.base_url(), readiness.attempts))
        }
    }

    async fn discovery(&mut self) -> Result<PhaseOutcome> {
        for route in [routes::STATUS, routes::OPENAPI, routes::TYPES] {
            let result = self.get(route).await;
            self.expect_ok(&result, &format!("GET {route}"));
        }

        let engines = self.get(routes::SCRIPT_ENGINES).await;
        if scripting_installed(&engines) {
            let result = self
                .request(
                    "POST /script/run (noop)",
                    ApiRequest::post(routes::SCRIPT_RUN).json(fixtures::noop_script()),
                )
                .await;
            self.expect_ok(&result, "POST /script/run");
        } else {
            self.steps
                .note("Scripting engine not installed, skipping script check");
        }
        Ok(PhaseOutcome::Continue)
    }

    async fn model_presence(&mut self) -> Result<PhaseOutcome> {
        let folders = self.get(routes::FOLDERS).await;
        if folders.status == 409 {
            self.steps.note(
                "No active model (HTTP 409). Model-dependent checks are skipped.",
            );
            return Ok(PhaseOutcome::Finish(RunOutcome::NoActiveModel));
        }
        self.steps
            .note("Active model detected. Proceeding to batch operations...");
        Ok(PhaseOutcome::Continue)
    }

    async fn elements(&mut self) -> Result<PhaseOutcome> {
        self.steps.note("Starting element batch operations");
        let items = fixtures::elements();
        let created = self.exec.create(Collection::Elements, &items).await;
        let ids = self.collect_ids(&created, ResourceKind::Element)?;

        let read = self.exec.read(Collection::Elements, &ids).await;
        self.expect_all_ok(&read, "read elements");

        let patched = self
            .exec
            .patch(Collection::Elements, &fixtures::element_renames(&ids))
            .await;
        self.expect_all_ok(&patched, "patch elements");

        self.element_ids = ids;
        Ok(PhaseOutcome::Continue)
    }

    async fn relations(&mut self) -> Result<PhaseOutcome> {
        self.steps.note("Starting relation batch operations");
        let items = fixtures::relations(&self.element_ids);
        let created = self.exec.create(Collection::Relations, &items).await;
        let ids = self.collect_ids(&created, ResourceKind::Relation)?;

        let read = self.exec.read(Collection::Relations, &ids).await;
        self.expect_all_ok(&read, "read relations");

        let patched = self
            .exec
            .patch(Collection::Relations, &fixtures::relation_renames(&ids))
            .await;
        self.expect_all_ok(&patched, "patch relations");

        self.relation_ids = ids;
        Ok(PhaseOutcome::Continue)
    }

    /// Track every returned id, then insist that every item got one
    fn collect_ids(&mut self, created: &BatchOutcome, kind: ResourceKind) -> Result<Vec<String>> {
        let ids = created.ids();
        for id in ids.iter().flatten() {
            self.ledger.track(kind, id.clone());
        }

        let missing = ids.iter().filter(|id| id.is_none()).count();
        if missing > 0 {
            return Err(Error::precondition(format!(
                "{kind} creation returned no id for {missing} of {} items",
                ids.len()
            )));
        }
        Ok(ids.into_iter().flatten().collect())
    }

    async fn attach_to_view(&mut self) -> Result<PhaseOutcome> {
        self.steps.note("Adding to an existing view (first available)");
        let views = self.get(routes::VIEWS).await;

        let view_id = match first_view_id(&views.body) {
            Some(id) => id,
            None => {
                let created = self
                    .request(
                        "POST /views (create default)",
                        ApiRequest::post(routes::VIEWS).json(fixtures::default_view()),
                    )
                    .await;
                created
                    .id()
                    .map(str::to_string)
                    .ok_or_else(|| Error::precondition("No view available to add to"))?
            }
        };

        let placements = fixtures::element_placements(&self.element_ids);
        let attached = self
            .exec
            .attach(&view_id, AttachKind::Element, &placements)
            .await;
        self.expect_all_ok(&attached, "attach elements to view");

        let placements = fixtures::relation_placements(&self.relation_ids);
        let attached = self
            .exec
            .attach(&view_id, AttachKind::Relation, &placements)
            .await;
        self.expect_all_ok(&attached, "attach relations to view");

        // Left in place as visible evidence of the run
        self.view_id = Some(view_id);
        Ok(PhaseOutcome::Continue)
    }

    /// Every sub-step runs even when an earlier one misbehaved
    async fn temp_probe(&mut self) -> Result<PhaseOutcome> {
        self.steps.note("Create/Delete temp view and one element");
        let temp_view = self
            .request(
                "POST /views (temp)",
                ApiRequest::post(routes::VIEWS).json(fixtures::temp_view()),
            )
            .await;
        let view_id = temp_view
            .id()
            .map(str::to_string)
            .ok_or_else(|| Error::precondition("Failed to create temp view"))?;
        self.ledger.track(ResourceKind::View, view_id.clone());

        let created = self
            .exec
            .create(Collection::Elements, &[fixtures::temp_element()])
            .await;
        let element_id = created.ids().into_iter().next().flatten();

        match element_id {
            Some(element_id) => {
                self.ledger.track(ResourceKind::Element, element_id.clone());
                self.exercise_temp_element(&view_id, &element_id).await;
                let deleted = self
                    .ledger
                    .delete_elements(&mut self.exec, &[element_id])
                    .await;
                self.expect_all_ok(&deleted, "delete temp element");
            }
            None => self.steps.problem("Temp element creation returned no id"),
        }

        let deleted = self.ledger.delete_view(&self.exec, &view_id).await;
        self.expect_ok(&deleted, "DELETE temp view");
        Ok(PhaseOutcome::Continue)
    }

    async fn exercise_temp_element(&self, view_id: &str, element_id: &str) {
        let add_route = routes::view_add_element(view_id);
        let plain = self
            .request(
                "POST /views/{id}/add-element (temp)",
                ApiRequest::post(&add_route).json(fixtures::temp_placement(element_id)),
            )
            .await;
        self.expect_ok(&plain, "add temp element to temp view");

        // A second visual object for the same element must be accepted
        let styled = self
            .request(
                "POST /views/{id}/add-element (temp with style)",
                ApiRequest::post(&add_route).json(fixtures::styled_placement(element_id)),
            )
            .await;
        self.expect_ok(&styled, "add styled temp element to temp view");

        let content = self
            .request(
                "GET /views/{id}/content (temp)",
                ApiRequest::get(routes::view_content(view_id)),
            )
            .await;
        match find_view_object(&content.body, element_id) {
            Some(object_id) => {
                let removed = self
                    .request(
                        "DELETE /views/{id}/objects/{objectId} (temp)",
                        ApiRequest::delete(routes::view_object(view_id, &object_id)),
                    )
                    .await;
                self.expect_ok(&removed, "remove view object");
            }
            None => self
                .steps
                .problem("No view object found for the temp element"),
        }
    }

    async fn teardown(&mut self) -> Result<PhaseOutcome> {
        self.steps.note("Deleting bulk relations and elements");
        self.ledger.drain(&mut self.exec).await;
        Ok(PhaseOutcome::Continue)
    }

    async fn verify_cleanup(&mut self) -> Result<PhaseOutcome> {
        let released = self.ledger.released().to_vec();
        if released.is_empty() {
            return Ok(PhaseOutcome::Continue);
        }

        self.steps.note("Verifying test resources were removed");
        let mut leftovers = Vec::new();
        for (kind, id) in released {
            let route = kind.route(&id);
            let result = self
                .request(&format!("GET {route} (expect 404)"), ApiRequest::get(&route))
                .await;
            if result.status != 404 {
                leftovers.push(format!("{kind} {id} (HTTP {})", result.status));
            }
        }

        if leftovers.is_empty() {
            Ok(PhaseOutcome::Continue)
        } else {
            Err(Error::Verification(format!(
                "test resources still present: {}",
                leftovers.join(", ")
            )))
        }
    }

    async fn scripting_recheck(&mut self) -> Result<PhaseOutcome> {
        self.steps.note("Test script execution");
        let engines = self.get(routes::SCRIPT_ENGINES).await;
        self.expect_ok(&engines, "GET /script/engines");

        let result = self
            .request(
                "POST /script/run (simple test)",
                ApiRequest::post(routes::SCRIPT_RUN).json(fixtures::named_script()),
            )
            .await;
        self.expect_ok(&result, "POST /script/run");
        Ok(PhaseOutcome::Continue)
    }

    async fn persist(&mut self) -> Result<PhaseOutcome> {
        let result = self
            .request(
                "POST /model/save",
                ApiRequest::post(routes::MODEL_SAVE).json(serde_json::json!({})),
            )
            .await;
        self.expect_ok(&result, "POST /model/save");
        Ok(PhaseOutcome::Continue)
    }
}

/// `installed: true` in a 200 answer from `/script/engines`
fn scripting_installed(engines: &EndpointResult) -> bool {
    engines.status == 200
        && engines
            .body
            .get("installed")
            .and_then(Value::as_bool)
            .unwrap_or(false)
}

fn first_view_id(views: &Value) -> Option<String> {
    views
        .as_array()?
        .first()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

/// objectId of the element's placement, else of the first object listed
fn find_view_object(content: &Value, element_id: &str) -> Option<String> {
    let objects = content.get("objects")?.as_array()?;
    let object_id = |o: &Value| o.get("objectId").and_then(Value::as_str).map(str::to_string);

    objects
        .iter()
        .filter(|o| o.get("elementId").and_then(Value::as_str) == Some(element_id))
        .find_map(object_id)
        .or_else(|| objects.iter().find_map(object_id))
}
