//! Cleanup ledger
//!
//! Every entity the scenario creates in the live model is recorded here the
//! moment its id comes back, and released the moment a delete for it is
//! issued. Whatever is still pending when the run ends (normally or through
//! an abort) is deleted by [`CleanupLedger::drain`].

use std::fmt;

use crate::http::{ApiRequest, EndpointResult, Transport};

use super::executor::{AdaptiveExecutor, BatchOutcome, Collection};
use super::routes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Element,
    Relation,
    View,
}

impl ResourceKind {
    /// Singular route of a resource of this kind
    pub fn route(&self, id: &str) -> String {
        match self {
            ResourceKind::Element => routes::element(id),
            ResourceKind::Relation => routes::relation(id),
            ResourceKind::View => routes::view(id),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Element => "element",
            ResourceKind::Relation => "relation",
            ResourceKind::View => "view",
        })
    }
}

#[derive(Debug, Default)]
pub struct CleanupLedger {
    elements: Vec<String>,
    relations: Vec<String>,
    views: Vec<String>,
    released: Vec<(ResourceKind, String)>,
}

impl CleanupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created resource; duplicates are ignored
    pub fn track(&mut self, kind: ResourceKind, id: impl Into<String>) {
        let id = id.into();
        let pending = self.pending_mut(kind);
        if !pending.contains(&id) {
            pending.push(id);
        }
    }

    pub fn pending(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Element => &self.elements,
            ResourceKind::Relation => &self.relations,
            ResourceKind::View => &self.views,
        }
    }

    /// Resources a delete was issued for, in issue order
    pub fn released(&self) -> &[(ResourceKind, String)] {
        &self.released
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.relations.is_empty() && self.views.is_empty()
    }

    fn pending_mut(&mut self, kind: ResourceKind) -> &mut Vec<String> {
        match kind {
            ResourceKind::Element => &mut self.elements,
            ResourceKind::Relation => &mut self.relations,
            ResourceKind::View => &mut self.views,
        }
    }

    /// Drop ids from the pending set; they are never used again
    fn release(&mut self, kind: ResourceKind, ids: &[String]) {
        self.pending_mut(kind).retain(|id| !ids.contains(id));
        self.released
            .extend(ids.iter().map(|id| (kind, id.clone())));
    }

    pub async fn delete_elements<T>(
        &mut self,
        exec: &mut AdaptiveExecutor<'_, T>,
        ids: &[String],
    ) -> BatchOutcome
    where
        T: Transport + ?Sized,
    {
        let outcome = exec.delete(Collection::Elements, ids).await;
        self.release(ResourceKind::Element, ids);
        outcome
    }

    pub async fn delete_relations<T>(
        &mut self,
        exec: &mut AdaptiveExecutor<'_, T>,
        ids: &[String],
    ) -> BatchOutcome
    where
        T: Transport + ?Sized,
    {
        let outcome = exec.delete(Collection::Relations, ids).await;
        self.release(ResourceKind::Relation, ids);
        outcome
    }

    pub async fn delete_view<T>(&mut self, exec: &AdaptiveExecutor<'_, T>, id: &str) -> EndpointResult
    where
        T: Transport + ?Sized,
    {
        let result = exec
            .request(
                &format!("DELETE /views/{{id}} ({id})"),
                ApiRequest::delete(routes::view(id)),
            )
            .await;
        self.release(ResourceKind::View, &[id.to_string()]);
        result
    }

    /// Delete everything still pending: relations, then elements, then views
    ///
    /// Returns false if any delete reported a non-2xx status.
    pub async fn drain<T>(&mut self, exec: &mut AdaptiveExecutor<'_, T>) -> bool
    where
        T: Transport + ?Sized,
    {
        let mut clean = true;

        let relations = self.relations.clone();
        if !relations.is_empty() {
            clean &= self.delete_relations(exec, &relations).await.all_succeeded();
        }

        let elements = self.elements.clone();
        if !elements.is_empty() {
            clean &= self.delete_elements(exec, &elements).await.all_succeeded();
        }

        for view in self.views.clone() {
            clean &= self.delete_view(exec, &view).await.is_success();
        }

        if !clean {
            exec.steps()
                .problem("Some test resources could not be deleted; check the model manually");
        }
        clean
    }
}
