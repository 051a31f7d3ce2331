use crate::domain::model::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub document: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewrittenRef {
    pub document: String,
    pub location: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRef {
    pub document: String,
    pub location: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRef {
    pub document: String,
    pub path: String,
    pub method: String,
}

impl OperationRef {
    pub fn new(document: &str, path: &str, method: Method) -> Self {
        Self {
            document: document.to_string(),
            path: path.to_string(),
            method: method.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub path: String,
    pub method: String,
    pub kept_domain: String,
    pub kept_document: String,
    pub dropped_domain: String,
    pub dropped_document: String,
    pub resolved_by_override: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Path,
    Schema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackAssignment {
    pub document: String,
    pub kind: SubjectKind,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordTie {
    pub document: String,
    pub subject: String,
    pub chosen: String,
    pub tied_with: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DomainCounts {
    pub paths: usize,
    pub schemas: usize,
}

/// Recoverable conditions accumulated over one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub documents_loaded: usize,
    pub documents_skipped: Vec<DocumentFailure>,
    pub ref_siblings_removed: usize,
    pub refs_rewritten: Vec<RewrittenRef>,
    pub refs_dropped: Vec<DroppedRef>,
    pub operations_without_response_schema: Vec<OperationRef>,
    pub empty_operations_dropped: Vec<OperationRef>,
    pub duplicate_operations: Vec<OperationRef>,
    pub collisions: Vec<Collision>,
    pub fallback_assignments: Vec<FallbackAssignment>,
    pub keyword_ties: Vec<KeywordTie>,
    pub operation_ids_deduplicated: usize,
    pub domains: BTreeMap<String, DomainCounts>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skipped_document(&mut self, document: &str, error: &str) {
        tracing::warn!("Skipping {}: {}", document, error);
        self.documents_skipped.push(DocumentFailure {
            document: document.to_string(),
            error: error.to_string(),
        });
    }

    pub fn record_rewritten_ref(&mut self, document: &str, location: &str, from: &str, to: &str) {
        tracing::debug!("{}: retargeted {} -> {} at {}", document, from, to, location);
        self.refs_rewritten.push(RewrittenRef {
            document: document.to_string(),
            location: location.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    pub fn record_dropped_ref(&mut self, document: &str, location: &str, reference: &str) {
        tracing::warn!("{}: dropped unresolvable {} at {}", document, reference, location);
        self.refs_dropped.push(DroppedRef {
            document: document.to_string(),
            location: location.to_string(),
            reference: reference.to_string(),
        });
    }

    pub fn record_missing_response_schema(&mut self, operation: OperationRef) {
        tracing::debug!(
            "{}: {} {} has no usable response schema",
            operation.document,
            operation.method,
            operation.path
        );
        self.operations_without_response_schema.push(operation);
    }

    pub fn record_empty_operation(&mut self, operation: OperationRef) {
        tracing::debug!(
            "{}: dropped empty operation {} {}",
            operation.document,
            operation.method,
            operation.path
        );
        self.empty_operations_dropped.push(operation);
    }

    pub fn record_duplicate_operation(&mut self, operation: OperationRef) {
        tracing::debug!(
            "{}: {} {} already provided by an earlier document",
            operation.document,
            operation.method,
            operation.path
        );
        self.duplicate_operations.push(operation);
    }

    pub fn record_collision(&mut self, collision: Collision) {
        if collision.resolved_by_override {
            tracing::info!(
                "{} {} claimed by '{}' and '{}'; override keeps it in '{}'",
                collision.method,
                collision.path,
                collision.kept_domain,
                collision.dropped_domain,
                collision.kept_domain
            );
        } else {
            tracing::warn!(
                "Unresolved collision: {} {} claimed by '{}' and '{}'; kept in '{}' by rule precedence",
                collision.method,
                collision.path,
                collision.kept_domain,
                collision.dropped_domain,
                collision.kept_domain
            );
        }
        self.collisions.push(collision);
    }

    pub fn record_fallback(&mut self, document: &str, kind: SubjectKind, subject: &str) {
        tracing::debug!("{}: {:?} '{}' fell through to the fallback domain", document, kind, subject);
        self.fallback_assignments.push(FallbackAssignment {
            document: document.to_string(),
            kind,
            subject: subject.to_string(),
        });
    }

    pub fn record_keyword_tie(&mut self, tie: KeywordTie) {
        tracing::warn!(
            "{}: keyword tie for '{}' between {:?}; chose '{}'",
            tie.document,
            tie.subject,
            tie.tied_with,
            tie.chosen
        );
        self.keyword_ties.push(tie);
    }

    pub fn fallback_path_count(&self) -> usize {
        self.fallback_assignments
            .iter()
            .filter(|a| a.kind == SubjectKind::Path)
            .count()
    }

    pub fn unresolved_collision_count(&self) -> usize {
        self.collisions
            .iter()
            .filter(|c| !c.resolved_by_override)
            .count()
    }

    pub fn summary_rows(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("Documents loaded", self.documents_loaded),
            ("Documents skipped", self.documents_skipped.len()),
            ("Domains created", self.domains.len()),
            (
                "Paths bundled",
                self.domains.values().map(|d| d.paths).sum::<usize>(),
            ),
            ("$ref siblings removed", self.ref_siblings_removed),
            ("References rewritten", self.refs_rewritten.len()),
            ("References dropped", self.refs_dropped.len()),
            (
                "Operations without response schema",
                self.operations_without_response_schema.len(),
            ),
            ("Empty operations removed", self.empty_operations_dropped.len()),
            ("Duplicate operations shadowed", self.duplicate_operations.len()),
            ("Collisions resolved", self.collisions.len()),
            ("Unresolved collisions", self.unresolved_collision_count()),
            ("Fallback assignments", self.fallback_assignments.len()),
            ("Keyword ties", self.keyword_ties.len()),
            ("operationIds deduplicated", self.operation_ids_deduplicated),
        ]
    }

    pub fn log_summary(&self) {
        for (label, value) in self.summary_rows() {
            tracing::info!("  {:<36} {}", label, value);
        }
    }

    /// Report document with a generation timestamp; never part of the published bundles.
    pub fn to_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert(
                "generated_at".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}
