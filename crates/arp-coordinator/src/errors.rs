use arp_model::ServiceError;
use arp_store::StoreError;

pub const RUN_NOT_FOUND: &str = "run_not_found";
pub const RUN_ALREADY_EXISTS: &str = "run_already_exists";
pub const PARENT_NODE_RUN_NOT_FOUND: &str = "parent_node_run_not_found";
pub const PARENT_NODE_RUN_MISMATCH: &str = "parent_node_run_mismatch";
pub const NODE_RUN_NOT_FOUND: &str = "node_run_not_found";
pub const NODE_RUN_ALREADY_EXISTS: &str = "node_run_already_exists";
pub const NODE_RUN_ALREADY_TERMINAL: &str = "node_run_already_terminal";
pub const LIFECYCLE_STORE_FAILURE: &str = "lifecycle_store_failure";

pub fn run_not_found(run_id: &str) -> ServiceError {
    ServiceError::not_found(RUN_NOT_FOUND, format!("Run '{run_id}' not found"))
        .with_detail("run_id", run_id)
}

pub fn run_already_exists(run_id: &str) -> ServiceError {
    ServiceError::conflict(RUN_ALREADY_EXISTS, format!("Run '{run_id}' already exists"))
        .with_detail("run_id", run_id)
}

pub fn parent_node_run_not_found(parent_node_run_id: &str) -> ServiceError {
    ServiceError::not_found(
        PARENT_NODE_RUN_NOT_FOUND,
        format!("Parent NodeRun '{parent_node_run_id}' not found"),
    )
    .with_detail("parent_node_run_id", parent_node_run_id)
}

pub fn parent_node_run_mismatch(
    parent_node_run_id: &str,
    parent_run_id: &str,
    requested_run_id: &str,
) -> ServiceError {
    ServiceError::conflict(
        PARENT_NODE_RUN_MISMATCH,
        format!(
            "Parent NodeRun '{parent_node_run_id}' belongs to Run '{parent_run_id}', not '{requested_run_id}'"
        ),
    )
    .with_detail("parent_node_run_id", parent_node_run_id)
    .with_detail("parent_run_id", parent_run_id)
    .with_detail("run_id", requested_run_id)
}

pub fn node_run_not_found(node_run_id: &str) -> ServiceError {
    ServiceError::not_found(
        NODE_RUN_NOT_FOUND,
        format!("NodeRun '{node_run_id}' not found"),
    )
    .with_detail("node_run_id", node_run_id)
}

pub fn node_run_already_terminal(node_run_id: &str, state: &str) -> ServiceError {
    ServiceError::conflict(
        NODE_RUN_ALREADY_TERMINAL,
        format!("NodeRun '{node_run_id}' is already {state}"),
    )
    .with_detail("node_run_id", node_run_id)
    .with_detail("state", state)
}

/// Maps a store failure onto the coordinator taxonomy.
///
/// Missing, duplicate or already-terminal records keep their resource-specific
/// code; every other store failure is `lifecycle_store_failure`.
pub fn into_service_error(error: StoreError) -> ServiceError {
    match error {
        StoreError::NotFound { resource: "run", id } => run_not_found(&id),
        StoreError::NotFound {
            resource: "node_run",
            id,
        } => node_run_not_found(&id),
        StoreError::AlreadyExists { resource: "run", id } => run_already_exists(&id),
        StoreError::AlreadyExists {
            resource: "node_run",
            id,
        } => ServiceError::conflict(
            NODE_RUN_ALREADY_EXISTS,
            format!("NodeRun '{id}' already exists"),
        )
        .with_detail("node_run_id", id),
        StoreError::AlreadyTerminal {
            resource: "node_run",
            id,
            state,
        } => node_run_already_terminal(&id, &state),
        other => {
            tracing::error!(error = %other, "lifecycle store failure");
            ServiceError::internal(LIFECYCLE_STORE_FAILURE, "Lifecycle store operation failed")
                .with_detail("error", other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_service_error_missing_run_expected_run_not_found() {
        let error = into_service_error(StoreError::NotFound {
            resource: "run",
            id: "run_9".to_string(),
        });
        assert_eq!(error.code, RUN_NOT_FOUND);
        assert_eq!(error.status_code, 404);
        assert_eq!(
            error.details.and_then(|details| details.get("run_id").cloned()),
            Some(serde_json::json!("run_9"))
        );
    }

    #[test]
    fn into_service_error_terminal_node_run_expected_already_terminal() {
        let error = into_service_error(StoreError::AlreadyTerminal {
            resource: "node_run",
            id: "node_run_1".to_string(),
            state: "succeeded".to_string(),
        });
        assert_eq!(error.code, NODE_RUN_ALREADY_TERMINAL);
        assert_eq!(error.status_code, 409);
        assert_eq!(
            error.details.and_then(|details| details.get("state").cloned()),
            Some(serde_json::json!("succeeded"))
        );
    }

    #[test]
    fn into_service_error_duplicate_run_expected_conflict() {
        let error = into_service_error(StoreError::AlreadyExists {
            resource: "run",
            id: "run_1".to_string(),
        });
        assert_eq!(error.code, RUN_ALREADY_EXISTS);
        assert_eq!(error.status_code, 409);
    }

    #[test]
    fn into_service_error_backend_expected_internal_failure() {
        let error = into_service_error(StoreError::Backend("disk full".to_string()));
        assert_eq!(error.code, LIFECYCLE_STORE_FAILURE);
        assert_eq!(error.status_code, 500);
    }
}
