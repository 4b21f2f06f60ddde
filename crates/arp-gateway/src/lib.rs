#![doc = r#"
Outbound gateways for the services the run coordinator depends on.

Every gateway call goes through [`call_downstream`], which runs the downstream
future on its own task and folds whatever went wrong into a [`ServiceError`].

Operation mapping (HTTP client paths):

| Gateway method | HTTP call | Unavailable code |
| --- | --- | --- |
| `AtomicExecutorGateway::execute_atomic_node_run` | `POST /v1/atomic-node-runs:execute` | `atomic_executor_unavailable` |
| `AtomicExecutorGateway::cancel_atomic_node_run` | `POST /v1/atomic-node-runs/:id:cancel` | `atomic_executor_unavailable` |
| `CompositeExecutorGateway::begin_composite_node_run` | `POST /v1/composite-node-runs:begin` | `composite_executor_unavailable` |
| `CompositeExecutorGateway::cancel_composite_node_run` | `POST /v1/composite-node-runs/:id:cancel` | `composite_executor_unavailable` |
| `SelectionGateway::generate_candidate_set` | `POST /v1/candidate-sets` | `selection_service_unavailable` |
| `PdpGateway::decide_policy` | `POST /v1/policy:decide` | `pdp_unavailable` |
| `NodeRegistryGateway::get_node_type` | `GET /v1/node-types/:id?version=` | `node_registry_unavailable` |
| `*::health` / `*::version` | `GET /v1/health` / `GET /v1/version` | per service |

Implementation notes:
- Structured API errors keep their code, message and details; a missing status defaults to 502.
- Any other failure (transport, decode, a non-2xx body without the `{"error":{...}}` envelope,
  a panicking call) becomes `<service>_unavailable` with the service base URL and the stringified
  failure in `details`.
- Ids placed in a path are percent-encoded as a single segment.
- No timeouts or retries are applied at this layer.
"#]

pub mod call;
pub mod clients;
pub mod error;
pub mod gateways;
pub mod http;
pub mod testing;

pub use arp_model::{ServiceError, ServiceResult};
pub use call::call_downstream;
pub use clients::{
    AtomicExecutorClient, CompositeExecutorClient, NodeRegistryClient, PdpClient,
    SelectionClient,
};
pub use error::{DownstreamError, ServiceTarget};
pub use gateways::{
    AtomicExecutorGateway, CompositeExecutorGateway, DependencyStatus, GatewayEndpoints,
    Gateways, NodeRegistryGateway, PdpGateway, SelectionGateway,
};
pub use http::HttpServiceClient;
pub use testing::{MockDownstream, MockFailure};
