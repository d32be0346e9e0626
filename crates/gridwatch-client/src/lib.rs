//! ---
//! gw_section: "04-networking"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "HTTP transport and operator commands."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! HTTP side of gridwatch: endpoint transport, snapshot sources for the poll scheduler,
//! and the operator command surface.

pub mod command;
pub mod error;
pub mod operator;
pub mod sources;
pub mod transport;

pub use command::{ActionVerb, CommandReply};
pub use error::ClientError;
pub use operator::Operator;
pub use sources::{DashboardSource, DeviceSource, EndpointSource};
pub use transport::GridClient;
