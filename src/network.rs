//! Default endpoints and timeouts for bux servers.

use std::time::Duration;

/// Default GraphQL endpoint of a locally running bux server.
pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:3003/graphql";

/// Default REST API base URL of a locally running bux server.
pub const DEFAULT_HTTP_URL: &str = "http://localhost:3003/v1";

/// Default per-request timeout of the wire client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
