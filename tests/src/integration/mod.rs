//! Scenario tests against running servers.

mod shutdown;
