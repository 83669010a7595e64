//! Test suites for the agent lifecycle.

mod support;
