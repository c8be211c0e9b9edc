#![allow(dead_code)]

pub mod harness;
pub mod net;
pub mod upstream;

pub use harness::{ProxyHarness, base_config, pattern_rule, tool_rule};
pub use upstream::TestUpstream;
