//! Cross-module scenario tests for the tide engine.

mod scenario_tests;
