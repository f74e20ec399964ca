//! Step definitions for the behavioural tests.

mod matcher_steps;
