//! Scenario tests: whole pipeline runs against in-memory collaborators

mod helpers;

mod cancellation;
mod definition_errors;
mod failure_handling;
mod idempotence;
mod parallel;
mod success_chain;
