// ============ LaunchKit Test Suite ============
// Cross-crate tests: config → plan → orchestrated launch → post-launch ops
//
// Test categories:
// 1. Integration: full launch of the sample config, then position lock and fee claim
// 2. Failures: injected collaborator faults and the state machine's response
// 3. Fuzz/Property: random schedules and failure sets with invariant checks

#[cfg(test)]
mod integration;

#[cfg(test)]
mod failures;

#[cfg(test)]
mod fuzz;
