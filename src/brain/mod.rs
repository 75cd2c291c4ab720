//! The cognition pipeline: plan → arbitrate → execute → narrate.
//!
//! Stages in dependency order: [`router`] classifies intent, [`planner`]
//! produces a DAG (validated by [`validator`]), [`arbiter`] rules on each
//! step, [`executor`] runs the DAG against the downstream subsystems,
//! [`analyst`] condenses the outcomes, [`admission`] derives memory
//! proposals, [`persona`] narrates, and [`orchestrator`] drives the
//! adaptive loop over all of it.

pub mod admission;
pub mod analyst;
pub mod arbiter;
pub mod executor;
pub mod orchestrator;
pub mod persona;
pub mod planner;
pub mod router;
pub mod validator;
