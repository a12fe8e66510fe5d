//! Life Planner - guided yearly planning with a weekly log
//!
//! A linear, resumable, gated multi-step planning flow with local-first
//! writes mirrored to a user-scoped remote store.
//!
//! # Core Concepts
//!
//! - **Local first**: every command commits to the in-memory store, then
//!   enqueues a remote mirror task; remote failures never roll back local state
//! - **Derived gating**: completion and reachability are recomputed from the
//!   captured entries on every read
//! - **Identity-scoped hydration**: a sign-in replaces local state with the
//!   user's remote records; stale fetches for a previous identity are dropped
//!
//! # Modules
//!
//! - [`domain`] - steps, catalog, entries, weekly plans, goal scores
//! - [`state`] - planner state store and its shared handle
//! - [`flow`] - gating rules and the flow controller
//! - [`remote`] - remote store trait, backends and the user-scoped gateway
//! - [`session`] - current identity and authentication
//! - [`sync`] - hydration and the remote mirror queue
//! - [`weekly`] - weekly plan log
//! - [`goals`] - goal score book
//! - [`dashboard`] - progress aggregation
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod flow;
pub mod goals;
pub mod planner;
pub mod remote;
pub mod session;
pub mod state;
pub mod sync;
pub mod weekly;

// Re-export commonly used types
pub use config::Config;
pub use dashboard::DashboardSummary;
pub use domain::{PlannerEntry, PlannerStep, StepCatalog, UserId, WeeklyPlan};
pub use flow::{FlowController, FlowError, FlowProgress, SubmitOutcome, Transition};
pub use goals::{GoalError, GoalScoreBook};
pub use planner::{Planner, PlannerOptions};
pub use remote::{Gateway, MemoryRemote, RemoteError, RemoteStore, SqliteRemote, WriteOutcome};
pub use session::{Authenticator, Credentials, SessionContext, SessionError, SessionFile, SignUp};
pub use state::{PlannerState, PlannerStore, StateEvent, StateHandle};
pub use sync::{HydrationCoordinator, Notice, NoticeTone, SyncQueue, SyncTask, SyncTicket};
pub use weekly::{WeeklyError, WeeklyLog, WeeklyPlanForm};
