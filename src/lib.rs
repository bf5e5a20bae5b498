//! Run tasks against the files staged for a Git commit, while guaranteeing
//! that the tasks only ever observe staged content and that the developer's
//! working tree survives whatever the tasks do to it.
//!
//! The entry point is [`core::workflow::GitWorkflow`], a transactional state
//! machine wrapped around a Git repository. It hides unstaged changes behind
//! a patch file, backs the original working tree up into a marker-identified
//! stash, captures task-produced modifications back into the index, and
//! restores everything on failure. The [`git`] module contains the plumbing
//! it is built from.

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments, clippy::blocks_in_conditions)]

pub mod core;
pub mod git;
pub mod testing;
pub mod util;
