//! # Workflow Recipes
//!
//! The five concrete saga recipes of the collection pipeline, one module per
//! workflow. Each module exposes a `recipe(...)` constructor that wires its
//! step handlers to the shared store and collaborator seams and returns the
//! validated transition table.
//!
//! | Recipe | Entity | Steps |
//! |--------|--------|-------|
//! | demographic | one DEM record | validate, write downstream / flag errors |
//! | course | one CRS record | validate, write downstream / flag errors |
//! | assessment | one XAM record | validate, write downstream / flag errors |
//! | fileset | one fileset | re-check guard, complete |
//! | course_update | one PEN | batch resync of UPDATE_CRS rows |

pub mod assessment;
pub mod course;
pub mod course_update;
pub mod demographic;
pub mod fileset;
