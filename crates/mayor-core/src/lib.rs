pub mod bypass;
pub mod catalog;
pub mod changeset;
pub mod error;
pub mod evaluator;
pub mod io;
pub mod options;
pub mod paths;
pub mod pattern;
pub mod policy;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod templates;

pub use error::{MayorError, Result};
