pub mod error;
pub mod experiment;
pub mod fixture;
pub mod io;
pub mod paths;
pub mod report;
pub mod result;
pub mod runner;
pub mod sandbox;
pub mod score;
pub mod toolchain;

pub use error::{Result, SkillbenchError};
