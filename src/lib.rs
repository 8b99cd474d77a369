pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod exclusion;
pub mod glm;
pub mod io;
pub mod motion;
pub mod pipeline;
pub mod qc;
pub mod subject;
