pub mod assembler;
pub mod audit;
pub mod cache;
pub mod config;
pub mod outline;
pub mod paths;
pub mod pipeline;
pub mod rename;
pub mod significance;
pub mod similarity;
pub mod util;
pub mod warn;
