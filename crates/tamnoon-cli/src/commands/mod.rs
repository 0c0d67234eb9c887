pub mod config;
pub mod directives;
pub mod run;
