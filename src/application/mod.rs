pub mod bootstrap;
pub mod commands;
pub mod oauth;
pub mod submission;
