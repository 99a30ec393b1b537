//! CLI subcommand implementations for the harvest binary.

pub mod check_cmd;
pub mod init_cmd;
pub mod run_cmd;
