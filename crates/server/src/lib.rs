//! HTTP surface and command line of the quill session backend.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;
pub mod routes;
