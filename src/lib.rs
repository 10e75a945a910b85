//! Ask a chat model for a Plotly script that visualizes a computer-graphics
//! question, extract the script from the reply and run it under a timeout.

pub mod config;
pub mod execution;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod printer;
pub mod prompt;
pub mod utils;
