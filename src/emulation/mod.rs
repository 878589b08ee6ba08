//! Tool calling for models without native support: instructions, reply
//! parsing, and history transcoding.

pub mod instructions;
pub mod parse;
pub mod transcode;

pub use instructions::EmulationMode;
pub use parse::{parse_tool_calls, ParsedToolCalls};
pub use transcode::{emulate_tool_results, is_emulation_safe};
