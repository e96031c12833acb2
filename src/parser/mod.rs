pub mod history_parser;

pub use history_parser::{HistoryParser, Parser};
