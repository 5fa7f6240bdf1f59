pub mod format_detector;
pub mod netlist;

pub use format_detector::{detect_format, NetlistFormat};
pub use netlist::{NetlistParseError, NetlistParser, NetlistWriter, ParsedNetlist};
