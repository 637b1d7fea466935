//! 走法层：自由文本解析、格式校验、合法性校验与就近恢复

pub mod parser;
pub mod validator;

pub use parser::{is_coordinate_notation, is_valid_format, parse_action, DIRECTIVE_LABEL};
pub use validator::{recover, validate};
