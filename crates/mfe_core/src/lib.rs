pub mod codec;
pub mod core_api;
pub mod locator;
pub mod parser;
pub mod patch;
pub mod record;
pub mod search;
pub mod source;

pub use codec::{BlowStyle, ValidationError};
pub use locator::{LineSpan, NotFound, locate};
pub use parser::{ParseError, parse_str};
pub use patch::{PatchError, SaveMode, SaveOptions, SaveReport, patch_batch, patch_one};
pub use record::{Field, Monster};
pub use search::search;
