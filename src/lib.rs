pub mod annotations;
pub mod error;
pub mod export;
pub mod headers;
pub mod oracle;
pub mod reader;
pub mod repertoire;
pub mod scan;
pub mod subgame;
pub mod token;
pub mod tree;
pub mod visitor;

pub use error::{FailureReason, PgnError, ValidationFailure};
pub use export::{ExportOptions, export};
pub use headers::Headers;
pub use reader::{PgnReader, parse_game, read_game};
pub use repertoire::RepertoireEntry;
pub use scan::{HeaderScanner, scan_headers};
pub use shakmaty::Color;
pub use subgame::SubGameOptions;
pub use tree::{Game, GameNode, NodeId};
pub use visitor::{ErrorPolicy, GameBuilder, ParseOptions, Visitor};
