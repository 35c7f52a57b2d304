// Infrastructure implementations: C front end, toolchain runner, work area.

pub mod c_lexer;
pub mod c_parser;
pub mod toolchain;
pub mod workspace;

pub use c_parser::CSourceParser;
pub use toolchain::ClangGdbToolchain;
pub use workspace::WorkArea;
