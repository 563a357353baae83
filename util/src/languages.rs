use serde::{Deserialize, Serialize};
use std::fmt;

/// Compilers a compiled test case may invoke.
/// Serialized as the executable name (`"g++"`, `"clang"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Compiler {
    #[serde(rename = "g++")]
    Gpp,
    #[serde(rename = "clang++")]
    ClangPp,
    #[serde(rename = "gcc")]
    Gcc,
    #[serde(rename = "clang")]
    Clang,
}

impl Compiler {
    pub fn executable(self) -> &'static str {
        match self {
            Compiler::Gpp => "g++",
            Compiler::ClangPp => "clang++",
            Compiler::Gcc => "gcc",
            Compiler::Clang => "clang",
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::Gpp
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

/// Interpreters an interpreted test case may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    Python,
    Python3,
}

impl Interpreter {
    pub fn executable(self) -> &'static str {
        match self {
            Interpreter::Python => "python",
            Interpreter::Python3 => "python3",
        }
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}
