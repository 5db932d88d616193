//! Language recipe registry.
//!
//! The registry is the executor's extension point: every supported language
//! is one [`Recipe`] keyed by its public language id. Command templates use
//! `{file}` for the absolute source path and `{dir}` for the job workspace,
//! the same placeholder style the rest of the pipeline uses for shell
//! command configuration.

use std::collections::HashMap;
use std::path::Path;

/// How to build and run one language.
#[derive(Debug, Clone)]
pub enum Recipe {
    /// Runs straight from source.
    Interpreted {
        extension: String,
        run_template: String,
        default_timeout_ms: u64,
    },
    /// Needs a compile step before running.
    Compiled {
        extension: String,
        compile_template: String,
        run_template: String,
        default_timeout_ms: u64,
    },
}

impl Recipe {
    pub fn interpreted(
        extension: impl Into<String>,
        run_template: impl Into<String>,
        default_timeout_ms: u64,
    ) -> Self {
        Self::Interpreted {
            extension: extension.into(),
            run_template: run_template.into(),
            default_timeout_ms,
        }
    }

    pub fn compiled(
        extension: impl Into<String>,
        compile_template: impl Into<String>,
        run_template: impl Into<String>,
        default_timeout_ms: u64,
    ) -> Self {
        Self::Compiled {
            extension: extension.into(),
            compile_template: compile_template.into(),
            run_template: run_template.into(),
            default_timeout_ms,
        }
    }

    /// File extension the source file is written with.
    pub fn extension(&self) -> &str {
        match self {
            Self::Interpreted { extension, .. } | Self::Compiled { extension, .. } => extension,
        }
    }

    /// Wall-clock budget applied when the job does not set one.
    pub fn default_timeout_ms(&self) -> u64 {
        match self {
            Self::Interpreted {
                default_timeout_ms, ..
            }
            | Self::Compiled {
                default_timeout_ms, ..
            } => *default_timeout_ms,
        }
    }

    /// Compile command for this recipe, if it has a compile step.
    pub fn compile_command(&self, file: &Path, dir: &Path) -> Option<String> {
        match self {
            Self::Interpreted { .. } => None,
            Self::Compiled {
                compile_template, ..
            } => Some(render(compile_template, file, dir)),
        }
    }

    /// Execute command for this recipe.
    pub fn run_command(&self, file: &Path, dir: &Path) -> String {
        match self {
            Self::Interpreted { run_template, .. } | Self::Compiled { run_template, .. } => {
                render(run_template, file, dir)
            }
        }
    }
}

fn render(template: &str, file: &Path, dir: &Path) -> String {
    template
        .replace("{file}", &file.to_string_lossy())
        .replace("{dir}", &dir.to_string_lossy())
}

/// Static table of language recipes, keyed by language id.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    recipes: HashMap<u32, Recipe>,
}

impl LanguageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shipped language table. Ids follow the public numbering the
    /// submission API documents.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(
            50,
            Recipe::compiled("c", "gcc {file} -O2 -o {dir}/program -lm", "{dir}/program", 5000),
        );
        registry.register(
            54,
            Recipe::compiled("cpp", "g++ {file} -O2 -o {dir}/program", "{dir}/program", 5000),
        );
        registry.register(60, Recipe::interpreted("go", "go run {file}", 10000));
        registry.register(
            62,
            Recipe::compiled("java", "javac -d {dir} {file}", "java -cp {dir} Main", 10000),
        );
        registry.register(63, Recipe::interpreted("js", "node {file}", 5000));
        registry.register(68, Recipe::interpreted("php", "php {file}", 5000));
        registry.register(71, Recipe::interpreted("py", "python3 {file}", 5000));
        registry.register(72, Recipe::interpreted("rb", "ruby {file}", 5000));
        registry.register(
            73,
            Recipe::compiled("rs", "rustc -O {file} -o {dir}/program", "{dir}/program", 10000),
        );
        registry.register(74, Recipe::interpreted("ts", "ts-node {file}", 10000));

        registry
    }

    /// Register or replace a recipe.
    pub fn register(&mut self, language_id: u32, recipe: Recipe) {
        self.recipes.insert(language_id, recipe);
    }

    pub fn get(&self, language_id: u32) -> Option<&Recipe> {
        self.recipes.get(&language_id)
    }

    pub fn contains(&self, language_id: u32) -> bool {
        self.recipes.contains_key(&language_id)
    }
}
