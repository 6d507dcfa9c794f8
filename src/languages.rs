//! Language toolchain registry
//!
//! Fixed mapping from language name to compile/run command templates and the
//! resource headroom its runtime needs (process count, bonus memory for JVM
//! and interpreter overhead). Consulted by compilation and by every
//! evaluation strategy when building sandbox argv.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct LanguageSpec {
    /// Canonical source file name (e.g. "main.cpp")
    pub source_file: String,
    /// Compile command template (None for interpreted languages)
    compile_command: Option<Vec<String>>,
    /// Interpreter command template (None when the compiled binary runs directly)
    interpreter_command: Option<Vec<String>>,
    /// Executable name is the source name with its last extension removed
    strip_extension: bool,
    /// Process-count limit during compilation
    pub compile_processes: u32,
    /// Process-count limit at runtime (>1 only for runtimes spawning helpers)
    pub run_processes: u32,
    /// Extra memory allowed during compilation, bytes
    pub compile_bonus_memory_byte: i64,
    /// Extra memory allowed at runtime, bytes. Keeps the runtime's fixed cost
    /// from silently eating the contestant's limit.
    pub run_bonus_memory_byte: i64,
}

impl LanguageSpec {
    /// Derive the executable name from a source file name.
    pub fn executable_name(&self, source: &str) -> String {
        if self.strip_extension {
            match source.rfind('.') {
                Some(idx) if idx > 0 => source[..idx].to_string(),
                _ => source.to_string(),
            }
        } else {
            source.to_string()
        }
    }

    /// Compile argv for the given source/executable pair, if any.
    pub fn compile_command(&self, source: &str, exe: &str) -> Option<Vec<String>> {
        self.compile_command.as_ref().map(|template| {
            template
                .iter()
                .map(|arg| arg.replace("{source}", source).replace("{exe}", exe))
                .collect()
        })
    }

    /// Run argv for an executable living under `mount_dir` (the directory the
    /// process is chdir'ed to, in-sandbox or on-host).
    pub fn run_command(
        &self,
        exe_name: &str,
        mount_dir: &str,
        memory_limit_byte: i64,
    ) -> Vec<String> {
        match &self.interpreter_command {
            None => vec![format!("{}/{}", mount_dir, exe_name)],
            Some(template) => {
                let memory_mb = (memory_limit_byte / 1_000_000).to_string();
                template
                    .iter()
                    .map(|arg| {
                        arg.replace("{exe}", exe_name)
                            .replace("{memory_mb}", &memory_mb)
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLanguageSpec {
    source_file: String,
    compile_command: Option<String>,
    interpreter_command: Option<String>,
    #[serde(default)]
    strip_extension: bool,
    #[serde(default = "default_processes")]
    compile_processes: u32,
    #[serde(default = "default_processes")]
    run_processes: u32,
    #[serde(default)]
    compile_bonus_memory_byte: i64,
    #[serde(default)]
    run_bonus_memory_byte: i64,
    #[serde(default)]
    aliases: Vec<String>,
}

fn default_processes() -> u32 {
    1
}

static LANGUAGES: OnceLock<HashMap<String, LanguageSpec>> = OnceLock::new();

/// Initialize the registry from the embedded TOML file
pub fn init_languages() -> anyhow::Result<()> {
    let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
    let languages = parse_languages(content)?;

    LANGUAGES
        .set(languages)
        .map_err(|_| anyhow::anyhow!("Languages already initialized"))?;

    Ok(())
}

fn parse_languages(content: &str) -> anyhow::Result<HashMap<String, LanguageSpec>> {
    let raw_configs: HashMap<String, RawLanguageSpec> =
        toml::from_str(content).context("Invalid language registry TOML")?;

    let mut languages = HashMap::new();
    for (name, raw) in raw_configs {
        let spec = LanguageSpec {
            source_file: raw.source_file,
            compile_command: raw.compile_command.as_deref().map(into_command),
            interpreter_command: raw.interpreter_command.as_deref().map(into_command),
            strip_extension: raw.strip_extension,
            compile_processes: raw.compile_processes,
            run_processes: raw.run_processes,
            compile_bonus_memory_byte: raw.compile_bonus_memory_byte,
            run_bonus_memory_byte: raw.run_bonus_memory_byte,
        };

        for alias in &raw.aliases {
            languages.insert(alias.to_lowercase(), spec.clone());
        }
        languages.insert(name.to_lowercase(), spec);
    }

    Ok(languages)
}

/// Get a language spec by name (case-insensitive, aliases included)
pub fn get_language(language: &str) -> Option<LanguageSpec> {
    LANGUAGES.get()?.get(&language.to_lowercase()).cloned()
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HashMap<String, LanguageSpec> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
        parse_languages(content).unwrap()
    }

    #[test]
    fn test_registry_loads_with_aliases() {
        let langs = registry();
        assert!(langs.contains_key("cpp"));
        assert!(langs.contains_key("c++"));
        assert!(langs.contains_key("python"));
        assert!(langs.contains_key("pypy3"));
    }

    #[test]
    fn test_executable_name_derivation() {
        let langs = registry();
        assert_eq!(langs["cpp"].executable_name("main.cpp"), "main");
        assert_eq!(langs["java"].executable_name("Main.java"), "Main");
        assert_eq!(langs["python3"].executable_name("main.py"), "main.py");
    }

    #[test]
    fn test_compile_command_substitution() {
        let langs = registry();
        let cmd = langs["cpp"].compile_command("main.cpp", "main").unwrap();
        assert_eq!(cmd[0], "/usr/bin/g++");
        assert!(cmd.contains(&"main".to_string()));
        assert!(cmd.contains(&"main.cpp".to_string()));
        assert!(langs["python3"]
            .compile_command("main.py", "main.py")
            .is_none());
    }

    #[test]
    fn test_run_command_binary_vs_interpreter() {
        let langs = registry();
        let cpp = langs["cpp"].run_command("main", "/submission", 256_000_000);
        assert_eq!(cpp, vec!["/submission/main".to_string()]);

        let py = langs["python3"].run_command("main.py", "/submission", 256_000_000);
        assert_eq!(
            py,
            vec!["/usr/bin/python3".to_string(), "main.py".to_string()]
        );

        let java = langs["java"].run_command("Main", "/submission", 256_000_000);
        assert_eq!(java[0], "/usr/bin/java");
        assert!(java.contains(&"-Xmx256m".to_string()));
        assert_eq!(java.last().unwrap(), "Main");
    }

    #[test]
    fn test_runtime_headroom() {
        let langs = registry();
        assert_eq!(langs["java"].run_processes, 20);
        assert_eq!(langs["java"].run_bonus_memory_byte, 1_000_000_000);
        assert_eq!(langs["cpp"].run_processes, 1);
        assert_eq!(langs["cpp"].run_bonus_memory_byte, 0);
    }
}
