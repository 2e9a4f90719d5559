// CLI commands for the judge
use anyhow::{bail, Context, Result};
use judge_common::config::Config;
use judge_common::memory::MemoryStore;
use judge_common::types::Problem;
use judge_engine::fallback::LocalFallbackExecutor;
use judge_engine::languages::{Language, LanguagesFile};
use judge_engine::remote::{RemoteClient, RemoteConfig};
use judge_engine::{JudgeEngine, LanguageRegistry, RunRequest, SubmitRequest};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load the languages file; a missing file is an empty registry
fn load_languages_file(path: &Path) -> Result<LanguagesFile> {
    if !path.exists() {
        return Ok(LanguagesFile { languages: vec![] });
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn save_languages_file(path: &Path, file: &LanguagesFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(file).context("Failed to serialize languages file")?;
    fs::write(path, json + "\n").with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Print every configured language
pub fn list_languages(path: &Path) -> Result<()> {
    let registry = LanguageRegistry::load_or_builtin(path)?;

    println!("{:<12} {:>6}  aliases", "language", "id");
    for language in registry.languages() {
        println!(
            "{:<12} {:>6}  {}",
            language.name,
            language.runtime_id,
            language.aliases.join(", ")
        );
    }
    Ok(())
}

/// Register a language in the languages file
pub fn add_language(path: &Path, name: &str, runtime_id: u32, aliases: &[String]) -> Result<()> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        bail!("Language name cannot be empty");
    }

    let mut file = load_languages_file(path)?;
    if file.languages.iter().any(|l| l.name == name) {
        bail!("Language '{}' already exists in {}", name, path.display());
    }

    file.languages.push(Language {
        name: name.clone(),
        runtime_id,
        aliases: aliases.iter().map(|a| a.trim().to_lowercase()).collect(),
    });

    // Reject alias clashes before anything is written
    LanguageRegistry::new(file.languages.clone())?;

    save_languages_file(path, &file)?;
    println!("Language '{}' (runtime id {}) added to {}", name, runtime_id, path.display());
    Ok(())
}

pub struct JudgeOptions {
    pub file: PathBuf,
    pub language: String,
    pub problem: PathBuf,
    pub submit: bool,
    pub user: String,
    pub input: Option<String>,
}

fn load_problem(path: &Path) -> Result<Problem> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse problem {}", path.display()))
}

fn build_engine(languages: &Path, store: Arc<MemoryStore>) -> Result<JudgeEngine> {
    let config = Config::from_env();
    let registry = LanguageRegistry::load_or_builtin(languages)?;
    let fallback = LocalFallbackExecutor::from_settings(&config.fallback)
        .context("Failed to initialize fallback runtime")?;

    let engine = JudgeEngine::new(registry, Arc::new(fallback), store.clone(), store.clone(), store);
    match &config.remote {
        Some(settings) => {
            let client = RemoteClient::new(RemoteConfig::from_settings(settings))
                .context("Failed to create sandbox client")?;
            Ok(engine.with_remote(Arc::new(client)))
        }
        None => Ok(engine),
    }
}

/// Judge a local solution file with in-memory stores and print the result
pub async fn judge(languages: &Path, options: JudgeOptions) -> Result<()> {
    let source_code = fs::read_to_string(&options.file)
        .with_context(|| format!("Failed to read {}", options.file.display()))?;
    let problem = load_problem(&options.problem)?;
    let problem_id = problem.id.clone();

    let store = Arc::new(MemoryStore::with_problems([problem]));
    let engine = build_engine(languages, store)?;

    let output = if options.submit {
        if options.input.is_some() {
            bail!("--input cannot be combined with --submit");
        }
        let response = engine
            .submit(SubmitRequest {
                source_code,
                language: options.language,
                problem_id,
                user_id: Some(options.user),
            })
            .await?;
        serde_json::to_string_pretty(&response)?
    } else {
        let response = engine
            .run(RunRequest {
                source_code,
                language: options.language,
                problem_id: Some(problem_id),
                custom_input: options.input,
            })
            .await?;
        serde_json::to_string_pretty(&response)?
    };

    println!("{}", output);
    Ok(())
}
