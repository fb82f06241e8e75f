use std::path::PathBuf;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use crate::config::Config;
use crate::quiz;
use crate::semantic::{build_corpus, embedder_from_config, MatchOutcome, MatchService};
use crate::survey::{self, AnswerSet, QuizAnswers};

use super::AnswerArgs;

/// Build the embedder and load the configured snapshot.
pub fn open_service(config: &Config) -> Result<MatchService> {
    let embedder = embedder_from_config(&config.embedder, config.base_path().to_path_buf())
        .context("failed to initialize embedder")?;

    let service = MatchService::open(
        embedder,
        &config.snapshot_path(),
        config.retry.clone(),
        config.top_k,
    )?;

    Ok(service)
}

/// Merge `--answers` json with individual flags, flags winning.
pub fn collect_answers(args: AnswerArgs, answers_json: Option<&str>) -> Result<QuizAnswers> {
    let mut answers = match answers_json {
        Some(raw) => serde_json::from_str::<QuizAnswers>(raw).context("invalid answers json")?,
        None => QuizAnswers::default(),
    };

    let AnswerArgs {
        relationship,
        discovery,
        preference,
        ai_view,
        dead_artist_view,
        sharing,
    } = args;

    answers.relationship = relationship.or(answers.relationship);
    answers.discovery = discovery.or(answers.discovery);
    answers.preference = preference.or(answers.preference);
    answers.ai_view = ai_view.or(answers.ai_view);
    answers.dead_artist_view = dead_artist_view.or(answers.dead_artist_view);
    answers.sharing = sharing.or(answers.sharing);

    Ok(answers)
}

pub fn outcome_json(outcome: &MatchOutcome) -> serde_json::Value {
    json!({
        "identity": outcome.identity,
        "matches": outcome.matches,
    })
}

pub fn handle_quiz(config: &Config, k: Option<usize>, as_json: bool) -> Result<()> {
    // load first so a broken setup fails before the user types anything
    let service = open_service(config)?;

    println!("Music Taste Matcher");
    println!("Answer a few quick questions to find your music taste twin!\n");

    let answers = match quiz::ask_questions() {
        Ok(answers) => answers,
        Err(
            inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted,
        ) => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    let outcome = service.find_matches(&AnswerSet::from(answers), k)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
        return Ok(());
    }

    println!("\nYour identity string:");
    println!("{}", "-".repeat(60));
    println!("{}", outcome.identity);
    println!("{}", "-".repeat(60));
    println!();
    print!("{}", quiz::format_report(&outcome.matches));

    Ok(())
}

pub fn handle_match(
    config: &Config,
    args: AnswerArgs,
    answers_json: Option<String>,
    k: Option<usize>,
) -> Result<()> {
    let answers = collect_answers(args, answers_json.as_deref())?;
    let service = open_service(config)?;

    let outcome = service.find_matches(&AnswerSet::from(answers), k)?;
    println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);

    Ok(())
}

pub fn handle_build_corpus(config: &Config, input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| config.snapshot_path());

    let responses = survey::load_survey_csv(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    log::info!("loaded {} survey responses from {}", responses.len(), input.display());

    let embedder = embedder_from_config(&config.embedder, config.base_path().to_path_buf())
        .context("failed to initialize embedder")?;
    let embedder = crate::semantic::Retrying::new(embedder.as_ref(), &config.retry);

    let progress = ProgressBar::new(responses.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} embedded ({eta})")?
            .progress_chars("=> "),
    );

    let store = build_corpus(
        responses,
        &embedder,
        config.embedder.batch_size,
        Some(&progress),
    );
    progress.finish_and_clear();
    let store = store?;

    store.save(&output)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "output": output,
            "size": store.len(),
            "dimensions": store.dimensions(),
            "model": store.model(),
        }))?
    );

    Ok(())
}

pub fn handle_corpus(config: &Config) -> Result<()> {
    let path = config.snapshot_path();
    let store = crate::semantic::CorpusStore::load(&path)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "path": path,
            "size": store.len(),
            "dimensions": store.dimensions(),
            "model": store.model(),
        }))?
    );

    Ok(())
}
