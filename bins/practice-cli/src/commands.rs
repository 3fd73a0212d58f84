// CLI commands for practicing against the grading backend
use anyhow::{anyhow, bail, Context, Result};
use practice_common::config::PracticeConfig;
use practice_common::types::{CaseResult, Language, Question, ResultGroup};
use practice_session::{
    assemble, ensure_question_loaded, progress_for_list, CustomInput, GradingPipeline,
    HttpBackend, HttpGradingService, MemoryStore, PracticeSession, ProgressStore, QuestionStore,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tokio::sync::Mutex;

/// A question file: a bare array or the backend's `codeQuestions` envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionFile {
    List(Vec<Question>),
    Envelope {
        #[serde(rename = "codeQuestions")]
        code_questions: Vec<Question>,
    },
}

/// Load questions from a JSON file
fn load_questions_file(path: &Path) -> Result<Vec<Question>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: QuestionFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(match file {
        QuestionFile::List(questions) => questions,
        QuestionFile::Envelope { code_questions } => code_questions,
    })
}

fn parse_language(name: &str) -> Result<Language> {
    Ok(name.parse::<Language>()?)
}

fn resolve_student(config: &PracticeConfig, student_id: Option<&str>) -> Result<String> {
    student_id
        .map(str::to_string)
        .or_else(|| config.student_id.clone())
        .filter(|s| !s.trim().is_empty())
        .context("No student id given (use --student-id or PRACTICE_STUDENT_ID)")
}

fn print_group(title: &str, group: &ResultGroup) {
    if group.results.is_empty() {
        return;
    }
    println!(
        "\n{} ({}/{} passed)",
        title,
        group.summary.passed,
        group.summary.total()
    );
    for (n, case) in group.results.iter().enumerate() {
        print_case(case, n + 1);
    }
}

fn print_case(case: &CaseResult, n: usize) {
    let mark = if case.status == practice_common::types::CaseStatus::Passed {
        "✅"
    } else {
        "❌"
    };
    println!("  {} {}", mark, case.label(n));
    if let Some(input) = case.display_input() {
        println!("     input:    {}", input);
    }
    if !case.is_hidden() {
        println!("     expected: {}", case.display_expected());
        println!("     actual:   {}", case.display_actual());
    }
}

pub struct RunOptions<'a> {
    pub questions_file: Option<&'a Path>,
    pub subject: &'a str,
    pub tags: &'a str,
    pub index: usize,
    pub source: &'a Path,
    pub language: &'a str,
    pub custom_input: Option<&'a str>,
    pub student_id: Option<&'a str>,
}

/// Grade a local source file against one question
pub async fn run(config: &PracticeConfig, options: RunOptions<'_>) -> Result<()> {
    let language = parse_language(options.language)?;
    let student_id = resolve_student(config, options.student_id)?;
    let code = fs::read_to_string(options.source)
        .with_context(|| format!("Failed to read {}", options.source.display()))?;

    let backend = HttpBackend::from_config(config);
    let (questions, local) = match options.questions_file {
        Some(path) => {
            let questions = load_questions_file(path)?;
            (questions.clone(), Some(MemoryStore::new(questions)))
        }
        None => {
            println!("📥 Fetching questions for {} / {}...", options.subject, options.tags);
            let questions = backend
                .list_questions(options.subject, options.tags)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            (questions, None)
        }
    };

    if options.index >= questions.len() {
        bail!(
            "Question index {} out of range ({} questions)",
            options.index,
            questions.len()
        );
    }

    let session = Mutex::new(PracticeSession::new(questions, options.index, HashMap::new()));

    // A file may carry stubs whose body lives in the backend
    let loaded = match &local {
        Some(store) => match ensure_question_loaded(&session, options.index, store).await {
            Ok(loaded) => Ok(loaded),
            Err(_) => ensure_question_loaded(&session, options.index, &backend).await,
        },
        None => ensure_question_loaded(&session, options.index, &backend).await,
    };
    if loaded.map_err(|e| anyhow!(e.user_message()))? {
        println!("📥 Loaded question body from the backend");
    }

    session.lock().await.edit_code(options.index, code);

    let question = session
        .lock()
        .await
        .question(options.index)
        .cloned()
        .context("Question disappeared from the session")?;
    println!(
        "🚀 Submitting {} solution for question {}",
        language,
        question.id.as_deref().unwrap_or("<no id>")
    );
    if let Some(prompt) = &question.prompt {
        println!("\n{}\n", prompt);
    }

    let custom = match options.custom_input {
        Some(input) => CustomInput::enabled(input),
        None => CustomInput::disabled(),
    };

    let grader = HttpGradingService::from_config(config).map_err(|e| anyhow!(e.user_message()))?;
    let pipeline = GradingPipeline::new(grader, student_id);
    let outcome = pipeline
        .submit(&session, options.index, language, &custom)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    print_group("🧪 Custom input", &outcome.classified.custom);
    print_group("📋 Test cases", &outcome.classified.graded);

    let verdict = outcome.classified.verdict();
    println!();
    match verdict {
        practice_session::Verdict::AllPassed => println!("✅ {}", verdict.message()),
        practice_session::Verdict::SomeFailed => println!("❌ {}", verdict.message()),
    }
    if let Some(score) = outcome.awarded_score {
        println!("🏆 Awarded score: {}/{}", score, question.max_score);
    }

    Ok(())
}

/// Print list-view progress for one learner
pub async fn progress(
    config: &PracticeConfig,
    subject: &str,
    tags: &str,
    student_id: Option<&str>,
) -> Result<()> {
    let student_id = resolve_student(config, student_id)?;
    let backend = HttpBackend::from_config(config);

    let questions = backend
        .list_questions(subject, tags)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    let records = backend
        .fetch_progress(subject, tags, &student_id)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if questions.is_empty() {
        println!("📭 No questions for {} / {}", subject, tags);
        return Ok(());
    }

    println!("📊 Progress for {} ({} / {})\n", student_id, subject, tags);
    for (n, row) in progress_for_list(&questions, &records).iter().enumerate() {
        println!(
            "  {:>3}. {:<14} {:<10} tests {:>7} ({:>3.0}%)  score {:>7} ({:>3.0}%)  {}",
            n + 1,
            row.progress.status.to_string(),
            row.difficulty,
            row.passed_str,
            row.passed_pct,
            row.score_str,
            row.score_pct,
            row.question_id.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Show one question and the cases a submission is graded on
pub async fn show_question(
    config: &PracticeConfig,
    subject: &str,
    question_id: &str,
    question_type: &str,
) -> Result<()> {
    let backend = HttpBackend::from_config(config);
    let question = backend
        .fetch_question(&subject.to_lowercase(), question_id, question_type)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    println!("📝 {} [{}]", question_id, question.difficulty);
    if let Some(prompt) = &question.prompt {
        println!("\n{}", prompt);
    }
    if !question.constraints.is_empty() {
        println!("\nConstraints: {}", question.constraints);
    }
    println!("\nSample input:\n{}", question.sample_input);
    println!("Sample output:\n{}", question.sample_output);
    println!(
        "\n{} graded cases ({} hidden), max score {}",
        assemble(&question).len(),
        question.hidden_cases.len(),
        question.max_score
    );
    Ok(())
}
