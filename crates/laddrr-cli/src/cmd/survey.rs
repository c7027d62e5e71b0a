use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use laddrr_core::flows::survey::{self as survey_flows, GenerateSurveyQuestionsInput, SurveyQuestion};
use laddrr_core::surveys::{self, DeployedSurvey};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum SurveySubcommand {
    /// Deploy a survey from generated and/or hand-written questions
    Deploy {
        /// What the survey should measure
        #[arg(long)]
        objective: String,
        /// Ask the model for questions before deploying
        #[arg(long)]
        generate: bool,
        /// Add a custom question (repeatable)
        #[arg(long = "question", value_name = "TEXT")]
        questions: Vec<String>,
    },

    /// List every survey, newest first
    List,

    /// Show the latest active survey
    Active,

    /// Record one anonymous response
    Respond { id: String },

    /// Record one opt-out
    OptOut { id: String },

    /// Close a survey to further responses
    Close { id: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: SurveySubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let store = super::open_store(root, &config)?;

    match subcmd {
        SurveySubcommand::Deploy {
            objective,
            generate,
            questions,
        } => {
            let mut all = Vec::new();
            if generate {
                let pipeline = super::pipeline(&config)?;
                let generated = super::runtime()?.block_on(survey_flows::generate_survey_questions(
                    &pipeline,
                    &GenerateSurveyQuestionsInput {
                        objective: objective.clone(),
                    },
                ))?;
                all.extend(generated.questions);
            }
            all.extend(questions.into_iter().map(|text| SurveyQuestion {
                id: None,
                question_text: text,
                reasoning: "Added by the survey author.".to_string(),
                is_custom: Some(true),
            }));
            let survey = surveys::deploy(&store, &objective, all)?;
            show(&survey, json)
        }
        SurveySubcommand::List => {
            let list = surveys::list_all(&store)?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No surveys deployed.");
                return Ok(());
            }
            let rows = list
                .iter()
                .map(|s| {
                    vec![
                        s.id.clone(),
                        s.status.to_string(),
                        s.submission_count.to_string(),
                        s.opt_out_count.to_string(),
                        truncate(&s.objective, 40),
                    ]
                })
                .collect();
            print_table(&["ID", "STATUS", "RESPONSES", "OPT-OUTS", "OBJECTIVE"], rows);
            Ok(())
        }
        SurveySubcommand::Active => match surveys::latest_active(&store)? {
            Some(s) => show(&s, json),
            None if json => print_json(&serde_json::Value::Null),
            None => {
                println!("No active survey.");
                Ok(())
            }
        },
        SurveySubcommand::Respond { id } => show(&surveys::submit_response(&store, &id)?, json),
        SurveySubcommand::OptOut { id } => show(&surveys::log_opt_out(&store, &id)?, json),
        SurveySubcommand::Close { id } => show(&surveys::close(&store, &id)?, json),
    }
}

fn show(s: &DeployedSurvey, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(s);
    }
    println!("{}  [{}]", s.id, s.status);
    println!("objective: {}", s.objective);
    println!("deployed:  {}", s.deployed_at);
    println!("responses: {}  opt-outs: {}", s.submission_count, s.opt_out_count);
    for (i, q) in s.questions.iter().enumerate() {
        println!("  {}. {}", i + 1, q.question_text);
    }
    Ok(())
}
