use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use laddrr_core::feedback::{self, AnonymousFeedbackInput, FeedbackSubmission, TrackFeedbackInput};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum FeedbackSubcommand {
    /// Submit feedback anonymously and print its tracking id
    Submit {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        message: String,
    },

    /// Look up a submission by tracking id (submitter view)
    Track { tracking_id: String },

    /// List every submission (reviewer view)
    List,

    /// Ask the model for a summary and criticality
    Summarize { tracking_id: String },

    /// Resolve a submission
    Resolve {
        tracking_id: String,
        #[arg(long)]
        resolution: String,
        #[arg(long, default_value = "Reviewer")]
        actor: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: FeedbackSubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let store = super::open_store(root, &config)?;

    match subcmd {
        FeedbackSubcommand::Submit { subject, message } => {
            let out = feedback::submit_anonymous(&store, &AnonymousFeedbackInput { subject, message })?;
            if json {
                return print_json(&out);
            }
            println!("Submitted. Tracking id: {}", out.tracking_id);
            println!("Keep it: it is the only way to follow up on this submission.");
            Ok(())
        }
        FeedbackSubcommand::Track { tracking_id } => {
            let out = feedback::track(&store, &TrackFeedbackInput { tracking_id: tracking_id.clone() })?;
            if json {
                return print_json(&out);
            }
            let Some(f) = out.feedback else {
                anyhow::bail!("no submission with tracking id {tracking_id}");
            };
            println!("{}  [{}]", f.tracking_id, f.status);
            println!("subject:   {}", f.subject);
            println!("submitted: {}", f.submitted_at);
            for ev in &f.audit_trail {
                match &ev.details {
                    Some(d) => println!("  {}  {} ({}): {}", ev.timestamp, ev.event, ev.actor, d),
                    None => println!("  {}  {} ({})", ev.timestamp, ev.event, ev.actor),
                }
            }
            Ok(())
        }
        FeedbackSubcommand::List => {
            let list = feedback::list_all(&store)?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No feedback submitted.");
                return Ok(());
            }
            let rows = list
                .iter()
                .map(|f| {
                    vec![
                        f.tracking_id.clone(),
                        f.status.to_string(),
                        f.criticality.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                        truncate(&f.subject, 40),
                    ]
                })
                .collect();
            print_table(&["TRACKING ID", "STATUS", "CRITICALITY", "SUBJECT"], rows);
            Ok(())
        }
        FeedbackSubcommand::Summarize { tracking_id } => {
            let pipeline = super::pipeline(&config)?;
            let f = super::runtime()?.block_on(feedback::summarize(&store, &pipeline, &tracking_id))?;
            show(&f, json)
        }
        FeedbackSubcommand::Resolve {
            tracking_id,
            resolution,
            actor,
        } => show(&feedback::resolve(&store, &tracking_id, &actor, &resolution)?, json),
    }
}

fn show(f: &FeedbackSubmission, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(f);
    }
    println!("{}  [{}]", f.tracking_id, f.status);
    println!("subject: {}", f.subject);
    if let Some(summary) = &f.summary {
        println!("summary: {summary}");
    }
    if let Some(c) = f.criticality {
        println!("criticality: {c}");
    }
    if let Some(r) = &f.resolution {
        println!("resolution: {r}");
    }
    Ok(())
}
