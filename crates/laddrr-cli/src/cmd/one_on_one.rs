use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use laddrr_core::history::{self, BriefingRequest};
use std::path::Path;

#[derive(Subcommand)]
pub enum OneOnOneSubcommand {
    /// List recorded sessions, newest first
    List {
        /// Only sessions led by this supervisor
        #[arg(long)]
        supervisor: Option<String>,
    },

    /// Generate a briefing packet from a pair's session history
    Briefing {
        #[arg(long)]
        supervisor: String,
        #[arg(long)]
        employee: String,
        /// Who will read the packet, e.g. "Employee" or "Team Lead"
        #[arg(long, default_value = "Team Lead")]
        viewer: String,
    },
}

pub fn run(root: &Path, subcmd: OneOnOneSubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let store = super::open_store(root, &config)?;

    match subcmd {
        OneOnOneSubcommand::List { supervisor } => {
            let mut list = history::list_all(&store)?;
            if let Some(s) = &supervisor {
                list.retain(|i| &i.supervisor_name == s);
            }
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No 1-on-1 sessions recorded.");
                return Ok(());
            }
            let rows = list
                .iter()
                .map(|i| {
                    vec![
                        i.date.clone(),
                        i.supervisor_name.clone(),
                        i.employee_name.clone(),
                        if i.analysis.escalation_alert.is_some() { "yes" } else { "-" }.to_string(),
                        truncate(&i.analysis.sentiment_analysis, 40),
                    ]
                })
                .collect();
            print_table(&["DATE", "SUPERVISOR", "EMPLOYEE", "ESCALATED", "SENTIMENT"], rows);
            Ok(())
        }
        OneOnOneSubcommand::Briefing {
            supervisor,
            employee,
            viewer,
        } => {
            let request = BriefingRequest {
                supervisor_name: supervisor,
                employee_name: employee,
                viewer_role: viewer,
            };
            let pipeline = super::pipeline(&config)?;
            let packet = super::runtime()?.block_on(history::briefing(&store, &pipeline, &request))?;
            if json {
                return print_json(&packet);
            }
            println!("Action items: {}", packet.action_item_analysis);
            let sections = [
                ("Key discussion points", &packet.key_discussion_points),
                ("Outstanding action items", &packet.outstanding_action_items),
                ("Coaching opportunities", &packet.coaching_opportunities),
                ("Suggested questions", &packet.suggested_questions),
                ("Talking points", &packet.talking_points),
            ];
            for (title, items) in sections {
                let Some(items) = items else { continue };
                println!("\n{title}:");
                for item in items {
                    println!("  - {item}");
                }
            }
            if let Some(summary) = &packet.employee_summary {
                println!("\n{summary}");
            }
            Ok(())
        }
    }
}
