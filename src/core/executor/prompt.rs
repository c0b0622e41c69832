use crate::core::models::{Execution, Project};

/// Fixed preamble sent ahead of every task: workspace-confinement rules plus
/// the JSON shape the CLI must emit as its final output.
const SYSTEM_INSTRUCTIONS: &str = "\
[Safety Rules]
1. You may only read, modify or create files inside the working directory.
2. Never use absolute paths (such as /etc/passwd).
3. Never use parent-directory paths (such as ../secret.txt).
4. Every file path must be relative to the working directory.
5. Never run system administration commands (rm -rf, shutdown, reboot) or network commands (curl, wget).
6. Never print or leak environment variables.

Perform the task below, then finish by printing the result as JSON. Print nothing after the JSON.

[Required JSON Output]
{
  \"status\": \"success or failed\",
  \"summary\": \"summary of what was done, 50 words or less\",
  \"details\": \"full account of the work\",
  \"modified_files\": [\"relative/path1\", \"relative/path2\"],
  \"created_files\": [\"relative/path3\"],
  \"deleted_files\": [\"relative/path4\"]
}
";

/// Assemble the full prompt: instructions, recent history (oldest first),
/// project info, then the literal user command.
///
/// `history` is expected most-recent-first, as the storage query returns it.
pub fn build_prompt(user_command: &str, history: &[Execution], project: &Project) -> String {
    let mut sections = vec![SYSTEM_INSTRUCTIONS.to_string()];

    if !history.is_empty() {
        let mut block = String::from("[Recent Execution History]\n");
        for (no, execution) in history.iter().rev().enumerate() {
            block.push_str(&format!(
                "- No. {}\n\t- Time: {}\n\t- Command: {}\n\t- Result: {}\n\t- Summary: {}\n",
                no + 1,
                execution.start_time.to_rfc3339(),
                execution.command,
                execution.status,
                execution.summary
            ));
        }
        sections.push(block);
    }

    sections.push(format!(
        "[Project Info]\n- Name: {}\n- Working Directory: {}\n",
        project.name, project.directory_path
    ));

    sections.push(format!("[Task]\n{}", user_command));

    sections.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ExecutionStatus;
    use chrono::Utc;

    fn project() -> Project {
        Project {
            id: 1,
            name: "demo".to_string(),
            description: String::new(),
            ai_cli_command: "claude -p".to_string(),
            directory_path: "/workspaces/demo".to_string(),
        }
    }

    fn completed(command: &str, summary: &str) -> Execution {
        Execution {
            id: 0,
            project_id: 1,
            command: command.to_string(),
            status: ExecutionStatus::Completed,
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            summary: summary.to_string(),
            details: String::new(),
            modified_files: Vec::new(),
            created_files: Vec::new(),
            deleted_files: Vec::new(),
            error_message: String::new(),
        }
    }

    #[test]
    fn prompt_contains_task_and_project_info() {
        let prompt = build_prompt("fix the login bug", &[], &project());
        assert!(prompt.contains("[Task]\nfix the login bug"));
        assert!(prompt.contains("- Name: demo"));
        assert!(prompt.contains("- Working Directory: /workspaces/demo"));
        assert!(prompt.contains("[Required JSON Output]"));
        assert!(!prompt.contains("[Recent Execution History]"));
    }

    #[test]
    fn history_is_reordered_oldest_first() {
        // Storage returns most-recent-first; the prompt must read oldest-first.
        let history = vec![completed("newest", "n"), completed("oldest", "o")];
        let prompt = build_prompt("task", &history, &project());

        let oldest_at = prompt.find("- Command: oldest").unwrap();
        let newest_at = prompt.find("- Command: newest").unwrap();
        assert!(oldest_at < newest_at);
        assert!(prompt.contains("- No. 1\n\t- Time:"));
        assert!(prompt.contains("- No. 2\n\t- Time:"));
    }
}
