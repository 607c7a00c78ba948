//! Prompt templates for the six subagent roles

use crate::change::entities::FileSnippet;
use crate::subagent::role::SubagentRole;
use crate::work_unit::entities::WorkUnit;

/// Shared context every unit-level prompt is built from.
#[derive(Debug, Clone, Default)]
pub struct UnitPromptContext<'a> {
    pub goal: &'a str,
    pub unit: Option<&'a WorkUnit>,
    pub tree_preview: &'a str,
    pub memory_context: &'a str,
    pub project_context: &'a str,
    pub skills_context: &'a str,
    pub artifact_context: &'a str,
    pub clarifications: &'a str,
}

/// Templates for subagent system and user prompts
pub struct RolePromptTemplate;

impl RolePromptTemplate {
    /// System prompt with the exact JSON schema the role must return.
    pub fn system(role: SubagentRole) -> String {
        let (mission, schema) = match role {
            SubagentRole::Supervisor => (
                "You are the supervisor of a team of coding agents. Decompose the goal into \
                 small, independently verifiable work units and order them with explicit dependencies.",
                r#"{"summary": string, "strategy": string, "work_units": [{"id": string, "title": string, "objective": string, "depends_on": [string], "priority": 1-5, "files_hint": [string], "verification_focus": [string]}]}"#,
            ),
            SubagentRole::Scout => (
                "You are a read-only scout. Identify the files and risks relevant to one work unit. \
                 Never propose edits.",
                r#"{"summary": string, "relevant_files": [{"path": string, "reason": string, "relevance": 0.0-1.0}], "risks": [string]}"#,
            ),
            SubagentRole::Planner => (
                "You are an implementation planner. Describe how to complete one work unit and \
                 which files must be written, appended to, or deleted.",
                r#"{"summary": string, "approach": string, "steps": [string], "write_targets": [{"path": string, "operation": "write" | "append" | "delete", "rationale": string}], "test_focus": [string]}"#,
            ),
            SubagentRole::Coder => (
                "You are a careful software engineer. Produce the concrete file changes for one \
                 work unit. Prefer patch_file with exact old_text copied from the provided snippets; \
                 use write_file only for new files or full rewrites.",
                r#"{"summary": string, "changes": [{"kind": "patch_file", "path": string, "hunks": [{"old_text": string, "new_text": string, "occurrence": integer?}], "rationale": string} | {"kind": "write_file" | "append_file", "path": string, "content": string, "rationale": string} | {"kind": "delete_file", "path": string, "rationale": string}], "verification_notes": [string], "remaining_risks": [string], "confidence": 0.0-1.0}"#,
            ),
            SubagentRole::Critic => (
                "You are a strict code reviewer. Judge whether the proposed changes complete the \
                 work unit correctly and safely. Only list an issue as blocking if it must be fixed \
                 before the change can land.",
                r#"{"summary": string, "score": 0.0-1.0, "blocking_issues": [string], "non_blocking_issues": [string], "recommendations": [string]}"#,
            ),
            SubagentRole::Synthesizer => (
                "You summarize the outcome of a multi-agent coding run for the user.",
                r#"{"summary": string, "highlights": [string], "follow_ups": [string]}"#,
            ),
        };

        format!(
            "{mission}\n\nRespond with exactly one JSON object and nothing else. Schema:\n{schema}"
        )
    }

    /// Goal decomposition.
    pub fn supervisor_plan(ctx: &UnitPromptContext<'_>, continuation_hint: &str) -> String {
        let mut prompt = format!("## Goal\n{}\n", ctx.goal);
        push_section(&mut prompt, "Clarifications", ctx.clarifications);
        push_section(&mut prompt, "Project", ctx.project_context);
        push_section(&mut prompt, "Skills", ctx.skills_context);
        push_section(&mut prompt, "Memory", ctx.memory_context);
        push_section(&mut prompt, "Previous run", continuation_hint);
        push_section(&mut prompt, "Workspace", ctx.tree_preview);
        prompt.push_str(
            "\nSplit the goal into at most 12 work units. Use short slug ids. \
             Only depend on units that must finish first; independent units run in parallel.\n",
        );
        prompt
    }

    /// Dependency repair for a cyclic or deadlocked graph.
    pub fn supervisor_replan(goal: &str, units: &[WorkUnit], problem: &str) -> String {
        let listing = units
            .iter()
            .map(|u| {
                format!(
                    "- {} ({}): depends_on [{}]",
                    u.id,
                    u.title,
                    u.depends_on.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"## Goal
{goal}

## Work units
{listing}

## Problem
{problem}

Revise the dependencies so that every remaining unit can run. Return only the units whose
dependencies change, as {{"depends_on": {{"unit-id": ["dependency-id", ...]}}, "rationale": string}}.
Do not introduce cycles and do not reference unknown ids.
"#
        )
    }

    pub fn scout(ctx: &UnitPromptContext<'_>) -> String {
        let mut prompt = unit_header(ctx);
        push_section(&mut prompt, "Memory", ctx.memory_context);
        push_section(&mut prompt, "Workspace", ctx.tree_preview);
        prompt.push_str("\nList the files most relevant to this unit and the risks you see.\n");
        prompt
    }

    pub fn planner(ctx: &UnitPromptContext<'_>) -> String {
        let mut prompt = unit_header(ctx);
        push_section(&mut prompt, "Clarifications", ctx.clarifications);
        push_section(&mut prompt, "Memory", ctx.memory_context);
        push_section(&mut prompt, "Skills", ctx.skills_context);
        push_section(&mut prompt, "Workspace", ctx.tree_preview);
        prompt.push_str("\nPlan the implementation of this unit.\n");
        prompt
    }

    pub fn coder(
        ctx: &UnitPromptContext<'_>,
        snippets: &[FileSnippet],
        previous_error: Option<&str>,
    ) -> String {
        let mut prompt = unit_header(ctx);
        push_section(&mut prompt, "Clarifications", ctx.clarifications);
        push_section(&mut prompt, "Skills", ctx.skills_context);
        push_section(&mut prompt, "Team notes", ctx.artifact_context);
        push_section(&mut prompt, "Files", &render_snippets(snippets));
        if let Some(error) = previous_error {
            push_section(
                &mut prompt,
                "Previous attempt failed",
                &format!("{}\nAddress this failure in your changes.", error),
            );
        }
        prompt.push_str("\nProduce the file changes for this unit.\n");
        prompt
    }

    /// Second opinion on a low-confidence coder answer.
    pub fn coder_escalation(base_prompt: &str, previous_raw: &str) -> String {
        format!(
            "{base_prompt}\n## Earlier proposal (low confidence)\n{previous_raw}\n\n\
             Review the earlier proposal, fix what is wrong or missing, and return a complete \
             replacement answer.\n"
        )
    }

    pub fn critic(ctx: &UnitPromptContext<'_>, proposal: &str, snippets: &[FileSnippet]) -> String {
        let mut prompt = unit_header(ctx);
        push_section(&mut prompt, "Team notes", ctx.artifact_context);
        push_section(&mut prompt, "Files", &render_snippets(snippets));
        push_section(&mut prompt, "Proposed changes", proposal);
        prompt.push_str("\nReview the proposed changes.\n");
        prompt
    }

    /// Second review for a score just under the threshold.
    pub fn critic_rereview(base_prompt: &str, previous_raw: &str) -> String {
        format!(
            "{base_prompt}\n## Earlier review\n{previous_raw}\n\n\
             The earlier review scored just below the acceptance threshold without blocking \
             issues. Re-check the changes carefully and give your own score.\n"
        )
    }

    pub fn synthesizer(goal: &str, status: &str, unit_lines: &[String], notes: &[String]) -> String {
        let mut prompt = format!("## Goal\n{}\n\n## Status\n{}\n", goal, status);
        push_section(&mut prompt, "Work units", &unit_lines.join("\n"));
        push_section(&mut prompt, "Notes", &notes.join("\n"));
        prompt.push_str("\nSummarize what was done and what should happen next.\n");
        prompt
    }

    /// Appended after a response that could not be parsed.
    pub fn corrective_suffix(error: &str) -> String {
        format!(
            "\n\nYour previous response could not be used: {}.\n\
             Return exactly one JSON object matching the schema. No prose, no markdown fences.",
            error
        )
    }
}

fn unit_header(ctx: &UnitPromptContext<'_>) -> String {
    let mut header = format!("## Goal\n{}\n", ctx.goal);
    if let Some(unit) = ctx.unit {
        header.push_str(&format!(
            "\n## Work unit: {} ({})\n{}\n",
            unit.title, unit.id, unit.objective
        ));
        if !unit.files_hint.is_empty() {
            header.push_str(&format!("Files hint: {}\n", unit.files_hint.join(", ")));
        }
        if !unit.verification_focus.is_empty() {
            header.push_str(&format!(
                "Verification focus: {}\n",
                unit.verification_focus.join(", ")
            ));
        }
    }
    push_section(&mut header, "Project", ctx.project_context);
    header
}

fn push_section(prompt: &mut String, title: &str, body: &str) {
    let body = body.trim();
    if body.is_empty() {
        return;
    }
    prompt.push_str(&format!("\n## {}\n{}\n", title, body));
}

fn render_snippets(snippets: &[FileSnippet]) -> String {
    snippets
        .iter()
        .map(|s| {
            let marker = if s.truncated { " (truncated)" } else { "" };
            format!("### {}{}\n```\n{}\n```", s.path, marker, s.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
