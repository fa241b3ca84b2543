use crate::probe::WorkingServer;

/// Persona and task text for one research run.
pub struct Brief {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
    pub research_task: String,
    pub summary_task: &'static str,
    pub tool_names: Vec<String>,
}

const OUTPUT_FORMAT: &str = r#"Respond with a single JSON object and nothing else:

```json
{
  "summary": "A detailed summary of the research findings, in markdown",
  "image_path": "Path to any image file created, or an empty string"
}
```"#;

impl Brief {
    pub fn new(topic: &str, servers: &[WorkingServer]) -> Self {
        let tool_names: Vec<String> = servers
            .iter()
            .flat_map(|s| s.tools.iter().map(|t| t.name.clone()))
            .collect();

        if servers.is_empty() {
            Self {
                role: "AI Research Creator",
                goal: "Research topics using built-in knowledge and create comprehensive analysis",
                backstory: "An AI researcher that specializes in analyzing topics and providing \
                            detailed insights using available knowledge.",
                research_task: format!(
                    "Research and analyze the topic '{topic}' thoroughly using your knowledge. \
                     Provide detailed insights about how it works, including key components, \
                     processes, and relationships."
                ),
                summary_task: "Create a detailed summary of your analysis, highlighting the most \
                               important aspects, key insights, and practical implications of \
                               the topic.",
                tool_names,
            }
        } else {
            Self {
                role: "AI Research Creator with Tools",
                goal: "Research topics thoroughly using available MCP tools, create comprehensive \
                       diagrams, and save summaries",
                backstory: "An AI researcher and creator that specializes in using MCP tools to \
                            gather information, create visual representations, and save findings.",
                research_task: format!(
                    "Research the topic '{topic}' thoroughly using available MCP tools. If image \
                     creation tools are available, create an in-depth diagram showing how the \
                     topic works, including key components, processes, and relationships."
                ),
                summary_task: "Create a detailed summary of your research findings. Include key \
                               insights, important details, and references to any diagrams \
                               created.",
                tool_names,
            }
        }
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are an {role}.\n\nGoal: {goal}\n\nBackstory: {backstory}",
            role = self.role,
            goal = self.goal,
            backstory = self.backstory
        )
    }

    pub fn user_prompt(&self) -> String {
        let mut prompt = format!(
            "## Task 1\n{}\n\n## Task 2\n{}\n\n",
            self.research_task, self.summary_task
        );
        if !self.tool_names.is_empty() {
            prompt.push_str(&format!(
                "Tools available in this session: {}\n\n",
                self.tool_names.join(", ")
            ));
        }
        prompt.push_str(OUTPUT_FORMAT);
        prompt
    }
}
