use crate::domain::model::{MentorContext, Module, RoadmapRequest};
use crate::domain::ports::Prompt;
use crate::utils::error::{Result, RoadmapError};

/// Rendered in place of any absent profile field.
pub const PLACEHOLDER: &str = "N/A";

const EXAMPLE_MODULE: &str = r#"{"title": "Intro to Python", "description": "...", "difficulty": "beginner", "estimated_hours": 4.0, "learning_objectives": ["..."]}"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// 產生路線圖提示詞；缺少的個人資料欄位以 "N/A" 代替
    pub fn build_roadmap_prompt(&self, request: &RoadmapRequest) -> Result<Prompt> {
        if request.timeline_weeks == 0 {
            return Err(RoadmapError::invalid_request(
                "timeline_weeks",
                "must be a positive number of weeks",
            ));
        }

        let profile = &request.user_profile;
        let text = format!(
            "Generate a detailed, personalized learning roadmap for a user with the following profile:\n\
             - Background: {background}\n\
             - Current Role: {current_role}\n\
             - Existing Skills: {skills}\n\
             - Target Role/Goal: {goal}\n\
             - Desired Tech Stack: {tech_stack}\n\
             - Timeline: {weeks} weeks\n\
             \n\
             The roadmap should be structured as a JSON object with a single key \"modules\".\n\
             The \"modules\" value should be a list of 15-20 JSON objects, each representing a learning module.\n\
             Each module object must have these keys: \"title\", \"description\", \"difficulty\" (beginner, intermediate, or advanced), \
             \"estimated_hours\" (float), and \"learning_objectives\" (list of strings).\n\
             Ensure the modules logically progress from beginner to advanced.\n\
             Example module: {example}\n",
            background = or_placeholder(profile.background.as_deref()),
            current_role = or_placeholder(profile.current_role.as_deref()),
            skills = profile.skills.join(", "),
            goal = request.goal.trim(),
            tech_stack = request.tech_stack.join(", "),
            weeks = request.timeline_weeks,
            example = EXAMPLE_MODULE,
        );

        Ok(Prompt::user(text))
    }

    /// 產生單一主題教材的提示詞，要求固定鍵名的 JSON 物件
    pub fn build_topic_prompt(
        &self,
        topic: &str,
        module: &Module,
        target_goal: Option<&str>,
    ) -> Result<Prompt> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(RoadmapError::invalid_request("topic", "must not be empty"));
        }

        let text = format!(
            "Generate comprehensive learning content for:\n\
             Topic: {topic}\n\
             Module: {module}\n\
             Difficulty: {difficulty}\n\
             Target: {target}\n\
             \n\
             Respond with a single JSON object with these keys:\n\
             \"explanation\": a detailed 200-300 word explanation,\n\
             \"keyPoints\": 5 key points (list of strings),\n\
             \"applications\": 3 real-world uses (list of strings),\n\
             \"pitfalls\": 3 common mistakes (list of strings),\n\
             \"practiceIdeas\": 3 exercises (list of strings),\n\
             \"youtubeSearchQueries\": 3 specific video search queries (list of strings).\n",
            topic = topic,
            module = module.title,
            difficulty = module.difficulty,
            target = or_placeholder(target_goal),
        );

        Ok(Prompt::user(text))
    }

    /// Socratic tutoring instruction. Withholding the direct answer is only
    /// requested of the model, nothing here enforces it.
    pub fn build_mentor_prompt(&self, question: &str, context: &MentorContext) -> Prompt {
        let text = format!(
            "You are an AI learning mentor. A user needs help.\n\
             User's Background: {background}\n\
             Current Module: {module}\n\
             \n\
             User's Question: \"{question}\"\n\
             \n\
             Your task is to guide the user to the answer using the Socratic method.\n\
             Do not give the direct answer. Instead, ask probing questions to help them think.\n\
             Keep your response concise and encouraging.\n",
            background = or_placeholder(context.user_background.as_deref()),
            module = or_placeholder(context.current_module_title.as_deref()),
            question = question,
        );

        Prompt::system(text)
    }
}

fn or_placeholder(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => PLACEHOLDER,
    }
}
